//! Production costing and display prices.

use plan_core::{Bom, Product};
use rust_decimal::Decimal;

/// Cost of one unit built from `bom`, scrap included.
pub fn bom_unit_cost(bom: &Bom) -> Decimal {
    let parts: Decimal = bom
        .lines
        .iter()
        .map(|l| l.quantity * (Decimal::ONE + l.scrap_rate) * l.unit_price)
        .sum();
    parts + bom.assembly_cost
}

/// Unit cost used for COGS: the BOM cost when one is attached.
pub fn effective_unit_cost(product: &Product) -> Decimal {
    product
        .bom
        .as_ref()
        .map(bom_unit_cost)
        .unwrap_or(product.unit_cost)
}

/// Price including VAT.
pub fn price_ttc(product: &Product) -> Decimal {
    product.price_ht * (Decimal::ONE + product.vat_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use plan_core::BomLine;

    #[test]
    fn bom_cost_includes_scrap_and_assembly() {
        let bom = Bom {
            lines: vec![
                BomLine {
                    component: "pcb".into(),
                    quantity: Decimal::ONE,
                    unit_price: Decimal::new(40, 0),
                    scrap_rate: Decimal::new(5, 2),
                },
                BomLine {
                    component: "screw".into(),
                    quantity: Decimal::new(8, 0),
                    unit_price: Decimal::new(5, 2),
                    scrap_rate: Decimal::ZERO,
                },
            ],
            assembly_cost: Decimal::new(12, 0),
        };
        // 40 * 1.05 + 8 * 0.05 + 12
        assert_eq!(bom_unit_cost(&bom), Decimal::new(544, 1));
    }

    #[test]
    fn unit_cost_falls_back_without_bom() {
        let mut p = Product {
            unit_cost: Decimal::new(400, 0),
            ..Default::default()
        };
        assert_eq!(effective_unit_cost(&p), Decimal::new(400, 0));
        p.bom = Some(Bom {
            lines: vec![],
            assembly_cost: Decimal::new(90, 0),
        });
        assert_eq!(effective_unit_cost(&p), Decimal::new(90, 0));
    }

    #[test]
    fn ttc_adds_vat() {
        let p = Product {
            price_ht: Decimal::new(100, 0),
            vat_rate: Decimal::new(20, 2),
            ..Default::default()
        };
        assert_eq!(price_ttc(&p), Decimal::new(120, 0));
    }
}
