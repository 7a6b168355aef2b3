//! Memoized recompute keyed on scenario identity.

use crate::projection::{project, Projection};
use plan_core::Scenario;
use std::sync::Arc;
use tracing::trace;

/// Holds the last scenario instance and its projection.
///
/// Scenarios are immutable once shared: an edit produces a new `Arc`
/// (see [`update_scenario`]), which is what invalidates the cache.
#[derive(Debug, Default)]
pub struct Projector {
    cached: Option<(Arc<Scenario>, Arc<Projection>)>,
    recomputes: u64,
}

impl Projector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Projection of `scenario`, recomputed unless it is the cached instance.
    pub fn project(&mut self, scenario: &Arc<Scenario>) -> Arc<Projection> {
        if let Some((last, projection)) = &self.cached {
            if Arc::ptr_eq(last, scenario) {
                trace!("projection cache hit");
                return Arc::clone(projection);
            }
        }
        let projection = Arc::new(project(scenario));
        self.cached = Some((Arc::clone(scenario), Arc::clone(&projection)));
        self.recomputes += 1;
        projection
    }

    /// Number of full passes run so far.
    pub fn recomputes(&self) -> u64 {
        self.recomputes
    }
}

/// Copy-on-write edit of a shared scenario.
pub fn update_scenario<F>(scenario: &Arc<Scenario>, edit: F) -> Arc<Scenario>
where
    F: FnOnce(&mut Scenario),
{
    let mut next = Scenario::clone(scenario);
    edit(&mut next);
    Arc::new(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn same_instance_hits_cache() {
        let mut projector = Projector::new();
        let s = Arc::new(Scenario::default());
        let a = projector.project(&s);
        let b = projector.project(&s);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(projector.recomputes(), 1);
    }

    #[test]
    fn edit_triggers_full_recompute() {
        let mut projector = Projector::new();
        let s = Arc::new(Scenario::default());
        let before = projector.project(&s);
        let s2 = update_scenario(&s, |sc| sc.treasury.initial_cash = Decimal::new(1_000, 0));
        let after = projector.project(&s2);
        assert_eq!(projector.recomputes(), 2);
        assert_eq!(before.metrics.closing_treasury, Decimal::ZERO);
        assert_eq!(after.metrics.closing_treasury, Decimal::new(1_000, 0));
        // the original instance is untouched
        assert_eq!(s.treasury.initial_cash, Decimal::ZERO);
    }
}
