#![deny(warnings)]

use persistence::{default_sqlite_url, SavedState};

/// Usage: migrate [DB_URL] [USER_ID]
///
/// Creates the database and schema, then upgrades the user's stored state
/// to the current version and records a snapshot of it.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let url = args.next().unwrap_or_else(|| default_sqlite_url().to_string());
    let user = args.next().unwrap_or_else(|| "default".to_string());

    // Ensure directory exists
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"));
    if let Some(path) = path.filter(|p| !p.contains(":memory:")) {
        if let Some(parent) = std::path::Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let pool = persistence::init_db(&url).await?;

    match persistence::load_user_state(&pool, &user).await? {
        Some(saved) => {
            // rewrite in the current layout
            let upgraded = SavedState::new(saved.state, chrono::Utc::now());
            persistence::save_user_state(&pool, &user, &upgraded).await?;
            let id =
                persistence::create_snapshot(&pool, &user, "migrated", Some("schema upgrade"), &upgraded)
                    .await?;
            println!("State of {user} upgraded to {} (snapshot {id})", upgraded.version);
        }
        None => println!("No stored state for {user}"),
    }
    println!("DB migrated at {}", url);
    Ok(())
}
