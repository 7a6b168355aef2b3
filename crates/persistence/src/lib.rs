#![deny(warnings)]

//! Persistence layer: versioned state blobs, file and SQLite stores, snapshots.

pub mod envelope;
pub mod sqlite;
pub mod store;

pub use envelope::{decode, upgrade, MigrationError, SavedState, STATE_VERSION};
pub use sqlite::{
    create_snapshot, init_db, list_snapshots, load_snapshot, load_user_state, save_user_state,
    SnapshotInfo,
};
pub use store::{load_scenario, save_scenario, FileStore, MemoryStore, StateStore, StoreError};

/// Returns the default SQLite URL used for local saves.
pub fn default_sqlite_url() -> &'static str {
    "sqlite://./saves/planner.db"
}
