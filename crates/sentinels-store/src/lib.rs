//! # sentinels-store
//!
//! [`Datastore`] backends: a local SQLite database (default, used by tests)
//! and a hosted Supabase project reached over PostgREST.

pub mod sqlite;
pub mod supabase;

pub use sqlite::SqliteStore;
pub use supabase::SupabaseStore;

use sentinels_core::{config::StoreConfig, error::SentinelError, traits::Datastore};
use std::sync::Arc;

/// Open the backend named by `store.backend`.
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn Datastore>, SentinelError> {
    match config.backend.as_str() {
        "sqlite" => Ok(Arc::new(SqliteStore::new(config).await?)),
        "supabase" => Ok(Arc::new(SupabaseStore::from_config(config)?)),
        other => Err(SentinelError::Config(format!(
            "unknown store backend: {other} (expected sqlite or supabase)"
        ))),
    }
}
