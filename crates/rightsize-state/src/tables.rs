//! redb table definitions for the rightsize record store.

use redb::TableDefinition;

/// Scaler records keyed by `{namespace}/{name}`.
pub const SCALERS: TableDefinition<&str, &[u8]> = TableDefinition::new("scalers");
