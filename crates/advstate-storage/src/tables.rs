//! redb table definitions for the storage engines.

use redb::TableDefinition;

/// JSON-encoded records keyed by scoped key (`prefix:scope:key`).
pub const RECORDS: TableDefinition<&str, &str> = TableDefinition::new("records");
