//! Database Schema Definitions
//!
//! Contains schema-related constants and utilities.

/// Current database schema version
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Schema migration versions
pub const MIGRATION_VERSIONS: &[i32] = &[1];

/// Statements of migration 1, executed one at a time
pub const MIGRATION_1: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS pending_records (
        key TEXT PRIMARY KEY NOT NULL,
        payload TEXT NOT NULL,
        created_at TEXT NOT NULL,
        synced INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS idx_pending_records_synced ON pending_records (synced)",
];

/// Statements for a given migration version
pub fn migration_statements(version: i32) -> &'static [&'static str] {
    match version {
        1 => MIGRATION_1,
        _ => &[],
    }
}

/// Check if database needs migration
pub fn needs_migration(current_version: i32) -> bool {
    current_version < CURRENT_SCHEMA_VERSION
}

/// Get pending migrations
pub fn get_pending_migrations(current_version: i32) -> Vec<i32> {
    MIGRATION_VERSIONS
        .iter()
        .filter(|&&v| v > current_version)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_version() {
        assert_eq!(CURRENT_SCHEMA_VERSION, 1);
        assert!(!needs_migration(CURRENT_SCHEMA_VERSION));
        assert!(needs_migration(0));
    }

    #[test]
    fn test_pending_migrations() {
        assert_eq!(get_pending_migrations(0), vec![1]);
        assert_eq!(get_pending_migrations(1), Vec::<i32>::new());
    }

    #[test]
    fn test_every_version_has_statements() {
        for version in MIGRATION_VERSIONS {
            assert!(!migration_statements(*version).is_empty());
        }
        assert!(migration_statements(99).is_empty());
    }
}
