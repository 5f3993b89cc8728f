//! Bootstrap DDL for the ledger tables
//!
//! Statements are idempotent so `init_schema` can run on every start.
//! Foreign key constraint names follow the PostgreSQL defaults
//! (`<table>_<column>_fkey`); the store maps violations back to account ids by name.

pub const CREATE_ACCOUNTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id          BIGSERIAL PRIMARY KEY,
    owner       TEXT NOT NULL,
    balance     BIGINT NOT NULL,
    currency    TEXT NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS accounts_owner_idx ON accounts (owner);
"#;

pub const CREATE_ENTRIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    id          BIGSERIAL PRIMARY KEY,
    account_id  BIGINT NOT NULL REFERENCES accounts (id),
    amount      BIGINT NOT NULL CHECK (amount <> 0),
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS entries_account_id_idx ON entries (account_id);
"#;

pub const CREATE_TRANSFERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transfers (
    id               BIGSERIAL PRIMARY KEY,
    from_account_id  BIGINT NOT NULL REFERENCES accounts (id),
    to_account_id    BIGINT NOT NULL REFERENCES accounts (id),
    amount           BIGINT NOT NULL CHECK (amount > 0),
    created_at       TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS transfers_from_account_id_idx ON transfers (from_account_id);
CREATE INDEX IF NOT EXISTS transfers_to_account_id_idx ON transfers (to_account_id);
CREATE INDEX IF NOT EXISTS transfers_pair_idx ON transfers (from_account_id, to_account_id);
"#;

/// In dependency order
pub const ALL: [(&str, &str); 3] = [
    ("accounts", CREATE_ACCOUNTS_TABLE),
    ("entries", CREATE_ENTRIES_TABLE),
    ("transfers", CREATE_TRANSFERS_TABLE),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_created_before_referencing_tables() {
        let names: Vec<_> = ALL.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, ["accounts", "entries", "transfers"]);
        assert!(!CREATE_ACCOUNTS_TABLE.contains("REFERENCES"));
    }

    #[test]
    fn test_statements_are_idempotent() {
        for (name, ddl) in ALL {
            for stmt in ddl.split(';').map(str::trim).filter(|s| !s.is_empty()) {
                assert!(stmt.contains("IF NOT EXISTS"), "{name}: {stmt}");
            }
        }
    }
}
