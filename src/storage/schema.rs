pub(crate) const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS transactions (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    account_number  INTEGER NOT NULL,
    amount          TEXT NOT NULL,
    description     TEXT NOT NULL CHECK (length(description) <= 255),
    trx_timestamp   TEXT NOT NULL,
    customer_id     INTEGER NOT NULL,
    version         INTEGER NOT NULL DEFAULT 0,
    processed       BOOLEAN NOT NULL DEFAULT 0,
    natural_key     TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_transactions_natural_key ON transactions(natural_key);
CREATE INDEX IF NOT EXISTS idx_transactions_customer ON transactions(customer_id);
CREATE INDEX IF NOT EXISTS idx_transactions_account ON transactions(account_number);
"#;

pub(crate) const CURRENT_VERSION: i32 = 1;
