use chrono::NaiveDateTime;
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use crate::models::{NaturalKey, TransactionRecord, TIMESTAMP_FORMAT};
use crate::storage::schema;
use crate::storage::{Page, PageRequest, StoreError, TransactionFilter, TransactionStore};
use crate::types::RecordId;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_COLUMNS: &str =
    "SELECT id, account_number, amount, description, trx_timestamp, customer_id, version, processed FROM transactions";

/// SQLite-backed store. A single connection is shared behind a lock; each `save_all` runs in
/// its own SQLite transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::initialize(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(schema::SCHEMA_V1)?;

        let has_version: bool = conn.query_row("SELECT EXISTS(SELECT 1 FROM schema_version)", [], |row| row.get(0))?;

        if !has_version {
            conn.execute("INSERT INTO schema_version (version) VALUES (?1)", params![schema::CURRENT_VERSION])?;
        }

        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl TransactionStore for SqliteStore {
    fn exists(&self, key: &NaturalKey) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let exists = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM transactions WHERE natural_key = ?1)",
            params![key.to_string()],
            |row| row.get(0)
        )?;

        Ok(exists)
    }

    fn save_all(&self, records: &[TransactionRecord]) -> Result<Vec<TransactionRecord>, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut saved = Vec::with_capacity(records.len());

        //NOTE: Returning early drops `tx`, which rolls the whole batch back
        for record in records {
            tx.execute(
                "INSERT INTO transactions (account_number, amount, description, trx_timestamp, customer_id, version, processed, natural_key)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7)",
                params![
                    record.account_number,
                    record.amount.to_string(),
                    record.description,
                    record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    record.customer_id,
                    record.processed,
                    record.natural_key().to_string(),
                ],
            ).map_err(write_error)?;

            let mut persisted = record.clone();
            persisted.id = Some(tx.last_insert_rowid());
            persisted.version = Some(0);
            saved.push(persisted);
        }

        tx.commit()?;
        debug!("Committed [{}] transactions to SQLite", saved.len());

        Ok(saved)
    }

    fn find_by_id(&self, id: RecordId) -> Result<Option<TransactionRecord>, StoreError> {
        let conn = self.lock()?;

        select_by_id(&conn, id)
    }

    fn find_page(&self, filter: &TransactionFilter, request: &PageRequest) -> Result<Page<TransactionRecord>, StoreError> {
        let conn = self.lock()?;
        let (clause, values) = filter_clause(filter);
        let params_ref: Vec<&dyn ToSql> = values.iter().map(|value| value.as_ref()).collect();

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM transactions{clause}"),
            params_ref.as_slice(),
            |row| row.get(0)
        )?;

        let sql = format!("{SELECT_COLUMNS}{clause} ORDER BY id LIMIT {} OFFSET {}", request.size, request.offset());
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_ref.as_slice(), RawRow::from_row)?;

        let mut content = Vec::new();

        for row in rows {
            content.push(row?.into_record()?);
        }

        let total = usize::try_from(total).map_err(|_| StoreError::Corrupt(format!("negative row count {total}")))?;

        Ok(Page::new(content, request, total))
    }

    fn update(&self, record: &TransactionRecord) -> Result<TransactionRecord, StoreError> {
        let id = record.id
            .ok_or_else(|| StoreError::Constraint("cannot update a transaction that was never persisted".to_string()))?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let changed = tx.execute(
            "UPDATE transactions
             SET account_number = ?1, amount = ?2, description = ?3, trx_timestamp = ?4, customer_id = ?5,
                 processed = ?6, natural_key = ?7, version = version + 1
             WHERE id = ?8 AND version = ?9",
            params![
                record.account_number,
                record.amount.to_string(),
                record.description,
                record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                record.customer_id,
                record.processed,
                record.natural_key().to_string(),
                id,
                record.version,
            ],
        ).map_err(write_error)?;

        if changed == 0 {
            let actual: Option<i32> = tx.query_row("SELECT version FROM transactions WHERE id = ?1", params![id], |row| row.get(0))
                .optional()?;

            return Err(match actual {
                Some(actual) => StoreError::VersionConflict { id, expected: record.version, actual },
                None => StoreError::NotFound(id)
            });
        }

        let updated = select_by_id(&tx, id)?.ok_or(StoreError::NotFound(id))?;
        tx.commit()?;

        Ok(updated)
    }
}

fn select_by_id(conn: &Connection, id: RecordId) -> Result<Option<TransactionRecord>, StoreError> {
    let raw = conn.query_row(&format!("{SELECT_COLUMNS} WHERE id = ?1"), params![id], RawRow::from_row)
        .optional()?;

    raw.map(RawRow::into_record).transpose()
}

fn filter_clause(filter: &TransactionFilter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut clause = String::from(" WHERE 1=1");
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(customer_id) = filter.customer_id {
        values.push(Box::new(customer_id));
        clause.push_str(&format!(" AND customer_id = ?{}", values.len()));
    }

    if let Some(account_number) = filter.account_number {
        values.push(Box::new(account_number));
        clause.push_str(&format!(" AND account_number = ?{}", values.len()));
    }

    if let Some(needle) = filter.description_needle() {
        values.push(Box::new(needle));
        clause.push_str(&format!(" AND instr(lower(description), ?{}) > 0", values.len()));
    }

    if let Some(from) = filter.from {
        values.push(Box::new(from.format(TIMESTAMP_FORMAT).to_string()));
        clause.push_str(&format!(" AND trx_timestamp >= ?{}", values.len()));
    }

    if let Some(to) = filter.to {
        values.push(Box::new(to.format(TIMESTAMP_FORMAT).to_string()));
        clause.push_str(&format!(" AND trx_timestamp <= ?{}", values.len()));
    }

    (clause, values)
}

fn write_error(error: rusqlite::Error) -> StoreError {
    match error.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => StoreError::Constraint(error.to_string()),
        _ => StoreError::Database(error)
    }
}

/// Column values as stored, before decimal and timestamp decoding.
struct RawRow {
    id: RecordId,
    account_number: i64,
    amount: String,
    description: String,
    timestamp: String,
    customer_id: i64,
    version: i32,
    processed: bool
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            account_number: row.get(1)?,
            amount: row.get(2)?,
            description: row.get(3)?,
            timestamp: row.get(4)?,
            customer_id: row.get(5)?,
            version: row.get(6)?,
            processed: row.get(7)?
        })
    }

    fn into_record(self) -> Result<TransactionRecord, StoreError> {
        let amount = Decimal::from_str(&self.amount)
            .map_err(|error| StoreError::Corrupt(format!("transaction [{}] amount '{}': {error}", self.id, self.amount)))?;

        let timestamp = NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT)
            .map_err(|error| StoreError::Corrupt(format!("transaction [{}] timestamp '{}': {error}", self.id, self.timestamp)))?;

        Ok(TransactionRecord {
            id: Some(self.id),
            account_number: self.account_number,
            amount,
            description: self.description,
            timestamp,
            customer_id: self.customer_id,
            version: Some(self.version),
            processed: self.processed
        })
    }
}
