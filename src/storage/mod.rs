mod errors;
mod memory_store;
mod schema;
mod sqlite_store;

use chrono::NaiveDateTime;

use crate::models::{NaturalKey, TransactionRecord};
use crate::types::{AccountNumber, CustomerId, RecordId};

pub use errors::StoreError;
pub use memory_store::MemoryStore;
pub use sqlite_store::SqliteStore;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 1000;

/// Persistence for transaction records.
///
/// Calls are blocking; the engine invokes them from blocking worker threads.
pub trait TransactionStore: Send + Sync + 'static {
    /// Read-only check for an already persisted record with the same natural key.
    fn exists(&self, key: &NaturalKey) -> Result<bool, StoreError>;

    /// Persists every record or none of them. Returned records carry their id and initial version.
    fn save_all(&self, records: &[TransactionRecord]) -> Result<Vec<TransactionRecord>, StoreError>;

    fn find_by_id(&self, id: RecordId) -> Result<Option<TransactionRecord>, StoreError>;

    /// Filtered page of records ordered by id.
    fn find_page(&self, filter: &TransactionFilter, request: &PageRequest) -> Result<Page<TransactionRecord>, StoreError>;

    /// Overwrites the mutable fields of a persisted record if its version is still current,
    /// returning the record with its incremented version.
    fn update(&self, record: &TransactionRecord) -> Result<TransactionRecord, StoreError>;
}

/// Optional read filters, combined with logical AND.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct TransactionFilter {
    pub customer_id: Option<CustomerId>,
    pub account_number: Option<AccountNumber>,
    /// Case-insensitive substring of the description. Blank means no filter.
    pub description: Option<String>,
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>
}

impl TransactionFilter {
    pub fn with_customer_id(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn with_account_number(mut self, account_number: AccountNumber) -> Self {
        self.account_number = Some(account_number);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_timestamp_range(mut self, from: Option<NaiveDateTime>, to: Option<NaiveDateTime>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    /// Trimmed, lowercased description fragment, if one was given.
    pub fn description_needle(&self) -> Option<String> {
        self.description.as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_lowercase)
    }

    pub fn matches(&self, record: &TransactionRecord) -> bool {
        if self.customer_id.is_some_and(|customer_id| record.customer_id != customer_id) {
            return false;
        }

        if self.account_number.is_some_and(|account_number| record.account_number != account_number) {
            return false;
        }

        if self.from.is_some_and(|from| record.timestamp < from) {
            return false;
        }

        if self.to.is_some_and(|to| record.timestamp > to) {
            return false;
        }

        match self.description_needle() {
            Some(needle) => record.description.to_lowercase().contains(&needle),
            None => true
        }
    }
}

/// Zero-based page coordinates.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PageRequest {
    pub page: usize,
    pub size: usize
}

impl PageRequest {
    pub fn new(page: usize, size: usize) -> Self {
        Self { page, size }
    }

    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.size)
    }

    pub fn next(&self) -> Self {
        Self { page: self.page + 1, size: self.size }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: usize,
    pub size: usize,
    pub total_elements: usize,
    pub total_pages: usize
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: &PageRequest, total_elements: usize) -> Self {
        let total_pages = if request.size == 0 { 0 } else { total_elements.div_ceil(request.size) };

        Self {
            content,
            page: request.page,
            size: request.size,
            total_elements,
            total_pages
        }
    }

    pub fn has_next(&self) -> bool {
        self.page + 1 < self.total_pages
    }
}
