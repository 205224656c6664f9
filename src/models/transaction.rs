use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::fmt::{Display, Formatter};

use crate::models::TIMESTAMP_FORMAT;
use crate::types::{AccountNumber, CustomerId, RecordId, Version};

/// A single financial transaction, from the moment it is parsed until it is persisted.
///
/// `id` and `version` are assigned by the store and stay `None` until the record has been
/// committed. `processed` flips to `true` once the record passes validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRecord {
    pub id: Option<RecordId>,
    pub account_number: AccountNumber,
    pub amount: Decimal,
    pub description: String,
    pub timestamp: NaiveDateTime,
    pub customer_id: CustomerId,
    pub version: Option<Version>,
    pub processed: bool
}

impl TransactionRecord {
    pub fn new(
        account_number: AccountNumber,
        amount: Decimal,
        description: impl Into<String>,
        timestamp: NaiveDateTime,
        customer_id: CustomerId
    ) -> Self {
        Self {
            id: None,
            account_number,
            amount,
            description: description.into(),
            timestamp,
            customer_id,
            version: None,
            processed: false
        }
    }

    /// The five-field identity used for duplicate detection.
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            account_number: self.account_number,
            amount: self.amount.normalize(),
            description: self.description.clone(),
            timestamp: self.timestamp,
            customer_id: self.customer_id
        }
    }
}

impl Display for TransactionRecord {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "Transaction(id={:?}, account={}, amount={}, description=\"{}\", timestamp={}, customer={})",
            self.id,
            self.account_number,
            self.amount,
            self.description,
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.customer_id
        )
    }
}

/// Composite natural key: account number, amount, description, timestamp and customer id.
///
/// The amount is normalized so that `50.0` and `50.00` identify the same transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub account_number: AccountNumber,
    pub amount: Decimal,
    pub description: String,
    pub timestamp: NaiveDateTime,
    pub customer_id: CustomerId
}

impl Display for NaturalKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{}|{}|{}|{}|{}",
            self.account_number,
            self.amount,
            self.description,
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.customer_id
        )
    }
}
