use rust_decimal::Decimal;

use crate::models::{TransactionRecord, ValidationError};

/// Stateless business-rule check applied to every parsed record.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordValidator;

impl RecordValidator {
    pub fn new() -> Self {
        Self
    }

    /// Marks the record processed when it passes. A rejected record is left untouched.
    pub fn validate(&self, record: &mut TransactionRecord) -> Result<(), ValidationError> {
        if record.amount < Decimal::ZERO {
            return Err(ValidationError::negative_amount(record));
        }

        record.processed = true;

        Ok(())
    }
}
