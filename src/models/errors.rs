use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::TransactionRecord;
use crate::types::AccountNumber;

/// A malformed input line. Fatal to the line only.
#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum ParseError {
    #[error("Line [{line_number}] has [{found}] fields but [{expected}] were expected: \"{input}\"")]
    FieldCount {
        line_number: u64,
        input: String,
        expected: usize,
        found: usize
    },
    #[error("Line [{line_number}] has an invalid [{field}] value '{value}' ({reason}): \"{input}\"")]
    InvalidField {
        line_number: u64,
        input: String,
        field: &'static str,
        value: String,
        reason: String
    },
    #[error("Line [{line_number}] could not be read: {reason}")]
    Unreadable {
        line_number: u64,
        reason: String
    }
}

impl ParseError {
    pub fn line_number(&self) -> u64 {
        match self {
            ParseError::FieldCount { line_number, .. }
            | ParseError::InvalidField { line_number, .. }
            | ParseError::Unreadable { line_number, .. } => *line_number
        }
    }

    /// The offending raw line, empty when the line could not be decoded at all.
    pub fn input(&self) -> &str {
        match self {
            ParseError::FieldCount { input, .. } | ParseError::InvalidField { input, .. } => input,
            ParseError::Unreadable { .. } => ""
        }
    }
}

/// A parsed record that breaks a business rule.
#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum ValidationError {
    #[error("Transaction amount must not be negative: [{amount}] for account [{account_number}]")]
    NegativeAmount {
        account_number: AccountNumber,
        amount: Decimal
    }
}

impl ValidationError {
    pub fn negative_amount(record: &TransactionRecord) -> Self {
        Self::NegativeAmount {
            account_number: record.account_number,
            amount: record.amount
        }
    }
}
