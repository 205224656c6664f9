use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use csv::StringRecord;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::models::{ParseError, TransactionRecord};

pub const FIELD_NAMES: [&str; 6] = ["ACCOUNT_NUMBER", "TRX_AMOUNT", "DESCRIPTION", "TRX_DATE", "TRX_TIME", "CUSTOMER_ID"];

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";
const SHORT_TIME_FORMAT: &str = "%H:%M";

// chrono accepts single-digit fields, so the exact shape is checked first. `d` is any ASCII digit.
const DATE_LAYOUT: &str = "dddd-dd-dd";
const TIME_LAYOUT: &str = "dd:dd:dd";
const SHORT_TIME_LAYOUT: &str = "dd:dd";

/// Turns delimited lines into [`TransactionRecord`]s.
///
/// Strict: a line must carry exactly one value per entry in [`FIELD_NAMES`], dates must be
/// `YYYY-MM-DD`, times `HH:MM:SS` (or `HH:MM`), and amounts must fit a [`Decimal`] without rounding.
/// Values are trimmed before conversion.
#[derive(Debug, Clone, Copy)]
pub struct RecordParser {
    delimiter: u8
}

impl RecordParser {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    pub fn parse_line(&self, line: &str, line_number: u64) -> Result<TransactionRecord, ParseError> {
        let fields: Vec<&str> = line.split(char::from(self.delimiter)).collect();

        self.parse_fields(&fields, line, line_number)
    }

    /// Parses a record already split by the CSV reader.
    pub fn parse_record(&self, record: &StringRecord, line_number: u64) -> Result<TransactionRecord, ParseError> {
        let fields: Vec<&str> = record.iter().collect();
        let delimiter = char::from(self.delimiter).to_string();
        let input = fields.join(delimiter.as_str());

        self.parse_fields(&fields, &input, line_number)
    }

    fn parse_fields(&self, fields: &[&str], input: &str, line_number: u64) -> Result<TransactionRecord, ParseError> {
        if fields.len() != FIELD_NAMES.len() {
            return Err(ParseError::FieldCount {
                line_number,
                input: input.to_string(),
                expected: FIELD_NAMES.len(),
                found: fields.len()
            });
        }

        let field = FieldReader { fields, input, line_number };

        let account_number = field.read(0, i64::from_str)?;
        let amount = field.read(1, Decimal::from_str_exact)?;
        let description = field.value(2).to_string();
        let date = field.read(3, parse_date)?;
        let time = field.read(4, parse_time)?;
        let customer_id = field.read(5, i64::from_str)?;

        Ok(TransactionRecord::new(
            account_number,
            amount,
            description,
            NaiveDateTime::new(date, time),
            customer_id
        ))
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    if !matches_layout(value, DATE_LAYOUT) {
        return Err("expected YYYY-MM-DD".to_string());
    }

    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|error| error.to_string())
}

fn parse_time(value: &str) -> Result<NaiveTime, String> {
    let format = if matches_layout(value, TIME_LAYOUT) {
        TIME_FORMAT
    } else if matches_layout(value, SHORT_TIME_LAYOUT) {
        SHORT_TIME_FORMAT
    } else {
        return Err("expected HH:MM:SS".to_string());
    };

    let time = NaiveTime::parse_from_str(value, format).map_err(|error| error.to_string())?;

    // Second 60 parses as a leap second.
    if time.nanosecond() >= 1_000_000_000 {
        return Err("seconds must be below 60".to_string());
    }

    Ok(time)
}

fn matches_layout(value: &str, layout: &str) -> bool {
    value.len() == layout.len()
        && value.bytes().zip(layout.bytes()).all(|(actual, expected)| match expected {
            b'd' => actual.is_ascii_digit(),
            _ => actual == expected
        })
}

struct FieldReader<'a> {
    fields: &'a [&'a str],
    input: &'a str,
    line_number: u64
}

impl FieldReader<'_> {
    fn value(&self, index: usize) -> &str {
        self.fields[index].trim()
    }

    fn read<T, E, F>(&self, index: usize, convert: F) -> Result<T, ParseError>
    where
        F: FnOnce(&str) -> Result<T, E>,
        E: std::fmt::Display,
    {
        let value = self.value(index);

        convert(value).map_err(|error| ParseError::InvalidField {
            line_number: self.line_number,
            input: self.input.to_string(),
            field: FIELD_NAMES[index],
            value: value.to_string(),
            reason: error.to_string()
        })
    }
}
