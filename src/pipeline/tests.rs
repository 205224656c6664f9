use super::{
    classify, Admission, Chunk, ChunkProcessor, Deduplicator, Disposition, PipelineError, RecordParser,
    RecordValidator, RunSummary, SkipListener, SkipPolicy, SkipTracker, StageError, DEFAULT_TRAIL_CAPACITY
};
use crate::models::{NaturalKey, ParseError, SkipStage, TransactionRecord, ValidationError};
use crate::storage::{MemoryStore, Page, PageRequest, StoreError, TransactionFilter, TransactionStore};
use crate::types::RecordId;

use anyhow::{anyhow, Result};
use chrono::NaiveDateTime;
use csv::StringRecord;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;
use std::sync::Arc;
use std::thread;

fn create_record(account_number: i64, amount: &str, description: &str, time: &str, customer_id: i64) -> Result<TransactionRecord> {
    Ok(TransactionRecord::new(
        account_number,
        Decimal::from_str(amount)?,
        description,
        NaiveDateTime::parse_from_str(time, "%Y-%m-%dT%H:%M:%S")?,
        customer_id
    ))
}

fn create_processor(store: Arc<MemoryStore>, tracker: Arc<SkipTracker>) -> ChunkProcessor<MemoryStore> {
    let deduplicator = Arc::new(Deduplicator::new(store.clone()));

    ChunkProcessor::new(store, deduplicator, tracker, Arc::new(SkipPolicy::unlimited()))
}

/// Store whose every call fails the way an unreachable database would.
struct UnavailableStore;

impl TransactionStore for UnavailableStore {
    fn exists(&self, _key: &NaturalKey) -> Result<bool, StoreError> {
        Err(StoreError::Poisoned)
    }

    fn save_all(&self, _records: &[TransactionRecord]) -> Result<Vec<TransactionRecord>, StoreError> {
        Err(StoreError::Poisoned)
    }

    fn find_by_id(&self, _id: RecordId) -> Result<Option<TransactionRecord>, StoreError> {
        Err(StoreError::Poisoned)
    }

    fn find_page(&self, _filter: &TransactionFilter, _request: &PageRequest) -> Result<Page<TransactionRecord>, StoreError> {
        Err(StoreError::Poisoned)
    }

    fn update(&self, _record: &TransactionRecord) -> Result<TransactionRecord, StoreError> {
        Err(StoreError::Poisoned)
    }
}

#[test]
fn test_parser_combines_date_and_time_into_one_timestamp() -> Result<()> {
    let parser = RecordParser::new(b'|');
    let record = parser.parse_line("8872838283|123.00|FUND TRANSFER|2019-09-12|11:11:11|222", 2)?;

    assert_eq!(record.account_number, 8872838283);
    assert_eq!(record.amount, dec!(123.00));
    assert_eq!(record.description, "FUND TRANSFER");
    assert_eq!(record.timestamp, NaiveDateTime::parse_from_str("2019-09-12T11:11:11", "%Y-%m-%dT%H:%M:%S")?);
    assert_eq!(record.customer_id, 222);
    assert!(!record.processed);

    Ok(())
}

#[test]
fn test_parser_trims_values_and_accepts_short_times() -> Result<()> {
    let parser = RecordParser::new(b'|');
    let record = parser.parse_line(" 1001 | 50.00 | x |2024-01-01| 10:00 |7", 2)?;

    assert_eq!(record.account_number, 1001);
    assert_eq!(record.description, "x");
    assert_eq!(record.timestamp, NaiveDateTime::parse_from_str("2024-01-01T10:00:00", "%Y-%m-%dT%H:%M:%S")?);

    Ok(())
}

#[test]
fn test_parser_is_strict_about_field_count() {
    let parser = RecordParser::new(b'|');

    let too_few = parser.parse_line("1001|50.00|x|2024-01-01|10:00:00", 4);
    let too_many = parser.parse_line("1001|50.00|x|2024-01-01|10:00:00|7|extra", 5);

    assert!(matches!(too_few, Err(ParseError::FieldCount { expected: 6, found: 5, line_number: 4, .. })));
    assert!(matches!(too_many, Err(ParseError::FieldCount { expected: 6, found: 7, line_number: 5, .. })));
}

#[test]
fn test_parser_reports_the_offending_field_and_line() {
    let parser = RecordParser::new(b'|');
    let cases = vec![
        ("abc|50.00|x|2024-01-01|10:00:00|7", "ACCOUNT_NUMBER"),
        ("1001|fifty|x|2024-01-01|10:00:00|7", "TRX_AMOUNT"),
        ("1001|50.00|x|2024-13-01|10:00:00|7", "TRX_DATE"),
        ("1001|50.00|x|2024-01-01|25:00:00|7", "TRX_TIME"),
        ("1001|50.00|x|2024-01-01|10:00:00|", "CUSTOMER_ID")
    ];

    for (line, expected_field) in cases {
        match parser.parse_line(line, 9) {
            Err(ParseError::InvalidField { field, input, line_number, .. }) => {
                assert_eq!(field, expected_field);
                assert_eq!(input, line);
                assert_eq!(line_number, 9);
            }
            other => panic!("expected an invalid [{expected_field}] error, got {other:?}")
        }
    }
}

#[test]
fn test_parser_requires_zero_padded_dates_and_whole_seconds() {
    let parser = RecordParser::new(b'|');
    let cases = vec![
        ("1001|50.00|x|2024-1-1|10:00:00|7", "TRX_DATE"),
        ("1001|50.00|x|2024-01-01|1:2:3|7", "TRX_TIME"),
        ("1001|50.00|x|2024-01-01|10:00:00.5|7", "TRX_TIME"),
        ("1001|50.00|x|2024-01-01|23:59:60|7", "TRX_TIME")
    ];

    for (line, expected_field) in cases {
        match parser.parse_line(line, 3) {
            Err(ParseError::InvalidField { field, .. }) => assert_eq!(field, expected_field, "{line}"),
            other => panic!("expected an invalid [{expected_field}] error for {line}, got {other:?}")
        }
    }
}

#[test]
fn test_parser_rejects_amounts_a_decimal_would_round() -> Result<()> {
    let parser = RecordParser::new(b'|');

    let first = parser.parse_line("1001|0.12345678901234567890123456781|x|2024-01-01|10:00:00|7", 2);
    let second = parser.parse_line("1001|0.12345678901234567890123456782|x|2024-01-01|10:00:00|7", 3);

    assert!(matches!(first, Err(ParseError::InvalidField { field: "TRX_AMOUNT", .. })));
    assert!(matches!(second, Err(ParseError::InvalidField { field: "TRX_AMOUNT", .. })));

    let precise = parser.parse_line("1001|0.1234567890123456789012345678|x|2024-01-01|10:00:00|7", 4)?;

    assert_eq!(precise.amount, Decimal::from_str("0.1234567890123456789012345678")?);

    Ok(())
}

#[test]
fn test_parser_accepts_records_split_by_the_csv_reader() -> Result<()> {
    let parser = RecordParser::new(b'|');
    let fields = StringRecord::from(vec!["1001", "50.00", "x", "2024-01-01", "10:00:00", "7"]);

    let record = parser.parse_record(&fields, 2)?;

    assert_eq!(record.account_number, 1001);

    let short = StringRecord::from(vec!["1001", "50.00"]);

    match parser.parse_record(&short, 3) {
        Err(error) => assert_eq!(error.input(), "1001|50.00"),
        Ok(record) => panic!("expected a parse error, got {record}")
    }

    Ok(())
}

#[test]
fn test_validator_rejects_negative_amounts_without_marking_processed() -> Result<()> {
    let validator = RecordValidator::new();
    let mut record = create_record(1002, "-5.00", "y", "2024-01-01T10:05:00", 8)?;

    let result = validator.validate(&mut record);

    assert!(matches!(result, Err(ValidationError::NegativeAmount { .. })));
    assert!(!record.processed);

    Ok(())
}

#[test]
fn test_validator_accepts_zero_and_marks_processed() -> Result<()> {
    let validator = RecordValidator::new();
    let mut record = create_record(1002, "0.00", "y", "2024-01-01T10:05:00", 8)?;

    validator.validate(&mut record)?;

    assert!(record.processed);
    assert_eq!(record.amount, dec!(0.00));

    Ok(())
}

#[test]
fn test_deduplicator_rejects_repeats_within_a_run() -> Result<()> {
    let deduplicator = Deduplicator::new(Arc::new(MemoryStore::new()));
    let record = create_record(1001, "50.00", "x", "2024-01-01T10:00:00", 7)?;

    assert_eq!(deduplicator.admit(&record)?, Admission::Accepted);
    assert_eq!(deduplicator.admit(&record)?, Admission::DuplicateInRun);
    assert_eq!(deduplicator.seen_count(), 1);

    Ok(())
}

#[test]
fn test_deduplicator_rejects_records_persisted_by_earlier_runs() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let record = create_record(1001, "50.00", "x", "2024-01-01T10:00:00", 7)?;
    store.save_all(&[record.clone()])?;

    let deduplicator = Deduplicator::new(store);

    assert_eq!(deduplicator.admit(&record)?, Admission::AlreadyPersisted);

    Ok(())
}

#[test]
fn test_deduplicator_admits_a_key_once_under_concurrency() -> Result<()> {
    let deduplicator = Arc::new(Deduplicator::new(Arc::new(MemoryStore::new())));
    let record = create_record(1001, "50.00", "x", "2024-01-01T10:00:00", 7)?;

    let handles: Vec<_> = (0..8).map(|_| {
        let deduplicator = deduplicator.clone();
        let record = record.clone();
        thread::spawn(move || deduplicator.admit(&record))
    }).collect();

    let mut accepted = 0;

    for handle in handles {
        let admission = handle.join().map_err(|_| anyhow!("admission thread panicked"))??;

        if admission == Admission::Accepted {
            accepted += 1;
        }
    }

    assert_eq!(accepted, 1);

    Ok(())
}

#[test]
fn test_classification_separates_record_faults_from_store_faults() {
    let parse = ParseError::Unreadable { line_number: 1, reason: "bad".to_string() };
    let validation = ValidationError::NegativeAmount { account_number: 1, amount: dec!(-1) };
    let constraint = StoreError::Constraint("too long".to_string());
    let poisoned = StoreError::Poisoned;

    assert_eq!(classify(&StageError::Parse(&parse)), Disposition::Skip);
    assert_eq!(classify(&StageError::Validation(&validation)), Disposition::Skip);
    assert_eq!(classify(&StageError::Write(&constraint)), Disposition::Skip);
    assert_eq!(classify(&StageError::Write(&poisoned)), Disposition::Fail);
}

#[test]
fn test_skip_policy_enforces_an_optional_limit() {
    let error = ParseError::Unreadable { line_number: 1, reason: "bad".to_string() };

    let unlimited = SkipPolicy::unlimited();
    for _ in 0..10_000 {
        assert!(unlimited.admit_skip(StageError::Parse(&error)).is_ok());
    }
    assert_eq!(unlimited.skipped(), 10_000);

    let limited = SkipPolicy::new(Some(2));
    assert!(limited.admit_skip(StageError::Parse(&error)).is_ok());
    assert!(limited.admit_skip(StageError::Parse(&error)).is_ok());
    assert!(matches!(limited.admit_skip(StageError::Parse(&error)), Err(PipelineError::SkipLimitExceeded { limit: 2 })));
}

#[test]
fn test_skip_policy_refuses_fatal_store_errors() {
    let policy = SkipPolicy::unlimited();
    let error = StoreError::Poisoned;

    let result = policy.admit_skip(StageError::Write(&error));

    assert!(matches!(result, Err(PipelineError::NotSkippable { stage: SkipStage::Write, .. })));
    assert_eq!(policy.skipped(), 0);
}

#[test]
fn test_tracker_records_each_skip_with_stage_and_cause() -> Result<()> {
    let tracker = SkipTracker::new();
    let record = create_record(1002, "-5.00", "y", "2024-01-01T10:05:00", 8)?;

    tracker.on_skip_in_read(&ParseError::FieldCount { line_number: 3, input: "1|2".to_string(), expected: 6, found: 2 });
    tracker.on_skip_in_process(&record, &ValidationError::negative_amount(&record));
    tracker.on_skip_in_write(&record, &StoreError::Constraint("too long".to_string()));
    tracker.on_duplicate(&record, Admission::DuplicateInRun);

    let entries = tracker.entries();

    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].stage, SkipStage::Read);
    assert_eq!(entries[0].line_number, Some(3));
    assert_eq!(entries[0].input, "1|2");
    assert_eq!(entries[1].stage, SkipStage::Process);
    assert!(entries[1].cause.contains("must not be negative"));
    assert_eq!(tracker.count(SkipStage::Write), 1);

    Ok(())
}

#[test]
fn test_tracker_caps_its_trail_but_keeps_counting() {
    let tracker = SkipTracker::with_capacity(2);

    for line_number in 1..=5 {
        tracker.on_skip_in_read(&ParseError::FieldCount { line_number, input: "1|2".to_string(), expected: 6, found: 2 });
    }

    let entries = tracker.entries();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].line_number, Some(2));
    assert_eq!(tracker.count(SkipStage::Read), 5);
    assert_eq!(tracker.count(SkipStage::Write), 0);

    let unbounded_run = SkipTracker::default();

    for line_number in 1..=(DEFAULT_TRAIL_CAPACITY as u64 + 10) {
        unbounded_run.on_skip_in_read(&ParseError::FieldCount { line_number, input: String::new(), expected: 6, found: 1 });
    }

    assert_eq!(unbounded_run.entries().len(), DEFAULT_TRAIL_CAPACITY);
    assert_eq!(unbounded_run.count(SkipStage::Read), DEFAULT_TRAIL_CAPACITY + 10);
}

#[test]
fn test_chunk_persists_only_valid_unique_records_in_order() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let tracker = Arc::new(SkipTracker::new());
    let processor = create_processor(store.clone(), tracker.clone());

    let chunk = Chunk {
        sequence: 1,
        records: vec![
            create_record(1001, "50.00", "x", "2024-01-01T10:00:00", 7)?,
            create_record(1001, "50.00", "x", "2024-01-01T10:00:00", 7)?,
            create_record(1002, "-5.00", "y", "2024-01-01T10:05:00", 8)?,
            create_record(1003, "30.00", "z", "2024-01-01T10:10:00", 9)?
        ]
    };

    let report = processor.process(chunk)?;

    assert_eq!(report.items, 4);
    assert_eq!(report.written, 2);
    assert_eq!(report.duplicates_in_run, 1);
    assert_eq!(report.process_skips, 1);
    assert_eq!(report.commits, 1);
    assert_eq!(report.rollbacks, 0);

    let persisted = store.find_page(&TransactionFilter::default(), &PageRequest::default())?.content;
    let accounts: Vec<i64> = persisted.iter().map(|record| record.account_number).collect();

    assert_eq!(accounts, vec![1001, 1003]);
    assert!(persisted.iter().all(|record| record.processed && record.version == Some(0)));
    assert_eq!(tracker.count(SkipStage::Process), 1);

    Ok(())
}

#[test]
fn test_chunk_write_failure_isolates_the_offending_record() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let tracker = Arc::new(SkipTracker::new());
    let processor = create_processor(store.clone(), tracker.clone());

    let chunk = Chunk {
        sequence: 1,
        records: vec![
            create_record(1001, "10.00", "a", "2024-01-01T10:00:00", 7)?,
            create_record(1002, "20.00", &"b".repeat(300), "2024-01-01T10:01:00", 7)?,
            create_record(1003, "30.00", "c", "2024-01-01T10:02:00", 7)?
        ]
    };

    let report = processor.process(chunk)?;

    assert_eq!(report.written, 2);
    assert_eq!(report.write_skips, 1);
    assert_eq!(report.commits, 2);
    assert_eq!(report.rollbacks, 2);
    assert_eq!(store.len()?, 2);

    let skips = tracker.entries();

    assert_eq!(skips.len(), 1);
    assert_eq!(skips[0].stage, SkipStage::Write);

    Ok(())
}

#[test]
fn test_chunk_fails_when_the_store_is_unavailable() -> Result<()> {
    let store = Arc::new(UnavailableStore);
    let tracker = Arc::new(SkipTracker::new());
    let deduplicator = Arc::new(Deduplicator::new(store.clone()));
    let processor = ChunkProcessor::new(store, deduplicator, tracker.clone(), Arc::new(SkipPolicy::unlimited()));

    let chunk = Chunk {
        sequence: 1,
        records: vec![create_record(1001, "10.00", "a", "2024-01-01T10:00:00", 7)?]
    };

    assert!(matches!(processor.process(chunk), Err(PipelineError::Store(StoreError::Poisoned))));
    assert!(tracker.entries().is_empty());

    Ok(())
}

#[test]
fn test_run_summary_absorbs_chunk_reports() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let processor = create_processor(store, Arc::new(SkipTracker::new()));

    let mut summary = RunSummary::default();
    summary.read_skips = 2;

    for sequence in 0..2 {
        let chunk = Chunk {
            sequence,
            records: vec![
                create_record(1001, "10.00", "a", "2024-01-01T10:00:00", 7)?,
                create_record(2000 + sequence as i64, "-1.00", "neg", "2024-01-01T10:00:00", 7)?
            ]
        };

        summary.absorb(&processor.process(chunk)?);
    }

    assert_eq!(summary.chunks, 2);
    assert_eq!(summary.read_count, 4);
    assert_eq!(summary.write_count, 1);
    assert_eq!(summary.duplicates_in_run, 1);
    assert_eq!(summary.process_skips, 2);
    assert_eq!(summary.skip_count(), 4);

    Ok(())
}
