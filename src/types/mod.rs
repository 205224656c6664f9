mod run_id;

pub use run_id::RunId;

pub type AccountNumber = i64;
pub type CustomerId = i64;
pub type RecordId = i64;
pub type Version = i32;
