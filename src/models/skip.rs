use std::fmt;
use std::fmt::{Display, Formatter};

/// The pipeline stage at which an input was skipped.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum SkipStage {
    Read,
    Process,
    Write
}

impl Display for SkipStage {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            SkipStage::Read => "read",
            SkipStage::Process => "process",
            SkipStage::Write => "write"
        };

        formatter.write_str(name)
    }
}

/// Diagnostic entry for one skipped line or record.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SkipRecord {
    pub stage: SkipStage,
    pub line_number: Option<u64>,
    pub input: String,
    pub cause: String
}
