use std::fmt;
use std::fmt::{Display, Formatter};

use crate::pipeline::ChunkReport;

/// Aggregate counters for one run.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct RunSummary {
    pub read_count: usize,
    pub read_skips: usize,
    pub process_skips: usize,
    pub duplicates_in_run: usize,
    pub duplicates_persisted: usize,
    pub write_count: usize,
    pub write_skips: usize,
    pub commits: usize,
    pub rollbacks: usize,
    pub chunks: usize
}

impl RunSummary {
    pub fn absorb(&mut self, report: &ChunkReport) {
        self.read_count += report.items;
        self.process_skips += report.process_skips;
        self.duplicates_in_run += report.duplicates_in_run;
        self.duplicates_persisted += report.duplicates_persisted;
        self.write_count += report.written;
        self.write_skips += report.write_skips;
        self.commits += report.commits;
        self.rollbacks += report.rollbacks;
        self.chunks += 1;
    }

    pub fn skip_count(&self) -> usize {
        self.read_skips + self.process_skips + self.write_skips
    }
}

impl Display for RunSummary {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "read={} written={} skipped(read={}, process={}, write={}) duplicates(run={}, persisted={}) chunks={} commits={} rollbacks={}",
            self.read_count,
            self.write_count,
            self.read_skips,
            self.process_skips,
            self.write_skips,
            self.duplicates_in_run,
            self.duplicates_persisted,
            self.chunks,
            self.commits,
            self.rollbacks
        )
    }
}
