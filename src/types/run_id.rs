use chrono::Utc;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicI64, Ordering};

static LAST_ISSUED: AtomicI64 = AtomicI64::new(0);

/// Identifies one ingestion run.
///
/// Derived from the wall clock in milliseconds. Two runs started within the same millisecond
/// in one process still receive distinct, increasing tokens.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RunId(i64);

impl RunId {
    pub fn next() -> Self {
        let now = Utc::now().timestamp_millis();
        let mut last = LAST_ISSUED.load(Ordering::Relaxed);

        loop {
            let candidate = if now > last { now } else { last + 1 };

            match LAST_ISSUED.compare_exchange_weak(last, candidate, Ordering::SeqCst, Ordering::Relaxed) {
                Ok(_) => return RunId(candidate),
                Err(actual) => last = actual
            }
        }
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }
}

impl Display for RunId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "run-{}", self.0)
    }
}
