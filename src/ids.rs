use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::anyhow;
use chrono::Utc;
use uuid::Uuid;

/// How item identifiers are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdStrategy {
    /// Millisecond timestamp, bumped past the last issued value when the clock has not advanced
    Timestamp,
    /// Random UUID v4
    Uuid,
}

impl FromStr for IdStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "timestamp" => Ok(IdStrategy::Timestamp),
            "uuid" => Ok(IdStrategy::Uuid),
            other => Err(anyhow!("expected one of: timestamp, uuid, got '{}'", other)),
        }
    }
}

/// Issues item ids that are unique for the lifetime of the generator
///
/// The timestamp strategy never returns the same value twice, even when
/// several ids are requested inside one millisecond: each id is
/// `max(now_ms, last + 1)`.
#[derive(Debug)]
pub struct IdGenerator {
    strategy: IdStrategy,
    last: AtomicU64,
}

impl IdGenerator {
    pub fn new(strategy: IdStrategy) -> Self {
        Self {
            strategy,
            last: AtomicU64::new(0),
        }
    }

    pub fn next_id(&self) -> String {
        match self.strategy {
            IdStrategy::Timestamp => self.next_timestamp().to_string(),
            IdStrategy::Uuid => Uuid::new_v4().to_string(),
        }
    }

    fn next_timestamp(&self) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(current + 1);
            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => current = actual,
            }
        }
    }
}
