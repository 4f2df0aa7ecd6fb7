use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::sample::LabelRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The source produced no text for this index.
    NoText,
    /// The line could not be composed at all.
    Compose,
    /// Every attempt failed the quality gate.
    Rejected,
    Storage,
    WorkerFault,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub index: u64,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ShardReport {
    pub shard: usize,
    pub first_index: u64,
    pub requested: usize,
    pub produced: usize,
    pub rejected: usize,
    pub retries: usize,
    pub attempt: usize,
    pub cancelled: bool,
    pub failures: Vec<FailureRecord>,
    #[serde(skip)]
    pub records: Vec<LabelRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Complete,
    Partial,
    Failed,
    Cancelled,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_samples: usize,
    pub avg_text_length: f64,
    pub min_text_length: usize,
    pub max_text_length: usize,
    pub unique_texts: usize,
}

impl Statistics {
    pub fn from_records(records: &[LabelRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }
        let lengths: Vec<usize> = records.iter().map(|r| r.text.chars().count()).collect();
        let unique: BTreeSet<&str> = records.iter().map(|r| r.text.as_str()).collect();
        Self {
            total_samples: records.len(),
            avg_text_length: lengths.iter().sum::<usize>() as f64 / lengths.len() as f64,
            min_text_length: lengths.iter().copied().min().unwrap_or(0),
            max_text_length: lengths.iter().copied().max().unwrap_or(0),
            unique_texts: unique.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub status: BatchStatus,
    pub requested: usize,
    pub produced: usize,
    pub rejected: usize,
    pub retries: usize,
    pub failures: Vec<FailureRecord>,
    /// Shards that kept faulting after every re-queue.
    pub unresolved_shards: Vec<usize>,
    pub shards: Vec<ShardReport>,
    pub statistics: Statistics,
}

impl BatchReport {
    pub fn aggregate(
        requested: usize,
        mut shards: Vec<ShardReport>,
        unresolved_shards: Vec<usize>,
        extra_failures: Vec<FailureRecord>,
        cancelled: bool,
    ) -> Self {
        shards.sort_by_key(|shard| shard.shard);
        let produced = shards.iter().map(|s| s.produced).sum();
        let rejected = shards.iter().map(|s| s.rejected).sum();
        let retries = shards.iter().map(|s| s.retries).sum();
        let mut failures: Vec<FailureRecord> = shards
            .iter()
            .flat_map(|s| s.failures.iter().cloned())
            .chain(extra_failures)
            .collect();
        failures.sort_by_key(|failure| failure.index);
        let statistics = Statistics::from_records(&Self::collect_records(&shards));

        let status = if cancelled || shards.iter().any(|s| s.cancelled) {
            BatchStatus::Cancelled
        } else if produced == requested {
            BatchStatus::Complete
        } else if produced == 0 {
            BatchStatus::Failed
        } else {
            BatchStatus::Partial
        };

        Self {
            status,
            requested,
            produced,
            rejected,
            retries,
            failures,
            unresolved_shards,
            shards,
            statistics,
        }
    }

    fn collect_records(shards: &[ShardReport]) -> Vec<LabelRecord> {
        let mut records: Vec<LabelRecord> =
            shards.iter().flat_map(|s| s.records.iter().cloned()).collect();
        records.sort_by_key(|record| record.metadata.index);
        records
    }

    /// Every written label, in sample order.
    pub fn records(&self) -> Vec<LabelRecord> {
        Self::collect_records(&self.shards)
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("status: {}", self.status),
            format!(
                "produced: {} / {} (rejected: {}, retries: {})",
                self.produced, self.requested, self.rejected, self.retries
            ),
        ];
        if !self.failures.is_empty() {
            lines.push(format!("failures: {}", self.failures.len()));
        }
        if !self.unresolved_shards.is_empty() {
            let shards: Vec<String> = self.unresolved_shards.iter().map(|s| s.to_string()).collect();
            lines.push(format!("unresolved shards: {}", shards.join(", ")));
        }
        if self.statistics.total_samples > 0 {
            lines.push(format!(
                "text length: avg {:.1}, min {}, max {}, unique {}",
                self.statistics.avg_text_length,
                self.statistics.min_text_length,
                self.statistics.max_text_length,
                self.statistics.unique_texts
            ));
        }
        lines.join("\n")
    }
}
