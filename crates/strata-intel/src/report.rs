//! Per-stage outcome bookkeeping for a sync run.

use std::time::Duration;

/// How one named stage of the run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Completed,
    /// Stage not run, with the reason (not requested, no usable source).
    Skipped(String),
    /// Stage raised; the error is contained here and the run continued.
    Failed(String),
}

/// Record of one stage's execution.
#[derive(Debug, Clone)]
pub struct StageSummary {
    pub name: String,
    pub outcome: StageOutcome,
    pub duration: Duration,
}

/// Aggregate outcome of a full sync run.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub stages: Vec<StageSummary>,
}

impl SyncReport {
    pub fn record(&mut self, name: &str, outcome: StageOutcome, duration: Duration) {
        self.stages.push(StageSummary {
            name: name.to_string(),
            outcome,
            duration,
        });
    }

    /// Names of stages whose failure was contained.
    pub fn failed_stages(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|s| matches!(s.outcome, StageOutcome::Failed(_)))
            .map(|s| s.name.as_str())
            .collect()
    }

    /// True when every executed stage completed.
    pub fn is_success(&self) -> bool {
        self.failed_stages().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_stages_are_surfaced() {
        let mut report = SyncReport::default();
        report.record("aws", StageOutcome::Completed, Duration::from_secs(1));
        report.record(
            "azure",
            StageOutcome::Failed("boom".to_string()),
            Duration::from_secs(1),
        );
        report.record(
            "gcp",
            StageOutcome::Skipped("not requested".to_string()),
            Duration::ZERO,
        );

        assert_eq!(report.failed_stages(), vec!["azure"]);
        assert!(!report.is_success());
    }

    #[test]
    fn skips_do_not_fail_the_run() {
        let mut report = SyncReport::default();
        report.record(
            "jamf",
            StageOutcome::Skipped("no settings".to_string()),
            Duration::ZERO,
        );
        assert!(report.is_success());
    }
}
