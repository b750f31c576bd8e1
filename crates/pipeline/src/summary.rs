//! End-of-run statistics.

use std::fmt;
use std::time::Duration;

use sketchcast_core::types::GenerationResult;

/// Counts and timing for one finished batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
    /// `(name, error)` for every failed result, in index order.
    pub failures: Vec<(String, String)>,
}

impl BatchSummary {
    pub fn from_results(results: &[GenerationResult], elapsed: Duration) -> Self {
        let failures: Vec<(String, String)> = results
            .iter()
            .filter(|r| !r.success)
            .map(|r| (r.name.clone(), r.error.clone().unwrap_or_default()))
            .collect();

        Self {
            total: results.len(),
            succeeded: results.len() - failures.len(),
            failed: failures.len(),
            elapsed,
            failures,
        }
    }

    /// Mean wall time per item, `None` for an empty batch.
    pub fn average(&self) -> Option<Duration> {
        u32::try_from(self.total)
            .ok()
            .filter(|&n| n > 0)
            .map(|n| self.elapsed / n)
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total: {}", self.total)?;
        writeln!(f, "Successful: {}", self.succeeded)?;
        writeln!(f, "Failed: {}", self.failed)?;
        write!(f, "Total time: {:.1}s", self.elapsed.as_secs_f64())?;
        if let Some(avg) = self.average() {
            write!(f, "\nAverage per item: {:.1}s", avg.as_secs_f64())?;
        }
        if !self.failures.is_empty() {
            write!(f, "\nFailures:")?;
            for (name, error) in &self.failures {
                write!(f, "\n  - {name}: {error}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn result(index: usize, success: bool) -> GenerationResult {
        GenerationResult {
            index,
            name: format!("item-{index}"),
            success,
            output_path: success.then(|| PathBuf::from(format!("scene-{}.png", index + 1))),
            error: (!success).then(|| "boom".to_string()),
        }
    }

    #[test]
    fn counts_and_average() {
        let results = vec![result(0, true), result(1, false), result(2, true), result(3, true)];
        let summary = BatchSummary::from_results(&results, Duration::from_secs(20));

        assert_eq!((summary.total, summary.succeeded, summary.failed), (4, 3, 1));
        assert_eq!(summary.average(), Some(Duration::from_secs(5)));
        assert_eq!(summary.failures, vec![("item-1".to_string(), "boom".to_string())]);
        assert!(!summary.all_succeeded());
    }

    #[test]
    fn empty_batch_has_no_average() {
        let summary = BatchSummary::from_results(&[], Duration::from_secs(1));
        assert_eq!(summary.average(), None);
        assert!(summary.all_succeeded());
    }

    #[test]
    fn display_lists_failures() {
        let summary = BatchSummary::from_results(&[result(0, false)], Duration::from_secs(3));
        let text = summary.to_string();
        assert!(text.contains("Failed: 1"));
        assert!(text.contains("  - item-0: boom"));
    }
}
