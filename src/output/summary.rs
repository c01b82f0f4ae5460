//! Run summary and console output

use crate::archive::SavedArchive;
use std::fmt;
use std::time::Duration;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Host filtering left nothing to fetch; no work was done
    NoMatchingLinks,
    /// Every job finished and succeeded
    Completed,
    /// Every job finished; this many failed
    CompletedWithFailures(usize),
    /// The run was cancelled after `completed` of `total` jobs
    Cancelled { completed: usize, total: usize },
}

impl RunOutcome {
    /// Classifies a finished run
    pub fn from_counts(total: usize, completed: usize, failed: usize, cancelled: bool) -> Self {
        if total == 0 {
            Self::NoMatchingLinks
        } else if cancelled && completed < total {
            Self::Cancelled { completed, total }
        } else if failed > 0 {
            Self::CompletedWithFailures(failed)
        } else {
            Self::Completed
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatchingLinks => write!(f, "no matching links"),
            Self::Completed => write!(f, "completed cleanly"),
            Self::CompletedWithFailures(n) => write!(f, "completed with {} failures", n),
            Self::Cancelled { completed, total } => {
                write!(f, "cancelled after {} of {}", completed, total)
            }
        }
    }
}

/// Totals for one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub total_jobs: usize,
    /// Jobs that produced a report row
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub archives: usize,
    pub uploads_ok: usize,
    pub uploads_failed: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Summary of a run that had nothing to do
    pub fn empty() -> Self {
        Self {
            outcome: RunOutcome::NoMatchingLinks,
            total_jobs: 0,
            completed: 0,
            succeeded: 0,
            failed: 0,
            archives: 0,
            uploads_ok: 0,
            uploads_failed: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Share of completed jobs that succeeded, in percent
    pub fn success_rate(&self) -> f64 {
        if self.completed == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.completed as f64 * 100.0
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} ok, {} failed, {} archives, {:.1}s)",
            self.outcome,
            self.succeeded,
            self.failed,
            self.archives,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Prints the summary to stdout in a formatted manner
///
/// # Arguments
///
/// * `summary` - The run totals
/// * `archives` - Archives saved during the run
pub fn print_summary(summary: &RunSummary, archives: &[SavedArchive]) {
    println!("=== Harvest Summary ===\n");

    println!("Result: {}", summary.outcome);
    println!();

    println!("Jobs:");
    println!("  Total: {}", summary.total_jobs);
    println!("  Completed: {}", summary.completed);
    println!("  Succeeded: {}", summary.succeeded);
    println!("  Failed: {}", summary.failed);
    println!();

    if !archives.is_empty() {
        println!("Archives ({}):", archives.len());
        for archive in archives {
            println!(
                "  - {} ({} files, {:.1} MB)",
                archive.path.display(),
                archive.file_count,
                archive.byte_size as f64 / (1024.0 * 1024.0)
            );
        }
        println!();
    }

    if summary.uploads_ok + summary.uploads_failed > 0 {
        println!("Uploads:");
        println!("  Succeeded: {}", summary.uploads_ok);
        println!("  Failed: {}", summary.uploads_failed);
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} jobs) in {:.1}s",
        summary.success_rate(),
        summary.succeeded,
        summary.completed,
        summary.elapsed.as_secs_f64()
    );
}
