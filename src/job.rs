//! job status and progress reporting
//!
//! A [`JobContext`] is created once per run and handed to every pipeline stage. Each stage moves
//! the job forward with explicit updates which are forwarded to a [`StatusReporter`], e.g. the
//! remote job service of a benchmarking platform or simply the log.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Initializing,
    Running,
    Terminated,
    Failed,
}

impl JobStatus {
    /// no further updates are accepted once a job reaches a final status
    pub fn is_final(self) -> bool {
        matches!(self, JobStatus::Terminated | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: JobStatus,
    /// percent, 0..=100
    pub progress: u8,
    pub comment: String,
}

pub trait StatusReporter {
    fn report(&mut self, update: &StatusUpdate) -> Result<()>;
}

/// reports every update through the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl StatusReporter for LogReporter {
    fn report(&mut self, update: &StatusUpdate) -> Result<()> {
        log::info!(
            "[{:?} {:>3}%] {}",
            update.status,
            update.progress,
            update.comment
        );
        Ok(())
    }
}

/// keeps every update in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryReporter {
    pub updates: Vec<StatusUpdate>,
}

impl StatusReporter for MemoryReporter {
    fn report(&mut self, update: &StatusUpdate) -> Result<()> {
        self.updates.push(update.clone());
        Ok(())
    }
}

pub struct JobContext<R = LogReporter> {
    current: StatusUpdate,
    reporter: R,
}

impl<R: StatusReporter> JobContext<R> {
    pub fn new(reporter: R) -> Self {
        Self {
            current: StatusUpdate {
                status: JobStatus::Initializing,
                progress: 0,
                comment: String::new(),
            },
            reporter,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.current.status
    }

    pub fn progress(&self) -> u8 {
        self.current.progress
    }

    pub fn comment(&self) -> &str {
        &self.current.comment
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn into_reporter(self) -> R {
        self.reporter
    }

    /// moves the job to `status`. progress is capped at 100.
    pub fn update(
        &mut self,
        status: JobStatus,
        progress: u8,
        comment: impl Into<String>,
    ) -> Result<()> {
        if self.current.status.is_final() {
            return Err(Error::InvalidTransition {
                from: self.current.status,
                to: status,
            });
        }

        self.current = StatusUpdate {
            status,
            progress: progress.min(100),
            comment: comment.into(),
        };
        self.reporter.report(&self.current)
    }

    /// updates the progress while keeping the current status
    pub fn set_progress(&mut self, progress: u8, comment: impl Into<String>) -> Result<()> {
        self.update(self.current.status, progress, comment)
    }

    pub fn fail(&mut self, comment: impl Into<String>) -> Result<()> {
        self.update(JobStatus::Failed, self.current.progress, comment)
    }
}

/// maps the progress of a batch of items into a window of the overall job progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressMonitor {
    pub start: u8,
    pub end: u8,
    pub prefix: String,
}

impl ProgressMonitor {
    pub fn new(start: u8, end: u8, prefix: impl Into<String>) -> Self {
        Self {
            start,
            end,
            prefix: prefix.into(),
        }
    }

    pub fn progress_at(&self, done: usize, total: usize) -> u8 {
        if total == 0 {
            return self.end;
        }
        let span = self.end.saturating_sub(self.start) as usize;
        self.start + (span * done.min(total) / total) as u8
    }

    pub fn report<R: StatusReporter>(
        &self,
        ctx: &mut JobContext<R>,
        done: usize,
        total: usize,
    ) -> Result<()> {
        ctx.set_progress(
            self.progress_at(done, total),
            format!("{} ({}/{})", self.prefix, done, total),
        )
    }
}
