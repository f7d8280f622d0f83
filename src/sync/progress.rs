//! Progress reporting and cancellation for long-running operations.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::error::{Error, Result};

/// Receives `(percent, stage)` updates.
pub trait Progress {
    fn report(&mut self, percent: u8, stage: &str);
}

impl<F> Progress for F
where
    F: FnMut(u8, &str),
{
    fn report(&mut self, percent: u8, stage: &str) {
        self(percent, stage);
    }
}

/// A sink that discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn report(&mut self, _percent: u8, _stage: &str) {}
}

/// Stages of a restore, each owning a slice of the 0-100 range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreStage {
    Idle,
    Parsing,
    Transacting,
    PostTransactionRestore,
    Done,
    Failed,
}

impl RestoreStage {
    /// Inclusive percent range covered by this stage.
    #[must_use]
    pub const fn range(&self) -> (u8, u8) {
        match self {
            Self::Idle | Self::Failed => (0, 0),
            Self::Parsing => (0, 40),
            Self::Transacting => (40, 92),
            Self::PostTransactionRestore => (92, 100),
            Self::Done => (100, 100),
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Parsing => "Parsing backup",
            Self::Transacting => "Restoring records",
            Self::PostTransactionRestore => "Restoring settings",
            Self::Done => "Done",
            Self::Failed => "Failed",
        }
    }
}

/// Wraps a [`Progress`] sink and keeps reports monotonic.
///
/// Percentages never go backwards within one operation, except for the
/// single `(0, "Failed: ...")` report emitted by [`Tracker::fail`].
pub struct Tracker<'a> {
    sink: &'a mut dyn Progress,
    stage: RestoreStage,
    last: u8,
}

impl<'a> Tracker<'a> {
    pub fn new(sink: &'a mut dyn Progress) -> Self {
        Self {
            sink,
            stage: RestoreStage::Idle,
            last: 0,
        }
    }

    #[must_use]
    pub const fn stage(&self) -> RestoreStage {
        self.stage
    }

    /// Move to `stage` and report its starting percentage.
    pub fn enter(&mut self, stage: RestoreStage) {
        self.stage = stage;
        self.emit(stage.range().0, stage.label());
    }

    /// Report `done` of `total` units of work within the current stage.
    pub fn step(&mut self, done: usize, total: usize, message: &str) {
        let (start, end) = self.stage.range();
        let span = usize::from(end - start);
        let offset = if total == 0 {
            span
        } else {
            span * done.min(total) / total
        };
        let percent = start.saturating_add(u8::try_from(offset).unwrap_or(u8::MAX));
        self.emit(percent.min(end), message);
    }

    pub fn finish(&mut self) {
        self.enter(RestoreStage::Done);
    }

    /// Report failure. This is the one report allowed to go back to 0.
    pub fn fail(&mut self, error: &Error) {
        self.stage = RestoreStage::Failed;
        self.sink.report(0, &format!("Failed: {error}"));
    }

    fn emit(&mut self, percent: u8, message: &str) {
        let percent = percent.max(self.last).min(100);
        self.last = percent;
        self.sink.report(percent, message);
    }
}

/// Cooperative cancellation flag, checked between stages.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A token nobody holds a handle to cancel.
    #[must_use]
    pub fn never() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] once [`CancelToken::cancel`] was called.
    pub fn check(&self, stage: &str) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled {
                stage: stage.to_string(),
            });
        }
        Ok(())
    }
}
