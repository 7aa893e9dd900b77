//! Progress reporting.
//!
//! This module defines the ProgressCallback trait, which keeps the engine free
//! of any UI technology. Any `Fn(&ProgressInfo)` closure is a callback too.
//!
//! Progress is coarse: one tick before the first top-level artifact, then one
//! tick after each top-level artifact. Work inside an expanded folder is never
//! reported.

use crate::model::ProgressInfo;

/// Receives progress ticks from a batch operation.
///
/// Called synchronously on the thread running the batch.
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, info: &ProgressInfo);
}

impl<F> ProgressCallback for F
where
    F: Fn(&ProgressInfo) + Send + Sync,
{
    fn on_progress(&self, info: &ProgressInfo) {
        self(info)
    }
}

/// Counts ticks for one batch and forwards them to an optional callback.
pub(crate) struct ProgressCounter<'a> {
    callback: Option<&'a dyn ProgressCallback>,
    total: usize,
    count: Option<usize>,
}

impl<'a> ProgressCounter<'a> {
    pub(crate) fn new(callback: Option<&'a dyn ProgressCallback>, total: usize) -> Self {
        ProgressCounter {
            callback,
            total,
            count: None,
        }
    }

    /// Emit tick 0 unless a tick was already emitted.
    pub(crate) fn start(&mut self, name: &str) {
        if self.count.is_none() {
            self.tick(name);
        }
    }

    /// Emit the next tick: 0 on the first call, then +1 per call.
    pub(crate) fn tick(&mut self, name: &str) {
        let Some(callback) = self.callback else {
            return;
        };

        let value = match self.count {
            Some(count) => count + 1,
            None => 0,
        };
        self.count = Some(value);

        callback.on_progress(&ProgressInfo {
            current_text: name.to_string(),
            current_sub_text: format!("{} of {}", value, self.total),
            current_value: value,
            max_value: self.total,
        });
    }
}
