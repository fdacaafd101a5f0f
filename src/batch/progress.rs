//! Progress reporting for batch runs.
//!
//! With the `progress` feature, a batch renders an `indicatif` bar over stars whose message
//! shows how long the last star took. Without the feature, [`Progress`] is a no-op with the
//! same interface.
use std::time::Duration;

#[cfg(feature = "progress")]
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};

#[cfg(feature = "progress")]
const BAR_TEMPLATE: &str =
    "{bar:40.cyan/blue} {pos}/{len} stars ({percent:>3}%) | ETA {eta_precise} | {msg}";

#[cfg(feature = "progress")]
pub(crate) struct Progress {
    pb: ProgressBar,
}

#[cfg(feature = "progress")]
impl Progress {
    pub(crate) fn new(total: usize) -> Self {
        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
            pb.set_style(style);
        }
        Progress { pb }
    }

    pub(crate) fn star_done(&self, elapsed: Duration) {
        self.pb
            .set_message(format!("last star: {}", HumanDuration(elapsed)));
        self.pb.inc(1);
    }

    #[cfg(test)]
    fn position(&self) -> u64 {
        self.pb.position()
    }

    pub(crate) fn finish(self) {
        self.pb.finish_and_clear();
    }
}

#[cfg(not(feature = "progress"))]
pub(crate) struct Progress;

#[cfg(not(feature = "progress"))]
impl Progress {
    pub(crate) fn new(_total: usize) -> Self {
        Progress
    }

    pub(crate) fn star_done(&self, _elapsed: Duration) {}

    pub(crate) fn finish(self) {}
}

#[cfg(all(test, feature = "progress"))]
mod progress_tests {
    use super::*;

    #[test]
    fn test_bar_counts_stars() {
        let progress = Progress::new(3);
        progress.star_done(Duration::from_millis(12));
        progress.star_done(Duration::from_millis(40));
        assert_eq!(progress.position(), 2);
        progress.finish();
    }
}
