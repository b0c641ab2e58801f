use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tsgrab_engine::hls::{BoxError, ProgressCallback};

fn segment_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} {msg}\n[{elapsed_precise}] [{bar:40.green/white}] {pos}/{len} segments ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

/// Segment counter bar fed by the downloader's progress callback.
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    pub fn new(message: impl Into<String>) -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(segment_style());
        bar.set_message(message.into());
        bar.enable_steady_tick(Duration::from_millis(500));
        Self { bar }
    }

    pub fn new_disabled() -> Self {
        Self {
            bar: ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::hidden()),
        }
    }

    /// Reports `(completed, total)`. A count past the total is an error.
    pub fn update(&self, completed: usize, total: usize) -> Result<(), BoxError> {
        if completed > total {
            return Err(format!("progress {completed} exceeds total {total}").into());
        }
        self.bar.set_length(total as u64);
        self.bar.set_position(completed as u64);
        Ok(())
    }

    pub fn callback(&self) -> ProgressCallback {
        let manager = self.clone();
        Arc::new(move |completed: usize, total: usize| manager.update(completed, total))
    }

    pub fn finish(&self, message: impl Into<String>) {
        self.bar.finish_with_message(message.into());
    }

    pub fn abandon(&self) {
        self.bar.abandon();
    }

    #[cfg(test)]
    fn position(&self) -> (u64, Option<u64>) {
        (self.bar.position(), self.bar.length())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_drives_bar() {
        let manager = ProgressManager::new_disabled();
        let callback = manager.callback();
        callback(1, 4).unwrap();
        callback(3, 4).unwrap();
        assert_eq!(manager.position(), (3, Some(4)));
        assert!(callback(5, 4).is_err());
    }
}
