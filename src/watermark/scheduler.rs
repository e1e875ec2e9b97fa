//! Redraw coalescing.
//!
//! Every state mutation requests a redraw, but the compositor runs at most
//! once per frame interval. Requests that arrive between two polls collapse
//! into a single render of the newest revision.

use std::time::{Duration, Instant};

/// Default display refresh rate.
pub const DEFAULT_FRAME_RATE: u32 = 60;

#[derive(Debug, Clone)]
pub struct RedrawScheduler {
    frame_interval: Duration,
    pending: Option<u64>,
    last_rendered: Option<u64>,
    last_frame: Option<Instant>,
}

impl Default for RedrawScheduler {
    fn default() -> Self {
        Self::with_frame_rate(DEFAULT_FRAME_RATE)
    }
}

impl RedrawScheduler {
    pub fn new(frame_interval: Duration) -> Self {
        Self {
            frame_interval,
            pending: None,
            last_rendered: None,
            last_frame: None,
        }
    }

    /// Scheduler for a refresh rate in frames per second. Zero is treated as one.
    pub fn with_frame_rate(frame_rate: u32) -> Self {
        Self::new(Duration::from_secs(1) / frame_rate.max(1))
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Ask for the given state revision to be drawn.
    pub fn request(&mut self, revision: u64) {
        self.pending = Some(match self.pending {
            Some(current) => current.max(revision),
            None => revision,
        });
    }

    pub fn has_pending(&self) -> bool {
        matches!(self.pending, Some(rev) if Some(rev) != self.last_rendered)
    }

    /// Return the revision to render now, if a frame is due.
    ///
    /// The caller is expected to render immediately; the revision counts as
    /// drawn once it is returned.
    pub fn poll(&mut self, now: Instant) -> Option<u64> {
        if !self.has_pending() {
            self.pending = None;
            return None;
        }
        if let Some(last) = self.last_frame {
            if now.saturating_duration_since(last) < self.frame_interval {
                return None;
            }
        }

        let revision = self.pending.take()?;
        self.last_rendered = Some(revision);
        self.last_frame = Some(now);
        Some(revision)
    }

    /// Forget the last drawn revision so the next request always renders.
    pub fn invalidate(&mut self) {
        self.last_rendered = None;
    }

    pub fn last_rendered(&self) -> Option<u64> {
        self.last_rendered
    }
}
