//! Window parameters and bounded surface-recovery retry

use crate::display::error::{DisplayError, DisplayResult};

/// Current drawable size of the presentation window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowParameters {
    /// Drawable width in pixels
    pub width: u32,
    /// Drawable height in pixels
    pub height: u32,
}

impl WindowParameters {
    /// Create window parameters
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A zero-area drawable means the window is minimized
    pub fn is_minimized(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Source of the window's current parameters
///
/// Implemented over the application's windowing layer; the engine only
/// ever asks for the drawable size.
pub trait WindowHandler: Send + Sync {
    /// Current drawable size
    fn window_parameters(&self) -> WindowParameters;
}

/// Bounded retry tracker for surface-image acquisition
///
/// Every stale or timed-out acquisition counts an attempt; passing the
/// cap is fatal rather than looping forever on a surface that never
/// comes back.
pub struct AcquireRetry {
    attempts: u32,
    max: u32,
}

impl AcquireRetry {
    /// Start a fresh retry window with the given attempt cap
    pub fn new(max: u32) -> Self {
        Self { attempts: 0, max }
    }

    /// Record a failed acquisition; errors once the cap is exceeded
    pub fn failure(&mut self) -> DisplayResult<()> {
        self.attempts += 1;
        if self.attempts > self.max {
            return Err(DisplayError::SurfaceUnrecoverable {
                attempts: self.attempts,
            });
        }
        Ok(())
    }

    /// Attempts recorded so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
