//! Display engine core
//!
//! Backend-independent orchestration: slot pooling, producer/render
//! handoff, frame-resource cycling, surface-loss recovery, and the
//! engine façade tying them together.

pub mod backend;
pub mod engine;
pub mod error;
pub mod format;
pub mod pool;
pub mod queue;
pub mod ring;
pub mod slot;
pub mod surface;
pub mod viewport;

#[cfg(test)]
pub mod mock;

#[cfg(test)]
mod engine_tests;

pub use backend::{AcquireOutcome, GpuBackend, PresentOutcome, SlotImage};
pub use engine::DisplayEngine;
pub use error::{DisplayError, DisplayResult};
pub use format::{ImageDescription, PixelFormat};
pub use slot::{FrameHandle, FrameSlot};
pub use surface::{WindowHandler, WindowParameters};
pub use viewport::RenderArea;
