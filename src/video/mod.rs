// SPDX-License-Identifier: GPL-3.0-only

//! Video sources and their frame loop

pub mod lifecycle;
pub mod media;
pub mod source;
pub mod subscribers;
pub mod throttle;

pub use lifecycle::Lifecycle;
pub use media::MediaElement;
pub use source::{CalibrationOrigin, FrameOutcome, SourceUpdate, VideoSource};
pub use subscribers::{VideoChange, VideoChangeSubscribers};
pub use throttle::FrameThrottle;
