//! # Contracts
//!
//! Frozen interface contracts shared by the A/V sync core and its collaborators.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Media timestamps (PTS) and wall-clock values are seconds as `f64`
//! - A missing PTS is `None`, never a sentinel value
//! - Vsync intervals are reported by the video output in seconds

mod collaborators;
mod error;
mod frame;
mod playback_config;
mod report;
mod status;
mod sync_options;

pub use collaborators::*;
pub use error::*;
pub use frame::*;
pub use playback_config::*;
pub use report::*;
pub use status::*;
pub use sync_options::*;
