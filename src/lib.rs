//! Band-limited synthesis of amplitude steps ("deltas") with simultaneous
//! power-of-two decimation.
//!
//! A [`Blipper`] turns steps that happen at arbitrary points of a high-rate
//! clock into alias-free samples at `clock rate / decimation`. Each channel
//! gets its own instance; channels can share one [`FilterBank`].

pub mod audio_file;
pub mod blipper;
pub mod color_logger;
pub mod config;
pub mod delta_buffer;
pub mod dither;
pub mod filter_bank;
pub mod kaiser;
pub mod model;

pub use blipper::Blipper;
pub use color_logger::ColorLogger;
pub use config::BlipConfig;
pub use filter_bank::FilterBank;
pub use model::{BlipError, BlipResult, TermResult};
