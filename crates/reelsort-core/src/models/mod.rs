//! Data models shared by the scanner, index, analyzers and plans.

mod media;

pub use media::*;
