//! glimpse-viewer: library surface for the viewer binary.

pub mod config;
pub mod sink;
