//! glimpse-server: library surface for the server binary.

pub mod capture;
pub mod config;
