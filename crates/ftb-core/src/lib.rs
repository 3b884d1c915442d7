//! Core domain + application logic for the Flowise ↔ Telegram bridge.
//!
//! This crate is transport-agnostic. Telegram and Flowise live behind ports
//! (traits) implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod memory;
pub mod ports;
pub mod security;
pub mod utils;

pub use errors::{Error, Result};
