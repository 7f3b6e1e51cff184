//! Core domain + application logic for the ad-moderation bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and the classification
//! backend live behind ports (traits) implemented in adapter crates.

pub mod authorization;
pub mod classifier;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod moderation;
pub mod permissions;

pub use errors::{Error, Result};
