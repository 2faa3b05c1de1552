//! Shared types and configuration loading
//!
//! This module contains definitions used across every Arcadium component.

pub mod types;
pub mod config;
