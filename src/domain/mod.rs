//! Domain layer for the specrun orchestration core
//!
//! This module contains the core models, errors and ports.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
