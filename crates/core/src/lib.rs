//! Core business logic for traveltube.

pub mod services;

pub use services::*;
