//! # schulcloud-core
//!
//! Core types shared by the Schul-Cloud backend services.
//!
//! This crate provides the common error taxonomy used across the
//! directory-integration services, plus the credential types handed to
//! clients that bind against external identity stores.
//!
//! ## Modules
//!
//! - [`error`] - Error types and stable error codes
//! - [`credentials`] - Service-account bind credentials

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod credentials;
pub mod error;

// Re-export commonly used types
pub use credentials::BindCredentials;
pub use error::{Error, Result};
