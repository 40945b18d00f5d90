//! LDAP directory-integration client for the Schul-Cloud platform.
//!
//! This crate provides the directory client used by login and roster
//! endpoints: it keeps one authenticated connection per configured
//! directory server, delegates user authentication to the server, and runs
//! the school/user/class queries selected by each server's variant.

#![deny(missing_docs)]

mod client;
mod config;
mod dn;
mod entry;
mod registry;
mod search;
mod strategy;
mod team;

pub use client::{AttributeChange, DirectoryClient};
pub use config::{DirectoryConfig, DirectoryTimeouts, DirectoryVariant};
pub use dn::{DistinguishedName, DistinguishedNameError, RelativeDistinguishedName};
pub use entry::DirectoryEntry;
pub use registry::{ConnectionHandle, ConnectionRegistry};
pub use search::{SearchOptions, SearchRequest, SearchScope};
pub use team::{GroupSpec, Team};

/// Convenient result alias that reuses the core error type.
pub type Result<T> = schulcloud_core::Result<T>;
