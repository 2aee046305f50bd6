//! # cadence-sync
//!
//! Codebase registration and remote synchronization.
//!
//! [`RegistrationService`] serves register / unregister / sync /
//! sync-config / check-ignore requests for a client workspace. Remote state
//! is reached through a [`SyncClient`]; [`HttpSyncClient`] is the blocking
//! HTTP implementation.

pub mod client;
pub mod error;
pub mod service;

pub use client::{hash_tree_url, HashTree, HttpSyncClient, SyncClient};
pub use error::SyncError;
pub use service::{CheckIgnoreResult, RegistrationService, WorkspaceRequest};
