//! Cadence core library: domain types, persistence contracts, path rules.
//!
//! - [`types`]: events, workspaces, codebase configs and their newtypes
//! - [`error`]: [`StoreError`], [`ReadError`]
//! - [`normalize`]: event-relative → workspace-absolute paths
//! - [`store`]: event/workspace store traits and the JSON ledger
//! - [`registry`]: per-codebase config persistence
//! - [`config`]: `~/.cadence/config.yaml` settings
//! - [`layout`]: `~/.cadence/` paths and atomic writes
//! - [`reader`]: filesystem stat capability used by handlers

pub mod config;
pub mod error;
pub mod layout;
pub mod normalize;
pub mod reader;
pub mod registry;
pub mod store;
pub mod types;

pub use error::{ReadError, StoreError};
pub use types::{
    ClientId, CodebaseConfig, CodebaseDescriptor, CodebaseId, CodebaseRoot, Event, EventId,
    EventKind, EventStatus, EventType, EventUpdate, SyncConfig, TargetSystem, Workspace,
};
