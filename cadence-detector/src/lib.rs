//! Codebase discovery and ignore rules for client workspaces.
//!
//! A client workspace holds one or more codebases: the workspace itself when
//! it is a git repository, otherwise each git repository directly below it.
//! [`find_codebase_paths`] resolves them, [`generate_codebase_id`] names them,
//! and [`ScannerIgnoreLoader`] compiles each codebase's ignore rules.

mod codebase;
mod error;
mod ignore_rules;

pub use codebase::{
    find_codebase_paths, generate_codebase_id, is_git_repository, CodebaseResolver,
    GitCodebaseResolver,
};
pub use error::ResolveError;
pub use ignore_rules::{IgnoreLoader, IgnoreRules, ScannerIgnoreLoader, IGNORE_FILES};
