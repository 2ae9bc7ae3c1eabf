//! shipwright-lib: Core types and logic for Shipwright
//!
//! This crate provides the stages of the reproducible build pipeline:
//! - `filter`: deterministic source-tree filtering against exclusion patterns
//! - `lock`: read-only adapter over the pinned dependency lock artifact
//! - `platform`: native-library and feature selection per host OS
//! - `build`: the cargo build executor producing the binary artifact
//! - `derive`: generation of man page and shell completions from the binary
//! - `verify`: the stricter re-run of the pipeline used as the CI gate
//! - `devshell`: the declarative developer environment description

pub mod build;
pub mod config;
pub mod derive;
pub mod devshell;
pub mod filter;
pub mod lock;
pub mod pipeline;
pub mod platform;
pub mod verify;
