//! # tapline-core
//!
//! Core crate for the Tapline interception layer. Contains the unified
//! error system, configuration schemas, shared protocol types (frame
//! layout, travel direction, schema-version selectors, message-name
//! normalization), and the traits for the external collaborators the
//! dispatch engine is wired against (codec and transport).
//!
//! This crate has **no** internal dependencies on other Tapline crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::DispatchError;
pub use result::DispatchResult;
