//! Convenience result alias.

use crate::error::DispatchError;

/// Workspace-wide result alias.
pub type DispatchResult<T> = Result<T, DispatchError>;
