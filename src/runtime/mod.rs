//! Runtime support for reactive values.
//!
//! This module provides the observer registry that signals notify when they
//! change, and the execution contexts that scope it.

mod context;

pub(crate) use context::RuntimeInner;
pub use context::ReactiveRuntime;
