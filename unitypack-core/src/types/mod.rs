//! Shared data types
//!
//! Export configuration and version-control ignore status.

mod ignore;
mod project;

pub use ignore::*;
pub use project::*;
