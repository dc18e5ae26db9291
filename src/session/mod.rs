//! Session lifecycle.
//!
//! Sessions pair a running container with a host workspace bound at
//! `/workspace`. The [`SessionManager`] drives every tool operation against
//! the [`ContainerRuntime`](crate::container::ContainerRuntime) and keeps the
//! [`SessionRegistry`] consistent with the outcome.

pub mod dockerfile;
pub mod error;
pub mod fetcher;
pub mod manager;
pub mod registry;
pub mod types;
pub mod workspace;


pub use error::*;
pub use fetcher::*;
pub use manager::*;
pub use registry::*;
pub use types::*;
pub use workspace::*;
