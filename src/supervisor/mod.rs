//! Builds and runs one sync agent per configured mirror.

mod error;
#[allow(clippy::module_inception)]
mod supervisor;

pub use error::{Result, SupervisorError};
pub use supervisor::Supervisor;
