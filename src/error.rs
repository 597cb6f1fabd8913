use thiserror::Error;

use crate::config::ConfigError;
use crate::query::BuildError;
use crate::registry::RegistryError;
use crate::service::ExecutionError;

/// Result alias used by every fallible adapter operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Any failure an adapter operation can report.
#[derive(Debug, Error)]
pub enum Error {
    /// Rejected before any I/O.
    #[error(transparent)]
    Build(#[from] BuildError),
    /// Reported by the execution service.
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    /// Unknown or duplicate connection.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// Config file problems.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Stable machine-readable code: the build code, or the server's own
    /// code for server-side failures.
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::Build(err) => Some(err.code()),
            Error::Execution(err) => err.code(),
            Error::Registry(_) | Error::Config(_) => None,
        }
    }

    /// True for failures raised before anything was sent.
    pub fn is_build(&self) -> bool {
        matches!(self, Error::Build(_))
    }
}
