//! The graph execution service boundary.
//!
//! Transport lives behind [`GraphExecutor`]; this crate only builds the
//! query and reshapes what comes back.

use async_trait::async_trait;
use thiserror::Error;

use crate::query::ParamMap;
use crate::record::RawRow;

/// Failures reported by the execution service. Never retried locally.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// Network or authentication failure before the server answered.
    #[error("transport error: {message}")]
    Transport {
        /// Human-readable detail.
        message: String,
    },
    /// The server rejected the statement.
    #[error("server error {code}: {message}")]
    Server {
        /// Machine-readable server code, preserved verbatim.
        code: String,
        /// Human-readable detail.
        message: String,
    },
}

impl ExecutionError {
    /// Builds a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        ExecutionError::Transport {
            message: message.into(),
        }
    }

    /// Builds a server error carrying `code`.
    pub fn server(code: impl Into<String>, message: impl Into<String>) -> Self {
        ExecutionError::Server {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Server code, when the server produced one.
    pub fn code(&self) -> Option<&str> {
        match self {
            ExecutionError::Transport { .. } => None,
            ExecutionError::Server { code, .. } => Some(code),
        }
    }
}

/// Runs one parameterised statement and returns its rows in order.
#[async_trait]
pub trait GraphExecutor: Send + Sync {
    /// Executes `query` with `params`.
    async fn execute(&self, query: &str, params: &ParamMap) -> Result<Vec<RawRow>, ExecutionError>;
}
