//! Criteria to Cypher translation and graph result reshaping.
//!
//! [`query`] turns caller criteria into parameterised query text,
//! [`record`] normalises what the server returns, and [`adapter`] ties the
//! two together over connections held by a [`registry::ConnectionRegistry`].

#![warn(missing_docs)]

pub mod adapter;
pub mod codec;
pub mod config;
mod error;
pub mod query;
pub mod record;
pub mod registry;
pub mod service;

pub use adapter::{find_query, GraphAdapter, LinkUpdate, Traversal};
pub use config::{AdapterConfig, ConnectionConfig};
pub use error::{Error, Result};
pub use query::{BuildError, BuiltQuery, MatchStep, QueryBuilder};
pub use record::{NormalizedRecord, RawEntity, RawRow};
pub use registry::{ConnectionRegistry, Connector};
pub use service::{ExecutionError, GraphExecutor};
