#![forbid(unsafe_code)]

//! Criteria to query-text translation.
//!
//! Builds parameterised query text from caller criteria. Nothing here talks
//! to a server; see [`crate::adapter`] for dispatch.

/// Plain data describing one build.
///
/// Match steps, predicate leaves and trees, ordering and write items.
pub mod ast;

/// Clause assembler.
///
/// Fluent builder producing the final query text and parameter map.
pub mod builder;

/// CREATE and UNWIND-CREATE statements.
pub mod create;

/// Caller criteria classification and lowering.
pub mod criteria;

/// Build-time validation errors.
pub mod errors;

/// Identifier checks and quoting.
pub mod ident;

/// Parameter naming and placeholder syntax.
pub mod params;

/// MATCH / MERGE pattern rendering.
pub mod pattern;

/// Boolean expression rendering.
pub mod predicate;

/// Per-build mutable state.
pub mod session;

pub use ast::{Direction, LogicalNode, MatchStep, Operator, OrderSpec, StepKind};
pub use builder::{BuiltQuery, PredicateBuilder, QueryBuilder};
pub use create::CreateBuilder;
pub use criteria::{Criteria, FindCriteria, SortKey};
pub use errors::{BuildError, BuildResult};
pub use params::{ParamMap, ParamStyle};
