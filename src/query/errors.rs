#![forbid(unsafe_code)]
#![allow(missing_docs)]

use thiserror::Error;

/// Structured errors emitted while building a query.
///
/// Every variant is raised before any query text leaves the process and
/// carries a stable code (see [`BuildError::code`]) so callers can match on
/// the failure without parsing messages. These are programmer errors and are
/// never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// No match step was registered before rendering.
    #[error("query builder must have at least one match clause")]
    MissingMatch,
    /// More than one reference is in play and no return list was given.
    #[error("query builder must have a return clause if multiple matches are involved")]
    MissingReturn,
    /// A requested return alias does not name a registered reference.
    #[error("return value '{alias}' not found in refs")]
    ReturnNotRef { alias: String },
    /// A match step omitted its `type` key or used an unknown value.
    #[error("match step must include \"type\" key (one of [\"node\", \"rel\"])")]
    MissingType,
    /// Relationship direction was not `in`, `out` or absent.
    #[error("relationship direction '{direction}' must be 'in' or 'out'")]
    InvalidDirection { direction: String },
    /// A reference was registered twice within one build.
    #[error("match step ref '{reference}' has already been used")]
    DuplicateRef { reference: String },
    /// Limit was not a positive integer.
    #[error("limit must be a positive integer (got {value})")]
    InvalidLimit { value: String },
    /// Reference is not usable as a query identifier.
    #[error("ref '{reference}' is not a valid identifier")]
    InvalidRef { reference: String },
    /// An order entry points at an unknown reference.
    #[error("order entry '{reference}.{property}' does not name a registered ref")]
    OrderNotRef { reference: String, property: String },
    /// A clause points at a reference that was never matched.
    #[error("ref '{reference}' referenced in {context} was never matched")]
    UnknownRef {
        reference: String,
        context: &'static str,
    },
    /// Criteria object could not be interpreted.
    #[error("invalid criteria: {reason}")]
    InvalidCriteria { reason: String },
    /// Identity comparison value could not be coerced to an integer.
    #[error("identity value {value} is not an integer")]
    InvalidIdentity { value: String },
    /// Sort entry had an unknown shape or direction.
    #[error("invalid sort entry: {reason}")]
    InvalidSort { reason: String },
    /// `update_link` was called without a relationship type.
    #[error("update_link requires a non-empty relationship \"type\"")]
    MissingLinkType,
    /// `update_link` was called without anything to update.
    #[error("update_link requires a non-empty \"update_params\" set")]
    MissingLinkUpdate,
    /// `update` was called without any assignable values.
    #[error("update requires at least one value outside of id/_id")]
    MissingUpdateValues,
    /// `create_many` payload had the wrong shape.
    #[error("invalid create payload: {reason}")]
    InvalidCreate { reason: String },
}

impl BuildError {
    /// Stable machine-readable code for the failure.
    pub fn code(&self) -> &'static str {
        match self {
            BuildError::MissingMatch => "E_MISSING_CLAUSE_MATCH",
            BuildError::MissingReturn => "E_MISSING_CLAUSE_RETURN",
            BuildError::ReturnNotRef { .. } => "E_RETURN_NOT_REF",
            BuildError::MissingType => "E_MISSING_KEY_TYPE",
            BuildError::InvalidDirection { .. } => "E_INVALID_KEY_DIRECTION",
            BuildError::DuplicateRef { .. } => "E_DUPLICATE_KEY_REF",
            BuildError::InvalidLimit { .. } => "E_INVALID_KEY_LIMIT",
            BuildError::InvalidRef { .. } => "E_INVALID_KEY_REF",
            BuildError::OrderNotRef { .. } => "E_ORDER_NOT_REF",
            BuildError::UnknownRef { .. } => "E_UNKNOWN_REF",
            BuildError::InvalidCriteria { .. } => "E_INVALID_CRITERIA",
            BuildError::InvalidIdentity { .. } => "E_INVALID_KEY_ID",
            BuildError::InvalidSort { .. } => "E_INVALID_KEY_SORT",
            BuildError::MissingLinkType => "E_MISSING_LINK_TYPE",
            BuildError::MissingLinkUpdate => "E_MISSING_LINK_UPDATE",
            BuildError::MissingUpdateValues => "E_MISSING_UPDATE_VALUES",
            BuildError::InvalidCreate { .. } => "E_INVALID_CREATE",
        }
    }

    pub(crate) fn criteria(reason: impl Into<String>) -> Self {
        BuildError::InvalidCriteria {
            reason: reason.into(),
        }
    }
}

/// Convenience alias for builder results.
pub type BuildResult<T> = std::result::Result<T, BuildError>;
