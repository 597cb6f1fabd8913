//! Identifier handling for names that end up inside query text.

use std::borrow::Cow;

use crate::query::errors::{BuildError, BuildResult};

/// True for ASCII identifiers: a letter or `_` followed by letters, digits
/// or `_`.
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Renders a label, relationship type or property name, quoting it with
/// backticks when it is not a plain identifier.
pub fn quote(name: &str) -> Cow<'_, str> {
    if is_plain_identifier(name) {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("`{}`", name.replace('`', "``")))
    }
}

/// References are emitted unquoted, so they must be plain identifiers.
pub fn validate_reference(reference: &str) -> BuildResult<()> {
    if is_plain_identifier(reference) {
        Ok(())
    } else {
        Err(BuildError::InvalidRef {
            reference: reference.to_owned(),
        })
    }
}

/// Folds an arbitrary name into a parameter-safe identifier.
pub fn sanitize_param(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.chars().next().map_or(true, |c| c.is_ascii_digit()) {
        out.insert(0, 'p');
    }
    out
}
