//! CREATE statements for one or many nodes.

use serde_json::{Map, Value};

use crate::codec::encode_value;
use crate::query::ast::{MatchStep, SetItem};
use crate::query::builder::{render_set_items, BuiltQuery};
use crate::query::errors::{BuildError, BuildResult};
use crate::query::ident::sanitize_param;
use crate::query::params::ParamStyle;
use crate::query::pattern::PatternBuilder;
use crate::query::session::BuildSession;

const NODE_REF: &str = "n";
const ROW_ALIAS: &str = "properties";

/// Builds `CREATE` and `UNWIND ... CREATE` statements for an optional label.
#[derive(Clone, Debug, Default)]
pub struct CreateBuilder {
    label: Option<String>,
    style: ParamStyle,
}

impl CreateBuilder {
    /// Creates nodes labelled `label`, or unlabelled nodes for `None`.
    pub fn new(label: Option<&str>) -> Self {
        Self {
            label: label.filter(|l| !l.is_empty()).map(str::to_owned),
            style: ParamStyle::default(),
        }
    }

    /// Renders placeholders in `style`.
    pub fn with_param_style(mut self, style: ParamStyle) -> Self {
        self.style = style;
        self
    }

    /// `CREATE (n:label {k: {n_k}, ...})\nRETURN n`.
    pub fn one(&self, props: &Map<String, Value>) -> BuildResult<BuiltQuery> {
        let mut session = BuildSession::new(self.style);
        let mut pattern = PatternBuilder::new();
        let step = MatchStep::node()
            .with_ref(NODE_REF)
            .maybe_label(self.label.as_deref())
            .properties(props.clone());
        pattern.add(&mut session, [step])?;
        let query = format!("CREATE {}\nRETURN {NODE_REF}", pattern.render(self.style));
        Ok(BuiltQuery {
            query,
            params: session.params,
        })
    }

    /// Creates one node per row of `{key: [attributes, ...]}`; the single
    /// key names the list parameter.
    pub fn many(&self, payload: &Value) -> BuildResult<BuiltQuery> {
        let invalid = |reason: &str| BuildError::InvalidCreate {
            reason: reason.to_owned(),
        };
        let obj = payload
            .as_object()
            .ok_or_else(|| invalid("payload must be an object"))?;
        let mut entries = obj.iter();
        let (key, rows) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => return Err(invalid("payload must hold exactly one key")),
        };
        let rows = rows
            .as_array()
            .ok_or_else(|| invalid("payload value must be a list"))?;
        let encoded = rows
            .iter()
            .map(|row| match row {
                Value::Object(attrs) => Ok(Value::Object(
                    attrs
                        .iter()
                        .map(|(k, v)| (k.clone(), encode_value(v)))
                        .collect(),
                )),
                _ => Err(invalid("every row must be an object")),
            })
            .collect::<BuildResult<Vec<_>>>()?;

        let mut session = BuildSession::new(self.style);
        let param = session.bind_fixed(&sanitize_param(key), Value::Array(encoded));
        let mut pattern = PatternBuilder::new();
        let step = MatchStep::node()
            .with_ref(NODE_REF)
            .maybe_label(self.label.as_deref());
        pattern.add(&mut session, [step])?;
        let replace = [SetItem::Replace {
            reference: NODE_REF.to_owned(),
            source: ROW_ALIAS.to_owned(),
        }];
        let query = format!(
            "UNWIND {} AS {ROW_ALIAS}\nCREATE {}\nSET {}\nRETURN {NODE_REF}",
            self.style.placeholder(&param),
            pattern.render(self.style),
            render_set_items(&replace, self.style),
        );
        Ok(BuiltQuery {
            query,
            params: session.params,
        })
    }
}
