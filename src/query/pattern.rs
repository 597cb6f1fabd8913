//! Pattern rendering for MATCH and MERGE clauses.

use crate::query::ast::{Direction, MatchStep, StepKind};
use crate::query::errors::BuildResult;
use crate::query::ident::quote;
use crate::query::params::ParamStyle;
use crate::query::session::{BuildSession, ResolvedStep};

/// One connected chain of steps, e.g. `(a)-[r:KNOWS]->(b)`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pattern {
    steps: Vec<ResolvedStep>,
}

impl Pattern {
    /// Renders the chain. Relationships without a neighbouring node get an
    /// anonymous `()` endpoint.
    pub fn render(&self, style: ParamStyle) -> String {
        let mut out = String::new();
        let mut after_node = false;
        for step in &self.steps {
            match step.kind {
                StepKind::Node => {
                    render_node(&mut out, step, style);
                    after_node = true;
                }
                StepKind::Relationship => {
                    if !after_node {
                        out.push_str("()");
                    }
                    render_relationship(&mut out, step, style);
                    after_node = false;
                }
            }
        }
        if !after_node && !self.steps.is_empty() {
            out.push_str("()");
        }
        out
    }
}

fn render_labels(out: &mut String, step: &ResolvedStep) {
    match step.kind {
        StepKind::Node => {
            for label in &step.labels {
                out.push(':');
                out.push_str(&quote(label));
            }
        }
        StepKind::Relationship => {
            for (idx, label) in step.labels.iter().enumerate() {
                out.push(if idx == 0 { ':' } else { '|' });
                out.push_str(&quote(label));
            }
        }
    }
}

fn render_properties(out: &mut String, step: &ResolvedStep, style: ParamStyle) {
    if step.properties.is_empty() {
        return;
    }
    out.push_str(" {");
    for (idx, (property, param)) in step.properties.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        out.push(' ');
        out.push_str(&quote(property));
        out.push_str(": ");
        style.write_placeholder(out, param);
    }
    out.push_str(" }");
}

fn render_node(out: &mut String, step: &ResolvedStep, style: ParamStyle) {
    out.push('(');
    out.push_str(&step.reference);
    render_labels(out, step);
    render_properties(out, step, style);
    out.push(')');
}

fn render_relationship(out: &mut String, step: &ResolvedStep, style: ParamStyle) {
    out.push_str(match step.direction {
        Direction::In => "<-[",
        Direction::Out | Direction::Undirected => "-[",
    });
    out.push_str(&step.reference);
    render_labels(out, step);
    render_properties(out, step, style);
    out.push_str(match step.direction {
        Direction::Out => "]->",
        Direction::In | Direction::Undirected => "]-",
    });
}

/// Accumulates patterns for one clause; independent patterns render
/// comma-separated.
#[derive(Clone, Debug, Default)]
pub struct PatternBuilder {
    patterns: Vec<Pattern>,
}

impl PatternBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when nothing has been added.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Adds one call's worth of steps. Steps are chained in order; two
    /// adjacent nodes cannot be connected and start a new parallel pattern.
    pub fn add<I>(&mut self, session: &mut BuildSession, steps: I) -> BuildResult<()>
    where
        I: IntoIterator<Item = MatchStep>,
    {
        let mut current = Pattern::default();
        for step in steps {
            let resolved = session.resolve(step)?;
            let breaks_chain = resolved.kind == StepKind::Node
                && current
                    .steps
                    .last()
                    .map_or(false, |prev| prev.kind == StepKind::Node);
            if breaks_chain {
                self.patterns.push(std::mem::take(&mut current));
            }
            current.steps.push(resolved);
        }
        if !current.steps.is_empty() {
            self.patterns.push(current);
        }
        Ok(())
    }

    /// Renders every pattern joined by `", "`.
    pub fn render(&self, style: ParamStyle) -> String {
        self.patterns
            .iter()
            .map(|p| p.render(style))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
