//! Renders normalised predicate trees as boolean expressions.

use crate::query::ast::{ComparisonLeaf, LogicalNode, Operator};
use crate::query::ident::quote;
use crate::query::params::ParamStyle;

/// Renders `node` as a fully parenthesised expression. A bare leaf at the
/// top level is still wrapped so the result composes with other clauses.
pub fn render(node: &LogicalNode, style: ParamStyle) -> String {
    let mut out = String::new();
    match node {
        LogicalNode::Leaf(leaf) => {
            out.push('(');
            render_leaf(&mut out, leaf, style);
            out.push(')');
        }
        LogicalNode::Group { .. } => render_node(&mut out, node, style),
    }
    out
}

fn render_node(out: &mut String, node: &LogicalNode, style: ParamStyle) {
    match node {
        LogicalNode::Leaf(leaf) => render_leaf(out, leaf, style),
        LogicalNode::Group {
            connective,
            children,
        } => {
            out.push('(');
            for (idx, child) in children.iter().enumerate() {
                if idx > 0 {
                    out.push_str(connective.separator());
                }
                render_node(out, child, style);
            }
            out.push(')');
        }
    }
}

fn render_leaf(out: &mut String, leaf: &ComparisonLeaf, style: ParamStyle) {
    match (leaf.operator, leaf.parameter.as_deref()) {
        (Operator::Exists | Operator::NotExists, _) | (_, None) => {
            out.push_str(leaf.operator.as_str());
            out.push('(');
            render_target(out, leaf);
            out.push(')');
        }
        (operator, Some(param)) => {
            render_target(out, leaf);
            out.push(' ');
            out.push_str(operator.as_str());
            out.push(' ');
            style.write_placeholder(out, param);
        }
    }
}

fn render_target(out: &mut String, leaf: &ComparisonLeaf) {
    if leaf.is_identity() && !leaf.operator.is_existence() {
        out.push_str("id(");
        out.push_str(&leaf.reference);
        out.push(')');
    } else {
        out.push_str(&leaf.reference);
        out.push('.');
        out.push_str(&quote(&leaf.property));
    }
}
