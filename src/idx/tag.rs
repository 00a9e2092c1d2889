//! Tag filter expressions.
//!
//! An expression is `tag<op>value` with `op` one of `=`, `!=`, `=~`,
//! `!~`. Equality and regex-match expressions select candidate series;
//! the negated forms filter them. The outcome is independent of the order
//! expressions are written in.

use crate::idx::MetricDefinition;
use crate::{Error, Result};
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOp {
    Equal,
    NotEqual,
    Match,
    NotMatch,
}

impl TagOp {
    /// Whether the operator narrows the candidate set (as opposed to
    /// filtering it). At least one narrowing expression is required per
    /// query.
    pub fn is_positive(self) -> bool {
        matches!(self, TagOp::Equal | TagOp::Match)
    }
}

/// One parsed tag expression.
#[derive(Debug, Clone)]
pub struct TagExpression {
    pub tag: String,
    pub op: TagOp,
    pub value: String,
    re: Option<Regex>,
}

impl TagExpression {
    /// Parse `tag<op>value`. Regex values compile anchored at the start,
    /// the way Graphite tag queries behave.
    pub fn parse(raw: &str) -> Result<TagExpression> {
        let (tag, op, value) = if let Some((t, v)) = raw.split_once("!=") {
            (t, TagOp::NotEqual, v)
        } else if let Some((t, v)) = raw.split_once("!~") {
            (t, TagOp::NotMatch, v)
        } else if let Some((t, v)) = raw.split_once("=~") {
            (t, TagOp::Match, v)
        } else if let Some((t, v)) = raw.split_once('=') {
            (t, TagOp::Equal, v)
        } else {
            return Err(Error::BadRequest(format!(
                "invalid tag expression {raw:?}, expected tag<op>value"
            )));
        };

        if tag.is_empty() {
            return Err(Error::BadRequest(format!(
                "invalid tag expression {raw:?}, empty tag"
            )));
        }

        let re = match op {
            TagOp::Match | TagOp::NotMatch => Some(Regex::new(&format!("^(?:{value})"))?),
            TagOp::Equal | TagOp::NotEqual => None,
        };

        Ok(TagExpression {
            tag: tag.to_string(),
            op,
            value: value.to_string(),
            re,
        })
    }

    /// Evaluate this expression against one definition. Missing tags read
    /// as the empty value.
    pub fn matches(&self, def: &MetricDefinition) -> bool {
        let actual = def.tag_value(&self.tag);
        match self.op {
            TagOp::Equal => actual == self.value,
            TagOp::NotEqual => actual != self.value,
            TagOp::Match => self.re.as_ref().is_some_and(|re| re.is_match(actual)),
            TagOp::NotMatch => !self.re.as_ref().is_some_and(|re| re.is_match(actual)),
        }
    }
}

/// Parse a full expression list and require at least one narrowing
/// expression, without which the query would scan everything a tenant
/// owns just to apply exclusions.
pub fn parse_expressions(raw: &[impl AsRef<str>]) -> Result<Vec<TagExpression>> {
    let expressions: Vec<TagExpression> = raw
        .iter()
        .map(|r| TagExpression::parse(r.as_ref()))
        .collect::<Result<_>>()?;
    if !expressions.iter().any(|e| e.op.is_positive()) {
        return Err(Error::BadRequest(
            "tag query needs at least one = or =~ expression".to_string(),
        ));
    }
    Ok(expressions)
}
