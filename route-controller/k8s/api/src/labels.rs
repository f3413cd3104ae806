//! Label selection. Selectors are `kube`'s; this module only adds the parser
//! for selectors given on the command line.

use kube::core::{Expression, Selector};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid label selector term {0:?}")]
pub struct ParseSelectorError(String);

/// Parses the equality-based subset of the label-selector syntax:
/// `k=v`, `k==v`, `k!=v`, `k` and `!k`, separated by commas.
pub fn parse_selector(s: &str) -> Result<Selector, ParseSelectorError> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(parse_term)
        .collect()
}

fn parse_term(term: &str) -> Result<Expression, ParseSelectorError> {
    let invalid = || ParseSelectorError(term.to_string());
    let key = |k: &str| {
        let k = k.trim();
        if k.is_empty() || k.contains(char::is_whitespace) {
            return Err(invalid());
        }
        Ok(k.to_string())
    };

    if let Some((k, v)) = term.split_once("!=") {
        return Ok(Expression::NotEqual(key(k)?, v.trim().to_string()));
    }
    if let Some((k, v)) = term.split_once('=') {
        let v = v.strip_prefix('=').unwrap_or(v).trim();
        if v.contains('=') {
            return Err(invalid());
        }
        return Ok(Expression::Equal(key(k)?, v.to_string()));
    }
    if let Some(k) = term.strip_prefix('!') {
        return Ok(Expression::DoesNotExist(key(k)?));
    }
    Ok(Expression::Exists(key(term)?))
}
