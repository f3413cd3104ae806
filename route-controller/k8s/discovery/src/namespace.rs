/// The namespaces that discovery lists and watches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    All,
    Namespace(String),
}

/// Decides which namespace(s) the controller operates on.
///
/// In single-namespace mode only the configured default namespace may be
/// used. In multi-namespace mode any namespace is accepted.
#[derive(Clone, Debug)]
pub struct NamespaceResolver {
    default: String,
    multi: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NamespaceError {
    #[error("namespace {requested} is not allowed in single-namespace mode; only {default} is")]
    NotAllowed { requested: String, default: String },

    #[error("a default namespace is required in single-namespace mode")]
    MissingDefault,
}

// === impl NamespaceResolver ===

impl NamespaceResolver {
    pub fn single(default: impl ToString) -> Result<Self, NamespaceError> {
        let default = default.to_string();
        if default.is_empty() {
            return Err(NamespaceError::MissingDefault);
        }
        Ok(Self {
            default,
            multi: false,
        })
    }

    pub fn multi(default: impl ToString) -> Self {
        Self {
            default: default.to_string(),
            multi: true,
        }
    }

    pub fn resolve(&self, requested: &str) -> Result<String, NamespaceError> {
        if requested.is_empty() || requested == self.default {
            return Ok(self.default.clone());
        }
        if self.multi {
            return Ok(requested.to_string());
        }
        Err(NamespaceError::NotAllowed {
            requested: requested.to_string(),
            default: self.default.clone(),
        })
    }

    /// Resolves the namespaces to list and watch.
    ///
    /// Multi-namespace mode without a requested (or default) namespace spans
    /// the whole cluster.
    pub fn scope(&self, requested: Option<&str>) -> Result<Scope, NamespaceError> {
        let requested = requested.unwrap_or_default();
        if self.multi && requested.is_empty() && self.default.is_empty() {
            return Ok(Scope::All);
        }
        self.resolve(requested).map(Scope::Namespace)
    }
}
