use serde::Deserialize;
use std::{collections::BTreeSet, fmt};

/// A hostname the router should forward to an instance.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Route(String);

/// The routes declared on a workload at one point in time.
///
/// Sets are built fresh from each decode and never updated in place. Members
/// are kept ordered so that [`RouteSet::to_list`] is deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteSet(BTreeSet<Route>);

#[derive(Debug, thiserror::Error)]
#[error("invalid routes annotation: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

/// Annotation entries are either `{"hostname": "..", "port": ..}` objects or
/// bare hostnames. The port belongs to the writer's model and is ignored here.
#[derive(Deserialize)]
#[serde(untagged)]
enum Entry {
    Host(String),
    Object { hostname: String },
}

/// Decodes a declared-routes annotation value into a set of routes.
///
/// An absent or blank value is the empty set.
pub fn decode(value: Option<&str>) -> Result<RouteSet, DecodeError> {
    let value = match value.map(str::trim) {
        None | Some("") => return Ok(RouteSet::default()),
        Some(v) => v,
    };

    let entries = serde_json::from_str::<Vec<Entry>>(value)?;
    Ok(entries
        .into_iter()
        .map(|entry| match entry {
            Entry::Host(hostname) | Entry::Object { hostname } => Route(hostname),
        })
        .collect())
}

/// Returns the routes in `old` that are no longer in `new`.
pub fn diff(old: &RouteSet, new: &RouteSet) -> RouteSet {
    RouteSet(old.0.difference(&new.0).cloned().collect())
}

// === impl Route ===

impl Route {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Route {
    fn from(hostname: String) -> Self {
        Self(hostname)
    }
}

impl From<&str> for Route {
    fn from(hostname: &str) -> Self {
        Self(hostname.to_string())
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// === impl RouteSet ===

impl RouteSet {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, route: &Route) -> bool {
        self.0.contains(route)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.0.iter()
    }

    /// Lists the routes in sorted order.
    pub fn to_list(&self) -> Vec<Route> {
        self.0.iter().cloned().collect()
    }
}

impl<R: Into<Route>> FromIterator<R> for RouteSet {
    fn from_iter<T: IntoIterator<Item = R>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
