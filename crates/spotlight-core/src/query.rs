//! Predicates and the query state machine

use serde::{Deserialize, Serialize};

/// A query expression in the substrate's own predicate grammar.
///
/// The string is carried verbatim; nothing at this layer parses it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Predicate(String);

impl Predicate {
    pub fn new(expression: impl Into<String>) -> Self {
        Self(expression.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<&str> for Predicate {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Predicate {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of one query instance.
///
/// `Idle -> Predicated -> Running -> (Updating)* -> Gathered -> Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryState {
    #[default]
    Idle,
    /// A predicate has been assigned
    Predicated,
    /// The native query is gathering
    Running,
    /// At least one update notification has arrived while gathering
    Updating,
    /// Gathering finished; results are being extracted
    Gathered,
}

impl QueryState {
    /// Whether the native query has been started and not yet finished
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Running | Self::Updating)
    }
}

impl std::fmt::Display for QueryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Predicated => "predicated",
            Self::Running => "running",
            Self::Updating => "updating",
            Self::Gathered => "gathered",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicate_is_verbatim() {
        let raw = "kMDItemContentType == 'public.folder' && (";
        let predicate = Predicate::new(raw);
        assert_eq!(predicate.as_str(), raw);
        assert_eq!(predicate.to_string(), raw);
    }

    #[test]
    fn test_live_states() {
        assert!(QueryState::Running.is_live());
        assert!(QueryState::Updating.is_live());
        assert!(!QueryState::Idle.is_live());
        assert!(!QueryState::Predicated.is_live());
        assert!(!QueryState::Gathered.is_live());
    }
}
