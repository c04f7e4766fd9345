//! Extracted result values

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Well-known metadata attribute names
pub mod attributes {
    pub const DISPLAY_NAME: &str = "kMDItemDisplayName";
    pub const PATH: &str = "kMDItemPath";
    pub const FS_NAME: &str = "kMDItemFSName";
    pub const CONTENT_TYPE: &str = "kMDItemContentType";
    pub const FS_SIZE: &str = "kMDItemFSSize";
    pub const CONTENT_MODIFICATION_DATE: &str = "kMDItemContentModificationDate";
}

/// One attribute value read from a gathered result.
///
/// Strings are kept verbatim; dates travel as `{"date": "<rfc3339>"}` so a
/// string that merely looks like a date is never reinterpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultValue {
    Null,
    Number(f64),
    String(String),
    List(Vec<String>),
    Date(#[serde(with = "tagged_date")] DateTime<Utc>),
}

mod tagged_date {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Tagged {
        date: DateTime<Utc>,
    }

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Tagged { date: *date }.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Tagged::deserialize(deserializer).map(|tagged| tagged.date)
    }
}

impl ResultValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for ResultValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for ResultValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for ResultValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<DateTime<Utc>> for ResultValue {
    fn from(d: DateTime<Utc>) -> Self {
        Self::Date(d)
    }
}

impl std::fmt::Display for ResultValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("(null)"),
            Self::Number(n) => write!(f, "{}", n),
            Self::Date(d) => write!(f, "{}", d.to_rfc3339()),
            Self::String(s) => f.write_str(s),
            Self::List(items) => write!(f, "{}", items.join(", ")),
        }
    }
}
