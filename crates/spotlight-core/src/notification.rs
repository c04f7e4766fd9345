//! Notification kinds and the identities they are routed by

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::Error;

/// Identity of one query's notification observer.
///
/// This is the key the instance registry is indexed by. A fresh id is
/// generated for every query instance, so ids never collide within a
/// process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObserverId(pub Ulid);

impl ObserverId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    pub fn from_string(s: &str) -> Result<Self, Error> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| Error::InvalidObserverId(format!("{}: {}", s, e)))
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ObserverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

static NEXT_QUERY_OBJECT: AtomicU64 = AtomicU64::new(1);

/// Handle of a native query object, used as the source of notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryObjectId(pub u64);

impl QueryObjectId {
    /// Allocate a process-unique handle.
    pub fn next() -> Self {
        Self(NEXT_QUERY_OBJECT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for QueryObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "query#{}", self.0)
    }
}

/// The two notification kinds a metadata query posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    /// Live update while (or after) results are gathered
    Update,
    /// The initial gathering phase is complete
    FinishedGathering,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 2] = [Self::Update, Self::FinishedGathering];

    /// Native notification name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Update => "NSMetadataQueryDidUpdateNotification",
            Self::FinishedGathering => "NSMetadataQueryDidFinishGatheringNotification",
        }
    }

    /// Name of the observer handler the notification is delivered to
    pub fn handler_name(&self) -> &'static str {
        match self {
            Self::Update => "queryDidUpdate",
            Self::FinishedGathering => "queryDidFinishGathering",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NotificationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s || kind.handler_name() == s)
            .ok_or_else(|| Error::UnknownNotification(s.to_string()))
    }
}

/// An event posted by the native substrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    /// Native query object the event originates from
    pub object: QueryObjectId,
}

impl Notification {
    pub fn new(kind: NotificationKind, object: QueryObjectId) -> Self {
        Self { kind, object }
    }

    pub fn update(object: QueryObjectId) -> Self {
        Self::new(NotificationKind::Update, object)
    }

    pub fn finished_gathering(object: QueryObjectId) -> Self {
        Self::new(NotificationKind::FinishedGathering, object)
    }
}
