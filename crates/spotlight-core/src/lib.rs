//! Spotlight Core - Shared types for asynchronous metadata queries
//!
//! This crate provides the data model used by the query lifecycle:
//! observer identities, notification kinds, predicates, result values,
//! query states and configuration.

pub mod config;
pub mod error;
pub mod limits;
pub mod notification;
pub mod query;
pub mod summary;
pub mod value;

pub use config::{PollConfig, QueryConfig};
pub use error::{Error, Result};
pub use notification::{Notification, NotificationKind, ObserverId, QueryObjectId};
pub use query::{Predicate, QueryState};
pub use summary::GatherSummary;
pub use value::{attributes, ResultValue};
