//! Spotlight Query - Notification-driven metadata query lifecycle
//!
//! A query registers an observer with the notification center, starts the
//! native search, and keeps the substrate's run loop serviced on a timer
//! until the "finished gathering" notification arrives. The router then
//! hands the notification to the owning query, which extracts one value per
//! result into its sink and shuts the timer down.

pub mod center;
pub mod error;
pub mod extract;
pub mod lifecycle;
pub mod memory;
pub mod poll;
pub mod registry;
pub mod router;
pub mod spotlight;
pub mod traits;

#[cfg(feature = "mdfind")]
pub mod mdfind;

pub use center::{NotificationCenter, NotificationListener, Subscription};
pub use error::{QueryError, QueryResult};
pub use extract::{ChannelSink, Extraction, ResultExtractor, ResultSink, SinkError};
pub use lifecycle::SpotlightQuery;
pub use memory::{MemoryFixture, MemorySubstrate};
pub use poll::PollDriver;
pub use registry::InstanceRegistry;
pub use router::{NotificationRouter, QueryObserver};
pub use spotlight::Spotlight;
pub use traits::{MetadataQuery, RunLoopMode, RunLoopStatus, Substrate};

#[cfg(feature = "mdfind")]
pub use mdfind::MdfindSubstrate;
