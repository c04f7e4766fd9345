//! Native substrate traits
//!
//! The substrate is the external search index: it owns the query objects,
//! posts notifications to a [`NotificationCenter`], and exposes a run loop
//! that has to be serviced for those notifications to be delivered.

use std::sync::Arc;
use std::time::Duration;

use spotlight_core::{Predicate, QueryObjectId, ResultValue};

use crate::center::NotificationCenter;
pub use crate::error::{QueryError, QueryResult as Result};

/// Run-loop mode a service call runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunLoopMode {
    #[default]
    Default,
    Common,
}

/// Outcome of one run-loop service call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunLoopStatus {
    /// No sources or timers were attached
    Finished,
    /// The loop was stopped explicitly
    Stopped,
    /// The timeout elapsed without handling a source
    TimedOut,
    /// A source was handled (only with `return_after_source_handled`)
    HandledSource,
}

impl RunLoopStatus {
    pub fn handled_source(&self) -> bool {
        matches!(self, Self::HandledSource)
    }
}

/// A native query object
pub trait MetadataQuery: Send + Sync {
    /// Handle notifications from this query are tagged with
    fn object_id(&self) -> QueryObjectId;

    /// Assign the predicate; the expression is passed through verbatim
    fn set_predicate(&self, predicate: &Predicate) -> Result<()>;

    /// Begin gathering. Starting a query that is already gathering is a no-op.
    fn start(&self) -> Result<()>;

    /// Stop gathering. Safe to call when not running.
    fn stop(&self);

    fn is_gathering(&self) -> bool;

    fn result_count(&self) -> usize;

    /// Read one attribute of the result at `index`
    fn value_for_attribute(&self, index: usize, attribute: &str) -> Result<ResultValue>;

    /// Why the last gather failed, if it did.
    ///
    /// A failed gather still posts "finished gathering"; the receiver calls
    /// this once to tell a failure from a normal completion.
    fn take_failure(&self) -> Option<QueryError> {
        None
    }
}

/// The external search service
pub trait Substrate: Send + Sync {
    /// Create a query object that posts its notifications to `center`
    fn create_query(&self, center: Arc<NotificationCenter>) -> Result<Arc<dyn MetadataQuery>>;

    /// Service pending sources once.
    ///
    /// Must not block longer than `timeout`.
    fn run_once(
        &self,
        mode: RunLoopMode,
        timeout: Duration,
        return_after_source_handled: bool,
    ) -> RunLoopStatus;
}
