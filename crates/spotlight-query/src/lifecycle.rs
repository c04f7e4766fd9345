//! Query lifecycle
//!
//! A [`SpotlightQuery`] owns one native query object and walks it through
//! `Idle -> Predicated -> Running -> (Updating)* -> Gathered -> Idle`.
//! Construction registers the instance with the router and subscribes to
//! both notification kinds; the "finished gathering" handler stops the
//! native query, extracts the results into the sink, and stops the poll
//! loop. Closing (or dropping) the handle undoes the registration.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use spotlight_core::{
    GatherSummary, Notification, NotificationKind, ObserverId, Predicate, QueryObjectId, QueryState,
};
use tokio::sync::watch;

use crate::center::NotificationCenter;
use crate::error::{QueryError, QueryResult};
use crate::extract::{Extraction, ResultExtractor, ResultSink};
use crate::poll::PollDriver;
use crate::router::{NotificationRouter, QueryObserver};
use crate::spotlight::Spotlight;
use crate::traits::MetadataQuery;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct QueryInner {
    observer: ObserverId,
    native: Arc<dyn MetadataQuery>,
    center: Arc<NotificationCenter>,
    router: Arc<NotificationRouter>,
    poll: PollDriver,
    attribute: String,
    state: Mutex<QueryState>,
    predicate: Mutex<Option<Predicate>>,
    sink: Mutex<Option<Box<dyn ResultSink>>>,
    updates: AtomicU64,
    started_at: Mutex<Option<DateTime<Utc>>>,
    outcome: watch::Sender<Option<GatherSummary>>,
    closed: AtomicBool,
}

impl QueryInner {
    fn set_state(&self, state: QueryState) {
        let mut current = lock(&self.state);
        if *current != state {
            tracing::trace!("Query {}: {} -> {}", self.observer, *current, state);
            *current = state;
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.poll.stop();
        self.native.stop();
        let removed = self.center.remove_observer(self.observer);
        self.router.registry().unregister(self.observer);
        self.set_state(QueryState::Idle);
        tracing::debug!(
            "Query {} closed ({} subscriptions removed)",
            self.observer,
            removed
        );
    }

    fn summarize(&self, extraction: Extraction, failure: Option<QueryError>) -> GatherSummary {
        GatherSummary {
            query: lock(&self.predicate).clone(),
            total: extraction.total,
            delivered: extraction.delivered,
            updates: self.updates.load(Ordering::SeqCst),
            aborted: extraction.aborted,
            failed: failure.is_some(),
            error: failure.or(extraction.error).map(|e| e.to_string()),
            started_at: *lock(&self.started_at),
            finished_at: Utc::now(),
        }
    }

    /// Settle the state and publish the summary together, then notify the
    /// sink.
    ///
    /// Both happen under the state lock, so a `start()` issued by a waiter
    /// or by the sink always clears the outcome after this summary lands.
    fn publish(&self, summary: GatherSummary, settled: QueryState) {
        {
            let mut state = lock(&self.state);
            if *state == QueryState::Gathered {
                *state = settled;
            }
            self.outcome.send_replace(Some(summary.clone()));
        }
        if let Some(sink) = lock(&self.sink).as_mut() {
            sink.on_complete(&summary);
        }
    }
}

impl QueryObserver for QueryInner {
    fn query_did_update(&self, notification: &Notification) {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let mut state = lock(&self.state);
        if *state == QueryState::Running {
            *state = QueryState::Updating;
        }
        tracing::trace!("Query {} updated ({})", self.observer, notification.object);
    }

    fn query_did_finish_gathering(&self, notification: &Notification) {
        tracing::debug!(
            "Query {} finished gathering ({})",
            self.observer,
            notification.object
        );
        self.native.stop();
        self.set_state(QueryState::Gathered);

        if let Some(failure) = self.native.take_failure() {
            tracing::warn!("Query {} failed to gather: {}", self.observer, failure);
            self.poll.stop();
            let summary = self.summarize(Extraction::default(), Some(failure));
            self.publish(summary, QueryState::Predicated);
            return;
        }

        let extraction = {
            let mut sink = lock(&self.sink);
            let sink = sink.as_mut().map(|s| s.as_mut() as &mut dyn ResultSink);
            ResultExtractor::extract(self.native.as_ref(), &self.attribute, sink)
        };
        self.poll.stop();

        let summary = self.summarize(extraction, None);
        tracing::debug!(
            "Query {} delivered {} of {} results",
            self.observer,
            summary.delivered,
            summary.total
        );
        self.publish(summary, QueryState::Idle);
    }
}

/// One logical search against the substrate
pub struct SpotlightQuery {
    inner: Arc<QueryInner>,
}

impl SpotlightQuery {
    pub(crate) fn new(spotlight: &Spotlight, sink: Option<Box<dyn ResultSink>>) -> QueryResult<Self> {
        let native = spotlight.substrate().create_query(spotlight.center().clone())?;
        let observer = ObserverId::new();
        let (outcome, _) = watch::channel(None);

        let inner = Arc::new(QueryInner {
            observer,
            native: native.clone(),
            center: spotlight.center().clone(),
            router: spotlight.router().clone(),
            poll: PollDriver::new(spotlight.substrate().clone(), spotlight.config().poll.clone()),
            attribute: spotlight.config().attribute.clone(),
            state: Mutex::new(QueryState::Idle),
            predicate: Mutex::new(None),
            sink: Mutex::new(sink),
            updates: AtomicU64::new(0),
            started_at: Mutex::new(None),
            outcome,
            closed: AtomicBool::new(false),
        });

        // Registered before subscribing, so no notification can name an
        // identity the registry does not know yet.
        let handle: Arc<dyn QueryObserver> = inner.clone();
        spotlight.router().registry().register(observer, &handle);
        for kind in NotificationKind::ALL {
            spotlight
                .center()
                .add_observer(observer, kind, Some(native.object_id()));
        }
        tracing::debug!("Query {} created for {}", observer, native.object_id());

        Ok(Self { inner })
    }

    pub fn observer_id(&self) -> ObserverId {
        self.inner.observer
    }

    pub fn object_id(&self) -> QueryObjectId {
        self.inner.native.object_id()
    }

    pub fn state(&self) -> QueryState {
        *lock(&self.inner.state)
    }

    pub fn predicate(&self) -> Option<Predicate> {
        lock(&self.inner.predicate).clone()
    }

    pub fn attribute(&self) -> &str {
        &self.inner.attribute
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> QueryResult<()> {
        if self.is_closed() {
            return Err(QueryError::Closed);
        }
        Ok(())
    }

    /// Replace the result sink used by the next completion
    pub fn set_sink<S: ResultSink + 'static>(&self, sink: S) {
        *lock(&self.inner.sink) = Some(Box::new(sink));
    }

    /// Assign the query expression, passed through verbatim.
    pub fn set_query(&self, query: &str) -> QueryResult<()> {
        self.ensure_open()?;
        let predicate = Predicate::new(query);
        self.inner.native.set_predicate(&predicate)?;
        tracing::debug!("Query {} predicate: {}", self.inner.observer, predicate);
        *lock(&self.inner.predicate) = Some(predicate);

        let mut state = lock(&self.inner.state);
        if matches!(*state, QueryState::Idle | QueryState::Predicated) {
            *state = QueryState::Predicated;
        }
        Ok(())
    }

    /// Begin gathering. A no-op while the query is already running.
    pub fn start(&self) -> QueryResult<()> {
        self.ensure_open()?;
        {
            let mut state = lock(&self.inner.state);
            if state.is_live() {
                if self.inner.native.is_gathering() {
                    tracing::debug!("Query {} already running", self.inner.observer);
                    return Ok(());
                }
                tracing::debug!(
                    "Query {} was {} but its native query is idle; restarting",
                    self.inner.observer,
                    *state
                );
            }
            if lock(&self.inner.predicate).is_none() {
                return Err(QueryError::MissingPredicate);
            }
            // Running before the native start: the substrate may deliver
            // notifications on the poll task as soon as it is started.
            *state = QueryState::Running;
            self.inner.outcome.send_replace(None);
        }

        self.inner.updates.store(0, Ordering::SeqCst);
        *lock(&self.inner.started_at) = Some(Utc::now());

        if let Err(e) = self.inner.native.start() {
            tracing::debug!("Query {} failed to start: {}", self.inner.observer, e);
            self.inner.set_state(QueryState::Predicated);
            return Err(e);
        }
        tracing::debug!("Query {} started", self.inner.observer);
        Ok(())
    }

    /// Ask the native query to stop. Notifications already queued may still
    /// be delivered afterwards.
    pub fn stop(&self) {
        self.inner.native.stop();
        let mut state = lock(&self.inner.state);
        if state.is_live() {
            *state = QueryState::Predicated;
        }
    }

    /// Start the poll loop, assign `query` and start gathering.
    pub fn search(&self, query: &str) -> QueryResult<()> {
        self.ensure_open()?;
        self.start_event_loop()?;
        self.set_query(query)?;
        self.start()
    }

    /// Returns `Ok(false)` if the loop was already running.
    pub fn start_event_loop(&self) -> QueryResult<bool> {
        self.ensure_open()?;
        self.inner.poll.start()
    }

    /// Returns whether a loop was running.
    pub fn stop_event_loop(&self) -> bool {
        self.inner.poll.stop()
    }

    pub fn is_event_loop_active(&self) -> bool {
        self.inner.poll.is_active()
    }

    /// Poll ticks serviced so far
    pub fn poll_ticks(&self) -> u64 {
        self.inner.poll.ticks()
    }

    /// Summary of the most recent completed gathering, if any
    pub fn last_summary(&self) -> Option<GatherSummary> {
        self.inner.outcome.borrow().clone()
    }

    /// Wait for the current gathering cycle to complete.
    ///
    /// A gather the substrate reported as failed resolves to
    /// [`QueryError::Substrate`]. There is no deadline; wrap in
    /// `tokio::time::timeout` and call [`stop`](Self::stop) on expiry if the
    /// substrate may never finish.
    pub async fn wait(&self) -> QueryResult<GatherSummary> {
        let mut rx = self.inner.outcome.subscribe();
        let summary = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| QueryError::Closed)?
            .clone()
            .ok_or_else(|| QueryError::Internal("completion signalled without summary".to_string()))?;
        if summary.failed {
            let reason = summary.error.unwrap_or_else(|| "gather failed".to_string());
            return Err(QueryError::Substrate(reason));
        }
        Ok(summary)
    }

    /// Stop everything and remove the registration and subscriptions.
    pub fn close(&self) {
        self.inner.close();
    }
}

impl Drop for SpotlightQuery {
    fn drop(&mut self) {
        self.inner.close();
    }
}

impl std::fmt::Debug for SpotlightQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotlightQuery")
            .field("observer", &self.inner.observer)
            .field("object", &self.inner.native.object_id())
            .field("state", &self.state())
            .field("predicate", &self.predicate())
            .finish()
    }
}
