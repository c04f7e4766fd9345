//! In-memory substrate for testing
//!
//! Results are scripted per predicate string. Starting a query queues its
//! update notifications followed by one "finished gathering" notification;
//! the queue is shared by every query, like a single thread's run loop, and
//! each `run_once` delivers at most one queued notification.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use spotlight_core::{Notification, NotificationKind, Predicate, QueryObjectId, ResultValue};

use crate::center::NotificationCenter;
use crate::traits::{MetadataQuery, QueryError, Result, RunLoopMode, RunLoopStatus, Substrate};

/// One gathered item: attribute name to value
pub type MemoryItem = HashMap<String, ResultValue>;

/// Scripted behavior for one predicate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureQuery {
    #[serde(default)]
    pub results: Vec<MemoryItem>,

    /// Update notifications posted before gathering finishes
    #[serde(default)]
    pub updates: u32,

    /// Starting the query fails as if the predicate did not parse
    #[serde(default)]
    pub malformed: bool,

    /// Starting the query fails with a permission error
    #[serde(default)]
    pub denied: bool,

    /// Attribute reads at this index fail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_at: Option<usize>,

    /// Gathering starts but finishes with this failure and no results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gather_error: Option<String>,
}

/// Scripts keyed by the exact predicate string
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryFixture {
    #[serde(default)]
    pub queries: HashMap<String, FixtureQuery>,
}

impl MemoryFixture {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Pending {
    center: Arc<NotificationCenter>,
    notification: Notification,
}

#[derive(Default)]
struct Shared {
    scripts: RwLock<HashMap<String, FixtureQuery>>,
    pending: Mutex<VecDeque<Pending>>,
}

impl Shared {
    fn script(&self, predicate: &str) -> Option<FixtureQuery> {
        self.scripts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(predicate)
            .cloned()
    }

    fn enqueue(&self, center: Arc<NotificationCenter>, notification: Notification) {
        lock(&self.pending).push_back(Pending {
            center,
            notification,
        });
    }
}

/// In-memory substrate
///
/// Useful for testing and for running fixtures without a platform index.
#[derive(Default)]
pub struct MemorySubstrate {
    shared: Arc<Shared>,
    held: AtomicBool,
    run_once_calls: AtomicU64,
    delivered: AtomicU64,
}

impl MemorySubstrate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: MemoryFixture) -> Self {
        let substrate = Self::new();
        *substrate
            .shared
            .scripts
            .write()
            .unwrap_or_else(PoisonError::into_inner) = fixture.queries;
        substrate
    }

    fn edit(self, predicate: &str, f: impl FnOnce(&mut FixtureQuery)) -> Self {
        {
            let mut scripts = self
                .shared
                .scripts
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            f(scripts.entry(predicate.to_string()).or_default());
        }
        self
    }

    /// Script full result items for `predicate`
    pub fn with_results(self, predicate: &str, results: Vec<MemoryItem>) -> Self {
        self.edit(predicate, |script| script.results = results)
    }

    /// Script one `attribute` value per result for `predicate`
    pub fn with_values(self, predicate: &str, attribute: &str, values: &[&str]) -> Self {
        let results = values
            .iter()
            .map(|value| {
                let mut item = MemoryItem::new();
                item.insert(attribute.to_string(), ResultValue::from(*value));
                item
            })
            .collect();
        self.with_results(predicate, results)
    }

    pub fn with_updates(self, predicate: &str, updates: u32) -> Self {
        self.edit(predicate, |script| script.updates = updates)
    }

    pub fn with_malformed(self, predicate: &str) -> Self {
        self.edit(predicate, |script| script.malformed = true)
    }

    pub fn with_denied(self, predicate: &str) -> Self {
        self.edit(predicate, |script| script.denied = true)
    }

    pub fn with_failing_result(self, predicate: &str, index: usize) -> Self {
        self.edit(predicate, |script| script.fail_at = Some(index))
    }

    pub fn with_gather_failure(self, predicate: &str, reason: &str) -> Self {
        self.edit(predicate, |script| script.gather_error = Some(reason.to_string()))
    }

    /// Stop delivering queued notifications until [`release`](Self::release)
    pub fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
    }

    /// Queue an arbitrary notification, e.g. a stray one no query expects
    pub fn enqueue(&self, center: Arc<NotificationCenter>, notification: Notification) {
        self.shared.enqueue(center, notification);
    }

    pub fn pending(&self) -> usize {
        lock(&self.shared.pending).len()
    }

    pub fn run_once_calls(&self) -> u64 {
        self.run_once_calls.load(Ordering::SeqCst)
    }

    /// Notifications taken off the queue and posted so far
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::SeqCst)
    }

    /// Non-blocking service call in the default mode
    pub fn run_once_now(&self) -> RunLoopStatus {
        self.run_once(RunLoopMode::Default, Duration::ZERO, true)
    }

    fn deliver_next(&self) -> bool {
        // The queue lock is released before posting; handlers may start
        // other queries, which enqueue.
        let next = lock(&self.shared.pending).pop_front();
        match next {
            Some(pending) => {
                self.delivered.fetch_add(1, Ordering::SeqCst);
                pending.center.post(&pending.notification);
                true
            }
            None => false,
        }
    }
}

impl Substrate for MemorySubstrate {
    fn create_query(&self, center: Arc<NotificationCenter>) -> Result<Arc<dyn MetadataQuery>> {
        Ok(Arc::new(MemoryQuery {
            id: QueryObjectId::next(),
            shared: self.shared.clone(),
            center,
            state: Mutex::new(MemoryQueryState::default()),
        }))
    }

    fn run_once(
        &self,
        _mode: RunLoopMode,
        timeout: Duration,
        return_after_source_handled: bool,
    ) -> RunLoopStatus {
        self.run_once_calls.fetch_add(1, Ordering::SeqCst);

        if self.held.load(Ordering::SeqCst) {
            if !timeout.is_zero() {
                std::thread::sleep(timeout);
            }
            return RunLoopStatus::TimedOut;
        }

        if return_after_source_handled {
            return if self.deliver_next() {
                RunLoopStatus::HandledSource
            } else {
                RunLoopStatus::Finished
            };
        }

        while self.deliver_next() {}
        RunLoopStatus::Finished
    }
}

#[derive(Default)]
struct MemoryQueryState {
    predicate: Option<Predicate>,
    gathering: bool,
    results: Vec<MemoryItem>,
    fail_at: Option<usize>,
    failure: Option<QueryError>,
}

struct MemoryQuery {
    id: QueryObjectId,
    shared: Arc<Shared>,
    center: Arc<NotificationCenter>,
    state: Mutex<MemoryQueryState>,
}

/// Quotes and brackets have to balance for the expression to parse
fn looks_malformed(expression: &str) -> bool {
    if expression.trim().is_empty() {
        return true;
    }
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for c in expression.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => {
                depth -= 1;
                if depth < 0 {
                    return true;
                }
            }
            _ => {}
        }
    }
    depth != 0 || quote.is_some()
}

impl MetadataQuery for MemoryQuery {
    fn object_id(&self) -> QueryObjectId {
        self.id
    }

    fn set_predicate(&self, predicate: &Predicate) -> Result<()> {
        lock(&self.state).predicate = Some(predicate.clone());
        Ok(())
    }

    fn start(&self) -> Result<()> {
        let mut state = lock(&self.state);
        if state.gathering {
            return Ok(());
        }
        let predicate = state.predicate.clone().ok_or(QueryError::MissingPredicate)?;
        let script = self.shared.script(predicate.as_str());

        if script.as_ref().is_some_and(|s| s.malformed) || looks_malformed(predicate.as_str()) {
            return Err(QueryError::InvalidPredicate(predicate.into_inner()));
        }
        let script = script.unwrap_or_default();
        if script.denied {
            return Err(QueryError::PermissionDenied(predicate.into_inner()));
        }

        state.gathering = true;
        state.fail_at = script.fail_at;
        match script.gather_error {
            Some(reason) => {
                state.results = Vec::new();
                state.failure = Some(QueryError::Substrate(reason));
            }
            None => {
                state.results = script.results;
                state.failure = None;
            }
        }
        drop(state);

        for _ in 0..script.updates {
            self.shared.enqueue(self.center.clone(), Notification::update(self.id));
        }
        self.shared.enqueue(
            self.center.clone(),
            Notification::new(NotificationKind::FinishedGathering, self.id),
        );
        Ok(())
    }

    fn stop(&self) {
        lock(&self.state).gathering = false;
    }

    fn is_gathering(&self) -> bool {
        lock(&self.state).gathering
    }

    fn result_count(&self) -> usize {
        lock(&self.state).results.len()
    }

    fn value_for_attribute(&self, index: usize, attribute: &str) -> Result<ResultValue> {
        let state = lock(&self.state);
        if state.fail_at == Some(index) {
            return Err(QueryError::AttributeFetch {
                index,
                attribute: attribute.to_string(),
                reason: "scripted failure".to_string(),
            });
        }
        let item = state.results.get(index).ok_or(QueryError::IndexOutOfRange {
            index,
            count: state.results.len(),
        })?;
        Ok(item.get(attribute).cloned().unwrap_or(ResultValue::Null))
    }

    fn take_failure(&self) -> Option<QueryError> {
        lock(&self.state).failure.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::NotificationRouter;

    fn center() -> Arc<NotificationCenter> {
        Arc::new(NotificationCenter::new(Arc::new(NotificationRouter::new())))
    }

    #[test]
    fn test_looks_malformed() {
        assert!(!looks_malformed("kMDItemContentType == 'public.folder'"));
        assert!(!looks_malformed("(a == 1) && (b == \"x)\")"));
        assert!(looks_malformed(""));
        assert!(looks_malformed("kMDItemFSName == 'open"));
        assert!(looks_malformed("(a == 1"));
        assert!(looks_malformed("a == 1)"));
    }

    #[test]
    fn test_start_queues_updates_then_finish() {
        let substrate = MemorySubstrate::new()
            .with_values("q", "kMDItemDisplayName", &["a", "b"])
            .with_updates("q", 2);
        let query = substrate.create_query(center()).unwrap();
        query.set_predicate(&Predicate::new("q")).unwrap();
        query.start().unwrap();
        query.start().unwrap();

        assert!(query.is_gathering());
        assert_eq!(substrate.pending(), 3);
        assert_eq!(query.result_count(), 2);
        assert_eq!(
            query.value_for_attribute(1, "kMDItemDisplayName").unwrap(),
            ResultValue::from("b")
        );
        assert!(query.value_for_attribute(0, "kMDItemPath").unwrap().is_null());
        assert!(matches!(
            query.value_for_attribute(2, "kMDItemDisplayName"),
            Err(QueryError::IndexOutOfRange { index: 2, count: 2 })
        ));
    }

    #[test]
    fn test_unscripted_predicate_gathers_nothing() {
        let substrate = MemorySubstrate::new();
        let query = substrate.create_query(center()).unwrap();
        query.set_predicate(&Predicate::new("kMDItemFSName == 'x'")).unwrap();
        query.start().unwrap();
        assert_eq!(query.result_count(), 0);
        assert_eq!(substrate.pending(), 1);
    }

    #[test]
    fn test_start_failures() {
        let substrate = MemorySubstrate::new().with_malformed("bad").with_denied("secret");
        let query = substrate.create_query(center()).unwrap();

        assert!(matches!(query.start(), Err(QueryError::MissingPredicate)));

        query.set_predicate(&Predicate::new("bad")).unwrap();
        assert!(matches!(query.start(), Err(QueryError::InvalidPredicate(_))));

        query.set_predicate(&Predicate::new("secret")).unwrap();
        assert!(matches!(query.start(), Err(QueryError::PermissionDenied(_))));

        assert!(!query.is_gathering());
        assert_eq!(substrate.pending(), 0);
    }

    #[test]
    fn test_run_once_statuses() {
        let substrate = MemorySubstrate::new();
        let center = center();
        let object = QueryObjectId::next();
        substrate.enqueue(center.clone(), Notification::update(object));
        substrate.enqueue(center, Notification::update(object));

        substrate.hold();
        assert_eq!(substrate.run_once_now(), RunLoopStatus::TimedOut);
        substrate.release();

        assert_eq!(substrate.run_once_now(), RunLoopStatus::HandledSource);
        assert_eq!(
            substrate.run_once(RunLoopMode::Default, Duration::ZERO, false),
            RunLoopStatus::Finished
        );
        assert_eq!(substrate.delivered(), 2);
        assert_eq!(substrate.run_once_calls(), 3);
    }

    #[test]
    fn test_gather_failure_is_taken_once() {
        let substrate = MemorySubstrate::new()
            .with_values("q", "kMDItemDisplayName", &["a"])
            .with_gather_failure("q", "index unavailable");
        let query = substrate.create_query(center()).unwrap();
        query.set_predicate(&Predicate::new("q")).unwrap();
        query.start().unwrap();

        assert_eq!(query.result_count(), 0);
        assert_eq!(substrate.pending(), 1);
        assert!(matches!(
            query.take_failure(),
            Some(QueryError::Substrate(reason)) if reason == "index unavailable"
        ));
        assert!(query.take_failure().is_none());
    }

    #[test]
    fn test_fixture_json() {
        let fixture = MemoryFixture::from_json(
            r#"{
                "queries": {
                    "kMDItemContentType == 'public.folder'": {
                        "updates": 1,
                        "results": [
                            { "kMDItemDisplayName": "Documents" },
                            { "kMDItemDisplayName": "Downloads" }
                        ]
                    },
                    "broken": { "malformed": true }
                }
            }"#,
        )
        .unwrap();
        let substrate = MemorySubstrate::from_fixture(fixture);

        let query = substrate.create_query(center()).unwrap();
        query
            .set_predicate(&Predicate::new("kMDItemContentType == 'public.folder'"))
            .unwrap();
        query.start().unwrap();
        assert_eq!(query.result_count(), 2);
        assert_eq!(substrate.pending(), 2);
    }
}
