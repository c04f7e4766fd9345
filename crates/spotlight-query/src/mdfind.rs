//! Substrate backed by the platform metadata index through `mdfind`
//!
//! Each started query spawns one `mdfind -0 <predicate>` process. Its output
//! is read on a helper thread and collected without blocking during
//! `run_once`. When the process exits the query posts "finished gathering";
//! a failing exit is kept as the query's failure and reported through
//! `take_failure`. Attribute values other than the path are read with `mdls`.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use spotlight_core::{attributes, Notification, Predicate, QueryObjectId, ResultValue};

use crate::center::NotificationCenter;
use crate::traits::{MetadataQuery, QueryError, Result, RunLoopMode, RunLoopStatus, Substrate};

/// Sleep between service attempts while waiting out a non-zero timeout
const RETRY_PAUSE: Duration = Duration::from_millis(5);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone)]
struct Tools {
    mdfind: PathBuf,
    mdls: PathBuf,
    onlyin: Option<PathBuf>,
}

/// Substrate that shells out to `mdfind` and `mdls`
pub struct MdfindSubstrate {
    tools: Tools,
    queries: Mutex<Vec<Weak<MdfindQuery>>>,
}

impl Default for MdfindSubstrate {
    fn default() -> Self {
        Self::new()
    }
}

impl MdfindSubstrate {
    pub fn new() -> Self {
        Self {
            tools: Tools {
                mdfind: PathBuf::from("mdfind"),
                mdls: PathBuf::from("mdls"),
                onlyin: None,
            },
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn with_mdfind(mut self, path: impl Into<PathBuf>) -> Self {
        self.tools.mdfind = path.into();
        self
    }

    pub fn with_mdls(mut self, path: impl Into<PathBuf>) -> Self {
        self.tools.mdls = path.into();
        self
    }

    /// Restrict searches to one directory tree
    pub fn with_onlyin(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tools.onlyin = Some(dir.into());
        self
    }

    fn live_queries(&self) -> Vec<Arc<MdfindQuery>> {
        let mut queries = lock(&self.queries);
        queries.retain(|q| q.strong_count() > 0);
        queries.iter().filter_map(Weak::upgrade).collect()
    }

    /// Service every query once; returns whether a notification was posted
    fn service_all(&self, stop_after_first: bool) -> bool {
        let mut handled = false;
        for query in self.live_queries() {
            if let Some(notification) = query.service() {
                query.center.post(&notification);
                handled = true;
                if stop_after_first {
                    break;
                }
            }
        }
        handled
    }
}

impl Substrate for MdfindSubstrate {
    fn create_query(&self, center: Arc<NotificationCenter>) -> Result<Arc<dyn MetadataQuery>> {
        let query = Arc::new(MdfindQuery {
            id: QueryObjectId::next(),
            tools: self.tools.clone(),
            center,
            state: Mutex::new(MdfindState::default()),
        });
        lock(&self.queries).push(Arc::downgrade(&query));
        Ok(query)
    }

    fn run_once(
        &self,
        _mode: RunLoopMode,
        timeout: Duration,
        return_after_source_handled: bool,
    ) -> RunLoopStatus {
        let deadline = Instant::now() + timeout;
        let mut handled = false;
        loop {
            if self.service_all(return_after_source_handled) {
                handled = true;
                if return_after_source_handled {
                    return RunLoopStatus::HandledSource;
                }
                continue;
            }

            if !self.live_queries().iter().any(|q| q.is_gathering()) {
                return RunLoopStatus::Finished;
            }
            let now = Instant::now();
            if now >= deadline {
                return if handled {
                    RunLoopStatus::Finished
                } else {
                    RunLoopStatus::TimedOut
                };
            }
            std::thread::sleep(RETRY_PAUSE.min(deadline - now));
        }
    }
}

struct Gather {
    child: Child,
    paths: Receiver<String>,
    stderr: Option<JoinHandle<String>>,
}

impl Gather {
    /// Last non-empty line the process wrote to stderr
    fn last_error_line(&mut self, id: QueryObjectId) -> String {
        let Some(reader) = self.stderr.take() else {
            return String::new();
        };
        match reader.join() {
            Ok(text) => text
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or_default()
                .trim()
                .to_string(),
            Err(_) => {
                tracing::trace!("stderr reader for {} panicked", id);
                String::new()
            }
        }
    }
}

#[derive(Default)]
struct MdfindState {
    predicate: Option<Predicate>,
    gather: Option<Gather>,
    results: Vec<PathBuf>,
    failure: Option<QueryError>,
}

struct MdfindQuery {
    id: QueryObjectId,
    tools: Tools,
    center: Arc<NotificationCenter>,
    state: Mutex<MdfindState>,
}

impl MdfindQuery {
    /// Collect whatever output is available. Returns "finished gathering"
    /// once the process has exited, whether or not it succeeded.
    fn service(&self) -> Option<Notification> {
        let mut guard = lock(&self.state);
        let MdfindState {
            gather,
            results,
            failure,
            ..
        } = &mut *guard;
        let running = gather.as_mut()?;

        loop {
            match running.paths.try_recv() {
                Ok(path) => {
                    if !path.is_empty() {
                        results.push(PathBuf::from(path));
                    }
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => break,
            }
        }

        // Output is closed; finish once the process has been reaped.
        match running.child.try_wait() {
            Ok(None) => None,
            Ok(Some(status)) => {
                let mut finished = gather.take()?;
                let stderr = finished.last_error_line(self.id);
                if status.success() {
                    tracing::debug!("mdfind for {} gathered {} paths", self.id, results.len());
                } else {
                    tracing::warn!("mdfind for {} failed ({}): {}", self.id, status, stderr);
                    results.clear();
                    *failure = Some(QueryError::Substrate(format!(
                        "mdfind exited with {}: {}",
                        status, stderr
                    )));
                }
                Some(Notification::finished_gathering(self.id))
            }
            Err(e) => {
                tracing::warn!("Could not reap mdfind for {}: {}", self.id, e);
                gather.take();
                results.clear();
                *failure = Some(QueryError::Substrate(format!("could not reap mdfind: {}", e)));
                Some(Notification::finished_gathering(self.id))
            }
        }
    }

    fn spawn(&self, predicate: &Predicate) -> Result<Gather> {
        let mut command = Command::new(&self.tools.mdfind);
        command.arg("-0");
        if let Some(dir) = &self.tools.onlyin {
            command.arg("-onlyin").arg(dir);
        }
        command
            .arg(predicate.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|e| {
            QueryError::Substrate(format!("failed to launch {}: {}", self.tools.mdfind.display(), e))
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| QueryError::Internal("mdfind stdout not captured".to_string()))?;

        let (tx, paths) = mpsc::channel();
        std::thread::spawn(move || {
            for chunk in BufReader::new(stdout).split(b'\0') {
                let Ok(bytes) = chunk else { break };
                let path = String::from_utf8_lossy(&bytes).trim_end_matches('\n').to_string();
                if tx.send(path).is_err() {
                    break;
                }
            }
        });

        // Drained concurrently so a chatty process cannot block on a full pipe.
        let stderr = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut text = String::new();
                if let Err(e) = pipe.read_to_string(&mut text) {
                    tracing::trace!("Reading mdfind stderr failed: {}", e);
                }
                text
            })
        });

        Ok(Gather {
            child,
            paths,
            stderr,
        })
    }

    fn path_at(&self, index: usize) -> Result<PathBuf> {
        let state = lock(&self.state);
        state
            .results
            .get(index)
            .cloned()
            .ok_or(QueryError::IndexOutOfRange {
                index,
                count: state.results.len(),
            })
    }
}

impl MetadataQuery for MdfindQuery {
    fn object_id(&self) -> QueryObjectId {
        self.id
    }

    fn set_predicate(&self, predicate: &Predicate) -> Result<()> {
        if predicate.as_str().trim().is_empty() {
            return Err(QueryError::InvalidPredicate("empty query".to_string()));
        }
        lock(&self.state).predicate = Some(predicate.clone());
        Ok(())
    }

    fn start(&self) -> Result<()> {
        let mut state = lock(&self.state);
        if state.gather.is_some() {
            return Ok(());
        }
        let predicate = state.predicate.clone().ok_or(QueryError::MissingPredicate)?;
        let gather = self.spawn(&predicate)?;
        tracing::debug!("Spawned mdfind for {}: {}", self.id, predicate);
        state.results.clear();
        state.failure = None;
        state.gather = Some(gather);
        Ok(())
    }

    fn stop(&self) {
        let Some(mut gather) = lock(&self.state).gather.take() else {
            return;
        };
        if let Err(e) = gather.child.kill() {
            tracing::trace!("mdfind for {} already exited: {}", self.id, e);
        }
        if let Err(e) = gather.child.wait() {
            tracing::trace!("Could not reap mdfind for {}: {}", self.id, e);
        }
    }

    fn is_gathering(&self) -> bool {
        lock(&self.state).gather.is_some()
    }

    fn result_count(&self) -> usize {
        lock(&self.state).results.len()
    }

    fn value_for_attribute(&self, index: usize, attribute: &str) -> Result<ResultValue> {
        let path = self.path_at(index)?;
        match attribute {
            attributes::PATH => Ok(ResultValue::String(path.display().to_string())),
            attributes::FS_NAME => Ok(path
                .file_name()
                .map(|name| ResultValue::String(name.to_string_lossy().into_owned()))
                .unwrap_or(ResultValue::Null)),
            _ => read_attribute(&self.tools.mdls, &path, attribute).map_err(|reason| {
                QueryError::AttributeFetch {
                    index,
                    attribute: attribute.to_string(),
                    reason,
                }
            }),
        }
    }

    fn take_failure(&self) -> Option<QueryError> {
        lock(&self.state).failure.take()
    }
}

fn read_attribute(
    mdls: &Path,
    path: &Path,
    attribute: &str,
) -> std::result::Result<ResultValue, String> {
    let output = Command::new(mdls)
        .args(["-raw", "-name", attribute])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| format!("failed to launch {}: {}", mdls.display(), e))?;
    if !output.status.success() {
        return Err(String::from_utf8_lossy(&output.stderr).trim().to_string());
    }
    Ok(parse_mdls_value(&String::from_utf8_lossy(&output.stdout)))
}

/// Interpret one `mdls -raw` value
pub fn parse_mdls_value(raw: &str) -> ResultValue {
    let raw = raw.trim_end_matches(['\0', '\n']);
    if raw == "(null)" {
        return ResultValue::Null;
    }
    if let Some(body) = raw.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        let items = body
            .split(",\n")
            .map(|item| item.trim().trim_matches('"').to_string())
            .filter(|item| !item.is_empty())
            .collect();
        return ResultValue::List(items);
    }
    if let Ok(date) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z") {
        return ResultValue::Date(date.with_timezone(&Utc));
    }
    if let Ok(number) = raw.parse::<f64>() {
        return ResultValue::Number(number);
    }
    ResultValue::String(raw.to_string())
}
