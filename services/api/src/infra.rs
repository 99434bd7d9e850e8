use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use loanguard::lending::{
    AlertError, AlertNotifier, DecisionRow, DecisionStore, DriftAlert, StoreError,
    StoredDecision,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryDecisionStore {
    rows: Arc<Mutex<Vec<StoredDecision>>>,
}

impl DecisionStore for InMemoryDecisionStore {
    fn append(&self, row: DecisionRow) -> Result<StoredDecision, StoreError> {
        let mut guard = self
            .rows
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))?;
        let stored = StoredDecision {
            id: guard.len() as u64 + 1,
            row,
        };
        guard.push(stored.clone());
        Ok(stored)
    }

    fn since(&self, cutoff: DateTime<Utc>) -> Result<Vec<StoredDecision>, StoreError> {
        let guard = self
            .rows
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))?;
        Ok(guard
            .iter()
            .filter(|decision| decision.row.created_at >= cutoff)
            .cloned()
            .collect())
    }

    fn all(&self) -> Result<Vec<StoredDecision>, StoreError> {
        let guard = self
            .rows
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))?;
        Ok(guard.iter().rev().cloned().collect())
    }
}

/// Append-only audit file holding one JSON object per decision.
///
/// The file is read once on open; reads are served from the entries kept in memory.
pub(crate) struct JsonLinesDecisionStore {
    path: PathBuf,
    state: Mutex<LogState>,
}

struct LogState {
    next_id: u64,
    decisions: Vec<StoredDecision>,
}

impl JsonLinesDecisionStore {
    /// Open (or create on first append) the log at `path`, resuming id assignment.
    pub(crate) fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| unavailable(&path, err))?;
        }

        let contents = read_log(&path)?;
        match contents.tail {
            LogTail::Clean => {}
            LogTail::Torn => {
                let file = OpenOptions::new()
                    .write(true)
                    .open(&path)
                    .map_err(|err| unavailable(&path, err))?;
                file.set_len(contents.intact_len)
                    .map_err(|err| unavailable(&path, err))?;
            }
            LogTail::Unterminated => {
                let mut file = OpenOptions::new()
                    .append(true)
                    .open(&path)
                    .map_err(|err| unavailable(&path, err))?;
                file.write_all(b"\n").map_err(|err| unavailable(&path, err))?;
            }
        }

        let last_id = contents
            .decisions
            .iter()
            .map(|decision| decision.id)
            .max()
            .unwrap_or(0);
        info!(
            path = %path.display(),
            last_id,
            entries = contents.decisions.len(),
            "decision log opened"
        );
        Ok(Self {
            path,
            state: Mutex::new(LogState {
                next_id: last_id + 1,
                decisions: contents.decisions,
            }),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LogState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("decision log mutex poisoned".to_string()))
    }
}

impl DecisionStore for JsonLinesDecisionStore {
    fn append(&self, row: DecisionRow) -> Result<StoredDecision, StoreError> {
        let mut state = self.lock()?;
        let stored = StoredDecision {
            id: state.next_id,
            row,
        };

        let mut line = serde_json::to_string(&stored)
            .map_err(|err| StoreError::Unavailable(format!("unable to encode decision: {err}")))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| unavailable(&self.path, err))?;
        let intact_len = file
            .metadata()
            .map_err(|err| unavailable(&self.path, err))?
            .len();
        if let Err(err) = file.write_all(line.as_bytes()) {
            // A partial line would make every later read fail.
            if let Err(truncate_err) = file.set_len(intact_len) {
                warn!(
                    path = %self.path.display(),
                    error = %truncate_err,
                    "unable to roll back partial decision entry"
                );
            }
            return Err(unavailable(&self.path, err));
        }

        state.next_id += 1;
        state.decisions.push(stored.clone());
        Ok(stored)
    }

    fn since(&self, cutoff: DateTime<Utc>) -> Result<Vec<StoredDecision>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .decisions
            .iter()
            .filter(|decision| decision.row.created_at >= cutoff)
            .cloned()
            .collect())
    }

    fn all(&self) -> Result<Vec<StoredDecision>, StoreError> {
        let state = self.lock()?;
        Ok(state.decisions.iter().rev().cloned().collect())
    }
}

fn unavailable(path: &Path, err: std::io::Error) -> StoreError {
    StoreError::Unavailable(format!("{}: {err}", path.display()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogTail {
    Clean,
    /// Final entry parsed but lacks its newline.
    Unterminated,
    /// Final entry was cut off mid-write and is dropped.
    Torn,
}

struct LogContents {
    decisions: Vec<StoredDecision>,
    intact_len: u64,
    tail: LogTail,
}

fn read_log(path: &Path) -> Result<LogContents, StoreError> {
    let mut contents = LogContents {
        decisions: Vec::new(),
        intact_len: 0,
        tail: LogTail::Clean,
    };
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(contents),
        Err(err) => return Err(unavailable(path, err)),
    };

    let mut reader = BufReader::new(file);
    let mut buffer = String::new();
    let mut line = 0;
    loop {
        buffer.clear();
        let read = reader
            .read_line(&mut buffer)
            .map_err(|err| unavailable(path, err))?;
        if read == 0 {
            break;
        }
        line += 1;
        let terminated = buffer.ends_with('\n');
        let entry = buffer.trim();

        if !entry.is_empty() {
            match serde_json::from_str(entry) {
                Ok(decision) => contents.decisions.push(decision),
                Err(err) if !terminated => {
                    warn!(
                        path = %path.display(),
                        line,
                        error = %err,
                        "dropping incomplete final decision entry"
                    );
                    contents.tail = LogTail::Torn;
                    break;
                }
                Err(err) => {
                    return Err(StoreError::Corrupt {
                        line,
                        reason: err.to_string(),
                    })
                }
            }
            if !terminated {
                contents.tail = LogTail::Unterminated;
            }
        }
        contents.intact_len += read as u64;
    }
    Ok(contents)
}

/// Store selected from configuration at startup.
pub(crate) enum DecisionLog {
    Memory(InMemoryDecisionStore),
    JsonLines(JsonLinesDecisionStore),
}

impl DecisionLog {
    pub(crate) fn from_path(path: Option<&Path>) -> Result<Self, StoreError> {
        match path {
            Some(path) => Ok(Self::JsonLines(JsonLinesDecisionStore::open(path)?)),
            None => {
                warn!("DECISION_LOG_PATH not set; decisions are kept in memory only");
                Ok(Self::Memory(InMemoryDecisionStore::default()))
            }
        }
    }
}

impl DecisionStore for DecisionLog {
    fn append(&self, row: DecisionRow) -> Result<StoredDecision, StoreError> {
        match self {
            DecisionLog::Memory(store) => store.append(row),
            DecisionLog::JsonLines(store) => store.append(row),
        }
    }

    fn since(&self, cutoff: DateTime<Utc>) -> Result<Vec<StoredDecision>, StoreError> {
        match self {
            DecisionLog::Memory(store) => store.since(cutoff),
            DecisionLog::JsonLines(store) => store.since(cutoff),
        }
    }

    fn all(&self) -> Result<Vec<StoredDecision>, StoreError> {
        match self {
            DecisionLog::Memory(store) => store.all(),
            DecisionLog::JsonLines(store) => store.all(),
        }
    }
}

/// Writes drift alerts to the service log.
#[derive(Default, Clone)]
pub(crate) struct LogNotifier;

impl AlertNotifier for LogNotifier {
    fn notify(&self, alert: DriftAlert) -> Result<(), AlertError> {
        warn!(
            accuracy_7d = alert.accuracy_7d,
            accuracy_baseline = alert.accuracy_baseline,
            sample_size = alert.sample_size,
            "model drift detected"
        );
        Ok(())
    }
}

/// Posts drift alerts to an HTTP endpoint without holding up the request that detected them.
#[derive(Clone)]
pub(crate) struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub(crate) fn new(url: String, timeout: Duration) -> Result<Self, AlertError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AlertError::Transport(format!("failed to build webhook client: {err}")))?;
        Ok(Self { client, url })
    }

    pub(crate) async fn deliver(&self, alert: &DriftAlert) -> Result<(), AlertError> {
        let payload = json!({
            "event": "model_drift",
            "accuracy_7d": alert.accuracy_7d,
            "accuracy_baseline": alert.accuracy_baseline,
            "sample_size": alert.sample_size,
            "detected_at": alert.detected_at,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|err| AlertError::Transport(format!("webhook request failed: {err}")))?;

        if !response.status().is_success() {
            return Err(AlertError::Transport(format!(
                "webhook returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

impl AlertNotifier for WebhookNotifier {
    fn notify(&self, alert: DriftAlert) -> Result<(), AlertError> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|err| AlertError::Transport(format!("no async runtime for webhook: {err}")))?;
        let notifier = self.clone();
        handle.spawn(async move {
            match notifier.deliver(&alert).await {
                Ok(()) => info!(url = %notifier.url, "drift webhook delivered"),
                Err(err) => warn!(error = %err, "drift webhook delivery failed"),
            }
        });
        Ok(())
    }
}

/// Alert channel selected from configuration at startup.
pub(crate) enum ConfiguredNotifier {
    Log(LogNotifier),
    Webhook(WebhookNotifier),
}

impl ConfiguredNotifier {
    pub(crate) fn from_webhook(url: Option<String>, timeout: Duration) -> Result<Self, AlertError> {
        match url {
            Some(url) => Ok(Self::Webhook(WebhookNotifier::new(url, timeout)?)),
            None => Ok(Self::Log(LogNotifier)),
        }
    }
}

impl AlertNotifier for ConfiguredNotifier {
    fn notify(&self, alert: DriftAlert) -> Result<(), AlertError> {
        match self {
            ConfiguredNotifier::Log(notifier) => notifier.notify(alert),
            ConfiguredNotifier::Webhook(notifier) => notifier.notify(alert),
        }
    }
}
