//! Hot-reloadable configuration/authorization store
//!
//! The store owns one immutable [`Snapshot`] behind a versioned handle.
//! Writers build a complete new snapshot off to the side and install it with
//! a single pointer swap; readers dereference the handle once at the start of
//! their operation and never observe a half-applied reload.
//!
//! An optional background watcher observes the backing file and triggers
//! [`ConfigStore::reload`] on change, coalescing bursts: a change event is
//! acted on only if `min_interval` has elapsed since the last scheduled
//! reload, and events inside that window are dropped, not queued.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{AuthorizationPolicy, BackendConfig, Config};
use crate::{Error, Result};

/// One fully-formed, immutable configuration snapshot.
///
/// Built wholesale from a parsed [`Config`]; never mutated in place.
#[derive(Debug)]
pub struct Snapshot {
    /// Monotonic counter of applied reloads (1 = initial load)
    version: u64,
    /// Access-key hash → user id
    credentials: HashMap<String, String>,
    /// Authorization policy in force
    policy: AuthorizationPolicy,
    /// Backend slug → connection descriptor
    backends: HashMap<String, BackendConfig>,
    /// User id → subscribed backend slugs
    subscriptions: HashMap<String, Vec<String>>,
    /// The full parsed document (server identity, ssl, agent card)
    config: Config,
}

impl Snapshot {
    /// Build a snapshot from a parsed config. The version is assigned at
    /// install time.
    fn build(config: Config) -> Self {
        let mut credentials = HashMap::new();
        let mut subscriptions = HashMap::new();
        for (user_id, user) in &config.users {
            for key_hash in &user.keys {
                credentials.insert(key_hash.clone(), user_id.clone());
            }
            subscriptions.insert(user_id.clone(), user.subscribes.clone());
        }

        Self {
            version: 0,
            credentials,
            policy: config.server.authorization,
            backends: config.backends.clone(),
            subscriptions,
            config,
        }
    }

    fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Applied-reload counter.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The full parsed document backing this snapshot.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Published on every applied reload.
#[derive(Debug, Clone)]
pub struct ReloadNotice {
    /// Version of the snapshot that was installed
    pub version: u64,
    /// Users whose key set or subscription set changed (sorted)
    pub affected_users: Vec<String>,
}

/// Background watcher state, held while watching.
struct WatcherHandle {
    /// Kept alive to prevent the OS watcher from being dropped.
    _watcher: RecommendedWatcher,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Concurrently-reloadable configuration/authorization store.
///
/// Reads run fully in parallel; a reload acquires exclusive access only for
/// the instant of snapshot installation.
pub struct ConfigStore {
    path: PathBuf,
    snapshot: RwLock<Arc<Snapshot>>,
    reload_tx: broadcast::Sender<ReloadNotice>,
    watcher: Mutex<Option<WatcherHandle>>,
}

impl ConfigStore {
    /// Open the store, performing the initial load.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigRead`] / [`Error::ConfigParse`] when the
    /// backing file is unreadable or malformed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = Config::load(&path)?;
        let snapshot = Arc::new(Snapshot::build(config).with_version(1));
        let (reload_tx, _) = broadcast::channel(16);

        info!(path = %path.display(), "Configuration loaded");

        Ok(Self {
            path,
            snapshot: RwLock::new(snapshot),
            reload_tx,
            watcher: Mutex::new(None),
        })
    }

    /// The current snapshot handle. Readers dereference once per operation.
    #[must_use]
    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read())
    }

    /// Applied-reload counter of the live snapshot.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.current().version
    }

    /// Reload the backing file and atomically install a new snapshot.
    ///
    /// All-or-nothing: reading, parsing, and snapshot building happen outside
    /// any lock, and a failure at any point leaves the prior snapshot
    /// authoritative. The write lock is held only for the pointer swap.
    pub fn reload(&self) -> Result<()> {
        let config = Config::load(&self.path)?;
        let built = Snapshot::build(config);

        let (old, installed) = {
            let mut guard = self.snapshot.write();
            let old = Arc::clone(&guard);
            let installed = Arc::new(built.with_version(old.version + 1));
            *guard = Arc::clone(&installed);
            (old, installed)
        };

        let affected = affected_users(old.config(), installed.config());
        debug!(
            version = installed.version,
            affected = affected.len(),
            "Configuration reloaded"
        );
        let _ = self.reload_tx.send(ReloadNotice {
            version: installed.version,
            affected_users: affected,
        });

        Ok(())
    }

    /// Resolve a caller identity from an access-key hash.
    ///
    /// Empty input yields `Ok(None)` ("no identity"); an unknown hash is
    /// [`Error::NotFound`].
    pub fn resolve_user(&self, key_hash: &str) -> Result<Option<String>> {
        if key_hash.is_empty() {
            return Ok(None);
        }
        self.current()
            .credentials
            .get(key_hash)
            .cloned()
            .map(Some)
            .ok_or_else(|| Error::NotFound("no user for access key".to_string()))
    }

    /// Resolve a backend descriptor by slug. Returns a defensive copy.
    pub fn resolve_backend(&self, slug: &str) -> Result<BackendConfig> {
        self.current()
            .backends
            .get(slug)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("backend '{slug}'")))
    }

    /// The authorization policy in force.
    #[must_use]
    pub fn authorization_policy(&self) -> AuthorizationPolicy {
        self.current().policy
    }

    /// Backend slugs the user is subscribed to. Returns a defensive copy;
    /// unknown users get an empty list.
    #[must_use]
    pub fn user_subscriptions(&self, user_id: &str) -> Vec<String> {
        self.current()
            .subscriptions
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Subscribe to reload notifications.
    #[must_use]
    pub fn subscribe_reloads(&self) -> broadcast::Receiver<ReloadNotice> {
        self.reload_tx.subscribe()
    }

    /// Start the background file watcher. Idempotent: a second start while
    /// watching is a no-op.
    ///
    /// The watcher observes the file's parent directory, so a missing file at
    /// start time is a soft failure - a file created later is picked up.
    ///
    /// # Errors
    ///
    /// Returns an error only if the underlying OS watcher cannot be created.
    pub fn start_watching(self: Arc<Self>, min_interval: Duration) -> Result<()> {
        let mut guard = self.watcher.lock();
        if guard.is_some() {
            debug!("Config watcher already running, start ignored");
            return Ok(());
        }

        let (event_tx, event_rx) = mpsc::channel(32);
        let watcher = create_notify_watcher(event_tx, &self.path)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = spawn_reload_task(Arc::clone(&self), min_interval, event_rx, shutdown_rx);

        *guard = Some(WatcherHandle {
            _watcher: watcher,
            shutdown_tx,
            task,
        });
        info!(path = %self.path.display(), interval = ?min_interval, "Config watcher started");
        Ok(())
    }

    /// Stop the background watcher and wait for it to exit.
    ///
    /// Idempotent: stopping a stopped store is a no-op. On return the
    /// background task has fully exited; no reload can land afterwards.
    pub async fn stop_watching(&self) {
        let handle = self.watcher.lock().take();
        let Some(WatcherHandle {
            _watcher,
            shutdown_tx,
            task,
        }) = handle
        else {
            debug!("Config watcher not running, stop ignored");
            return;
        };

        // Dropping the OS watcher first stops new events at the source.
        drop(_watcher);
        let _ = shutdown_tx.send(true);
        if let Err(e) = task.await {
            warn!(error = %e, "Config watcher task join failed");
        }
        info!("Config watcher stopped");
    }

    /// Whether the background watcher is currently running.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.watcher.lock().is_some()
    }
}

/// Users whose key set or subscription set differs between two documents.
///
/// Pure function over the parsed configs; sorted for deterministic output.
#[must_use]
pub fn affected_users(old: &Config, new: &Config) -> Vec<String> {
    let mut affected = Vec::new();

    let user_ids: HashSet<&String> = old.users.keys().chain(new.users.keys()).collect();
    for user_id in user_ids {
        let changed = match (old.users.get(user_id), new.users.get(user_id)) {
            (Some(a), Some(b)) => {
                let a_keys: HashSet<&String> = a.keys.iter().collect();
                let b_keys: HashSet<&String> = b.keys.iter().collect();
                a_keys != b_keys || a.subscribes != b.subscribes
            }
            // added or removed
            _ => true,
        };
        if changed {
            affected.push(user_id.clone());
        }
    }

    affected.sort_unstable();
    affected
}

/// Create the low-level `notify` watcher on the config file's parent
/// directory, funneling relevant events into `event_tx`.
fn create_notify_watcher(
    event_tx: mpsc::Sender<()>,
    config_path: &Path,
) -> Result<RecommendedWatcher> {
    let watch_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    let file_name = config_path.file_name().map(std::ffi::OsStr::to_os_string);

    let mut watcher = RecommendedWatcher::new(
        move |result: std::result::Result<Event, notify::Error>| {
            let is_relevant = result
                .as_ref()
                .is_ok_and(|e| is_config_event(e, file_name.as_deref()));
            if is_relevant {
                let _ = event_tx.try_send(());
            }
        },
        NotifyConfig::default().with_poll_interval(Duration::from_secs(2)),
    )
    .map_err(|e| Error::Internal(format!("Failed to create config watcher: {e}")))?;

    watcher
        .watch(&watch_dir, RecursiveMode::NonRecursive)
        .map_err(|e| Error::Internal(format!("Failed to watch config directory: {e}")))?;

    Ok(watcher)
}

/// Returns `true` for create/modify events touching the watched file.
fn is_config_event(event: &Event, file_name: Option<&std::ffi::OsStr>) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == file_name)
}

/// Spawn the debounced reload loop.
///
/// Leading-edge throttle: the first event after a quiet period reloads
/// immediately; the last-scheduled timestamp is updated before the reload
/// runs so overlapping events cannot pile up behind a slow reload.
fn spawn_reload_task(
    store: Arc<ConfigStore>,
    min_interval: Duration,
    mut event_rx: mpsc::Receiver<()>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_scheduled: Option<Instant> = None;

        loop {
            tokio::select! {
                maybe_event = event_rx.recv() => {
                    let Some(()) = maybe_event else { break };

                    if last_scheduled.is_some_and(|t| t.elapsed() < min_interval) {
                        debug!("Change event inside debounce window, dropped");
                        continue;
                    }
                    last_scheduled = Some(Instant::now());

                    if let Err(e) = store.reload() {
                        warn!(error = %e, "Reload failed, keeping last-good snapshot");
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("Config watcher task exited");
    })
}
