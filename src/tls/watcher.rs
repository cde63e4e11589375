//! Certificate file watcher for live credential reload.
//!
//! `CredentialWatcher::start` loads the pair once, subscribes to change
//! notifications for both files and spawns a single reload task. The task
//! is the only writer of the active credential; handshakes read it through
//! `CredentialResolver` without taking a lock.
//!
//! When a watched file is removed (or renamed away) the kernel drops the
//! watch with it. The task then recreates an empty placeholder at the path
//! and watches it again so that the next write is still seen.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use notify::event::{AccessKind, AccessMode, ModifyKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use crate::observability::metrics;
use crate::tls::credential::{Credential, CredentialError};
use crate::tls::resolver::CredentialResolver;

const EVENT_QUEUE_CAPACITY: usize = 64;

/// Fatal errors from `CredentialWatcher::start`.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("can't load cert or key file: {0}")]
    StartupLoad(#[from] CredentialError),

    #[error("can't create file watcher: {0}")]
    Notifier(#[source] notify::Error),

    #[error("can't watch {path}: {source}")]
    Subscription {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// How a filesystem event affects the watched pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChangeKind {
    /// Content may have changed.
    Write,
    /// The path no longer refers to the watched file; the watch is gone.
    Remove,
    /// Anything else the notifier could not classify.
    Other,
    /// Read-only access. Ignored, the reload itself produces these.
    Read,
}

impl From<&EventKind> for ChangeKind {
    fn from(kind: &EventKind) -> Self {
        match kind {
            EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Remove,
            EventKind::Create(_)
            | EventKind::Modify(_)
            | EventKind::Access(AccessKind::Close(AccessMode::Write)) => ChangeKind::Write,
            EventKind::Access(_) => ChangeKind::Read,
            EventKind::Any | EventKind::Other => ChangeKind::Other,
        }
    }
}

/// Owns the active server credential and keeps it in sync with disk.
pub struct CredentialWatcher {
    current: Arc<ArcSwap<Credential>>,
    cert_path: PathBuf,
    key_path: PathBuf,
    stop_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CredentialWatcher {
    /// Load the pair and start watching both files.
    ///
    /// Nothing is subscribed and no task is spawned if the initial load
    /// fails. Must be called from within a Tokio runtime.
    pub fn start(
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
    ) -> Result<Self, WatchError> {
        let cert_path = absolute(cert_path.as_ref());
        let key_path = absolute(key_path.as_ref());

        let initial = Credential::load(&cert_path, &key_path)?;
        tracing::info!(
            cert = %cert_path.display(),
            key = %key_path.display(),
            "Certificate and key loaded"
        );

        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let overflowed = Arc::new(AtomicBool::new(false));
        let overflow_flag = Arc::clone(&overflowed);

        let mut subscription = RecommendedWatcher::new(
            move |res: notify::Result<Event>| forward(&event_tx, &overflow_flag, res),
            notify::Config::default(),
        )
        .map_err(WatchError::Notifier)?;

        for path in [&cert_path, &key_path] {
            subscription
                .watch(path, RecursiveMode::NonRecursive)
                .map_err(|source| WatchError::Subscription {
                    path: path.clone(),
                    source,
                })?;
        }

        let current = Arc::new(ArcSwap::from_pointee(initial));
        let (stop_tx, stop_rx) = watch::channel(false);

        let reload_loop = ReloadLoop {
            current: Arc::clone(&current),
            cert_path: cert_path.clone(),
            key_path: key_path.clone(),
            subscription,
            events: event_rx,
            overflowed,
            stop: stop_rx,
        };
        let task = tokio::spawn(reload_loop.run());

        tracing::info!(
            cert = %cert_path.display(),
            key = %key_path.display(),
            "Certificate watcher started"
        );

        Ok(Self {
            current,
            cert_path,
            key_path,
            stop_tx,
            task: Mutex::new(Some(task)),
        })
    }

    /// The most recently loaded credential. Never blocks on a reload.
    pub fn current(&self) -> Arc<Credential> {
        self.current.load_full()
    }

    /// Certificate source for the TLS acceptor.
    pub fn resolver(&self) -> Arc<CredentialResolver> {
        Arc::new(CredentialResolver::new(Arc::clone(&self.current)))
    }

    pub fn cert_path(&self) -> &Path {
        &self.cert_path
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    /// Stop the reload task and close the subscription.
    ///
    /// The stop signal is sent once; later calls return immediately.
    pub async fn stop(&self) {
        let signalled = self
            .stop_tx
            .send_if_modified(|stopped| !std::mem::replace(stopped, true));
        if signalled {
            tracing::debug!("Certificate watcher stop requested");
        }

        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Certificate watcher task failed");
            }
        }
    }
}

impl std::fmt::Debug for CredentialWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialWatcher")
            .field("cert_path", &self.cert_path)
            .field("key_path", &self.key_path)
            .field("stopped", &*self.stop_tx.borrow())
            .finish()
    }
}

/// Runs on the notifier's thread, so it must never block.
fn forward(
    tx: &mpsc::Sender<notify::Result<Event>>,
    overflowed: &AtomicBool,
    res: notify::Result<Event>,
) {
    if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(res) {
        // queued events already guarantee a reload; the flag covers a lost removal
        overflowed.store(true, Ordering::Release);
    }
}

struct ReloadLoop {
    current: Arc<ArcSwap<Credential>>,
    cert_path: PathBuf,
    key_path: PathBuf,
    subscription: RecommendedWatcher,
    events: mpsc::Receiver<notify::Result<Event>>,
    overflowed: Arc<AtomicBool>,
    stop: watch::Receiver<bool>,
}

impl ReloadLoop {
    async fn run(mut self) {
        loop {
            let event = tokio::select! {
                biased;
                // Err means the watcher was dropped, which also stops us
                _ = self.stop.changed() => None,
                event = self.events.recv() => event,
            };
            let Some(first) = event else { break };

            // file IO and re-subscription block; keep them off the async workers
            let handled = tokio::task::spawn_blocking(move || {
                self.handle_batch(first);
                self
            })
            .await;
            match handled {
                Ok(reload_loop) => self = reload_loop,
                Err(e) => {
                    tracing::error!(error = %e, "Certificate reload failed unexpectedly, watcher stopped");
                    return;
                }
            }
        }

        tracing::info!("Stopped watching certificate files");
        // dropping self closes the subscription
    }

    fn handle_batch(&mut self, first: notify::Result<Event>) {
        let mut reload = self.apply(first);
        while let Ok(next) = self.events.try_recv() {
            reload |= self.apply(next);
        }
        if self.overflowed.swap(false, Ordering::AcqRel) {
            tracing::debug!("Watch event queue overflowed, re-subscribing both files");
            for path in [self.cert_path.clone(), self.key_path.clone()] {
                self.repair(&path);
            }
            reload = true;
        }

        if reload {
            self.reload();
        }
    }

    /// Returns whether the event calls for a reload.
    fn apply(&mut self, event: notify::Result<Event>) -> bool {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(error = %e, "Error watching certificate files");
                return false;
            }
        };
        tracing::debug!(kind = ?event.kind, paths = ?event.paths, "Watch event");

        match ChangeKind::from(&event.kind) {
            ChangeKind::Read => false,
            ChangeKind::Write | ChangeKind::Other => true,
            ChangeKind::Remove => {
                let mut targets: Vec<PathBuf> = [&self.cert_path, &self.key_path]
                    .into_iter()
                    .filter(|watched| event.paths.iter().any(|p| p == *watched))
                    .cloned()
                    .collect();
                if targets.is_empty() {
                    targets = vec![self.cert_path.clone(), self.key_path.clone()];
                }
                for path in &targets {
                    self.repair(path);
                }
                true
            }
        }
    }

    /// Recreate a removed file and watch it again.
    fn repair(&mut self, path: &Path) {
        // no truncation: the replacement may already be in place
        let recreated = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path);
        if let Err(e) = &recreated {
            tracing::error!(
                path = %path.display(),
                error = %e,
                "Can't re-spawn removed certificate file, changes to it will be missed"
            );
        }

        let watched = self.subscription.watch(path, RecursiveMode::NonRecursive);
        match &watched {
            Ok(()) => tracing::info!(path = %path.display(), "Re-subscribed to certificate file"),
            Err(e) => tracing::error!(path = %path.display(), error = %e, "Can't re-add watch"),
        }

        metrics::record_watch_repair(recreated.is_ok() && watched.is_ok());
    }

    fn reload(&self) {
        match Credential::load(&self.cert_path, &self.key_path) {
            Ok(credential) => {
                self.current.store(Arc::new(credential));
                tracing::info!("Certificate and key reloaded");
                metrics::record_certificate_reload(true);
            }
            Err(e) => {
                tracing::error!(error = %e, "Can't reload cert or key file, keeping the current one");
                metrics::record_certificate_reload(false);
            }
        }
    }
}

/// Notifiers report absolute paths; compare against the same form.
fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}
