// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Mobile node.
//!
//! Serves the files below a root directory under its current (foreign)
//! namespace and keeps its home agent informed of where that is:
//!
//! ```text
//! Starting --REGISTER acked--> Registered --> Running --shutdown--> Stopped
//!     \                                                              ^
//!      `--------- rejected / timed out / face error ----------------'
//! ```
//!
//! While running, a REDIRECT naming the current namespace is sent right away
//! and then once per refresh period. [`MobileNode::move_to`] switches the
//! served namespace and sends a REDIRECT immediately.

use crate::config::{ConfigError, MobileNodeConfig};
use crate::face::{copy_chunked, Face, FaceError, InterestHandler};
use crate::name::Name;
use crate::packet::{Data, Interest};
use crate::protocol::{redirect_name, register_name, remove_name, Ack, COMMAND_ROOT};
use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::{oneshot, Mutex, Notify};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Lifecycle of a mobile node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Registered,
    Running,
    Stopped,
}

/// Mobile node errors.
#[derive(Debug, Error)]
pub enum MobileError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Face error: {0}")]
    Face(#[from] FaceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("home agent rejected registration of {0}")]
    RegistrationRejected(Name),

    #[error("no answer to registration of {0}")]
    RegistrationTimeout(Name),

    #[error("name does not map to a file: {0}")]
    InvalidPath(String),

    #[error("mobile node is {0:?}")]
    WrongPhase(Phase),
}

struct NodeState {
    phase: Phase,
    current: Name,
}

struct Inner {
    face: Arc<dyn Face>,
    root: PathBuf,
    home: Name,
    forward_asap: bool,
    refresh_rate: Duration,
    register_timeout: Duration,
    chunk_size: usize,
    state: Mutex<NodeState>,
    shutdown: Notify,
}

/// Node-side end of the mobility protocol.
#[derive(Clone)]
pub struct MobileNode {
    inner: Arc<Inner>,
}

impl MobileNode {
    /// Create a mobile node on `face`.
    pub fn new(face: Arc<dyn Face>, config: &MobileNodeConfig) -> Result<Self, MobileError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                face,
                root: config.root_directory.clone(),
                home: config.home_name()?,
                forward_asap: config.forward_asap,
                refresh_rate: config.refresh_rate(),
                register_timeout: config.register_timeout(),
                chunk_size: config.chunk_size,
                state: Mutex::new(NodeState {
                    phase: Phase::Starting,
                    current: config.foreign_name()?,
                }),
                shutdown: Notify::new(),
            }),
        })
    }

    /// Serve the current namespace, register with the home agent and start
    /// the refresh timer.
    ///
    /// On failure the node ends up [`Phase::Stopped`] with its filter removed.
    pub async fn start(&self) -> Result<(), MobileError> {
        let current = {
            let state = self.inner.state.lock().await;
            if state.phase != Phase::Starting {
                return Err(MobileError::WrongPhase(state.phase));
            }
            state.current.clone()
        };

        self.inner
            .face
            .register_filter(&current, Arc::new(self.clone()))
            .await?;
        info!("Serving {} from {}", current, self.inner.root.display());

        if let Err(e) = self.register().await {
            warn!("Registration with {} failed: {}", self.inner.home, e);
            let mut state = self.inner.state.lock().await;
            state.phase = Phase::Stopped;
            if let Err(e) = self.inner.face.unregister_filter(&state.current).await {
                debug!("Failed to remove filter {}: {}", state.current, e);
            }
            return Err(e);
        }

        self.inner.state.lock().await.phase = Phase::Registered;
        info!("Registered {} with home agent", self.inner.home);

        self.inner.state.lock().await.phase = Phase::Running;
        let node = self.clone();
        tokio::spawn(async move { node.refresh_loop().await });
        Ok(())
    }

    /// Send REGISTER and wait for the answer.
    async fn register(&self) -> Result<(), MobileError> {
        let name = register_name(&self.inner.home, self.inner.forward_asap, SystemTime::now());
        let home = self.inner.home.clone();
        match self.command(name).await? {
            Some(Ack::Success) => Ok(()),
            Some(Ack::Failure) => Err(MobileError::RegistrationRejected(home)),
            None => Err(MobileError::RegistrationTimeout(home)),
        }
    }

    /// Send REMOVE so a later start can register again.
    async fn deregister(&self) {
        let name = remove_name(&self.inner.home, SystemTime::now());
        match self.command(name).await {
            Ok(Some(Ack::Success)) => info!("Removed {} from home agent", self.inner.home),
            Ok(Some(Ack::Failure)) => warn!("Home agent did not know {}", self.inner.home),
            Ok(None) => warn!("No answer to removal of {}", self.inner.home),
            Err(e) => warn!("Failed to remove {}: {}", self.inner.home, e),
        }
    }

    /// Express a command and wait for its acknowledgement.
    ///
    /// `None` means no answer within the registration timeout.
    async fn command(&self, name: Name) -> Result<Option<Ack>, MobileError> {
        let (tx, rx) = oneshot::channel::<Data>();
        let tx = SyncMutex::new(Some(tx));

        debug!("Sending {}", name);
        self.inner
            .face
            .express_interest(
                Interest::new(name),
                Arc::new(move |data: Data, _: &Interest| {
                    if let Some(tx) = tx.lock().take() {
                        let _ = tx.send(data);
                    }
                }),
            )
            .await?;

        match tokio::time::timeout(self.inner.register_timeout, rx).await {
            Ok(Ok(data)) => Ok(Some(
                Ack::from_payload(data.payload()).unwrap_or(Ack::Failure),
            )),
            Ok(Err(_)) => Err(MobileError::Face(FaceError::Closed)),
            Err(_) => Ok(None),
        }
    }

    async fn refresh_loop(&self) {
        let mut ticker = tokio::time::interval(self.inner.refresh_rate);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.refresh().await {
                        break;
                    }
                }
                _ = self.inner.shutdown.notified() => break,
            }
        }
        debug!("Refresh timer for {} stopped", self.inner.home);
    }

    /// Re-send the current location. Returns `false` once stopped.
    async fn refresh(&self) -> bool {
        let state = self.inner.state.lock().await;
        if state.phase != Phase::Running {
            return false;
        }
        if let Err(e) = self.send_redirect(&state.current).await {
            warn!("Failed to send redirect for {}: {}", state.current, e);
        }
        true
    }

    async fn send_redirect(&self, current: &Name) -> Result<(), MobileError> {
        let name = redirect_name(&self.inner.home, current, SystemTime::now());
        let target = current.clone();
        self.inner
            .face
            .express_interest(
                Interest::new(name),
                Arc::new(move |data: Data, _: &Interest| {
                    match Ack::from_payload(data.payload()) {
                        Some(Ack::Success) => debug!("Redirect to {} acknowledged", target),
                        _ => warn!("Redirect to {} refused", target),
                    }
                }),
            )
            .await?;
        info!("Requested redirection to {}", current);
        Ok(())
    }

    /// Serve `namespace` from now on and tell the home agent.
    pub async fn move_to(&self, namespace: Name) -> Result<(), MobileError> {
        let mut state = self.inner.state.lock().await;
        if state.phase != Phase::Running {
            return Err(MobileError::WrongPhase(state.phase));
        }

        self.inner.face.unregister_filter(&state.current).await?;
        self.inner
            .face
            .register_filter(&namespace, Arc::new(self.clone()))
            .await?;
        info!("Moved from {} to {}", state.current, namespace);
        state.current = namespace;

        self.send_redirect(&state.current).await
    }

    /// Stop serving, stop the refresh timer and withdraw the registration
    /// from the home agent.
    ///
    /// Interests the home agent still buffers for the home namespace are
    /// dropped with it.
    pub async fn shutdown(&self) -> Result<(), MobileError> {
        let mut state = self.inner.state.lock().await;
        if state.phase == Phase::Stopped {
            return Ok(());
        }
        let registered = state.phase == Phase::Running;
        state.phase = Phase::Stopped;
        self.inner.shutdown.notify_waiters();
        self.inner.face.unregister_filter(&state.current).await?;
        info!("Stopped serving {}", state.current);
        drop(state);

        if registered {
            self.deregister().await;
        }
        Ok(())
    }

    pub async fn phase(&self) -> Phase {
        self.inner.state.lock().await.phase
    }

    /// Namespace currently served.
    pub async fn current_namespace(&self) -> Name {
        self.inner.state.lock().await.current.clone()
    }

    pub fn home_namespace(&self) -> &Name {
        &self.inner.home
    }

    async fn serve(&self, interest: &Interest) -> bool {
        let name = interest.name();
        if name.position(COMMAND_ROOT).is_some() {
            return false;
        }
        if name.is_segment() && !name.is_first_segment() {
            debug!("Ignoring non-first segment {}", name);
            return false;
        }
        if name.is_header() {
            debug!("Ignoring header probe {}", name);
            return false;
        }

        let current = {
            let state = self.inner.state.lock().await;
            if state.phase == Phase::Stopped {
                return false;
            }
            state.current.clone()
        };
        let content = name.trim_markers();
        let Some(postfix) = content.strip_prefix(&current) else {
            debug!("{} is not under {}", name, current);
            return false;
        };

        let path = match file_path(&self.inner.root, &postfix) {
            Ok(path) => path,
            Err(e) => {
                warn!("Cannot serve {}: {}", name, e);
                return false;
            }
        };

        match self.write_file(&content, &path).await {
            Ok(bytes) => {
                debug!("Served {} ({} bytes)", path.display(), bytes);
                true
            }
            Err(MobileError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("File {} does not exist, ignoring {}", path.display(), name);
                false
            }
            Err(e) => {
                warn!("Failed to serve {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Stream `path` out under `name`, versioned by the file's mtime.
    async fn write_file(&self, name: &Name, path: &Path) -> Result<u64, MobileError> {
        let mut file = tokio::fs::File::open(path).await?;
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(MobileError::InvalidPath(path.display().to_string()));
        }
        let version = metadata.modified().unwrap_or_else(|_| SystemTime::now());

        let mut writer = self.inner.face.open_write(&name.versioned(version)).await?;
        let bytes = copy_chunked(&mut file, &mut writer, self.inner.chunk_size).await?;
        writer.shutdown().await?;
        Ok(bytes)
    }
}

#[async_trait]
impl InterestHandler for MobileNode {
    async fn handle_interest(&self, interest: Interest) -> bool {
        self.serve(&interest).await
    }
}

/// Map the name components below the served namespace to a file below `root`.
fn file_path(root: &Path, postfix: &Name) -> Result<PathBuf, MobileError> {
    if postfix.is_empty() {
        return Err(MobileError::InvalidPath("/".into()));
    }
    let mut path = root.to_path_buf();
    for component in postfix.components() {
        let part = std::str::from_utf8(component)
            .map_err(|_| MobileError::InvalidPath(postfix.to_string()))?;
        if part.is_empty()
            || part == "."
            || part == ".."
            || part.contains(['/', '\\', '\0'])
        {
            return Err(MobileError::InvalidPath(postfix.to_string()));
        }
        path.push(part);
    }
    Ok(path)
}
