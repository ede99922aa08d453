//! Recursive playlist walk and resource download.
//!
//! Playlists are fetched and walked depth-first on the calling thread. Every
//! other resource is handed to the [`ConcurrencyGate`] and fetched by a worker.
//! Failures are isolated to the resource that failed; a failed playlist simply
//! leaves its subtree unexplored.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::{self, MirrorConfig};
use crate::error::{ConfigError, FetchError, MirrorError};
use crate::fetcher::ResourceFetcher;
use crate::gate::ConcurrencyGate;
use crate::ledger::{DownloadLedger, MirrorReport};
use crate::playlist::{self, ReferenceSource};
use crate::url_map::{self, ResourceKind};

/// State shared between the walking thread and fetch workers.
struct SessionState {
    root_url: Url,
    output_dir: PathBuf,
    auth_token: Option<String>,
    fetcher: Arc<dyn ResourceFetcher>,
    ledger: DownloadLedger,
    fatal: Mutex<Option<MirrorError>>,
}

impl SessionState {
    /// Claims, fetches and writes one resource. Returns the body only when it
    /// was downloaded by this call.
    fn store(&self, url: &Url, kind: ResourceKind) -> Option<Bytes> {
        let target = match url_map::local_target(url, &self.root_url, &self.output_dir) {
            Ok(target) => target,
            Err(e) => {
                warn!(%url, error = %e, "skipping resource");
                return None;
            }
        };
        let path = target.path();

        if !self.ledger.try_claim(&path) {
            debug!(%url, "already claimed");
            return None;
        }

        // Playlists are always refetched, their content drives the walk.
        if kind == ResourceKind::Segment {
            if let Ok(metadata) = fs::metadata(&path) {
                if metadata.is_file() {
                    debug!(path = %path.display(), "exists, skip");
                    self.ledger.record_existing(metadata.len());
                    return None;
                }
            }
        }

        if let Err(e) = fs::create_dir_all(&target.directory) {
            error!(directory = %target.directory.display(), error = %e, "could not create directory");
            self.ledger.record_failure();
            self.fatal
                .lock()
                .get_or_insert_with(|| MirrorError::filesystem(&target.directory, e));
            return None;
        }

        info!(%url, directory = %target.directory.display(), "downloading");
        match self.download(url, &path) {
            Ok(data) => {
                self.ledger.record_downloaded(data.len() as u64);
                Some(data)
            }
            Err(e) => {
                error!(%url, error = %e, "download failed");
                self.ledger.record_failure();
                None
            }
        }
    }

    fn download(&self, url: &Url, path: &Path) -> Result<Bytes, FetchError> {
        let data = self.fetcher.fetch(url, self.auth_token.as_deref())?;
        fs::write(path, &data)?;
        Ok(data)
    }
}

/// One mirroring run: the ledger, the worker gate and the fetcher.
pub struct DownloadSession {
    state: Arc<SessionState>,
    gate: ConcurrencyGate,
}

impl DownloadSession {
    pub fn new(
        config: &MirrorConfig,
        fetcher: Arc<dyn ResourceFetcher>,
    ) -> Result<Self, ConfigError> {
        let gate = ConcurrencyGate::new(config.concurrency)?;
        Ok(Self {
            state: Arc::new(SessionState {
                root_url: config.root_url.clone(),
                output_dir: config.output_dir.clone(),
                auth_token: config.auth_token.clone(),
                fetcher,
                ledger: DownloadLedger::new(),
                fatal: Mutex::new(None),
            }),
            gate,
        })
    }

    /// Mirrors the root playlist and everything it references.
    pub fn run(self) -> Result<MirrorReport, MirrorError> {
        let output_dir = &self.state.output_dir;
        fs::create_dir_all(output_dir).map_err(|e| MirrorError::filesystem(output_dir, e))?;

        let root_url = self.state.root_url.clone();
        self.fetch(&root_url, ResourceKind::Manifest);
        self.finish()
    }

    /// Fetches one resource. Playlists are fetched and walked before this
    /// returns; other resources are queued on the gate.
    pub fn fetch(&self, url: &Url, kind: ResourceKind) {
        match kind {
            ResourceKind::Manifest => {
                if let Some(data) = self.state.store(url, kind) {
                    self.walk(url, &data);
                }
            }
            ResourceKind::Segment => self.submit(url.clone()),
        }
    }

    /// Waits for outstanding workers and returns the final totals.
    pub fn finish(self) -> Result<MirrorReport, MirrorError> {
        self.gate.drain();
        if let Some(e) = self.state.fatal.lock().take() {
            return Err(e);
        }
        Ok(self.state.ledger.report())
    }

    fn walk(&self, manifest_url: &Url, data: &[u8]) {
        for reference in playlist::parse(data) {
            let url = match url_map::resolve(&reference.uri, manifest_url) {
                Ok(url) => url,
                Err(e) => {
                    warn!(playlist = %manifest_url, error = %e, "skipping reference");
                    continue;
                }
            };

            let kind = match (url_map::classify(&url), reference.source) {
                (Some(kind), _) => kind,
                (None, ReferenceSource::Attribute) => ResourceKind::Segment,
                (None, ReferenceSource::Line) => {
                    debug!(uri = %reference.uri, "no file extension, skipping");
                    continue;
                }
            };
            self.fetch(&url, kind);
        }
    }

    fn submit(&self, url: Url) {
        let state = self.state.clone();
        let task_url = url.clone();
        let submitted = self.gate.submit(move || {
            state.store(&task_url, ResourceKind::Segment);
        });
        if let Err(e) = submitted {
            error!(%url, error = %e, "could not start fetch worker");
            self.state.ledger.record_failure();
        }
    }
}

/// Validates the root URL, then mirrors the whole package.
pub fn mirror(
    config: &MirrorConfig,
    fetcher: Arc<dyn ResourceFetcher>,
) -> Result<MirrorReport, MirrorError> {
    config::validate_root_url(config.root_url.as_str())?;
    DownloadSession::new(config, fetcher)?.run()
}
