use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;
use crate::gate::DEFAULT_CONCURRENCY;
use crate::url_map::{self, PLAYLIST_EXTENSION};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Validated settings for one mirroring run.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub root_url: Url,
    pub output_dir: PathBuf,
    pub auth_token: Option<String>,
    pub concurrency: usize,
    pub timeout: Duration,
}

impl MirrorConfig {
    pub fn new(url: &str, output_dir: Option<PathBuf>) -> Result<Self, ConfigError> {
        let root_url = validate_root_url(url)?;
        let output_dir = match output_dir {
            Some(dir) => dir,
            None => default_output_dir(&root_url)?,
        };
        Ok(Self {
            root_url,
            output_dir,
            auth_token: None,
            concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_concurrency(mut self, concurrency: i64) -> Result<Self, ConfigError> {
        self.concurrency = usize::try_from(concurrency)
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::InvalidConcurrency { value: concurrency })?;
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        if timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        self.timeout = timeout;
        Ok(self)
    }
}

/// The root must be an http(s) URL naming a playlist.
pub fn validate_root_url(input: &str) -> Result<Url, ConfigError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ConfigError::EmptyUrl);
    }

    let url = Url::parse(input).map_err(|e| ConfigError::invalid_url(input, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::UnsupportedScheme {
            scheme: url.scheme().to_string(),
        });
    }
    if url.path().is_empty() || url.path() == "/" {
        return Err(ConfigError::invalid_url(input, "empty path"));
    }
    if !url_map::is_manifest(&url) {
        return Err(ConfigError::NotPlaylist {
            url: format!("{input} (expected .{PLAYLIST_EXTENSION})"),
        });
    }
    Ok(url)
}

/// `<cwd>/<name of the playlist's parent directory>`, or the host name when
/// the playlist sits at the server root.
fn default_output_dir(root_url: &Url) -> Result<PathBuf, ConfigError> {
    let cwd = std::env::current_dir().map_err(|e| ConfigError::OutputDirectory {
        reason: e.to_string(),
    })?;

    let parent = url_map::directory_of(root_url.path()).trim_end_matches('/');
    let name = parent
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty() && *name != "..")
        .or_else(|| root_url.host_str())
        .ok_or_else(|| ConfigError::OutputDirectory {
            reason: format!("no directory name in {root_url}"),
        })?;
    Ok(cwd.join(name))
}
