use std::path::PathBuf;

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL: empty url")]
    EmptyUrl,

    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("unsupported scheme `{scheme}`, require http/https url")]
    UnsupportedScheme { scheme: String },

    #[error("`{url}` is not an hls playlist")]
    NotPlaylist { url: String },

    #[error("invalid concurrency limit {value}, must be at least 1")]
    InvalidConcurrency { value: i64 },

    #[error("request timeout must be at least one second")]
    InvalidTimeout,

    #[error("cannot determine output directory: {reason}")]
    OutputDirectory { reason: String },
}

impl ConfigError {
    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

/// Why a reference found in a playlist was not turned into a download.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("absolute reference `{reference}` is not supported")]
    AbsoluteReference { reference: String },

    #[error("invalid reference `{reference}`: {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("`{url}` is outside the root playlist directory")]
    OutsideRoot { url: String },

    #[error("`{url}` has no file name")]
    MissingFilename { url: String },
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("request failed with HTTP {status} for {url}")]
    HttpStatus { status: StatusCode, url: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl FetchError {
    pub fn http_status(status: StatusCode, url: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
        }
    }
}

/// Errors that end a whole mirroring run.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot build HTTP client: {0}")]
    HttpClient(#[from] FetchError),

    #[error("could not create directory {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MirrorError {
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}
