//! Conversions between remote URL space and the local mirror layout.
//!
//! Every resource lives under the directory of the root playlist; its local
//! path is the remainder of its URL path below that directory, joined onto
//! the output directory.

use std::path::{Path, PathBuf};

use url::Url;

use crate::error::ResolveError;

pub const PLAYLIST_EXTENSION: &str = "m3u8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// A playlist that is fetched and walked for further references.
    Manifest,
    /// Any other file: media segments, keys, init maps.
    Segment,
}

/// Where a remote resource is stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalTarget {
    pub directory: PathBuf,
    pub filename: String,
}

impl LocalTarget {
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.filename)
    }
}

/// Resolves a playlist reference against the playlist it was found in.
///
/// Only relative references are accepted. Dot segments are normalized by the
/// join, so `v1/../v2/a.ts` and `v2/a.ts` resolve to the same resource.
pub fn resolve(reference: &str, manifest_url: &Url) -> Result<Url, ResolveError> {
    if has_scheme(reference) || reference.starts_with("//") {
        return Err(ResolveError::AbsoluteReference {
            reference: reference.to_string(),
        });
    }

    let resolved = manifest_url
        .join(reference)
        .map_err(|e| ResolveError::InvalidReference {
            reference: reference.to_string(),
            reason: e.to_string(),
        })?;

    if resolved.path().is_empty() || resolved.path() == "/" {
        return Err(ResolveError::MissingFilename {
            url: resolved.to_string(),
        });
    }
    Ok(resolved)
}

/// Maps a resolved resource to its location below `root_out_dir`.
///
/// Fails when the resource does not live under the root playlist's directory,
/// so nothing is ever written outside the output directory.
pub fn local_target(
    resource: &Url,
    root_url: &Url,
    root_out_dir: &Path,
) -> Result<LocalTarget, ResolveError> {
    let outside = || ResolveError::OutsideRoot {
        url: resource.to_string(),
    };

    if resource.origin() != root_url.origin() {
        return Err(outside());
    }

    let relative = resource
        .path()
        .strip_prefix(directory_of(root_url.path()))
        .ok_or_else(outside)?;

    let mut segments = Vec::new();
    for raw in relative.split('/').filter(|s| !s.is_empty()) {
        let segment = decode_segment(raw);
        if segment == "." || segment == ".." || segment.contains(['/', '\\', '\0']) {
            return Err(outside());
        }
        segments.push(segment);
    }

    let filename = match relative.ends_with('/') {
        true => None,
        false => segments.pop(),
    }
    .ok_or_else(|| ResolveError::MissingFilename {
        url: resource.to_string(),
    })?;

    let directory = segments
        .iter()
        .fold(root_out_dir.to_path_buf(), |dir, segment| dir.join(segment));

    Ok(LocalTarget {
        directory,
        filename,
    })
}

pub fn is_manifest(resource: &Url) -> bool {
    extension_of(resource.path())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(PLAYLIST_EXTENSION))
}

/// Classifies a resource by its file extension. Resources without an
/// extension have no kind.
pub fn classify(resource: &Url) -> Option<ResourceKind> {
    if is_manifest(resource) {
        Some(ResourceKind::Manifest)
    } else if extension_of(resource.path()).is_some() {
        Some(ResourceKind::Segment)
    } else {
        None
    }
}

pub(crate) fn extension_of(path: &str) -> Option<&str> {
    let last = path.rsplit('/').next()?;
    Path::new(last)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
}

/// The path up to and including its final `/`.
pub(crate) fn directory_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[..=pos],
        None => "",
    }
}

/// Percent-decodes one URL path segment into the name used on disk.
fn decode_segment(raw: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(raw.as_bytes())).into_owned()
}

// RFC 3986: scheme = ALPHA *( ALPHA / DIGIT / "+" / "-" / "." ) ":"
fn has_scheme(reference: &str) -> bool {
    let Some((scheme, _)) = reference.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
