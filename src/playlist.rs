//! Line-oriented extraction of resource references from HLS playlists.
//!
//! The parser never fails: malformed tags and attributes are skipped and the
//! scan continues with the next line.

use tracing::debug;

const TAG_PREFIX: &str = "#EXT";
const BYTERANGE_MARKER: &str = "BYTERANGE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceSource {
    /// `URI` attribute of a tag such as `#EXT-X-KEY` or `#EXT-X-MEDIA`.
    Attribute,
    /// A bare URI line, e.g. a media segment or variant playlist.
    Line,
}

/// An unresolved URI found in a playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub uri: String,
    pub source: ReferenceSource,
}

impl Reference {
    fn attribute(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            source: ReferenceSource::Attribute,
        }
    }

    fn line(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            source: ReferenceSource::Line,
        }
    }
}

/// Lazily yields every reference in `data`, in playlist order.
pub fn parse(data: &[u8]) -> impl Iterator<Item = Reference> + '_ {
    data.split(|b| *b == b'\n').filter_map(parse_line)
}

fn parse_line(raw: &[u8]) -> Option<Reference> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();

    if line.is_empty() {
        None
    } else if line.starts_with(TAG_PREFIX) {
        parse_tag(line)
    } else if line.starts_with('#') {
        None
    } else {
        Some(Reference::line(line))
    }
}

fn parse_tag(line: &str) -> Option<Reference> {
    let Some((tag, attributes)) = line.split_once(':') else {
        debug!(line, "tag without attribute list, skipping");
        return None;
    };

    let attributes: Vec<&str> = split_attributes(attributes)
        .into_iter()
        .map(str::trim)
        .collect();
    let attribute = attributes
        .iter()
        .copied()
        .find(|attribute| attribute.starts_with("URI"))?;

    if attributes.iter().any(|attribute| attribute_key(attribute) == BYTERANGE_MARKER) {
        debug!(tag, "byte-range references are not supported, skipping");
        return None;
    }

    let Some((_, value)) = attribute.split_once('=') else {
        debug!(tag, attribute, "malformed URI attribute, skipping");
        return None;
    };

    let uri = value.trim().trim_matches('"').trim();
    if uri.is_empty() {
        debug!(tag, "empty URI attribute, skipping");
        return None;
    }
    Some(Reference::attribute(uri))
}

fn attribute_key(attribute: &str) -> &str {
    attribute
        .split_once('=')
        .map_or(attribute, |(key, _)| key)
        .trim()
}

/// Splits an attribute list on commas that are not inside a quoted value.
fn split_attributes(attributes: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in attributes.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(&attributes[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&attributes[start..]);
    parts
}
