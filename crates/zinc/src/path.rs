//! Path tokenizing and pattern parsing.
//!
//! Request paths are split into segments on `/`. The segment boundaries are
//! recorded as byte ranges into the original string, in a buffer checked out
//! of a [`SegmentPool`], so tokenizing on the request path allocates nothing
//! once the pool is warm.

use std::ops::Range;

use parking_lot::Mutex;

use crate::error::{Result, RouterError};
use crate::request::Params;

/// Key under which a trailing wildcard capture is stored.
pub const WILDCARD_KEY: &str = "*";

const PARAM_MARKER: char = ':';
const WILDCARD_MARKER: char = '*';

/// Capacity of a freshly created segment buffer.
const SEGMENT_BUFFER_CAPACITY: usize = 8;

/// Splits `path` on `/`, appending the byte range of every non-empty
/// segment to `spans`.
///
/// `""` and `"/"` produce no segments; a leading `/` and repeated slashes
/// are ignored.
pub fn tokenize_into(path: &str, spans: &mut Vec<Range<usize>>) {
    let mut start = 0;
    for (i, byte) in path.bytes().enumerate() {
        if byte == b'/' {
            if i > start {
                spans.push(start..i);
            }
            start = i + 1;
        }
    }
    if start < path.len() {
        spans.push(start..path.len());
    }
}

/// A pool of reusable segment buffers.
#[derive(Debug)]
pub struct SegmentPool {
    buffers: Mutex<Vec<Vec<Range<usize>>>>,
    max_idle: usize,
}

impl Default for SegmentPool {
    fn default() -> Self {
        Self::new(64)
    }
}

impl SegmentPool {
    /// Creates a pool that keeps at most `max_idle` buffers around.
    pub fn new(max_idle: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
        }
    }

    /// Tokenizes `path` into a buffer borrowed from this pool.
    ///
    /// The buffer goes back to the pool when the returned [`Segments`] is
    /// dropped.
    pub fn tokenize<'a>(&'a self, path: &'a str) -> Segments<'a> {
        let mut spans = self.buffers.lock().pop().unwrap_or_default();
        spans.clear();
        if spans.capacity() == 0 {
            spans.reserve(SEGMENT_BUFFER_CAPACITY);
        }
        tokenize_into(path, &mut spans);
        Segments {
            path,
            spans,
            pool: Some(self),
        }
    }

    /// Number of buffers currently waiting for reuse.
    pub fn idle(&self) -> usize {
        self.buffers.lock().len()
    }

    fn give_back(&self, spans: Vec<Range<usize>>) {
        let mut buffers = self.buffers.lock();
        if buffers.len() < self.max_idle {
            buffers.push(spans);
        }
    }
}

/// The segments of one path.
#[derive(Debug)]
pub struct Segments<'a> {
    path: &'a str,
    spans: Vec<Range<usize>>,
    pool: Option<&'a SegmentPool>,
}

impl<'a> Segments<'a> {
    /// Tokenizes `path` into a freshly allocated buffer.
    pub fn new(path: &'a str) -> Self {
        let mut spans = Vec::new();
        tokenize_into(path, &mut spans);
        Self {
            path,
            spans,
            pool: None,
        }
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Returns true for the root path.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Returns the segment at `index`.
    pub fn get(&self, index: usize) -> Option<&'a str> {
        let path: &'a str = self.path;
        self.spans.get(index).map(|span| &path[span.clone()])
    }

    /// Iterates over the segments in order.
    pub fn iter(&self) -> impl Iterator<Item = &'a str> + '_ {
        let path: &'a str = self.path;
        self.spans.iter().map(move |span| &path[span.clone()])
    }

    /// Joins the segments from `index` onward with `/`.
    pub fn join_from(&self, index: usize) -> String {
        self.iter().skip(index).collect::<Vec<_>>().join("/")
    }
}

impl Drop for Segments<'_> {
    fn drop(&mut self) {
        if let Some(pool) = self.pool {
            pool.give_back(std::mem::take(&mut self.spans));
        }
    }
}

/// Normalizes a registration path: always starts with `/` and carries no
/// trailing slash, except for the root itself.
pub fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Joins a group prefix and a route path.
pub fn join(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let path = path.trim_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, _) => normalize(path),
        (false, true) => normalize(prefix),
        (false, false) => normalize(&format!("{prefix}/{path}")),
    }
}

/// A segment in a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A literal string segment.
    Literal(String),
    /// A named parameter segment (e.g., `:id`), holding the bare name.
    Param(String),
    /// A wildcard segment (matches the remainder of the path).
    Wildcard,
}

impl PathSegment {
    /// The text stored on the trie node for this segment.
    pub fn text(&self) -> &str {
        match self {
            Self::Literal(s) | Self::Param(s) => s,
            Self::Wildcard => WILDCARD_KEY,
        }
    }

    /// Returns true for a named parameter segment.
    pub const fn is_param(&self) -> bool {
        matches!(self, Self::Param(_))
    }

    /// Returns true for a wildcard segment.
    pub const fn is_wild(&self) -> bool {
        matches!(self, Self::Wildcard)
    }
}

/// Parses a normalized route pattern into segments.
///
/// Pattern syntax:
/// - `/users` - Literal path
/// - `/users/:id` - Named parameter, matching exactly one segment
/// - `/static/*filepath` - Wildcard, matching the rest of the path; the name
///   after `*` is discarded and the capture is stored under [`WILDCARD_KEY`]
///
/// # Example
///
/// ```
/// use zinc::path::{parse_pattern, PathSegment};
///
/// let segments = parse_pattern("/posts/:id/files/*rest").unwrap();
/// assert_eq!(segments[1], PathSegment::Param("id".into()));
/// assert_eq!(segments[3], PathSegment::Wildcard);
/// ```
pub fn parse_pattern(pattern: &str) -> Result<Vec<PathSegment>> {
    let mut spans = Vec::new();
    tokenize_into(pattern, &mut spans);
    let count = spans.len();

    spans
        .into_iter()
        .enumerate()
        .map(|(i, span)| {
            let part = &pattern[span];
            if let Some(name) = part.strip_prefix(PARAM_MARKER) {
                if name.is_empty() {
                    return Err(invalid(pattern, "parameter segment has no name"));
                }
                Ok(PathSegment::Param(name.to_string()))
            } else if part.starts_with(WILDCARD_MARKER) {
                if i + 1 != count {
                    return Err(invalid(pattern, "wildcard must be the last segment"));
                }
                Ok(PathSegment::Wildcard)
            } else {
                Ok(PathSegment::Literal(part.to_string()))
            }
        })
        .collect()
}

fn invalid(pattern: &str, reason: &'static str) -> RouterError {
    RouterError::InvalidPattern {
        pattern: pattern.to_string(),
        reason,
    }
}

/// Generates a path from parsed segments and parameters.
///
/// Returns `None` if a parameter the pattern needs is missing.
pub fn reverse(segments: &[PathSegment], params: &Params) -> Option<String> {
    let mut path = String::new();

    for segment in segments {
        path.push('/');
        match segment {
            PathSegment::Literal(s) => path.push_str(s),
            PathSegment::Param(name) => path.push_str(params.get(name)?),
            PathSegment::Wildcard => path.push_str(params.wildcard()?),
        }
    }

    if path.is_empty() {
        path.push('/');
    }

    Some(path)
}
