//! Utility module to handle the path part of an URL as a resource reference.
//!
//! A [`DavPath`] is the decoded request path with the handler's prefix
//! stripped off. Its reference form always starts with a `/`, and `/`
//! on its own names the root collection.

use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

// encode everything that is not a valid path character.
const PATH_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Errors when parsing an URL or reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// cannot parse
    InvalidPath,
    /// outside of prefix
    PrefixMismatch,
    /// contains `..` or a NUL byte
    IllegalPath,
}

impl std::error::Error for ParseError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ParseError::InvalidPath => write!(f, "invalid path"),
            ParseError::PrefixMismatch => write!(f, "path outside of prefix"),
            ParseError::IllegalPath => write!(f, "illegal path"),
        }
    }
}

/// A resource reference: slash-delimited, decoded, without the URL prefix.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DavPath {
    // normalized, no trailing slash, "/" for the root.
    path: String,
    // the request had a trailing slash.
    collection: bool,
}

impl fmt::Debug for DavPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.as_rel_ref())
    }
}

impl fmt::Display for DavPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.path)?;
        if self.collection && !self.is_root() {
            f.write_str("/")?;
        }
        Ok(())
    }
}

// strip trailing slashes off the prefix. "/" and "" both mean "no prefix".
fn normalize_prefix(prefix: &str) -> &str {
    prefix.trim_end_matches('/')
}

impl DavPath {
    /// Parse a plain reference like `/docs/file.txt` (no prefix).
    pub fn new(src: &str) -> Result<DavPath, ParseError> {
        DavPath::from_str_and_prefix(src, "")
    }

    /// The root collection.
    pub fn root() -> DavPath {
        DavPath {
            path: "/".to_string(),
            collection: true,
        }
    }

    /// From an URI and a prefix that has to be stripped off.
    pub fn from_uri_and_prefix(uri: &http::uri::Uri, prefix: &str) -> Result<DavPath, ParseError> {
        DavPath::from_encoded(uri.path(), prefix)
    }

    /// From a string that may be an absolute URL (`http://host/a/b`) or
    /// just an (encoded) path. Used for the resource tags in `If` headers.
    pub fn from_str_and_prefix(src: &str, prefix: &str) -> Result<DavPath, ParseError> {
        if !src.starts_with('/') {
            let url = url::Url::parse(src).map_err(|_| ParseError::InvalidPath)?;
            return DavPath::from_encoded(url.path(), prefix);
        }
        let src = src.split(['?', '#']).next().unwrap_or_default();
        DavPath::from_encoded(src, prefix)
    }

    fn from_encoded(src: &str, prefix: &str) -> Result<DavPath, ParseError> {
        if !src.starts_with('/') {
            return Err(ParseError::InvalidPath);
        }
        // split before decoding, so that an encoded slash stays
        // inside its segment, where it is refused.
        let mut segs = Vec::new();
        for raw in src.split('/') {
            let seg = percent_decode_str(raw)
                .decode_utf8()
                .map_err(|_| ParseError::InvalidPath)?;
            if seg.contains(['\0', '/']) {
                return Err(ParseError::IllegalPath);
            }
            match &*seg {
                "" | "." => {}
                ".." => return Err(ParseError::IllegalPath),
                _ => segs.push(seg.into_owned()),
            }
        }

        let prefix: Vec<&str> = normalize_prefix(prefix)
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        if segs.len() < prefix.len() || segs.iter().zip(&prefix).any(|(s, p)| s.as_str() != *p) {
            return Err(ParseError::PrefixMismatch);
        }
        let rest = &segs[prefix.len()..];

        Ok(DavPath {
            path: format!("/{}", rest.join("/")),
            collection: rest.is_empty() || src.ends_with('/'),
        })
    }

    /// The reference string, without trailing slash. `/` for the root.
    pub fn as_rel_ref(&self) -> &str {
        &self.path
    }

    /// The reference as an encoded URL path, with a trailing slash if
    /// it was a collection reference.
    pub fn as_url_string(&self) -> String {
        let mut url = utf8_percent_encode(&self.path, PATH_ENCODE_SET).to_string();
        if self.collection && !self.is_root() {
            url.push('/');
        }
        url
    }

    /// Encoded URL path including the `prefix`.
    pub fn with_prefix(&self, prefix: &str) -> String {
        let prefix = normalize_prefix(prefix);
        match (prefix.is_empty(), self.is_root()) {
            (true, _) => self.as_url_string(),
            (false, true) => format!("{prefix}/"),
            (false, false) => format!("{prefix}{}", self.as_url_string()),
        }
    }

    /// The non-empty segments of the reference, in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }

    pub fn is_root(&self) -> bool {
        self.path == "/"
    }

    /// Was the reference written with a trailing slash.
    pub fn is_collection(&self) -> bool {
        self.collection || self.is_root()
    }

    /// Last segment, `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        self.segments().last()
    }

    /// Parent collection. The parent of the root is the root.
    pub fn parent(&self) -> DavPath {
        let path = match self.path.rfind('/') {
            Some(0) | None => "/".to_string(),
            Some(idx) => self.path[..idx].to_string(),
        };
        DavPath {
            path,
            collection: true,
        }
    }

    /// Do both references name the same resource (trailing slash ignored).
    pub fn same_resource(&self, other: &DavPath) -> bool {
        self.path == other.path
    }

    /// Is `other` strictly below this reference.
    pub fn is_ancestor_of(&self, other: &DavPath) -> bool {
        if self.is_root() {
            return !other.is_root();
        }
        other
            .path
            .strip_prefix(&self.path)
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false)
    }
}
