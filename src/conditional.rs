//
// Conditional requests: the WebDAV `If` header and the HTTP
// `If-Match` / `If-None-Match` preconditions.
//
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use headers::HeaderMapExt;
use http::{Method, Request, StatusCode};

use crate::davheaders::{If, IfCondition, IfItem};
use crate::davpath::DavPath;
use crate::errors::DavError;
use crate::ls::DavLock;
use crate::repo::{RepoError, Resource};
use crate::DavResult;

/// Outcome of evaluating an `If` header against a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum IfResult {
    /// At least one list holds. Contains the lock tokens that the
    /// satisfying lists asserted (non-negated state tokens).
    Satisfied(HashSet<String>),
    /// No list holds.
    PreconditionFailed,
    /// The header cannot be applied to this request.
    BadRequest(&'static str),
}

fn condition_holds(cond: &IfCondition, locks: &HashMap<String, DavLock>, etag: Option<&str>) -> bool {
    let matched = match &cond.item {
        IfItem::StateToken(t) => locks.contains_key(t),
        IfItem::ETag(e) => etag == Some(e.as_str()),
    };
    matched != cond.not
}

/// Evaluate a parsed `If` header.
///
/// `applies` tells if a resource tag names the request target. Lists
/// tagged with another resource are vacuously true and contribute no
/// tokens. `etag` is `None` if the target does not exist.
pub(crate) fn evaluate_if<F>(
    hdr: &If,
    applies: F,
    locks: &HashMap<String, DavLock>,
    etag: Option<&str>,
) -> IfResult
where
    F: Fn(&str) -> bool,
{
    let mut applicable = false;
    let mut holds = false;
    let mut tokens = HashSet::new();

    for list in &hdr.0 {
        if let Some(tag) = &list.resource_tag {
            if !applies(tag) {
                holds = true;
                continue;
            }
        }
        applicable = true;
        if list.conditions.is_empty() {
            return IfResult::BadRequest("empty list");
        }
        if list.conditions.iter().all(|c| condition_holds(c, locks, etag)) {
            holds = true;
            for c in &list.conditions {
                if let (false, IfItem::StateToken(t)) = (c.not, &c.item) {
                    tokens.insert(t.clone());
                }
            }
        }
    }

    if !applicable {
        return IfResult::BadRequest("bad if uri");
    }
    if holds {
        IfResult::Satisfied(tokens)
    } else {
        IfResult::PreconditionFailed
    }
}

/// Evaluate the raw text of an `If` header.
pub(crate) fn evaluate_if_str<F>(
    raw: &str,
    applies: F,
    locks: &HashMap<String, DavLock>,
    etag: Option<&str>,
) -> IfResult
where
    F: Fn(&str) -> bool,
{
    match If::from_str(raw) {
        Ok(hdr) => evaluate_if(&hdr, applies, locks, etag),
        Err(e) => {
            debug!("{e}");
            IfResult::BadRequest("malformed if header")
        }
    }
}

// An absolute resource tag only names the target if it is on the host
// the request was sent to. Ports are not compared. Without a `Host`
// header only the path counts.
fn same_host(tag: &str, host: Option<&str>) -> bool {
    if tag.starts_with('/') {
        return true;
    }
    let tag_host = url::Url::parse(tag)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string));
    let req_host = host
        .and_then(|h| h.parse::<http::uri::Authority>().ok())
        .map(|a| a.host().to_string());
    match (tag_host, req_host) {
        (Some(t), Some(r)) => t.eq_ignore_ascii_case(&r),
        _ => true,
    }
}

/// HTTP preconditions (RFC 7232). Returns the status to reply with if
/// they fail. `etag` is `None` if the resource does not exist.
pub(crate) fn http_if_match(req: &Request<()>, etag: Option<&str>) -> Option<StatusCode> {
    let etag = etag.and_then(|e| headers::ETag::from_str(&format!("\"{e}\"")).ok());

    if let Some(r) = req.headers().typed_get::<headers::IfMatch>() {
        let passes = match &etag {
            Some(etag) => r.precondition_passes(etag),
            None => false,
        };
        if !passes {
            trace!("precondition fail: If-Match {r:?}");
            return Some(StatusCode::PRECONDITION_FAILED);
        }
    }

    if let Some(r) = req.headers().typed_get::<headers::IfNoneMatch>() {
        if let Some(etag) = &etag {
            if !r.precondition_passes(etag) {
                trace!("precondition fail: If-None-Match {r:?}");
                return match *req.method() {
                    Method::GET | Method::HEAD => Some(StatusCode::NOT_MODIFIED),
                    _ => Some(StatusCode::PRECONDITION_FAILED),
                };
            }
        }
    }
    None
}

impl crate::DavHandler {
    /// The lock precondition gate shared by all mutating methods.
    ///
    /// Returns the target resource if it exists. If the repository has
    /// active locks on the target, the request must carry an `If`
    /// header that holds and that asserts one of those lock tokens.
    pub(crate) async fn check_lock(
        &self,
        req: &Request<()>,
        path: &DavPath,
    ) -> DavResult<Option<Resource>> {
        let res = match self.repo.locate(path).await {
            Ok(r) => Some(r),
            Err(RepoError::NotFound(_)) | Err(RepoError::NotAllowed(_)) => None,
            Err(e) => return Err(e.into()),
        };

        let ls = match self.repo.lock_manager() {
            Some(ls) if self.repo.supports_locks() => ls,
            _ => return Ok(res),
        };
        let locks = ls.check_locked(path);
        if locks.is_empty() {
            return Ok(res);
        }

        let mut raw = Vec::new();
        for v in req.headers().get_all("if") {
            match v.to_str() {
                Ok(v) => raw.push(v),
                Err(_) => return Err(DavError::msg(StatusCode::BAD_REQUEST, "bad request")),
            }
        }
        if raw.is_empty() {
            return Err(DavError::msg(StatusCode::LOCKED, "no lock token submitted"));
        }

        let host = req
            .headers()
            .get(http::header::HOST)
            .and_then(|h| h.to_str().ok());
        let applies = |tag: &str| {
            same_host(tag, host)
                && DavPath::from_str_and_prefix(tag, &self.prefix)
                    .map(|p| p.same_resource(path))
                    .unwrap_or(false)
        };
        let etag = res.as_ref().map(|r| r.etag());

        match evaluate_if_str(&raw.join(" "), applies, &locks, etag.as_deref()) {
            IfResult::BadRequest(m) => Err(DavError::msg(StatusCode::BAD_REQUEST, m)),
            IfResult::PreconditionFailed => Err(DavError::msg(
                StatusCode::PRECONDITION_FAILED,
                "precondition failed",
            )),
            IfResult::Satisfied(tokens) => {
                if tokens.iter().any(|t| locks.contains_key(t)) {
                    Ok(res)
                } else {
                    debug!("check_lock: {path:?} locked, no matching token");
                    Err(DavError::msg(StatusCode::LOCKED, "no matching lock token submitted"))
                }
            }
        }
    }
}
