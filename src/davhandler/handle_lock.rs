use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};

use crate::body::Body;
use crate::davheaders::LockToken;
use crate::davpath::DavPath;
use crate::errors::DavError;
use crate::DavResult;

impl crate::DavHandler {
    pub(crate) async fn handle_unlock(
        &self,
        req: &Request<()>,
        path: &DavPath,
    ) -> DavResult<Response<Body>> {
        let ls = match self.repo.lock_manager() {
            Some(ls) if self.repo.supports_locks() => ls,
            _ => return Err(StatusCode::METHOD_NOT_ALLOWED.into()),
        };

        let token = match req.headers().typed_try_get::<LockToken>() {
            Ok(Some(t)) => t.0,
            _ => return Err(DavError::msg(StatusCode::BAD_REQUEST, "no lock token")),
        };

        match ls.unlock(path, &token) {
            Ok(()) => {
                let mut res = Response::new(Body::empty());
                *res.status_mut() = StatusCode::NO_CONTENT;
                res.headers_mut().typed_insert(headers::ContentLength(0));
                Ok(res)
            }
            Err(()) => {
                debug!("UNLOCK {path}: token {token} does not match");
                Err(DavError::msg(StatusCode::CONFLICT, "lock token does not match"))
            }
        }
    }
}
