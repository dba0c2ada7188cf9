use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};

use crate::body::Body;
use crate::davhandler::internal_error;
use crate::davheaders::Depth;
use crate::davpath::DavPath;
use crate::errors::DavError;
use crate::repo::RepoError;
use crate::DavResult;

impl crate::DavHandler {
    pub(crate) async fn handle_delete(
        &self,
        req: &Request<()>,
        path: &DavPath,
    ) -> DavResult<Response<Body>> {
        // RFC4918 9.6.1 DELETE on a collection must act as if Depth: infinity
        // was used; anything else is refused.
        match req.headers().typed_try_get::<Depth>() {
            Ok(None) | Ok(Some(Depth::Infinity)) => {}
            _ => return Err(DavError::msg(StatusCode::BAD_REQUEST, "invalid depth")),
        }

        self.check_lock(req, path).await?;

        match self.repo.remove(path).await {
            Ok(()) => {}
            Err(e @ RepoError::NotAllowed(_)) | Err(e @ RepoError::NotFound(_)) => {
                return Err(e.into())
            }
            Err(e) => return Err(internal_error(e)),
        }

        if let Some(ls) = self.repo.lock_manager() {
            if ls.delete(path).is_err() {
                debug!("DELETE {path}: no locks to drop");
            }
        }

        let mut res = Response::new(Body::empty());
        *res.status_mut() = StatusCode::NO_CONTENT;
        res.headers_mut().typed_insert(headers::ContentLength(0));
        Ok(res)
    }
}
