use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};

use crate::body::Body;
use crate::davhandler::internal_error;
use crate::davpath::DavPath;
use crate::errors::DavError;
use crate::repo::RepoError;
use crate::DavResult;

impl crate::DavHandler {
    pub(crate) async fn handle_mkcol(
        &self,
        req: &Request<()>,
        path: &DavPath,
    ) -> DavResult<Response<Body>> {
        match self.repo.locate(path).await {
            Ok(_) => {
                return Err(DavError::msg(
                    StatusCode::METHOD_NOT_ALLOWED,
                    "resource exists",
                ))
            }
            Err(RepoError::NotAllowed(_)) => {
                return Err(DavError::msg(StatusCode::FORBIDDEN, "not allowed"))
            }
            Err(_) => {}
        }

        self.check_lock(req, path).await?;

        match self.repo.create_collection(path, self.principal()).await {
            Ok(_) => {}
            Err(e @ RepoError::Conflict(_)) | Err(e @ RepoError::ResourceExists(_)) => {
                return Err(e.into())
            }
            Err(e) => return Err(internal_error(e)),
        }

        let mut res = Response::new(Body::empty());
        *res.status_mut() = StatusCode::CREATED;
        res.headers_mut().typed_insert(headers::ContentLength(0));
        if let Ok(loc) = path.with_prefix(&self.prefix).parse() {
            res.headers_mut().insert(http::header::LOCATION, loc);
        }
        Ok(res)
    }
}
