use std::str::FromStr;

use headers::HeaderMapExt;
use http::{Method, Request, Response, StatusCode};

use crate::body::Body;
use crate::conditional::http_if_match;
use crate::davhandler::internal_error;
use crate::davpath::DavPath;
use crate::errors::DavError;
use crate::repo::{RepoError, Resource};
use crate::DavResult;

impl crate::DavHandler {
    pub(crate) async fn handle_get(
        &self,
        req: &Request<()>,
        path: &DavPath,
    ) -> DavResult<Response<Body>> {
        let head = req.method() == Method::HEAD;

        let file = match self.repo.locate(path).await {
            Ok(r @ Resource::File(_)) => r,
            Ok(Resource::Collection(_)) => {
                return Err(DavError::msg(
                    StatusCode::METHOD_NOT_ALLOWED,
                    "cannot GET a collection",
                ))
            }
            Err(e @ RepoError::NotFound(_)) | Err(e @ RepoError::NotAllowed(_)) => {
                return Err(e.into())
            }
            Err(e) => return Err(internal_error(e)),
        };

        let etag = file.etag();
        let mut res = Response::new(Body::empty());
        if let Some(status) = http_if_match(req, Some(&etag)) {
            *res.status_mut() = status;
            if status != StatusCode::NOT_MODIFIED {
                return Err(status.into());
            }
        }

        let h = res.headers_mut();
        if let Ok(etag) = headers::ETag::from_str(&format!("\"{etag}\"")) {
            h.typed_insert(etag);
        }
        h.typed_insert(headers::LastModified::from(file.modified()));
        h.typed_insert(headers::ContentType::from(
            mime_guess::from_path(file.name()).first_or_octet_stream(),
        ));
        h.typed_insert(headers::AcceptRanges::bytes());

        if res.status() == StatusCode::NOT_MODIFIED {
            return Ok(res);
        }
        res.headers_mut()
            .typed_insert(headers::ContentLength(file.content_length()));
        if !head {
            *res.body_mut() = Body::from(file.content().unwrap_or_default());
        }
        Ok(res)
    }
}
