use std::error::Error as StdError;

use bytes::{Buf, Bytes};
use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};
use http_body::Body as HttpBody;

use crate::body::Body;
use crate::conditional::http_if_match;
use crate::davhandler::internal_error;
use crate::davpath::DavPath;
use crate::repo::RepoError;
use crate::DavResult;

impl crate::DavHandler {
    pub(crate) async fn handle_put<ReqBody, ReqData, ReqError>(
        &self,
        req: &Request<()>,
        path: &DavPath,
        body: ReqBody,
    ) -> DavResult<Response<Body>>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        let existing = self.check_lock(req, path).await?;
        let etag = existing.as_ref().map(|r| r.etag());
        if let Some(status) = http_if_match(req, etag.as_deref()) {
            return Err(status.into());
        }

        // a body that cannot be read completely is a 500, never retried.
        let data = self.read_request(body, self.max_body_size).await?;
        trace!("PUT {path}: {} bytes", data.len());

        let res = match self
            .repo
            .create_resource(path, Bytes::from(data), self.principal())
            .await
        {
            Ok(r) => r,
            Err(e @ RepoError::Conflict(_)) | Err(e @ RepoError::ResourceExists(_)) => {
                return Err(e.into())
            }
            Err(e) => return Err(internal_error(e)),
        };

        let mut resp = Response::new(Body::empty());
        *resp.status_mut() = if existing.is_some() {
            StatusCode::NO_CONTENT
        } else {
            StatusCode::CREATED
        };
        let h = resp.headers_mut();
        h.typed_insert(headers::ContentLength(0));
        if let Ok(etag) = format!("\"{}\"", res.etag()).parse::<headers::ETag>() {
            h.typed_insert(etag);
        }
        if existing.is_none() {
            if let Ok(loc) = path.with_prefix(&self.prefix).parse() {
                h.insert(http::header::LOCATION, loc);
            }
        }
        Ok(resp)
    }
}
