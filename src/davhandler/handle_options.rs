use headers::HeaderMapExt;
use http::{HeaderValue, Request, Response};

use crate::body::Body;
use crate::davheaders::MsAuthorVia;
use crate::davpath::DavPath;
use crate::repo::Resource;
use crate::util::{dav_method, DavMethod};
use crate::DavResult;

// methods that this handler actually implements.
const IMPLEMENTED: DavMethod = DavMethod::HEAD
    .union(DavMethod::GET)
    .union(DavMethod::PUT)
    .union(DavMethod::OPTIONS)
    .union(DavMethod::MKCOL)
    .union(DavMethod::DELETE)
    .union(DavMethod::UNLOCK);

impl crate::DavHandler {
    pub(crate) async fn handle_options(
        &self,
        req: &Request<()>,
        path: &DavPath,
    ) -> DavResult<Response<Body>> {
        let mut res = Response::new(Body::empty());

        let locking = self.repo.supports_locks();
        let h = res.headers_mut();
        let dav = if locking { "1,2" } else { "1" };
        h.insert("DAV", HeaderValue::from_static(dav));
        h.typed_insert(MsAuthorVia("DAV".to_string()));
        h.typed_insert(headers::ContentLength(0));

        // Helper to add method to array if method is in fact
        // allowed. If the current method is not OPTIONS, leave
        // out the current method since we're probably called
        // for DavMethodNotAllowed.
        let method = dav_method(req.method()).unwrap_or(DavMethod::OPTIONS);
        let mm = |v: &mut Vec<&str>, m: &'static str, y: DavMethod| {
            if (y == DavMethod::OPTIONS || y != method)
                && (y != DavMethod::UNLOCK || locking)
                && self.allow.contains(y)
                && IMPLEMENTED.contains(y)
            {
                v.push(m);
            }
        };

        let res_type = self.repo.locate(path).await.ok();

        let mut v = Vec::new();
        match res_type {
            None => {
                mm(&mut v, "OPTIONS", DavMethod::OPTIONS);
                mm(&mut v, "MKCOL", DavMethod::MKCOL);
                mm(&mut v, "PUT", DavMethod::PUT);
            }
            Some(r) => {
                if let Resource::File(_) = r {
                    mm(&mut v, "HEAD", DavMethod::HEAD);
                    mm(&mut v, "GET", DavMethod::GET);
                    mm(&mut v, "PUT", DavMethod::PUT);
                }
                mm(&mut v, "OPTIONS", DavMethod::OPTIONS);
                if !path.is_root() {
                    mm(&mut v, "DELETE", DavMethod::DELETE);
                }
                mm(&mut v, "UNLOCK", DavMethod::UNLOCK);
            }
        }

        if let Ok(a) = HeaderValue::from_str(&v.join(",")) {
            res.headers_mut().insert(http::header::ALLOW, a);
        }

        Ok(res)
    }
}
