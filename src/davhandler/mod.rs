//
// This module contains the main entry point of the library,
// DavHandler.
//
use std::error::Error as StdError;
use std::io;
use std::sync::Arc;

use bytes::buf::Buf;
use futures_util::stream::Stream;
use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};
use http_body::Body as HttpBody;

use crate::body::{Body, StreamBody};
use crate::davheaders;
use crate::davpath::DavPath;
use crate::errors::DavError;
use crate::ls::memls::MemLs;
use crate::repo::{DavRepository, MemRepository, RepoError};
use crate::util::{dav_method, DavMethod};
use crate::DavResult;

mod handle_delete;
mod handle_gethead;
mod handle_lock;
mod handle_mkcol;
mod handle_options;
mod handle_put;

/// Default maximum size of a request body.
pub const MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

// bodies of methods that we do not read ourselves.
const MAX_SMALL_BODY_SIZE: usize = 65536;

/// Configuration of the handler.
#[derive(Clone)]
pub struct DavBuilder {
    /// Prefix to be stripped off when handling request.
    prefix: String,
    /// Repository backend.
    repo: Repository,
    /// Locksystem backend (only used with `Repository::Mem`).
    ls: Option<LockSystem>,
    /// Set of allowed methods (Defaults to "all methods")
    allow: DavMethod,
    /// Principal is webdav speak for "user", used to give created
    /// resources and locks an owner.
    principal: Option<String>,
    /// Maximum size of a PUT body in bytes.
    max_body_size: usize,
}

/// Repository backend.
#[derive(Clone)]
pub enum Repository {
    /// Ephemeral in-memory tree.
    Mem,
    /// Bring your own. It also brings its own lock manager, if any.
    Custom(Arc<dyn DavRepository>),
}

impl Repository {
    fn build(self, ls: Option<LockSystem>) -> Arc<dyn DavRepository> {
        match (self, ls) {
            (Repository::Mem, Some(LockSystem::Mem)) => {
                Arc::new(MemRepository::with_locks(MemLs::new()))
            }
            (Repository::Mem, None) => Arc::new(MemRepository::new()),
            (Repository::Custom(repo), ls) => {
                if ls.is_some() {
                    debug!("locksystem ignored for a custom repository");
                }
                repo
            }
        }
    }
}

/// Lock manager backend.
#[derive(Default, Clone, Copy)]
pub enum LockSystem {
    #[default]
    Mem,
}

impl DavBuilder {
    /// Create a new configuration builder.
    pub fn new(repo: Repository) -> DavBuilder {
        Self {
            prefix: String::new(),
            repo,
            ls: None,
            allow: DavMethod::all(),
            principal: None,
            max_body_size: MAX_BODY_SIZE,
        }
    }

    /// Use the configuration that was built to generate a DavHandler.
    pub fn build(self) -> DavHandler {
        self.into()
    }

    /// Prefix to be stripped off before translating the rest of
    /// the request path to a resource reference.
    pub fn strip_prefix(self, prefix: impl Into<String>) -> Self {
        let mut this = self;
        this.prefix = prefix.into();
        this
    }

    /// Set the locksystem to use.
    pub fn locksystem(self, ls: LockSystem) -> Self {
        let mut this = self;
        this.ls = Some(ls);
        this
    }

    /// Which methods to allow (default is all methods).
    pub fn methods(self, allow: DavMethod) -> Self {
        let mut this = self;
        this.allow = allow;
        this
    }

    /// Set the name of the "webdav principal". This will be the owner of
    /// any created resources.
    pub fn principal(self, principal: impl Into<String>) -> Self {
        let mut this = self;
        this.principal = Some(principal.into());
        this
    }

    /// Maximum request body size in bytes (PUT).
    pub fn max_body_size(self, size: usize) -> Self {
        let mut this = self;
        this.max_body_size = size;
        this
    }
}

/// The webdav handler struct.
///
/// The `builder` and `build` methods are used to instantiate a handler.
///
/// The `handle` and `handle_with` methods are the methods that do the actual work.
/// The repository is shared by all clones of a handler.
#[derive(Clone)]
pub struct DavHandler {
    pub(crate) prefix: Arc<String>,
    pub(crate) repo: Arc<dyn DavRepository>,
    pub(crate) allow: DavMethod,
    pub(crate) principal: Option<Arc<String>>,
    pub(crate) max_body_size: usize,
}

impl From<DavBuilder> for DavHandler {
    fn from(cfg: DavBuilder) -> Self {
        Self {
            prefix: Arc::new(cfg.prefix),
            repo: cfg.repo.build(cfg.ls),
            allow: cfg.allow,
            principal: cfg.principal.map(Arc::new),
            max_body_size: cfg.max_body_size,
        }
    }
}

impl DavHandler {
    /// Return a configuration builder.
    pub fn builder(repo: Repository) -> DavBuilder {
        DavBuilder::new(repo)
    }

    /// The repository this handler serves.
    pub fn repository(&self) -> &Arc<dyn DavRepository> {
        &self.repo
    }

    /// Handle a webdav request.
    pub async fn handle<ReqBody, ReqData, ReqError>(&self, req: Request<ReqBody>) -> Response<Body>
    where
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
    {
        self.handle_inner(req).await
    }

    /// Handle a webdav request, overriding parts of the config.
    ///
    /// For example, the `principal` can be set for this request, after
    /// the authentication layer in front of this handler has run.
    pub async fn handle_with<ReqBody, ReqData, ReqError>(
        &self,
        req: Request<ReqBody>,
        prefix: Option<String>,
        principal: Option<String>,
    ) -> Response<Body>
    where
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
    {
        let mut this = self.clone();
        if let Some(prefix) = prefix {
            this.prefix = Arc::new(format!(
                "{}/{}",
                this.prefix.strip_suffix('/').unwrap_or(&this.prefix),
                prefix.strip_prefix('/').unwrap_or(&prefix)
            ));
        }
        if let Some(principal) = principal {
            this.principal = Some(Arc::new(principal));
        }
        this.handle_inner(req).await
    }

    /// Handles a request with a `Stream` body instead of a `HttpBody`.
    /// Used with webserver frameworks that have not
    /// opted to use the `http_body` crate just yet.
    #[doc(hidden)]
    pub async fn handle_stream<ReqBody, ReqData, ReqError>(
        &self,
        req: Request<ReqBody>,
    ) -> Response<Body>
    where
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
        ReqBody: Stream<Item = Result<ReqData, ReqError>>,
    {
        let req = {
            let (parts, body) = req.into_parts();
            Request::from_parts(parts, StreamBody::new(body))
        };
        self.handle_inner(req).await
    }
}

// map a repository failure that the method has no specific status for.
pub(crate) fn internal_error(e: RepoError) -> DavError {
    error!("repository failure: {e}");
    DavError::msg(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

impl DavHandler {
    pub(crate) fn principal(&self) -> Option<&str> {
        self.principal.as_deref().map(|s| s.as_str())
    }

    // drain request body and return it.
    pub(crate) async fn read_request<ReqBody, ReqData, ReqError>(
        &self,
        body: ReqBody,
        max_size: usize,
    ) -> DavResult<Vec<u8>>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        let mut data = Vec::new();
        pin_utils::pin_mut!(body);
        while let Some(res) = body.data().await {
            let mut buf = res.map_err(|e| {
                DavError::IoError(io::Error::new(io::ErrorKind::UnexpectedEof, e.to_string()))
            })?;
            while buf.has_remaining() {
                if data.len() + buf.remaining() > max_size {
                    return Err(StatusCode::PAYLOAD_TOO_LARGE.into());
                }
                let b = buf.chunk();
                let l = b.len();
                data.extend_from_slice(b);
                buf.advance(l);
            }
        }
        Ok(data)
    }

    // internal dispatcher.
    async fn handle_inner<ReqBody, ReqData, ReqError>(
        &self,
        req: Request<ReqBody>,
    ) -> Response<Body>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        // Turn any DavError results into a HTTP error response.
        match self.handle2(req).await {
            Ok(resp) => {
                debug!("== END REQUEST result OK");
                resp
            }
            Err(err) => {
                debug!("== END REQUEST result {:?}", err);
                let status = err.statuscode();
                if status.is_server_error() && !matches!(err, DavError::Message(..)) {
                    error!("request failed: {err}");
                }
                let body = match err.message() {
                    Some(m) => Body::from(m),
                    None => Body::empty(),
                };
                let mut resp = Response::new(Body::empty());
                *resp.status_mut() = status;
                let h = resp.headers_mut();
                h.typed_insert(headers::ContentLength(body.len() as u64));
                if !body.is_empty() {
                    h.typed_insert(headers::ContentType::text_utf8());
                }
                if err.must_close() {
                    h.typed_insert(headers::Connection::close());
                }
                *resp.body_mut() = body;
                resp
            }
        }
    }

    // internal dispatcher part 2.
    async fn handle2<ReqBody, ReqData, ReqError>(
        &self,
        req: Request<ReqBody>,
    ) -> DavResult<Response<Body>>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        let (req, body) = {
            let (parts, body) = req.into_parts();
            (Request::from_parts(parts, ()), body)
        };

        // debug when running the webdav litmus tests.
        if log_enabled!(log::Level::Debug) {
            if let Some(t) = req.headers().typed_get::<davheaders::XLitmus>() {
                debug!("X-Litmus: {:?}", t);
            }
        }

        // translate HTTP method to Webdav method.
        let method = match dav_method(req.method()) {
            Ok(m) => m,
            Err(e) => {
                debug!("refusing method {} request {}", req.method(), req.uri());
                return Err(e);
            }
        };

        // see if method is allowed.
        if !self.allow.contains(method) {
            debug!(
                "method {} not allowed on request {}",
                req.method(),
                req.uri()
            );
            return Err(DavError::StatusClose(StatusCode::METHOD_NOT_ALLOWED));
        }

        // make sure the request path is valid.
        let path = DavPath::from_uri_and_prefix(req.uri(), &self.prefix)?;

        // PUT is the only handler that reads the body itself. All the
        // other handlers either expected no body, or a pre-read Vec<u8>.
        let (body_strm, body_data) = match method {
            DavMethod::PUT => (Some(body), Vec::new()),
            _ => (None, self.read_request(body, MAX_SMALL_BODY_SIZE).await?),
        };

        // Not all methods accept a body.
        if !DavMethod::WEBDAV_BODY.contains(method) && !body_data.is_empty() {
            return Err(StatusCode::UNSUPPORTED_MEDIA_TYPE.into());
        }

        debug!("== START REQUEST {:?} {}", method, path);

        match (method, body_strm) {
            (DavMethod::OPTIONS, _) => self.handle_options(&req, &path).await,
            (DavMethod::MKCOL, _) => self.handle_mkcol(&req, &path).await,
            (DavMethod::DELETE, _) => self.handle_delete(&req, &path).await,
            (DavMethod::UNLOCK, _) => self.handle_unlock(&req, &path).await,
            (DavMethod::HEAD, _) | (DavMethod::GET, _) => self.handle_get(&req, &path).await,
            (DavMethod::PUT, Some(body)) => self.handle_put(&req, &path, body).await,
            _ => Err(StatusCode::NOT_IMPLEMENTED.into()),
        }
    }
}
