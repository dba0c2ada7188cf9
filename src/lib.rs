//! ## Generic async Webdav protocol engine
//!
//! [`Webdav`] (RFC4918) is defined as
//! HTTP (GET/HEAD/PUT/DELETE) plus a bunch of extension methods (MKCOL, LOCK, etc).
//! These extension methods are used to manage collections (like unix directories),
//! lock/unlock items, and so on.
//!
//! A `handler` is a piece of code that takes a `http::Request`, processes it in some
//! way, and then generates a `http::Response`. This library is a `handler` that maps
//! the Webdav protocol onto a tree of resources held by a [repository][DavRepository].
//! Included is an in-memory repository ([`MemRepository`]) and an in-memory
//! lock manager ([`MemLs`]).
//!
//! ## What the engine does.
//!
//! - resolves request URLs to resource references ([`DavPath`]).
//! - keeps a tree of collections and plain resources, each with an entity tag
//!   that is a SHA-256 hash of its content (or of its children's tags).
//! - evaluates the Webdav `If` header against the active locks of the target,
//!   and refuses writes to locked resources without a matching lock token.
//! - handles `MKCOL`, `PUT`, `DELETE`, `UNLOCK`, `OPTIONS`, `GET` and `HEAD`, and
//!   maps repository failures to the right status codes.
//! - honours the HTTP `If-Match` and `If-None-Match` preconditions.
//!
//! XML bodies (PROPFIND, PROPPATCH, LOCK) are not handled, those methods
//! return `501 Not Implemented`.
//!
//! ## Backend interfaces.
//!
//! - the library contains a [HTTP handler][DavHandler].
//! - you supply a [repository][DavRepository] for the resource tree, or use
//!   [`Repository::Mem`].
//! - a repository can expose a [lock manager][DavLockManager]. If it does, every
//!   mutating request goes through the lock gate.
//!
//! The handler works with the standard http types from the `http` and
//! `http_body` crates, so it can be used straight away with hyper.
//!
//! ## Example.
//!
//! ```no_run
//! use std::convert::Infallible;
//! use dav_engine::{DavHandler, LockSystem, Repository};
//!
//! #[tokio::main]
//! async fn main() {
//!     let addr = ([127, 0, 0, 1], 4918).into();
//!
//!     let dav_server = DavHandler::builder(Repository::Mem)
//!         .locksystem(LockSystem::Mem)
//!         .build();
//!
//!     let make_service = hyper::service::make_service_fn(move |_| {
//!         let dav_server = dav_server.clone();
//!         async move {
//!             let func = move |req| {
//!                 let dav_server = dav_server.clone();
//!                 async move {
//!                     Ok::<_, Infallible>(dav_server.handle(req).await)
//!                 }
//!             };
//!             Ok::<_, Infallible>(hyper::service::service_fn(func))
//!         }
//!     });
//!
//!     println!("Serving on {}", addr);
//!     let _ = hyper::Server::bind(&addr)
//!         .serve(make_service)
//!         .await
//!         .map_err(|e| eprintln!("server error: {}", e));
//! }
//! ```
//!
//! [`Webdav`]: https://tools.ietf.org/html/rfc4918
//! [`MemRepository`]: repo::MemRepository
//! [`MemLs`]: ls::memls::MemLs
//! [DavRepository]: repo::DavRepository
//! [DavLockManager]: ls::DavLockManager

#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;

mod conditional;
mod davhandler;
mod davheaders;
mod errors;
mod util;

pub mod body;
pub mod davpath;
pub mod ls;
pub mod repo;

pub(crate) use crate::errors::DavResult;

pub use crate::davhandler::{DavBuilder, DavHandler, LockSystem, Repository, MAX_BODY_SIZE};
pub use crate::davpath::DavPath;
pub use crate::util::DavMethod;
