//
//  Sample application.
//
//  Listens on localhost:4918, plain http, no ssl.
//  Connect to http://localhost:4918/
//
//  Paths given with `--lock` are locked before the server starts; their
//  tokens are printed so that clients can pass them in an `If` header.
//

use std::convert::Infallible;
use std::error::Error;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use clap::Parser;
use futures_util::future::TryFutureExt;
use headers::{authorization::Basic, Authorization, HeaderMapExt};

use dav_engine::body::Body;
use dav_engine::ls::memls::MemLs;
use dav_engine::ls::{DavLockManager, LockDepth, LockScope};
use dav_engine::repo::MemRepository;
use dav_engine::{DavHandler, DavPath, LockSystem, Repository};

#[derive(Clone)]
struct Server {
    dh: DavHandler,
    auth: bool,
}

impl Server {
    pub fn new(repo: Repository, memls: bool, prefix: &str, auth: bool) -> Self {
        let mut config = DavHandler::builder(repo).strip_prefix(prefix);
        if memls {
            config = config.locksystem(LockSystem::Mem);
        }

        Server {
            dh: config.build(),
            auth,
        }
    }

    async fn handle(
        &self,
        req: hyper::Request<hyper::Body>,
    ) -> Result<hyper::Response<Body>, Infallible> {
        let user = if self.auth {
            // we want the client to authenticate.
            match req.headers().typed_get::<Authorization<Basic>>() {
                Some(Authorization(basic)) => Some(basic.username().to_string()),
                None => {
                    // return a 401 reply.
                    let mut response = hyper::Response::new(Body::from("please auth"));
                    *response.status_mut() = hyper::StatusCode::UNAUTHORIZED;
                    response.headers_mut().insert(
                        "WWW-Authenticate",
                        hyper::header::HeaderValue::from_static("Basic realm=\"foo\""),
                    );
                    return Ok(response);
                }
            }
        } else {
            None
        };

        if let Some(user) = user {
            Ok(self.dh.handle_with(req, None, Some(user)).await)
        } else {
            Ok(self.dh.handle(req).await)
        }
    }
}

#[derive(Debug, clap::Parser)]
#[command(about, version)]
struct Cli {
    /// port to listen on
    #[arg(short, long, default_value = "4918")]
    port: u16,
    /// url prefix to strip off
    #[arg(long, default_value = "")]
    prefix: String,
    /// use ephemeral memory locksystem
    #[arg(short = 'l', long)]
    memls: bool,
    /// lock this path exclusively at startup (implies --memls)
    #[arg(long)]
    lock: Vec<String>,
    /// require basic authentication
    #[arg(short, long)]
    auth: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    serve(cli).await
}

// a repository with a shared lock manager, so that we can
// hand out lock tokens before serving.
fn prelocked(paths: &[String]) -> Result<Repository, Box<dyn Error>> {
    let ls = MemLs::new();
    for p in paths {
        let path = DavPath::new(p)?;
        match ls.lock(&path, None, Some("server"), None, LockScope::Exclusive, LockDepth::Infinity) {
            Ok(lock) => println!("locked {} with token {}", path, lock.token),
            Err(other) => println!("{} already locked by {}", path, other.token),
        }
    }
    Ok(Repository::Custom(Arc::new(MemRepository::with_locks(ls))))
}

async fn serve(cli: Cli) -> Result<(), Box<dyn Error>> {
    let repo = if cli.lock.is_empty() {
        Repository::Mem
    } else {
        prelocked(&cli.lock)?
    };

    let dav_server = Server::new(repo, cli.memls, &cli.prefix, cli.auth);
    let make_service = hyper::service::make_service_fn(|_| {
        let dav_server = dav_server.clone();
        async move {
            let func = move |req| {
                let dav_server = dav_server.clone();
                async move { dav_server.handle(req).await }
            };
            Ok::<_, hyper::Error>(hyper::service::service_fn(func))
        }
    });

    let addr = format!("0.0.0.0:{}", cli.port);
    let addr = SocketAddr::from_str(&addr)?;

    let server = hyper::Server::try_bind(&addr)?
        .serve(make_service)
        .map_err(|e| eprintln!("server error: {}", e));

    println!("Serving memory repository on {}", cli.port);
    let _ = server.await;
    Ok(())
}
