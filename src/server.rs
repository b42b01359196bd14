//! HTTP server hosting a filter [`Chain`].
//!
//! Every accepted connection is served on its own task. When the shutdown
//! future resolves the accept loop stops, in-flight exchanges (and the trace
//! records they emit) are allowed to finish, and then the server returns.
//!
//! [`Server::serve`] stops on SIGTERM or Ctrl-C. [`Server::serve_until`] and
//! [`serve_with_shutdown`] take any future instead.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use http::{Response, StatusCode};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info};

use crate::body::Body;
use crate::error::Error;
use crate::middleware::Chain;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// ```rust
    /// use tsu_trace::Server;
    /// assert!(Server::bind("0.0.0.0:3000").is_ok());
    /// assert!(Server::bind("not-an-address").is_err());
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let addr = addr.parse().map_err(|_| Error::Addr(addr.to_owned()))?;
        Ok(Self { addr })
    }

    /// Serves `chain` until the process receives SIGTERM or Ctrl-C.
    pub async fn serve(self, chain: Chain) -> Result<(), Error> {
        self.serve_until(chain, os_signal()).await
    }

    /// Serves `chain` until `signal` resolves, then drains in-flight
    /// connections.
    pub async fn serve_until<F>(self, chain: Chain, signal: F) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.addr).await?;
        serve_with_shutdown(listener, chain, signal).await
    }
}

/// Serves `chain` on an already-bound listener until `signal` resolves, then
/// drains in-flight connections.
pub async fn serve_with_shutdown<F>(listener: TcpListener, chain: Chain, signal: F) -> Result<(), Error>
where
    F: Future<Output = ()>,
{
    let chain = Arc::new(chain);
    info!(addr = %listener.local_addr()?, "tsu-trace listening");

    let mut exchanges = tokio::task::JoinSet::new();
    tokio::pin!(signal);

    loop {
        tokio::select! {
            // stop accepting even while connections are queued
            biased;

            () = &mut signal => {
                info!(in_flight = exchanges.len(), "stopping, waiting for in-flight exchanges");
                break;
            }

            res = listener.accept() => {
                match res {
                    Ok((stream, peer)) => {
                        exchanges.spawn(serve_connection(Arc::clone(&chain), stream, peer));
                    }
                    Err(e) => error!(error = %e, "accept failed"),
                }
            }

            Some(_) = exchanges.join_next(), if !exchanges.is_empty() => {}
        }
    }

    while exchanges.join_next().await.is_some() {}

    info!("tsu-trace stopped");
    Ok(())
}

async fn serve_connection(chain: Arc<Chain>, stream: TcpStream, peer: SocketAddr) {
    let svc = service_fn(move |req| dispatch(Arc::clone(&chain), req, peer));
    if let Err(e) = ConnBuilder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(stream), svc)
        .await
    {
        error!(%peer, error = %e, "connection error");
    }
}

/// Runs one request through the chain.
///
/// A chain error becomes an empty `500` here; hyper never sees an error.
async fn dispatch(
    chain: Arc<Chain>,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    match chain.run(req.map(Body::from_stream)).await {
        Ok(res) => Ok(res),
        Err(e) => {
            error!(peer = %remote_addr, %method, path = %path, error = %e, "request failed");
            let mut res = Response::new(Body::empty());
            *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            Ok(res)
        }
    }
}

/// Resolves on SIGTERM or Ctrl-C. A signal that cannot be installed is
/// logged and never fires; the other one still can.
async fn os_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
