//! Proxy server implementation
//! Dispatches requests through the static route table and forwards matches
//! to their namespaced backend, relaying the backend response unchanged

use crate::config::GatewayConfig;
use crate::error::ForwardError;
use crate::routes::{self, RouteAction, RouteTable};
use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Full, combinators::BoxBody};
use hyper::body::Incoming;
use hyper::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, HOST, HeaderMap, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode, Version};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn, Instrument};
use url::Url;

/// Body returned for `GET /`
pub const GREETING: &str = "Hello from Express!";

/// Response body type shared by local and relayed responses
pub type ProxyBody = BoxBody<Bytes, hyper::Error>;

/// Headers scoped to a single connection; never copied across the proxy
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Proxy server
pub struct ProxyServer {
    config: GatewayConfig,
    routes: RouteTable,
}

impl ProxyServer {
    /// Create a proxy server with the standard route table
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_routes(config, RouteTable::standard())
    }

    /// Create a proxy server with a custom route table
    pub fn with_routes(config: GatewayConfig, routes: RouteTable) -> Self {
        Self { config, routes }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Bind the listening socket on all interfaces
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr: SocketAddr = format!("0.0.0.0:{}", self.config.port).parse()?;
        TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))
    }

    /// Bind and serve until the task is dropped
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve until `signal` resolves, then stop accepting and return
    pub async fn serve_with_shutdown<F>(
        self: Arc<Self>,
        listener: TcpListener,
        signal: F,
    ) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            res = self.serve(listener) => res,
            _ = signal => {
                info!("Shutdown signal received");
                Ok(())
            }
        }
    }

    /// Accept connections on an already bound listener
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        info!("Proxy server running at http://localhost:{}/", addr.port());
        info!("Backend namespace: {}", self.config.namespace);

        loop {
            let (stream, remote_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    continue;
                }
            };
            let server = self.clone();

            tokio::spawn(
                async move {
                    if let Err(e) = server.handle_connection(stream, remote_addr).await {
                        debug!("HTTP connection error from {}: {}", remote_addr, e);
                    }
                }
                .in_current_span(),
            );
        }
    }

    /// Handle a single HTTP connection
    async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
    ) -> Result<()> {
        let io = TokioIo::new(stream);

        http1::Builder::new()
            .preserve_header_case(true)
            .serve_connection(
                io,
                service_fn(move |req| {
                    let server = self.clone();
                    async move { server.handle_request(req, remote_addr).await }
                }),
            )
            .await
            .map_err(|e| anyhow!("HTTP service error: {}", e))
    }

    /// Handle incoming request
    async fn handle_request(
        &self,
        req: Request<Incoming>,
        remote_addr: SocketAddr,
    ) -> Result<Response<ProxyBody>, Infallible> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        debug!("{} {} from {}", method, path, remote_addr);

        let route = match self.routes.lookup(&method, &path) {
            Some(route) => route,
            None => return Ok(Self::not_found_response(&method, &path)),
        };

        let target = match &route.action {
            RouteAction::Greeting => return Ok(Self::greeting_response(&method)),
            RouteAction::Forward { host_template } => {
                routes::target_url(host_template, &self.config.namespace)
            }
        };

        info!("proxy-pass: {}", path);

        match self.forward(req, &target).await {
            Ok(response) => Ok(response),
            Err(e) => {
                error!("Proxy error for {}: {}", path, e);
                Ok(Self::text_response(e.status(), "Bad Gateway"))
            }
        }
    }

    /// Forward the request to `target` and relay the backend response
    pub async fn forward(
        &self,
        req: Request<Incoming>,
        target: &str,
    ) -> Result<Response<ProxyBody>, ForwardError> {
        let url = Url::parse(target).map_err(|e| ForwardError::InvalidTarget {
            target: target.to_string(),
            reason: e.to_string(),
        })?;

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ForwardError::InvalidTarget {
                target: target.to_string(),
                reason: "missing host".to_string(),
            })?
            .to_string();
        let port = url.port_or_known_default().unwrap_or(80);
        let authority = match url.port() {
            Some(p) => format!("{}:{}", host, p),
            None => host.clone(),
        };
        let addr = format!("{}:{}", host, port);

        debug!("Proxying {} {} to {}", req.method(), req.uri(), target);

        let stream = self.connect(&host, port).await?;

        let (mut parts, body) = req.into_parts();
        strip_hop_by_hop(&mut parts.headers);

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let uri = join_path(url.path(), path_and_query);

        let mut builder = Request::builder()
            .method(parts.method)
            .uri(uri)
            .version(Version::HTTP_11);

        // Copy headers
        for (key, value) in parts.headers.iter() {
            if key != HOST {
                builder = builder.header(key, value);
            }
        }

        // Carries the inbound header casing through to the backend
        if let Some(extensions) = builder.extensions_mut() {
            *extensions = parts.extensions;
        }

        let proxy_req = builder.header(HOST, authority).body(body)?;

        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::Builder::new()
            .preserve_header_case(true)
            .handshake(io)
            .await
            .map_err(|source| ForwardError::Handshake {
                addr: addr.clone(),
                source,
            })?;

        tokio::spawn(
            async move {
                if let Err(e) = conn.await {
                    debug!("Backend connection error: {}", e);
                }
            }
            .in_current_span(),
        );

        let response = sender
            .send_request(proxy_req)
            .await
            .map_err(|source| ForwardError::Upstream { addr, source })?;

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);

        Ok(Response::from_parts(parts, body.boxed()))
    }

    /// Open a TCP connection to the backend, honoring resolve overrides
    async fn connect(&self, host: &str, port: u16) -> Result<TcpStream, ForwardError> {
        let addr = format!("{}:{}", host, port);
        let result = match self.config.resolve.get(host) {
            Some(pinned) => TcpStream::connect(pinned).await,
            None => TcpStream::connect(&addr).await,
        };

        result.map_err(|source| ForwardError::Connect { addr, source })
    }

    /// Greeting for the root path; HEAD gets headers only
    fn greeting_response(method: &Method) -> Response<ProxyBody> {
        if *method == Method::HEAD {
            let mut response = Response::new(Self::empty_body());
            let headers = response.headers_mut();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
            headers.insert(CONTENT_LENGTH, HeaderValue::from(GREETING.len()));
            return response;
        }

        Self::text_response(StatusCode::OK, GREETING)
    }

    /// Default response for anything outside the route table
    fn not_found_response(method: &Method, path: &str) -> Response<ProxyBody> {
        Self::text_response(StatusCode::NOT_FOUND, &format!("Cannot {} {}", method, path))
    }

    /// Create text response
    fn text_response(status: StatusCode, body: &str) -> Response<ProxyBody> {
        let mut response = Response::new(Self::full_body(Bytes::from(body.to_string())));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
        response
    }

    /// Create full body
    fn full_body(bytes: Bytes) -> ProxyBody {
        Full::new(bytes)
            .map_err(|never| match never {})
            .boxed()
    }

    /// Create empty body
    fn empty_body() -> ProxyBody {
        Empty::<Bytes>::new()
            .map_err(|never| match never {})
            .boxed()
    }
}

/// Remove hop-by-hop headers, including any named by `Connection`
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<String> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    for name in listed {
        headers.remove(name.as_str());
    }

    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}

/// Append the inbound path and query to the target's base path
fn join_path(base: &str, path_and_query: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path_and_query.trim_start_matches('/')
    )
}
