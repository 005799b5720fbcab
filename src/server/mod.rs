pub mod api;
pub mod websocket;

use crate::agent::PortfolioAgent;
use crate::cli::Args;
use self::websocket::handle_connection;
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::io::{ AsyncRead, AsyncWrite };
use tokio::net::TcpListener;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ ErrorResponse, Request, Response };
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_rustls::TlsAcceptor;
use url::form_urlencoded;
use rustls::ServerConfig;
use rustls::pki_types::CertificateDer;
use lazy_static::lazy_static;
use governor::{ DefaultDirectRateLimiter, Quota, RateLimiter };
use log::{ info, warn, error, debug };

type BoxError = Box<dyn Error + Send + Sync>;

lazy_static! {
    /// Accepted sockets per second, across every visitor.
    static ref ACCEPT_LIMITER: DefaultDirectRateLimiter =
        RateLimiter::direct(Quota::per_second(NonZeroU32::new(10).unwrap_or(NonZeroU32::MIN)));
}

/// Reads a PEM certificate chain and the first private key (PKCS#8, PKCS#1
/// or SEC1) into a rustls server config.
pub fn load_tls_config(cert_path: &str, key_path: &str) -> Result<Arc<ServerConfig>, BoxError> {
    let open = |path: &str, what: &str| {
        File::open(path)
            .map(BufReader::new)
            .map_err(|e| format!("Cannot open TLS {} '{}': {}", what, path, e))
    };

    let chain = rustls_pemfile::certs(&mut open(cert_path, "certificate")?)
        .collect::<Result<Vec<CertificateDer<'static>>, _>>()
        .map_err(|e| format!("Invalid certificate in '{}': {}", cert_path, e))?;
    if chain.is_empty() {
        return Err(format!("No certificate found in '{}'", cert_path).into());
    }

    let key = rustls_pemfile::private_key(&mut open(key_path, "key")?)
        .map_err(|e| format!("Invalid private key in '{}': {}", key_path, e))?
        .ok_or_else(|| format!("No private key found in '{}'", key_path))?;

    let config = ServerConfig::builder().with_no_client_auth().with_single_cert(chain, key)?;
    Ok(Arc::new(config))
}

/// `None` for plain WS. TLS needs both paths; one without the other is a
/// startup error rather than a silent downgrade.
fn tls_acceptor(args: &Args) -> Result<Option<TlsAcceptor>, BoxError> {
    if !args.enable_tls {
        return Ok(None);
    }
    match (args.tls_cert_path.as_deref(), args.tls_key_path.as_deref()) {
        (Some(cert), Some(key)) => {
            info!("Loading TLS certificate '{}' and key '{}'", cert, key);
            Ok(Some(TlsAcceptor::from(load_tls_config(cert, key)?)))
        }
        _ => {
            error!("ENABLE_TLS needs both TLS_CERT_PATH and TLS_KEY_PATH");
            Err("TLS enabled without certificate and key paths".into())
        }
    }
}

/// Extracts the client key from the `X-API-Key` header or `api_key` query param.
fn provided_api_key(req: &Request) -> Option<String> {
    let from_header = req
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    from_header.or_else(|| {
        let query = req.uri().query()?;
        form_urlencoded
            ::parse(query.as_bytes())
            .find(|(name, _)| *name == "api_key")
            .map(|(_, value)| value.into_owned())
    })
}

fn authorize(req: &Request, required: Option<&str>) -> Result<(), ErrorResponse> {
    let Some(required) = required else {
        return Ok(());
    };
    if provided_api_key(req).as_deref() == Some(required) {
        return Ok(());
    }
    let mut denied = ErrorResponse::new(Some("Unauthorized".to_string()));
    *denied.status_mut() = StatusCode::UNAUTHORIZED;
    Err(denied)
}

/// WebSocket front door for chat widgets: one widget per accepted socket.
pub struct Server {
    addr: String,
    agent: Arc<PortfolioAgent>,
    api_key: Option<String>,
    args: Args,
}

impl Server {
    pub fn new(addr: String, agent: Arc<PortfolioAgent>, api_key: Option<String>, args: Args) -> Self {
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        match api_key {
            Some(_) => info!("WebSocket clients must present SERVER_API_KEY"),
            None => warn!("SERVER_API_KEY not set, any client may open a chat widget"),
        }
        Self { addr, agent, api_key, args }
    }

    pub async fn run(&self) -> Result<(), BoxError> {
        if let Some(http_port) = self.args.http_port {
            api::start_http_server(http_port, self.agent.clone(), self.args.clone()).await?;
        }

        let acceptor = tls_acceptor(&self.args)?;
        let listener = TcpListener::bind(&self.addr).await?;
        info!(
            "Chat widget server listening on {}://{}",
            if acceptor.is_some() { "wss" } else { "ws" },
            self.addr
        );

        loop {
            let (stream, peer) = listener.accept().await?;
            if ACCEPT_LIMITER.check().is_err() {
                warn!("Accept rate exceeded, dropping {}", peer);
                continue;
            }
            debug!("Accepted TCP connection from {}", peer);

            let agent = Arc::clone(&self.agent);
            let api_key = self.api_key.clone();
            let acceptor = acceptor.clone();

            tokio::spawn(async move {
                let served = match acceptor {
                    Some(acceptor) =>
                        match acceptor.accept(stream).await {
                            Ok(tls) => Self::serve(peer, tls, agent, api_key).await,
                            Err(e) => Err(format!("TLS handshake with {} failed: {}", peer, e).into()),
                        }
                    None => Self::serve(peer, stream, agent, api_key).await,
                };
                if let Err(e) = served {
                    error!("Connection {} ended with error: {}", peer, e);
                }
            });
        }
    }

    async fn serve<S>(
        peer: SocketAddr,
        stream: S,
        agent: Arc<PortfolioAgent>,
        api_key: Option<String>
    ) -> Result<(), BoxError>
        where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
    {
        let check = |req: &Request, response: Response| {
            authorize(req, api_key.as_deref()).map(|()| response).map_err(|denied| {
                warn!("Rejected WebSocket upgrade from {}: bad or missing API key", peer);
                denied
            })
        };

        let ws = accept_hdr_async(stream, check).await?;
        handle_connection(peer, ws, agent).await;
        Ok(())
    }
}
