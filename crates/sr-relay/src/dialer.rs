//! Bounded dialing through a proxy
//!
//! [`ProxyDial`] is the raw capability (usually a local SOCKS5 endpoint).
//! [`Dialer`] wraps it with the fixed deadline and turns failures into a
//! [`DialError`] the caller can tell apart. It never retries.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sr_core::config::{join_host_port, RelayConfig};
use sr_core::DialError;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_socks::tcp::Socks5Stream;

/// A bidirectional byte stream to a remote host
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

/// An owned, dialed connection
pub type Connection = Box<dyn AsyncStream>;

/// Opens raw connections to `host:port`
#[async_trait]
pub trait ProxyDial: Send + Sync {
    async fn dial(&self, host: &str, port: u16) -> io::Result<Connection>;
}

/// Dials through a SOCKS5 proxy
pub struct Socks5Proxy {
    proxy_address: String,
    auth: Option<(String, String)>,
}

impl Socks5Proxy {
    pub fn new(proxy_address: impl Into<String>) -> Self {
        Self {
            proxy_address: proxy_address.into(),
            auth: None,
        }
    }

    pub fn with_password(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some((username.into(), password.into()));
        self
    }
}

#[async_trait]
impl ProxyDial for Socks5Proxy {
    async fn dial(&self, host: &str, port: u16) -> io::Result<Connection> {
        let proxy = self.proxy_address.as_str();
        let stream = match &self.auth {
            Some((username, password)) => {
                Socks5Stream::connect_with_password(proxy, (host, port), username, password).await
            }
            None => Socks5Stream::connect(proxy, (host, port)).await,
        }
        .map_err(socks_to_io)?;

        Ok(Box::new(stream))
    }
}

fn socks_to_io(err: tokio_socks::Error) -> io::Error {
    match err {
        tokio_socks::Error::Io(e) => e,
        tokio_socks::Error::ConnectionRefused | tokio_socks::Error::ProxyServerUnreachable => {
            io::Error::new(io::ErrorKind::ConnectionRefused, err.to_string())
        }
        other => io::Error::new(io::ErrorKind::Other, other.to_string()),
    }
}

/// Dials peers directly over TCP
pub struct DirectDial;

#[async_trait]
impl ProxyDial for DirectDial {
    async fn dial(&self, host: &str, port: u16) -> io::Result<Connection> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }
}

/// Dials with a deadline
#[derive(Clone)]
pub struct Dialer {
    proxy: Arc<dyn ProxyDial>,
    timeout: Duration,
}

impl Dialer {
    pub fn new(proxy: Arc<dyn ProxyDial>, timeout: Duration) -> Self {
        Self { proxy, timeout }
    }

    /// Build the dialer described by the configuration
    pub fn from_config(config: &RelayConfig) -> Self {
        let proxy: Arc<dyn ProxyDial> = match &config.proxy.address {
            Some(address) => {
                let socks = Socks5Proxy::new(address.clone());
                match (&config.proxy.username, &config.proxy.password) {
                    (Some(user), Some(pass)) => Arc::new(socks.with_password(user, pass)),
                    _ => Arc::new(socks),
                }
            }
            None => Arc::new(DirectDial),
        };
        Self::new(proxy, config.dial_timeout)
    }

    /// Open a connection to `host:port`, giving up after the deadline
    pub async fn dial(&self, host: &str, port: u16) -> Result<Connection, DialError> {
        let address = join_host_port(host, port);
        tracing::debug!("Dialing {} (timeout {:?})", address, self.timeout);

        match tokio::time::timeout(self.timeout, self.proxy.dial(host, port)).await {
            Err(_) => Err(DialError::Timeout {
                address,
                after: self.timeout,
            }),
            Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => Err(DialError::Refused {
                address,
                reason: e.to_string(),
            }),
            Ok(Err(e)) => Err(DialError::Failed {
                address,
                reason: e.to_string(),
            }),
            Ok(Ok(conn)) => {
                tracing::debug!("Connected to {}", address);
                Ok(conn)
            }
        }
    }
}
