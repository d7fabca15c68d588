// # HTTP and TCP Health Probes
//
// `Probe` implementations that measure an address directly.
//
// ## HttpProbe
//
// Sends `GET http://<address>:<port><path>` and, if the connection cannot be
// made, retries once over HTTPS. Any status below 500 means the server is
// answering and counts as healthy; 5xx, timeouts and connection failures
// are unhealthy. Redirects are not followed. Latency is measured from the
// first attempt.
//
// ## TcpProbe
//
// Opens a TCP connection and closes it again. Healthy if the handshake
// completes within the timeout.
//
// Both probes report unreachable addresses as unhealthy outcomes rather than
// errors, so the sample keeps the failure reason and the elapsed time.

use failover_core::ProviderRegistry;
use failover_core::config::ProbeConfig;
use failover_core::traits::{Probe, ProbeFactory, ProbeOutcome};
use failover_core::{Error, Result};

use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use tokio::net::TcpStream;

/// HTTP probe with HTTPS fallback
#[derive(Debug, Clone)]
pub struct HttpProbe {
    port: u16,
    https_port: u16,
    path: String,
    host_header: Option<String>,
    client: reqwest::Client,
}

impl HttpProbe {
    /// Create a new HTTP probe
    ///
    /// # Parameters
    ///
    /// - `port`: Port for the plain HTTP attempt
    /// - `https_port`: Port for the HTTPS fallback
    /// - `path`: Request path, starting with `/`
    /// - `host_header`: Host header to send instead of the bare address
    pub fn new(
        port: u16,
        https_port: u16,
        path: impl Into<String>,
        host_header: Option<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            // Certificates name the record, not the bare address
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            port,
            https_port,
            path: path.into(),
            host_header,
            client,
        })
    }

    fn url(&self, scheme: &str, address: IpAddr, port: u16) -> String {
        // SocketAddr's Display brackets IPv6 addresses
        format!("{}://{}{}", scheme, SocketAddr::new(address, port), self.path)
    }

    async fn attempt(&self, url: &str, timeout: Duration) -> reqwest::Result<reqwest::StatusCode> {
        let mut request = self.client.get(url).timeout(timeout);
        if let Some(host) = &self.host_header {
            request = request.header(reqwest::header::HOST, host);
        }
        Ok(request.send().await?.status())
    }
}

#[async_trait::async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, address: IpAddr, timeout: Duration) -> Result<ProbeOutcome> {
        let started = Instant::now();

        for (scheme, port) in [("http", self.port), ("https", self.https_port)] {
            let url = self.url(scheme, address, port);

            match self.attempt(&url, timeout).await {
                Ok(status) if status.as_u16() < 500 => {
                    tracing::trace!(url = %url, status = status.as_u16(), "Probe answered");
                    return Ok(ProbeOutcome::healthy(started.elapsed()));
                }
                Ok(status) => {
                    return Ok(ProbeOutcome::unhealthy(
                        format!("HTTP {}", status.as_u16()),
                        Some(started.elapsed()),
                    ));
                }
                Err(e) if e.is_timeout() => {
                    return Ok(ProbeOutcome::unhealthy("HTTP timeout", Some(started.elapsed())));
                }
                Err(e) => {
                    tracing::debug!(url = %url, error = %e, "Probe attempt failed");
                }
            }
        }

        Ok(ProbeOutcome::unhealthy(
            "HTTP connection failed",
            Some(started.elapsed()),
        ))
    }

    fn probe_name(&self) -> &'static str {
        "http"
    }
}

/// TCP connect probe
#[derive(Debug, Clone, Copy)]
pub struct TcpProbe {
    port: u16,
}

impl TcpProbe {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

#[async_trait::async_trait]
impl Probe for TcpProbe {
    async fn probe(&self, address: IpAddr, timeout: Duration) -> Result<ProbeOutcome> {
        let target = SocketAddr::new(address, self.port);
        let started = Instant::now();

        let outcome = match tokio::time::timeout(timeout, TcpStream::connect(target)).await {
            Ok(Ok(_stream)) => ProbeOutcome::healthy(started.elapsed()),
            Ok(Err(e)) => ProbeOutcome::unhealthy(
                format!("TCP connect to {} failed: {}", target, e),
                Some(started.elapsed()),
            ),
            Err(_) => ProbeOutcome::unhealthy("TCP connect timeout", Some(started.elapsed())),
        };

        Ok(outcome)
    }

    fn probe_name(&self) -> &'static str {
        "tcp"
    }
}

/// Factory for creating HTTP probes
pub struct HttpProbeFactory;

impl ProbeFactory for HttpProbeFactory {
    fn create(&self, config: &ProbeConfig) -> Result<Box<dyn Probe>> {
        match config {
            ProbeConfig::Http {
                port,
                https_port,
                path,
                host_header,
            } => Ok(Box::new(HttpProbe::new(
                *port,
                *https_port,
                path.clone(),
                host_header.clone(),
            )?)),
            _ => Err(Error::config("Invalid config for HTTP probe")),
        }
    }
}

/// Factory for creating TCP probes
pub struct TcpProbeFactory;

impl ProbeFactory for TcpProbeFactory {
    fn create(&self, config: &ProbeConfig) -> Result<Box<dyn Probe>> {
        match config {
            ProbeConfig::Tcp { port } => Ok(Box::new(TcpProbe::new(*port))),
            _ => Err(Error::config("Invalid config for TCP probe")),
        }
    }
}

/// Register the HTTP and TCP probes with a registry
pub fn register(registry: &ProviderRegistry) {
    registry.register_probe("http", Box::new(HttpProbeFactory));
    registry.register_probe("tcp", Box::new(TcpProbeFactory));
}
