//! Connectivity detection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use url::Url;

use crate::error::RemoteError;

/// Answers "is the network reachable at all?". Remote health is probed
/// separately through the remote adapter.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Connectivity flag flipped by the embedding application (or a test).
#[derive(Debug)]
pub struct ManualConnectivity {
    online: AtomicBool,
}

impl ManualConnectivity {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityProbe for ManualConnectivity {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Online when a TCP connection to the remote host opens in time.
#[derive(Debug, Clone)]
pub struct TcpConnectivity {
    addr: String,
    timeout: Duration,
}

impl TcpConnectivity {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    /// Probe the host and port of a service URL.
    pub fn for_url(service_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let url = Url::parse(service_url.trim())?;
        let host = url
            .host_str()
            .ok_or_else(|| RemoteError::Rejected(format!("no host in {service_url}")))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| RemoteError::Rejected(format!("no port for {service_url}")))?;
        Ok(Self::new(format!("{host}:{port}"), timeout))
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl ConnectivityProbe for TcpConnectivity {
    async fn is_online(&self) -> bool {
        matches!(
            tokio::time::timeout(self.timeout, TcpStream::connect(self.addr.as_str())).await,
            Ok(Ok(_))
        )
    }
}
