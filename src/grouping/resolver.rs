use std::future::Future;
use std::io;
use std::net::IpAddr;

/// Resolves a host to the address used for IP grouping
pub trait HostResolver: Send + Sync + 'static {
    fn resolve(&self, host: &str, port: u16) -> impl Future<Output = io::Result<IpAddr>> + Send;
}

/// System DNS resolution through tokio
#[derive(Debug, Default, Clone, Copy)]
pub struct DnsResolver;

impl HostResolver for DnsResolver {
    async fn resolve(&self, host: &str, port: u16) -> io::Result<IpAddr> {
        tokio::net::lookup_host((host, port))
            .await?
            .next()
            .map(|addr| addr.ip())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no address for {}", host)))
    }
}
