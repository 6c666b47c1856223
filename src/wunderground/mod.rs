pub mod settings;

use crate::upload::StationUpload;
use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveError;
use hickory_resolver::TokioAsyncResolver;
use reqwest::header::HOST;
use reqwest::{Client, StatusCode};
use settings::WundergroundConfig;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use url::Url;

pub const WU_HOST: &str = "rtupdate.wunderground.com";
pub const WU_PATH: &str = "/weatherstation/updateweatherstation.php";

const PUBLIC_DNS: [IpAddr; 2] = [
    IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)),
    IpAddr::V4(Ipv4Addr::new(8, 8, 4, 4)),
];
const DNS_TIMEOUT: Duration = Duration::from_secs(5);
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);
/// Upper bound for one relay attempt, resolution and request together.
const FORWARD_DEADLINE: Duration = Duration::from_secs(12);
const MAX_IN_FLIGHT: usize = 4;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to resolve {host}: {source}")]
    Resolve {
        host: String,
        source: ResolveError,
    },
    #[error("no IPv4 address found for {0}")]
    NoAddress(String),
    #[error("resolving {0} timed out")]
    ResolveTimeout(String),
    #[error("invalid relay URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("relay request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Finds the address to send relayed uploads to.
#[async_trait]
pub trait ResolveHost: Send + Sync {
    async fn resolve_ipv4(&self, host: &str) -> Result<Ipv4Addr, RelayError>;
}

/// Resolves through Google's public DNS instead of the system resolver.
///
/// Setups that redirect the station to this bridge usually do it by overriding the Weather
/// Underground hostname in local DNS, which would otherwise send the relay straight back here.
pub struct PublicDnsResolver {
    resolver: TokioAsyncResolver,
}

impl PublicDnsResolver {
    pub fn new() -> Self {
        let nameservers = NameServerConfigGroup::from_ips_clear(&PUBLIC_DNS, 53, true);
        let mut options = ResolverOpts::default();
        options.timeout = DNS_TIMEOUT;
        options.attempts = 1;

        Self {
            resolver: TokioAsyncResolver::tokio(
                ResolverConfig::from_parts(None, vec![], nameservers),
                options,
            ),
        }
    }
}

impl Default for PublicDnsResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResolveHost for PublicDnsResolver {
    async fn resolve_ipv4(&self, host: &str) -> Result<Ipv4Addr, RelayError> {
        let lookup = tokio::time::timeout(DNS_TIMEOUT, self.resolver.ipv4_lookup(host))
            .await
            .map_err(|_| RelayError::ResolveTimeout(host.to_owned()))?
            .map_err(|source| RelayError::Resolve {
                host: host.to_owned(),
                source,
            })?;

        lookup
            .iter()
            .next()
            .map(|record| record.0)
            .ok_or_else(|| RelayError::NoAddress(host.to_owned()))
    }
}

/// Best-effort forwarder of raw station uploads to Weather Underground.
pub struct WundergroundRelay {
    resolver: Box<dyn ResolveHost>,
    http: Client,
    username: String,
    password: String,
    port: u16,
    in_flight: Arc<Semaphore>,
}

impl WundergroundRelay {
    pub fn new(config: &WundergroundConfig) -> Result<Self, RelayError> {
        Self::with_resolver(config, Box::new(PublicDnsResolver::new()), 80)
    }

    pub fn with_resolver(
        config: &WundergroundConfig,
        resolver: Box<dyn ResolveHost>,
        port: u16,
    ) -> Result<Self, RelayError> {
        let http = Client::builder().timeout(HTTP_TIMEOUT).build()?;

        Ok(Self {
            resolver,
            http,
            username: config.username.clone(),
            password: config.password.clone(),
            port,
            in_flight: Arc::new(Semaphore::new(MAX_IN_FLIGHT)),
        })
    }

    /// Relays in a detached task. The outcome is only ever logged.
    pub fn dispatch(self: &Arc<Self>, upload: StationUpload) {
        let permit = match Arc::clone(&self.in_flight).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(
                    in_flight = MAX_IN_FLIGHT,
                    "Too many pending Weather Underground relays, dropping this one"
                );
                return;
            }
        };

        let relay = Arc::clone(self);
        tokio::spawn(async move {
            let _permit = permit;

            match tokio::time::timeout(FORWARD_DEADLINE, relay.forward(&upload)).await {
                Ok(Ok(status)) if status.is_success() => {
                    info!("Successfully forwarded to Weather Underground")
                }
                Ok(Ok(status)) => {
                    warn!(status = %status, "Weather Underground returned non-OK status")
                }
                Ok(Err(e)) => error!(error = %e, "Failed to forward to Weather Underground"),
                Err(_) => error!("Timeout while forwarding to Weather Underground"),
            }
        });
    }

    /// Sends the upload to the resolved upstream address with the canonical Host header.
    pub async fn forward(&self, upload: &StationUpload) -> Result<StatusCode, RelayError> {
        let ip = self.resolver.resolve_ipv4(WU_HOST).await?;
        debug!(ip = %ip, "Resolved Weather Underground address");

        let url = self.relay_url(ip, upload)?;
        let response = self.http.get(url).header(HOST, WU_HOST).send().await?;

        Ok(response.status())
    }

    /// Every pair the station sent, sorted by key, with configured credentials swapped in.
    fn relay_url(&self, ip: Ipv4Addr, upload: &StationUpload) -> Result<Url, RelayError> {
        let overrides = [("ID", &self.username), ("PASSWORD", &self.password)]
            .into_iter()
            .filter(|(_, value)| !value.is_empty());

        let mut forwarded: Vec<(&str, &str)> = upload
            .pairs()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .filter(|(k, _)| match *k {
                "ID" => self.username.is_empty(),
                "PASSWORD" => self.password.is_empty(),
                _ => true,
            })
            .chain(overrides.map(|(k, v)| (k, v.as_str())))
            .collect();
        forwarded.sort_by_key(|(k, _)| *k);

        let mut url = Url::parse(&format!("http://{}:{}{}", ip, self.port, WU_PATH))?;
        url.query_pairs_mut().extend_pairs(forwarded);

        Ok(url)
    }
}

/// Resolves every host to a fixed address.
#[cfg(test)]
pub(crate) struct StaticResolver(pub Ipv4Addr);

#[cfg(test)]
#[async_trait]
impl ResolveHost for StaticResolver {
    async fn resolve_ipv4(&self, _host: &str) -> Result<Ipv4Addr, RelayError> {
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::net::SocketAddr;

    struct FailingResolver;

    #[async_trait]
    impl ResolveHost for FailingResolver {
        async fn resolve_ipv4(&self, host: &str) -> Result<Ipv4Addr, RelayError> {
            Err(RelayError::NoAddress(host.to_owned()))
        }
    }

    fn config(username: &str, password: &str) -> WundergroundConfig {
        WundergroundConfig {
            forward: "true".to_owned(),
            username: username.to_owned(),
            password: password.to_owned(),
        }
    }

    fn params() -> StationUpload {
        StationUpload::from_iter([
            ("ID", "station"),
            ("PASSWORD", "station-key"),
            ("tempf", "75.5"),
            ("dateutc", "2025-12-1 11:15:31"),
        ])
    }

    #[tokio::test]
    async fn test_forward_overrides_credentials_and_sets_host() {
        let mut server = mockito::Server::new_async().await;
        let address: SocketAddr = server.host_with_port().parse().unwrap();
        let mock = server
            .mock("GET", WU_PATH)
            .match_header("host", WU_HOST)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("ID".into(), "my-station".into()),
                Matcher::UrlEncoded("PASSWORD".into(), "secret".into()),
                Matcher::UrlEncoded("tempf".into(), "75.5".into()),
                Matcher::UrlEncoded("dateutc".into(), "2025-12-1 11:15:31".into()),
            ]))
            .with_status(200)
            .with_body("success")
            .create_async()
            .await;

        let relay = WundergroundRelay::with_resolver(
            &config("my-station", "secret"),
            Box::new(StaticResolver(Ipv4Addr::LOCALHOST)),
            address.port(),
        )
        .unwrap();

        let status = relay.forward(&params()).await.unwrap();

        assert_eq!(status, StatusCode::OK);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_forward_keeps_station_credentials_when_none_configured() {
        let mut server = mockito::Server::new_async().await;
        let address: SocketAddr = server.host_with_port().parse().unwrap();
        let mock = server
            .mock("GET", WU_PATH)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("ID".into(), "station".into()),
                Matcher::UrlEncoded("PASSWORD".into(), "station-key".into()),
            ]))
            .with_status(401)
            .create_async()
            .await;

        let relay = WundergroundRelay::with_resolver(
            &config("", ""),
            Box::new(StaticResolver(Ipv4Addr::LOCALHOST)),
            address.port(),
        )
        .unwrap();

        let status = relay.forward(&params()).await.unwrap();

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_forward_reports_resolution_failure() {
        let relay =
            WundergroundRelay::with_resolver(&config("", ""), Box::new(FailingResolver), 80).unwrap();

        let result = relay.forward(&params()).await;

        assert!(matches!(result, Err(RelayError::NoAddress(host)) if host == WU_HOST));
    }

    #[tokio::test]
    async fn test_forward_reports_unreachable_upstream() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let relay = WundergroundRelay::with_resolver(
            &config("", ""),
            Box::new(StaticResolver(Ipv4Addr::LOCALHOST)),
            port,
        )
        .unwrap();

        assert!(matches!(
            relay.forward(&params()).await,
            Err(RelayError::Http(_))
        ));
    }

    struct HangingResolver;

    #[async_trait]
    impl ResolveHost for HangingResolver {
        async fn resolve_ipv4(&self, _host: &str) -> Result<Ipv4Addr, RelayError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_dispatch_caps_pending_relays() {
        let relay = Arc::new(
            WundergroundRelay::with_resolver(&config("", ""), Box::new(HangingResolver), 80)
                .unwrap(),
        );

        for _ in 0..MAX_IN_FLIGHT + 2 {
            relay.dispatch(params());
        }

        assert_eq!(relay.in_flight.available_permits(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_releases_permit_after_failure() {
        let relay = Arc::new(
            WundergroundRelay::with_resolver(&config("", ""), Box::new(FailingResolver), 80)
                .unwrap(),
        );

        relay.dispatch(params());

        for _ in 0..50 {
            if relay.in_flight.available_permits() == MAX_IN_FLIGHT {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(relay.in_flight.available_permits(), MAX_IN_FLIGHT);
    }

    #[test]
    fn test_relay_url_is_sorted_and_encoded() {
        let relay = WundergroundRelay::with_resolver(
            &config("", ""),
            Box::new(FailingResolver),
            80,
        )
        .unwrap();

        let url = relay
            .relay_url(Ipv4Addr::new(192, 0, 2, 7), &params())
            .unwrap();

        assert_eq!(
            url.as_str(),
            "http://192.0.2.7/weatherstation/updateweatherstation.php?ID=station&PASSWORD=station-key&dateutc=2025-12-1+11%3A15%3A31&tempf=75.5"
        );
    }

    #[test]
    fn test_relay_url_keeps_repeated_values() {
        let relay = WundergroundRelay::with_resolver(
            &config("my-station", "secret"),
            Box::new(FailingResolver),
            80,
        )
        .unwrap();
        let upload = StationUpload::parse("tempf=75.5&ID=a&ID=b&tempf=80&PASSWORD=x&UV=2");

        let url = relay
            .relay_url(Ipv4Addr::new(192, 0, 2, 7), &upload)
            .unwrap();

        assert_eq!(
            url.query(),
            Some("ID=my-station&PASSWORD=secret&UV=2&tempf=75.5&tempf=80")
        );
    }
}
