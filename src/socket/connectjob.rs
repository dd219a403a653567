use crate::base::neterror::NetError;
use crate::socket::client::TransportStream;
use boring::ssl::{SslConnector, SslMethod, SslVerifyMode};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::net::TcpStream;
use url::Url;

/// TLS knobs carried by a prepared transfer.
#[derive(Debug, Clone)]
pub struct TlsSettings {
    pub verify_peer: bool,
    pub verify_host: bool,
    pub ca_info: PathBuf,
    /// Offer `h2` in ALPN.
    pub offer_h2: bool,
}

/// Runs the connection process: DNS -> TCP -> SSL.
/// Roughly equivalent to net::ConnectJob.
pub struct ConnectJob;

impl ConnectJob {
    pub async fn connect(url: &Url, tls: &TlsSettings) -> Result<TransportStream, NetError> {
        let host = url.host_str().ok_or(NetError::InvalidUrl)?;
        let port = url.port_or_known_default().ok_or(NetError::InvalidUrl)?;

        // 1. DNS Resolution
        let addr_str = format!("{}:{}", host, port);
        let addrs = tokio::net::lookup_host(&addr_str).await.map_err(|e| {
            tracing::debug!(host = %host, error = %e, "DNS resolution failed");
            NetError::NameNotResolved
        })?;

        // 2. TCP Connect, first address that answers wins
        let mut last_error = NetError::NameNotResolved;
        let mut stream = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => {
                    tracing::debug!(%addr, error = %e, "TCP connect failed");
                    last_error = match e.kind() {
                        ErrorKind::ConnectionRefused => NetError::ConnectionRefused,
                        ErrorKind::ConnectionReset => NetError::ConnectionReset,
                        ErrorKind::TimedOut => NetError::ConnectionTimedOut,
                        _ => NetError::ConnectionFailed,
                    };
                }
            }
        }
        let stream = stream.ok_or(last_error)?;

        // 3. SSL Handshake (if https)
        if url.scheme() == "https" {
            let mut builder =
                SslConnector::builder(SslMethod::tls()).map_err(|_| NetError::SslProtocolError)?;

            let protos: &[u8] = if tls.offer_h2 {
                b"\x02h2\x08http/1.1"
            } else {
                b"\x08http/1.1"
            };
            builder.set_alpn_protos(protos).map_err(|_| NetError::SslProtocolError)?;

            if tls.verify_peer {
                builder.set_ca_file(&tls.ca_info).map_err(|e| {
                    tracing::warn!(path = %tls.ca_info.display(), error = %e, "CA bundle rejected");
                    NetError::SslProtocolError
                })?;
                builder.set_verify(SslVerifyMode::PEER);
            } else {
                builder.set_verify(SslVerifyMode::NONE);
            }

            let connector = builder.build();
            let mut config = connector.configure().map_err(|_| NetError::SslProtocolError)?;
            config.set_verify_hostname(tls.verify_peer && tls.verify_host);
            config.set_use_server_name_indication(should_set_sni(host));

            let domain = host.trim_start_matches('[').trim_end_matches(']');
            let tls_stream = tokio_boring::connect(config, domain, stream).await.map_err(|e| {
                tracing::debug!(host = %host, error = ?e, "SSL handshake failed");
                NetError::SslProtocolError
            })?;

            Ok(TransportStream::Tls(tls_stream))
        } else {
            Ok(TransportStream::Plain(stream))
        }
    }
}

/// Per RFC 6066, SNI MUST NOT be set for raw IP addresses.
fn should_set_sni(host: &str) -> bool {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<std::net::IpAddr>()
        .is_err()
}
