//! HTTP artifact source.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{debug, info};

use crate::error::{DeployError, DeployResult, PreconditionKind};
use crate::validation::validate_artifact_url;

use super::traits::ArtifactSource;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Downloads artifacts with a blocking HTTP client.
///
/// No authentication is sent; the payload is trusted at transport level
/// and any further checking is left to an `ArtifactVerifier`.
#[derive(Debug, Clone)]
pub struct HttpArtifactSource {
    client: Client,
}

impl HttpArtifactSource {
    /// Build a source whose requests are bounded by `timeout`.
    pub fn new(timeout: Duration) -> DeployResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| DeployError::Precondition {
                kind: PreconditionKind::SourceUnavailable {
                    message: format!("Failed to build HTTP client: {}", e),
                },
            })?;

        Ok(Self { client })
    }
}

impl ArtifactSource for HttpArtifactSource {
    fn fetch(&self, url: &str, dest: &Path) -> DeployResult<u64> {
        let fetch_error = |message: String| DeployError::ArtifactFetch {
            url: url.to_string(),
            message,
        };

        debug!(url = %url, dest = %dest.display(), "Requesting artifact");

        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| fetch_error(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("Server returned {}", status)));
        }

        let expected = response.content_length();

        let mut file = File::create(dest)
            .map_err(|e| fetch_error(format!("Failed to create {}: {}", dest.display(), e)))?;

        let written = response
            .copy_to(&mut file)
            .map_err(|e| fetch_error(format!("Download interrupted: {}", e)))?;

        file.flush()
            .and_then(|_| file.sync_all())
            .map_err(|e| fetch_error(format!("Failed to sync {}: {}", dest.display(), e)))?;

        if let Some(expected) = expected {
            if written != expected {
                return Err(fetch_error(format!(
                    "Incomplete download: received {} of {} bytes",
                    written, expected
                )));
            }
        }

        info!(url = %url, bytes = written, "Artifact downloaded");
        Ok(written)
    }

    fn ensure_available(&self, url: &str) -> DeployResult<()> {
        validate_artifact_url(url).map_err(|e| DeployError::Precondition {
            kind: PreconditionKind::SourceUnavailable {
                message: e.to_string(),
            },
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::thread;

    /// Serve a single canned HTTP response on a local port.
    fn serve_once(status_line: &'static str, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut line = String::new();
                // Drain request headers
                while reader.read_line(&mut line).map(|n| n > 0).unwrap_or(false) {
                    if line == "\r\n" {
                        break;
                    }
                    line.clear();
                }
                let header = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status_line,
                    body.len()
                );
                let _ = stream.write_all(header.as_bytes());
                let _ = stream.write_all(body);
            }
        });

        format!("http://{}/lumo-agent", addr)
    }

    /// Local test servers must not be routed through an ambient proxy.
    fn local_source() -> HttpArtifactSource {
        HttpArtifactSource {
            client: Client::builder()
                .no_proxy()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap(),
        }
    }

    #[test]
    fn test_fetch_success() {
        let url = serve_once("200 OK", b"#!/bin/sh\necho agent\n");
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("lumo-agent");

        let source = local_source();
        let written = source.fetch(&url, &dest).unwrap();

        assert_eq!(written, 21);
        assert_eq!(std::fs::read(&dest).unwrap(), b"#!/bin/sh\necho agent\n");
    }

    #[test]
    fn test_fetch_not_found() {
        let url = serve_once("404 Not Found", b"missing");
        let dir = tempfile::tempdir().unwrap();

        let source = local_source();
        let result = source.fetch(&url, &dir.path().join("lumo-agent"));

        assert!(matches!(result, Err(DeployError::ArtifactFetch { .. })));
    }

    #[test]
    fn test_fetch_unreachable() {
        // Bind then drop to get a port with nothing listening.
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let dir = tempfile::tempdir().unwrap();

        let source = local_source();
        let result = source.fetch(
            &format!("http://127.0.0.1:{}/lumo-agent", port),
            &dir.path().join("lumo-agent"),
        );

        assert!(matches!(result, Err(DeployError::ArtifactFetch { .. })));
    }

    #[test]
    fn test_ensure_available() {
        let source = HttpArtifactSource::new(Duration::from_secs(5)).unwrap();
        assert!(source.ensure_available("https://downloads.lumopanel.com/a").is_ok());
        assert!(matches!(
            source.ensure_available("file:///tmp/a"),
            Err(DeployError::Precondition { .. })
        ));
    }
}
