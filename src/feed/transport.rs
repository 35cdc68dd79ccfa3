use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;

use url::Url;

use super::error::BoxError;
use crate::config::TransportConfig;

/// A response from [`Transport::get`]. The body is not read by the transport.
pub struct Response {
    pub status: u16,
    pub body: Box<dyn Read + Send>,
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Byte-stream capability used by the source resolver.
///
/// Implementations must be safe to share across threads: parse calls may run
/// concurrently against the same transport with no coordination between them.
/// Timeouts, TLS and proxies are the transport's business; the resolver issues
/// exactly one call per source and never retries.
pub trait Transport: Send + Sync {
    /// Issues a single unconditional GET.
    fn get(&self, url: &Url) -> Result<Response, BoxError>;

    /// Opens a local file for reading.
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(path)?))
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &Url) -> Result<Response, BoxError> {
        (**self).get(url)
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        (**self).open(path)
    }
}

/// [`Transport`] backed by a blocking `reqwest` client.
///
/// The client is created once and reused; `reqwest::blocking::Client` is
/// internally reference-counted and thread-safe, so one `HttpTransport` can
/// serve any number of concurrent parse calls.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    max_body_bytes: u64,
}

impl HttpTransport {
    /// Builds a transport from configuration.
    ///
    /// # Errors
    ///
    /// Fails if the TLS backend cannot be initialised.
    pub fn new(config: &TransportConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }

}

impl Transport for HttpTransport {
    fn get(&self, url: &Url) -> Result<Response, BoxError> {
        let response = self.client.get(url.clone()).send()?;
        let status = response.status().as_u16();

        // Fast path: check Content-Length header. Only a 200 body is ever read,
        // so other statuses go straight to the resolver.
        if status == 200 {
            if let Some(len) = response.content_length() {
                if len > self.max_body_bytes {
                    return Err(Box::new(BodyTooLarge {
                        limit: self.max_body_bytes,
                    }));
                }
            }
        }

        Ok(Response {
            status,
            body: Box::new(LimitedReader::new(response, self.max_body_bytes)),
        })
    }
}

/// [`Transport`] for local files only.
///
/// Remote requests fail without touching the network, so no HTTP client (and
/// no background runtime) is ever created.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTransport;

impl Transport for FileTransport {
    fn get(&self, url: &Url) -> Result<Response, BoxError> {
        Err(format!("no HTTP transport configured for {}", url).into())
    }
}

/// Response body exceeded the configured size limit.
#[derive(Debug, thiserror::Error)]
#[error("Response too large: body exceeds {limit} bytes")]
pub struct BodyTooLarge {
    pub limit: u64,
}

/// Reader that fails once more than `limit` bytes have been read, instead of
/// silently truncating like [`Read::take`].
struct LimitedReader<R> {
    inner: R,
    remaining: u64,
    limit: u64,
}

impl<R> LimitedReader<R> {
    fn new(inner: R, limit: u64) -> Self {
        Self {
            inner,
            remaining: limit,
            limit,
        }
    }
}

impl<R: Read> Read for LimitedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            // Probe for one more byte to tell "exactly at limit" from "over limit".
            let mut probe = [0u8; 1];
            return match self.inner.read(&mut probe)? {
                0 => Ok(0),
                _ => Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    BodyTooLarge { limit: self.limit },
                )),
            };
        }
        let max = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..max])?;
        self.remaining -= n as u64;
        Ok(n)
    }
}
