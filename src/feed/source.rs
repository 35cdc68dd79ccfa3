use std::io::{self, Read};
use std::path::{Path, PathBuf};

use url::Url;

use super::error::{FeedError, FetchError};
use super::transport::Transport;

/// A classified source descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// `http://` or `https://` URL, fetched through [`Transport::get`].
    Remote(Url),
    /// Anything else, opened through [`Transport::open`].
    Local(PathBuf),
}

impl Source {
    /// Classifies a source string.
    ///
    /// Only a literal `http://` or `https://` prefix marks a remote source;
    /// everything else, including other URL schemes, is treated as a path.
    ///
    /// # Errors
    ///
    /// - [`FeedError::EmptySource`] for `""`
    /// - [`FetchError::InvalidUrl`] when the http(s) prefix is present but the
    ///   rest does not parse as a URL
    pub fn classify(source: &str) -> Result<Self, FeedError> {
        if source.is_empty() {
            return Err(FeedError::EmptySource);
        }
        if source.starts_with("http://") || source.starts_with("https://") {
            let url = Url::parse(source).map_err(FetchError::InvalidUrl)?;
            return Ok(Source::Remote(url));
        }
        Ok(Source::Local(PathBuf::from(source)))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Source::Remote(_))
    }
}

/// An open feed byte stream.
///
/// Owns the underlying reader; dropping the stream closes the file or
/// releases the HTTP connection. The parse entry points lend the stream to the
/// decoder and drop it afterwards, so release happens exactly once on every
/// path.
///
/// A read failure on a remote body is a network fault, not bad content. The
/// stream keeps the original error for [`FeedStream::take_fault`] and hands the
/// decoder a plain error of the same kind.
pub struct FeedStream {
    origin: Source,
    inner: Box<dyn Read + Send>,
    fault: Option<io::Error>,
}

impl FeedStream {
    pub fn origin(&self) -> &Source {
        &self.origin
    }

    /// Takes the transport error that interrupted a remote body, if any.
    pub fn take_fault(&mut self) -> Option<io::Error> {
        self.fault.take()
    }
}

impl Read for FeedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf) {
            Err(e) if self.origin.is_remote() && e.kind() != io::ErrorKind::Interrupted => {
                let masked = io::Error::new(e.kind(), "remote body read failed");
                self.fault.get_or_insert(e);
                Err(masked)
            }
            other => other,
        }
    }
}

impl Drop for FeedStream {
    fn drop(&mut self) {
        tracing::trace!(source = ?self.origin, "Feed stream released");
    }
}

impl std::fmt::Debug for FeedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedStream")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Turns source descriptors into open [`FeedStream`]s.
///
/// Holds no state besides the injected transport, so a single resolver may be
/// shared by concurrent callers when the transport allows it.
#[derive(Debug, Clone)]
pub struct SourceResolver<T> {
    transport: T,
}

impl<T: Transport> SourceResolver<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Opens `source` for reading.
    ///
    /// # Errors
    ///
    /// - [`FeedError::EmptySource`] for an empty descriptor
    /// - [`FeedError::Fetch`] when the URL is invalid, the transport fails, or
    ///   the response status is anything other than 200. The body of a
    ///   rejected response is dropped unread.
    /// - [`FeedError::Open`] when a local file cannot be opened
    pub fn resolve(&self, source: &str) -> Result<FeedStream, FeedError> {
        let origin = Source::classify(source)?;
        let inner = match &origin {
            Source::Remote(url) => self.fetch(url)?,
            Source::Local(path) => self.open(path)?,
        };
        tracing::debug!(source = %source, remote = origin.is_remote(), "Opened feed stream");
        Ok(FeedStream {
            origin,
            inner,
            fault: None,
        })
    }

    fn fetch(&self, url: &Url) -> Result<Box<dyn Read + Send>, FeedError> {
        let response = self.transport.get(url).map_err(|e| {
            tracing::warn!(url = %url, error = %e, "Feed request failed");
            FetchError::Transport(e)
        })?;

        if response.status != 200 {
            tracing::warn!(
                url = %url,
                status = response.status,
                "Rejecting non-200 feed response"
            );
            return Err(FetchError::Status(response.status).into());
        }

        Ok(response.body)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Read + Send>, FeedError> {
        self.transport.open(path).map_err(|source| FeedError::Open {
            path: path.to_path_buf(),
            source,
        })
    }
}
