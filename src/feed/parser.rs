use std::fmt;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

use super::error::{FeedError, FetchError};
use super::markup::decode_markup;
use super::model::Feed;
use super::source::{FeedStream, Source, SourceResolver};
use super::structured::decode_structured;
use super::transport::{FileTransport, HttpTransport, Transport};
use crate::config::TransportConfig;

/// Encoding of a feed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Namespaced XML (`rss` > `channel` > `item`).
    Markup,
    /// JSON mirroring the same field names in camel-case.
    Structured,
}

impl Format {
    /// Guesses the format from a source descriptor.
    ///
    /// A `.json` extension (case-insensitive) on the path, or on the URL path
    /// ignoring query and fragment, selects [`Format::Structured`]; anything else
    /// is treated as markup.
    pub fn infer(source: &str) -> Self {
        let path = match url::Url::parse(source) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url.path().to_owned(),
            _ => source.to_owned(),
        };
        let is_json = Path::new(&path)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Format::Structured
        } else {
            Format::Markup
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Markup => f.write_str("markup"),
            Format::Structured => f.write_str("structured"),
        }
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "markup" | "xml" | "mrss" => Ok(Format::Markup),
            "structured" | "json" => Ok(Format::Structured),
            other => Err(format!(
                "unknown feed format '{}' (expected markup/xml or structured/json)",
                other
            )),
        }
    }
}

/// Resolves sources and decodes them into [`Feed`]s.
///
/// Each call opens exactly one stream, decodes it completely and releases it
/// before returning, whether decoding succeeded or not. Nothing is cached
/// between calls.
///
/// # Example
///
/// ```no_run
/// use mrss::feed::{FeedParser, Format, HttpTransport};
/// use mrss::config::TransportConfig;
///
/// let parser = FeedParser::new(HttpTransport::new(&TransportConfig::default())?);
/// let feed = parser.parse("https://example.com/mrss.xml", Format::Markup)?;
/// for item in &feed.channel.items {
///     for media in &item.media_contents {
///         println!("{} {}", media.url, media.change_key_hash());
///     }
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct FeedParser<T> {
    resolver: SourceResolver<T>,
}

impl<T: Transport> FeedParser<T> {
    pub fn new(transport: T) -> Self {
        Self {
            resolver: SourceResolver::new(transport),
        }
    }

    /// Parses `source` in the given format.
    pub fn parse(&self, source: &str, format: Format) -> Result<Feed, FeedError> {
        match format {
            Format::Markup => self.parse_markup(source),
            Format::Structured => self.parse_structured(source),
        }
    }

    /// Resolves `source` and decodes it as MRSS XML.
    pub fn parse_markup(&self, source: &str) -> Result<Feed, FeedError> {
        self.decode_with(source, Format::Markup, |stream| {
            decode_markup(BufReader::new(stream))
        })
    }

    /// Resolves `source` and decodes it as the JSON rendition of MRSS.
    pub fn parse_structured(&self, source: &str) -> Result<Feed, FeedError> {
        self.decode_with(source, Format::Structured, |stream| {
            decode_structured(stream)
        })
    }

    fn decode_with<F>(&self, source: &str, format: Format, decode: F) -> Result<Feed, FeedError>
    where
        F: FnOnce(&mut FeedStream) -> Result<Feed, FeedError>,
    {
        let mut stream = self.resolver.resolve(source)?;
        let mut result = decode(&mut stream);
        if let Some(fault) = stream.take_fault() {
            tracing::warn!(source = %source, error = %fault, "Feed body read failed");
            result = Err(FetchError::Transport(Box::new(fault)).into());
        }
        drop(stream);

        match &result {
            Ok(feed) => tracing::debug!(
                source = %source,
                format = %format,
                items = feed.channel.items.len(),
                media = feed.media_count(),
                "Decoded feed"
            ),
            Err(e) => tracing::debug!(
                source = %source,
                format = %format,
                error = %e,
                "Feed decode failed"
            ),
        }
        result
    }
}

/// Parses `source` with a parser built for just this call.
///
/// Local paths go through [`FileTransport`]; an HTTP client is only created
/// for remote sources.
fn parse_once(source: &str, format: Format) -> Result<Feed, FeedError> {
    match Source::classify(source)? {
        Source::Remote(_) => {
            let transport = HttpTransport::new(&TransportConfig::default())
                .map_err(|e| FetchError::Transport(Box::new(e)))?;
            FeedParser::new(transport).parse(source, format)
        }
        Source::Local(_) => FeedParser::new(FileTransport).parse(source, format),
    }
}

/// Parses an MRSS XML feed from a local path or http(s) URL.
///
/// Remote sources use a default [`HttpTransport`]. Prefer [`FeedParser`] when
/// parsing more than one feed so the HTTP client is shared.
pub fn parse_markup(source: &str) -> Result<Feed, FeedError> {
    parse_once(source, Format::Markup)
}

/// Parses a JSON feed from a local path or http(s) URL.
pub fn parse_structured(source: &str) -> Result<Feed, FeedError> {
    parse_once(source, Format::Structured)
}
