//! MRSS decoding: source resolution, XML and JSON decoders, change keys.
//!
//! This module turns a Media RSS feed into one uniform in-memory model,
//! whichever encoding it arrives in:
//!
//! - **Resolving**: classify a source string as a local path or http(s) URL and
//!   open it through an injected [`Transport`]
//! - **Decoding**: map namespaced XML or its JSON rendition onto [`Feed`],
//!   keeping the difference between an absent and an empty `valid` marker
//! - **Change keys**: derive a stable digest per media attachment so
//!   downstream caches can tell when an asset changed
//!
//! # Architecture
//!
//! - `model` - `Feed`, `Channel`, `Item`, `MediaContent`
//! - `markup` - XML decoder driven by an explicit namespace schema table
//! - `structured` - JSON decoder built on `serde_json`
//! - `source` - source classification and scoped streams
//! - `transport` - the `Transport` trait and the `reqwest`-backed default
//! - `parser` - resolve → decode → release entry points
//!
//! # Example
//!
//! ```no_run
//! use mrss::feed::{parse_markup, change_key};
//!
//! let feed = parse_markup("./signage/mrss-with-expiry.xml")?;
//! for item in &feed.channel.items {
//!     for media in &item.media_contents {
//!         println!("{} -> {}", media.url, change_key(media));
//!     }
//! }
//! # Ok::<(), mrss::feed::FeedError>(())
//! ```

mod change_key;
mod error;
pub mod markup;
mod model;
mod parser;
mod source;
pub mod structured;
mod transport;

pub use change_key::{change_key, CHANGE_KEY_LEN};
pub use error::{BoxError, DecodeError, FeedError, FetchError, Position};
pub use markup::{decode_markup, DCTERMS_NS, MEDIA_NS};
pub use model::{Channel, Feed, Item, MediaContent};
pub use parser::{parse_markup, parse_structured, FeedParser, Format};
pub use source::{FeedStream, Source, SourceResolver};
pub use structured::decode_structured;
pub use transport::{BodyTooLarge, FileTransport, HttpTransport, Response, Transport};
