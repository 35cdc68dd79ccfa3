//! Decode Media RSS feeds into one uniform model.
//!
//! An MRSS feed may arrive as namespaced XML or as an equivalent JSON
//! document, from a local file or over http(s). Either way the result is the
//! same [`feed::Feed`] value, and every media attachment gets a stable change
//! key for cache invalidation.
//!
//! - [`feed`] - resolving, decoding and change keys
//! - [`config`] - settings for the default HTTP transport

pub mod config;
pub mod feed;

pub use feed::{parse_markup, parse_structured, Feed, FeedError, FeedParser, Format};
