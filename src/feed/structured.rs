use std::io::{BufReader, Read};

use super::error::{DecodeError, FeedError, Position};
use super::model::Feed;
use super::parser::Format;

/// Decodes the JSON rendition of an MRSS feed.
///
/// Keys mirror the markup form in camel-case (`mediaContents`, `changeKey`,
/// `valid`). Missing keys take their default, `null` is treated like a missing
/// key, and unknown keys are ignored. A `valid` key that is present with a
/// string value (even `""`) decodes to `Some`, anything else to `None`.
///
/// # Errors
///
/// Returns [`FeedError::Decode`] with the line and column reported by
/// `serde_json` for malformed JSON, type mismatches or trailing data.
pub fn decode_structured<R: Read>(source: R) -> Result<Feed, FeedError> {
    serde_json::from_reader(BufReader::new(source)).map_err(|e| {
        let position = (e.line() > 0).then(|| Position::LineColumn {
            line: e.line(),
            column: e.column(),
        });
        DecodeError::new(Format::Structured, position, e.to_string()).into()
    })
}
