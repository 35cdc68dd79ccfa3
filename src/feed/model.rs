use serde::{Deserialize, Deserializer};

/// Root of a decoded feed. Holds exactly one [`Channel`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Feed {
    #[serde(deserialize_with = "null_as_default")]
    pub channel: Channel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Channel {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    /// Items in document order.
    #[serde(deserialize_with = "null_as_default")]
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Item {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    /// `dcterms:valid` marker.
    ///
    /// `None` means the element was not in the source at all; `Some("")` means
    /// it was present but empty. Consumers rely on the difference.
    pub valid: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub media_contents: Vec<MediaContent>,
}

/// A single `media:content` attachment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MediaContent {
    /// Attachment URL. An empty string is kept as-is, not treated as missing.
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub media_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub medium: String,
    #[serde(deserialize_with = "null_as_default")]
    pub duration: String,
    /// Publisher-supplied override mixed into the change key. Empty = not provided.
    #[serde(deserialize_with = "null_as_default")]
    pub change_key: String,
    /// Same two-state semantics as [`Item::valid`].
    pub valid: Option<String>,
}

impl Feed {
    /// Total number of media attachments across all items.
    pub fn media_count(&self) -> usize {
        self.channel
            .items
            .iter()
            .map(|item| item.media_contents.len())
            .sum()
    }
}

/// Accept JSON `null` wherever a plain value is expected and fall back to the
/// type's default, the same way a missing key is handled.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
