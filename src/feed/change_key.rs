use md5::{Digest, Md5};

use super::model::MediaContent;

/// Length of a change key: hex encoding of a 128-bit digest.
pub const CHANGE_KEY_LEN: usize = 32;

/// Computes the change key for a media attachment.
///
/// The digest covers the attachment URL followed by the publisher override
/// (only when the override is non-empty). Any edit to either value yields a new
/// key, which downstream caches use to detect stale copies.
///
/// MD5 is used as a fingerprint, not as a security primitive.
///
/// # Examples
///
/// ```
/// use mrss::feed::{change_key, MediaContent};
///
/// let media = MediaContent {
///     url: "https://cdn.example.com/loop.mp4".into(),
///     ..Default::default()
/// };
/// let key = change_key(&media);
/// assert_eq!(key.len(), 32);
/// assert_eq!(key, change_key(&media));
/// ```
pub fn change_key(media: &MediaContent) -> String {
    let mut hasher = Md5::new();
    hasher.update(media.url.as_bytes());
    if !media.change_key.is_empty() {
        hasher.update(media.change_key.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

impl MediaContent {
    /// See [`change_key`].
    pub fn change_key_hash(&self) -> String {
        change_key(self)
    }
}
