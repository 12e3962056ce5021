//! # Media Metadata Snapshots
//!
//! Value-object reads over native metadata handles. A [`MediaMetadata`] is a
//! plain owned snapshot: every attribute is copied out of the native object
//! at read time and the snapshot retains no handle, so it outlives the
//! native object freely and never participates in release bookkeeping.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::native::{NativeInterface, RawId};

// ============================================================================
// ATTRIBUTES
// ============================================================================

const ATTRIBUTES: [&str; 11] = [
    "title",
    "artist",
    "album",
    "author",
    "genre",
    "duration",
    "date",
    "copyright",
    "description",
    "track_number",
    "picture",
];

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Owned snapshot of a native metadata object
///
/// Attributes the native object does not carry are `None`. All fields are
/// textual; `duration` and `track_number` keep the native layer's string
/// encoding untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MediaMetadata {
    /// Track title
    pub title: Option<String>,
    /// Performing artist
    pub artist: Option<String>,
    /// Album name
    pub album: Option<String>,
    /// Author of the media
    pub author: Option<String>,
    /// Genre label
    pub genre: Option<String>,
    /// Duration as reported by the native layer
    pub duration: Option<String>,
    /// Release date
    pub date: Option<String>,
    /// Copyright notice
    pub copyright: Option<String>,
    /// Free-form description
    pub description: Option<String>,
    /// Track number within the album
    pub track_number: Option<String>,
    /// Path or URI of the cover image
    pub picture: Option<String>,
}

impl MediaMetadata {
    /// Copy every attribute out of the native metadata object behind `id`
    ///
    /// The id is validated once up front; individual attribute reads that
    /// come back null are recorded as absent rather than failing the whole
    /// snapshot.
    pub fn read(native: &std::sync::Arc<dyn NativeInterface>, id: RawId) -> Result<Self> {
        if id.is_null() || !native.is_valid(id) {
            return Err(Error::InvalidHandle(id));
        }

        let mut snapshot = MediaMetadata::default();
        {
            let slots: [&mut Option<String>; 11] = [
                &mut snapshot.title,
                &mut snapshot.artist,
                &mut snapshot.album,
                &mut snapshot.author,
                &mut snapshot.genre,
                &mut snapshot.duration,
                &mut snapshot.date,
                &mut snapshot.copyright,
                &mut snapshot.description,
                &mut snapshot.track_number,
                &mut snapshot.picture,
            ];
            for (attribute, slot) in ATTRIBUTES.iter().zip(slots) {
                let method = format!("metadata_{attribute}");
                let value = native.invoke(id, &method, &[])?;
                *slot = value.as_str().map(str::to_owned);
            }
        }
        Ok(snapshot)
    }

    /// Whether no attribute is present
    pub fn is_empty(&self) -> bool {
        self == &MediaMetadata::default()
    }
}

// ============================================================================
// TESTS
// ============================================================================
