use chrono::{DateTime, Utc};

use super::{AssetId, AssetThumbnail};

/// An uploaded file. Created and owned elsewhere, the preview pipeline only
/// reads it and attaches an [`AssetThumbnail`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub id: AssetId,
    pub mime_type: String,
    /// Object store key of the uploaded source file
    pub file_key: String,
    pub owner_id: Option<i64>,
    pub added_at: DateTime<Utc>,
    pub thumbnail: Option<AssetThumbnail>,
}

impl Asset {
    pub fn is_video(&self) -> bool {
        is_video_mime_type(&self.mime_type)
    }
}

pub fn is_video_mime_type(mime_type: &str) -> bool {
    mime_type
        .trim()
        .get(..6)
        .is_some_and(|ty| ty.eq_ignore_ascii_case("video/"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAsset {
    pub mime_type: String,
    pub file_key: String,
    pub owner_id: Option<i64>,
    pub added_at: DateTime<Utc>,
}
