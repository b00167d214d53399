use chrono::{DateTime, Utc};

use super::{AssetId, AssetThumbnailId};

/// Preview artifacts derived from one Asset. There is at most one per Asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetThumbnail {
    pub id: AssetThumbnailId,
    pub asset_id: AssetId,
    /// Object store key of the still image (JPEG)
    pub thumbnail_key: String,
    /// Object store key of the animated clip (GIF), absent for short videos
    pub clip_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateAssetThumbnail {
    pub asset_id: AssetId,
    pub with_clip: bool,
}
