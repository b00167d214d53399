use diesel::{Queryable, Selectable};

use crate::model::{util::datetime_from_db_repr, AssetId, AssetThumbnail, AssetThumbnailId};

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = super::super::schema::AssetThumbnail)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DbAssetThumbnail {
    pub thumbnail_id: i64,
    pub asset_id: i64,
    pub thumbnail_key: String,
    pub clip_key: Option<String>,
    pub created_at: i64,
}

impl TryFrom<DbAssetThumbnail> for AssetThumbnail {
    type Error = eyre::Report;

    fn try_from(value: DbAssetThumbnail) -> Result<Self, Self::Error> {
        Ok(AssetThumbnail {
            id: AssetThumbnailId(value.thumbnail_id),
            asset_id: AssetId(value.asset_id),
            thumbnail_key: value.thumbnail_key,
            clip_key: value.clip_key,
            created_at: datetime_from_db_repr(value.created_at)?,
        })
    }
}
