use diesel::{prelude::Insertable, Queryable, Selectable};

use crate::model::{util::datetime_from_db_repr, Asset, AssetId, AssetThumbnail};

use super::DbAssetThumbnail;

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = super::super::schema::Asset)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DbAsset {
    pub asset_id: i64,
    pub mime_type: String,
    pub file_key: String,
    pub owner_id: Option<i64>,
    pub added_at: i64,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = super::super::schema::Asset)]
pub struct DbInsertAsset<'a> {
    pub mime_type: &'a str,
    pub file_key: &'a str,
    pub owner_id: Option<i64>,
    pub added_at: i64,
}

pub fn asset_from_db(
    db_asset: DbAsset,
    db_thumbnail: Option<DbAssetThumbnail>,
) -> eyre::Result<Asset> {
    let thumbnail: Option<AssetThumbnail> = db_thumbnail.map(TryInto::try_into).transpose()?;
    Ok(Asset {
        id: AssetId(db_asset.asset_id),
        mime_type: db_asset.mime_type,
        file_key: db_asset.file_key,
        owner_id: db_asset.owner_id,
        added_at: datetime_from_db_repr(db_asset.added_at)?,
        thumbnail,
    })
}
