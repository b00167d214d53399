use chrono::Utc;
use diesel::{insert_into, prelude::*};
use eyre::{bail, Context, Result};
use tracing::instrument;

use crate::catalog::storage_key;
use crate::model::{
    repository::db_entity::{asset_from_db, DbAssetThumbnail},
    util::datetime_to_db_repr,
    Asset, AssetId, CreateAsset, CreateAssetThumbnail,
};

use super::db::DbConn;
use super::db_entity::{DbAsset, DbInsertAsset};
use super::schema;

/// Returns the asset with its thumbnail relation, or None if no asset has this id.
#[instrument(skip(conn))]
pub fn get_asset(conn: &mut DbConn, id: AssetId) -> Result<Option<Asset>> {
    use schema::{Asset, AssetThumbnail};
    let row: Option<(DbAsset, Option<DbAssetThumbnail>)> = Asset::table
        .left_join(AssetThumbnail::table)
        .filter(Asset::asset_id.eq(id.0))
        .select((DbAsset::as_select(), Option::<DbAssetThumbnail>::as_select()))
        .first(conn)
        .optional()
        .wrap_err("error querying Asset")?;
    row.map(|(db_asset, db_thumbnail)| asset_from_db(db_asset, db_thumbnail))
        .transpose()
}

#[instrument(skip(conn), level = "debug")]
pub fn insert_asset(conn: &mut DbConn, create: &CreateAsset) -> Result<AssetId> {
    use schema::Asset;
    let id: i64 = insert_into(Asset::table)
        .values(DbInsertAsset {
            mime_type: &create.mime_type,
            file_key: &create.file_key,
            owner_id: create.owner_id,
            added_at: datetime_to_db_repr(&create.added_at),
        })
        .returning(Asset::asset_id)
        .get_result(conn)
        .wrap_err("error inserting Asset")?;
    Ok(AssetId(id))
}

/// Attaches a newly created thumbnail record to an asset and returns the updated asset.
///
/// Object keys for the thumbnail (and clip, if requested) are assigned here.
/// Fails if the asset does not exist or already has a thumbnail, existing
/// records are never overwritten.
#[instrument(skip(conn))]
pub fn set_asset_thumbnail(conn: &mut DbConn, create: CreateAssetThumbnail) -> Result<Asset> {
    use schema::AssetThumbnail;
    let asset_id = create.asset_id;
    conn.immediate_transaction::<_, eyre::Report, _>(|conn| {
        let asset = match get_asset(conn, asset_id)? {
            Some(asset) => asset,
            None => bail!("Asset {} does not exist", asset_id),
        };
        if asset.thumbnail.is_some() {
            bail!("Asset {} already has a thumbnail", asset_id);
        }
        let thumbnail_key = storage_key::thumbnail(asset_id);
        let clip_key = create.with_clip.then(|| storage_key::clip(asset_id));
        insert_into(AssetThumbnail::table)
            .values((
                AssetThumbnail::asset_id.eq(asset_id.0),
                AssetThumbnail::thumbnail_key.eq(&thumbnail_key),
                AssetThumbnail::clip_key.eq(clip_key.as_deref()),
                AssetThumbnail::created_at.eq(datetime_to_db_repr(&Utc::now())),
            ))
            .execute(conn)
            .wrap_err("error inserting AssetThumbnail")?;
        match get_asset(conn, asset_id)? {
            Some(updated) => Ok(updated),
            None => bail!("Asset {} disappeared while adding thumbnail", asset_id),
        }
    })
}
