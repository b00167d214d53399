use crate::model::AssetId;

pub fn thumbnail(asset_id: AssetId) -> String {
    format!("thumb/{}.jpg", asset_id.0)
}

pub fn clip(asset_id: AssetId) -> String {
    format!("clip/{}.gif", asset_id.0)
}
