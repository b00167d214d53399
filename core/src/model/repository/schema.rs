diesel::table! {
    Asset (asset_id) {
        asset_id -> BigInt,
        mime_type -> Text,
        file_key -> Text,
        owner_id -> Nullable<BigInt>,
        added_at -> BigInt,
    }
}

diesel::table! {
    AssetThumbnail (thumbnail_id) {
        thumbnail_id -> BigInt,
        asset_id -> BigInt,
        thumbnail_key -> Text,
        clip_key -> Nullable<Text>,
        created_at -> BigInt,
    }
}

diesel::joinable!(AssetThumbnail -> Asset (asset_id));

diesel::allow_tables_to_appear_in_same_query!(Asset, AssetThumbnail);
