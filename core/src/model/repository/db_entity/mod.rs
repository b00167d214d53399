mod asset;
mod asset_thumbnail;

pub use asset::*;
pub use asset_thumbnail::*;
