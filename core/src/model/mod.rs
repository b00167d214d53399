pub mod repository;

mod asset;
mod asset_thumbnail;
mod id_types;
pub use asset::*;
pub use asset_thumbnail::*;
pub use id_types::*;

pub(crate) mod util;
