pub mod catalog;
pub mod catalog_hub;
pub mod media_item;

pub use catalog::*;
pub use catalog_hub::*;
pub use media_item::*;
