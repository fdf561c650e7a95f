//! Cartography: exclusion rules, storage inventory, sitemap XML.

pub mod exclusions;
pub mod inventory;
pub mod sitemap;
