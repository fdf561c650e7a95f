//! Network acquisition: upstream sitemap download and liveness probes.

pub mod http_client;
pub mod liveness;
pub mod sitemap_fetch;
