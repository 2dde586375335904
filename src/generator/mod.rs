//! Generated artifacts: page jobs and routes from the sitemap, the
//! platform config file and `robots.txt`.

pub mod app;
pub mod robots;
pub mod sitemap;
