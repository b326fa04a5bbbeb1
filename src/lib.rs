// Library for tests to access modules

pub mod config;
pub mod influx_repo;
pub mod models;
pub mod nut_repo;
pub mod record;
pub mod version;
pub mod worker;
