// Library for tests to access modules

pub mod alerts;
pub mod config;
pub mod docker_repo;
pub mod events;
pub mod host_repo;
pub mod models;
pub mod routes;
pub mod session;
pub mod terminal;
pub mod version;
