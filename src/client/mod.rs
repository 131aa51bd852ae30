pub mod config;
pub mod http_client;
pub mod models;

#[cfg(test)]
pub(crate) mod mock;
