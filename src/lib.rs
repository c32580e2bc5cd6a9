pub mod cli;
pub mod config;
pub mod feeder_api_client;
pub mod geocoding;
pub mod http_client;
pub mod render;
pub mod services;
