// sitegate - Authenticated backend proxy and client-side query cache
// Author: kelexine (https://github.com/kelexine)

pub mod auth;
pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod models;
pub mod server;
pub mod utils;
