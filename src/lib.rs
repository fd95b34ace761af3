pub mod alerts;
pub mod config;
pub mod error;
pub mod server;
pub mod shutdown;
pub mod webhook;
