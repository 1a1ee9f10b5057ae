pub mod access;
pub mod config;
pub mod logger;
pub mod protocol;
pub mod server;
pub mod transport;

pub use server::CalcServer;
