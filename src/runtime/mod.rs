//! Host HTTP runtime that mounts the dispatcher on a hyper server.

mod config;
mod server;

pub use config::ServerConfig;
pub use server::RpcServer;
