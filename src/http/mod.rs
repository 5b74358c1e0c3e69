//! Fetch-like HTTP types shared by the dispatcher, the host runtime and the
//! client transports.

mod request;
mod response;

pub use request::{RpcRequest, Verb};
pub use response::{RpcResponse, StatusCode};
