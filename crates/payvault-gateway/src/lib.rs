//! # PayVault Gateway
//!
//! `GatewayClient` implementation that talks HTTP/JSON to the remote
//! payment gateway.

mod http_client;

pub use http_client::*;
