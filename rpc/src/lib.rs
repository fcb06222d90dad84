//! obscura-rpc
//!
//! JSON-RPC 2.0 server for Obscura nodes (`spec.md` §4.I).
//!
//! Namespace: "obscura"
//! Methods:
//!   obscura_getNodeStatus   — this node's account status
//!   obscura_listBlocks      — subscription: blocks after a given hash
//!   obscura_addTransaction  — sign (via keystore) and admit a transaction
//!   obscura_subscribe       — subscription: join a pub/sub topic
//!   obscura_publish         — publish on an already-joined topic

pub mod api;
pub mod error;
pub mod server;
pub mod types;

pub use api::ObscuraApiServer;
pub use server::{RpcServer, RpcServerState};
pub use types::{RpcBlockSummary, RpcChannelData, RpcNodeStatus};
