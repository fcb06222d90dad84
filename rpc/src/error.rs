//! Maps every `obscura_core::error::*` variant (and a handful of RPC-local
//! failures) onto a `jsonrpsee` `ErrorObject`, without leaking internal file
//! paths or stack traces (`spec.md` §7). Grounded on `chronx-rpc::server`'s
//! `rpc_err` helper, generalised from one flat helper into a typed mapping
//! so each domain gets a stable code range.

use jsonrpsee::types::ErrorObjectOwned;
use obscura_core::error::{BlockError, CryptoError, NetworkError, StorageError, ValidationError};

pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const NOT_SUBSCRIBED: i32 = -32001;

fn err(code: i32, message: impl Into<String>) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(code, message.into(), None::<()>)
}

pub fn validation_error(e: ValidationError) -> ErrorObjectOwned {
    err(INVALID_PARAMS, e.to_string())
}

pub fn block_error(e: BlockError) -> ErrorObjectOwned {
    err(INVALID_PARAMS, e.to_string())
}

pub fn storage_error(e: StorageError) -> ErrorObjectOwned {
    err(INTERNAL_ERROR, e.to_string())
}

pub fn network_error(e: NetworkError) -> ErrorObjectOwned {
    err(INTERNAL_ERROR, e.to_string())
}

pub fn crypto_error(e: CryptoError) -> ErrorObjectOwned {
    err(INVALID_PARAMS, e.to_string())
}

pub fn wallet_error(e: obscura_wallet::WalletError) -> ErrorObjectOwned {
    err(INVALID_PARAMS, e.to_string())
}

pub fn not_subscribed(topic: &str) -> ErrorObjectOwned {
    err(NOT_SUBSCRIBED, format!("not subscribed to topic {topic}"))
}

pub fn invalid_params(message: impl Into<String>) -> ErrorObjectOwned {
    err(INVALID_PARAMS, message)
}
