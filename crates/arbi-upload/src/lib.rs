//! Sharing finished runs.
//!
//! - Payload: the JSON record built from a parsed [`arbi_core::Summary`]
//! - Client: POSTs a payload to a remote gateway
//! - Gateway: the acceptance policy a gateway applies before storing a run

mod client;
pub mod gateway;
mod payload;

pub use client::{UploadClient, UploadError};
pub use gateway::{
    DEFAULT_ALLOWED_ORIGINS, GatewayRequest, GatewayResponse, Rejection, accept_submission,
    handle, sanitize_text,
};
pub use payload::{UploadOptions, UploadPayload};
