//! HTTP server connection driver.
mod config;
mod encoder;
mod gated_body;
mod proto;
mod service;
mod upgrade;

pub use self::encoder::{Encoder, EncoderDone, FutureRawBody, RawBody, ResponseConfig};
pub use self::proto::Proto;
pub use self::service::Service;
pub use self::upgrade::{NoUpgrades, Upgrader};

use std::time::Duration;

/// Fine-grained configuration of the HTTP server connection driver.
#[derive(Debug, Clone)]
pub struct Config {
    inflight_request_limit: usize,
    inflight_request_prealloc: usize,
    first_byte_timeout: Duration,
    headers_timeout: Duration,
    keep_alive_timeout: Duration,
    input_body_byte_timeout: Duration,
    input_body_whole_timeout: Duration,
    output_body_byte_timeout: Duration,
    output_body_whole_timeout: Duration,
    max_request_head_field: usize,
    max_request_head_total: usize,
    max_request_body: u64,
}
