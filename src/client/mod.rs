//! HTTP client connection driver and pool.
mod config;
mod dispatch;
mod encoder;
mod errors;
mod pool;
mod proto;

pub use self::errors::Error;
pub use self::dispatch::{Client, Connect};
pub use self::encoder::{Encoder, EncoderDone};
pub use self::pool::{Destination, Pool, Registry};
pub use self::proto::{OutgoingMessage, Proto};

use std::time::Duration;

/// Fine-grained configuration of one client connection, and (via
/// `Pool::new`) of every connection the pool opens.
#[derive(Debug, Clone)]
pub struct Config {
    inflight_request_limit: usize,
    inflight_request_prealloc: usize,
    keep_alive_timeout: Duration,
    safe_pipeline_timeout: Duration,
    max_request_timeout: Duration,
    await_100_timeout: Duration,
    response_head_field_max: usize,
    response_head_total_max: usize,
    max_response_body: u64,
    max_redirects: usize,
}

impl Config {
    /// `max-redirects`, for `filters::default_pipeline` to thread into
    /// `filters::redirect::Redirect` without `filters` needing every
    /// other private field here.
    pub(crate) fn redirect_limit(&self) -> usize { self.max_redirects }
}
