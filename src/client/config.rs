use std::sync::Arc;
use std::time::Duration;

use client::Config;

impl Config {
    /// Create a config with defaults
    pub fn new() -> Config {
        Config {
            inflight_request_limit: 1,
            inflight_request_prealloc: 1,
            keep_alive_timeout: Duration::from_secs(15),
            safe_pipeline_timeout: Duration::from_secs(1),
            max_request_timeout: Duration::from_secs(300),
            await_100_timeout: Duration::from_secs(1),
            response_head_field_max: 8192,
            response_head_total_max: 32768,
            max_response_body: 1 << 30,
            max_redirects: 10,
        }
    }
    /// A number of inflight requests until we start returning
    /// `NotReady` from `start_send`
    ///
    /// Note we always return `NotReady` if some *request* is streaming
    /// currently. Use `Sink::buffered` to prevent that.
    pub fn inflight_request_limit(&mut self, value: usize) -> &mut Self {
        self.inflight_request_limit = value;
        self
    }
    /// Size of the queue that is preallocated for holding requests
    ///
    /// Should be smaller than `inflight_request_limit`.
    pub fn inflight_request_prealloc(&mut self, value: usize) -> &mut Self {
        self.inflight_request_prealloc = value;
        self
    }
    /// `keep-alive-timeout`: a non-positive duration means "no
    /// pooling; one request per connection", enforced by the pool.
    pub fn keep_alive_timeout(&mut self, value: Duration) -> &mut Self {
        self.keep_alive_timeout = value;
        self
    }
    /// How long a queued (not-yet-written) request waits before the pump
    /// refuses to pipeline further requests behind it.
    pub fn safe_pipeline_timeout(&mut self, value: Duration) -> &mut Self {
        self.safe_pipeline_timeout = value;
        self
    }
    pub fn max_request_timeout(&mut self, value: Duration) -> &mut Self {
        self.max_request_timeout = value;
        self
    }
    /// `await-100-timeout` (default 1s): how long the outbound pump
    /// waits for a `100 Continue` before sending the body anyway.
    pub fn await_100_timeout(&mut self, value: Duration) -> &mut Self {
        self.await_100_timeout = value;
        self
    }
    pub fn response_head_field_max(&mut self, value: usize) -> &mut Self {
        self.response_head_field_max = value;
        self
    }
    pub fn response_head_total_max(&mut self, value: usize) -> &mut Self {
        self.response_head_total_max = value;
        self
    }
    pub fn max_response_body(&mut self, value: u64) -> &mut Self {
        self.max_response_body = value;
        self
    }
    /// `max-redirects` (default 10): hops `filters::redirect::Redirect`
    /// follows before giving up and handing the `3xx` back as-is.
    pub fn max_redirects(&mut self, value: usize) -> &mut Self {
        self.max_redirects = value;
        self
    }
    /// Create a Arc'd config clone to pass to the constructor
    ///
    /// This is just a convenience method.
    pub fn done(&mut self) -> Arc<Config> {
        Arc::new(self.clone())
    }
}

impl Default for Config {
    fn default() -> Config { Config::new() }
}
