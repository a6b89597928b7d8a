use std::sync::Arc;
use std::time::Duration;

use server::Config;

impl Config {
    /// Create a config with defaults
    pub fn new() -> Config {
        Config {
            inflight_request_limit: 2,
            inflight_request_prealloc: 0,
            first_byte_timeout: Duration::from_secs(10),
            headers_timeout: Duration::from_secs(10),
            keep_alive_timeout: Duration::from_secs(75),
            input_body_byte_timeout: Duration::from_secs(15),
            input_body_whole_timeout: Duration::from_secs(600),
            output_body_byte_timeout: Duration::from_secs(15),
            output_body_whole_timeout: Duration::from_secs(600),
            max_request_head_field: 8192,
            max_request_head_total: 16384,
            max_request_body: 10 << 20,
        }
    }
    /// A number of inflight requests until we stop reading more requests
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
    pub fn first_byte_timeout(&mut self, value: Duration) -> &mut Self {
        self.first_byte_timeout = value;
        self
    }
    pub fn headers_timeout(&mut self, value: Duration) -> &mut Self {
        self.headers_timeout = value;
        self
    }
    pub fn keep_alive_timeout(&mut self, value: Duration) -> &mut Self {
        self.keep_alive_timeout = value;
        self
    }
    pub fn input_body_byte_timeout(&mut self, value: Duration) -> &mut Self {
        self.input_body_byte_timeout = value;
        self
    }
    pub fn input_body_whole_timeout(&mut self, value: Duration) -> &mut Self {
        self.input_body_whole_timeout = value;
        self
    }
    pub fn output_body_byte_timeout(&mut self, value: Duration) -> &mut Self {
        self.output_body_byte_timeout = value;
        self
    }
    pub fn output_body_whole_timeout(&mut self, value: Duration) -> &mut Self {
        self.output_body_whole_timeout = value;
        self
    }
    pub fn max_request_head_field(&mut self, value: usize) -> &mut Self {
        self.max_request_head_field = value;
        self
    }
    pub fn max_request_head_total(&mut self, value: usize) -> &mut Self {
        self.max_request_head_total = value;
        self
    }
    pub fn max_request_body(&mut self, value: u64) -> &mut Self {
        self.max_request_body = value;
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
