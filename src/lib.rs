//! Dual-role async HTTP/1.x engine: a server connection driver and a
//! client connection driver sharing one wire codec, data model and
//! cookie jar, built on `tokio` tools.
#![recursion_limit="100"]

extern crate futures;
extern crate url;
extern crate httparse;
extern crate tokio_core;
extern crate tokio_io;
extern crate netbuf;
extern crate tk_bufstream;
#[macro_use(quick_error)] extern crate quick_error;
#[macro_use] extern crate matches;
#[macro_use] extern crate log;
extern crate flate2;
extern crate base64;
extern crate md5;
extern crate rand;

pub mod server;
pub mod client;
pub mod filters;
pub mod wire;
mod enums;
mod headers;
mod error;
mod body;
mod request;
mod response;
mod cookie;
mod context;
mod util;
mod tunnel;

pub use enums::{Method, Version, Status};
pub use headers::HeaderMap;
pub use error::{Error, Kind};
pub use body::{Body, BodySource, Entity, ContentEncoding, ETag};
pub use request::{Request, RequestBuilder, Target};
pub use response::{Response, ResponseBuilder};
pub use cookie::{Cookie, CookieJar, CookieStorage};
pub use context::Context;
pub use util::OptFuture;
pub use tunnel::Tunnel;
