//! HTTP/1.x wire codec: incremental head parsers, head encoder,
//! chunked-transfer scanner and body-framing readers.
pub mod body_kind;
pub mod body_reader;
pub mod chunked;
pub mod encoder;
pub mod request_parser;
pub mod request_target;
pub mod response_parser;

pub use self::body_kind::BodyKind;
pub use self::request_parser::{RequestHead, RequestParser};
pub use self::response_parser::{ResponseHead, ResponseParser};
pub use self::request_target::RequestTarget;
pub use self::encoder::{Body as EncoderBody, HeaderError, MessageState};
