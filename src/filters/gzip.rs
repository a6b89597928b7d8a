//! Transparent response decompression. `flate2` undoes `Content-Encoding:
//! gzip` the server sent in response to the `Accept-Encoding: gzip` the
//! `header_defaults` filter added.
//!
//! Matches a documented quirk: decompression strips `Content-Encoding`
//! and `Content-Length` (both now describe the wrong thing) but leaves
//! `ETag` alone, even though the tag was computed over the compressed
//! bytes.
use std::io::Read;

use flate2::read::GzDecoder;
use futures::Future;

use body::{Body, ContentEncoding, Entity};
use context::Context;
use request::Request;
use response::Response;

use super::{Filter, Outcome};

pub struct Gzip;

impl Gzip {
    pub fn new() -> Gzip { Gzip }
}

impl Filter for Gzip {
    fn name(&self) -> &'static str { "gzip" }

    fn on_response(&self, _req: &Request, mut resp: Response, _ctx: &mut Context) -> Outcome {
        let is_gzip = resp.entity().map(|e| e.content_encoding == ContentEncoding::Gzip)
            .unwrap_or(false);
        if !is_gzip {
            return Outcome::Done(resp);
        }
        if let Some(entity) = resp.take_entity() {
            let inflated = inflate_buffered(entity.body);
            resp.headers_mut().remove("Content-Encoding");
            resp.headers_mut().remove("Content-Length");
            let mut new_entity = Entity::new(inflated);
            new_entity.content_type = entity.content_type;
            new_entity.etag = entity.etag;
            new_entity.last_modified = entity.last_modified;
            new_entity.expires = entity.expires;
            new_entity.sharable = entity.sharable;
            resp.set_entity(new_entity);
        }
        Outcome::Done(resp)
    }
}

/// Decompresses a fully in-memory body. The client driver already
/// buffers whole response bodies, so there's no streaming decoder to
/// drive here.
fn inflate_buffered(mut body: Body) -> Body {
    let mut compressed = Vec::new();
    loop {
        match body.poll_chunk().wait() {
            Ok(Some(chunk)) => compressed.extend_from_slice(&chunk),
            Ok(None) | Err(_) => break,
        }
    }
    let mut out = Vec::new();
    let _ = GzDecoder::new(&compressed[..]).read_to_end(&mut out);
    Body::from_bytes(out)
}
