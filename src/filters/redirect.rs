//! Follows `3xx` redirects up to a configured hop limit, rewriting the
//! method where RFC 7231 calls for it and dropping any fragment from
//! `Location`.
use context::Context;
use enums::Method;
use request::{Request, Target};
use response::Response;

use super::{Filter, Outcome};

pub struct Redirect {
    max_hops: usize,
}

impl Redirect {
    pub fn new(max_hops: usize) -> Redirect {
        Redirect { max_hops: max_hops }
    }

    /// `303` always rewrites to `GET`; `301`/`302` rewrite a `POST` to
    /// `GET` (the long-standing browser-compatible behavior most clients
    /// copy); `307`/`308` never rewrite the method or drop the body.
    fn rewrite_method(code: u16, method: &Method) -> Method {
        match code {
            303 => Method::Get,
            301 | 302 if *method == Method::Post => Method::Get,
            _ => method.clone(),
        }
    }

    /// Whether `method` may follow a `code` redirect at all. `GET`/`HEAD`
    /// follow every redirect code unconditionally; `POST` follows the
    /// full set too (its method gets rewritten to `GET` by
    /// `rewrite_method` for `301`/`302`/`303`, kept as `POST` for
    /// `307`/`308`); every other method (`PUT`, `DELETE`, `PATCH`, ...)
    /// only follows `303`, since that is the one code whose semantics
    /// ("see this other resource instead") don't depend on re-submitting
    /// the same request body to a new URL.
    fn is_redirect(code: u16, method: &Method) -> bool {
        match code {
            303 => true,
            301 | 302 | 307 | 308 => matches!(*method, Method::Get | Method::Head | Method::Post),
            _ => false,
        }
    }
}

impl Filter for Redirect {
    fn name(&self) -> &'static str { "redirect" }

    fn on_response(&self, req: &Request, mut resp: Response, ctx: &mut Context) -> Outcome {
        let code = resp.code();
        if !Self::is_redirect(code, req.method()) || ctx.redirect_hops() >= self.max_hops {
            return Outcome::Done(resp);
        }
        let location = match resp.headers().get("Location") {
            Some(loc) => loc.to_string(),
            None => return Outcome::Done(resp),
        };
        let location = location.splitn(2, '#').next().unwrap_or(&location).to_string();
        let method = Self::rewrite_method(code, req.method());
        let mut b = Request::builder();
        b.method(method).version(req.version()).headers(req.headers().clone());
        if location.starts_with("http://") || location.starts_with("https://") {
            let scheme = if location.starts_with("https://") { "https" } else { "http" };
            let rest = location.splitn(2, "://").nth(1).unwrap_or("");
            let mut parts = rest.splitn(2, '/');
            let authority = parts.next().unwrap_or("").to_string();
            let path = format!("/{}", parts.next().unwrap_or(""));
            b.scheme(scheme.to_string()).host(authority.clone());
            b.target(Target::Absolute { scheme: scheme.to_string(), authority: authority, path: path });
        } else {
            b.scheme(req.scheme().to_string()).host(req.host().to_string());
            b.target(Target::Origin(location));
        }
        ctx.note_redirect_hop();
        let body = resp.take_entity().map(|e| e.body);
        Outcome::Retry(b.done(), body)
    }
}

#[cfg(test)]
mod test {
    use super::Redirect;
    use enums::Method;

    #[test]
    fn post_to_302_becomes_get() {
        assert_eq!(Redirect::rewrite_method(302, &Method::Post), Method::Get);
    }

    #[test]
    fn post_to_307_keeps_method() {
        assert_eq!(Redirect::rewrite_method(307, &Method::Post), Method::Post);
    }

    #[test]
    fn any_303_becomes_get() {
        assert_eq!(Redirect::rewrite_method(303, &Method::Put), Method::Get);
    }

    #[test]
    fn put_only_follows_303() {
        assert!(!Redirect::is_redirect(301, &Method::Put));
        assert!(!Redirect::is_redirect(302, &Method::Put));
        assert!(!Redirect::is_redirect(307, &Method::Put));
        assert!(!Redirect::is_redirect(308, &Method::Put));
        assert!(Redirect::is_redirect(303, &Method::Put));
    }

    #[test]
    fn delete_only_follows_303() {
        assert!(!Redirect::is_redirect(301, &Method::Delete));
        assert!(Redirect::is_redirect(303, &Method::Delete));
    }

    #[test]
    fn get_head_post_follow_all_redirect_codes() {
        for &code in &[301, 302, 303, 307, 308] {
            assert!(Redirect::is_redirect(code, &Method::Get));
            assert!(Redirect::is_redirect(code, &Method::Head));
            assert!(Redirect::is_redirect(code, &Method::Post));
        }
    }

    #[test]
    fn non_redirect_code_never_followed() {
        assert!(!Redirect::is_redirect(200, &Method::Get));
    }
}
