//! HTTP authentication: caches a credential per destination and answers
//! `401`/`407` challenges with Basic or Digest, preferring Digest when a
//! server offers both. Used for both `auth-server` and `auth-proxy` hops
//! of the pipeline (see `filters::default_pipeline`).
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use base64;
use rand::{self, Rng};

use context::Context;
use request::Request;
use response::Response;

use super::{Filter, Outcome};

#[derive(Clone)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

#[derive(Clone)]
struct DigestChallenge {
    realm: String,
    nonce: String,
    opaque: Option<String>,
    qop_auth: bool,
    algorithm_md5_sess: bool,
}

struct DigestState {
    challenge: DigestChallenge,
    nonce_count: AtomicUsize,
}

pub struct Auth {
    credentials: Mutex<HashMap<String, Credential>>,
    digest: Mutex<HashMap<String, DigestState>>,
}

impl Auth {
    pub fn new() -> Auth {
        Auth { credentials: Mutex::new(HashMap::new()), digest: Mutex::new(HashMap::new()) }
    }

    pub fn set_credential(&self, host: &str, username: &str, password: &str) {
        self.credentials.lock().unwrap().insert(host.to_string(),
            Credential { username: username.to_string(), password: password.to_string() });
    }

    fn credential_for(&self, host: &str) -> Option<Credential> {
        self.credentials.lock().unwrap().get(host).cloned()
    }

    fn parse_challenges(value: &str) -> Vec<(&str, &str)> {
        // `WWW-Authenticate` can repeat; we only ever see one scheme per
        // header value here since httparse/HeaderMap joins repeats with
        // ", " -- good enough for the single-scheme-per-response case
        // this engine targets.
        let scheme_end = value.find(' ').unwrap_or(value.len());
        vec![(&value[..scheme_end], value[scheme_end..].trim())]
    }

    fn parse_digest_params(rest: &str) -> HashMap<String, String> {
        let mut out = HashMap::new();
        for part in split_digest_params(rest) {
            if let Some(eq) = part.find('=') {
                let key = part[..eq].trim().to_string();
                let mut val = part[eq + 1..].trim();
                if val.starts_with('"') && val.ends_with('"') && val.len() >= 2 {
                    val = &val[1..val.len() - 1];
                }
                out.insert(key, val.to_string());
            }
        }
        out
    }

    fn basic_header(cred: &Credential) -> String {
        let raw = format!("{}:{}", cred.username, cred.password);
        format!("Basic {}", base64::encode(raw.as_bytes()))
    }

    fn digest_header(&self, host: &str, cred: &Credential, method: &str, uri: &str,
        challenge: DigestChallenge) -> String
    {
        let cnonce = random_hex(16);
        let ha1 = if challenge.algorithm_md5_sess {
            let base = md5_hex(&format!("{}:{}:{}", cred.username, challenge.realm, cred.password));
            md5_hex(&format!("{}:{}:{}", base, challenge.nonce, cnonce))
        } else {
            md5_hex(&format!("{}:{}:{}", cred.username, challenge.realm, cred.password))
        };
        let ha2 = md5_hex(&format!("{}:{}", method, uri));
        let mut digests = self.digest.lock().unwrap();
        let nc = match digests.get(host) {
            Some(state) => state.nonce_count.fetch_add(1, Ordering::SeqCst) + 1,
            None => 1,
        };
        let response = if challenge.qop_auth {
            md5_hex(&format!("{}:{}:{:08x}:{}:auth:{}", ha1, challenge.nonce, nc, cnonce, ha2))
        } else {
            md5_hex(&format!("{}:{}:{}", ha1, challenge.nonce, ha2))
        };
        digests.insert(host.to_string(), DigestState {
            challenge: challenge.clone(),
            nonce_count: AtomicUsize::new(nc),
        });
        let mut header = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", response=\"{}\"",
            cred.username, challenge.realm, challenge.nonce, uri, response);
        if challenge.qop_auth {
            header.push_str(&format!(", qop=auth, nc={:08x}, cnonce=\"{}\"", nc, cnonce));
        }
        if let Some(ref opaque) = challenge.opaque {
            header.push_str(&format!(", opaque=\"{}\"", opaque));
        }
        header
    }
}

impl Filter for Auth {
    fn name(&self) -> &'static str { "auth" }

    fn on_request(&self, req: &mut Request, _ctx: &mut Context) {
        if req.headers().contains("Authorization") {
            return;
        }
        // Proactively reuse a cached Digest nonce for a known realm
        // rather than always taking the extra round trip through a 401.
        let challenge = self.digest.lock().unwrap().get(req.host()).map(|s| s.challenge.clone());
        if let Some(challenge) = challenge {
            if let Some(cred) = self.credential_for(req.host()) {
                let header = self.digest_header(req.host(), &cred, req.method().as_str(),
                    req.path(), challenge);
                req.headers_mut().set("Authorization", &header);
            }
        }
    }

    fn on_response(&self, req: &Request, mut resp: Response, ctx: &mut Context) -> Outcome {
        if resp.code() != 401 && resp.code() != 407 {
            return Outcome::Done(resp);
        }
        let header_name = if resp.code() == 401 { "WWW-Authenticate" } else { "Proxy-Authenticate" };
        let value = match resp.headers().get(header_name) {
            Some(v) => v.to_string(),
            None => return Outcome::Done(resp),
        };
        let cred = match self.credential_for(req.host()) {
            Some(c) => c,
            None => return Outcome::Done(resp),
        };
        if ctx.redirect_hops() > 8 {
            // reuse the redirect hop counter as a generic retry guard so
            // a server that keeps re-challenging can't loop forever.
            return Outcome::Done(resp);
        }
        let challenges = Self::parse_challenges(&value);
        let mut new_req = Request::builder();
        new_req.method(req.method().clone()).version(req.version())
            .scheme(req.scheme().to_string()).host(req.host().to_string())
            .target(req.target().clone()).headers(req.headers().clone());
        let header = if let Some(&(scheme, rest)) = challenges.iter().find(|&&(s, _)| s.eq_ignore_ascii_case("Digest")) {
            // `stale=true` reuses the same credentials against the fresh
            // nonce below rather than treating this as a hard failure.
            let params = Self::parse_digest_params(rest);
            let challenge = DigestChallenge {
                realm: params.get("realm").cloned().unwrap_or_default(),
                nonce: params.get("nonce").cloned().unwrap_or_default(),
                opaque: params.get("opaque").cloned(),
                qop_auth: params.get("qop").map(|q| q.contains("auth")).unwrap_or(false),
                algorithm_md5_sess: params.get("algorithm")
                    .map(|a| a.eq_ignore_ascii_case("MD5-sess")).unwrap_or(false),
            };
            self.digest_header(req.host(), &cred, req.method().as_str(), req.path(), challenge)
        } else if challenges.iter().any(|&(s, _)| s.eq_ignore_ascii_case("Basic")) {
            Self::basic_header(&cred)
        } else {
            return Outcome::Done(resp);
        };
        new_req.header("Authorization", &header);
        ctx.note_redirect_hop();
        let body = resp.take_entity().map(|e| e.body);
        Outcome::Retry(new_req.done(), body)
    }
}

fn split_digest_params(rest: &str) -> Vec<&str> {
    // Split on commas that aren't inside quotes.
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    for (i, ch) in rest.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(rest[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(rest[start..].trim());
    parts
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

fn random_hex(bytes: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..bytes).map(|_| format!("{:02x}", rng.gen::<u8>())).collect()
}
