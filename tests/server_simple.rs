extern crate bayou;
extern crate futures;
extern crate tk_bufstream;

use std::sync::Arc;

use futures::future::{ok, FutureResult};
use futures::Future;
use tk_bufstream::MockData;

use bayou::server::{Config, NoUpgrades, Proto};
use bayou::{Context, Cookie, CookieJar, Entity, Error, Request, Response, Status};

fn echo_path(req: Request, _body: Option<Entity>, ctx: Context)
    -> FutureResult<(Response, Context), Error>
{
    let mut b = Response::builder(Status::Ok);
    b.header("X-Target", &format!("{:?}", req.target()));
    ok((b.done(), ctx))
}

fn drive(input: &str) -> String {
    let mock = MockData::new();
    let mut proto = Proto::new(
        mock.clone(), echo_path, NoUpgrades, &Arc::new(Config::new()));
    proto.poll().unwrap();
    mock.add_input(input);
    proto.poll().unwrap();
    String::from_utf8_lossy(&mock.output(..)).to_string()
}

#[test]
fn simple_get_request_is_answered() {
    let out = drive("GET /hello HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(out.starts_with("HTTP/1.1 200"), "unexpected response: {}", out);
    assert!(out.contains("Origin"), "target not echoed: {}", out);
}

#[test]
fn http10_without_keep_alive_closes() {
    let out = drive("GET / HTTP/1.0\r\nHost: x\r\n\r\n");
    assert!(out.contains("Connection: close"), "unexpected response: {}", out);
}

#[test]
fn bad_request_line_is_rejected() {
    let mock = MockData::new();
    let mut proto = Proto::new(
        mock.clone(), echo_path, NoUpgrades, &Arc::new(Config::new()));
    proto.poll().unwrap();
    mock.add_input("GET / TTMP/9.9\r\n\r\n");
    assert!(proto.poll().is_err());
}

#[test]
fn cookie_jar_round_trips_through_context() {
    let jar = CookieJar::new(
        "example.com".to_string(), "/a".to_string(),
        vec![("sid".to_string(), "abc".to_string())]);
    let mut ctx = Context::new(jar);
    assert_eq!(ctx.jar_mut().get("sid"), Some("abc"));
    ctx.jar_mut().put("greeting", "hi");
    let set = ctx.into_jar().pending_set_cookies();
    assert!(set.iter().any(|c| c.starts_with("greeting=hi")));
}

#[test]
fn cookie_from_request_header_is_visible_on_jar() {
    let mut cookies = Vec::new();
    for &(ref n, ref v) in &[("a".to_string(), "1".to_string())] {
        cookies.push(Cookie::new(n, v));
    }
    assert_eq!(cookies[0].name, "a");
    assert_eq!(cookies[0].value, "1");
}
