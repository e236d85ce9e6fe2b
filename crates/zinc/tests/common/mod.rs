#![allow(dead_code)]

use zinc::{Context, Handler, Response};

/// A step that appends `name` to the `trace` value in the store.
pub fn mark(name: &'static str) -> Handler {
    Handler::middleware(move |ctx: &mut Context| {
        let mut trace = ctx
            .get("trace")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        trace.push_str(name);
        ctx.set("trace", trace);
    })
}

/// An endpoint answering with the store's `trace` value.
pub fn report() -> Handler {
    Handler::endpoint(|ctx: &mut Context| {
        let trace = ctx
            .get("trace")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let _ = ctx.send(trace);
    })
}

/// An endpoint answering with the named path parameter.
pub fn echo_param(name: &'static str) -> Handler {
    Handler::endpoint(move |ctx: &mut Context| {
        let value = ctx.param(name).unwrap_or_default().to_string();
        let _ = ctx.send(value);
    })
}

pub fn body(res: &Response) -> String {
    res.body_string()
        .unwrap_or_else(|| panic!("Expected UTF-8 body, got {:?}", res.body))
}
