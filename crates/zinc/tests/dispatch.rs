//! Tests for request dispatch through the app.

mod common;
use common::*;

use serde::Deserialize;
use serde_json::json;
use zinc::{App, Context, Handler, Method, Request, Routes, NOT_FOUND_BODY};

#[test]
fn static_route_resolves() {
    let mut app = App::new();
    app.get("/health", ["ok".into()]);
    app.get("/:anything", ["param".into()]);

    let res = app.handle(Request::get("/health"));
    assert_eq!(res.status, 200);
    assert_eq!(body(&res), "ok");
}

#[test]
fn single_param_capture() {
    let mut app = App::new();
    app.get("/users/:id", [Handler::endpoint(|ctx: &mut Context| {
        let params: Vec<_> = ctx.params().iter().map(|(k, v)| format!("{k}={v}")).collect();
        let _ = ctx.send(params.join(","));
    })]);

    assert_eq!(body(&app.handle(Request::get("/users/42"))), "id=42");
}

#[test]
fn param_never_matches_empty_segment() {
    let mut app = App::new();
    app.get("/users/:id", [echo_param("id")]);

    assert_eq!(app.handle(Request::get("/users/")).status, 404);
    assert_eq!(app.handle(Request::get("/users/1/2")).status, 404);
}

#[test]
fn wildcard_capture() {
    let mut app = App::new();
    app.get("/static/*filepath", [Handler::endpoint(|ctx: &mut Context| {
        let rest = ctx.wildcard().unwrap_or_default().to_string();
        let _ = ctx.send(rest);
    })]);

    let res = app.handle(Request::get("/static/deep/nested/file.txt"));
    assert_eq!(body(&res), "deep/nested/file.txt");
    assert_eq!(app.handle(Request::get("/static")).status, 404);
}

#[test]
fn nested_params() {
    let mut app = App::new();
    app.get("/users/:userID/posts/:postID", [Handler::endpoint(|ctx: &mut Context| {
        let out = format!(
            "{}/{}/{}",
            ctx.param("userID").unwrap_or_default(),
            ctx.param("postID").unwrap_or_default(),
            ctx.params().len()
        );
        let _ = ctx.send(out);
    })]);

    assert_eq!(body(&app.handle(Request::get("/users/7/posts/9"))), "7/9/2");
}

#[test]
fn middleware_runs_in_registration_order() {
    let mut app = App::new();
    app.use_route_middleware([mark("A"), mark("B")]);
    app.get("/", [mark("C"), mark("D"), report()]);

    assert_eq!(body(&app.handle(Request::get("/"))), "ABCD");
}

#[test]
fn dispatcher_middleware_runs_before_lookup() {
    let mut app = App::new();
    app.use_middleware([mark("A"), mark("B")]);
    app.get("/", [mark("C"), mark("D"), report()]);

    assert_eq!(body(&app.handle(Request::get("/"))), "ABCD");
}

#[test]
fn dispatcher_middleware_sees_unmatched_requests() {
    let mut app = App::new();
    app.use_middleware([Handler::middleware(|ctx: &mut Context| {
        ctx.set_header("X-Seen", "yes");
    })]);

    let res = app.handle(Request::get("/does/not/exist"));
    assert_eq!(res.status, 404);
    assert_eq!(res.get_header("X-Seen"), Some("yes"));
}

#[test]
fn short_circuit_stops_the_chain() {
    let mut app = App::new();
    app.get("/", [
        mark("A"),
        Handler::middleware(|ctx: &mut Context| {
            let _ = ctx.status(401).send("denied");
        }),
        Handler::endpoint(|ctx: &mut Context| {
            ctx.set("reached", true);
            let _ = ctx.send("handler");
        }),
    ]);

    let res = app.handle(Request::get("/"));
    assert_eq!(res.status, 401);
    assert_eq!(body(&res), "denied");
}

#[test]
fn dispatcher_short_circuit_skips_routing() {
    let mut app = App::new();
    app.use_middleware([Handler::middleware(|ctx: &mut Context| {
        let _ = ctx.status(503).send("maintenance");
    })]);
    app.get("/", ["home".into()]);

    let res = app.handle(Request::get("/"));
    assert_eq!(res.status, 503);
    assert_eq!(body(&res), "maintenance");
}

#[test]
fn next_runs_the_rest_before_returning() {
    let mut app = App::new();
    app.get("/", [
        Handler::middleware(|ctx: &mut Context| {
            ctx.next();
            let written = ctx.is_written();
            ctx.set("after_next", written);
        }),
        mark("B"),
        report(),
    ]);

    assert_eq!(body(&app.handle(Request::get("/"))), "B");
}

#[test]
fn second_send_is_rejected() {
    let mut app = App::new();
    app.get("/", [Handler::endpoint(|ctx: &mut Context| {
        assert!(ctx.send("first").is_ok());
        assert!(matches!(ctx.send("second"), Err(zinc::RouterError::ResponseAlreadySent)));
    })]);

    assert_eq!(body(&app.handle(Request::get("/"))), "first");
}

#[test]
fn method_mismatch_is_not_found() {
    let mut app = App::new();
    app.get("/test", ["get".into()]);

    let res = app.handle(Request::post("/test"));
    assert_eq!(res.status, 404);
}

#[test]
fn unknown_route_is_standard_not_found() {
    let app = App::new();
    let res = app.handle(Request::get("/does/not/exist"));
    assert_eq!(res.status, 404);
    assert_eq!(body(&res), NOT_FOUND_BODY);
    assert_eq!(res.get_header("Content-Type"), Some("text/plain; charset=utf-8"));
    assert_eq!(res.get_header("X-Content-Type-Options"), Some("nosniff"));
}

#[test]
fn every_method_is_routable() {
    let mut app = App::new();
    app.get("/m", ["GET".into()])
        .post("/m", ["POST".into()])
        .put("/m", ["PUT".into()])
        .patch("/m", ["PATCH".into()])
        .delete("/m", ["DELETE".into()])
        .head("/m", ["HEAD".into()])
        .options("/m", ["OPTIONS".into()])
        .connect("/m", ["CONNECT".into()])
        .trace("/m", ["TRACE".into()]);

    for method in Method::ALL {
        let res = app.handle(Request::new(method, "/m"));
        assert_eq!(body(&res), method.as_str());
    }
}

#[test]
fn first_registered_sibling_wins() {
    let mut app = App::new();
    app.get("/files/:name/raw", ["param".into()]);
    app.get("/files/readme/raw", ["literal".into()]);

    // The exact-path table still answers the static route.
    assert_eq!(body(&app.handle(Request::get("/files/readme/raw"))), "literal");
    assert_eq!(body(&app.handle(Request::get("/files/other/raw"))), "param");
}

#[test]
fn query_parameters() {
    let mut app = App::new();
    app.get("/search", [Handler::endpoint(|ctx: &mut Context| {
        let out = format!(
            "{}|{}",
            ctx.query("q").unwrap_or_default(),
            ctx.query("page").unwrap_or("1")
        );
        let _ = ctx.send(out);
    })]);

    let res = app.handle(Request::get("/search?q=hello+world&q=ignored"));
    assert_eq!(body(&res), "hello world|1");
}

#[derive(Deserialize)]
struct NewUser {
    name: String,
}

#[test]
fn json_body_and_response() {
    let mut app = App::new();
    app.post("/users", [Handler::endpoint(|ctx: &mut Context| {
        match ctx.body::<NewUser>() {
            Ok(user) => {
                let _ = ctx.status(201).json(&json!({ "name": user.name }));
            }
            Err(err) => {
                let _ = ctx.status(400).send(err.to_string());
            }
        }
    })]);

    let res = app.handle(Request::post("/users").body(r#"{"name":"ada"}"#));
    assert_eq!(res.status, 201);
    assert_eq!(body(&res), "{\"name\":\"ada\"}\n");
    assert_eq!(
        res.get_header("Content-Type"),
        Some("application/json; charset=utf-8")
    );

    let res = app.handle(Request::post("/users").body("not json"));
    assert_eq!(res.status, 400);
}

#[test]
fn response_helpers() {
    let mut app = App::new();
    app.get("/page", [Handler::endpoint(|ctx: &mut Context| {
        let _ = ctx.html("<h1>hi</h1>");
    })]);
    app.get("/old", [Handler::endpoint(|ctx: &mut Context| {
        let _ = ctx.redirect("/new");
    })]);
    app.get("/moved", [Handler::endpoint(|ctx: &mut Context| {
        let _ = ctx.status(301).redirect("/new");
    })]);

    let res = app.handle(Request::get("/page"));
    assert_eq!(res.get_header("Content-Type"), Some("text/html; charset=utf-8"));

    let res = app.handle(Request::get("/old"));
    assert_eq!(res.status, 302);
    assert_eq!(res.get_header("Location"), Some("/new"));

    assert_eq!(app.handle(Request::get("/moved")).status, 301);
}

struct Mailer {
    from: &'static str,
}

#[test]
fn services_are_shared_with_handlers() {
    let mut app = App::new();
    app.service("mailer", Mailer { from: "noreply@zinc" });
    app.get("/from", [Handler::endpoint(|ctx: &mut Context| {
        let mailer = ctx.service::<Mailer>("mailer");
        let _ = ctx.send(mailer.from);
    })]);
    app.get("/missing", [Handler::endpoint(|ctx: &mut Context| {
        let found = ctx.try_service::<Mailer>("cache").is_ok();
        let _ = ctx.send(found.to_string());
    })]);

    assert_eq!(body(&app.handle(Request::get("/from"))), "noreply@zinc");
    assert_eq!(body(&app.handle(Request::get("/missing"))), "false");
}

#[test]
#[should_panic(expected = "service not found: mailer")]
fn missing_service_is_fatal() {
    let mut app = App::new();
    app.get("/", [Handler::endpoint(|ctx: &mut Context| {
        let _ = ctx.service::<Mailer>("mailer");
    })]);
    app.handle(Request::get("/"));
}

#[test]
fn group_middleware_is_inherited_by_nested_groups() {
    let mut app = App::new();
    app.use_route_middleware([mark("R")]);
    {
        let mut api = app.group("/api");
        api.use_middleware([mark("G")]);
        let mut v1 = api.group("/v1");
        v1.use_middleware([mark("N")]);
        v1.get("/ping", [report()]);
        api.get("/ping", [report()]);
    }

    assert_eq!(body(&app.handle(Request::get("/api/v1/ping"))), "RGN");
    assert_eq!(body(&app.handle(Request::get("/api/ping"))), "RG");
}
