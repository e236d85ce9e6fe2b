//! Built-in middleware.
//!
//! Each item here resolves to a [`Handler::middleware`] and can be registered
//! at any scope: on the dispatcher with [`App::use_middleware`], on every
//! route with [`App::use_route_middleware`], or on a [`Group`].
//!
//! # Example
//!
//! ```ignore
//! use zinc::{App, Authenticate, Cors, Routes, logger};
//!
//! let mut app = App::new();
//! app.use_middleware([Cors::permissive().into()]);
//! app.use_route_middleware([logger()]);
//! app.use_route_middleware([Authenticate::new("/login").exclude(&["/public"]).into()]);
//! app.get("/", ["hello".into()]);
//! ```
//!
//! [`App::use_middleware`]: crate::App::use_middleware
//! [`App::use_route_middleware`]: crate::App::use_route_middleware
//! [`Group`]: crate::Group

use std::time::Instant;

use tracing::{debug, info};

use crate::context::{Context, Principal};
use crate::handler::Handler;
use crate::request::Method;

/// Logs one line per request once the rest of the chain has run.
///
/// Register it as route middleware: dispatcher middleware finishes before
/// the route's handlers run, so it would only ever see the default status.
pub fn logger() -> Handler {
    Handler::middleware(|ctx: &mut Context| {
        let started = Instant::now();
        ctx.next();
        let elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        let response = ctx.response();
        info!(
            method = %ctx.method(),
            path = ctx.path(),
            status = response.status,
            reason = response.status_text(),
            elapsed_us,
            "request"
        );
    })
}

/// Middleware that requires an identified caller.
///
/// A request is identified by an `Authorization` header or a `session`
/// cookie; the identity is recorded as the store's [`Principal`].
/// Unidentified requests are redirected to the login URL, or answered with
/// `401` when there is none.
#[derive(Debug, Clone, Default)]
pub struct Authenticate {
    /// Path prefixes that skip authentication.
    pub exclude: Vec<String>,
    /// Where unidentified callers are redirected.
    pub login_url: Option<String>,
}

impl Authenticate {
    /// Creates auth middleware redirecting to `login_url`.
    pub fn new(login_url: impl Into<String>) -> Self {
        Self {
            exclude: Vec::new(),
            login_url: Some(login_url.into()),
        }
    }

    /// Creates auth middleware answering `401` instead of redirecting.
    pub fn reject() -> Self {
        Self::default()
    }

    /// Adds paths to exclude from authentication.
    #[must_use]
    pub fn exclude(mut self, paths: &[&str]) -> Self {
        self.exclude
            .extend(paths.iter().map(|s| (*s).to_string()));
        self
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.exclude.iter().any(|p| path.starts_with(p.as_str()))
    }

    fn identify(ctx: &Context) -> Option<Principal> {
        if let Some(header) = ctx.header("Authorization") {
            let (scheme, credentials) = header.split_once(' ').unwrap_or(("", header));
            return Some(Principal {
                scheme: scheme.to_string(),
                credentials: credentials.trim().to_string(),
            });
        }
        ctx.header("Cookie")?
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == "session")
            .map(|(_, value)| Principal {
                scheme: "session".to_string(),
                credentials: value.to_string(),
            })
    }

    /// Resolves into a middleware handler.
    pub fn into_handler(self) -> Handler {
        Handler::middleware(move |ctx: &mut Context| {
            if self.is_excluded(ctx.path()) {
                return;
            }
            if let Some(principal) = Self::identify(ctx) {
                ctx.store_mut().principal = Some(principal);
                return;
            }

            debug!(path = ctx.path(), "unauthenticated request");
            let sent = match &self.login_url {
                Some(url) => ctx.redirect(url.clone()),
                None => ctx.status(401).send("Unauthorized"),
            };
            if let Err(err) = sent {
                debug!(%err, "authentication rejection skipped");
            }
        })
    }
}

impl From<Authenticate> for Handler {
    fn from(auth: Authenticate) -> Self {
        auth.into_handler()
    }
}

/// Middleware that admits a request only when `predicate` holds.
///
/// The verdict is recorded in the store's `authorized` field; denied
/// requests are answered with `403`.
pub fn authorize<F>(predicate: F) -> Handler
where
    F: Fn(&Context) -> bool + Send + Sync + 'static,
{
    Handler::middleware(move |ctx: &mut Context| {
        let allowed = predicate(ctx);
        ctx.store_mut().authorized = Some(allowed);
        if !allowed {
            debug!(path = ctx.path(), "request not authorized");
            if let Err(err) = ctx.status(403).send("Forbidden") {
                debug!(%err, "authorization rejection skipped");
            }
        }
    })
}

/// Middleware that adds CORS headers and answers preflight requests.
///
/// A `*` entry allows every origin. Otherwise the request's `Origin` is
/// echoed back when it is listed, and no allow-origin header is sent when
/// it is not.
#[derive(Debug, Clone)]
pub struct Cors {
    /// Allowed origins.
    pub allowed_origins: Vec<String>,
    /// Allowed methods.
    pub allowed_methods: Vec<Method>,
    /// Allowed headers.
    pub allowed_headers: Vec<String>,
    /// Preflight cache lifetime in seconds.
    pub max_age: u32,
}

impl Cors {
    /// Creates CORS middleware that allows all origins.
    pub fn permissive() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec![
                Method::Get,
                Method::Post,
                Method::Put,
                Method::Patch,
                Method::Delete,
                Method::Options,
            ],
            allowed_headers: vec!["*".to_string()],
            max_age: 86400,
        }
    }

    /// Creates CORS middleware with specific origins.
    pub fn new(origins: &[&str]) -> Self {
        Self {
            allowed_origins: origins.iter().map(|s| (*s).to_string()).collect(),
            allowed_methods: vec![Method::Get, Method::Post, Method::Put, Method::Delete],
            allowed_headers: vec!["Content-Type".to_string(), "Authorization".to_string()],
            max_age: 86400,
        }
    }

    fn allow_origin(&self, origin: Option<&str>) -> Option<String> {
        if self.allowed_origins.iter().any(|o| o == "*") {
            return Some("*".to_string());
        }
        let origin = origin?;
        self.allowed_origins
            .iter()
            .any(|o| o == origin)
            .then(|| origin.to_string())
    }

    fn methods(&self) -> String {
        self.allowed_methods
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Resolves into a middleware handler.
    pub fn into_handler(self) -> Handler {
        let methods = self.methods();
        let headers = self.allowed_headers.join(", ");
        let max_age = self.max_age.to_string();

        Handler::middleware(move |ctx: &mut Context| {
            if let Some(origin) = self.allow_origin(ctx.header("Origin")) {
                if origin != "*" {
                    ctx.set_header("Vary", "Origin");
                }
                ctx.set_header("Access-Control-Allow-Origin", origin);
            }
            if ctx.method() != Method::Options {
                return;
            }

            ctx.set_header("Access-Control-Allow-Methods", methods.as_str())
                .set_header("Access-Control-Allow-Headers", headers.as_str())
                .set_header("Access-Control-Max-Age", max_age.as_str());
            if let Err(err) = ctx.status(204).end() {
                debug!(%err, "preflight response skipped");
            }
        })
    }
}

impl From<Cors> for Handler {
    fn from(cors: Cors) -> Self {
        cors.into_handler()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{App, Routes};
    use crate::request::Request;

    fn whoami() -> Handler {
        Handler::endpoint(|ctx: &mut Context| {
            let who = ctx
                .store()
                .principal
                .as_ref()
                .map(|p| format!("{}:{}", p.scheme, p.credentials))
                .unwrap_or_default();
            let _ = ctx.send(who);
        })
    }

    #[test]
    fn test_authenticate_exclude() {
        let mw = Authenticate::new("/login").exclude(&["/public", "/api/health"]);
        assert!(mw.is_excluded("/public/file.txt"));
        assert!(mw.is_excluded("/api/health"));
        assert!(!mw.is_excluded("/admin"));
    }

    #[test]
    fn test_authenticate_records_principal() {
        let mut app = App::new();
        app.use_route_middleware([Authenticate::new("/login").into()]);
        app.get("/me", [whoami()]);

        let res = app.handle(Request::get("/me").header("Authorization", "Bearer abc"));
        assert_eq!(res.body_string().as_deref(), Some("Bearer:abc"));

        let res = app.handle(Request::get("/me").header("Cookie", "theme=dark; session=s1"));
        assert_eq!(res.body_string().as_deref(), Some("session:s1"));
    }

    #[test]
    fn test_authenticate_rejects() {
        let mut app = App::new();
        app.get("/a", [Authenticate::new("/login").into(), whoami()]);
        app.get("/b", [Authenticate::reject().into(), whoami()]);

        let res = app.handle(Request::get("/a"));
        assert_eq!(res.status, 302);
        assert_eq!(res.get_header("Location"), Some("/login"));

        let res = app.handle(Request::get("/b"));
        assert_eq!(res.status, 401);
        assert_eq!(res.body_string().as_deref(), Some("Unauthorized"));
    }

    #[test]
    fn test_authorize_records_verdict() {
        let mut app = App::new();
        app.get("/admin/:user", [
            authorize(|ctx| ctx.param("user") == Some("root")),
            Handler::endpoint(|ctx: &mut Context| {
                let verdict = ctx.store().authorized;
                let _ = ctx.send(format!("{verdict:?}"));
            }),
        ]);

        let res = app.handle(Request::get("/admin/root"));
        assert_eq!(res.body_string().as_deref(), Some("Some(true)"));

        let res = app.handle(Request::get("/admin/guest"));
        assert_eq!(res.status, 403);
        assert_eq!(res.body_string().as_deref(), Some("Forbidden"));
    }

    #[test]
    fn test_cors_preflight_short_circuits() {
        let mut app = App::new();
        app.use_middleware([Cors::new(&["https://a.example"]).into()]);
        app.get("/data", ["data".into()]);

        let res = app.handle(
            Request::new(Method::Options, "/data").header("Origin", "https://a.example"),
        );
        assert_eq!(res.status, 204);
        assert_eq!(
            res.get_header("Access-Control-Allow-Methods"),
            Some("GET, POST, PUT, DELETE")
        );

        let res = app.handle(Request::get("/data").header("Origin", "https://a.example"));
        assert_eq!(res.status, 200);
        assert_eq!(
            res.get_header("Access-Control-Allow-Origin"),
            Some("https://a.example")
        );
    }

    #[test]
    fn test_cors_echoes_a_single_listed_origin() {
        let mut app = App::new();
        app.use_middleware([Cors::new(&["https://a.example", "https://b.example"]).into()]);
        app.get("/data", ["data".into()]);

        let res = app.handle(Request::get("/data").header("Origin", "https://b.example"));
        assert_eq!(
            res.get_header("Access-Control-Allow-Origin"),
            Some("https://b.example")
        );
        assert_eq!(res.get_header("Vary"), Some("Origin"));

        let res = app.handle(Request::get("/data").header("Origin", "https://evil.example"));
        assert_eq!(res.status, 200);
        assert_eq!(res.get_header("Access-Control-Allow-Origin"), None);

        let res = app.handle(Request::get("/data"));
        assert_eq!(res.get_header("Access-Control-Allow-Origin"), None);
    }

    #[test]
    fn test_cors_permissive_allows_any_origin() {
        let mut app = App::new();
        app.use_middleware([Cors::permissive().into()]);
        app.get("/data", ["data".into()]);

        let res = app.handle(Request::get("/data").header("Origin", "https://x.example"));
        assert_eq!(res.get_header("Access-Control-Allow-Origin"), Some("*"));
        assert_eq!(res.get_header("Vary"), None);
    }

    #[test]
    fn test_logger_passes_through() {
        let mut app = App::new();
        app.use_route_middleware([logger()]);
        app.get("/", ["ok".into()]);
        let res = app.handle(Request::get("/"));
        assert_eq!(res.status, 200);
        assert_eq!(res.body_string().as_deref(), Some("ok"));
    }
}
