//! # zinc
//!
//! An embeddable HTTP router and middleware dispatcher.
//!
//! This crate provides:
//! - Per-method segment tries with `:param` and `*wildcard` segments
//! - An exact-path fast path for static routes
//! - Handler chains with Gin-style `next()` control flow
//! - Route groups with scoped middleware
//! - Pooled request contexts with a request-scoped store
//! - A named service registry
//! - Named routes for reverse URL lookup
//!
//! `zinc` does not own a socket. The host server turns its request into a
//! [`Request`], calls [`App::handle`] (or [`App::serve`] with a
//! [`ResponseSink`]) and writes the result back.
//!
//! ## Quick Start
//!
//! ```ignore
//! use zinc::{App, Context, Handler, Request, Routes};
//!
//! let mut app = App::new();
//! app.get("/", ["Hello, World!".into()]);
//! app.get("/users/:id", [Handler::endpoint(|ctx: &mut Context| {
//!     let id = ctx.param("id").unwrap_or_default().to_string();
//!     let _ = ctx.json(&serde_json::json!({ "id": id }));
//! })]);
//!
//! let response = app.handle(Request::get("/users/123"));
//! assert_eq!(response.status, 200);
//! ```
//!
//! ## Path Parameters
//!
//! Routes can include named parameters and a trailing wildcard:
//!
//! ```ignore
//! app.get("/posts/:post_id/comments/:comment_id", [handler]);
//! app.get("/static/*path", [files]);
//! ```
//!
//! Inside a handler, `ctx.param("post_id")` returns the captured segment and
//! `ctx.wildcard()` the remaining path joined with `/`.
//!
//! ## Middleware
//!
//! A middleware either writes a response, which ends the chain, or calls
//! `ctx.next()` to run the rest of it:
//!
//! ```ignore
//! use zinc::{logger, Authenticate, Handler};
//!
//! app.use_route_middleware([logger()]);
//! app.use_route_middleware([Authenticate::new("/login").exclude(&["/public"]).into()]);
//! app.use_middleware([Handler::middleware(|ctx| {
//!     ctx.set_header("X-Served-By", "zinc");
//!     ctx.next();
//! })]);
//! ```
//!
//! ## Route Groups
//!
//! ```ignore
//! let mut api = app.group("/api/v1");
//! api.use_middleware([auth]);
//! api.get("/users", [list_users]);
//! api.post("/users", [create_user]);
//! ```
//!
//! ## Named Routes
//!
//! ```ignore
//! app.named("user_detail", Method::Get, "/users/:id", [handler]);
//!
//! let params: Params = [("id", "123")].into_iter().collect();
//! assert_eq!(app.url_for("user_detail", &params)?, Some("/users/123".to_string()));
//! ```

mod app;
mod config;
mod context;
mod error;
mod handler;
mod middleware;
pub mod path;
mod request;
mod response;
mod router;
mod service;
mod trie;

pub use app::{App, Group, Routes};
pub use config::Config;
pub use context::{Context, ContextPool, Extensions, PooledContext, Principal, Store};
pub use error::{Result, RouterError};
pub use handler::{compose, Chain, Handler, Step};
pub use middleware::{authorize, logger, Authenticate, Cors};
pub use request::{Method, Params, Request};
pub use response::{Response, ResponseSink, NOT_FOUND_BODY};
pub use router::{Route, RouteMatch, Router};
pub use service::Services;
pub use trie::Trie;
