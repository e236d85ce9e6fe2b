//! The dispatcher and its registration surface.

use std::io;
use std::sync::Arc;

use tracing::trace;

use crate::config::Config;
use crate::context::ContextPool;
use crate::error::Result;
use crate::handler::{Chain, Handler};
use crate::path;
use crate::request::{Method, Params, Request};
use crate::response::{Response, ResponseSink};
use crate::router::{Route, RouteMatch, Router};
use crate::service::Services;

/// Route registration, shared by [`App`] and [`Group`].
///
/// The per-method calls panic on an invalid pattern: a malformed route is a
/// programming error that should stop the application at startup. Use
/// [`Routes::try_route`] to handle it instead.
pub trait Routes {
    /// Registers a route, returning its normalized path.
    fn try_route(
        &mut self,
        method: Method,
        pattern: &str,
        handlers: impl IntoIterator<Item = Handler>,
    ) -> Result<String>;

    /// Names an already registered route for reverse URL generation.
    ///
    /// `path` is the pattern as given at registration, relative to this
    /// registrar.
    fn name_route(&mut self, name: &str, method: Method, path: &str) -> Result<()>;

    /// Registers a route.
    ///
    /// # Panics
    ///
    /// Panics if `pattern` is not a valid route pattern.
    fn route(
        &mut self,
        method: Method,
        pattern: &str,
        handlers: impl IntoIterator<Item = Handler>,
    ) -> &mut Self {
        if let Err(err) = self.try_route(method, pattern, handlers) {
            panic!("cannot register {method} {pattern}: {err}");
        }
        self
    }

    /// Registers a route and names it.
    ///
    /// # Panics
    ///
    /// Panics if `pattern` is not a valid route pattern.
    fn named(
        &mut self,
        name: &str,
        method: Method,
        pattern: &str,
        handlers: impl IntoIterator<Item = Handler>,
    ) -> &mut Self {
        let registered = self
            .try_route(method, pattern, handlers)
            .and_then(|_| self.name_route(name, method, pattern));
        if let Err(err) = registered {
            panic!("cannot register {method} {pattern} as {name}: {err}");
        }
        self
    }

    /// Adds a GET route.
    fn get(&mut self, pattern: &str, handlers: impl IntoIterator<Item = Handler>) -> &mut Self {
        self.route(Method::Get, pattern, handlers)
    }

    /// Adds a POST route.
    fn post(&mut self, pattern: &str, handlers: impl IntoIterator<Item = Handler>) -> &mut Self {
        self.route(Method::Post, pattern, handlers)
    }

    /// Adds a PUT route.
    fn put(&mut self, pattern: &str, handlers: impl IntoIterator<Item = Handler>) -> &mut Self {
        self.route(Method::Put, pattern, handlers)
    }

    /// Adds a PATCH route.
    fn patch(&mut self, pattern: &str, handlers: impl IntoIterator<Item = Handler>) -> &mut Self {
        self.route(Method::Patch, pattern, handlers)
    }

    /// Adds a DELETE route.
    fn delete(&mut self, pattern: &str, handlers: impl IntoIterator<Item = Handler>) -> &mut Self {
        self.route(Method::Delete, pattern, handlers)
    }

    /// Adds a HEAD route.
    fn head(&mut self, pattern: &str, handlers: impl IntoIterator<Item = Handler>) -> &mut Self {
        self.route(Method::Head, pattern, handlers)
    }

    /// Adds an OPTIONS route.
    fn options(&mut self, pattern: &str, handlers: impl IntoIterator<Item = Handler>) -> &mut Self {
        self.route(Method::Options, pattern, handlers)
    }

    /// Adds a CONNECT route.
    fn connect(&mut self, pattern: &str, handlers: impl IntoIterator<Item = Handler>) -> &mut Self {
        self.route(Method::Connect, pattern, handlers)
    }

    /// Adds a TRACE route.
    fn trace(&mut self, pattern: &str, handlers: impl IntoIterator<Item = Handler>) -> &mut Self {
        self.route(Method::Trace, pattern, handlers)
    }
}

/// The request dispatcher.
///
/// Routes, middleware and services are registered up front through `&mut`
/// methods; once built, an `App` is shared across request workers and
/// dispatches through `&self` only.
#[derive(Debug)]
pub struct App {
    router: Router,
    middleware: Chain,
    services: Arc<Services>,
    pool: ContextPool,
    config: Config,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    /// Creates an app with the default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates an app whose pools are sized by `config`.
    pub fn with_config(config: Config) -> Self {
        Self {
            router: Router::with_segment_pool(config.segment_pool_size),
            middleware: Chain::default(),
            services: Arc::new(Services::new()),
            pool: ContextPool::new(config.context_pool_size),
            config,
        }
    }

    /// Adds middleware that runs on every request before route lookup,
    /// including requests that end up as 404.
    ///
    /// If this middleware writes a response, no route is looked up.
    pub fn use_middleware(&mut self, middleware: impl IntoIterator<Item = Handler>) -> &mut Self {
        self.middleware = self
            .middleware
            .extended(middleware.into_iter().map(Handler::into_step));
        self
    }

    /// Adds middleware that is prepended to the chain of every route
    /// registered afterwards.
    ///
    /// Unlike [`App::use_middleware`], it runs inside the matched route's
    /// chain, so calling [`Context::next`](crate::Context::next) runs the
    /// route's handlers.
    pub fn use_route_middleware(
        &mut self,
        middleware: impl IntoIterator<Item = Handler>,
    ) -> &mut Self {
        self.router.use_middleware(middleware);
        self
    }

    /// Registers a named service, available to handlers through
    /// [`Context::service`](crate::Context::service).
    pub fn service<T>(&mut self, name: impl Into<String>, service: T) -> &mut Self
    where
        T: std::any::Any + Send + Sync,
    {
        Arc::make_mut(&mut self.services).insert(name, service);
        self
    }

    /// Creates a route group under `prefix`.
    pub fn group(&mut self, prefix: &str) -> Group<'_> {
        Group {
            prefix: path::normalize(prefix),
            app: self,
            middleware: Chain::default(),
        }
    }

    /// Dispatches one request and returns its response.
    ///
    /// Dispatcher middleware runs first; unless it writes a response, the
    /// route is looked up and its chain runs. Unmatched requests get a 404.
    /// The context goes back to the pool on every path out of this call,
    /// including a panicking handler.
    pub fn handle(&self, request: Request) -> Response {
        let mut ctx = self
            .pool
            .acquire(request, Some(Arc::clone(&self.services)));

        if !self.middleware.is_empty() {
            ctx.run(self.middleware.clone());
            if ctx.is_written() {
                return ctx.finish();
            }
        }

        match self.router.find(ctx.method(), ctx.path()) {
            Some(RouteMatch { chain, params }) => {
                ctx.bind_params(params);
                ctx.run(chain);
            }
            None => {
                trace!(method = %ctx.method(), path = ctx.path(), "no route matched");
                ctx.not_found();
            }
        }

        ctx.finish()
    }

    /// Dispatches one request and writes the response into `sink`.
    pub fn serve(&self, request: Request, sink: &mut dyn ResponseSink) -> io::Result<()> {
        self.handle(request).write_to(sink)
    }

    /// Generates a URL for a named route.
    ///
    /// Returns `Ok(None)` when `params` lacks a value the pattern needs.
    pub fn url_for(&self, name: &str, params: &Params) -> Result<Option<String>> {
        self.router.url_for(name, params)
    }

    /// Iterates over every registered route.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.router.routes()
    }

    /// The route storage.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// The context pool.
    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }

    /// The configuration this app was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Routes for App {
    fn try_route(
        &mut self,
        method: Method,
        pattern: &str,
        handlers: impl IntoIterator<Item = Handler>,
    ) -> Result<String> {
        self.router
            .add(method, pattern, &[], handlers)
            .map(|route| route.path().to_string())
    }

    fn name_route(&mut self, name: &str, method: Method, path: &str) -> Result<()> {
        self.router.name(name, method, path)
    }
}

/// Routes registered under a common path prefix.
///
/// A group only forwards registrations to its app with the prefix joined
/// in front; nothing is re-evaluated later.
#[derive(Debug)]
pub struct Group<'a> {
    app: &'a mut App,
    prefix: String,
    middleware: Chain,
}

impl Group<'_> {
    /// The normalized prefix of this group.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Creates a nested group, inheriting this group's middleware.
    pub fn group(&mut self, prefix: &str) -> Group<'_> {
        Group {
            prefix: path::join(&self.prefix, prefix),
            middleware: self.middleware.clone(),
            app: &mut *self.app,
        }
    }

    /// Adds middleware that runs before the handlers of every route
    /// registered on this group afterwards.
    pub fn use_middleware(&mut self, middleware: impl IntoIterator<Item = Handler>) -> &mut Self {
        self.middleware = self
            .middleware
            .extended(middleware.into_iter().map(Handler::into_step));
        self
    }
}

impl Routes for Group<'_> {
    fn try_route(
        &mut self,
        method: Method,
        pattern: &str,
        handlers: impl IntoIterator<Item = Handler>,
    ) -> Result<String> {
        let full = path::join(&self.prefix, pattern);
        self.app
            .router
            .add(method, &full, self.middleware.steps(), handlers)
            .map(|route| route.path().to_string())
    }

    fn name_route(&mut self, name: &str, method: Method, path: &str) -> Result<()> {
        let full = path::join(&self.prefix, path);
        self.app.router.name(name, method, &full)
    }
}
