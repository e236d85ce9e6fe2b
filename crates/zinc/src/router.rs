//! Route table and per-method tries.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{Result, RouterError};
use crate::handler::{compose, Chain, Handler, Step};
use crate::path::{self, PathSegment, SegmentPool};
use crate::request::{Method, Params};
use crate::trie::Trie;

/// A registered route.
#[derive(Debug, Clone)]
pub struct Route {
    method: Method,
    path: String,
    chain: Chain,
    segments: Vec<PathSegment>,
    is_static: bool,
}

impl Route {
    /// HTTP method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Normalized path pattern.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Composed handler chain.
    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// Parsed pattern segments.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Returns true if the pattern has no parameter or wildcard segment.
    pub fn is_static(&self) -> bool {
        self.is_static
    }
}

/// The result of a successful lookup.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The chain to execute.
    pub chain: Chain,
    /// Captured path parameters; empty for static routes.
    pub params: Params,
}

/// Route storage: an exact-path table for static routes backed by one
/// segment trie per method.
#[derive(Debug, Default)]
pub struct Router {
    table: HashMap<Method, HashMap<String, Route>>,
    tries: HashMap<Method, Trie<Chain>>,
    named: HashMap<String, (Method, String)>,
    middleware: Chain,
    segments: SegmentPool,
}

impl Router {
    /// Creates a new empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a router whose tokenizer keeps `max_idle` buffers around.
    pub fn with_segment_pool(max_idle: usize) -> Self {
        Self {
            segments: SegmentPool::new(max_idle),
            ..Self::default()
        }
    }

    /// Adds middleware prepended to every route added afterwards.
    pub fn use_middleware(&mut self, middleware: impl IntoIterator<Item = Handler>) {
        self.middleware = self
            .middleware
            .extended(middleware.into_iter().map(Handler::into_step));
    }

    /// Registers a route.
    ///
    /// `scope` is middleware of an enclosing group; it runs after the
    /// router-wide middleware and before `handlers`. Registering the same
    /// method and path again replaces the earlier route.
    pub fn add(
        &mut self,
        method: Method,
        pattern: &str,
        scope: &[Step],
        handlers: impl IntoIterator<Item = Handler>,
    ) -> Result<&Route> {
        let path = path::normalize(pattern);
        let segments = path::parse_pattern(&path)?;
        let chain = compose([self.middleware.steps(), scope], handlers);

        debug!(%method, %path, steps = chain.len(), "registered route");

        self.tries
            .entry(method)
            .or_default()
            .insert(&segments, &path, chain.clone());

        let routes = self.table.entry(method).or_default();
        let is_static = segments
            .iter()
            .all(|segment| matches!(segment, PathSegment::Literal(_)));
        routes.insert(
            path.clone(),
            Route {
                method,
                path: path.clone(),
                chain,
                segments,
                is_static,
            },
        );
        Ok(&routes[&path])
    }

    /// Gives a name to a registered route, for [`Router::url_for`].
    pub fn name(&mut self, name: impl Into<String>, method: Method, pattern: &str) -> Result<()> {
        let path = path::normalize(pattern);
        if self.route(method, &path).is_none() {
            return Err(RouterError::RouteNotFound(format!("{method} {path}")));
        }
        self.named.insert(name.into(), (method, path));
        Ok(())
    }

    /// Finds the chain registered for `method` and `path`.
    ///
    /// Static routes are answered from the exact-path table without
    /// tokenizing; everything else walks the method's trie.
    pub fn find(&self, method: Method, path: &str) -> Option<RouteMatch> {
        if let Some(route) = self
            .table
            .get(&method)
            .and_then(|routes| routes.get(path))
            .filter(|route| route.is_static())
        {
            return Some(RouteMatch {
                chain: route.chain.clone(),
                params: Params::new(),
            });
        }

        let trie = self.tries.get(&method)?;
        let segments = self.segments.tokenize(path);
        let mut params = Params::new();
        let (_, chain) = trie.find(&segments, &mut params)?;
        Some(RouteMatch {
            chain: chain.clone(),
            params,
        })
    }

    /// Returns the route registered under `method` and `pattern`.
    pub fn route(&self, method: Method, pattern: &str) -> Option<&Route> {
        self.table
            .get(&method)
            .and_then(|routes| routes.get(&path::normalize(pattern)))
    }

    /// Iterates over every registered route.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.table.values().flat_map(HashMap::values)
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.table.values().map(HashMap::len).sum()
    }

    /// Returns true if no route is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Generates a URL for a named route.
    pub fn url_for(&self, name: &str, params: &Params) -> Result<Option<String>> {
        let (method, path) = self
            .named
            .get(name)
            .ok_or_else(|| RouterError::RouteNotFound(name.to_string()))?;
        Ok(self
            .route(*method, path)
            .and_then(|route| path::reverse(&route.segments, params)))
    }

    /// The tokenizer buffer pool.
    pub fn segment_pool(&self) -> &SegmentPool {
        &self.segments
    }
}
