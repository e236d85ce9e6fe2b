//! Per-request context and the pool it is recycled through.
//!
//! A [`Context`] carries everything one in-flight request needs: the request
//! itself, captured path and query parameters, a request-scoped [`Store`],
//! the response being built and the handler chain with its cursor. Contexts
//! are checked out of a [`ContextPool`] and go back to it when the
//! [`PooledContext`] guard drops, including while unwinding from a panicking
//! handler. Request state is cleared when a context is acquired, not when it
//! is released.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, RouterError};
use crate::handler::Chain;
use crate::request::{Method, Params, Request};
use crate::response::Response;
use crate::service::Services;

const DEFAULT_STATUS: u16 = 200;

/// The identity established by authentication middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// How the request authenticated, e.g. `Bearer` or `session`.
    pub scheme: String,
    /// The presented credentials.
    pub credentials: String,
}

/// Typed request-scoped values, at most one per type.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    /// Inserts a value, returning the previous value of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.map
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    /// Returns the value of type `T`.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    /// Returns the value of type `T` mutably.
    pub fn get_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        self.map
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut::<T>())
    }

    /// Removes the value of type `T`.
    pub fn remove<T: Any + Send + Sync>(&mut self) -> Option<T> {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Removes every value, keeping the allocated capacity.
    pub fn clear(&mut self) {
        self.map.clear();
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.len())
            .finish()
    }
}

/// Request-scoped state shared between the links of a chain.
#[derive(Debug, Default)]
pub struct Store {
    /// Set by authentication middleware once the caller is identified.
    pub principal: Option<Principal>,
    /// Set by authorization middleware with its verdict.
    pub authorized: Option<bool>,
    values: HashMap<String, Value>,
    extensions: Extensions,
}

impl Store {
    /// Stores a JSON-like value under `key`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Gets the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Removes the value stored under `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// The typed extension slots.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// The typed extension slots, mutably.
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Returns true if no field, value or extension is set.
    pub fn is_empty(&self) -> bool {
        self.principal.is_none()
            && self.authorized.is_none()
            && self.values.is_empty()
            && self.extensions.is_empty()
    }

    /// Clears every field in place.
    pub fn clear(&mut self) {
        self.principal = None;
        self.authorized = None;
        self.values.clear();
        self.extensions.clear();
    }
}

/// The state of one in-flight request.
#[derive(Debug)]
pub struct Context {
    request: Request,
    response: Response,
    params: Params,
    query: HashMap<String, String>,
    store: Store,
    services: Option<Arc<Services>>,
    chain: Option<Chain>,
    cursor: isize,
    written: bool,
    status: Option<u16>,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            request: Request::default(),
            response: Response::default(),
            params: Params::default(),
            query: HashMap::new(),
            store: Store::default(),
            services: None,
            chain: None,
            cursor: -1,
            written: false,
            status: None,
        }
    }
}

impl Context {
    /// Prepares the context for a new request.
    ///
    /// Maps are cleared in place so their capacity carries over.
    fn reset(&mut self, request: Request, services: Option<Arc<Services>>) {
        self.params.clear();
        self.query.clear();
        self.store.clear();
        request.decode_query_into(&mut self.query);
        self.request = request;
        self.response.clear();
        self.services = services;
        self.chain = None;
        self.cursor = -1;
        self.written = false;
        self.status = None;
    }

    /// Drops everything the context must not keep alive while pooled.
    fn release(&mut self) {
        self.request = Request::default();
        self.response = Response::default();
        self.services = None;
        self.chain = None;
    }

    // ---- request ----

    /// The request being handled.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The request method.
    pub fn method(&self) -> Method {
        self.request.method
    }

    /// The request path.
    pub fn path(&self) -> &str {
        &self.request.path
    }

    /// Gets a request header, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.get_header(name)
    }

    /// Gets a captured path parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Gets the remainder captured by a trailing wildcard.
    pub fn wildcard(&self) -> Option<&str> {
        self.params.wildcard()
    }

    /// All captured path parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }

    pub(crate) fn bind_params(&mut self, params: Params) {
        self.params.absorb(params);
    }

    /// Gets a query parameter.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Decodes the JSON request body.
    pub fn body<T: DeserializeOwned>(&self) -> Result<T> {
        if self.request.body.is_empty() {
            return Err(RouterError::EmptyBody);
        }
        serde_json::from_slice(&self.request.body).map_err(RouterError::BodyDecode)
    }

    // ---- store ----

    /// Stores a value for later links of the chain.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.store.set(key, value);
    }

    /// Gets a value stored by an earlier link of the chain.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.store.get(key)
    }

    /// Stores a typed extension, returning the previous one of that type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.store.extensions_mut().insert(value)
    }

    /// Gets a typed extension.
    pub fn extension<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.store.extensions().get()
    }

    /// The request-scoped store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The request-scoped store, mutably.
    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    /// Looks up an application service.
    pub fn try_service<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        match &self.services {
            Some(services) => services.get(name),
            None => Err(RouterError::ServiceNotFound(name.to_string())),
        }
    }

    /// Looks up an application service.
    ///
    /// # Panics
    ///
    /// Panics if no service of type `T` is registered under `name`. Asking
    /// for a service that was never registered is a programming error.
    pub fn service<T: Any + Send + Sync>(&self, name: &str) -> Arc<T> {
        match self.try_service(name) {
            Ok(service) => service,
            Err(err) => panic!("{err}"),
        }
    }

    // ---- response ----

    /// Sets the status code used by the next write.
    pub fn status(&mut self, code: u16) -> &mut Self {
        self.status = Some(code);
        self
    }

    /// Sets a response header, failing once the response is written.
    pub fn try_set_header(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        if self.written {
            return Err(RouterError::ResponseAlreadySent);
        }
        self.response.headers.insert(name.into(), value.into());
        Ok(())
    }

    /// Sets a response header. Ignored once the response is written; use
    /// [`Context::try_set_header`] to observe that.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        if self.written {
            debug!(path = %self.request.path, "header set after response was sent");
        } else {
            self.response.headers.insert(name.into(), value.into());
        }
        self
    }

    /// Sends a plain-text body.
    pub fn send(&mut self, body: impl Into<String>) -> Result<()> {
        self.begin(Some("text/plain; charset=utf-8"))?;
        self.response.body = body.into().into_bytes();
        Ok(())
    }

    /// Sends a binary body.
    pub fn send_bytes(&mut self, body: impl Into<Vec<u8>>) -> Result<()> {
        self.begin(Some("application/octet-stream"))?;
        self.response.body = body.into();
        Ok(())
    }

    /// Sends `value` encoded as JSON, followed by a newline. A unit value
    /// is sent as `null`.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        if self.written {
            return self.begin(None);
        }
        let mut body = serde_json::to_vec(value).map_err(RouterError::Encode)?;
        body.push(b'\n');
        self.begin(Some("application/json; charset=utf-8"))?;
        self.response
            .headers
            .insert("X-Content-Type-Options".to_string(), "nosniff".to_string());
        self.response.body = body;
        Ok(())
    }

    /// Sends an HTML body.
    pub fn html(&mut self, body: impl Into<String>) -> Result<()> {
        self.begin(Some("text/html; charset=utf-8"))?;
        self.response.body = body.into().into_bytes();
        Ok(())
    }

    /// Sends the status and headers without a body.
    pub fn end(&mut self) -> Result<()> {
        self.begin(None)
    }

    /// Redirects to `location`, with 302 unless a status was set.
    pub fn redirect(&mut self, location: impl Into<String>) -> Result<()> {
        if self.status.is_none() {
            self.status = Some(302);
        }
        self.begin(None)?;
        self.response
            .headers
            .insert("Location".to_string(), location.into());
        Ok(())
    }

    pub(crate) fn not_found(&mut self) {
        let Response {
            status,
            headers,
            body,
        } = Response::not_found();
        self.written = true;
        self.response.status = status;
        self.response.headers.extend(headers);
        self.response.body = body;
    }

    fn begin(&mut self, content_type: Option<&str>) -> Result<()> {
        if self.written {
            debug!(
                method = %self.request.method,
                path = %self.request.path,
                "response already sent"
            );
            return Err(RouterError::ResponseAlreadySent);
        }
        self.written = true;
        self.response.status = self.status.unwrap_or(DEFAULT_STATUS);
        if let Some(content_type) = content_type {
            self.response
                .headers
                .insert("Content-Type".to_string(), content_type.to_string());
        }
        Ok(())
    }

    /// Returns true once a response has been written.
    pub fn is_written(&self) -> bool {
        self.written
    }

    /// The response built so far.
    pub fn response(&self) -> &Response {
        &self.response
    }

    fn take_response(&mut self) -> Response {
        if !self.written {
            self.response.status = self.status.unwrap_or(DEFAULT_STATUS);
        }
        std::mem::take(&mut self.response)
    }

    // ---- chain ----

    /// Position of the step currently running; `-1` before the first.
    pub fn cursor(&self) -> isize {
        self.cursor
    }

    /// Installs `chain` as the active chain and rewinds the cursor.
    pub fn set_handlers(&mut self, chain: Chain) {
        self.chain = Some(chain);
        self.cursor = -1;
    }

    /// Installs `chain` and runs it from the start.
    pub fn run(&mut self, chain: Chain) {
        self.set_handlers(chain);
        self.next();
    }

    /// Runs the remaining steps of the active chain.
    ///
    /// Steps run in order until the chain ends or one of them writes the
    /// response. A step calling `next` runs everything after it before its
    /// own call returns; the steps it ran are not run again. Calling `next`
    /// at the end of the chain does nothing.
    pub fn next(&mut self) {
        let Some(chain) = self.chain.clone() else {
            return;
        };
        let len = isize::try_from(chain.len()).unwrap_or(isize::MAX);
        if self.cursor >= len {
            return;
        }

        self.cursor += 1;
        while !self.written {
            let step = usize::try_from(self.cursor)
                .ok()
                .and_then(|index| chain.get(index));
            let Some(step) = step else {
                break;
            };
            step(self);
            if self.written {
                break;
            }
            self.cursor += 1;
        }
        self.cursor = self.cursor.min(len);
    }
}

/// A pool of reusable contexts.
#[derive(Debug)]
pub struct ContextPool {
    idle: Mutex<Vec<Context>>,
    max_idle: usize,
    created: AtomicUsize,
}

impl Default for ContextPool {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ContextPool {
    /// Creates a pool that keeps at most `max_idle` contexts around.
    pub fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
            created: AtomicUsize::new(0),
        }
    }

    /// Checks a context out of the pool and resets it for `request`.
    pub fn acquire(&self, request: Request, services: Option<Arc<Services>>) -> PooledContext<'_> {
        let idle = self.idle.lock().pop();
        let mut ctx = idle.unwrap_or_else(|| {
            self.created.fetch_add(1, Ordering::Relaxed);
            Context::default()
        });
        ctx.reset(request, services);
        PooledContext { ctx, pool: self }
    }

    /// Number of contexts waiting for reuse.
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    /// Number of contexts this pool has allocated.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    fn put_back(&self, ctx: Context) {
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(ctx);
        }
    }
}

/// A context checked out of a [`ContextPool`].
///
/// Dropping the guard releases the context back to the pool.
#[derive(Debug)]
pub struct PooledContext<'p> {
    ctx: Context,
    pool: &'p ContextPool,
}

impl PooledContext<'_> {
    /// Takes the finished response and releases the context.
    pub fn finish(mut self) -> Response {
        self.ctx.take_response()
    }
}

impl Deref for PooledContext<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        &self.ctx
    }
}

impl DerefMut for PooledContext<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }
}

impl Drop for PooledContext<'_> {
    fn drop(&mut self) {
        let mut ctx = std::mem::take(&mut self.ctx);
        ctx.release();
        self.pool.put_back(ctx);
    }
}
