//! Handler shapes and chain composition.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::context::Context;

/// One link of a handler chain.
pub type Step = Arc<dyn Fn(&mut Context) + Send + Sync>;

/// The three shapes a route handler may be registered as.
///
/// Every variant resolves to a [`Step`] when the chain is composed, so the
/// dispatcher only ever runs one uniform callable shape.
pub enum Handler {
    /// Sends the literal text as a `text/plain` body.
    Text(Cow<'static, str>),
    /// A request handler that produces the response.
    Endpoint(Step),
    /// A middleware that inspects or rejects the request and calls
    /// [`Context::next`] to continue.
    Middleware(Step),
}

impl Handler {
    /// A handler answering with a fixed text body.
    pub fn text(body: impl Into<Cow<'static, str>>) -> Self {
        Self::Text(body.into())
    }

    /// A request handler.
    pub fn endpoint<F>(f: F) -> Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        Self::Endpoint(Arc::new(f))
    }

    /// A middleware.
    pub fn middleware<F>(f: F) -> Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        Self::Middleware(Arc::new(f))
    }

    /// Resolves the handler into a chain step.
    pub fn into_step(self) -> Step {
        match self {
            Self::Text(body) => Arc::new(move |ctx: &mut Context| {
                if let Err(err) = ctx.send(body.as_ref()) {
                    debug!(%err, "text handler skipped");
                }
            }),
            Self::Endpoint(step) | Self::Middleware(step) => step,
        }
    }
}

impl From<&'static str> for Handler {
    fn from(body: &'static str) -> Self {
        Self::text(body)
    }
}

impl From<String> for Handler {
    fn from(body: String) -> Self {
        Self::text(body)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(body) => f.debug_tuple("Text").field(body).finish(),
            Self::Endpoint(_) => f.write_str("Endpoint(..)"),
            Self::Middleware(_) => f.write_str("Middleware(..)"),
        }
    }
}

/// An immutable, cheaply clonable sequence of steps.
#[derive(Clone, Default)]
pub struct Chain {
    steps: Arc<[Step]>,
}

impl Chain {
    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true for a chain without steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the step at `index`.
    pub fn get(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    /// All steps, in execution order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Returns a new chain with `steps` appended.
    #[must_use]
    pub fn extended(&self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.iter().cloned().chain(steps).collect()
    }
}

impl FromIterator<Step> for Chain {
    fn from_iter<I: IntoIterator<Item = Step>>(iter: I) -> Self {
        Self {
            steps: iter.into_iter().collect(),
        }
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain").field("len", &self.len()).finish()
    }
}

/// Composes one chain out of middleware registered at broader scopes and
/// the handlers given at registration.
///
/// `scopes` are ordered broadest first; their middleware runs before the
/// middleware of narrower scopes, which runs before `handlers`.
pub fn compose<'a>(
    scopes: impl IntoIterator<Item = &'a [Step]>,
    handlers: impl IntoIterator<Item = Handler>,
) -> Chain {
    scopes
        .into_iter()
        .flat_map(|scope| scope.iter().cloned())
        .chain(handlers.into_iter().map(Handler::into_step))
        .collect()
}
