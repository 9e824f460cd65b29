//! Interceptors installed around simulated operations.
//!
//! A [`Behavior`] receives the call plus a [`Next`] continuation for the rest
//! of the chain. It may call `next` (possibly with a changed input), inspect
//! or rewrite the result, or return without calling it at all. Behaviors run
//! in installation order, the first installed outermost.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use azfake_domain::CloudError;
use futures::future::BoxFuture;
use tracing::warn;

use crate::context::CallContext;
use crate::record::CallRecord;

/// The remainder of an operation's chain, ending in the store operation.
pub type Next<'a, I, O> =
    Box<dyn FnOnce(CallContext, I) -> BoxFuture<'a, Result<O, CloudError>> + Send + 'a>;

#[async_trait]
pub trait Behavior<I, O>: Send + Sync {
    /// Unique per operation; installing a second behavior with the same name
    /// is a setup error.
    fn name(&self) -> &str;

    async fn around(&self, ctx: CallContext, input: I, next: Next<'_, I, O>) -> Result<O, CloudError>;

    /// Forget per-test state. Called when the owning operation is reset,
    /// right before the behavior is uninstalled.
    fn reset(&self) {}
}

// ── RecordCalls ───────────────────────────────────────────────────────────────

/// Records every call that reaches this point of the chain.
///
/// Calls short-circuited by an outer behavior never show up here.
pub struct RecordCalls<I, O> {
    name: String,
    record: Arc<CallRecord<I, O>>,
}

impl<I, O> RecordCalls<I, O> {
    pub fn new() -> Self {
        Self::named("record-calls")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            record: Arc::new(CallRecord::new()),
        }
    }

    /// Handle to the calls seen so far; stays valid after installation.
    pub fn record(&self) -> Arc<CallRecord<I, O>> {
        self.record.clone()
    }
}

impl<I, O> Default for RecordCalls<I, O> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<I, O> Behavior<I, O> for RecordCalls<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn around(&self, ctx: CallContext, input: I, next: Next<'_, I, O>) -> Result<O, CloudError> {
        let outcome = next(ctx, input.clone()).await;
        self.record.push(input, outcome.clone());
        outcome
    }

    fn reset(&self) {
        self.record.clear();
    }
}

// ── InjectFault ───────────────────────────────────────────────────────────────

/// Fails calls with a fixed error instead of running the rest of the chain.
///
/// By default every call fails. `after(n)` lets the first `n` calls through
/// and `times(k)` stops failing once `k` faults have been returned.
#[derive(Debug)]
pub struct InjectFault {
    name: String,
    error: CloudError,
    after: usize,
    times: Option<usize>,
    seen: AtomicUsize,
    fired: AtomicUsize,
}

impl InjectFault {
    pub fn new(error: CloudError) -> Self {
        Self {
            name: "inject-fault".into(),
            error,
            after: 0,
            times: None,
            seen: AtomicUsize::new(0),
            fired: AtomicUsize::new(0),
        }
    }

    /// Shorthand for an [`CloudError::Injected`] fault.
    pub fn status(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(CloudError::injected(status, code, message))
    }

    pub fn after(mut self, calls: usize) -> Self {
        self.after = calls;
        self
    }

    pub fn times(mut self, faults: usize) -> Self {
        self.times = Some(faults);
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Faults returned so far.
    pub fn fired(&self) -> usize {
        self.fired.load(Ordering::SeqCst)
    }

    fn should_fire(&self) -> bool {
        let seen = self.seen.fetch_add(1, Ordering::SeqCst);
        if seen < self.after {
            return false;
        }
        match self.times {
            None => {
                self.fired.fetch_add(1, Ordering::SeqCst);
                true
            }
            Some(limit) => self
                .fired
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |fired| {
                    (fired < limit).then_some(fired + 1)
                })
                .is_ok(),
        }
    }
}

#[async_trait]
impl<I, O> Behavior<I, O> for InjectFault
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn around(&self, ctx: CallContext, input: I, next: Next<'_, I, O>) -> Result<O, CloudError> {
        if self.should_fire() {
            warn!(
                behavior = %self.name,
                correlation_id = %ctx.correlation_id,
                status = self.error.status(),
                code = self.error.code(),
                "injecting fault"
            );
            return Err(self.error.clone());
        }
        next(ctx, input).await
    }

    fn reset(&self) {
        self.seen.store(0, Ordering::SeqCst);
        self.fired.store(0, Ordering::SeqCst);
    }
}

// ── Delay ─────────────────────────────────────────────────────────────────────

/// Sleeps before running the rest of the chain.
#[derive(Debug, Clone)]
pub struct Delay {
    name: String,
    duration: Duration,
}

impl Delay {
    pub fn new(duration: Duration) -> Self {
        Self {
            name: "delay".into(),
            duration,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl<I, O> Behavior<I, O> for Delay
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn around(&self, ctx: CallContext, input: I, next: Next<'_, I, O>) -> Result<O, CloudError> {
        tokio::time::sleep(self.duration).await;
        next(ctx, input).await
    }
}

// ── RequireAuxiliaryToken ─────────────────────────────────────────────────────

/// Rejects calls that do not carry the expected auxiliary token, the way a
/// cross-tenant subscription does.
#[derive(Debug, Clone)]
pub struct RequireAuxiliaryToken {
    token: String,
}

impl RequireAuxiliaryToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl<I, O> Behavior<I, O> for RequireAuxiliaryToken
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn name(&self) -> &str {
        "require-auxiliary-token"
    }

    async fn around(&self, ctx: CallContext, input: I, next: Next<'_, I, O>) -> Result<O, CloudError> {
        let presented = ctx.auxiliary_token.as_deref().map(|token| token == self.token);
        match presented {
            Some(true) => next(ctx, input).await,
            Some(false) => Err(CloudError::injected(
                401,
                "InvalidAuthenticationToken",
                "the auxiliary token does not match the expected tenant",
            )),
            None => Err(CloudError::injected(
                401,
                "InvalidAuthenticationToken",
                "the request requires an auxiliary token",
            )),
        }
    }
}

// ── MutateOutput ──────────────────────────────────────────────────────────────

/// Edits successful responses on their way back to the caller. The stored
/// resource is not affected.
pub struct MutateOutput<O> {
    name: String,
    mutate: Box<dyn Fn(&mut O) + Send + Sync>,
}

impl<O> MutateOutput<O> {
    pub fn new(mutate: impl Fn(&mut O) + Send + Sync + 'static) -> Self {
        Self {
            name: "mutate-output".into(),
            mutate: Box::new(mutate),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<O> fmt::Debug for MutateOutput<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutateOutput").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<I, O> Behavior<I, O> for MutateOutput<O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn around(&self, ctx: CallContext, input: I, next: Next<'_, I, O>) -> Result<O, CloudError> {
        let mut output = next(ctx, input).await?;
        (self.mutate)(&mut output);
        Ok(output)
    }
}
