use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use azfake_domain::CloudError;
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;

use crate::behavior::{Behavior, Next};
use crate::context::CallContext;
use crate::record::CallRecord;

type Chain<I, O> = Arc<[Arc<dyn Behavior<I, O>>]>;

/// One interceptable operation of a simulator.
///
/// Holds the installed behaviors, a built-in call record sitting innermost
/// (right next to the store operation), and outcome counters as seen by the
/// caller.
pub struct Operation<I, O> {
    name: &'static str,
    behaviors: Mutex<Vec<Arc<dyn Behavior<I, O>>>>,
    record: CallRecord<I, O>,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl<I, O> Operation<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            behaviors: Mutex::new(Vec::new()),
            record: CallRecord::new(),
            succeeded: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run `op` behind every installed behavior.
    ///
    /// The chain is snapshotted when the call starts; behaviors installed or
    /// removed meanwhile only affect later calls.
    pub async fn invoke<'a, F, Fut>(&'a self, ctx: &CallContext, input: I, op: F) -> Result<O, CloudError>
    where
        F: FnOnce(CallContext, I) -> Fut + Send + 'a,
        Fut: Future<Output = Result<O, CloudError>> + Send + 'a,
    {
        let record = &self.record;
        let last: Next<'a, I, O> = Box::new(move |ctx: CallContext, input: I| {
            async move {
                let outcome = op(ctx, input.clone()).await;
                record.push(input, outcome.clone());
                outcome
            }
            .boxed()
        });

        let outcome = dispatch(self.chain(), 0, ctx.clone(), input, last).await;
        match &outcome {
            Ok(_) => self.succeeded.fetch_add(1, Ordering::SeqCst),
            Err(_) => self.failed.fetch_add(1, Ordering::SeqCst),
        };
        debug!(
            operation = self.name,
            correlation_id = %ctx.correlation_id,
            ok = outcome.is_ok(),
            "invoked"
        );
        outcome
    }

    /// Install a behavior as the innermost of those already installed.
    ///
    /// # Panics
    /// When a behavior with the same name is already installed.
    pub fn install(&self, behavior: impl Behavior<I, O> + 'static) {
        self.install_arc(Arc::new(behavior))
    }

    /// Like [`install`](Self::install) for a shared behavior, so the caller
    /// can keep a handle to it.
    pub fn install_arc(&self, behavior: Arc<dyn Behavior<I, O>>) {
        let mut behaviors = self.lock();
        let duplicate = behaviors.iter().any(|b| b.name() == behavior.name());
        if duplicate {
            drop(behaviors);
            panic!(
                "behavior '{}' is already installed on operation '{}'",
                behavior.name(),
                self.name
            );
        }
        behaviors.push(behavior);
    }

    /// Remove a behavior by name; returns whether one was installed.
    pub fn remove(&self, name: &str) -> bool {
        let mut behaviors = self.lock();
        let before = behaviors.len();
        behaviors.retain(|b| b.name() != name);
        behaviors.len() != before
    }

    pub fn behavior_names(&self) -> Vec<String> {
        self.lock().iter().map(|b| b.name().to_string()).collect()
    }

    pub fn clear_behaviors(&self) {
        self.lock().clear();
    }

    /// Drop every behavior, recorded call and counter. Behaviors are reset
    /// first, so handles a test still holds (a recorder's call record) come
    /// back empty too.
    pub fn reset(&self) {
        let removed: Vec<_> = self.lock().drain(..).collect();
        for behavior in &removed {
            behavior.reset();
        }
        self.record.clear();
        self.succeeded.store(0, Ordering::SeqCst);
        self.failed.store(0, Ordering::SeqCst);
    }

    /// Calls that reached the store operation.
    pub fn calls(&self) -> &CallRecord<I, O> {
        &self.record
    }

    pub fn successful_calls(&self) -> usize {
        self.succeeded.load(Ordering::SeqCst)
    }

    pub fn failed_calls(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    fn chain(&self) -> Chain<I, O> {
        self.lock().iter().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<dyn Behavior<I, O>>>> {
        self.behaviors.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn dispatch<'a, I, O>(
    chain: Chain<I, O>,
    index: usize,
    ctx: CallContext,
    input: I,
    last: Next<'a, I, O>,
) -> BoxFuture<'a, Result<O, CloudError>>
where
    I: Send + 'static,
    O: Send + 'static,
{
    let current = chain.get(index).cloned();
    match current {
        None => last(ctx, input),
        Some(behavior) => async move {
            let next: Next<'a, I, O> = Box::new(move |ctx: CallContext, input: I| {
                dispatch(chain, index + 1, ctx, input, last)
            });
            behavior.around(ctx, input, next).await
        }
        .boxed(),
    }
}

impl<I, O> fmt::Debug for Operation<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("succeeded", &self.succeeded.load(Ordering::SeqCst))
            .field("failed", &self.failed.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use async_trait::async_trait;

    use super::*;
    use crate::behavior::{InjectFault, MutateOutput, RecordCalls};

    async fn double(op: &Operation<u32, u32>, input: u32) -> Result<u32, CloudError> {
        op.invoke(&CallContext::new(), input, |_, n| async move { Ok(n * 2) }).await
    }

    /// Appends its tag to the input so tests can observe ordering.
    struct Tag(&'static str, u32);

    #[async_trait]
    impl Behavior<u32, u32> for Tag {
        fn name(&self) -> &str {
            self.0
        }

        async fn around(&self, ctx: CallContext, input: u32, next: Next<'_, u32, u32>) -> Result<u32, CloudError> {
            next(ctx, input * 10 + self.1).await
        }
    }

    #[tokio::test]
    async fn no_behaviors_runs_the_operation() {
        let op = Operation::new("double");
        assert_eq!(double(&op, 4).await.unwrap(), 8);
        assert_eq!(op.calls().len(), 1);
        assert_eq!(op.successful_calls(), 1);
    }

    #[tokio::test]
    async fn first_installed_runs_outermost() {
        let op = Operation::new("double");
        op.install(Tag("a", 1));
        op.install(Tag("b", 2));
        // a sees 0 -> 1, b sees 1 -> 12, op doubles.
        assert_eq!(double(&op, 0).await.unwrap(), 24);
        assert_eq!(op.calls().pop().unwrap().input, 12);
    }

    #[tokio::test]
    async fn fault_hides_call_from_inner_layers() {
        let op = Operation::new("double");
        let recorder = RecordCalls::new();
        let seen = recorder.record();
        op.install(InjectFault::status(500, "InternalError", "boom"));
        op.install(recorder);

        let err = double(&op, 1).await.unwrap_err();
        assert_eq!(err.status(), 500);
        assert!(seen.is_empty());
        assert!(op.calls().is_empty());
        assert_eq!(op.failed_calls(), 1);

        assert!(op.remove("inject-fault"));
        double(&op, 1).await.unwrap();
        assert_eq!(seen.len(), 1);
    }

    #[tokio::test]
    async fn mutation_does_not_reach_inner_record() {
        let op = Operation::new("double");
        op.install(MutateOutput::new(|out: &mut u32| *out += 1));
        assert_eq!(double(&op, 2).await.unwrap(), 5);
        assert_eq!(op.calls().pop().unwrap().outcome, Ok(4));
    }

    #[test]
    #[should_panic(expected = "already installed")]
    fn duplicate_names_panic() {
        let op: Operation<u32, u32> = Operation::new("double");
        op.install(Tag("same", 1));
        op.install(Tag("same", 2));
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let op = Operation::new("double");
        op.install(Tag("a", 1));
        double(&op, 1).await.unwrap();
        op.reset();
        assert!(op.behavior_names().is_empty());
        assert!(op.calls().is_empty());
        assert_eq!(op.successful_calls(), 0);
    }

    #[tokio::test]
    async fn reset_empties_installed_recorders() {
        let op = Operation::new("double");
        let recorder = RecordCalls::new();
        let seen = recorder.record();
        op.install(recorder);
        double(&op, 1).await.unwrap();
        assert_eq!(seen.len(), 1);

        op.reset();
        assert!(seen.is_empty());
    }

    #[tokio::test]
    async fn operation_may_borrow_caller_state() {
        let op = Operation::new("flag");
        let flag = AtomicBool::new(false);
        let ran = &flag;
        op.invoke(&CallContext::new(), 1u32, |_, n| async move {
            ran.store(true, Ordering::SeqCst);
            Ok(n)
        })
        .await
        .unwrap();
        assert!(flag.load(Ordering::SeqCst));
    }
}
