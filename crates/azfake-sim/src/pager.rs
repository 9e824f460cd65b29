use std::fmt;
use std::future::Future;
use std::sync::Arc;

use azfake_domain::CloudError;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::context::CallContext;
use crate::operation::Operation;

type Fetch<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<Vec<T>, CloudError>> + Send + Sync>;

/// One page of a list response.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub value: Vec<T>,
    /// Continuation marker; `None` on the last page.
    pub next_link: Option<String>,
}

/// Lazy, finite, restartable pager over a list result.
///
/// Nothing is read until the first [`next_page`](Pager::next_page). That call
/// takes a snapshot of the matching resources; later pages are served from
/// the same snapshot, so writes made while paging are not observed.
/// [`reset`](Pager::reset) drops the snapshot and starts over.
pub struct Pager<T> {
    fetch: Fetch<T>,
    page_size: usize,
    items: Option<Vec<T>>,
    cursor: usize,
}

impl<T: Clone + Send + 'static> Pager<T> {
    pub fn new(
        page_size: usize,
        fetch: impl Fn() -> BoxFuture<'static, Result<Vec<T>, CloudError>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            fetch: Arc::new(fetch),
            page_size: page_size.max(1),
            items: None,
            cursor: 0,
        }
    }

    /// Pager whose snapshot is produced by running `op` on `input`, so list
    /// calls go through the same behaviors and call record as any other call.
    pub fn through<I, F, Fut>(
        page_size: usize,
        op: Arc<Operation<I, Vec<T>>>,
        ctx: &CallContext,
        input: I,
        fetch: F,
    ) -> Self
    where
        T: Sync,
        I: Clone + Send + Sync + 'static,
        F: Fn(I) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<T>, CloudError>> + Send + 'static,
    {
        let ctx = ctx.clone();
        Self::new(page_size, move || {
            let op = op.clone();
            let ctx = ctx.clone();
            let input = input.clone();
            let fetch = fetch.clone();
            async move { op.invoke(&ctx, input, move |_, input| fetch(input)).await }.boxed()
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Whether another call to `next_page` will return a page.
    pub fn more(&self) -> bool {
        match &self.items {
            None => true,
            Some(items) => self.cursor < items.len(),
        }
    }

    /// Next page, or `None` once the pager is exhausted. The first page of
    /// an empty result is an empty page.
    pub async fn next_page(&mut self) -> Result<Option<Page<T>>, CloudError> {
        if !self.more() {
            return Ok(None);
        }
        let items = match self.items.take() {
            Some(items) => items,
            None => (self.fetch)().await?,
        };
        let end = (self.cursor + self.page_size).min(items.len());
        let value = items[self.cursor..end].to_vec();
        self.cursor = end;
        let next_link = (end < items.len()).then(|| format!("$skiptoken={}", end));
        self.items = Some(items);
        Ok(Some(Page { value, next_link }))
    }

    /// Forget the snapshot; the next page re-reads the store.
    pub fn reset(&mut self) {
        self.items = None;
        self.cursor = 0;
    }

    /// Drain every remaining page.
    pub async fn collect_all(&mut self) -> Result<Vec<T>, CloudError> {
        let mut all = Vec::new();
        while let Some(page) = self.next_page().await? {
            all.extend(page.value);
        }
        Ok(all)
    }
}

impl<T> fmt::Debug for Pager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pager")
            .field("page_size", &self.page_size)
            .field("fetched", &self.items.is_some())
            .field("cursor", &self.cursor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting(items: Vec<u32>, fetches: Arc<AtomicUsize>) -> Pager<u32> {
        Pager::new(2, move || {
            fetches.fetch_add(1, Ordering::SeqCst);
            let items = items.clone();
            async move { Ok(items) }.boxed()
        })
    }

    #[tokio::test]
    async fn pages_are_lazy_and_finite() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let mut pager = counting(vec![1, 2, 3, 4, 5], fetches.clone());
        assert_eq!(fetches.load(Ordering::SeqCst), 0);

        let first = pager.next_page().await.unwrap().unwrap();
        assert_eq!(first.value, vec![1, 2]);
        assert!(first.next_link.is_some());
        assert_eq!(pager.collect_all().await.unwrap(), vec![3, 4, 5]);
        assert!(!pager.more());
        assert!(pager.next_page().await.unwrap().is_none());
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reset_refetches() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let mut pager = counting(vec![1], fetches.clone());
        assert_eq!(pager.collect_all().await.unwrap(), vec![1]);
        pager.reset();
        assert!(pager.more());
        assert_eq!(pager.collect_all().await.unwrap(), vec![1]);
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_result_yields_one_empty_page() {
        let mut pager = counting(Vec::new(), Arc::new(AtomicUsize::new(0)));
        let page = pager.next_page().await.unwrap().unwrap();
        assert!(page.value.is_empty());
        assert!(page.next_link.is_none());
        assert!(!pager.more());
    }

    #[tokio::test]
    async fn failed_fetch_can_be_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let mut pager = Pager::new(10, move || {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(CloudError::injected(503, "ServiceUnavailable", "try again"))
                } else {
                    Ok(vec![7u32])
                }
            }
            .boxed()
        });
        assert!(pager.next_page().await.is_err());
        assert_eq!(pager.collect_all().await.unwrap(), vec![7]);
    }
}
