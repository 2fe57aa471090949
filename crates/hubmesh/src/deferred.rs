//! Values that become known later.
//!
//! A node's public host, for instance, only exists once whatever created the
//! machine reports it. [`Deferred`] wraps such a value as a cloneable,
//! memoized future: every clone observes the same outcome, and derived values
//! are built with [`Deferred::map`], [`Deferred::try_map`], [`Deferred::zip`]
//! and [`Deferred::join_all`] instead of being computed eagerly.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::ResolveError;

type Inner<T> = Shared<BoxFuture<'static, Result<T, ResolveError>>>;

/// A lazily resolved, shareable value.
pub struct Deferred<T> {
    label: Arc<str>,
    inner: Inner<T>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            label: Arc::clone(&self.label),
            inner: self.inner.clone(),
        }
    }
}

impl<T> Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn build(label: Arc<str>, fut: BoxFuture<'static, Result<T, ResolveError>>) -> Self {
        Self {
            label,
            inner: fut.shared(),
        }
    }

    /// A value that is already known.
    pub fn ready(label: impl Into<String>, value: T) -> Self {
        Self::build(Arc::from(label.into()), future::ready(Ok(value)).boxed())
    }

    /// A value supplied later through the returned [`Resolver`].
    ///
    /// If the resolver is dropped first, every observer gets
    /// [`ResolveError::Dropped`].
    pub fn channel(label: impl Into<String>) -> (Resolver<T>, Self) {
        let label: Arc<str> = Arc::from(label.into());
        let (tx, rx) = oneshot::channel();
        let missing = Arc::clone(&label);
        let fut = async move {
            rx.await.map_err(|_| ResolveError::Dropped {
                label: missing.to_string(),
            })
        };
        let resolver = Resolver {
            label: Arc::clone(&label),
            tx,
        };
        (resolver, Self::build(label, fut.boxed()))
    }

    /// A value produced by an arbitrary future.
    pub fn from_future<F>(label: impl Into<String>, fut: F) -> Self
    where
        F: Future<Output = Result<T, ResolveError>> + Send + 'static,
    {
        Self::build(Arc::from(label.into()), fut.boxed())
    }

    /// Label used in resolution errors.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Derives a new value once this one resolves.
    pub fn map<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let inner = self.inner.clone();
        Deferred::build(Arc::clone(&self.label), async move { inner.await.map(f) }.boxed())
    }

    /// Derives a new value with a fallible transform.
    ///
    /// A transform error resolves to [`ResolveError::Failed`] under `label`.
    pub fn try_map<U, E, F>(&self, label: impl Into<String>, f: F) -> Deferred<U>
    where
        U: Clone + Send + Sync + 'static,
        E: fmt::Display,
        F: FnOnce(T) -> Result<U, E> + Send + 'static,
    {
        let label: Arc<str> = Arc::from(label.into());
        let failed_as = Arc::clone(&label);
        let inner = self.inner.clone();
        let fut = async move {
            let value = inner.await?;
            f(value).map_err(|e| ResolveError::failed(failed_as.as_ref(), e))
        };
        Deferred::build(label, fut.boxed())
    }

    /// Pairs this value with another; resolves when both have.
    pub fn zip<U>(&self, other: &Deferred<U>) -> Deferred<(T, U)>
    where
        U: Clone + Send + Sync + 'static,
    {
        let left = self.inner.clone();
        let right = other.inner.clone();
        let label = format!("({}, {})", self.label, other.label);
        let fut = async move {
            let (a, b) = future::join(left, right).await;
            Ok::<_, ResolveError>((a?, b?))
        };
        Deferred::build(Arc::from(label), fut.boxed())
    }

    /// Collects many values, preserving order; fails on the first failure.
    pub fn join_all(
        label: impl Into<String>,
        items: impl IntoIterator<Item = Self>,
    ) -> Deferred<Vec<T>> {
        let inners: Vec<Inner<T>> = items.into_iter().map(|d| d.inner).collect();
        Deferred::build(
            Arc::from(label.into()),
            async move { future::try_join_all(inners).await }.boxed(),
        )
    }

    /// Waits for the value.
    pub async fn resolve(&self) -> Result<T, ResolveError> {
        self.inner.clone().await
    }

    /// Returns the outcome if it is available without waiting.
    #[must_use]
    pub fn now(&self) -> Option<Result<T, ResolveError>> {
        self.inner.clone().now_or_never()
    }
}

impl<T: fmt::Debug + Clone> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Deferred");
        s.field("label", &self.label);
        match self.inner.peek() {
            Some(Ok(value)) => s.field("value", value),
            Some(Err(err)) => s.field("error", err),
            None => s.field("value", &"<pending>"),
        };
        s.finish()
    }
}

/// Write side of [`Deferred::channel`].
pub struct Resolver<T> {
    label: Arc<str>,
    tx: oneshot::Sender<T>,
}

impl<T> Resolver<T> {
    /// Supplies the value to every observer.
    pub fn resolve(self, value: T) {
        if self.tx.send(value).is_err() {
            debug!(label = %self.label, "value resolved with no observers left");
        }
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver").field("label", &self.label).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ready_value_resolves_immediately() {
        let host = Deferred::ready("host", "203.0.113.7".to_string());
        assert_eq!(host.now(), Some(Ok("203.0.113.7".to_string())));
        assert_eq!(host.resolve().await, Ok("203.0.113.7".to_string()));
    }

    #[tokio::test]
    async fn channel_value_is_pending_until_resolved() {
        let (resolver, host) = Deferred::<String>::channel("hub-a.host");
        let endpoint = host.map(|h| format!("{h}:55121"));
        assert!(endpoint.now().is_none());

        resolver.resolve("198.51.100.4".into());
        assert_eq!(endpoint.resolve().await, Ok("198.51.100.4:55121".to_string()));
        assert_eq!(host.now(), Some(Ok("198.51.100.4".to_string())));
    }

    #[tokio::test]
    async fn dropped_resolver_fails_every_observer() {
        let (resolver, host) = Deferred::<String>::channel("hub-a.host");
        let endpoint = host.map(|h| format!("{h}:55121"));
        drop(resolver);

        let expected = ResolveError::Dropped {
            label: "hub-a.host".into(),
        };
        assert_eq!(host.resolve().await, Err(expected.clone()));
        assert_eq!(endpoint.resolve().await, Err(expected));
    }

    #[tokio::test]
    async fn resolution_happens_in_any_order() {
        let (ra, a) = Deferred::<u16>::channel("a");
        let (rb, b) = Deferred::<u16>::channel("b");
        let both = Deferred::join_all("both", [a.clone(), b.clone()]);
        let zipped = a.zip(&b);

        rb.resolve(2);
        assert!(both.now().is_none());
        ra.resolve(1);

        assert_eq!(both.resolve().await, Ok(vec![1, 2]));
        assert_eq!(zipped.resolve().await, Ok((1, 2)));
    }

    #[tokio::test]
    async fn try_map_failure_is_labelled() {
        let port = Deferred::ready("port", "not-a-port".to_string());
        let parsed = port.try_map("port.parsed", |p| p.parse::<u16>());
        let result = parsed.resolve().await;
        assert!(
            matches!(&result, Err(ResolveError::Failed { label, .. }) if label == "port.parsed"),
            "unexpected {result:?}"
        );
    }

    #[tokio::test]
    async fn join_all_preserves_order() {
        let items = (0..5).map(|i| Deferred::ready(format!("n{i}"), i));
        let joined = Deferred::join_all("numbers", items);
        assert_eq!(joined.resolve().await, Ok(vec![0, 1, 2, 3, 4]));
    }

    #[tokio::test]
    async fn resolver_can_cross_tasks() {
        let (resolver, host) = Deferred::<String>::channel("host");
        let task = tokio::spawn(async move { resolver.resolve("10.0.0.1".into()) });
        assert_eq!(host.resolve().await, Ok("10.0.0.1".to_string()));
        task.await.expect("join");
    }

    #[test]
    fn debug_shows_pending() {
        let (_resolver, host) = Deferred::<String>::channel("host");
        assert!(format!("{host:?}").contains("<pending>"));
    }
}
