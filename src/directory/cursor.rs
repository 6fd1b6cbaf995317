use futures_util::stream::{self, BoxStream, Stream, StreamExt};

use crate::context::RequestContext;
use crate::error::AuthzResult;

/// Lazy, finite, non-restartable result sequence returned by a directory
/// search. The underlying server cursor lives inside the stream and is
/// released when the `Cursor` is dropped, whichever way the consumer exits.
pub struct Cursor<T> {
    name: &'static str,
    inner: BoxStream<'static, AuthzResult<T>>,
    received: usize,
}

impl<T: Send + 'static> Cursor<T> {
    pub fn new<S>(name: &'static str, stream: S) -> Self
    where
        S: Stream<Item = AuthzResult<T>> + Send + 'static,
    {
        Self { name, inner: stream.boxed(), received: 0 }
    }

    pub fn from_vec(name: &'static str, items: Vec<T>) -> Self {
        Self::new(name, stream::iter(items.into_iter().map(Ok)))
    }

    pub fn empty(name: &'static str) -> Self { Self::from_vec(name, Vec::new()) }

    pub async fn next(&mut self) -> Option<AuthzResult<T>> {
        let item = self.inner.next().await;
        if matches!(item, Some(Ok(_))) { self.received += 1; }
        item
    }

    /// Read until the end of the stream or the first error.
    pub async fn collect_all(mut self, ctx: &RequestContext) -> AuthzResult<Vec<T>> {
        let mut out = Vec::new();
        loop {
            let next = ctx.run(self.name, async { Ok(self.next().await) }).await?;
            match next {
                Some(item) => out.push(item?),
                None => break,
            }
        }
        Ok(out)
    }

    /// Take the first item and release the cursor.
    pub async fn first(mut self, ctx: &RequestContext) -> AuthzResult<Option<T>> {
        match ctx.run(self.name, async { Ok(self.next().await) }).await? {
            Some(item) => Ok(Some(item?)),
            None => Ok(None),
        }
    }
}

impl<T> Drop for Cursor<T> {
    fn drop(&mut self) {
        tracing::trace!(target: "idm_access::directory", "cursor {} released after {} items", self.name, self.received);
    }
}
