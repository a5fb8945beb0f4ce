//! Wave-batched execution of an evolving set of asynchronous operations.
//!
//! Each poll of [`BatchIterator`] starts every pending operation and waits for
//! the whole wave to settle before yielding one [`Batch`]. Operations added
//! with [`BatchIterator::add`] while a wave is being consumed start in the
//! next wave, never in the current one.

use futures::FutureExt;
use futures::Stream;
use futures::future::BoxFuture;
use futures::future::join_all;
use std::future::Future;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

/// Outcomes of one wave, partitioned by success.
#[derive(Debug)]
pub struct Batch<T, E> {
    pub results: Vec<T>,
    pub errors: Vec<E>,
}

pub struct BatchIterator<T, E> {
    pending: Vec<BoxFuture<'static, Result<T, E>>>,
    inflight: Option<BoxFuture<'static, Vec<Result<T, E>>>>,
    waves: usize,
}

impl<T, E> BatchIterator<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn new<I, F>(operations: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        let mut batches = Self {
            pending: Vec::new(),
            inflight: None,
            waves: 0,
        };
        for operation in operations {
            batches.add(operation);
        }
        batches
    }

    /// Queue an operation for the next wave. Operations are lazy futures, so
    /// nothing is started until that wave begins.
    pub fn add<F>(&mut self, operation: F)
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.pending.push(operation.boxed());
    }

    /// Number of waves yielded so far.
    pub fn waves(&self) -> usize {
        self.waves
    }

    pub fn is_exhausted(&self) -> bool {
        self.pending.is_empty() && self.inflight.is_none()
    }
}

impl<T, E> Stream for BatchIterator<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    type Item = Batch<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.inflight.is_none() && !this.pending.is_empty() {
            let wave = std::mem::take(&mut this.pending);
            this.inflight = Some(join_all(wave).boxed());
        }
        let Some(inflight) = this.inflight.as_mut() else {
            return Poll::Ready(None);
        };

        let outcomes = match inflight.as_mut().poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(outcomes) => outcomes,
        };
        this.inflight = None;
        this.waves += 1;

        let mut batch = Batch {
            results: Vec::new(),
            errors: Vec::new(),
        };
        for outcome in outcomes {
            match outcome {
                Ok(result) => batch.results.push(result),
                Err(err) => batch.errors.push(err),
            }
        }
        Poll::Ready(Some(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<String>>>;

    async fn op(log: Log, name: &'static str, millis: u64) -> Result<&'static str, String> {
        log.lock().unwrap().push(format!("start {name}"));
        tokio::time::sleep(Duration::from_millis(millis)).await;
        if name.starts_with("fail") {
            return Err(format!("{name} failed"));
        }
        Ok(name)
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_batch_per_wave() {
        let log = Log::default();
        let mut batches = BatchIterator::new(vec![
            op(log.clone(), "a", 30),
            op(log.clone(), "b", 10),
            op(log.clone(), "fail-c", 20),
        ]);

        let batch = batches.next().await.unwrap();
        assert_eq!(batch.results, vec!["a", "b"]);
        assert_eq!(batch.errors, vec!["fail-c failed".to_string()]);
        assert!(batches.is_exhausted());
        assert!(batches.next().await.is_none());
        assert_eq!(batches.waves(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_added_operation_starts_in_next_wave() {
        let log = Log::default();
        let mut batches = BatchIterator::new(vec![op(log.clone(), "first", 10)]);

        let batch = batches.next().await.unwrap();
        assert_eq!(batch.results, vec!["first"]);
        batches.add(op(log.clone(), "follow-up", 10));
        assert_eq!(*log.lock().unwrap(), vec!["start first".to_string()]);

        let batch = batches.next().await.unwrap();
        assert_eq!(batch.results, vec!["follow-up"]);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["start first".to_string(), "start follow-up".to_string()]
        );
        assert!(batches.next().await.is_none());
        assert_eq!(batches.waves(), 2);
    }

    #[tokio::test]
    async fn test_empty_iterator_terminates() {
        let mut batches: BatchIterator<(), String> =
            BatchIterator::new(Vec::<futures::future::Ready<Result<(), String>>>::new());
        assert!(batches.next().await.is_none());
        assert_eq!(batches.waves(), 0);
    }
}
