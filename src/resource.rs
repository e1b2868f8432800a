//! A generic, single-flight supervised holder for a stateful value whose
//! creation may fail and must be retried (spec §4.3). Used to hold the
//! TCP socket behind a [`crate::channel::Channel`], but nothing here is
//! socket-specific.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::{Notify, RwLock};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const IDLE: u8 = 0;
const CREATING: u8 = 1;

/// What a recovery handler decided to do about an error observed by an
/// injected operation.
#[derive(Debug)]
pub enum RecoverAction<E> {
    /// Do nothing; the caller's retry loop will re-read the (unchanged)
    /// current value and try again.
    Ignore,
    /// Recreate the held value before retrying.
    Recreate,
    /// Give up: re-raise `E` to the caller. The handler owns the observed
    /// error and decides what to re-raise, e.g. wrapping it in a
    /// domain-specific "recovery refused" error kind instead of passing it
    /// through unchanged.
    Escalate(E),
}

type Creator<R, E> = Box<dyn Fn() -> BoxFuture<'static, Result<R, E>> + Send + Sync>;
type Handler<R, E> = Box<dyn Fn(Option<Arc<R>>, E) -> RecoverAction<E> + Send + Sync>;

struct Inner<R, E> {
    state: AtomicU8,
    value: RwLock<Option<Arc<R>>>,
    notify: Notify,
    creator: Creator<R, E>,
    handler: Handler<R, E>,
}

/// Holds a value of type `R`, recreating it on demand with at most one
/// concurrent creator task. `E` is the error type the creator and injected
/// operations can fail with.
pub struct RecoverableResource<R, E> {
    inner: Arc<Inner<R, E>>,
}

impl<R, E> Clone for RecoverableResource<R, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R, E> RecoverableResource<R, E>
where
    R: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn new<C, H>(creator: C, handler: H) -> Self
    where
        C: Fn() -> BoxFuture<'static, Result<R, E>> + Send + Sync + 'static,
        H: Fn(Option<Arc<R>>, E) -> RecoverAction<E> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                state: AtomicU8::new(IDLE),
                value: RwLock::new(None),
                notify: Notify::new(),
                creator: Box::new(creator),
                handler: Box::new(handler),
            }),
        }
    }

    /// The currently published value, if any has been created yet.
    pub async fn snapshot(&self) -> Option<Arc<R>> {
        self.inner.value.read().await.clone()
    }

    /// Whether `self` and `other` are handles onto the same underlying
    /// resource (not merely two resources holding equal values).
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Creates (or waits for an in-flight creation of) the held value.
    /// At most one creator runs at a time; overlapping callers all observe
    /// the same successor value.
    pub async fn create(&self) -> Result<Arc<R>, E> {
        loop {
            if self
                .inner
                .state
                .compare_exchange(IDLE, CREATING, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                let result = (self.inner.creator)().await;
                let outcome = match result {
                    Ok(v) => {
                        let arc = Arc::new(v);
                        *self.inner.value.write().await = Some(arc.clone());
                        Ok(arc)
                    }
                    Err(e) => Err(e),
                };
                self.inner.state.store(IDLE, Ordering::SeqCst);
                self.inner.notify.notify_waiters();
                return outcome;
            }

            // Someone else is creating. Register interest before
            // re-checking state, so a notify_waiters() landing in the gap
            // between the failed CAS and this wait is never lost.
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.inner.state.load(Ordering::SeqCst) == CREATING {
                notified.await;
            }

            if let Some(v) = self.snapshot().await {
                return Ok(v);
            }
            // The other creator failed and published nothing; loop back
            // and try to become the creator ourselves.
        }
    }

    /// Invokes the recovery handler with the current value and the
    /// observed error. `Recreate` triggers `create()`; `Escalate(e)`
    /// re-raises whatever error the handler decided to escalate as;
    /// `Ignore` returns without acting.
    pub async fn recover(&self, err: E) -> Result<(), E> {
        let current = self.snapshot().await;
        match (self.inner.handler)(current, err) {
            RecoverAction::Ignore => Ok(()),
            RecoverAction::Recreate => {
                self.create().await?;
                Ok(())
            }
            RecoverAction::Escalate(e) => Err(e),
        }
    }

    /// Runs `op` against the current (or freshly created) value; on
    /// failure, feeds the error to `recover` and retries against a fresh
    /// value. Retries are unbounded — termination relies on `recover`
    /// eventually returning `Escalate`.
    pub async fn inject<A, B, Op>(&self, op: Op, arg: A) -> Result<B, E>
    where
        A: Clone,
        Op: Fn(Arc<R>, A) -> BoxFuture<'static, Result<B, E>>,
    {
        loop {
            let value = match self.snapshot().await {
                Some(v) => v,
                None => self.create().await?,
            };

            match op(value, arg.clone()).await {
                Ok(b) => return Ok(b),
                Err(e) => self.recover(e).await?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Debug)]
    struct TestError;

    struct Generation(usize);

    #[tokio::test]
    async fn single_flight_recreate_settles_on_two_creations() {
        let creation_count = Arc::new(AtomicUsize::new(0));
        let cc = creation_count.clone();

        let resource: RecoverableResource<Generation, TestError> = RecoverableResource::new(
            move || {
                let cc = cc.clone();
                Box::pin(async move {
                    let gen = cc.fetch_add(1, Ordering::SeqCst) + 1;
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<_, TestError>(Generation(gen))
                })
            },
            |_current, _err: TestError| RecoverAction::Recreate,
        );

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let resource = resource.clone();
                tokio::spawn(async move {
                    resource
                        .inject(
                            |value, ()| -> BoxFuture<'static, Result<(), TestError>> {
                                Box::pin(async move {
                                    if value.0 == 1 {
                                        Err(TestError)
                                    } else {
                                        Ok(())
                                    }
                                })
                            },
                            (),
                        )
                        .await
                })
            })
            .collect();

        for t in tasks {
            t.await.unwrap().unwrap();
        }

        assert_eq!(creation_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn overlapping_creates_return_the_same_successor_value() {
        let creation_count = Arc::new(AtomicUsize::new(0));
        let cc = creation_count.clone();
        let resource: RecoverableResource<Generation, TestError> = RecoverableResource::new(
            move || {
                let cc = cc.clone();
                Box::pin(async move {
                    let gen = cc.fetch_add(1, Ordering::SeqCst) + 1;
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<_, TestError>(Generation(gen))
                })
            },
            |_current, _err: TestError| RecoverAction::Recreate,
        );

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let resource = resource.clone();
                tokio::spawn(async move { resource.create().await.map(|v| v.0) })
            })
            .collect();

        let mut results = Vec::new();
        for t in tasks {
            results.push(t.await.unwrap().unwrap());
        }

        assert!(results.iter().all(|&g| g == results[0]));
        assert_eq!(creation_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn escalate_propagates_the_handlers_chosen_error() {
        let resource: RecoverableResource<Generation, TestError> = RecoverableResource::new(
            || Box::pin(async { Ok::<_, TestError>(Generation(1)) }),
            |_current, err| RecoverAction::Escalate(err),
        );

        let result = resource
            .inject(
                |_value, ()| -> BoxFuture<'static, Result<(), TestError>> {
                    Box::pin(async { Err(TestError) })
                },
                (),
            )
            .await;

        assert!(result.is_err());
    }
}
