//! A small observable-value abstraction used to back the routing tables
//! (spec §4.5, Design Note "Reactive maps"). `Reactive<T>` wraps a
//! `tokio::sync::watch` channel: `update`/`set` publish a new value only if
//! it differs from the current one (the "equal successive values are
//! suppressed" distinctness rule), and `subscribe` hands out a receiver a
//! derived map can await `changed()` on.

use tokio::sync::watch;

pub struct Reactive<T> {
    tx: std::sync::Arc<watch::Sender<T>>,
    rx: watch::Receiver<T>,
}

impl<T> Clone for Reactive<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> Reactive<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(initial: T) -> Self {
        let (tx, rx) = watch::channel(initial);
        Self {
            tx: std::sync::Arc::new(tx),
            rx,
        }
    }

    pub fn get_snapshot(&self) -> T {
        self.rx.borrow().clone()
    }

    /// Replaces the value with `f(current)`, publishing only if it changed.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        self.tx.send_if_modified(|current| {
            let next = f(current);
            let changed = next != *current;
            if changed {
                *current = next;
            }
            changed
        });
    }

    /// Publishes `value` if it differs from the current value.
    pub fn set(&self, value: T) {
        self.tx.send_if_modified(|current| {
            let changed = *current != value;
            if changed {
                *current = value;
            }
            changed
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.rx.clone()
    }
}

/// Derives a `Reactive<C>` from two reactive inputs: recomputes `combine`
/// whenever either input changes and republishes, subject to the same
/// distinctness filter as [`Reactive::set`]. The background task exits
/// once both inputs (and therefore the derived value) are dropped.
pub fn combine_latest<A, B, C>(
    a: &Reactive<A>,
    b: &Reactive<B>,
    combine: impl Fn(&A, &B) -> C + Send + Sync + 'static,
) -> Reactive<C>
where
    A: Clone + PartialEq + Send + Sync + 'static,
    B: Clone + PartialEq + Send + Sync + 'static,
    C: Clone + PartialEq + Send + Sync + 'static,
{
    let derived = Reactive::new(combine(&a.get_snapshot(), &b.get_snapshot()));
    let published = derived.clone();

    let mut a_rx = a.subscribe();
    let mut b_rx = b.subscribe();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                r = a_rx.changed() => if r.is_err() { break },
                r = b_rx.changed() => if r.is_err() { break },
            }
            let next = combine(&a_rx.borrow(), &b_rx.borrow());
            published.set(next);
        }
    });

    derived
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn equal_successive_updates_are_suppressed() {
        let r = Reactive::new(1);
        let mut rx = r.subscribe();
        r.set(1); // no change: must not trigger a notification
        r.set(2); // change

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 2);
        // Nothing further was published after the single real change.
        assert!(rx.has_changed().is_ok_and(|changed| !changed));
    }

    #[tokio::test]
    async fn combine_latest_recomputes_and_drops_missing_intermediates() {
        let a = Reactive::new(std::collections::HashMap::from([("x", 1)]));
        let b = Reactive::new(std::collections::HashMap::from([(1, "endpoint-a")]));

        let derived = combine_latest(&a, &b, |a, b| {
            a.iter()
                .filter_map(|(k, v)| b.get(v).map(|ep| (*k, *ep)))
                .collect::<std::collections::HashMap<_, _>>()
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(derived.get_snapshot().get("x"), Some(&"endpoint-a"));

        // Break the intermediate lookup: "x" now maps to a node with no
        // known endpoint, so the derived entry should disappear.
        a.set(std::collections::HashMap::from([("x", 2)]));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(derived.get_snapshot().get("x").is_none());
    }
}
