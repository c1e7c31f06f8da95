use tokio::sync::watch;

/// Observable value: readers take snapshots, subscribers are woken on change.
#[derive(Debug)]
pub struct Store<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone + PartialEq> Store<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn snapshot(&self) -> T {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    /// Apply `f`; subscribers are notified only if the value changed.
    /// Returns whether it changed.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        self.tx.send_if_modified(|value| {
            let before = value.clone();
            f(value);
            *value != before
        })
    }
}
