//! Collapses concurrent identical searches into one underlying execution.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared, WeakShared};

struct Slot<T> {
    generation: u64,
    future: WeakShared<BoxFuture<'static, T>>,
}

/// Key → shared future map.
///
/// The map only holds weak handles: once every waiter has gone away the
/// underlying future is dropped and its entry removed, just as when it
/// completes.
pub struct InFlight<T: Clone> {
    entries: Arc<DashMap<String, Slot<T>>>,
    generations: AtomicU64,
}

/// Whether the caller started the work or joined an execution already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participation {
    Leader,
    Joined,
}

impl<T> Default for InFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> InFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            generations: AtomicU64::new(0),
        }
    }

    /// Await the execution registered under `key`, starting `make_future` if none is running.
    pub async fn run<F, Fut>(&self, key: &str, make_future: F) -> (T, Participation)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (shared, participation) = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => match occupied.get().future.upgrade() {
                Some(shared) => (shared, Participation::Joined),
                None => {
                    let (generation, shared) = self.start(key, make_future);
                    match shared.downgrade() {
                        Some(future) => {
                            occupied.insert(Slot { generation, future });
                        }
                        None => {
                            occupied.remove();
                        }
                    }
                    (shared, Participation::Leader)
                }
            },
            Entry::Vacant(vacant) => {
                let (generation, shared) = self.start(key, make_future);
                if let Some(future) = shared.downgrade() {
                    vacant.insert(Slot { generation, future });
                }
                (shared, Participation::Leader)
            }
        };

        (shared.await, participation)
    }

    /// Number of executions currently registered.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn start<F, Fut>(&self, key: &str, make_future: F) -> (u64, Shared<BoxFuture<'static, T>>)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let guard = InFlightGuard {
            key: key.to_string(),
            generation,
            entries: Arc::clone(&self.entries),
        };
        let work = make_future();
        let shared = async move {
            let _guard = guard;
            work.await
        }
        .boxed()
        .shared();

        (generation, shared)
    }
}

/// Removes the map entry when the shared execution finishes or is dropped.
struct InFlightGuard<T> {
    key: String,
    generation: u64,
    entries: Arc<DashMap<String, Slot<T>>>,
}

impl<T> Drop for InFlightGuard<T> {
    fn drop(&mut self) {
        self.entries
            .remove_if(&self.key, |_, slot| slot.generation == self.generation);
    }
}
