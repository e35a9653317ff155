use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use parking_lot::{Condvar, Mutex};

use crate::{catalog_errors::CatalogError, constants::COORDINATOR_RANK};

use super::{missing_broadcast_value, Communicator};

type Payload = Box<dyn Any + Send + Sync>;

/// In-process worker group: one [`ThreadComm`] per thread, all sharing a rendezvous.
///
/// Each collective is an all-to-all exchange: every rank deposits its value, the last rank
/// to arrive publishes the full set and wakes the others. A generation counter separates
/// successive collectives, so a fast worker can enter the next call while slower ones are
/// still reading the previous result.
///
/// A worker of [`ThreadComm::run`] that panics poisons the group: pending and later
/// collectives on the other workers fail with [`CatalogError::Communication`] instead of
/// waiting forever.
#[derive(Debug, Clone)]
pub struct ThreadComm {
    rank: usize,
    shared: Arc<Rendezvous>,
}

#[derive(Debug)]
struct Rendezvous {
    size: usize,
    state: Mutex<ExchangeState>,
    cond: Condvar,
}

struct ExchangeState {
    generation: u64,
    arrived: usize,
    pending: Vec<Option<Payload>>,
    published: Arc<Vec<Payload>>,
    poisoned: bool,
}

impl std::fmt::Debug for ExchangeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeState")
            .field("generation", &self.generation)
            .field("arrived", &self.arrived)
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}

impl ThreadComm {
    /// Create the `size` communicators of a new group, ordered by rank.
    pub fn group(size: usize) -> Vec<ThreadComm> {
        let size = size.max(1);
        let shared = Arc::new(Rendezvous {
            size,
            state: Mutex::new(ExchangeState {
                generation: 0,
                arrived: 0,
                pending: (0..size).map(|_| None).collect(),
                published: Arc::new(Vec::new()),
                poisoned: false,
            }),
            cond: Condvar::new(),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }

    /// Run `task` on `size` scoped threads, one per rank, and return the results by rank.
    ///
    /// A panicking worker poisons the group, so the others leave their collectives with an
    /// error, and the panic is then re-raised on the calling thread.
    pub fn run<F, R>(size: usize, task: F) -> Vec<R>
    where
        F: Fn(ThreadComm) -> R + Sync,
        R: Send,
    {
        let task = &task;
        std::thread::scope(|scope| {
            let handles: Vec<_> = ThreadComm::group(size)
                .into_iter()
                .map(|comm| {
                    scope.spawn(move || {
                        let shared = Arc::clone(&comm.shared);
                        panic::catch_unwind(AssertUnwindSafe(|| task(comm))).unwrap_or_else(
                            |payload| {
                                shared.poison();
                                panic::resume_unwind(payload)
                            },
                        )
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|e| panic::resume_unwind(e)))
                .collect()
        })
    }

    fn exchange(&self, value: Payload) -> Result<Arc<Vec<Payload>>, CatalogError> {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        if state.poisoned {
            return Err(poisoned_group());
        }

        state.pending[self.rank] = Some(value);
        state.arrived += 1;
        let generation = state.generation;

        if state.arrived == shared.size {
            let values = state.pending.iter_mut().filter_map(Option::take).collect();
            state.published = Arc::new(values);
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            shared.cond.notify_all();
        } else {
            while state.generation == generation && !state.poisoned {
                shared.cond.wait(&mut state);
            }
            if state.generation == generation {
                return Err(poisoned_group());
            }
        }
        Ok(Arc::clone(&state.published))
    }
}

impl Rendezvous {
    fn poison(&self) {
        self.state.lock().poisoned = true;
        self.cond.notify_all();
    }
}

fn poisoned_group() -> CatalogError {
    CatalogError::Communication("a worker of the group panicked".into())
}

fn downcast<T: Clone + 'static>(payload: &Payload) -> Result<T, CatalogError> {
    (**payload).downcast_ref::<T>().cloned().ok_or_else(|| {
        CatalogError::Communication(
            "workers issued mismatched collective calls (payload type differs)".into(),
        )
    })
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn gather<T>(&self, value: T) -> Result<Option<Vec<T>>, CatalogError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let all = self.exchange(Box::new(value))?;
        if !self.role().is_coordinator() {
            return Ok(None);
        }
        all.iter()
            .map(downcast::<T>)
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    fn broadcast<T>(&self, value: Option<T>) -> Result<T, CatalogError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let value = if self.role().is_coordinator() {
            value
        } else {
            None
        };
        let all = self.exchange(Box::new(value))?;
        let root = all.get(COORDINATOR_RANK).ok_or_else(missing_broadcast_value)?;
        downcast::<Option<T>>(root)?.ok_or_else(missing_broadcast_value)
    }
}
