//! # Collective communication
//!
//! The tracer catalog runs as a fixed group of workers executing the same program, which
//! only synchronize at explicit collective calls. This module defines the capability the
//! catalog consumes, [`Communicator`], and two implementations:
//!
//! * [`SelfComm`] – a group of one; every collective is a local no-op.
//! * [`ThreadComm`] – an in-process group of threads, one communicator per thread.
//!
//! ## Blocking semantics
//! -----------------
//! Every collective is a barrier: all workers must issue the same collective calls, in the
//! same order, the same number of times. Callers keep collective calls unconditional and
//! never guard one behind a predicate that can differ between workers. A collective never
//! times out; a worker that stops participating blocks the group forever.
//!
//! ## Coordinator
//! -----------------
//! One rank, [`COORDINATOR_RANK`], computes global parameters. Code asks for its
//! [`Role`] through [`Communicator::role`] instead of comparing ranks by hand.
mod self_comm;
mod thread_comm;

pub use self_comm::SelfComm;
pub use thread_comm::ThreadComm;

use crate::{catalog_errors::CatalogError, constants::COORDINATOR_RANK};

/// Role of a worker in a coordinator-computes, everyone-waits exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Coordinator,
    Worker,
}

impl Role {
    pub fn from_rank(rank: usize) -> Self {
        if rank == COORDINATOR_RANK {
            Role::Coordinator
        } else {
            Role::Worker
        }
    }

    #[inline]
    pub fn is_coordinator(self) -> bool {
        self == Role::Coordinator
    }
}

/// Collective operations over a fixed group of workers.
pub trait Communicator {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    fn role(&self) -> Role {
        Role::from_rank(self.rank())
    }

    /// Collect one value from every worker onto the coordinator.
    ///
    /// Return
    /// ----------
    /// * `Some(values)` ordered by rank on the coordinator, `None` elsewhere.
    fn gather<T>(&self, value: T) -> Result<Option<Vec<T>>, CatalogError>
    where
        T: Clone + Send + Sync + 'static;

    /// Hand the coordinator's value to every worker.
    ///
    /// The coordinator passes `Some(value)`, other workers pass `None` (anything they pass
    /// is ignored). Every worker receives a clone of the coordinator's value, bit for bit.
    ///
    /// Return
    /// ----------
    /// * The coordinator's value, or [`CatalogError::Communication`] on every worker if the
    ///   coordinator itself passed `None`.
    fn broadcast<T>(&self, value: Option<T>) -> Result<T, CatalogError>
    where
        T: Clone + Send + Sync + 'static;
}

pub(crate) fn missing_broadcast_value() -> CatalogError {
    CatalogError::Communication("the coordinator did not provide a value to broadcast".into())
}

impl<M: Communicator + ?Sized> Communicator for &M {
    fn rank(&self) -> usize {
        (**self).rank()
    }

    fn size(&self) -> usize {
        (**self).size()
    }

    fn gather<T>(&self, value: T) -> Result<Option<Vec<T>>, CatalogError>
    where
        T: Clone + Send + Sync + 'static,
    {
        (**self).gather(value)
    }

    fn broadcast<T>(&self, value: Option<T>) -> Result<T, CatalogError>
    where
        T: Clone + Send + Sync + 'static,
    {
        (**self).broadcast(value)
    }
}
