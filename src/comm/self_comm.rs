use crate::catalog_errors::CatalogError;

use super::{missing_broadcast_value, Communicator};

/// A group of exactly one worker, which is also the coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelfComm;

impl Communicator for SelfComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn gather<T>(&self, value: T) -> Result<Option<Vec<T>>, CatalogError>
    where
        T: Clone + Send + Sync + 'static,
    {
        Ok(Some(vec![value]))
    }

    fn broadcast<T>(&self, value: Option<T>) -> Result<T, CatalogError>
    where
        T: Clone + Send + Sync + 'static,
    {
        value.ok_or_else(missing_broadcast_value)
    }
}
