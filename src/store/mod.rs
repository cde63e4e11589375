//! Item storage.
//!
//! `ItemStore` is the seam between the RPC service and the backend; the
//! only backend shipped is the in-memory map.

pub mod item;
pub mod memory;

use thiserror::Error;

pub use item::{CreateItemRequest, Empty, Item, ItemId, ItemsList};
pub use memory::InMemoryStore;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// CRUD over items.
#[cfg_attr(test, mockall::automock)]
pub trait ItemStore: Send + Sync {
    fn get(&self, id: &str) -> Result<Item, StoreError>;
    fn get_all(&self) -> Result<Vec<Item>, StoreError>;
    fn upsert(&self, item: Item) -> Result<Item, StoreError>;
    /// Removing an absent id is not an error.
    fn remove(&self, id: &str) -> Result<(), StoreError>;
}
