//! In-memory item store.

use dashmap::DashMap;

use crate::store::item::Item;
use crate::store::{ItemStore, StoreError};

/// Items kept in process memory, keyed by id.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    items: DashMap<String, Item>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl ItemStore for InMemoryStore {
    fn get(&self, id: &str) -> Result<Item, StoreError> {
        self.items
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn get_all(&self) -> Result<Vec<Item>, StoreError> {
        Ok(self.items.iter().map(|entry| entry.value().clone()).collect())
    }

    fn upsert(&self, item: Item) -> Result<Item, StoreError> {
        self.items.insert(item.id.clone(), item.clone());
        Ok(item)
    }

    fn remove(&self, id: &str) -> Result<(), StoreError> {
        self.items.remove(id);
        Ok(())
    }
}
