//! Shop RPC service: CRUD on items.
//!
//! Transport agnostic; `http::routes` maps each method onto a route and
//! `http::response` turns `RpcError` into a status code.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::store::{CreateItemRequest, Empty, Item, ItemId, ItemStore, ItemsList, StoreError};

/// RPC status codes surfaced to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcCode {
    NotFound,
    InvalidArgument,
    Internal,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{code:?}: {message}")]
pub struct RpcError {
    pub code: RpcCode,
    pub message: String,
}

impl RpcError {
    pub fn new(code: RpcCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(RpcCode::InvalidArgument, message)
    }
}

impl From<StoreError> for RpcError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => RpcError::new(RpcCode::NotFound, err.to_string()),
            StoreError::Unavailable(_) => RpcError::new(RpcCode::Internal, err.to_string()),
        }
    }
}

/// Item CRUD on top of an `ItemStore`.
#[derive(Clone)]
pub struct ShopService {
    store: Arc<dyn ItemStore>,
}

impl ShopService {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }

    pub fn get_all(&self, _req: Empty) -> Result<ItemsList, RpcError> {
        tracing::info!("Get all items request");
        Ok(ItemsList {
            items: self.store.get_all()?,
        })
    }

    pub fn get(&self, req: ItemId) -> Result<Item, RpcError> {
        tracing::info!(id = %req.id, "Get item request");
        Ok(self.store.get(&req.id)?)
    }

    pub fn create(&self, req: CreateItemRequest) -> Result<Item, RpcError> {
        tracing::info!(name = %req.name, price = req.price, "Create item request");
        validate_fields(&req.name, req.price)?;

        let item = Item {
            id: Uuid::new_v4().to_string(),
            name: req.name,
            price: req.price,
        };
        Ok(self.store.upsert(item)?)
    }

    pub fn update(&self, item: Item) -> Result<Item, RpcError> {
        tracing::info!(id = %item.id, name = %item.name, price = item.price, "Update item request");
        validate_fields(&item.name, item.price)?;

        match self.store.get(&item.id) {
            Ok(_) => {}
            Err(StoreError::NotFound(_)) => {
                return Err(RpcError::invalid_argument(format!(
                    "Item with id '{}' doesn't exist.",
                    item.id
                )))
            }
            Err(e) => return Err(e.into()),
        }
        Ok(self.store.upsert(item)?)
    }

    pub fn remove(&self, req: ItemId) -> Result<Empty, RpcError> {
        tracing::info!(id = %req.id, "Remove item request");
        self.store.remove(&req.id)?;
        Ok(Empty {})
    }
}

fn validate_fields(name: &str, price: f64) -> Result<(), RpcError> {
    if name.trim().is_empty() {
        return Err(RpcError::invalid_argument("name must not be empty"));
    }
    if !price.is_finite() || price < 0.0 {
        return Err(RpcError::invalid_argument(format!("invalid price {price}")));
    }
    Ok(())
}
