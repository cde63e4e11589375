//! RPC routes, one `POST` per service method.

use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::post,
    Json, Router,
};

use crate::observability::metrics;
use crate::service::{RpcError, ShopService};
use crate::store::{CreateItemRequest, Empty, Item, ItemId, ItemsList};

pub const SERVICE_PATH: &str = "/shop.ShopService";

/// Path of a method, e.g. `/shop.ShopService/Get`.
pub fn method_path(method: &str) -> String {
    format!("{SERVICE_PATH}/{method}")
}

pub fn rpc_router(service: ShopService) -> Router {
    Router::new()
        .route(&method_path("GetAll"), post(get_all))
        .route(&method_path("Get"), post(get))
        .route(&method_path("Create"), post(create))
        .route(&method_path("Update"), post(update))
        .route(&method_path("Remove"), post(remove))
        .route_layer(middleware::from_fn(track_rpc))
        .with_state(service)
}

// GetAll ignores its body so that both `{}` and an empty request work
async fn get_all(State(service): State<ShopService>) -> Result<Json<ItemsList>, RpcError> {
    service.get_all(Empty {}).map(Json)
}

async fn get(
    State(service): State<ShopService>,
    Json(req): Json<ItemId>,
) -> Result<Json<Item>, RpcError> {
    service.get(req).map(Json)
}

async fn create(
    State(service): State<ShopService>,
    Json(req): Json<CreateItemRequest>,
) -> Result<Json<Item>, RpcError> {
    service.create(req).map(Json)
}

async fn update(
    State(service): State<ShopService>,
    Json(item): Json<Item>,
) -> Result<Json<Item>, RpcError> {
    service.update(item).map(Json)
}

async fn remove(
    State(service): State<ShopService>,
    Json(req): Json<ItemId>,
) -> Result<Json<Empty>, RpcError> {
    service.remove(req).map(Json)
}

async fn track_rpc(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request
        .uri()
        .path()
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();

    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16(), start);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::RpcStatus;
    use crate::service::RpcCode;
    use crate::store::InMemoryStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request as HttpRequest, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        rpc_router(ShopService::new(Arc::new(InMemoryStore::new())))
    }

    async fn call(app: &Router, method: &str, body: &str) -> (StatusCode, Vec<u8>) {
        let request = HttpRequest::post(method_path(method))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn test_crud_round() {
        let app = app();

        let (status, body) = call(&app, "Create", r#"{"name":"apple","price":1.5}"#).await;
        assert_eq!(status, StatusCode::OK);
        let created: Item = serde_json::from_slice(&body).unwrap();
        assert_eq!(created.name, "apple");

        let (status, body) = call(&app, "Get", &format!(r#"{{"id":"{}"}}"#, created.id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(serde_json::from_slice::<Item>(&body).unwrap(), created);

        let update = Item {
            price: 2.0,
            ..created.clone()
        };
        let (status, _) = call(&app, "Update", &serde_json::to_string(&update).unwrap()).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&app, "GetAll", "{}").await;
        assert_eq!(status, StatusCode::OK);
        let list: ItemsList = serde_json::from_slice(&body).unwrap();
        assert_eq!(list.items, vec![update]);

        let (status, _) = call(&app, "Remove", &format!(r#"{{"id":"{}"}}"#, created.id)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&app, "Get", &format!(r#"{{"id":"{}"}}"#, created.id)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let err: RpcStatus = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.code, RpcCode::NotFound);
    }

    #[tokio::test]
    async fn test_update_unknown_item() {
        let (status, body) = call(&app(), "Update", r#"{"id":"nope","name":"x","price":1.0}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: RpcStatus = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.message, "Item with id 'nope' doesn't exist.");
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let (status, _) = call(&app(), "Explode", "{}").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
