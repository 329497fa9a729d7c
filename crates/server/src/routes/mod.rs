//! HTTP route handlers for the checkout server.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                 - Liveness
//! GET    /health/ready           - Readiness (store reachable)
//!
//! # Cart (user)
//! GET    /cart                   - Cart with total
//! POST   /cart/items             - Add item {product_id, quantity}
//! PATCH  /cart/items/{item_id}   - Update quantity {quantity}
//! DELETE /cart/items/{item_id}   - Remove item
//! DELETE /cart                   - Clear cart
//!
//! # Orders
//! POST   /orders                 - Checkout {shipping_address} (user)
//! GET    /orders                 - Own orders, newest first (user)
//! GET    /orders/admin/all       - All orders (admin)
//! GET    /orders/{id}            - One order (owner or admin)
//! PATCH  /orders/{id}/status     - Update status {status} (admin)
//! PATCH  /orders/{id}/cancel     - Cancel own order (user)
//! ```

pub mod cart;
pub mod orders;

use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::from_fn,
    routing::{get, patch, post},
};
use tower_http::trace::TraceLayer;

use crate::middleware::request_id_middleware;
use crate::state::AppState;
use crate::store::CommerceStore;

/// Create the cart routes router.
pub fn cart_routes<S: CommerceStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/", get(cart::show::<S>).delete(cart::clear::<S>))
        .route("/items", post(cart::add_item::<S>))
        .route(
            "/items/{item_id}",
            patch(cart::update_item::<S>).delete(cart::remove_item::<S>),
        )
}

/// Create the order routes router.
pub fn order_routes<S: CommerceStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/", post(orders::create::<S>).get(orders::list_own::<S>))
        .route("/admin/all", get(orders::list_all::<S>))
        .route("/{id}", get(orders::show::<S>))
        .route("/{id}/status", patch(orders::update_status::<S>))
        .route("/{id}/cancel", patch(orders::cancel::<S>))
}

/// Build the full application router with tracing and request IDs.
pub fn app<S: CommerceStore>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness::<S>))
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
            )
        }))
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness<S: CommerceStore>(State(state): State<AppState<S>>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Method, header},
        response::Response,
    };
    use chrono::Utc;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use checkout_core::{Money, Product, ProductId, User, UserId, UserRole};

    use super::*;
    use crate::middleware::identity::{USER_ID_HEADER, USER_ROLE_HEADER};
    use crate::middleware::request_id::REQUEST_ID_HEADER;
    use crate::services::StatusPolicy;
    use crate::store::MemoryStore;

    struct TestApp {
        store: MemoryStore,
        router: Router,
    }

    impl TestApp {
        fn new() -> Self {
            let store = MemoryStore::new();
            let router = app(AppState::new(store.clone(), StatusPolicy::Permissive));
            Self { store, router }
        }

        async fn user(&self, role: UserRole) -> UserId {
            let user = User {
                id: UserId::new_v4(),
                email: format!("{}@example.com", UserId::new_v4()),
                first_name: "Robin".to_owned(),
                last_name: "Route".to_owned(),
                role,
                created_at: Utc::now(),
            };
            let id = user.id;
            self.store.insert_user(user).await;
            id
        }

        async fn product(&self, cents: u32, stock: i32) -> ProductId {
            let product = Product {
                id: ProductId::new_v4(),
                name: "Coconut".to_owned(),
                description: String::new(),
                price: Money::from_cents(cents),
                stock,
                is_active: true,
            };
            let id = product.id;
            self.store.insert_product(product).await;
            id
        }

        async fn send(
            &self,
            method: Method,
            uri: &str,
            who: Option<(UserId, UserRole)>,
            body: Option<Value>,
        ) -> Response {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some((id, role)) = who {
                builder = builder
                    .header(USER_ID_HEADER, id.to_string())
                    .header(USER_ROLE_HEADER, role.as_str());
            }
            let body = match body {
                Some(json) => {
                    builder = builder.header(header::CONTENT_TYPE, "application/json");
                    Body::from(json.to_string())
                }
                None => Body::empty(),
            };
            self.router
                .clone()
                .oneshot(builder.body(body).unwrap())
                .await
                .unwrap()
        }
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let app = TestApp::new();
        let response = app.send(Method::GET, "/health", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));

        let response = app.send(Method::GET, "/health/ready", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cart_requires_identity() {
        let app = TestApp::new();
        let response = app.send(Method::GET, "/cart", None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_add_item_and_checkout() {
        let app = TestApp::new();
        let user = (app.user(UserRole::User).await, UserRole::User);
        let product = app.product(1000, 5).await;

        let response = app
            .send(
                Method::POST,
                "/cart/items",
                Some(user),
                Some(json!({ "product_id": product, "quantity": 2 })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let cart = json_body(response).await;
        assert_eq!(cart["total"], "20.00");
        assert_eq!(cart["item_count"], 2);

        let response = app
            .send(
                Method::POST,
                "/orders",
                Some(user),
                Some(json!({ "shipping_address": "1 Route Rd" })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let order = json_body(response).await;
        assert_eq!(order["status"], "pending");
        assert_eq!(order["total_amount"], "20.00");
        assert_eq!(app.store.stock_of(product).await, Some(3));
    }

    #[tokio::test]
    async fn test_zero_quantity_is_bad_request() {
        let app = TestApp::new();
        let user = (app.user(UserRole::User).await, UserRole::User);
        let product = app.product(1000, 5).await;

        let response = app
            .send(
                Method::POST,
                "/cart/items",
                Some(user),
                Some(json!({ "product_id": product, "quantity": 0 })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_insufficient_stock_is_conflict() {
        let app = TestApp::new();
        let user = (app.user(UserRole::User).await, UserRole::User);
        let product = app.product(1000, 1).await;

        let response = app
            .send(
                Method::POST,
                "/cart/items",
                Some(user),
                Some(json!({ "product_id": product, "quantity": 2 })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_empty_cart_checkout_is_bad_request() {
        let app = TestApp::new();
        let user = (app.user(UserRole::User).await, UserRole::User);
        let response = app
            .send(
                Method::POST,
                "/orders",
                Some(user),
                Some(json!({ "shipping_address": "addr" })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "cart is empty");
    }

    #[tokio::test]
    async fn test_admin_routes_and_visibility() {
        let app = TestApp::new();
        let owner = (app.user(UserRole::User).await, UserRole::User);
        let stranger = (app.user(UserRole::User).await, UserRole::User);
        let admin = (app.user(UserRole::Admin).await, UserRole::Admin);
        let product = app.product(500, 5).await;

        app.send(
            Method::POST,
            "/cart/items",
            Some(owner),
            Some(json!({ "product_id": product, "quantity": 1 })),
        )
        .await;
        let order = json_body(
            app.send(
                Method::POST,
                "/orders",
                Some(owner),
                Some(json!({ "shipping_address": "addr" })),
            )
            .await,
        )
        .await;
        let order_uri = format!("/orders/{}", order["id"].as_str().unwrap());

        let response = app.send(Method::GET, &order_uri, Some(stranger), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = app.send(Method::GET, &order_uri, Some(admin), None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .send(Method::GET, "/orders/admin/all", Some(owner), None)
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let response = app
            .send(Method::GET, "/orders/admin/all", Some(admin), None)
            .await;
        assert_eq!(json_body(response).await.as_array().unwrap().len(), 1);

        let response = app
            .send(
                Method::PATCH,
                &format!("{order_uri}/status"),
                Some(admin),
                Some(json!({ "status": "shipped" })),
            )
            .await;
        assert_eq!(json_body(response).await["status"], "shipped");

        let response = app
            .send(Method::PATCH, &format!("{order_uri}/cancel"), Some(owner), None)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cancel_by_non_owner_is_forbidden() {
        let app = TestApp::new();
        let owner = (app.user(UserRole::User).await, UserRole::User);
        let stranger = (app.user(UserRole::User).await, UserRole::User);
        let product = app.product(500, 5).await;

        app.send(
            Method::POST,
            "/cart/items",
            Some(owner),
            Some(json!({ "product_id": product, "quantity": 3 })),
        )
        .await;
        let order = json_body(
            app.send(
                Method::POST,
                "/orders",
                Some(owner),
                Some(json!({ "shipping_address": "addr" })),
            )
            .await,
        )
        .await;
        let cancel_uri = format!("/orders/{}/cancel", order["id"].as_str().unwrap());

        let response = app.send(Method::PATCH, &cancel_uri, Some(stranger), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app.send(Method::PATCH, &cancel_uri, Some(owner), None).await;
        assert_eq!(json_body(response).await["status"], "cancelled");
        assert_eq!(app.store.stock_of(product).await, Some(5));
    }
}
