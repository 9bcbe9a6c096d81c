use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

mod shop;

pub use shop::{OrderView, ProductView, Rejected, Rejection, Shop, ShopConfig};

pub const PATH_PRODUCTS: &str = "/api/products";
pub const PATH_PRODUCT: &str = "/api/products/{id}";
pub const PATH_POPULAR: &str = "/api/products/popular";
pub const PATH_CARTS: &str = "/api/carts";
pub const PATH_CHARGE: &str = "/api/point/charge";
pub const PATH_ORDERS: &str = "/api/orders";
pub const PATH_COUPON_ISSUE: &str = "/api/coupons/{id}/issue";

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    saw_json_content_type: Arc<AtomicU64>,
}

impl TestServerStats {
    fn observe(&self, headers: &HeaderMap) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.to_ascii_lowercase().starts_with("application/json"))
        {
            self.saw_json_content_type.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn saw_json_content_type(&self) -> u64 {
        self.saw_json_content_type.load(Ordering::Relaxed)
    }
}

#[derive(Clone)]
struct AppState {
    shop: Arc<Shop>,
    stats: TestServerStats,
}

impl AppState {
    async fn enter(&self, headers: &HeaderMap) {
        self.stats.observe(headers);
        let latency = self.shop.config().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

type Reply = (StatusCode, Json<Value>);

fn ok(body: Value) -> Reply {
    (StatusCode::OK, Json(body))
}

fn message(status: StatusCode, message: &str) -> Reply {
    let mut body = serde_json::Map::new();
    body.insert("message".to_string(), Value::String(message.to_string()));
    (status, Json(Value::Object(body)))
}

fn rejected(r: &Rejected) -> Reply {
    let status = match r.kind {
        Rejection::NotFound => StatusCode::NOT_FOUND,
        Rejection::Duplicate => StatusCode::CONFLICT,
        Rejection::Exhausted | Rejection::Invalid => StatusCode::BAD_REQUEST,
    };
    message(status, r.message)
}

fn reply<T: Serialize>(res: Result<T, Rejected>) -> Reply {
    match res.map(serde_json::to_value) {
        Ok(Ok(v)) => ok(v),
        Ok(Err(_)) => message(StatusCode::INTERNAL_SERVER_ERROR, "encode error"),
        Err(r) => rejected(&r),
    }
}

#[derive(Debug, Serialize)]
struct ProductPage {
    page: u64,
    size: u64,
    items: Vec<ProductView>,
}

#[derive(Debug, Serialize)]
struct PopularProducts {
    items: Vec<ProductView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CartView {
    user_id: u64,
    lines: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BalanceView {
    user_id: u64,
    balance: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IssuedCoupon {
    user_coupon_id: u64,
    coupon_id: u64,
}

#[derive(Debug, Deserialize)]
struct UserQuery {
    #[serde(rename = "userId")]
    user_id: u64,
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default)]
    page: u64,
    #[serde(default = "default_page_size")]
    size: u64,
}

fn default_page_size() -> u64 {
    20
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartRequest {
    product_option_id: u64,
    quantity: u64,
}

#[derive(Debug, Deserialize)]
struct ChargeRequest {
    amount: i64,
}

async fn handle_products(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<PageQuery>,
) -> Reply {
    state.enter(&headers).await;
    reply(Ok(ProductPage {
        page: q.page,
        size: q.size,
        items: state.shop.products(q.page, q.size),
    }))
}

async fn handle_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Reply {
    state.enter(&headers).await;
    reply(state.shop.product(id))
}

async fn handle_popular(State(state): State<AppState>, headers: HeaderMap) -> Reply {
    state.enter(&headers).await;
    reply(Ok(PopularProducts {
        items: state.shop.popular(5),
    }))
}

async fn handle_cart_add(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(user): Query<UserQuery>,
    Json(req): Json<CartRequest>,
) -> Reply {
    state.enter(&headers).await;
    reply(
        state
            .shop
            .add_to_cart(user.user_id, req.product_option_id, req.quantity)
            .map(|lines| CartView {
                user_id: user.user_id,
                lines,
            }),
    )
}

async fn handle_charge(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(user): Query<UserQuery>,
    Json(req): Json<ChargeRequest>,
) -> Reply {
    state.enter(&headers).await;
    reply(
        state
            .shop
            .charge(user.user_id, req.amount)
            .map(|balance| BalanceView {
                user_id: user.user_id,
                balance,
            }),
    )
}

async fn handle_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(user): Query<UserQuery>,
) -> Reply {
    state.enter(&headers).await;
    reply(state.shop.place_order(user.user_id))
}

async fn handle_coupon_issue(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(coupon_id): Path<u64>,
    Query(user): Query<UserQuery>,
) -> Reply {
    state.enter(&headers).await;
    reply(
        state
            .shop
            .issue_coupon(coupon_id, user.user_id)
            .map(|user_coupon_id| IssuedCoupon {
                user_coupon_id,
                coupon_id,
            }),
    )
}

pub fn router(shop: Arc<Shop>, stats: TestServerStats) -> Router {
    Router::new()
        .route(PATH_PRODUCTS, get(handle_products))
        .route(PATH_POPULAR, get(handle_popular))
        .route(PATH_PRODUCT, get(handle_product))
        .route(PATH_CARTS, post(handle_cart_add))
        .route(PATH_CHARGE, post(handle_charge))
        .route(PATH_ORDERS, post(handle_order))
        .route(PATH_COUPON_ISSUE, post(handle_coupon_issue))
        .with_state(AppState { shop, stats })
}

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    shop: Arc<Shop>,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(ShopConfig::default()).await
    }

    pub async fn start_with(config: ShopConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let shop = Arc::new(Shop::new(config));
        let stats = TestServerStats::default();
        let app = router(shop.clone(), stats.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            shop,
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn shop(&self) -> &Shop {
        &self.shop
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
