//! Paths and JSON payloads of the shop API.

use bytes::Bytes;
use ecload_core::RequestSpec;
use serde::Serialize;

pub const PRODUCT_PAGE_SIZE: u64 = 20;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CartAdd {
    product_option_id: u64,
    quantity: u64,
}

#[derive(Debug, Serialize)]
struct Charge {
    amount: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderCreate {
    user_coupon_id: Option<u64>,
}

fn json_body<T: Serialize>(payload: &T) -> Bytes {
    match serde_json::to_vec(payload) {
        Ok(v) => Bytes::from(v),
        Err(err) => {
            tracing::error!(error = %err, "failed to encode request payload");
            Bytes::new()
        }
    }
}

pub fn product_list(page: u64) -> RequestSpec {
    RequestSpec::get(format!(
        "/api/products?page={page}&size={PRODUCT_PAGE_SIZE}"
    ))
    .named("product_list")
}

pub fn product_detail(product_id: u64) -> RequestSpec {
    RequestSpec::get(format!("/api/products/{product_id}")).named("product_detail")
}

pub fn popular_products() -> RequestSpec {
    RequestSpec::get("/api/products/popular").named("popular_products")
}

pub fn cart_add(user_id: u64, product_option_id: u64, quantity: u64) -> RequestSpec {
    RequestSpec::post(format!("/api/carts?userId={user_id}"))
        .with_body(json_body(&CartAdd {
            product_option_id,
            quantity,
        }))
        .named("cart_add")
}

pub fn point_charge(user_id: u64, amount: u64) -> RequestSpec {
    RequestSpec::post(format!("/api/point/charge?userId={user_id}"))
        .with_body(json_body(&Charge { amount }))
        .named("point_charge")
}

pub fn order_create(user_id: u64) -> RequestSpec {
    RequestSpec::post(format!("/api/orders?userId={user_id}"))
        .with_body(json_body(&OrderCreate {
            user_coupon_id: None,
        }))
        .named("order_create")
}

pub fn coupon_issue(coupon_id: u64, user_id: u64) -> RequestSpec {
    RequestSpec::post(format!("/api/coupons/{coupon_id}/issue?userId={user_id}"))
        .named("coupon_issue")
}
