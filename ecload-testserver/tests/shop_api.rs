use bytes::Bytes;
use ecload_http::{HttpClient, HttpRequest, HttpResponse};
use ecload_testserver::{ShopConfig, TestServer};

async fn post_json(client: &HttpClient, url: String, body: &'static str) -> HttpResponse {
    client
        .request(
            HttpRequest::post(url, Bytes::from_static(body.as_bytes()))
                .with_header("content-type", "application/json"),
        )
        .await
        .unwrap_or_else(|e| panic!("request failed: {e}"))
}

#[tokio::test]
async fn coupon_endpoint_signals_duplicates_and_sell_out() -> anyhow::Result<()> {
    let server = TestServer::start_with(ShopConfig::default().with_coupon_quantity(1)).await?;
    let client = HttpClient::default();
    let base = server.base_url();

    let first = post_json(&client, format!("{base}/api/coupons/1/issue?userId=1"), "").await;
    assert_eq!(first.status, 200);

    let again = post_json(&client, format!("{base}/api/coupons/1/issue?userId=1"), "").await;
    assert_eq!(again.status, 409);
    assert!(again.body_utf8().unwrap_or_default().contains("already"));

    let late = post_json(&client, format!("{base}/api/coupons/1/issue?userId=2"), "").await;
    assert_eq!(late.status, 400);
    assert!(late.body_utf8().unwrap_or_default().contains("sold out"));

    assert_eq!(server.shop().coupons_issued(1), 1);
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn order_flow_charges_fills_cart_and_orders() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let client = HttpClient::default();
    let base = server.base_url();

    let charged = post_json(
        &client,
        format!("{base}/api/point/charge?userId=9"),
        r#"{"amount":1000000}"#,
    )
    .await;
    assert_eq!(charged.status, 200);

    let carted = post_json(
        &client,
        format!("{base}/api/carts?userId=9"),
        r#"{"productOptionId":2,"quantity":1}"#,
    )
    .await;
    assert_eq!(carted.status, 200);

    let ordered = post_json(
        &client,
        format!("{base}/api/orders?userId=9"),
        r#"{"userCouponId":null}"#,
    )
    .await;
    assert_eq!(ordered.status, 200, "{:?}", ordered.body_utf8());
    assert_eq!(server.shop().orders_placed(), 1);
    assert_eq!(server.shop().stock_left(2), 999);

    let empty = post_json(
        &client,
        format!("{base}/api/orders?userId=9"),
        r#"{"userCouponId":null}"#,
    )
    .await;
    assert_eq!(empty.status, 400);

    assert_eq!(server.stats().requests_total(), 4);
    assert_eq!(server.stats().saw_json_content_type(), 4);
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn product_routes_serve_catalogue() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let client = HttpClient::default();
    let base = server.base_url();

    let list = client.get(&format!("{base}/api/products?page=0&size=20")).await?;
    assert_eq!(list.status, 200);
    let list: serde_json::Value = serde_json::from_slice(&list.body)?;
    assert_eq!(list["items"].as_array().map(Vec::len), Some(5));

    let popular = client.get(&format!("{base}/api/products/popular")).await?;
    assert_eq!(popular.status, 200);

    let detail = client.get(&format!("{base}/api/products/3")).await?;
    assert_eq!(detail.status, 200);

    let missing = client.get(&format!("{base}/api/products/42")).await?;
    assert_eq!(missing.status, 404);

    server.shutdown().await;
    Ok(())
}
