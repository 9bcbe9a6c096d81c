use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ecload_testserver::{Shop, ShopConfig, TestServerStats};
use tokio::net::TcpListener;

fn value<T: std::str::FromStr>(flag: &str, raw: Option<String>) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    let raw = raw.ok_or_else(|| anyhow::anyhow!("{flag} requires a value"))?;
    raw.parse()
        .map_err(|e| anyhow::anyhow!("invalid value for {flag}: {raw} ({e})"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let mut bind_addr: SocketAddr = "127.0.0.1:0".parse()?;
    let mut config = ShopConfig::default();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bind" => bind_addr = value("--bind", args.next())?,
            "--coupon-quantity" => {
                config.coupon_quantity = value("--coupon-quantity", args.next())?;
            }
            "--stock" => config.option_stock = value("--stock", args.next())?,
            "--latency-ms" => {
                config.latency = Duration::from_millis(value("--latency-ms", args.next())?);
            }
            "-h" | "--help" => {
                eprintln!(
                    "ecload-testserver\n\nUSAGE:\n  ecload-testserver [--bind 127.0.0.1:0] [--coupon-quantity N] [--stock N] [--latency-ms N]\n\nOUTPUT:\n  Prints BASE_URL=<url> to stdout once ready."
                );
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("unknown argument: {other}"));
            }
        }
    }

    let listener = TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    let app = ecload_testserver::router(Arc::new(Shop::new(config)), TestServerStats::default());

    println!("BASE_URL=http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
