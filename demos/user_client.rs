//! Demo client for the `User` service started by `user_server`.
//!
//! ```text
//! cargo run --example user_client [addr]
//! ```

use serde::{Deserialize, Serialize};
use wirecall::protocol::Compression;
use wirecall::Client;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Info {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Id")]
    id: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| wirecall::config::DEFAULT_ADDRESS.to_string());

    let client = Client::builder()
        .compression(Compression::Lz4)
        .connect(&addr)
        .await?;

    let info: Info = client.call("User.GetUserInfoById", (1u64,)).await?;
    println!("GetUserInfoById(1) = {info:?}");

    let ids: Vec<u64> = client.call("User.GetUserIds", ()).await?;
    println!("GetUserIds() = {ids:?}");

    match client.call::<_, Info>("User.GetUserInfoById", (99u64,)).await {
        Ok(info) => println!("GetUserInfoById(99) = {info:?}"),
        Err(e) => println!("GetUserInfoById(99) failed: {e}"),
    }

    let say_hello = client.stub::<(String,), String>("User.SayHello")?;
    let handles: Vec<_> = (0..10)
        .map(|i| {
            let say_hello = say_hello.clone();
            tokio::spawn(async move { say_hello.call((format!("hello #{i}"),)).await })
        })
        .collect();

    for handle in handles {
        println!("SayHello -> {}", handle.await??);
    }

    client.close().await;
    Ok(())
}
