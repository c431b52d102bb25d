//! Demo server exposing a `User` service.
//!
//! ```text
//! RUST_LOG=debug cargo run --example user_server [addr]
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use wirecall::handler::{Object, Service};
use wirecall::Server;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Info {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Id")]
    id: u64,
}

struct UserService {
    users: HashMap<u64, Info>,
}

impl Object for UserService {
    fn service(self: Arc<Self>) -> Service {
        let ids = self.clone();
        let info = self;

        Service::new()
            .method("SayHello", |(greeting,): (String,)| async move {
                Ok::<_, String>(greeting)
            })
            .method("GetUserIds", move |(): ()| {
                let mut all: Vec<u64> = ids.users.keys().copied().collect();
                all.sort_unstable();
                async move { Ok::<_, String>(all) }
            })
            .method("GetUserInfoById", move |(id,): (u64,)| {
                let found = info.users.get(&id).cloned();
                async move { found.ok_or_else(|| format!("no user with id {id}")) }
            })
    }
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

    let users = (1..=5)
        .map(|id| (id, Info { name: "ss".to_string(), id }))
        .collect();
    let service = Arc::new(UserService { users }).service();

    let server = Server::builder()
        .address(addr)
        .register_by_name("User", service)
        .bind()
        .await?;

    tokio::signal::ctrl_c().await?;
    server.shutdown().await;
    Ok(())
}
