//! Minimal end-to-end wiring: config, file store, login, one protected call.
//!
//! Run against a live backend:
//!
//! ```text
//! WARDGATE_BASE_URL=https://host/api/v1 cargo run --example login_flow -- alice secret
//! ```

use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use wardgate_client::{
    ApiClient, ApiRequest, ClientConfig, FileStore, HttpTransport, SessionEvent, SessionManager,
    UserInfo,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = ClientConfig::default();
    if let Ok(base) = std::env::var("WARDGATE_BASE_URL") {
        config.base_url = base
            .parse()
            .context("WARDGATE_BASE_URL is not a valid URL")?;
    }

    let mut args = std::env::args().skip(1);
    let usage = "usage: login_flow <username> <password>";
    let username = args.next().context(usage)?;
    let password = args.next().context(usage)?;

    let store = Arc::new(FileStore::open(config.credentials_file()).await?);
    let transport = Arc::new(HttpTransport::new(&config)?);
    let client = Arc::new(ApiClient::new(transport, store));
    let session = SessionManager::new(client.clone());

    let mut events = session.subscribe();
    tokio::spawn(async move {
        while let Ok(SessionEvent::Ended(reason)) = events.recv().await {
            tracing::warn!(?reason, "session ended");
        }
    });

    let user = session.login(&username, &password).await?;
    tracing::info!(username = %user.username, role = %user.role, "login succeeded");

    let me: UserInfo = client.send(ApiRequest::get("/auth/current")).await?;
    println!(
        "logged in as {} <{}>",
        me.username,
        me.email.unwrap_or_default()
    );

    session.logout().await?;
    Ok(())
}
