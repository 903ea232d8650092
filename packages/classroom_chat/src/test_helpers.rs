use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::AppState;
use crate::config::{ServerConfig, ServerFileConfig};
use crate::metrics::ServerMetrics;
use crate::router::ChannelRegistry;

/// Build an `AppState` with default router config and an empty registry.
pub fn test_app_state() -> AppState {
    test_app_state_with(ServerFileConfig::default())
}

pub fn test_app_state_with(file_config: ServerFileConfig) -> AppState {
    AppState {
        registry: Arc::new(ChannelRegistry::new()),
        server_config: Arc::new(ServerConfig::from_file(&file_config)),
        metrics: Arc::new(ServerMetrics::new()),
    }
}

/// A router serving on an ephemeral localhost port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(ServerFileConfig::default()).await
    }

    pub async fn start_with(file_config: ServerFileConfig) -> Self {
        let state = test_app_state_with(file_config);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let app = crate::build_app(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("test server");
        });
        Self { addr, state }
    }

    /// Channel base address for clients.
    pub fn ws_base(&self) -> String {
        format!("ws://{}/ws/chat", self.addr)
    }
}

/// Poll `check` until it holds or the timeout elapses.
pub async fn wait_until<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
