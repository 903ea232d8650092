pub mod health;
pub mod websocket;

// Re-export all handlers for easy route registration
pub use health::{health_handler, health_live_handler, metrics_handler, online_handler};
pub use websocket::chat_websocket_handler;
