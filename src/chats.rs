pub mod api;
mod handlers;
mod models;

pub use handlers::router;
pub use models::ChatMessage;
