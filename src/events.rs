pub mod api;
mod handlers;
mod models;
pub mod service;

pub use handlers::router;
pub use models::Event;

#[cfg(test)]
pub use models::test_draft;
