pub mod api;
mod handlers;
mod models;

pub use handlers::router;
pub use models::User;
#[cfg(test)]
pub use models::unique_name;
