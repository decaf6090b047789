pub mod api;
mod handlers;
mod resolver;

pub use handlers::router;
pub use resolver::ObjectResolver;

#[cfg(test)]
pub use resolver::FakeStore;
