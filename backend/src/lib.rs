//! Task manager backend: a CRUD REST API over task records stored in SQLite.

pub mod config;
pub mod error;
pub mod routes;
pub mod service;
pub mod store;

pub use routes::{router, serve, SharedService};
pub use service::TaskService;
