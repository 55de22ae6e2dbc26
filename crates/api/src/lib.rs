pub mod access;
pub mod dto;
pub mod error;
pub mod extract;
pub mod metrics;
pub mod routes;

pub use routes::{build_router, ApiState};
