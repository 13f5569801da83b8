mod handler;

pub use handler::{HealthResponse, StatusResponse, health, status};
