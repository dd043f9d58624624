pub mod rate_limit;
pub mod regions;
pub mod server;
pub mod spectator;
pub mod subjects;

pub use server::{build_router, run_api_server, ApiState};
