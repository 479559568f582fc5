pub mod handlers;
pub mod rate_limit;
pub mod routes;

pub use handlers::AppState;
pub use rate_limit::FixedWindowLimiter;
pub use routes::api_routes;
