mod error_handler;
mod rate_limit;

pub use error_handler::{REQUEST_ID_HEADER, log_errors};
pub use rate_limit::{
    HEADER_LIMIT, HEADER_REMAINING, HEADER_RESET, RateLimiter, rate_limit,
};
