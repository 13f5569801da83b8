//! 出站调用的容错组件
//!
//! ```text
//! Gateway::execute
//!     → circuit_breaker.rs（OPEN 时直接拒绝）
//!     → retry.rs（指数退避重试，每次尝试都有超时）
//! ```

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{
    BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitOpenError,
    CircuitState, CircuitStats,
};
pub use retry::RetryPolicy;
