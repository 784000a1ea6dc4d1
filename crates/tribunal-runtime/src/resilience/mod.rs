//! Resilience patterns for tribunal-runtime.
//!
//! Per-provider circuit breaking. Failover across providers lives in
//! [`crate::router`], which owns the breaker.

mod circuit_breaker;

pub use circuit_breaker::{
    Admission, CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState,
};
