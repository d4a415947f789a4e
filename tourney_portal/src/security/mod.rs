//! Security module providing login rate limiting.
//!
//! Failed logins are counted per endpoint and client key (normally the
//! remote IP). Once a key reaches the limit it is locked out; with
//! exponential backoff each consecutive lockout doubles, up to 32x the base.
//!
//! - **Admin login**: 5 failures per 5 minutes, 15-minute base lockout
//! - **Portal login**: 10 failures per 5 minutes, 5-minute base lockout
//!
//! ## Example
//!
//! ```no_run
//! use tourney_portal::security::{ADMIN_LOGIN, RateLimiter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let limiter = RateLimiter::new();
//!     let result = limiter.check(ADMIN_LOGIN, "192.168.1.1").await?;
//!
//!     if result.is_allowed() {
//!         // ... attempt login; on failure:
//!         limiter.record_failure(ADMIN_LOGIN, "192.168.1.1").await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod rate_limiter;

pub use errors::{RateLimitError, RateLimiterResult};
pub use rate_limiter::{ADMIN_LOGIN, PORTAL_LOGIN, RateLimitConfig, RateLimitResult, RateLimiter};
