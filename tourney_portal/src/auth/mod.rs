//! Authentication module providing admin login, portal login links and
//! session management.
//!
//! This module implements:
//! - Argon2id password hashing with server-side pepper for admins
//! - Passwordless participant login through a per-participant identifier
//! - HS256 JWT session tokens (12 hours for admins, 30 days for participants)
//! - Role and tournament-assignment guards on the authenticated [`Principal`]
//!
//! ## Example
//!
//! ```no_run
//! use tourney_portal::auth::{AdminRole, AuthManager, NewAdmin};
//! use tourney_portal::db::Database;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     let auth = AuthManager::new(
//!         Arc::new(db.pool().clone()),
//!         "secret_pepper_value".to_string(),
//!         "session_secret_of_at_least_32_chars!".to_string(),
//!     );
//!
//!     let admin = auth
//!         .create_admin(
//!             None,
//!             NewAdmin {
//!                 email: "director@example.com".to_string(),
//!                 password: "Strikes4AndSpares".to_string(),
//!                 name: "Tournament Director".to_string(),
//!                 role: AdminRole::SuperAdmin,
//!             },
//!         )
//!         .await?;
//!     let (_, session) = auth.login_admin(&admin.email, "Strikes4AndSpares").await?;
//!     println!("Session expires at {}", session.expires_at);
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod guard;
pub mod manager;
pub mod models;
pub mod session;

pub use errors::{AuthError, AuthResult};
pub use manager::{AuthManager, normalize_email, validate_email, validate_password};
pub use models::{
    Admin, AdminId, AdminRole, AdminUpdate, IssuedSession, NewAdmin, ParticipantLogin, Principal,
    SessionClaims, SessionKind,
};
pub use session::SessionSigner;
