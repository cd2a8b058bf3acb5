//! Authentication and authorization core.
//!
//! Flow for a request:
//! - fresh logins go through [`Authenticator`], which verifies the password
//!   (or reconciles a federated assertion) and issues a session;
//! - existing sessions are resolved by [`SessionManager::validate`], which
//!   always re-reads the account so role changes apply immediately;
//! - [`AuthorizationGate`] turns that result into allow/deny for a [`Tier`].
//!
//! Accounts and sessions live only in the stores; nothing here caches a role.

pub mod account;
pub mod authenticator;
pub mod clock;
pub mod error;
pub mod gate;
pub mod password;
pub mod reconciler;
pub mod session;
pub mod store;

pub use account::{Account, AccountId, Principal, Role};
pub use authenticator::{Authenticator, Credentials, LoginOutcome};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::AuthError;
pub use gate::{AuthorizationGate, Decision, DenyReason, Tier};
pub use password::{FEDERATED_ONLY_DIGEST, PasswordHasher};
pub use reconciler::{FederatedAssertion, IdentityReconciler};
pub use session::{SessionConfig, SessionManager, spawn_session_reaper};
pub use store::{CredentialStore, MemoryStore, PgStore, SessionStore, StoreError};
