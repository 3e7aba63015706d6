//! Dormboard Dashboard Client
//!
//! Client library for the Dormboard dashboard API: session lifecycle,
//! permission gating, and guarded HTTP transport.
//!
//! # Features
//!
//! - **Session Store**: login/register/logout against the remote auth API,
//!   durable restore across restarts, time-dependent `is_authenticated`
//! - **Token Claims**: fail-closed expiry inspection without signature
//!   verification
//! - **Permission Evaluator**: declarative `any`/`all` requirements over the
//!   granted permission set
//! - **Permission Gate**: reactive visibility bound to the permission
//!   snapshot
//! - **API Client**: owned interceptor attaching bearer tokens and
//!   invalidating the session on 401/403
//! - **Navigation Guard**: binary auth check with login redirect
//!
//! # Architecture
//!
//! ```text
//! UI / CLI ──► NavigationGuard ──► SessionStore ◄── ApiClient (interceptor)
//!                                      │  ▲
//!                 PermissionGate ◄─────┘  └── SessionStorage (durable mirror)
//!                 (watch snapshot)
//! ```
//!
//! The session store is the single source of truth. The interceptor and the
//! guard read it and may invalidate it; the gate reads only the permission
//! snapshot it broadcasts.

pub mod config;
pub mod gate;
pub mod guard;
pub mod permissions;
pub mod session;
pub mod storage;
pub mod token;
pub mod transport;

pub use config::Config;
pub use gate::PermissionGate;
pub use guard::{NavigationGuard, RouteDecision, LOGIN_ROUTE};
pub use permissions::{evaluate, NameList, PermissionRequirement};
pub use session::{
    Credentials, PermissionGrant, Registration, SessionError, SessionStore, UserProfile,
};
pub use storage::{FileStorage, MemoryStorage, SessionStorage, StorageError};
pub use token::{decode_claims, is_expired, Claims, TokenError};
pub use transport::{ApiClient, ApiError};
