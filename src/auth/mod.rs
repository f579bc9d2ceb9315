//! # Auth Module
//!
//! Authorization for replication slot management.
//!
//! ## Features
//! - Caller identity carried by the session
//! - Role catalog with superuser and replication attributes
//! - Transitive role membership
//! - Delegated role granting slot management without superuser
//!
//! Authentication happens upstream; this module only decides whether an
//! already-identified role may manage slots.

pub mod gate;
pub mod identity;
pub mod roles;

pub use gate::{AuthorizationGate, DEFAULT_DELEGATED_ROLE};
pub use identity::Identity;
pub use roles::{RoleCatalog, RoleDefinition, RoleProvider};
