//! `stockroom-auth`: role policy and authorization checks.
//!
//! Identity is asserted upstream; this crate only answers "may this principal
//! perform this operation". It is decoupled from HTTP and storage.

pub mod authorize;
pub mod permissions;
pub mod policy;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, authorize};
pub use permissions::Permission;
pub use policy::{PolicyError, PolicyTable};
pub use principal::Principal;
pub use roles::Role;
