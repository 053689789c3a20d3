//! Botforge Auth - Grants, Binding, and Credential Resolution
//!
//! Decides whether a tenant may read another tenant's bot. The decision
//! stack is a volatile decision cache, an ownership fast path against the
//! config store, and finally the remote grant authority. Also resolves API
//! key credentials to tenant ids for requests arriving without a trusted
//! identity header.

pub mod authority;
pub mod gate;
pub mod identity;
pub mod key_resolver;

pub use authority::{AuthorityClient, HttpAuthorityClient};
pub use gate::{Decision, GateConfig, PermissionGate};
pub use identity::{HttpIdentityClient, IdentityClient, UnconfiguredIdentity};
pub use key_resolver::KeyResolver;
