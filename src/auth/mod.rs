//! Authentication and authorization
//!
//! Two layers wrap every API route. [`gate::authenticate`] turns a bearer
//! token into a [`Principal`] stored in the request extensions, and
//! [`policy::authorize`] checks that principal against the route table.
//! Handlers read the caller with [`CurrentPrincipal`] or [`MaybePrincipal`].

pub mod gate;
pub mod policy;
pub mod principal;

pub use gate::{CurrentPrincipal, MaybePrincipal};
pub use policy::AccessPolicy;
pub use principal::Principal;
