//! Namespace resolution and component construction.
//!
//! `identity` holds the naming rules (scopes, kinds, structured identifiers),
//! `registry` the declared types and the `Component` trait they implement,
//! and `factory` the `NameResolver` that ties the two together.

pub mod factory;
pub mod identity;
pub mod registry;

pub use factory::NameResolver;
pub use identity::{Identifier, Kind, Scope, capitalize};
pub use registry::{AsAny, Capability, Component, TypeRegistry};
