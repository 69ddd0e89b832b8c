//! Identifier resolution and instantiation.
//!
//! `NameResolver` combines the configured namespace roots with a
//! `TypeRegistry`. Every lookup is soft: an identifier that is not declared,
//! or a component that lacks a required capability, yields `None` instead of
//! an error.

use crate::config::{Config, Namespaces};
use crate::resolver::identity::{Identifier, Kind, Scope, capitalize};
use crate::resolver::registry::{Capability, Component, TypeRegistry};
use serde_json::Value;
use tracing::debug;

/// Sub-namespace searched when a validator rule is not a plain rule.
const DB_RULE_SEGMENT: &str = "Db";

#[derive(Debug, Default)]
pub struct NameResolver {
    namespaces: Namespaces,
    registry: TypeRegistry,
}

impl NameResolver {
    pub fn new(namespaces: Namespaces, registry: TypeRegistry) -> Self {
        Self {
            namespaces,
            registry,
        }
    }

    pub fn from_config(config: &Config, registry: TypeRegistry) -> Self {
        Self::new(config.namespaces.clone(), registry)
    }

    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }

    /// Map a short name under `scope` to its fully-qualified identifier.
    pub fn resolve(&self, scope: &Scope, short_name: &str, kind: Kind) -> Identifier {
        Identifier::build(&self.namespaces, scope, kind, short_name)
    }

    pub fn is_declared(&self, identifier: &Identifier) -> bool {
        self.registry.contains(&identifier.to_string())
    }

    /// Construct the type declared under `identifier`.
    pub fn instantiate(
        &self,
        identifier: &Identifier,
        args: Option<&[Value]>,
    ) -> Option<Box<dyn Component>> {
        let key = identifier.to_string();
        let component = self.registry.construct(&key, args);
        if component.is_none() {
            debug!(identifier = %key, "identifier is not declared");
        }
        component
    }

    /// Construct, then keep the result only if it provides `capability`.
    pub fn instantiate_checked(
        &self,
        identifier: &Identifier,
        capability: &Capability,
        args: Option<&[Value]>,
    ) -> Option<Box<dyn Component>> {
        let component = self.instantiate(identifier, args)?;
        if component.provides(capability) {
            Some(component)
        } else {
            debug!(
                identifier = %identifier,
                capability = %capability,
                "component does not provide required capability"
            );
            None
        }
    }

    /// Two-tier rule lookup: `Validator.Rule.<Name>`, then
    /// `Validator.Rule.Db.<Name>` when the first is not declared.
    pub fn resolve_validator_rule(&self, name: &str) -> Identifier {
        let short_name = capitalize(name);
        let primary = self.resolve(&Scope::Core, &short_name, Kind::ValidatorRule);
        if self.is_declared(&primary) {
            return primary;
        }
        let rules = self.resolve(&Scope::Core, DB_RULE_SEGMENT, Kind::ValidatorRule);
        rules.child(&short_name)
    }

    pub fn create_rule(&self, name: &str, args: Option<&[Value]>) -> Option<Box<dyn Component>> {
        self.instantiate(&self.resolve_validator_rule(name), args)
    }

    pub fn create_schema(
        &self,
        schema_class: &str,
        extension: Option<&str>,
    ) -> Option<Box<dyn Component>> {
        let identifier = self.resolve(&Scope::extension(extension), schema_class, Kind::Schema);
        self.instantiate(&identifier, None)
    }

    pub fn create_module(
        &self,
        module: &str,
        class: &str,
        args: Option<&[Value]>,
    ) -> Option<Box<dyn Component>> {
        let identifier = self.resolve(&Scope::module(Some(module)), class, Kind::Class);
        self.instantiate(&identifier, args)
    }

    pub fn create_extension(
        &self,
        extension: &str,
        class: &str,
        args: Option<&[Value]>,
    ) -> Option<Box<dyn Component>> {
        let identifier = self.resolve(&Scope::extension(Some(extension)), class, Kind::Class);
        self.instantiate_checked(&identifier, &Capability::Extension, args)
    }

    /// Create a job.
    ///
    /// `class` may already be a declared identifier; otherwise it is resolved
    /// as a job under the extension scope. The constructor always receives
    /// `[extension, name]`, with `null` for absent values.
    pub fn create_job(
        &self,
        class: &str,
        extension: Option<&str>,
        name: Option<&str>,
    ) -> Option<Box<dyn Component>> {
        let declared = Identifier::parse(class);
        let identifier = if self.is_declared(&declared) {
            declared
        } else {
            self.resolve(&Scope::extension(extension), class, Kind::Job)
        };
        let args = [optional_string(extension), optional_string(name)];
        self.instantiate_checked(&identifier, &Capability::Job, Some(&args))
    }

    pub fn create_event_subscriber(
        &self,
        class: &str,
        extension: Option<&str>,
    ) -> Option<Box<dyn Component>> {
        let identifier = self.resolve(&Scope::extension(extension), class, Kind::EventSubscriber);
        self.instantiate_checked(&identifier, &Capability::EventSubscriber, None)
    }

    /// Create a controller, handing it the application container.
    pub fn create_controller(
        &self,
        class: &str,
        extension: Option<&str>,
        container: Value,
    ) -> Option<Box<dyn Component>> {
        let identifier = self.resolve(&Scope::extension(extension), class, Kind::Controller);
        self.instantiate(&identifier, Some(&[container]))
    }
}

fn optional_string(value: Option<&str>) -> Value {
    value.map(Value::from).unwrap_or(Value::Null)
}
