//! Declared types and how to construct them.
//!
//! The registry stands in for runtime class lookup: a type is "declared" when
//! its identifier has at least one constructor registered here. Constructed
//! values are `Component` trait objects that advertise the capabilities they
//! satisfy and can be downcast back to their concrete type.

use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

/// Behavior a constructed component may be required to provide.
///
/// Known variants cover the checked factory paths; `Other` lets callers
/// define their own capability names without extending this enum.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Capability {
    Job,
    Extension,
    EventSubscriber,
    Other(String),
}

impl Capability {
    pub fn as_str(&self) -> &str {
        match self {
            Capability::Job => "job",
            Capability::Extension => "extension",
            Capability::EventSubscriber => "event_subscriber",
            Capability::Other(value) => value.as_str(),
        }
    }
}

impl From<&str> for Capability {
    fn from(value: &str) -> Self {
        match value {
            "job" => Capability::Job,
            "extension" => Capability::Extension,
            "event_subscriber" => Capability::EventSubscriber,
            other => Capability::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Object-safe access to `Any`, implemented for every sized `'static` type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A value produced by the registry.
pub trait Component: AsAny {
    /// Capabilities this component satisfies. Empty by default.
    fn capabilities(&self) -> Vec<Capability> {
        Vec::new()
    }

    fn provides(&self, capability: &Capability) -> bool {
        self.capabilities().contains(capability)
    }
}

impl dyn Component {
    pub fn is<T: Component>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Take ownership of the concrete value, or `None` on a type mismatch.
    pub fn downcast<T: Component>(self: Box<Self>) -> Option<Box<T>> {
        if !self.is::<T>() {
            return None;
        }
        self.into_any().downcast::<T>().ok()
    }
}

impl fmt::Debug for dyn Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("capabilities", &self.capabilities())
            .finish_non_exhaustive()
    }
}

type Nullary = Box<dyn Fn() -> Box<dyn Component>>;
type Variadic = Box<dyn Fn(&[Value]) -> Box<dyn Component>>;

#[derive(Default)]
struct Constructors {
    nullary: Option<Nullary>,
    variadic: Option<Variadic>,
}

/// In-memory table of declared identifiers.
#[derive(Default)]
pub struct TypeRegistry {
    types: BTreeMap<String, Constructors>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `T` under `identifier`, constructed with `T::default()`.
    pub fn register<T>(&mut self, identifier: impl ToString)
    where
        T: Component + Default,
    {
        self.register_nullary(identifier, || Box::new(T::default()));
    }

    /// Declare a constructor that takes no arguments.
    pub fn register_nullary<F>(&mut self, identifier: impl ToString, constructor: F)
    where
        F: Fn() -> Box<dyn Component> + 'static,
    {
        self.entry(identifier).nullary = Some(Box::new(constructor));
    }

    /// Declare a constructor that receives positional arguments.
    pub fn register_variadic<F>(&mut self, identifier: impl ToString, constructor: F)
    where
        F: Fn(&[Value]) -> Box<dyn Component> + 'static,
    {
        self.entry(identifier).variadic = Some(Box::new(constructor));
    }

    fn entry(&mut self, identifier: impl ToString) -> &mut Constructors {
        self.types.entry(identifier.to_string()).or_default()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.types.contains_key(identifier)
    }

    /// Declared identifiers in stable order.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Construct the type declared under `identifier`.
    ///
    /// Non-empty `args` go to the variadic constructor; anything else uses
    /// the nullary one. When only one form is registered it serves both
    /// cases, the nullary form ignoring arguments and the variadic form
    /// receiving an empty slice.
    pub fn construct(&self, identifier: &str, args: Option<&[Value]>) -> Option<Box<dyn Component>> {
        let constructors = self.types.get(identifier)?;
        let args = args.filter(|args| !args.is_empty());
        let component = match (args, &constructors.variadic, &constructors.nullary) {
            (Some(args), Some(variadic), _) => variadic(args),
            (Some(_), None, Some(nullary)) => nullary(),
            (None, _, Some(nullary)) => nullary(),
            (None, Some(variadic), None) => variadic(&[]),
            (_, None, None) => return None,
        };
        Some(component)
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.types.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Plain;
    impl Component for Plain {}

    struct Greeting(String);
    impl Component for Greeting {
        fn capabilities(&self) -> Vec<Capability> {
            vec![Capability::Other("greeter".into())]
        }
    }

    #[test]
    fn undeclared_identifier_constructs_nothing() {
        let registry = TypeRegistry::new();
        assert!(registry.construct("Core.Missing", None).is_none());
        assert!(!registry.contains("Core.Missing"));
    }

    #[test]
    fn args_select_the_variadic_constructor() {
        let mut registry = TypeRegistry::new();
        registry.register_nullary("Core.Greeting", || Box::new(Greeting("hello".into())));
        registry.register_variadic("Core.Greeting", |args| {
            let name = args.first().and_then(Value::as_str).unwrap_or("nobody");
            Box::new(Greeting(format!("hello {name}")))
        });

        let with_args = registry
            .construct("Core.Greeting", Some(&[json!("ada")]))
            .unwrap();
        assert_eq!(with_args.downcast_ref::<Greeting>().unwrap().0, "hello ada");

        let empty_args = registry.construct("Core.Greeting", Some(&[])).unwrap();
        assert_eq!(empty_args.downcast_ref::<Greeting>().unwrap().0, "hello");

        let no_args = registry.construct("Core.Greeting", None).unwrap();
        assert_eq!(no_args.downcast_ref::<Greeting>().unwrap().0, "hello");
    }

    #[test]
    fn single_constructor_form_serves_both_cases() {
        let mut registry = TypeRegistry::new();
        registry.register::<Plain>("Core.Plain");
        registry.register_variadic("Core.Echo", |args| {
            Box::new(Greeting(args.len().to_string()))
        });

        assert!(registry.construct("Core.Plain", Some(&[json!(1)])).unwrap().is::<Plain>());
        let echo = registry.construct("Core.Echo", None).unwrap();
        assert_eq!(echo.downcast_ref::<Greeting>().unwrap().0, "0");
    }

    #[test]
    fn downcast_rejects_other_types() {
        let mut registry = TypeRegistry::new();
        registry.register::<Plain>("Core.Plain");
        let component = registry.construct("Core.Plain", None).unwrap();
        assert!(component.downcast_ref::<Greeting>().is_none());
        assert!(component.downcast::<Greeting>().is_none());
    }

    #[test]
    fn capability_names_round_trip_through_strings() {
        assert_eq!(Capability::from("job"), Capability::Job);
        assert_eq!(Capability::from("auditable").as_str(), "auditable");
        assert_eq!(Capability::EventSubscriber.to_string(), "event_subscriber");
    }
}
