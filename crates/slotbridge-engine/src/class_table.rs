//! Class table for registered native classes

use std::sync::Arc;

use rustc_hash::FxHashMap;
use slotbridge_sdk::{ConstructorDescriptor, NativeClass, TypeDescriptor};

use crate::error::{BridgeError, BridgeResult};

struct ClassEntry {
    class: Arc<dyn NativeClass>,
    constructible: bool,
}

/// Registered native classes, by name
#[derive(Default)]
pub struct ClassTable {
    /// Classes indexed by name
    classes: FxHashMap<String, ClassEntry>,
    /// Registration order
    order: Vec<String>,
}

impl ClassTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class.
    ///
    /// Registering a name twice keeps the first entry and returns its
    /// descriptor. When `require_constructor` is set, a class without
    /// constructors is refused.
    pub fn register(
        &mut self,
        class: Arc<dyn NativeClass>,
        require_constructor: bool,
    ) -> BridgeResult<Arc<TypeDescriptor>> {
        let descriptor = class.descriptor().clone();
        let name = descriptor.class_name().to_string();
        if let Some(existing) = self.classes.get(&name) {
            return Ok(existing.class.descriptor().clone());
        }

        let constructible = !descriptor.constructors().is_empty();
        if require_constructor && !constructible {
            return Err(BridgeError::NoConstructor { class: name, argc: 0 });
        }

        self.order.push(name.clone());
        self.classes.insert(
            name,
            ClassEntry {
                class,
                constructible,
            },
        );
        Ok(descriptor)
    }

    /// Check whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Get a class by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn NativeClass>> {
        self.classes.get(name).map(|e| &e.class)
    }

    /// Get a class's descriptor by name
    pub fn descriptor(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        self.get(name).map(|c| c.descriptor().clone())
    }

    /// Whether instances of `name` can be created from the host
    pub fn is_constructible(&self, name: &str) -> bool {
        self.classes.get(name).is_some_and(|e| e.constructible)
    }

    /// Registered class names in registration order
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Check if no classes are registered
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Pick the constructor of `name` taking `argc` arguments
    pub fn select_constructor(
        &self,
        name: &str,
        argc: usize,
    ) -> BridgeResult<(Arc<dyn NativeClass>, ConstructorDescriptor)> {
        let class = self.get(name).ok_or_else(|| BridgeError::UnknownType {
            class: name.to_string(),
        })?;
        let ctor = class
            .descriptor()
            .constructor_for(argc)
            .ok_or_else(|| BridgeError::NoConstructor {
                class: name.to_string(),
                argc,
            })?
            .clone();
        Ok((class.clone(), ctor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotbridge_sdk::{NativeObject, NativeResult, NativeValue, TypeTag};

    struct Plain {
        descriptor: Arc<TypeDescriptor>,
    }

    impl NativeClass for Plain {
        fn descriptor(&self) -> &Arc<TypeDescriptor> {
            &self.descriptor
        }

        fn construct(
            &self,
            _ctor: &ConstructorDescriptor,
            _args: &[NativeValue],
        ) -> NativeResult<Box<dyn NativeObject>> {
            Err("not constructible in tests".into())
        }
    }

    fn plain(name: &str, ctors: &[Vec<TypeTag>]) -> Arc<dyn NativeClass> {
        let mut builder = TypeDescriptor::builder(name);
        for params in ctors {
            builder = builder.constructor(params.clone());
        }
        Arc::new(Plain {
            descriptor: builder.build(),
        })
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut table = ClassTable::new();
        let first = table.register(plain("Point", &[vec![]]), true).unwrap();
        let second = table
            .register(plain("Point", &[vec![], vec![TypeTag::Int]]), true)
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_register_requires_constructor() {
        let mut table = ClassTable::new();
        assert!(matches!(
            table.register(plain("Opaque", &[]), true),
            Err(BridgeError::NoConstructor { .. })
        ));
        table.register(plain("Opaque", &[]), false).unwrap();
        assert!(table.contains("Opaque"));
        assert!(!table.is_constructible("Opaque"));
    }

    #[test]
    fn test_select_constructor_by_arity() {
        let mut table = ClassTable::new();
        table
            .register(plain("Point", &[vec![], vec![TypeTag::Int]]), true)
            .unwrap();

        let (_, ctor) = table.select_constructor("Point", 1).unwrap();
        assert_eq!(ctor.params, vec![TypeTag::Int]);
        assert!(matches!(
            table.select_constructor("Point", 3),
            Err(BridgeError::NoConstructor { argc: 3, .. })
        ));
        assert!(matches!(
            table.select_constructor("Missing", 0),
            Err(BridgeError::UnknownType { .. })
        ));
    }

    #[test]
    fn test_names_in_registration_order() {
        let mut table = ClassTable::new();
        table.register(plain("B", &[vec![]]), true).unwrap();
        table.register(plain("A", &[vec![]]), true).unwrap();
        assert_eq!(table.names(), vec!["B".to_string(), "A".to_string()]);
    }
}
