//! Type descriptors: static per-class metadata
//!
//! A [`TypeDescriptor`] is built once per native class and shared by
//! reference between every instance of that class. It holds the method,
//! property, signal and constructor tables the bridge introspects; it is
//! never mutated after [`TypeDescriptorBuilder::build`].

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{NativeError, NativeResult};
use crate::value::TypeTag;

// ============================================================================
// Signature
// ============================================================================

/// A name plus ordered parameter tags, e.g. `aSignal(int)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    name: String,
    params: Vec<TypeTag>,
}

impl Signature {
    /// Create a signature from parts
    pub fn new(name: impl Into<String>, params: Vec<TypeTag>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Parse a full signature string such as `aSignal(int)` or
    /// `copyString(const QString&)`. Whitespace is ignored.
    pub fn parse(text: &str) -> NativeResult<Self> {
        let malformed = || NativeError::MalformedSignature(text.to_string());
        let open = text.find('(').ok_or_else(malformed)?;
        let name = text[..open].trim();
        let rest = text[open + 1..].trim_end();
        let inner = rest.strip_suffix(')').ok_or_else(malformed)?;
        if name.is_empty() || !is_identifier(name) {
            return Err(malformed());
        }

        let mut params = Vec::new();
        for part in split_params(inner) {
            let part = part.trim();
            if part.is_empty() {
                return Err(malformed());
            }
            match TypeTag::parse(part) {
                Some(TypeTag::Void) | None => return Err(malformed()),
                Some(tag) => params.push(tag),
            }
        }
        Ok(Self::new(name, params))
    }

    /// Base name without parameters
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered parameter tags
    pub fn params(&self) -> &[TypeTag] {
        &self.params
    }

    /// Number of parameters
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Canonical string form, identical to `to_string()`
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ")")
    }
}

fn is_identifier(name: &str) -> bool {
    name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

// Splits on top-level commas; commas inside `<...>` belong to the type.
fn split_params(inner: &str) -> Vec<&str> {
    if inner.trim().is_empty() {
        return Vec::new();
    }
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&inner[start..]);
    parts
}

// ============================================================================
// Table entries
// ============================================================================

/// Who owns an object returned from a native method.
///
/// This is a per-method annotation rather than something the bridge infers:
/// `Borrowed` returns (accessors, `Self()`, singletons) stay owned by the
/// native side, `Transferred` returns (factories) hand ownership to the
/// caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnOwnership {
    /// The native side keeps ownership
    #[default]
    Borrowed,
    /// Ownership passes to the caller
    Transferred,
}

/// Entry of a class's method table
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDescriptor {
    /// Method name
    pub name: String,
    /// Parameter tags
    pub params: Vec<TypeTag>,
    /// Return tag (`Void` for no value)
    pub ret: TypeTag,
    /// Whether a host subclass may override this method
    pub is_virtual: bool,
    /// Ownership of object return values
    pub ownership: ReturnOwnership,
}

impl MethodDescriptor {
    /// Create a non-virtual method with borrowed returns
    pub fn new(name: impl Into<String>, params: Vec<TypeTag>, ret: TypeTag) -> Self {
        Self {
            name: name.into(),
            params,
            ret,
            is_virtual: false,
            ownership: ReturnOwnership::Borrowed,
        }
    }

    /// Mark the method as overridable
    pub fn virtual_method(mut self) -> Self {
        self.is_virtual = true;
        self
    }

    /// Set the ownership annotation for object returns
    pub fn returns(mut self, ownership: ReturnOwnership) -> Self {
        self.ownership = ownership;
        self
    }

    /// Signature of this method
    pub fn signature(&self) -> Signature {
        Signature::new(self.name.clone(), self.params.clone())
    }
}

/// Entry of a class's property table
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    /// Property name
    pub name: String,
    /// Value tag, shared by getter and setter
    pub tag: TypeTag,
    /// Whether a setter exists
    pub writable: bool,
}

/// Entry of a class's signal table
#[derive(Debug, Clone, PartialEq)]
pub struct SignalDescriptor {
    signature: Signature,
    canonical: Arc<str>,
}

impl SignalDescriptor {
    /// Create from a signature
    pub fn new(signature: Signature) -> Self {
        let canonical = Arc::from(signature.canonical());
        Self {
            signature,
            canonical,
        }
    }

    /// Base name
    pub fn name(&self) -> &str {
        self.signature.name()
    }

    /// Parameter tags
    pub fn params(&self) -> &[TypeTag] {
        self.signature.params()
    }

    /// Full signature
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Canonical signature string, shared
    pub fn canonical(&self) -> &Arc<str> {
        &self.canonical
    }
}

/// Entry of a class's constructor table
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorDescriptor {
    /// Parameter tags
    pub params: Vec<TypeTag>,
}

// ============================================================================
// TypeDescriptor
// ============================================================================

/// Immutable per-class metadata shared by all instances of a native class.
#[derive(Debug)]
pub struct TypeDescriptor {
    class_name: String,
    parent: Option<Arc<TypeDescriptor>>,
    doc: Option<String>,
    constructors: Vec<ConstructorDescriptor>,
    methods: Vec<MethodDescriptor>,
    method_indices: FxHashMap<String, Vec<usize>>,
    properties: FxHashMap<String, PropertyDescriptor>,
    signals: Vec<SignalDescriptor>,
    signal_indices: FxHashMap<Arc<str>, usize>,
}

impl TypeDescriptor {
    /// Start building a descriptor for `class_name`
    pub fn builder(class_name: impl Into<String>) -> TypeDescriptorBuilder {
        TypeDescriptorBuilder {
            class_name: class_name.into(),
            parent: None,
            doc: None,
            constructors: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            signals: Vec::new(),
        }
    }

    /// Class name
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Parent class descriptor, if any
    pub fn parent(&self) -> Option<&Arc<TypeDescriptor>> {
        self.parent.as_ref()
    }

    /// Class documentation
    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// Constructor table (own constructors only; constructors are not inherited)
    pub fn constructors(&self) -> &[ConstructorDescriptor] {
        &self.constructors
    }

    /// First constructor accepting `argc` arguments
    pub fn constructor_for(&self, argc: usize) -> Option<&ConstructorDescriptor> {
        self.constructors.iter().find(|c| c.params.len() == argc)
    }

    /// Own method table, in declaration order
    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    /// All overloads named `name`, most-derived class first
    pub fn methods_named(&self, name: &str) -> Vec<&MethodDescriptor> {
        let mut found = Vec::new();
        let mut current = Some(self);
        while let Some(desc) = current {
            if let Some(indices) = desc.method_indices.get(name) {
                found.extend(indices.iter().map(|&i| &desc.methods[i]));
            }
            current = desc.parent.as_deref();
        }
        found
    }

    /// Method named `name` accepting `argc` arguments
    pub fn method_for(&self, name: &str, argc: usize) -> Option<&MethodDescriptor> {
        self.methods_named(name)
            .into_iter()
            .find(|m| m.params.len() == argc)
    }

    /// Method with exactly this signature
    pub fn method_by_signature(&self, signature: &Signature) -> Option<&MethodDescriptor> {
        self.methods_named(signature.name())
            .into_iter()
            .find(|m| m.params == signature.params())
    }

    /// Check if a method with this name exists anywhere in the hierarchy
    pub fn has_method(&self, name: &str) -> bool {
        !self.methods_named(name).is_empty()
    }

    /// Property by name, searching parents
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        let mut current = Some(self);
        while let Some(desc) = current {
            if let Some(prop) = desc.properties.get(name) {
                return Some(prop);
            }
            current = desc.parent.as_deref();
        }
        None
    }

    /// Signal by canonical signature string, searching parents
    pub fn signal(&self, canonical: &str) -> Option<&SignalDescriptor> {
        let mut current = Some(self);
        while let Some(desc) = current {
            if let Some(&i) = desc.signal_indices.get(canonical) {
                return Some(&desc.signals[i]);
            }
            current = desc.parent.as_deref();
        }
        None
    }

    /// All signals whose base name is `name`, searching parents.
    ///
    /// One entry per canonical signature; a redeclaration in a subclass
    /// hides the parent's.
    pub fn signals_named(&self, name: &str) -> Vec<&SignalDescriptor> {
        let mut found: Vec<&SignalDescriptor> = Vec::new();
        let mut current = Some(self);
        while let Some(desc) = current {
            for signal in desc.signals.iter().filter(|s| s.name() == name) {
                if !found.iter().any(|f| f.canonical() == signal.canonical()) {
                    found.push(signal);
                }
            }
            current = desc.parent.as_deref();
        }
        found
    }

    /// Own signal table, in declaration order
    pub fn signals(&self) -> &[SignalDescriptor] {
        &self.signals
    }

    /// Check whether this class is `class_name` or derives from it
    pub fn inherits(&self, class_name: &str) -> bool {
        let mut current = Some(self);
        while let Some(desc) = current {
            if desc.class_name == class_name {
                return true;
            }
            current = desc.parent.as_deref();
        }
        false
    }
}

/// Builder for [`TypeDescriptor`]
#[derive(Debug)]
pub struct TypeDescriptorBuilder {
    class_name: String,
    parent: Option<Arc<TypeDescriptor>>,
    doc: Option<String>,
    constructors: Vec<ConstructorDescriptor>,
    methods: Vec<MethodDescriptor>,
    properties: Vec<PropertyDescriptor>,
    signals: Vec<SignalDescriptor>,
}

impl TypeDescriptorBuilder {
    /// Derive from `parent`
    pub fn parent(mut self, parent: Arc<TypeDescriptor>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Attach class documentation
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Add a constructor overload
    pub fn constructor(mut self, params: Vec<TypeTag>) -> Self {
        self.constructors.push(ConstructorDescriptor { params });
        self
    }

    /// Add a method
    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    /// Add a property
    pub fn property(mut self, name: impl Into<String>, tag: TypeTag, writable: bool) -> Self {
        self.properties.push(PropertyDescriptor {
            name: name.into(),
            tag,
            writable,
        });
        self
    }

    /// Add a signal
    pub fn signal(mut self, name: impl Into<String>, params: Vec<TypeTag>) -> Self {
        self.signals
            .push(SignalDescriptor::new(Signature::new(name, params)));
        self
    }

    /// Freeze the descriptor
    pub fn build(self) -> Arc<TypeDescriptor> {
        let mut method_indices: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        for (i, method) in self.methods.iter().enumerate() {
            method_indices.entry(method.name.clone()).or_default().push(i);
        }

        let mut signals = Vec::with_capacity(self.signals.len());
        let mut signal_indices = FxHashMap::default();
        for signal in self.signals {
            if signal_indices.contains_key(signal.canonical()) {
                continue;
            }
            signal_indices.insert(signal.canonical().clone(), signals.len());
            signals.push(signal);
        }

        let properties = self
            .properties
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();

        Arc::new(TypeDescriptor {
            class_name: self.class_name,
            parent: self.parent,
            doc: self.doc,
            constructors: self.constructors,
            methods: self.methods,
            method_indices,
            properties,
            signals,
            signal_indices,
        })
    }
}
