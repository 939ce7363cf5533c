//! Late-bound class references.
//!
//! Associations may name their target by path (`"Person"`) so classes can be declared
//! in any order. The path is looked up through a [`TypeResolver`] the first time the
//! association serializes or deserializes a value, and the result is cached.

use crate::framework::{ResourceClass, SchemaError};
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

/// Target of an association: a class, or the path of one.
#[derive(Clone)]
pub enum TypeRef {
    Class(ResourceClass),
    Path(String),
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Class(class) => write!(f, "Class({})", class.name()),
            TypeRef::Path(path) => write!(f, "Path({path})"),
        }
    }
}

impl From<&str> for TypeRef {
    fn from(path: &str) -> Self {
        TypeRef::Path(path.to_string())
    }
}

impl From<String> for TypeRef {
    fn from(path: String) -> Self {
        TypeRef::Path(path)
    }
}

impl From<ResourceClass> for TypeRef {
    fn from(class: ResourceClass) -> Self {
        TypeRef::Class(class)
    }
}

impl From<&ResourceClass> for TypeRef {
    fn from(class: &ResourceClass) -> Self {
        TypeRef::Class(class.clone())
    }
}

/// Looks up a resource class by path.
pub trait TypeResolver: Send + Sync {
    fn resolve_type(&self, path: &str) -> Option<ResourceClass>;
}

impl<F> TypeResolver for F
where
    F: Fn(&str) -> Option<ResourceClass> + Send + Sync,
{
    fn resolve_type(&self, path: &str) -> Option<ResourceClass> {
        self(path)
    }
}

/// A [`TypeRef`] plus the resolver to turn it into a class, resolved at most once.
///
/// The resolver is held weakly: a registry owns its classes, and the classes must not
/// keep the registry alive in return.
pub(crate) struct ClassRef {
    target: TypeRef,
    resolver: Option<Weak<dyn TypeResolver>>,
    resolved: OnceLock<ResourceClass>,
}

impl ClassRef {
    pub(crate) fn new(target: TypeRef, resolver: Option<Weak<dyn TypeResolver>>) -> Self {
        let resolved = OnceLock::new();
        if let TypeRef::Class(class) = &target {
            let _ = resolved.set(class.clone());
        }
        Self {
            target,
            resolver,
            resolved,
        }
    }

    pub(crate) fn target(&self) -> &TypeRef {
        &self.target
    }

    pub(crate) fn get(&self) -> Result<ResourceClass, SchemaError> {
        if let Some(class) = self.resolved.get() {
            return Ok(class.clone());
        }
        let path = match &self.target {
            TypeRef::Path(path) => path,
            TypeRef::Class(class) => return Ok(class.clone()),
        };
        let resolver: Arc<dyn TypeResolver> = self
            .resolver
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or_else(|| SchemaError::ResolverUnavailable(path.clone()))?;
        let class = resolver
            .resolve_type(path)
            .ok_or_else(|| SchemaError::UnresolvedType(path.clone()))?;
        Ok(self.resolved.get_or_init(|| class).clone())
    }
}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRef")
            .field("target", &self.target)
            .field("resolved", &self.resolved.get().is_some())
            .finish()
    }
}
