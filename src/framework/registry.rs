//! # Registry
//!
//! The registry plays the part of a dependency injection container for resource
//! classes: it owns the shared [`Context`] and a name to class table, and it is the
//! [`TypeResolver`] that path-typed associations are looked up through.
//!
//! ## Late binding
//!
//! Classes may reference each other by name before both exist. A path like `"Person"`
//! is only resolved when the association first reads or writes a value, so definition
//! order does not matter:
//!
//! ```rust
//! use lazy_resource::framework::{Context, Registry, ResourceDefinition};
//! use lazy_resource::schema::FieldDef;
//! use lazy_resource::transport::mock::MockTransport;
//!
//! let registry = Registry::new(Context::new(MockTransport::new()));
//! registry
//!     .define(ResourceDefinition::new("Post").field("author", FieldDef::resource("Person")))
//!     .unwrap();
//! registry.define(ResourceDefinition::new("Person").url("/people")).unwrap();
//! assert_eq!(registry.names(), vec!["Person".to_string(), "Post".to_string()]);
//! ```
//!
//! Classes hold the registry weakly. Once the last `Registry` handle is dropped, path
//! lookups that were not resolved yet fail with
//! [`SchemaError::ResolverUnavailable`].

use super::class::{ResourceClass, ResourceDefinition};
use super::context::Context;
use super::error::SchemaError;
use crate::schema::TypeResolver;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tracing::info;

struct RegistryInner {
    context: Context,
    classes: RwLock<HashMap<String, ResourceClass>>,
}

impl TypeResolver for RegistryInner {
    fn resolve_type(&self, path: &str) -> Option<ResourceClass> {
        self.classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }
}

/// Name to class table, and the resolver for path-typed associations.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    pub fn new(context: Context) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                context,
                classes: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn context(&self) -> &Context {
        &self.inner.context
    }

    /// Defines a class under the registry's context and registers it by name.
    pub fn define(&self, def: ResourceDefinition) -> Result<ResourceClass, SchemaError> {
        let mut classes = self
            .inner
            .classes
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if classes.contains_key(def.name()) {
            return Err(SchemaError::DuplicateClass(def.name().to_string()));
        }

        let weak = Arc::downgrade(&self.inner);
        let resolver: Weak<dyn TypeResolver> = weak;
        let class = ResourceClass::compile(def, &self.inner.context, Some(resolver))?;
        classes.insert(class.name().to_string(), class.clone());
        info!(class = %class.name(), total = classes.len(), "Registered");
        Ok(class)
    }

    pub fn get(&self, name: &str) -> Option<ResourceClass> {
        self.inner.resolve_type(name)
    }

    /// Registered class names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl TypeResolver for Registry {
    fn resolve_type(&self, path: &str) -> Option<ResourceClass> {
        self.inner.resolve_type(path)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("classes", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, FieldValue};
    use crate::transport::mock::MockTransport;
    use serde_json::json;

    fn registry() -> Registry {
        Registry::new(Context::new(MockTransport::new()))
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let registry = registry();
        registry.define(ResourceDefinition::new("Person")).unwrap();
        let err = registry.define(ResourceDefinition::new("Person")).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateClass("Person".into()));
    }

    #[test]
    fn test_paths_resolve_regardless_of_definition_order() {
        let registry = registry();
        let post = registry
            .define(
                ResourceDefinition::new("Post")
                    .field("author", FieldDef::resource("Person"))
                    .url("/posts"),
            )
            .unwrap();
        let person = registry
            .define(ResourceDefinition::new("Person").url("/people"))
            .unwrap();

        let item = post.create(json!({"id": 1, "author_id": 7}));
        let author = item.get("author").unwrap().unwrap();
        let author = author.as_resource().unwrap();

        assert_eq!(author.class(), &person);
        assert_eq!(author.id(), Some("7".into()));
    }

    #[test]
    fn test_unknown_path_is_a_schema_error() {
        let registry = registry();
        let post = registry
            .define(ResourceDefinition::new("Post").field("author", FieldDef::resource("Ghost")))
            .unwrap();
        let item = post.create(json!({"author_id": 1}));
        assert!(matches!(
            item.get("author"),
            Err(crate::framework::ResourceError::Schema(SchemaError::UnresolvedType(path))) if path == "Ghost"
        ));
    }

    #[test]
    fn test_dropped_registry_leaves_resolver_unavailable() {
        let post = {
            let registry = registry();
            registry
                .define(ResourceDefinition::new("Post").field("author", FieldDef::resource("Person")))
                .unwrap()
        };
        let item = post.create(json!({"author_id": 3}));
        assert!(matches!(
            item.get("author"),
            Err(crate::framework::ResourceError::Schema(SchemaError::ResolverUnavailable(_)))
        ));
        assert_eq!(
            item.get("author_id").unwrap(),
            Some(FieldValue::Number(3.0))
        );
    }
}
