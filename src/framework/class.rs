//! # Resource Classes
//!
//! A [`ResourceClass`] is what `define` produces: a compiled schema with one accessor
//! per field, a URL policy, an optional parse hook, and the class's identity map.
//! Classes are cheap handles (`Arc` inside) and immutable once defined.
//!
//! ```rust
//! use lazy_resource::framework::{Context, ResourceClass, ResourceDefinition};
//! use lazy_resource::schema::FieldDef;
//! use lazy_resource::transport::mock::MockTransport;
//! use serde_json::json;
//!
//! let person = ResourceClass::define(
//!     ResourceDefinition::new("Person")
//!         .field("name", FieldDef::string())
//!         .url("/people"),
//!     &Context::new(MockTransport::new()),
//! )
//! .unwrap();
//!
//! let a = person.create(json!({"id": 5, "name": "Ada"}));
//! let b = person.create(json!({"id": "5", "name": "ignored"}));
//! assert_eq!(a, b);
//! assert_eq!(person.resource_url(Some(&a)).unwrap(), "/people/5");
//! ```

use super::context::Context;
use super::error::{ResourceError, SchemaError};
use super::resource::Resource;
use crate::collection::{CollectionDef, NestedCollection};
use crate::identity::{normalize_id, IdentityMap};
use crate::property::{build_accessors, Accessor};
use crate::schema::{compile, FieldDef, Schema, TypeResolver};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Builds a URL, given the instance (or `None` for the class's base URL).
pub type UrlFn = Arc<dyn Fn(Option<&Resource>) -> String + Send + Sync>;

/// Rewrites raw JSON from the server before it is stored.
pub type ParseFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Produces the request body for `save`.
pub type ToJsonFn = Arc<dyn Fn(&Resource) -> Value + Send + Sync>;

/// Where a class's resources live.
#[derive(Clone)]
pub enum UrlPolicy {
    /// `"/people"`: the base URL, with `/<id>` appended for instances with an id.
    Base(String),
    /// A function of the instance, called with `None` for the base URL.
    Resolver(UrlFn),
}

impl UrlPolicy {
    pub fn resolver<F>(f: F) -> Self
    where
        F: Fn(Option<&Resource>) -> String + Send + Sync + 'static,
    {
        UrlPolicy::Resolver(Arc::new(f))
    }

    fn url_for(&self, instance: Option<&Resource>) -> String {
        match self {
            UrlPolicy::Resolver(f) => f(instance),
            UrlPolicy::Base(base) => match instance.and_then(Resource::id) {
                Some(id) => format!("{base}/{id}"),
                None => base.clone(),
            },
        }
    }
}

impl From<&str> for UrlPolicy {
    fn from(url: &str) -> Self {
        UrlPolicy::Base(url.to_string())
    }
}

impl From<String> for UrlPolicy {
    fn from(url: String) -> Self {
        UrlPolicy::Base(url)
    }
}

impl fmt::Debug for UrlPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlPolicy::Base(base) => f.debug_tuple("Base").field(base).finish(),
            UrlPolicy::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

/// Everything `define` needs: name, raw schema, URL policy and hooks.
pub struct ResourceDefinition {
    name: String,
    fields: BTreeMap<String, FieldDef>,
    url: Option<UrlPolicy>,
    parse: Option<ParseFn>,
    to_json: Option<ToJsonFn>,
    collections: BTreeMap<String, CollectionDef>,
}

impl ResourceDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
            url: None,
            parse: None,
            to_json: None,
            collections: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declares a field. Declaring the same name twice keeps the last definition.
    pub fn field(mut self, name: impl Into<String>, def: impl Into<FieldDef>) -> Self {
        self.fields.insert(name.into(), def.into());
        self
    }

    pub fn url(mut self, url: impl Into<UrlPolicy>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn url_fn<F>(self, f: F) -> Self
    where
        F: Fn(Option<&Resource>) -> String + Send + Sync + 'static,
    {
        self.url(UrlPolicy::resolver(f))
    }

    pub fn parse<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.parse = Some(Arc::new(f));
        self
    }

    pub fn to_json<F>(mut self, f: F) -> Self
    where
        F: Fn(&Resource) -> Value + Send + Sync + 'static,
    {
        self.to_json = Some(Arc::new(f));
        self
    }

    /// Declares a collection of another class reachable from each instance.
    pub fn collection(mut self, name: impl Into<String>, def: CollectionDef) -> Self {
        self.collections.insert(name.into(), def);
        self
    }
}

struct ClassInner {
    name: String,
    schema: Schema,
    accessors: BTreeMap<String, Accessor>,
    url: Option<UrlPolicy>,
    parse: Option<ParseFn>,
    to_json: Option<ToJsonFn>,
    collections: BTreeMap<String, NestedCollection>,
    identity_map: IdentityMap,
    context: Context,
}

/// A defined resource type.
#[derive(Clone)]
pub struct ResourceClass {
    inner: Arc<ClassInner>,
}

impl ResourceClass {
    /// Defines a class whose associations name their targets by class, not by path.
    pub fn define(def: ResourceDefinition, context: &Context) -> Result<Self, SchemaError> {
        Self::compile(def, context, None)
    }

    /// Defines a class whose path-typed associations are looked up through `resolver`.
    ///
    /// The resolver is held weakly; keep the `Arc` alive as long as the class is used.
    pub fn define_with_resolver(
        def: ResourceDefinition,
        context: &Context,
        resolver: &Arc<dyn TypeResolver>,
    ) -> Result<Self, SchemaError> {
        Self::compile(def, context, Some(Arc::downgrade(resolver)))
    }

    pub(crate) fn compile(
        def: ResourceDefinition,
        context: &Context,
        resolver: Option<Weak<dyn TypeResolver>>,
    ) -> Result<Self, SchemaError> {
        let ResourceDefinition {
            name,
            fields,
            url,
            parse,
            to_json,
            collections,
        } = def;

        let schema = compile(fields, resolver.clone())?;
        let accessors = build_accessors(&schema);
        let collections = collections
            .into_iter()
            .map(|(name, def)| (name, NestedCollection::new(def, resolver.clone())))
            .collect();

        debug!(class = %name, fields = schema.len(), "Defined");
        Ok(Self {
            inner: Arc::new(ClassInner {
                name,
                schema,
                accessors,
                url,
                parse,
                to_json,
                collections,
                identity_map: IdentityMap::new(),
                context: context.clone(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    pub fn context(&self) -> &Context {
        &self.inner.context
    }

    pub fn identity_map(&self) -> &IdentityMap {
        &self.inner.identity_map
    }

    pub fn accessor(&self, field: &str) -> Option<&Accessor> {
        self.inner.accessors.get(field)
    }

    pub fn url_policy(&self) -> Option<&UrlPolicy> {
        self.inner.url.as_ref()
    }

    pub(crate) fn nested_collection(&self, name: &str) -> Option<&NestedCollection> {
        self.inner.collections.get(name)
    }

    pub fn ptr_eq(a: &ResourceClass, b: &ResourceClass) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Returns the instance for `options.id` from the identity map, or a new instance
    /// holding `options` as its data.
    ///
    /// Options without an id always produce a fresh, unregistered instance.
    pub fn create(&self, options: Value) -> Resource {
        let id = options.get("id").and_then(normalize_id);
        match id {
            Some(id) => {
                let (resource, created) = self
                    .inner
                    .identity_map
                    .get_or_insert_with(id.clone(), || Resource::new(self.clone(), options));
                if created {
                    debug!(class = %self.name(), %id, "Identity map miss");
                } else {
                    debug!(class = %self.name(), %id, "Identity map hit");
                }
                resource
            }
            None => Resource::new(self.clone(), options),
        }
    }

    /// Applies the class's parse hook (identity by default).
    pub fn parse(&self, json: Value) -> Value {
        match &self.inner.parse {
            Some(parse) => parse(json),
            None => json,
        }
    }

    /// URL of `instance`, or the base URL when `instance` is `None`.
    pub fn resource_url(&self, instance: Option<&Resource>) -> Result<String, ResourceError> {
        let policy = self.inner.url.as_ref().ok_or_else(|| ResourceError::MissingUrl {
            class: self.name().to_string(),
        })?;
        Ok(policy.url_for(instance))
    }

    pub(crate) fn to_json(&self, resource: &Resource) -> Value {
        match &self.inner.to_json {
            Some(to_json) => to_json(resource),
            None => resource.data().unwrap_or(Value::Null),
        }
    }
}

impl PartialEq for ResourceClass {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl fmt::Debug for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceClass")
            .field("name", &self.inner.name)
            .field("fields", &self.inner.schema.len())
            .field("url", &self.inner.url)
            .finish()
    }
}
