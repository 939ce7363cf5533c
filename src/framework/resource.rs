//! # Resource Instances
//!
//! A [`Resource`] is a handle on one remote entity: its JSON data blob, its lifecycle
//! state and its class. Handles are cheap clones of one shared instance, and equality
//! is identity, which is what the identity map guarantees per id.
//!
//! ## Reading fields
//!
//! [`Resource::get`] never blocks. When the data blob lacks the field's storage key the
//! read answers `Ok(None)` and starts a fetch in the background (once; later reads join
//! the same fetch). Await [`Resource::fetch`] to wait for the data:
//!
//! ```rust,ignore
//! assert!(person.get("name")?.is_none()); // starts GET /people/7
//! person.fetch()?.await;                  // same in-flight fetch
//! let name = person.get("name")?;         // now populated
//! ```
//!
//! Transport failures never surface here. They go to the context's error handler, the
//! resource settles as fetched anyway, and reads keep answering `None`.

use super::class::ResourceClass;
use super::error::ResourceError;
use crate::collection::ResourceCollection;
use crate::identity::normalize_id;
use crate::lifecycle::{FetchHandle, FetchStart, Lifecycle, ResourceState};
use crate::property::DataStore;
use crate::schema::FieldValue;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, info_span, Instrument};

struct ResourceInner {
    class: ResourceClass,
    store: DataStore,
    lifecycle: Lifecycle,
    /// Nested collections built so far, with the owner id they were built for.
    collections: Mutex<HashMap<String, (Option<String>, ResourceCollection)>>,
}

/// An instance of a [`ResourceClass`].
#[derive(Clone)]
pub struct Resource {
    inner: Arc<ResourceInner>,
}

impl Resource {
    pub(crate) fn new(class: ResourceClass, data: Value) -> Self {
        let resource = Self {
            inner: Arc::new(ResourceInner {
                class,
                store: DataStore::new(Some(data)),
                lifecycle: Lifecycle::new(),
                collections: Mutex::new(HashMap::new()),
            }),
        };
        resource.inner.lifecycle.initialized();
        resource
    }

    pub fn class(&self) -> &ResourceClass {
        &self.inner.class
    }

    pub fn ptr_eq(a: &Resource, b: &Resource) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// The id as stored in the data blob.
    pub fn raw_id(&self) -> Option<Value> {
        self.inner.store.lookup("id")
    }

    /// The id, normalized to a string. Never triggers a fetch.
    pub fn id(&self) -> Option<String> {
        self.raw_id().as_ref().and_then(normalize_id)
    }

    /// True while the resource has no id, i.e. it has not been created remotely.
    pub fn is_new(&self) -> bool {
        self.id().is_none()
    }

    pub fn state(&self) -> ResourceState {
        self.inner.lifecycle.state()
    }

    /// A copy of the raw data blob.
    pub fn data(&self) -> Option<Value> {
        self.inner.store.snapshot()
    }

    /// Replaces the raw data blob.
    pub fn set_data(&self, data: Value) {
        self.inner.store.replace(Some(data));
    }

    /// Version counter of the data blob; changes whenever it is written or replaced.
    pub fn watch_data(&self) -> watch::Receiver<u64> {
        self.inner.store.subscribe()
    }

    /// Reads a field.
    ///
    /// `Ok(None)` means the value is not loaded yet; a fetch has been started.
    pub fn get(&self, field: &str) -> Result<Option<FieldValue>, ResourceError> {
        let accessor = self.class().accessor(field).ok_or_else(|| self.unknown_field(field))?;
        match accessor.get(&self.inner.store)? {
            Some(value) => Ok(Some(value)),
            None => {
                debug!(class = %self.class().name(), field, "Field unavailable, fetching");
                self.fetch()?;
                Ok(None)
            }
        }
    }

    /// Writes a field and returns the value written.
    pub fn set(&self, field: &str, value: impl Into<FieldValue>) -> Result<FieldValue, ResourceError> {
        let accessor = self.class().accessor(field).ok_or_else(|| self.unknown_field(field))?;
        Ok(accessor.set(&self.inner.store, value.into())?)
    }

    fn unknown_field(&self, field: &str) -> ResourceError {
        ResourceError::UnknownField {
            class: self.class().name().to_string(),
            field: field.to_string(),
        }
    }

    pub fn resource_url(&self) -> Result<String, ResourceError> {
        self.class().resource_url(Some(self))
    }

    /// Fetches the resource's data, once.
    ///
    /// The first call while UNFETCHED issues the GET; every other call returns a handle
    /// on that same fetch, including after it settled. Errors are configuration
    /// problems only (no URL, no runtime). Transport failures go to the error handler.
    pub fn fetch(&self) -> Result<FetchHandle, ResourceError> {
        let lifecycle = &self.inner.lifecycle;
        if lifecycle.state() != ResourceState::Unfetched {
            return Ok(lifecycle.begin_fetch().handle());
        }

        let url = self.resource_url()?;
        let runtime = Handle::try_current().map_err(|_| ResourceError::NoRuntime)?;

        let handle = match lifecycle.begin_fetch() {
            FetchStart::Joined(handle) => return Ok(handle),
            FetchStart::Started(handle) => handle,
        };

        let resource = self.clone();
        let class = self.class().name().to_string();
        let span = info_span!("fetch", class = %class, url = %url);
        runtime.spawn(
            async move {
                info!(class = %class, url = %url, "Fetching");
                let context = resource.class().context().clone();
                match context.transport().get_json(&url).await {
                    Ok(json) => {
                        let data = resource.class().parse(json);
                        resource.inner.store.replace(Some(data));
                        info!(class = %class, url = %url, "Fetched");
                    }
                    Err(err) => context.report_error(&class, &url, &err),
                }
                resource.inner.lifecycle.settle();
            }
            .instrument(span),
        );

        Ok(handle)
    }

    /// The body `save` sends: the class's `to_json` hook, or the raw data blob.
    pub fn to_json(&self) -> Value {
        self.class().to_json(self)
    }

    /// POSTs to the class's base URL when new, PUTs to the instance URL otherwise.
    /// Returns the server's response.
    pub async fn save(&self) -> Result<Value, ResourceError> {
        let body = self.to_json();
        let transport = self.class().context().transport().clone();
        let class = self.class().name();

        let response = if self.is_new() {
            let url = self.class().resource_url(None)?;
            info!(class, url = %url, "Creating");
            transport.post_json(&url, &body).await?
        } else {
            let url = self.resource_url()?;
            info!(class, url = %url, "Updating");
            transport.put_json(&url, &body).await?
        };
        Ok(response)
    }

    /// A collection declared on the class, built for this instance.
    ///
    /// The collection is cached and only rebuilt if this instance's id changed.
    pub fn collection(&self, name: &str) -> Result<ResourceCollection, ResourceError> {
        let nested = self.class().nested_collection(name).ok_or_else(|| {
            ResourceError::UnknownCollection {
                class: self.class().name().to_string(),
                name: name.to_string(),
            }
        })?;

        let id = self.id();
        if let Some(cached) = self.cached_collection(name, &id) {
            return Ok(cached);
        }

        // URL closures may read this owner again, so build without the cache lock.
        let built = nested.build(self)?;
        let mut cache = self.lock_collections();
        match cache.get(name) {
            Some((cached_id, cached)) if *cached_id == id => Ok(cached.clone()),
            _ => {
                cache.insert(name.to_string(), (id, built.clone()));
                Ok(built)
            }
        }
    }

    fn lock_collections(
        &self,
    ) -> MutexGuard<'_, HashMap<String, (Option<String>, ResourceCollection)>> {
        self.inner
            .collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn cached_collection(&self, name: &str, id: &Option<String>) -> Option<ResourceCollection> {
        match self.lock_collections().get(name) {
            Some((cached_id, collection)) if cached_id == id => Some(collection.clone()),
            _ => None,
        }
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl Eq for Resource {}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("class", &self.class().name())
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}
