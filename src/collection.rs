//! # Resource Collections
//!
//! A [`ResourceCollection`] is an ordered list of instances of one item class, with the
//! same lifecycle as a single resource: reading [`content`](ResourceCollection::content)
//! before the list is loaded starts one GET in the background and answers with whatever
//! is there (nothing, at first).
//!
//! ## Where the items come from
//!
//! | Built with | Network | State after construction |
//! |------------|---------|--------------------------|
//! | `content(..)` / `content_json(..)` | never | FETCHED |
//! | `fetch_with(..)` | the custom fetch function | UNFETCHED |
//! | `url(..)` | GET that URL | UNFETCHED |
//! | nothing | GET the item class's base URL | UNFETCHED |
//!
//! The raw response runs through the collection's parse function (by default: every
//! array element through the item class's own parse hook), then each element becomes an
//! item via `create`, so items share the identity map with the rest of the program.
//! The content is replaced in one step once every item is built.
//!
//! ## Collections declared on a class
//!
//! [`CollectionDef`] declares a collection reachable from every instance of a class,
//! typically one whose URL embeds the owner's id:
//!
//! ```rust,ignore
//! let author = registry.define(
//!     ResourceDefinition::new("Author")
//!         .url("/authors")
//!         .collection("books", CollectionDef::new("Book").url("/authors/%@/books")),
//! )?;
//! let books = author.create(json!({"id": 4})).collection("books")?; // GET /authors/4/books
//! ```

use crate::framework::{Resource, ResourceClass, ResourceError};
use crate::lifecycle::{FetchHandle, FetchStart, Lifecycle, ResourceState};
use crate::schema::{ClassRef, TypeRef, TypeResolver};
use crate::transport::JsonFuture;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::runtime::Handle;
use tracing::{info, info_span, warn, Instrument};

/// Replaces the GET of a collection fetch.
pub type FetchFn = Arc<dyn Fn() -> JsonFuture + Send + Sync>;

/// Turns the raw response of a collection fetch into one JSON value per item.
pub type CollectionParseFn = Arc<dyn Fn(Value) -> Vec<Value> + Send + Sync>;

/// Placeholder replaced with the owner's id in collection URL templates.
pub const ID_PLACEHOLDER: &str = "%@";

// ============================================================================
// Collection declarations
// ============================================================================

/// URL of a declared collection, relative to its owner.
#[derive(Clone)]
pub enum CollectionUrl {
    /// `"/authors/%@/books"`: the placeholder becomes the owner's id.
    Template(String),
    Resolver(Arc<dyn Fn(&Resource) -> String + Send + Sync>),
}

impl CollectionUrl {
    fn url_for(&self, owner: &Resource) -> String {
        match self {
            CollectionUrl::Template(template) => {
                let id = owner.id().unwrap_or_default();
                template.replacen(ID_PLACEHOLDER, &id, 1)
            }
            CollectionUrl::Resolver(f) => f(owner),
        }
    }
}

impl fmt::Debug for CollectionUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionUrl::Template(template) => f.debug_tuple("Template").field(template).finish(),
            CollectionUrl::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

/// A collection declared on a resource class.
#[derive(Clone)]
pub struct CollectionDef {
    item: TypeRef,
    url: Option<CollectionUrl>,
    parse: Option<CollectionParseFn>,
}

impl CollectionDef {
    /// A collection of `item`, given as a class or as a path.
    pub fn new(item: impl Into<TypeRef>) -> Self {
        Self {
            item: item.into(),
            url: None,
            parse: None,
        }
    }

    /// URL template; `%@` is replaced with the owner's id (empty when it has none).
    pub fn url(mut self, template: impl Into<String>) -> Self {
        self.url = Some(CollectionUrl::Template(template.into()));
        self
    }

    pub fn url_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&Resource) -> String + Send + Sync + 'static,
    {
        self.url = Some(CollectionUrl::Resolver(Arc::new(f)));
        self
    }

    pub fn parse<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Vec<Value> + Send + Sync + 'static,
    {
        self.parse = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for CollectionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionDef")
            .field("item", &self.item)
            .field("url", &self.url)
            .field("parse", &self.parse.is_some())
            .finish()
    }
}

/// A [`CollectionDef`] compiled into its class, with the item type resolved lazily.
pub(crate) struct NestedCollection {
    item: ClassRef,
    url: Option<CollectionUrl>,
    parse: Option<CollectionParseFn>,
}

impl NestedCollection {
    pub(crate) fn new(def: CollectionDef, resolver: Option<Weak<dyn TypeResolver>>) -> Self {
        Self {
            item: ClassRef::new(def.item, resolver),
            url: def.url,
            parse: def.parse,
        }
    }

    /// A fresh collection for `owner`.
    pub(crate) fn build(&self, owner: &Resource) -> Result<ResourceCollection, ResourceError> {
        let mut builder = ResourceCollection::builder(self.item.get()?);
        if let Some(url) = &self.url {
            builder = builder.url(url.url_for(owner));
        }
        if let Some(parse) = &self.parse {
            builder.parse = Some(parse.clone());
        }
        Ok(builder.build())
    }
}

impl fmt::Debug for NestedCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NestedCollection")
            .field("item", &self.item)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ResourceCollection
// ============================================================================

struct CollectionInner {
    item_class: ResourceClass,
    url: Option<String>,
    fetcher: Option<FetchFn>,
    parse: Option<CollectionParseFn>,
    pre_populated: bool,
    content: Mutex<Vec<Resource>>,
    lifecycle: Lifecycle,
}

/// An ordered, lazily fetched list of resources of one class.
#[derive(Clone)]
pub struct ResourceCollection {
    inner: Arc<CollectionInner>,
}

impl ResourceCollection {
    pub fn builder(item_class: ResourceClass) -> ResourceCollectionBuilder {
        ResourceCollectionBuilder {
            item_class,
            url: None,
            fetcher: None,
            parse: None,
            content: None,
        }
    }

    /// A collection fetched from the item class's base URL.
    pub fn new(item_class: ResourceClass) -> Self {
        Self::builder(item_class).build()
    }

    pub fn item_class(&self) -> &ResourceClass {
        &self.inner.item_class
    }

    /// The explicit URL, if one was given.
    pub fn url(&self) -> Option<&str> {
        self.inner.url.as_deref()
    }

    pub fn is_pre_populated(&self) -> bool {
        self.inner.pre_populated
    }

    pub fn state(&self) -> ResourceState {
        self.inner.lifecycle.state()
    }

    fn lock_content(&self) -> MutexGuard<'_, Vec<Resource>> {
        self.inner.content.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The items loaded so far. Starts the fetch if it has not happened yet.
    pub fn content(&self) -> Result<Vec<Resource>, ResourceError> {
        if self.state() == ResourceState::Unfetched {
            self.fetch()?;
        }
        Ok(self.lock_content().clone())
    }

    /// Replaces the items without touching the lifecycle.
    pub fn set_content(&self, items: Vec<Resource>) {
        *self.lock_content() = items;
    }

    pub fn len(&self) -> usize {
        self.lock_content().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn request_url(&self) -> Result<String, ResourceError> {
        match &self.inner.url {
            Some(url) => Ok(url.clone()),
            None => self.inner.item_class.resource_url(None),
        }
    }

    /// Parses a raw response into item payloads.
    fn parse_items(&self, json: Value) -> Vec<Value> {
        if let Some(parse) = &self.inner.parse {
            return parse(json);
        }
        match json {
            Value::Array(items) => items
                .into_iter()
                .map(|item| self.inner.item_class.parse(item))
                .collect(),
            other => {
                warn!(
                    class = %self.inner.item_class.name(),
                    found = %other,
                    "Collection response is not an array"
                );
                Vec::new()
            }
        }
    }

    /// Fetches the items, once. Pre-populated collections never fetch.
    pub fn fetch(&self) -> Result<FetchHandle, ResourceError> {
        let lifecycle = &self.inner.lifecycle;
        if self.inner.pre_populated || lifecycle.state() != ResourceState::Unfetched {
            return Ok(lifecycle.begin_fetch().handle());
        }

        // A custom fetch function needs no URL; the URL is only a log label then.
        let url = match &self.inner.fetcher {
            Some(_) => self.request_url().unwrap_or_else(|_| "<custom>".to_string()),
            None => self.request_url()?,
        };
        let runtime = Handle::try_current().map_err(|_| ResourceError::NoRuntime)?;

        let handle = match lifecycle.begin_fetch() {
            FetchStart::Joined(handle) => return Ok(handle),
            FetchStart::Started(handle) => handle,
        };

        let collection = self.clone();
        let class = self.inner.item_class.name().to_string();
        let span = info_span!("fetch", class = %class, url = %url);
        runtime.spawn(
            async move {
                info!(class = %class, url = %url, "Fetching collection");
                let context = collection.inner.item_class.context().clone();
                let response = match &collection.inner.fetcher {
                    Some(fetcher) => fetcher().await,
                    None => context.transport().get_json(&url).await,
                };
                match response {
                    Ok(json) => {
                        let items: Vec<Resource> = collection
                            .parse_items(json)
                            .into_iter()
                            .map(|payload| collection.inner.item_class.create(payload))
                            .collect();
                        let count = items.len();
                        collection.set_content(items);
                        info!(class = %class, url = %url, count, "Fetched collection");
                    }
                    Err(err) => context.report_error(&class, &url, &err),
                }
                collection.inner.lifecycle.settle();
            }
            .instrument(span),
        );

        Ok(handle)
    }
}

impl fmt::Debug for ResourceCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCollection")
            .field("item_class", &self.inner.item_class.name())
            .field("url", &self.inner.url)
            .field("pre_populated", &self.inner.pre_populated)
            .field("state", &self.state())
            .field("len", &self.len())
            .finish()
    }
}

/// Builder for [`ResourceCollection`].
pub struct ResourceCollectionBuilder {
    item_class: ResourceClass,
    url: Option<String>,
    fetcher: Option<FetchFn>,
    parse: Option<CollectionParseFn>,
    content: Option<Vec<Resource>>,
}

impl ResourceCollectionBuilder {
    /// GETs this URL instead of the item class's base URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Uses `f` instead of a GET.
    pub fn fetch_with<F>(mut self, f: F) -> Self
    where
        F: Fn() -> JsonFuture + Send + Sync + 'static,
    {
        self.fetcher = Some(Arc::new(f));
        self
    }

    pub fn parse<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Vec<Value> + Send + Sync + 'static,
    {
        self.parse = Some(Arc::new(f));
        self
    }

    /// Supplies the items up front. The collection will never fetch.
    pub fn content(mut self, items: Vec<Resource>) -> Self {
        self.content = Some(items);
        self
    }

    /// Like [`content`](Self::content), building each item with the item class's `create`.
    pub fn content_json(self, items: Vec<Value>) -> Self {
        let items = items
            .into_iter()
            .map(|payload| self.item_class.create(payload))
            .collect();
        self.content(items)
    }

    pub fn build(self) -> ResourceCollection {
        let lifecycle = Lifecycle::new();
        let pre_populated = self.content.is_some();
        if pre_populated {
            lifecycle.mark_fetched();
        }
        lifecycle.initialized();

        ResourceCollection {
            inner: Arc::new(CollectionInner {
                item_class: self.item_class,
                url: self.url,
                fetcher: self.fetcher,
                parse: self.parse,
                pre_populated,
                content: Mutex::new(self.content.unwrap_or_default()),
                lifecycle,
            }),
        }
    }
}
