use lazy_resource::collection::{CollectionDef, ResourceCollection};
use lazy_resource::framework::{Context, Registry, Resource, ResourceDefinition, ResourceError};
use lazy_resource::schema::{FieldDef, FieldValue};
use lazy_resource::transport::mock::MockTransport;
use lazy_resource::ResourceState;
use serde_json::json;

fn library(mock: &MockTransport) -> Registry {
    let registry = Registry::new(Context::new(mock.clone()));
    registry
        .define(
            ResourceDefinition::new("Author")
                .field("name", FieldDef::string())
                .url("/authors")
                .collection("books", CollectionDef::new("Book").url("/authors/%@/books"))
                .collection(
                    "reviews",
                    CollectionDef::new("Book")
                        .url_fn(|author: &Resource| {
                            format!("/reviews?author={}", author.id().unwrap_or_default())
                        })
                        .parse(|json| json["items"].as_array().cloned().unwrap_or_default()),
                ),
        )
        .expect("Failed to define Author");
    registry
        .define(
            ResourceDefinition::new("Book")
                .field("title", FieldDef::string())
                .url("/books"),
        )
        .expect("Failed to define Book");
    registry
}

fn titles(items: &[Resource]) -> Vec<Option<String>> {
    items
        .iter()
        .map(|book| {
            book.get("title")
                .expect("Failed to read title")
                .and_then(|title| title.as_str().map(str::to_string))
        })
        .collect()
}

#[tokio::test]
async fn test_pre_populated_content_skips_the_network() {
    let mock = MockTransport::new();
    let registry = library(&mock);
    let book = registry.get("Book").expect("Book not registered");

    let shelf = ResourceCollection::builder(book)
        .content_json(vec![json!({"id": 1}), json!({"id": 2})])
        .build();

    assert!(shelf.is_pre_populated());
    let content = shelf.content().expect("Failed to read content");
    assert_eq!(content.len(), 2);
    assert_eq!(content[0].id(), Some("1".to_string()));
    assert_eq!(content[1].id(), Some("2".to_string()));

    shelf.fetch().expect("Failed to join fetch").await;
    assert_eq!(shelf.content().expect("Failed to read content").len(), 2);
    assert_eq!(mock.request_count(), 0);
}

#[tokio::test]
async fn test_nested_collection_substitutes_owner_id() {
    let mock = MockTransport::new();
    mock.expect_get("/authors/4/books").return_ok(json!([
        {"id": 10, "title": "Dune"},
        {"id": 11, "title": "Children of Dune"}
    ]));
    let registry = library(&mock);
    let author = registry.get("Author").expect("Author not registered");

    let frank = author.create(json!({"id": 4, "name": "Frank"}));
    let books = frank.collection("books").expect("Failed to build books");
    assert_eq!(books.url(), Some("/authors/4/books"));

    // First read is empty and starts the fetch
    assert!(books.content().expect("Failed to read content").is_empty());
    assert_eq!(books.state(), ResourceState::Fetching);
    books.fetch().expect("Failed to join fetch").await;

    let content = books.content().expect("Failed to read content");
    assert_eq!(
        titles(&content),
        vec![Some("Dune".to_string()), Some("Children of Dune".to_string())]
    );
    mock.verify();
}

#[tokio::test]
async fn test_nested_collection_is_cached_until_id_changes() {
    let mock = MockTransport::new();
    let registry = library(&mock);
    let author = registry.get("Author").expect("Author not registered");

    let draft = author.create(json!({"name": "Anonymous"}));
    let before = draft.collection("books").expect("Failed to build books");
    let again = draft.collection("books").expect("Failed to build books");
    assert_eq!(before.url(), Some("/authors//books"));
    assert_eq!(again.url(), before.url());

    draft.set_data(json!({"id": 8, "name": "Anonymous"}));
    let after = draft.collection("books").expect("Failed to build books");
    assert_eq!(after.url(), Some("/authors/8/books"));
}

#[tokio::test]
async fn test_url_resolver_may_read_sibling_collections() {
    let mock = MockTransport::new();
    let registry = Registry::new(Context::new(mock.clone()));
    registry
        .define(
            ResourceDefinition::new("Shelf")
                .url("/shelves")
                .collection("books", CollectionDef::new("Book").url("/shelves/%@/books"))
                .collection(
                    "featured",
                    CollectionDef::new("Book").url_fn(|shelf: &Resource| {
                        let books = shelf.collection("books").expect("Failed to build books");
                        format!("{}?featured=1", books.url().unwrap_or_default())
                    }),
                ),
        )
        .expect("Failed to define Shelf");
    registry
        .define(ResourceDefinition::new("Book").url("/books"))
        .expect("Failed to define Book");
    let shelf = registry.get("Shelf").expect("Shelf not registered");

    let front = shelf.create(json!({"id": 2}));
    let featured = front.collection("featured").expect("Failed to build featured");
    assert_eq!(featured.url(), Some("/shelves/2/books?featured=1"));

    let again = front.collection("featured").expect("Failed to build featured");
    assert_eq!(again.url(), featured.url());
    let books = front.collection("books").expect("Failed to build books");
    assert_eq!(books.url(), Some("/shelves/2/books"));
}

#[tokio::test]
async fn test_nested_collection_with_resolver_and_parse() {
    let mock = MockTransport::new();
    mock.expect_get("/reviews?author=4")
        .return_ok(json!({"items": [{"id": 20, "title": "Review"}], "total": 1}));
    let registry = library(&mock);
    let author = registry.get("Author").expect("Author not registered");

    let reviews = author
        .create(json!({"id": 4}))
        .collection("reviews")
        .expect("Failed to build reviews");
    reviews.fetch().expect("Failed to start fetch").await;

    let content = reviews.content().expect("Failed to read content");
    assert_eq!(titles(&content), vec![Some("Review".to_string())]);
    mock.verify();
}

#[tokio::test]
async fn test_collection_items_share_identity_with_resources() {
    let mock = MockTransport::new();
    mock.expect_get("/books").return_ok(json!([{"id": 30, "title": "Emma"}]));
    let registry = library(&mock);
    let book = registry.get("Book").expect("Book not registered");

    let emma = book.create(json!({"id": 30}));
    assert_eq!(emma.state(), ResourceState::Unfetched);

    let all = ResourceCollection::new(book);
    all.fetch().expect("Failed to start fetch").await;

    let content = all.content().expect("Failed to read content");
    assert_eq!(content, vec![emma.clone()]);
    // The cached instance keeps its own data; the listing does not overwrite it
    assert_eq!(emma.data(), Some(json!({"id": 30})));
    mock.verify();
}

#[tokio::test]
async fn test_unknown_collection_is_an_error() {
    let mock = MockTransport::new();
    let registry = library(&mock);
    let book = registry.get("Book").expect("Book not registered");

    let result = book.create(json!({"id": 1})).collection("chapters");
    assert!(matches!(
        result,
        Err(ResourceError::UnknownCollection { name, .. }) if name == "chapters"
    ));
}

#[tokio::test]
async fn test_collection_items_fetch_lazily() {
    let mock = MockTransport::new();
    mock.expect_get("/books").return_ok(json!([{"id": 40}]));
    mock.expect_get("/books/40").return_ok(json!({"id": 40, "title": "Ulysses"}));
    let registry = library(&mock);
    let book = registry.get("Book").expect("Book not registered");

    let all = ResourceCollection::new(book);
    all.fetch().expect("Failed to start fetch").await;
    let ulysses = all.content().expect("Failed to read content").remove(0);

    assert_eq!(ulysses.get("title").expect("Failed to read title"), None);
    ulysses.fetch().expect("Failed to join fetch").await;
    assert_eq!(
        ulysses.get("title").expect("Failed to read title"),
        Some(FieldValue::String("Ulysses".into()))
    );
    assert_eq!(mock.request_count(), 2);
    mock.verify();
}
