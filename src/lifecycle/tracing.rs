//! # Observability & Tracing
//!
//! Resources log through the `tracing` crate with structured fields instead of
//! formatted strings. Every line names the resource class (`class`) and, where one
//! exists, the `id` or `url` involved.
//!
//! ## What Gets Traced
//!
//! - **Identity map**: hits and misses on `create` (debug)
//! - **Accessors**: reads that trigger a fetch (debug)
//! - **Fetches**: start, settle, item counts for collections (info), each inside a
//!   `fetch` span carrying the class and URL
//! - **Saves**: POST/PUT with the target URL (info)
//! - **Transport failures**: routed to the error handler (warn)
//!
//! ## Usage
//!
//! ```bash
//! # Fetch and save activity
//! RUST_LOG=info cargo test
//!
//! # Identity map and accessor detail
//! RUST_LOG=lazy_resource=debug cargo test
//! ```
//!
//! **With `RUST_LOG=debug`**:
//!
//! ```text
//! DEBUG Identity map miss class="Person" id="7"
//! DEBUG Field unavailable, fetching class="Person" field="name"
//! INFO fetch: Fetching class="Person" url="/people/7"
//! INFO fetch: Fetched class="Person" url="/people/7"
//! ```

/// Installs a compact `fmt` subscriber filtered by `RUST_LOG`.
///
/// Safe to call more than once; only the first call installs the subscriber.
pub fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
}
