//! In-process cache for the Licita CRM.
//!
//! Every entry has an absolute expiry and a set of tags. Reads never return
//! an expired value, and invalidating a tag removes every entry that carries
//! it. A background [`Sweeper`] reclaims expired entries nobody reads.
//!
//! ## Quick start
//!
//! ```
//! use licita_cache::prelude::*;
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let cache = TaggedCache::new();
//! let key = db_key("clientes", "7", None);
//! let cliente_tags = tags::cliente("7");
//!
//! cache.set(&key, json!({"nome": "ACME"}), Duration::from_secs(300), &tags::as_refs(&cliente_tags));
//! assert!(cache.get(&key).is_some());
//!
//! // Any change to the clientes collection drops every dependent entry.
//! assert_eq!(cache.invalidate_by_tag("clientes"), 1);
//! assert!(cache.get(&key).is_none());
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod helpers;
pub mod keys;
pub mod middleware;
pub mod store;
pub mod sweeper;

pub use config::CacheConfig;
pub use entry::CacheEntry;
pub use error::{CacheError, CacheResult};
pub use helpers::{get_json, remember, remember_json, remember_with, set_json};
pub use keys::{api_key, db_key, tags, user_key};
pub use middleware::{CACHE_STATUS_HEADER, CacheKeyFn, CacheMiddleware, request_key, with_cache};
pub use store::{CacheStats, TaggedCache};
pub use sweeper::Sweeper;

/// Prelude for common imports.
///
/// ```
/// use licita_cache::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::CacheConfig;
    pub use crate::error::{CacheError, CacheResult};
    pub use crate::helpers::{remember, remember_with};
    pub use crate::keys::{api_key, db_key, tags, user_key};
    pub use crate::middleware::{CacheMiddleware, with_cache};
    pub use crate::store::{CacheStats, TaggedCache};
    pub use crate::sweeper::Sweeper;
}
