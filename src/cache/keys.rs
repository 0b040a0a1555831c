//! Cache key derivation for search results.
//!
//! A [`SearchFingerprint`] captures everything that influences a search
//! result page. Its canonical form is hashed into the cache key and also
//! addresses the in-flight request map.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::application::pagination::PageRequest;
use crate::application::repos::BookSearchFilter;

/// Field order is fixed by declaration order, which keeps `canonical()` stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchFingerprint {
    query: String,
    genre: Option<String>,
    publication_year: Option<[i32; 2]>,
    page: u32,
    limit: u32,
}

impl SearchFingerprint {
    pub fn new(filter: &BookSearchFilter, page: PageRequest) -> Self {
        Self {
            query: filter.query.clone(),
            genre: filter.genre.clone(),
            publication_year: filter.publication_year.map(|range| [range.start, range.end]),
            page: page.page(),
            limit: page.limit(),
        }
    }

    pub fn canonical(&self) -> String {
        // Only strings, integers and nulls: serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical().as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn cache_key(&self, prefix: &str) -> String {
        format!("{prefix}search:{}", self.digest())
    }
}
