use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bookshelf::application::pagination::{PageRequest, PaginationInput};
use bookshelf::application::repos::{BookSearchFilter, BooksRepo, Counted, RepoError};
use bookshelf::application::search::{ResultSource, SearchBooksInput, SearchService};
use bookshelf::cache::{CacheConfig, MemorySearchCache};
use bookshelf::domain::entities::BookRecord;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use serial_test::serial;
use uuid::Uuid;

#[derive(Default)]
struct SlowBooks {
    queries: AtomicUsize,
}

#[async_trait]
impl BooksRepo for SlowBooks {
    async fn search_books(
        &self,
        _filter: &BookSearchFilter,
        _page: PageRequest,
    ) -> Result<Counted<BookRecord>, RepoError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(Counted {
            items: Vec::new(),
            total: 0,
        })
    }

    async fn list_books(&self, _page: PageRequest) -> Result<Counted<BookRecord>, RepoError> {
        Ok(Counted {
            items: Vec::new(),
            total: 0,
        })
    }

    async fn find_book(&self, _id: Uuid) -> Result<Option<BookRecord>, RepoError> {
        Ok(None)
    }
}

fn input() -> SearchBooksInput {
    SearchBooksInput {
        query: "earthsea".to_string(),
        filters: None,
        pagination: PaginationInput::default(),
    }
}

#[tokio::test]
#[serial]
async fn search_paths_emit_expected_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let books = Arc::new(SlowBooks::default());
    let service = SearchService::new(
        books.clone(),
        Arc::new(MemorySearchCache::new(&CacheConfig::default())),
        "metrics:",
    );

    // two identical searches race: one queries, the other joins it
    let (leader, follower) = tokio::join!(service.search(input()), service.search(input()));
    assert_eq!(leader.unwrap().source, ResultSource::Database);
    assert_eq!(follower.unwrap().source, ResultSource::Database);
    assert_eq!(books.queries.load(Ordering::SeqCst), 1);

    let cached = service.search(input()).await.unwrap();
    assert_eq!(cached.source, ResultSource::Cache);

    let mut counters: HashMap<String, u64> = HashMap::new();
    let mut histograms: HashMap<String, usize> = HashMap::new();
    for (key, _, _, value) in snapshotter.snapshot().into_vec() {
        let name = key.key().name().to_string();
        match value {
            DebugValue::Counter(count) => {
                *counters.entry(name).or_default() += count;
            }
            DebugValue::Histogram(samples) => {
                *histograms.entry(name).or_default() += samples.len();
            }
            DebugValue::Gauge(_) => {}
        }
    }

    assert_eq!(counters.get("bookshelf_search_cache_miss_total"), Some(&2));
    assert_eq!(
        counters.get("bookshelf_search_inflight_joined_total"),
        Some(&1)
    );
    assert_eq!(counters.get("bookshelf_search_cache_hit_total"), Some(&1));
    assert!(!counters.contains_key("bookshelf_search_cache_error_total"));
    assert_eq!(histograms.get("bookshelf_search_db_ms"), Some(&1));
}
