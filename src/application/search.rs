//! Book search pipeline: cache lookup, in-flight de-duplication, database query.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::application::pagination::{PageInfo, PageRequest, PaginationError, PaginationInput};
use crate::application::repos::{BookSearchFilter, BooksRepo, RepoError, YearRange};
use crate::cache::{CachedSearch, InFlight, Participation, SearchCache, SearchFingerprint};
use crate::domain::entities::BookRecord;

const METRIC_CACHE_HIT: &str = "bookshelf_search_cache_hit_total";
const METRIC_CACHE_MISS: &str = "bookshelf_search_cache_miss_total";
const METRIC_CACHE_ERROR: &str = "bookshelf_search_cache_error_total";
const METRIC_INFLIGHT_JOINED: &str = "bookshelf_search_inflight_joined_total";
const METRIC_DB_MS: &str = "bookshelf_search_db_ms";

#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub genre: Option<String>,
    pub publication_year: Option<Vec<i32>>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchBooksInput {
    pub query: String,
    pub filters: Option<SearchFilters>,
    pub pagination: PaginationInput,
}

impl SearchBooksInput {
    /// Blank genres are ignored and only a two-element year list becomes a range.
    pub fn to_filter(&self) -> BookSearchFilter {
        let filters = self.filters.as_ref();
        BookSearchFilter {
            query: self.query.clone(),
            genre: filters
                .and_then(|f| f.genre.clone())
                .filter(|genre| !genre.is_empty()),
            publication_year: filters
                .and_then(|f| f.publication_year.as_deref())
                .and_then(YearRange::from_slice),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Cache,
    Database,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchBooksResult {
    pub books: Vec<BookRecord>,
    pub pagination: PageInfo,
    pub source: ResultSource,
    pub cache_key: String,
}

#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error("book search failed: {0}")]
    Repo(Arc<RepoError>),
}

impl From<RepoError> for SearchError {
    fn from(err: RepoError) -> Self {
        Self::Repo(Arc::new(err))
    }
}

pub type InFlightSearches = InFlight<Result<CachedSearch, SearchError>>;

pub struct SearchService {
    books: Arc<dyn BooksRepo>,
    cache: Arc<dyn SearchCache>,
    inflight: InFlightSearches,
    key_prefix: String,
}

impl SearchService {
    pub fn new(
        books: Arc<dyn BooksRepo>,
        cache: Arc<dyn SearchCache>,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            books,
            cache,
            inflight: InFlightSearches::new(),
            key_prefix: key_prefix.into(),
        }
    }

    #[instrument(skip_all, fields(query = %input.query))]
    pub async fn search(&self, input: SearchBooksInput) -> Result<SearchBooksResult, SearchError> {
        let page = PageRequest::from_input(input.pagination)?;
        let filter = input.to_filter();
        let cache_key = SearchFingerprint::new(&filter, page).cache_key(&self.key_prefix);

        if let Some(hit) = self.lookup(&cache_key).await {
            counter!(METRIC_CACHE_HIT).increment(1);
            debug!(%cache_key, total = hit.total, "Search served from cache");
            return Ok(assemble(hit, page, ResultSource::Cache, cache_key));
        }
        counter!(METRIC_CACHE_MISS).increment(1);

        let books = Arc::clone(&self.books);
        let cache = Arc::clone(&self.cache);
        let key = cache_key.clone();
        let (outcome, participation) = self
            .inflight
            .run(&cache_key, move || execute(books, cache, key, filter, page))
            .await;

        if participation == Participation::Joined {
            counter!(METRIC_INFLIGHT_JOINED).increment(1);
            debug!(%cache_key, "Joined in-flight search");
        }

        let payload = outcome?;
        Ok(assemble(payload, page, ResultSource::Database, cache_key))
    }

    /// Cache failures degrade to a miss.
    async fn lookup(&self, cache_key: &str) -> Option<CachedSearch> {
        match self.cache.get(cache_key).await {
            Ok(hit) => hit,
            Err(err) => {
                counter!(METRIC_CACHE_ERROR).increment(1);
                warn!(cache_key, error = %err, "Search cache read failed");
                None
            }
        }
    }
}

async fn execute(
    books: Arc<dyn BooksRepo>,
    cache: Arc<dyn SearchCache>,
    cache_key: String,
    filter: BookSearchFilter,
    page: PageRequest,
) -> Result<CachedSearch, SearchError> {
    let started = Instant::now();
    let counted = books.search_books(&filter, page).await?;
    histogram!(METRIC_DB_MS).record(started.elapsed().as_secs_f64() * 1000.0);

    let payload = CachedSearch {
        books: counted.items,
        total: counted.total,
    };

    if let Err(err) = cache.set(&cache_key, &payload).await {
        counter!(METRIC_CACHE_ERROR).increment(1);
        warn!(%cache_key, error = %err, "Search cache write failed");
    }

    Ok(payload)
}

fn assemble(
    payload: CachedSearch,
    page: PageRequest,
    source: ResultSource,
    cache_key: String,
) -> SearchBooksResult {
    SearchBooksResult {
        pagination: PageInfo::new(page, payload.total),
        books: payload.books,
        source,
        cache_key,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use time::OffsetDateTime;
    use tokio::sync::Notify;
    use uuid::Uuid;

    use super::*;
    use crate::application::repos::Counted;
    use crate::cache::{CacheConfig, CacheError, MemorySearchCache};

    fn book(title: &str) -> BookRecord {
        let now = OffsetDateTime::now_utc();
        BookRecord {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: "Test description".to_string(),
            cover: None,
            pages: Some(200),
            genre: Some("Fiction".to_string()),
            publication_year: Some(2020),
            created_at: now,
            updated_at: now,
            authors: Vec::new(),
            comments: Vec::new(),
        }
    }

    /// Records every search and optionally blocks until released.
    #[derive(Default)]
    struct StubBooksRepo {
        books: Vec<BookRecord>,
        total: u64,
        fail: bool,
        gate: Option<Arc<Notify>>,
        calls: AtomicUsize,
        seen: Mutex<Vec<(BookSearchFilter, PageRequest)>>,
    }

    impl StubBooksRepo {
        fn returning(books: Vec<BookRecord>, total: u64) -> Self {
            Self {
                books,
                total,
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last_filter(&self) -> BookSearchFilter {
            self.seen.lock().unwrap().last().cloned().unwrap().0
        }
    }

    #[async_trait]
    impl BooksRepo for StubBooksRepo {
        async fn search_books(
            &self,
            filter: &BookSearchFilter,
            page: PageRequest,
        ) -> Result<Counted<BookRecord>, RepoError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push((filter.clone(), page));
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(RepoError::from_persistence("Database error"));
            }
            Ok(Counted {
                items: self.books.clone(),
                total: self.total,
            })
        }

        async fn list_books(&self, _page: PageRequest) -> Result<Counted<BookRecord>, RepoError> {
            unreachable!("not used in these tests")
        }

        async fn find_book(&self, _id: Uuid) -> Result<Option<BookRecord>, RepoError> {
            unreachable!("not used in these tests")
        }
    }

    /// In-memory cache that counts reads and writes.
    struct RecordingCache {
        inner: MemorySearchCache,
        gets: AtomicUsize,
        sets: AtomicUsize,
        broken: bool,
    }

    impl RecordingCache {
        fn new() -> Self {
            Self {
                inner: MemorySearchCache::new(&CacheConfig::default()),
                gets: AtomicUsize::new(0),
                sets: AtomicUsize::new(0),
                broken: false,
            }
        }

        fn broken() -> Self {
            Self {
                broken: true,
                ..Self::new()
            }
        }

        fn sets(&self) -> usize {
            self.sets.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SearchCache for RecordingCache {
        async fn get(&self, key: &str) -> Result<Option<CachedSearch>, CacheError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            if self.broken {
                return Err(CacheError::backend("connection refused"));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &CachedSearch) -> Result<(), CacheError> {
            self.sets.fetch_add(1, Ordering::SeqCst);
            if self.broken {
                return Err(CacheError::backend("connection refused"));
            }
            self.inner.set(key, value).await
        }

        async fn clear(&self) -> Result<(), CacheError> {
            self.inner.clear().await
        }
    }

    fn service(repo: &Arc<StubBooksRepo>, cache: &Arc<RecordingCache>) -> SearchService {
        SearchService::new(
            Arc::clone(repo) as Arc<dyn BooksRepo>,
            Arc::clone(cache) as Arc<dyn SearchCache>,
            "test:",
        )
    }

    fn input(query: &str) -> SearchBooksInput {
        SearchBooksInput {
            query: query.to_string(),
            ..Default::default()
        }
    }

    fn with_filters(query: &str, genre: Option<&str>, years: Option<Vec<i32>>) -> SearchBooksInput {
        SearchBooksInput {
            query: query.to_string(),
            filters: Some(SearchFilters {
                genre: genre.map(str::to_string),
                publication_year: years,
            }),
            pagination: PaginationInput::default(),
        }
    }

    #[tokio::test]
    async fn miss_queries_database_and_populates_cache() {
        let repo = Arc::new(StubBooksRepo::returning(vec![book("Test Book")], 1));
        let cache = Arc::new(RecordingCache::new());
        let service = service(&repo, &cache);

        let result = service.search(input("test")).await.expect("search");

        assert_eq!(result.source, ResultSource::Database);
        assert_eq!(result.books.len(), 1);
        assert_eq!(result.books[0].title, "Test Book");
        assert_eq!(result.pagination.total, 1);
        assert_eq!(result.pagination.page, 1);
        assert_eq!(result.pagination.limit, 20);
        assert!(result.cache_key.starts_with("test:search:"));
        assert_eq!(repo.calls(), 1);
        assert_eq!(cache.sets(), 1);
    }

    #[tokio::test]
    async fn hit_skips_database_and_cache_write() {
        let repo = Arc::new(StubBooksRepo::returning(vec![book("Test Book")], 1));
        let cache = Arc::new(RecordingCache::new());
        let service = service(&repo, &cache);

        let first = service.search(input("test")).await.unwrap();
        let second = service.search(input("test")).await.unwrap();

        assert_eq!(second.source, ResultSource::Cache);
        assert_eq!(second.cache_key, first.cache_key);
        assert_eq!(second.books, first.books);
        assert_eq!(second.pagination, first.pagination);
        assert_eq!(repo.calls(), 1);
        assert_eq!(cache.sets(), 1);
    }

    #[tokio::test]
    async fn passes_query_and_filters_to_repository() {
        let repo = Arc::new(StubBooksRepo::default());
        let cache = Arc::new(RecordingCache::new());
        let service = service(&repo, &cache);

        service
            .search(with_filters("test", Some("Fiction"), Some(vec![2000, 2020])))
            .await
            .unwrap();

        assert_eq!(
            repo.last_filter(),
            BookSearchFilter {
                query: "test".to_string(),
                genre: Some("Fiction".to_string()),
                publication_year: Some(YearRange {
                    start: 2000,
                    end: 2020
                }),
            }
        );
    }

    #[tokio::test]
    async fn ignores_year_filter_without_exactly_two_years() {
        let repo = Arc::new(StubBooksRepo::default());
        let cache = Arc::new(RecordingCache::new());
        let service = service(&repo, &cache);

        service
            .search(with_filters("test", None, Some(vec![2000])))
            .await
            .unwrap();
        assert_eq!(repo.last_filter().publication_year, None);

        service
            .search(with_filters("test", None, Some(vec![2000, 2010, 2020])))
            .await
            .unwrap();
        assert_eq!(repo.last_filter().publication_year, None);
    }

    #[tokio::test]
    async fn empty_and_special_queries_pass_through_verbatim() {
        let repo = Arc::new(StubBooksRepo::default());
        let cache = Arc::new(RecordingCache::new());
        let service = service(&repo, &cache);

        let result = service.search(input("")).await.unwrap();
        assert_eq!(repo.last_filter().query, "");
        assert_eq!(result.pagination.total, 0);
        assert_eq!(result.pagination.last_page, 0);

        service.search(input("test%_'\"")).await.unwrap();
        assert_eq!(repo.last_filter().query, "test%_'\"");
    }

    #[tokio::test]
    async fn different_inputs_use_different_keys() {
        let repo = Arc::new(StubBooksRepo::default());
        let cache = Arc::new(RecordingCache::new());
        let service = service(&repo, &cache);

        let plain = service.search(input("test")).await.unwrap();
        let other_query = service.search(input("other")).await.unwrap();
        let filtered = service
            .search(with_filters("test", Some("Fiction"), None))
            .await
            .unwrap();

        assert_ne!(plain.cache_key, other_query.cache_key);
        assert_ne!(plain.cache_key, filtered.cache_key);
        assert_eq!(repo.calls(), 3);
    }

    #[tokio::test]
    async fn concurrent_identical_searches_share_one_query() {
        let gate = Arc::new(Notify::new());
        let repo = Arc::new(StubBooksRepo {
            books: vec![book("Test Book")],
            total: 1,
            gate: Some(Arc::clone(&gate)),
            ..Default::default()
        });
        let cache = Arc::new(RecordingCache::new());
        let service = service(&repo, &cache);

        let release = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            gate.notify_waiters();
        };
        let (a, b, c, ()) = tokio::join!(
            service.search(input("test")),
            service.search(input("test")),
            service.search(input("test")),
            release,
        );

        for result in [a, b, c] {
            let result = result.expect("search");
            assert_eq!(result.source, ResultSource::Database);
            assert_eq!(result.books.len(), 1);
        }
        assert_eq!(repo.calls(), 1);
        assert_eq!(cache.sets(), 1);
    }

    #[tokio::test]
    async fn concurrent_different_searches_are_not_merged() {
        let gate = Arc::new(Notify::new());
        let repo = Arc::new(StubBooksRepo {
            gate: Some(Arc::clone(&gate)),
            ..Default::default()
        });
        let cache = Arc::new(RecordingCache::new());
        let service = service(&repo, &cache);

        let release = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            gate.notify_waiters();
        };
        let (a, b, ()) = tokio::join!(
            service.search(input("test1")),
            service.search(input("test2")),
            release,
        );

        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(repo.calls(), 2);
    }

    #[tokio::test]
    async fn repeated_search_after_completion_runs_again_without_cache() {
        let repo = Arc::new(StubBooksRepo::default());
        let cache = Arc::new(RecordingCache::broken());
        let service = service(&repo, &cache);

        service.search(input("test")).await.unwrap();
        service.search(input("test")).await.unwrap();

        assert_eq!(repo.calls(), 2);
        assert!(service.inflight.is_empty());
    }

    #[tokio::test]
    async fn cache_failures_fall_back_to_database() {
        let repo = Arc::new(StubBooksRepo::returning(vec![book("Test Book")], 1));
        let cache = Arc::new(RecordingCache::broken());
        let service = service(&repo, &cache);

        let result = service.search(input("test")).await.expect("search");

        assert_eq!(result.source, ResultSource::Database);
        assert_eq!(result.books.len(), 1);
        assert_eq!(cache.sets(), 1);
    }

    #[tokio::test]
    async fn database_errors_propagate_to_every_waiter() {
        let gate = Arc::new(Notify::new());
        let repo = Arc::new(StubBooksRepo {
            fail: true,
            gate: Some(Arc::clone(&gate)),
            ..Default::default()
        });
        let cache = Arc::new(RecordingCache::new());
        let service = service(&repo, &cache);

        let release = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            gate.notify_waiters();
        };
        let (a, b, ()) = tokio::join!(
            service.search(input("test")),
            service.search(input("test")),
            release,
        );

        for result in [a, b] {
            let err = result.expect_err("search should fail");
            assert!(matches!(err, SearchError::Repo(_)));
            assert!(err.to_string().contains("Database error"));
        }
        assert_eq!(repo.calls(), 1);
        assert_eq!(cache.sets(), 0);
        assert!(service.inflight.is_empty());
    }

    #[tokio::test]
    async fn page_info_is_computed_from_request() {
        let repo = Arc::new(StubBooksRepo::returning(vec![book("Test Book")], 100));
        let cache = Arc::new(RecordingCache::new());
        let service = service(&repo, &cache);

        let request = SearchBooksInput {
            query: "test".to_string(),
            filters: None,
            pagination: PaginationInput::new(Some(2), Some(10)),
        };
        let fresh = service.search(request.clone()).await.unwrap();
        let cached = service.search(request).await.unwrap();

        for result in [fresh, cached] {
            assert_eq!(result.pagination.page, 2);
            assert_eq!(result.pagination.limit, 10);
            assert_eq!(result.pagination.total, 100);
            assert_eq!(result.pagination.last_page, 10);
            assert!(result.pagination.has_next_page);
            assert!(result.pagination.has_previous_page);
        }
        let (_, page) = repo.seen.lock().unwrap()[0].clone();
        assert_eq!(page.offset(), 10);
    }

    #[tokio::test]
    async fn rejects_invalid_pagination_before_touching_storage() {
        let repo = Arc::new(StubBooksRepo::default());
        let cache = Arc::new(RecordingCache::new());
        let service = service(&repo, &cache);

        let err = service
            .search(SearchBooksInput {
                pagination: PaginationInput::new(Some(1), Some(500)),
                ..input("test")
            })
            .await
            .expect_err("limit above maximum");

        assert!(matches!(
            err,
            SearchError::Pagination(PaginationError::InvalidLimit(500))
        ));
        assert_eq!(repo.calls(), 0);
        assert_eq!(cache.gets.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn blank_genre_is_not_a_filter() {
        let filter = with_filters("x", Some(""), None).to_filter();
        assert_eq!(filter.genre, None);
    }
}
