use std::sync::Arc;
use std::time::Duration;

use bookshelf::application::catalog::{CatalogError, CatalogService, CreateCommentCommand};
use bookshelf::application::pagination::{PageRequest, PaginationInput};
use bookshelf::application::repos::{
    AuthorsRepo, BookSearchFilter, BooksRepo, CommentsRepo, CreateCommentParams, RepoError,
    YearRange,
};
use bookshelf::application::search::{
    ResultSource, SearchBooksInput, SearchFilters, SearchService,
};
use bookshelf::cache::{CacheConfig, MemorySearchCache};
use bookshelf::domain::error::DomainError;
use bookshelf::domain::types::Rating;
use bookshelf::infra::db::PostgresRepositories;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use uuid::Uuid;

const DUNE: &str = "00000000-0000-4000-9000-000000000001";
const URSULA: &str = "00000000-0000-4000-8000-000000000002";

fn id(value: &str) -> Uuid {
    Uuid::parse_str(value).expect("fixture id")
}

fn titles(books: &[bookshelf::domain::entities::BookRecord]) -> Vec<&str> {
    books.iter().map(|book| book.title.as_str()).collect()
}

fn query(text: &str) -> BookSearchFilter {
    BookSearchFilter {
        query: text.to_string(),
        ..Default::default()
    }
}

fn first_page() -> PageRequest {
    PageRequest::new(1, 20).expect("valid page")
}

#[sqlx::test(migrations = "./migrations", fixtures("catalog"))]
async fn search_matches_titles_case_insensitively(pool: PgPool) {
    let repo = PostgresRepositories::new(pool);

    let found = repo.search_books(&query("DUNE"), first_page()).await.unwrap();

    assert_eq!(found.total, 2);
    assert_eq!(titles(&found.items), ["Children of Dune", "Dune"]);
}

#[sqlx::test(migrations = "./migrations", fixtures("catalog"))]
async fn search_matches_author_names_and_skips_deleted_books(pool: PgPool) {
    let repo = PostgresRepositories::new(pool);

    let found = repo.search_books(&query("le guin"), first_page()).await.unwrap();
    assert_eq!(
        titles(&found.items),
        ["A Wizard of Earthsea", "The Left Hand of Darkness"]
    );

    // deleted authors do not match
    let ghost = repo.search_books(&query("casper"), first_page()).await.unwrap();
    assert_eq!(ghost.total, 0);
    assert!(ghost.items.is_empty());
}

#[sqlx::test(migrations = "./migrations", fixtures("catalog"))]
async fn genre_and_year_filters_narrow_results(pool: PgPool) {
    let repo = PostgresRepositories::new(pool);

    let fantasy = repo
        .search_books(
            &BookSearchFilter {
                query: String::new(),
                genre: Some("Fantasy".to_string()),
                publication_year: None,
            },
            first_page(),
        )
        .await
        .unwrap();
    assert_eq!(titles(&fantasy.items), ["A Wizard of Earthsea"]);

    let sixties = repo
        .search_books(
            &BookSearchFilter {
                query: String::new(),
                genre: None,
                publication_year: YearRange::from_slice(&[1965, 1969]),
            },
            first_page(),
        )
        .await
        .unwrap();
    assert_eq!(sixties.total, 3);
    assert_eq!(
        titles(&sixties.items),
        ["A Wizard of Earthsea", "Dune", "The Left Hand of Darkness"]
    );

    let reversed = repo
        .search_books(
            &BookSearchFilter {
                query: String::new(),
                genre: None,
                publication_year: YearRange::from_slice(&[1969, 1965]),
            },
            first_page(),
        )
        .await
        .unwrap();
    assert_eq!(reversed.total, 0);
}

#[sqlx::test(migrations = "./migrations", fixtures("catalog"))]
async fn pages_are_ordered_by_title_and_total_ignores_limit(pool: PgPool) {
    let repo = PostgresRepositories::new(pool);

    let page = repo
        .search_books(&query(""), PageRequest::new(2, 2).unwrap())
        .await
        .unwrap();

    assert_eq!(page.total, 5);
    assert_eq!(titles(&page.items), ["Dune", "Ghost Stories"]);

    let beyond = repo
        .search_books(&query(""), PageRequest::new(9, 2).unwrap())
        .await
        .unwrap();
    assert_eq!(beyond.total, 5);
    assert!(beyond.items.is_empty());
}

#[sqlx::test(migrations = "./migrations", fixtures("catalog"))]
async fn relations_exclude_soft_deleted_rows(pool: PgPool) {
    let repo = PostgresRepositories::new(pool);

    let dune = repo.find_book(id(DUNE)).await.unwrap().expect("dune exists");
    assert_eq!(dune.authors.len(), 1);
    assert_eq!(dune.authors[0].last_name, "Herbert");
    assert_eq!(dune.comments.len(), 1);
    assert_eq!(dune.comments[0].rating.get(), 5);

    let ghost = repo.search_books(&query("ghost"), first_page()).await.unwrap();
    assert_eq!(titles(&ghost.items), ["Ghost Stories"]);
    assert!(ghost.items[0].authors.is_empty());

    let lost = repo
        .find_book(id("00000000-0000-4000-9000-000000000005"))
        .await
        .unwrap();
    assert!(lost.is_none());
}

#[sqlx::test(migrations = "./migrations", fixtures("catalog"))]
async fn authors_are_users_with_live_books(pool: PgPool) {
    let repo = PostgresRepositories::new(pool);

    let authors = repo.list_authors(first_page()).await.unwrap();
    assert_eq!(authors.total, 2);
    let names: Vec<_> = authors
        .items
        .iter()
        .map(|author| author.last_name.as_str())
        .collect();
    assert_eq!(names, ["Herbert", "Le Guin"]);

    let ursula = repo.find_author(id(URSULA)).await.unwrap().expect("author");
    assert_eq!(ursula.author.first_name, "Ursula");
    assert_eq!(
        titles(&ursula.books),
        ["A Wizard of Earthsea", "The Left Hand of Darkness"]
    );

    assert!(repo.find_author(Uuid::new_v4()).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations", fixtures("catalog"))]
async fn comments_are_persisted_and_foreign_keys_enforced(pool: PgPool) {
    let repo = PostgresRepositories::new(pool);

    let comment = repo
        .create_comment(CreateCommentParams {
            book_id: id(DUNE),
            content: "Read it twice".to_string(),
            rating: Rating::new(4).unwrap(),
        })
        .await
        .unwrap();
    assert_eq!(comment.book_id, id(DUNE));
    assert_eq!(comment.rating.get(), 4);

    let dune = repo.find_book(id(DUNE)).await.unwrap().unwrap();
    assert_eq!(dune.comments.len(), 2);

    let orphan = repo
        .create_comment(CreateCommentParams {
            book_id: Uuid::new_v4(),
            content: "Nowhere".to_string(),
            rating: Rating::default(),
        })
        .await;
    assert!(matches!(orphan, Err(RepoError::InvalidInput { .. })));
}

#[sqlx::test(migrations = "./migrations", fixtures("catalog"))]
async fn search_service_serves_repeat_queries_from_cache(pool: PgPool) {
    let repo = Arc::new(PostgresRepositories::new(pool));
    let service = SearchService::new(
        repo,
        Arc::new(MemorySearchCache::new(&CacheConfig::default())),
        "it:",
    );
    let input = SearchBooksInput {
        query: "dune".to_string(),
        filters: Some(SearchFilters {
            genre: Some("Sci-Fi".to_string()),
            publication_year: None,
        }),
        pagination: PaginationInput::new(Some(1), Some(1)),
    };

    let first = service.search(input.clone()).await.unwrap();
    assert_eq!(first.source, ResultSource::Database);
    assert_eq!(titles(&first.books), ["Children of Dune"]);
    assert_eq!(first.pagination.total, 2);
    assert_eq!(first.pagination.last_page, 2);
    assert!(first.pagination.has_next_page);
    assert!(first.cache_key.starts_with("it:search:"));

    let second = service.search(input).await.unwrap();
    assert_eq!(second.source, ResultSource::Cache);
    assert_eq!(second.cache_key, first.cache_key);
    assert_eq!(titles(&second.books), ["Children of Dune"]);
    assert_eq!(second.pagination, first.pagination);
}

#[sqlx::test(migrations = "./migrations", fixtures("catalog"))]
async fn catalog_rejects_comments_for_missing_books(pool: PgPool) {
    let repo = Arc::new(PostgresRepositories::new(pool));
    let catalog = CatalogService::new(repo.clone(), repo.clone(), repo);

    let created = catalog
        .create_comment(CreateCommentCommand {
            book_id: id(DUNE),
            content: "Worth the sand".to_string(),
            rating: None,
        })
        .await
        .unwrap();
    assert_eq!(created.rating.get(), 1);

    let missing = catalog
        .create_comment(CreateCommentCommand {
            book_id: Uuid::new_v4(),
            content: "Anyone?".to_string(),
            rating: Some(3),
        })
        .await;
    assert!(matches!(
        missing,
        Err(CatalogError::Domain(DomainError::NotFound { entity: "Book", .. }))
    ));
}

#[sqlx::test(migrations = "./migrations")]
async fn exhausted_pool_surfaces_as_timeout(
    pool_options: PgPoolOptions,
    connect_options: PgConnectOptions,
) {
    let pool = pool_options
        .max_connections(1)
        .acquire_timeout(Duration::from_millis(100))
        .connect_with(connect_options)
        .await
        .unwrap();
    let _held = pool.acquire().await.unwrap();
    let repo = PostgresRepositories::new(pool.clone());

    let search = repo.search_books(&query("dune"), first_page()).await;
    assert!(matches!(search, Err(RepoError::Timeout)), "{search:?}");

    let authors = repo.list_authors(first_page()).await;
    assert!(matches!(authors, Err(RepoError::Timeout)), "{authors:?}");
}
