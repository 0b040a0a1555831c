//! GraphQL object and input types mirroring the domain records.

use async_graphql::{Enum, ID, InputObject, SimpleObject};
use time::OffsetDateTime;

use crate::application::pagination::{DEFAULT_LIMIT, DEFAULT_PAGE, Page, PageInfo, PaginationInput};
use crate::application::search::{self, ResultSource, SearchFilters};
use crate::domain::entities::{AuthorRecord, AuthorWithBooks, BookRecord, CommentRecord};
use crate::domain::types::Role;

#[derive(Enum, Copy, Clone, Debug, PartialEq, Eq)]
#[graphql(name = "UserRole")]
pub enum UserRole {
    Writer,
    Moderator,
    Consumer,
}

impl From<Role> for UserRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Writer => UserRole::Writer,
            Role::Moderator => UserRole::Moderator,
            Role::Consumer => UserRole::Consumer,
        }
    }
}

#[derive(Enum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum SearchSource {
    Cache,
    Database,
}

impl From<ResultSource> for SearchSource {
    fn from(source: ResultSource) -> Self {
        match source {
            ResultSource::Cache => SearchSource::Cache,
            ResultSource::Database => SearchSource::Database,
        }
    }
}

#[derive(SimpleObject, Clone, Debug)]
pub struct Author {
    pub id: ID,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<AuthorRecord> for Author {
    fn from(record: AuthorRecord) -> Self {
        Self {
            id: ID(record.id.to_string()),
            first_name: record.first_name,
            last_name: record.last_name,
            email: record.email,
            role: record.role.into(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// An author together with the books they wrote.
#[derive(SimpleObject, Clone, Debug)]
pub struct AuthorProfile {
    #[graphql(flatten)]
    pub author: Author,
    pub books: Vec<Book>,
}

impl From<AuthorWithBooks> for AuthorProfile {
    fn from(record: AuthorWithBooks) -> Self {
        Self {
            author: record.author.into(),
            books: record.books.into_iter().map(Book::from).collect(),
        }
    }
}

#[derive(SimpleObject, Clone, Debug)]
pub struct Comment {
    pub id: ID,
    pub book_id: ID,
    pub content: String,
    pub rating: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<CommentRecord> for Comment {
    fn from(record: CommentRecord) -> Self {
        Self {
            id: ID(record.id.to_string()),
            book_id: ID(record.book_id.to_string()),
            content: record.content,
            rating: record.rating.get(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(SimpleObject, Clone, Debug)]
pub struct Book {
    pub id: ID,
    pub title: String,
    pub description: String,
    pub cover: Option<String>,
    pub pages: Option<i32>,
    pub genre: Option<String>,
    pub publication_year: Option<i32>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub authors: Vec<Author>,
    pub comments: Vec<Comment>,
}

impl From<BookRecord> for Book {
    fn from(record: BookRecord) -> Self {
        Self {
            id: ID(record.id.to_string()),
            title: record.title,
            description: record.description,
            cover: record.cover,
            pages: record.pages,
            genre: record.genre,
            publication_year: record.publication_year,
            created_at: record.created_at,
            updated_at: record.updated_at,
            authors: record.authors.into_iter().map(Author::from).collect(),
            comments: record.comments.into_iter().map(Comment::from).collect(),
        }
    }
}

#[derive(SimpleObject, Clone, Debug, PartialEq, Eq)]
#[graphql(name = "PaginationObject")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub last_page: u64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl From<PageInfo> for Pagination {
    fn from(info: PageInfo) -> Self {
        Self {
            page: info.page,
            limit: info.limit,
            total: info.total,
            last_page: info.last_page,
            has_next_page: info.has_next_page,
            has_previous_page: info.has_previous_page,
        }
    }
}

#[derive(SimpleObject, Clone, Debug)]
pub struct SearchBooksResult {
    pub books: Vec<Book>,
    pub pagination: Pagination,
    pub source: SearchSource,
    pub cache_key: String,
}

impl From<search::SearchBooksResult> for SearchBooksResult {
    fn from(result: search::SearchBooksResult) -> Self {
        Self {
            books: result.books.into_iter().map(Book::from).collect(),
            pagination: result.pagination.into(),
            source: result.source.into(),
            cache_key: result.cache_key,
        }
    }
}

#[derive(SimpleObject, Clone, Debug)]
pub struct BookPage {
    pub items: Vec<Book>,
    pub pagination: Pagination,
}

impl From<Page<BookRecord>> for BookPage {
    fn from(page: Page<BookRecord>) -> Self {
        Self {
            items: page.items.into_iter().map(Book::from).collect(),
            pagination: page.info.into(),
        }
    }
}

#[derive(SimpleObject, Clone, Debug)]
pub struct AuthorPage {
    pub items: Vec<Author>,
    pub pagination: Pagination,
}

impl From<Page<AuthorRecord>> for AuthorPage {
    fn from(page: Page<AuthorRecord>) -> Self {
        Self {
            items: page.items.into_iter().map(Author::from).collect(),
            pagination: page.info.into(),
        }
    }
}

#[derive(InputObject, Clone, Debug, Default)]
pub struct SearchFiltersInput {
    pub genre: Option<String>,
    /// `[from, to]`, inclusive; any other length is ignored.
    pub publication_year: Option<Vec<i32>>,
}

#[derive(InputObject, Clone, Debug)]
pub struct SearchBooksInput {
    pub query: String,
    pub filters: Option<SearchFiltersInput>,
    #[graphql(default_with = "DEFAULT_PAGE as i32")]
    pub page: i32,
    #[graphql(default_with = "DEFAULT_LIMIT as i32")]
    pub limit: i32,
}

impl From<SearchBooksInput> for search::SearchBooksInput {
    fn from(input: SearchBooksInput) -> Self {
        Self {
            query: input.query,
            filters: input.filters.map(|filters| SearchFilters {
                genre: filters.genre,
                publication_year: filters.publication_year,
            }),
            pagination: PaginationInput::new(Some(input.page), Some(input.limit)),
        }
    }
}

#[derive(InputObject, Clone, Debug)]
#[graphql(name = "PaginationInput")]
pub struct PaginationArgs {
    #[graphql(default_with = "DEFAULT_PAGE as i32")]
    pub page: i32,
    #[graphql(default_with = "DEFAULT_LIMIT as i32")]
    pub limit: i32,
}

impl From<Option<PaginationArgs>> for PaginationInput {
    fn from(args: Option<PaginationArgs>) -> Self {
        match args {
            Some(args) => PaginationInput::new(Some(args.page), Some(args.limit)),
            None => PaginationInput::default(),
        }
    }
}
