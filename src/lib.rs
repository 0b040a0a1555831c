//! Bookshelf: a GraphQL catalog of books, authors, and reader comments.
//!
//! Searches flow through [`application::search::SearchService`], which keys
//! results by a [`cache::SearchFingerprint`], consults the shared cache, and
//! collapses identical concurrent queries before touching Postgres.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
