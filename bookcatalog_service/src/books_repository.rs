pub use in_memory_books_repository::InMemoryBookRepository;
pub use postgres_books_repository::{PostgresBooksRepository, PostgresBooksRepositoryConfig};

use crate::api::{Book, BookId, NewBook};
use crate::catalog::CatalogError;
use crate::columns::{BookColumn, SearchFilter, SortOrder};

mod in_memory_books_repository;
mod postgres_books_repository;

#[derive(thiserror::Error, Debug)]
pub enum BookRepositoryError {
    #[error("DatabaseFailure failure {0}")]
    DatabaseFailure(#[from] tokio_postgres::Error),

    /// Batch refused by the merge step, nothing was written
    #[error("Batch rejected: {0}")]
    Rejected(Box<CatalogError>),

    #[error("Other error {0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Resolved list query, every column in it is allow-listed
pub struct ListRequest {
    pub sort: BookColumn,
    pub order: SortOrder,
    pub filter: Option<SearchFilter>,
    /// Restricts the listing to a single book
    pub id: Option<BookId>,
    pub offset: u64,
    pub limit: u64,
}

impl Default for ListRequest {
    fn default() -> Self {
        Self {
            sort: BookColumn::Id,
            order: SortOrder::Asc,
            filter: None,
            id: None,
            offset: 0,
            limit: 10,
        }
    }
}

impl ListRequest {
    pub fn matches(&self, book: &Book) -> bool {
        self.id.map(|id| id == book.id).unwrap_or(true)
            && self
                .filter
                .as_ref()
                .map(|filter| filter.matches(book))
                .unwrap_or(true)
    }
}

/// Merge step of an upsert. Receives the stored rows of the batch ids and
/// returns the rows to write
pub type MergeBatch = Box<dyn FnOnce(Vec<Book>) -> Result<Vec<Book>, CatalogError> + Send>;

#[async_trait::async_trait]
pub trait BookRepository: Send + Sync {
    /// Returns the requested page and the number of books matching the filter
    async fn list_books(&self, request: &ListRequest)
        -> Result<(Vec<Book>, u64), BookRepositoryError>;
    /// Inserts all books in one statement, returns number of inserted rows
    async fn insert_books(&self, books: Vec<NewBook>) -> Result<u64, BookRepositoryError>;
    /// Reads the books with given ids, merges them with `merge` and writes the result
    /// as insert or overwrite. Read and write happen in one transaction
    async fn upsert_books(
        &self,
        ids: Vec<BookId>,
        merge: MergeBatch,
    ) -> Result<u64, BookRepositoryError>;
    /// Deletes the books which exist among `ids`, returns how many were deleted
    async fn delete_books(&self, ids: &[BookId]) -> Result<u64, BookRepositoryError>;
}
