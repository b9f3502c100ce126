//! Request level operations of the catalog: resolving list queries and
//! turning create, update and delete payloads into repository calls.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::Value;

use crate::api::{Book, BookId, BookIdsPayload, BooksPayload, ListBooksQuery};
use crate::books_repository::{BookRepository, BookRepositoryError, ListRequest};
use crate::columns::{BookColumn, SearchFilter, SortOrder};
use crate::validation::{self, ValidationErrors};

const DEFAULT_PAGE_LIMIT: u64 = 10;

#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    /// Invalid arguments or missing data, reported to the caller as is
    #[error("{0}")]
    User(String),

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("book {0} not found")]
    NotFound(BookId),

    #[error("no content")]
    NoContent,

    #[error("Data store failure: {0}")]
    Store(BookRepositoryError),
}

impl From<BookRepositoryError> for CatalogError {
    fn from(err: BookRepositoryError) -> Self {
        match err {
            BookRepositoryError::Rejected(err) => *err,
            other => CatalogError::Store(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One page of the listing with its navigation metadata
pub struct BookPage {
    pub books: Vec<Book>,
    pub total: u64,
    pub page: u64,
    pub page_limit: u64,
    pub has_next: bool,
    pub has_previous: bool,
    pub next: Option<String>,
    pub previous: Option<String>,
}

#[derive(Serialize)]
struct PageLink<'a> {
    page: u64,
    page_limit: u64,
    sort: &'a str,
    order: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    search_column: Option<&'a str>,
}

/// List query after allow-listing and defaults
struct ResolvedQuery {
    sort: BookColumn,
    order: SortOrder,
    filter: Option<SearchFilter>,
    page: u64,
    page_limit: u64,
}

impl ResolvedQuery {
    fn resolve(query: &ListBooksQuery) -> Result<Self, CatalogError> {
        let sort = match &query.sort {
            Some(sort) => BookColumn::parse_sort(sort)?,
            None => BookColumn::Id,
        };
        let order = match &query.order {
            Some(order) => SortOrder::parse(order)?,
            None => SortOrder::Asc,
        };
        let filter = match &query.search {
            Some(search) => {
                let column = query.search_column.as_deref().ok_or_else(|| {
                    CatalogError::User("search_column is required with search".to_string())
                })?;
                Some(SearchFilter::new(BookColumn::parse_search(column)?, search)?)
            }
            None => None,
        };
        Ok(Self {
            sort,
            order,
            filter,
            page: positive(query.page, "page", 1)?,
            page_limit: positive(query.page_limit, "page_limit", DEFAULT_PAGE_LIMIT)?,
        })
    }

    fn request(&self) -> ListRequest {
        ListRequest {
            sort: self.sort,
            order: self.order,
            filter: self.filter.clone(),
            id: None,
            // past i64::MAX no store has rows left to skip to
            offset: (self.page - 1)
                .saturating_mul(self.page_limit)
                .min(i64::MAX as u64),
            limit: self.page_limit,
        }
    }

    fn link(&self, page: u64) -> String {
        let link = PageLink {
            page,
            page_limit: self.page_limit,
            sort: self.sort.name(),
            order: self.order.name(),
            search: self.filter.as_ref().map(SearchFilter::value),
            search_column: self.filter.as_ref().map(|filter| filter.column().name()),
        };
        // plain strings and integers always encode
        let query = serde_urlencoded::to_string(&link).unwrap_or_default();
        format!("/books/?{}", query)
    }
}

fn positive(value: Option<i64>, name: &str, default: u64) -> Result<u64, CatalogError> {
    match value {
        None => Ok(default),
        Some(value) if value >= 1 => Ok(value as u64),
        Some(_) => Err(CatalogError::User(format!(
            "{} must be a positive integer",
            name
        ))),
    }
}

#[tracing::instrument(skip(repository))]
pub async fn list_books(
    repository: &dyn BookRepository,
    query: &ListBooksQuery,
) -> Result<BookPage, CatalogError> {
    let resolved = ResolvedQuery::resolve(query)?;
    let (books, total) = repository.list_books(&resolved.request()).await?;

    if books.is_empty() {
        return Err(CatalogError::NoContent);
    }

    let has_next = resolved.page.saturating_mul(resolved.page_limit) < total;
    let has_previous = resolved.page > 1;
    Ok(BookPage {
        books,
        total,
        page: resolved.page,
        page_limit: resolved.page_limit,
        has_next,
        has_previous,
        next: has_next.then(|| resolved.link(resolved.page + 1)),
        previous: has_previous.then(|| resolved.link(resolved.page - 1)),
    })
}

/// Single book lookup. The query is validated like a listing and its search
/// filter still applies
#[tracing::instrument(skip(repository))]
pub async fn get_book(
    repository: &dyn BookRepository,
    book_id: BookId,
    query: &ListBooksQuery,
) -> Result<Book, CatalogError> {
    let resolved = ResolvedQuery::resolve(query)?;
    let request = ListRequest {
        id: Some(book_id),
        offset: 0,
        limit: 1,
        ..resolved.request()
    };
    let (books, _) = repository.list_books(&request).await?;
    books
        .into_iter()
        .next()
        .ok_or(CatalogError::NotFound(book_id))
}

#[tracing::instrument(skip_all)]
pub async fn create_books(
    repository: &dyn BookRepository,
    payload: BooksPayload,
) -> Result<u64, CatalogError> {
    let rows = non_empty(payload.data)?;
    let books = validation::validate_new_books(&rows).map_err(CatalogError::Validation)?;
    let inserted = repository.insert_books(books).await?;
    tracing::info!("Inserted {} books", inserted);
    Ok(inserted)
}

/// Upsert of a single object addressed by the path id, which overrides any
/// id in the object
#[tracing::instrument(skip(repository, object))]
pub async fn update_book(
    repository: &dyn BookRepository,
    book_id: BookId,
    object: Value,
) -> Result<u64, CatalogError> {
    let row = match object {
        Value::Object(mut fields) => {
            fields.insert("id".to_string(), Value::from(book_id));
            Value::Object(fields)
        }
        other => other,
    };
    upsert_rows(repository, vec![row]).await
}

#[tracing::instrument(skip_all)]
pub async fn update_books(
    repository: &dyn BookRepository,
    payload: BooksPayload,
) -> Result<u64, CatalogError> {
    let rows = non_empty(payload.data)?;
    upsert_rows(repository, rows).await
}

/// Bulk loads books carrying their own ids, e.g. a sample data set
pub async fn load_sample_books(
    repository: &dyn BookRepository,
    books: Vec<Value>,
) -> Result<u64, CatalogError> {
    update_books(repository, BooksPayload { data: Some(books) }).await
}

async fn upsert_rows(
    repository: &dyn BookRepository,
    rows: Vec<Value>,
) -> Result<u64, CatalogError> {
    let ids = validation::validate_ids(&rows).map_err(CatalogError::Validation)?;

    let mut seen = HashSet::new();
    if let Some(duplicate) = ids.iter().find(|id| !seen.insert(**id)) {
        return Err(CatalogError::User(format!(
            "duplicate id {} in data",
            duplicate
        )));
    }

    let rows: Vec<(BookId, Value)> = ids.iter().copied().zip(rows).collect();
    let written = repository
        .upsert_books(ids, Box::new(move |existing| merge_batch(rows, existing)))
        .await?;
    tracing::info!("Upserted {} books", written);
    Ok(written)
}

/// Overlays the top level fields of every row on the stored book with the
/// same id, rows without a stored book are taken as they are. The result is
/// validated as a whole
fn merge_batch(
    rows: Vec<(BookId, Value)>,
    existing: Vec<Book>,
) -> Result<Vec<Book>, CatalogError> {
    let existing: HashMap<BookId, Book> =
        existing.into_iter().map(|book| (book.id, book)).collect();

    let merged: Vec<Value> = rows
        .into_iter()
        .map(|(id, row)| {
            let Value::Object(mut fields) = row else {
                return row;
            };
            fields.insert("id".to_string(), Value::from(id));
            match existing.get(&id) {
                Some(stored) => {
                    let mut base = serde_json::json!(stored);
                    if let Some(base_fields) = base.as_object_mut() {
                        base_fields.extend(fields);
                    }
                    base
                }
                None => Value::Object(fields),
            }
        })
        .collect();

    validation::validate_books(&merged).map_err(CatalogError::Validation)
}

#[tracing::instrument(skip(repository))]
pub async fn delete_book(
    repository: &dyn BookRepository,
    book_id: BookId,
) -> Result<u64, CatalogError> {
    delete_ids(repository, vec![book_id]).await
}

#[tracing::instrument(skip_all)]
pub async fn delete_books(
    repository: &dyn BookRepository,
    payload: BookIdsPayload,
) -> Result<u64, CatalogError> {
    delete_ids(repository, non_empty(payload.data)?).await
}

async fn delete_ids(
    repository: &dyn BookRepository,
    ids: Vec<BookId>,
) -> Result<u64, CatalogError> {
    let deleted = repository.delete_books(&ids).await?;
    if deleted == 0 {
        return Err(CatalogError::User("ids not found".to_string()));
    }
    tracing::info!("Deleted {} of {} requested books", deleted, ids.len());
    Ok(deleted)
}

fn non_empty<T>(data: Option<Vec<T>>) -> Result<Vec<T>, CatalogError> {
    match data {
        Some(data) if !data.is_empty() => Ok(data),
        _ => Err(CatalogError::User("data not found".to_string())),
    }
}
