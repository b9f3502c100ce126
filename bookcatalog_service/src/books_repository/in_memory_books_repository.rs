use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::api::{Book, BookId, NewBook};
use crate::books_repository::{BookRepository, BookRepositoryError, ListRequest, MergeBatch};

pub struct InMemoryBookRepository {
    book_sequence_generator: AtomicI32,
    books: parking_lot::RwLock<BTreeMap<BookId, Book>>,
}

impl Default for InMemoryBookRepository {
    fn default() -> Self {
        Self {
            // ids start at 1 like a SERIAL column
            book_sequence_generator: AtomicI32::new(1),
            books: Default::default(),
        }
    }
}

#[async_trait::async_trait]
impl BookRepository for InMemoryBookRepository {
    async fn list_books(
        &self,
        request: &ListRequest,
    ) -> Result<(Vec<Book>, u64), BookRepositoryError> {
        let locked_books = self.books.read();
        let mut matching: Vec<&Book> = locked_books
            .values()
            .filter(|book| request.matches(book))
            .collect();

        matching.sort_by(|left, right| {
            request
                .order
                .apply(request.sort.compare(left, right))
                .then(left.id.cmp(&right.id))
        });

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(request.offset as usize)
            .take(request.limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn insert_books(&self, books: Vec<NewBook>) -> Result<u64, BookRepositoryError> {
        let mut locked_books = self.books.write();
        let count = books.len() as u64;
        for book in books {
            let id = self.book_sequence_generator.fetch_add(1, Ordering::Relaxed);
            locked_books.insert(id, book.with_id(id));
        }
        Ok(count)
    }

    async fn upsert_books(
        &self,
        ids: Vec<BookId>,
        merge: MergeBatch,
    ) -> Result<u64, BookRepositoryError> {
        // write lock is held from read to write so the batch is applied atomically
        let mut locked_books = self.books.write();
        let existing = ids
            .iter()
            .filter_map(|id| locked_books.get(id).cloned())
            .collect();

        let merged =
            merge(existing).map_err(|err| BookRepositoryError::Rejected(Box::new(err)))?;

        let count = merged.len() as u64;
        if let Some(max_id) = merged.iter().map(|book| book.id).max() {
            self.book_sequence_generator
                .fetch_max(max_id.saturating_add(1), Ordering::Relaxed);
        }
        for book in merged {
            locked_books.insert(book.id, book);
        }
        Ok(count)
    }

    async fn delete_books(&self, ids: &[BookId]) -> Result<u64, BookRepositoryError> {
        let mut locked_books = self.books.write();
        Ok(ids
            .iter()
            .filter(|&&id| locked_books.remove(&id).is_some())
            .count() as u64)
    }
}
