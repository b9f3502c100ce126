use anyhow::Context;
use tokio::sync::Mutex;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Row, Statement};

use crate::api::{Book, BookId, NewBook};
use crate::books_repository::{BookRepository, BookRepositoryError, ListRequest, MergeBatch};
use crate::columns::SearchFilter;

const BOOK_COLUMNS: &str = "id, author_id, title, cover_image, pages, \"releaseDate\", isbn";

pub struct PostgresBooksRepository {
    // transactions need exclusive access to the connection
    client: Mutex<Client>,
}

pub struct PostgresBooksRepositoryConfig {
    pub hostname: String,
    pub username: String,
    pub password: String,
    pub database: String,
}

impl PostgresBooksRepository {
    pub async fn init(config: PostgresBooksRepositoryConfig) -> anyhow::Result<Self> {
        let connection_str = format!(
            "postgresql://{}:{}@{}/{}",
            config.username, config.password, config.hostname, config.database
        );
        tracing::info!(
            "Postgres connection to {} as {}",
            config.hostname,
            config.username
        );
        let (client, connection) = tokio_postgres::connect(&connection_str, NoTls)
            .await
            .context("Failed to start postgres")?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("Postgres connection error: {}", e);
            }
        });

        client
            .batch_execute(
                "
        CREATE TABLE IF NOT EXISTS book (
            id              SERIAL PRIMARY KEY,
            author_id       INTEGER,
            title           TEXT NOT NULL,
            cover_image     TEXT,
            pages           INTEGER NOT NULL,
            \"releaseDate\"   TEXT NOT NULL,
            isbn            TEXT
            )
        ",
            )
            .await
            .context("Failed to setup table")?;
        Ok(Self {
            client: Mutex::new(client),
        })
    }
}

fn book_from_row(row: &Row) -> Result<Book, tokio_postgres::Error> {
    Ok(Book {
        id: row.try_get(0)?,
        author_id: row.try_get(1)?,
        title: row.try_get(2)?,
        cover_image: row.try_get(3)?,
        pages: row.try_get(4)?,
        release_date: row.try_get(5)?,
        isbn: row.try_get(6)?,
    })
}

/// WHERE clause of a list request with its parameters, numbered from $1
fn list_conditions(request: &ListRequest) -> (String, Vec<Box<dyn ToSql + Sync + Send>>) {
    let mut conditions = Vec::new();
    let mut params: Vec<Box<dyn ToSql + Sync + Send>> = Vec::new();

    if let Some(id) = request.id {
        params.push(Box::new(id));
        conditions.push(format!("id = ${}", params.len()));
    }
    match &request.filter {
        Some(SearchFilter::Equals(column, value)) => {
            params.push(Box::new(*value));
            conditions.push(format!("{} = ${}", column.sql_name(), params.len()));
        }
        Some(SearchFilter::Contains(column, text)) => {
            params.push(Box::new(SearchFilter::like_pattern(text)));
            conditions.push(format!("{} ILIKE ${}", column.sql_name(), params.len()));
        }
        None => {}
    }

    if conditions.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), params)
    }
}

/// Column arrays for UNNEST based bulk statements
#[derive(Default)]
struct BookColumnsArrays {
    ids: Vec<BookId>,
    author_ids: Vec<Option<i32>>,
    titles: Vec<String>,
    cover_images: Vec<Option<String>>,
    pages: Vec<i32>,
    release_dates: Vec<String>,
    isbns: Vec<Option<String>>,
}

impl BookColumnsArrays {
    fn push(&mut self, book: NewBook) {
        self.author_ids.push(book.author_id);
        self.titles.push(book.title);
        self.cover_images.push(book.cover_image);
        self.pages.push(book.pages);
        self.release_dates.push(book.release_date);
        self.isbns.push(book.isbn);
    }

    fn push_with_id(&mut self, book: Book) {
        self.ids.push(book.id);
        self.push(NewBook {
            author_id: book.author_id,
            title: book.title,
            cover_image: book.cover_image,
            pages: book.pages,
            release_date: book.release_date,
            isbn: book.isbn,
        });
    }
}

#[async_trait::async_trait]
impl BookRepository for PostgresBooksRepository {
    async fn list_books(
        &self,
        request: &ListRequest,
    ) -> Result<(Vec<Book>, u64), BookRepositoryError> {
        let (where_clause, mut params) = list_conditions(request);
        let client = self.client.lock().await;

        let count_params: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|param| param.as_ref() as &(dyn ToSql + Sync))
            .collect();
        let count_stmt: Statement = client
            .prepare(&format!("SELECT COUNT(*) FROM book{}", where_clause))
            .await?;
        let total: i64 = client.query_one(&count_stmt, &count_params).await?.try_get(0)?;

        params.push(Box::new(i64::try_from(request.limit).unwrap_or(i64::MAX)));
        params.push(Box::new(i64::try_from(request.offset).unwrap_or(i64::MAX)));
        let select_sql = format!(
            "SELECT {} FROM book{} ORDER BY {} {}, id ASC LIMIT ${} OFFSET ${}",
            BOOK_COLUMNS,
            where_clause,
            request.sort.sql_name(),
            request.order.sql(),
            params.len() - 1,
            params.len()
        );
        let select_params: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|param| param.as_ref() as &(dyn ToSql + Sync))
            .collect();
        let select_stmt: Statement = client.prepare(&select_sql).await?;
        let rows = client.query(&select_stmt, &select_params).await?;

        let books = rows
            .iter()
            .map(book_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((books, total as u64))
    }

    async fn insert_books(&self, books: Vec<NewBook>) -> Result<u64, BookRepositoryError> {
        let mut arrays = BookColumnsArrays::default();
        books.into_iter().for_each(|book| arrays.push(book));

        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;
        let inserted = transaction
            .execute(
                "INSERT INTO book (author_id, title, cover_image, pages, \"releaseDate\", isbn)
                 SELECT * FROM UNNEST($1::INTEGER[], $2::TEXT[], $3::TEXT[], $4::INTEGER[], $5::TEXT[], $6::TEXT[])",
                &[
                    &arrays.author_ids,
                    &arrays.titles,
                    &arrays.cover_images,
                    &arrays.pages,
                    &arrays.release_dates,
                    &arrays.isbns,
                ],
            )
            .await?;
        transaction.commit().await?;
        Ok(inserted)
    }

    async fn upsert_books(
        &self,
        ids: Vec<BookId>,
        merge: MergeBatch,
    ) -> Result<u64, BookRepositoryError> {
        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;

        // rows are locked until commit so the merge works on current values
        let rows = transaction
            .query(
                &format!(
                    "SELECT {} FROM book WHERE id = ANY($1) FOR UPDATE",
                    BOOK_COLUMNS
                ),
                &[&ids],
            )
            .await?;
        let existing = rows
            .iter()
            .map(book_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        // dropping the transaction on rejection rolls it back
        let merged =
            merge(existing).map_err(|err| BookRepositoryError::Rejected(Box::new(err)))?;

        let mut arrays = BookColumnsArrays::default();
        merged
            .into_iter()
            .for_each(|book| arrays.push_with_id(book));

        let written = transaction
            .execute(
                "INSERT INTO book (id, author_id, title, cover_image, pages, \"releaseDate\", isbn)
                 SELECT * FROM UNNEST($1::INTEGER[], $2::INTEGER[], $3::TEXT[], $4::TEXT[], $5::INTEGER[], $6::TEXT[], $7::TEXT[])
                 ON CONFLICT (id) DO UPDATE SET
                    author_id = EXCLUDED.author_id,
                    title = EXCLUDED.title,
                    cover_image = EXCLUDED.cover_image,
                    pages = EXCLUDED.pages,
                    \"releaseDate\" = EXCLUDED.\"releaseDate\",
                    isbn = EXCLUDED.isbn",
                &[
                    &arrays.ids,
                    &arrays.author_ids,
                    &arrays.titles,
                    &arrays.cover_images,
                    &arrays.pages,
                    &arrays.release_dates,
                    &arrays.isbns,
                ],
            )
            .await?;

        // explicit ids bypass the sequence, move it past them
        transaction
            .execute(
                "SELECT setval('book_id_seq',
                    GREATEST(
                        (SELECT COALESCE(MAX(id), 1) FROM book),
                        (SELECT last_value FROM book_id_seq)
                    ))",
                &[],
            )
            .await?;

        transaction.commit().await?;
        Ok(written)
    }

    async fn delete_books(&self, ids: &[BookId]) -> Result<u64, BookRepositoryError> {
        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;
        let deleted = transaction
            .execute("DELETE FROM book WHERE id = ANY($1)", &[&ids])
            .await?;
        transaction.commit().await?;
        Ok(deleted)
    }
}
