use anyhow::{bail, Context};
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_tracing::TracingMiddleware;
use serde_json::json;

use crate::api::{
    Book, BookDetailsResponse, BookId, CountResponse, ListBooksQuery, ListBooksResponse,
    MessageResponse, NewBook,
};

pub struct BookCatalogClient {
    url: String,
    client: ClientWithMiddleware,
}

impl BookCatalogClient {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let reqwest_client = reqwest::Client::builder()
            .build()
            .context("Failed to build reqwest client")?;
        let client = ClientBuilder::new(reqwest_client)
            // Insert the tracing middleware
            .with(TracingMiddleware::default())
            .build();

        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    async fn failure(response: reqwest::Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<MessageResponse>(&body) {
            Ok(message) => format!("{} {}", status, message.message),
            Err(_) => format!("{} {}", status, body),
        }
    }

    async fn count(response: reqwest::Response, action: &str) -> anyhow::Result<u64> {
        if response.status().is_success() {
            let counted: CountResponse = response.json().await?;
            Ok(counted.count)
        } else {
            bail!("Failed to {} {}", action, Self::failure(response).await)
        }
    }

    /// Calls GET /books/ endpoint
    /// Returns None when the requested page has no books
    pub async fn list_books(
        &self,
        query: &ListBooksQuery,
    ) -> anyhow::Result<Option<ListBooksResponse>> {
        let response = self
            .client
            .get(format!("{}/books/", self.url))
            .query(query)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            Ok(None)
        } else if response.status().is_success() {
            Ok(Some(response.json().await?))
        } else {
            bail!("Failed to list books {}", Self::failure(response).await)
        }
    }

    /// Calls GET /books/{book_id} endpoint
    /// Returns None if book was not in the catalog
    pub async fn get_book(&self, book_id: BookId) -> anyhow::Result<Option<Book>> {
        let response = self
            .client
            .get(format!("{}/books/{}", self.url, book_id))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            Ok(None)
        } else if response.status().is_success() {
            let details: BookDetailsResponse = response.json().await?;
            Ok(Some(details.book_details))
        } else {
            bail!("Failed to get book {}", Self::failure(response).await)
        }
    }

    /// Calls POST /books/ endpoint, returns number of created books
    pub async fn create_books(&self, books: &[NewBook]) -> anyhow::Result<u64> {
        let response = self
            .client
            .post(format!("{}/books/", self.url))
            .json(&json!({ "data": books }))
            .send()
            .await?;
        Self::count(response, "create books").await
    }

    /// Calls PUT /books/ endpoint with rows carrying their ids
    pub async fn update_books(&self, rows: &[serde_json::Value]) -> anyhow::Result<u64> {
        let response = self
            .client
            .put(format!("{}/books/", self.url))
            .json(&json!({ "data": rows }))
            .send()
            .await?;
        Self::count(response, "update books").await
    }

    /// Calls PUT /books/{book_id} endpoint, fields missing in `fields` keep their values
    pub async fn update_book(
        &self,
        book_id: BookId,
        fields: &serde_json::Value,
    ) -> anyhow::Result<u64> {
        let response = self
            .client
            .put(format!("{}/books/{}", self.url, book_id))
            .json(fields)
            .send()
            .await?;
        Self::count(response, "update book").await
    }

    /// Calls DELETE /books/ endpoint, returns how many of `book_ids` were deleted
    pub async fn delete_books(&self, book_ids: &[BookId]) -> anyhow::Result<u64> {
        let response = self
            .client
            .delete(format!("{}/books/", self.url))
            .json(&json!({ "data": book_ids }))
            .send()
            .await?;
        Self::count(response, "delete books").await
    }

    /// Calls DELETE /books/{book_id} endpoint
    pub async fn delete_book(&self, book_id: BookId) -> anyhow::Result<u64> {
        let response = self
            .client
            .delete(format!("{}/books/{}", self.url, book_id))
            .send()
            .await?;
        Self::count(response, "delete book").await
    }
}
