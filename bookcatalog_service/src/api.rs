use paperclip::actix::Apiv2Schema;
use serde::{Deserialize, Serialize};

use crate::validation::ValidationErrors;

pub type BookId = i32;

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// Book record as stored in the catalog
pub struct Book {
    pub id: BookId,
    pub author_id: Option<i32>,
    pub title: String,
    pub cover_image: Option<String>,
    pub pages: i32,
    /// Year of release, kept as free text
    #[serde(rename = "releaseDate")]
    pub release_date: String,
    pub isbn: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// Book fields accepted on creation, id is assigned by the store
pub struct NewBook {
    pub author_id: Option<i32>,
    pub title: String,
    pub cover_image: Option<String>,
    pub pages: i32,
    #[serde(rename = "releaseDate")]
    pub release_date: String,
    pub isbn: Option<String>,
}

impl NewBook {
    pub fn with_id(self, id: BookId) -> Book {
        Book {
            id,
            author_id: self.author_id,
            title: self.title,
            cover_image: self.cover_image,
            pages: self.pages,
            release_date: self.release_date,
            isbn: self.isbn,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// Query parameters of GET /books/ and GET /books/{id}
pub struct ListBooksQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_column: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Apiv2Schema)]
/// Body of bulk create and bulk update, rows are validated individually
pub struct BooksPayload {
    #[serde(default)]
    pub data: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Apiv2Schema)]
/// Body of bulk delete
pub struct BookIdsPayload {
    #[serde(default)]
    pub data: Option<Vec<BookId>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct ListBooksResponse {
    pub success: bool,
    pub message: String,
    #[serde(rename = "Books")]
    pub books: Vec<Book>,
    pub total: u64,
    pub page: u64,
    pub page_limit: u64,
    pub has_next: bool,
    pub has_previous: bool,
    /// Relative url of the next page, null on the last page
    pub next: Option<String>,
    /// Relative url of the previous page, null on the first page
    pub previous: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct BookDetailsResponse {
    pub success: bool,
    pub message: String,
    pub book_details: Book,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// Response of create, update and delete
pub struct CountResponse {
    pub success: bool,
    pub message: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationErrorsResponse {
    pub success: bool,
    pub message: String,
    pub validationerrors: ValidationErrors,
}
