use std::sync::Arc;

use actix_web::web::Data;
use actix_web::Error;
use actix_web::HttpResponse;
use paperclip::actix::{
    api_v2_operation,
    web::{self},
};

use crate::api::{
    BookDetailsResponse, BookId, BookIdsPayload, BooksPayload, CountResponse, ListBooksQuery,
    ListBooksResponse, MessageResponse, ValidationErrorsResponse,
};
use crate::books_repository::BookRepository;
use crate::catalog::{self, BookPage, CatalogError};

type BooksRepositoryData = Data<Arc<dyn BookRepository>>;

impl From<BookPage> for ListBooksResponse {
    fn from(page: BookPage) -> Self {
        Self {
            success: true,
            message: "books fetched successfully".to_string(),
            books: page.books,
            total: page.total,
            page: page.page,
            page_limit: page.page_limit,
            has_next: page.has_next,
            has_previous: page.has_previous,
            next: page.next,
            previous: page.previous,
        }
    }
}

/// Maps an operation failure to the response envelope
pub fn error_response(err: CatalogError) -> HttpResponse {
    match err {
        CatalogError::Validation(errors) => {
            tracing::info!("Payload rejected {}", errors);
            HttpResponse::BadRequest().json(ValidationErrorsResponse {
                success: false,
                message: "validation failed".to_string(),
                validationerrors: errors,
            })
        }
        CatalogError::User(message) => {
            tracing::info!("Request rejected {}", message);
            HttpResponse::BadRequest().json(MessageResponse::failure(message))
        }
        err @ (CatalogError::NotFound(_) | CatalogError::NoContent) => {
            HttpResponse::NotFound().json(MessageResponse::failure(err.to_string()))
        }
        CatalogError::Store(err) => {
            tracing::error!("Data store failure {}", err);
            HttpResponse::InternalServerError().json(MessageResponse::failure(err.to_string()))
        }
    }
}

fn count_response(result: Result<u64, CatalogError>, message: &str) -> HttpResponse {
    match result {
        Ok(count) => HttpResponse::Ok().json(CountResponse {
            success: true,
            message: message.to_string(),
            count,
        }),
        Err(err) => error_response(err),
    }
}

#[api_v2_operation]
pub async fn health() -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().finish())
}

#[api_v2_operation]
pub async fn list_books(
    books_repository: BooksRepositoryData,
    query: web::Query<ListBooksQuery>,
) -> Result<HttpResponse, Error> {
    Ok(
        match catalog::list_books(books_repository.get_ref().as_ref(), &query).await {
            Ok(page) => HttpResponse::Ok().json(ListBooksResponse::from(page)),
            Err(err) => error_response(err),
        },
    )
}

#[api_v2_operation]
pub async fn get_book(
    books_repository: BooksRepositoryData,
    book_id: web::Path<BookId>,
    query: web::Query<ListBooksQuery>,
) -> Result<HttpResponse, Error> {
    Ok(
        match catalog::get_book(
            books_repository.get_ref().as_ref(),
            book_id.into_inner(),
            &query,
        )
        .await
        {
            Ok(book_details) => HttpResponse::Ok().json(BookDetailsResponse {
                success: true,
                message: "book fetched successfully".to_string(),
                book_details,
            }),
            Err(err) => error_response(err),
        },
    )
}

#[api_v2_operation]
pub async fn create_books(
    books_repository: BooksRepositoryData,
    payload: web::Json<BooksPayload>,
) -> Result<HttpResponse, Error> {
    Ok(
        match catalog::create_books(books_repository.get_ref().as_ref(), payload.into_inner())
            .await
        {
            Ok(count) => HttpResponse::Created().json(CountResponse {
                success: true,
                message: "inserted successfully".to_string(),
                count,
            }),
            Err(err) => error_response(err),
        },
    )
}

#[api_v2_operation]
pub async fn update_books(
    books_repository: BooksRepositoryData,
    payload: web::Json<BooksPayload>,
) -> Result<HttpResponse, Error> {
    let result =
        catalog::update_books(books_repository.get_ref().as_ref(), payload.into_inner()).await;
    Ok(count_response(result, "updated successfully"))
}

#[api_v2_operation]
pub async fn update_book(
    books_repository: BooksRepositoryData,
    book_id: web::Path<BookId>,
    object: web::Json<serde_json::Value>,
) -> Result<HttpResponse, Error> {
    let result = catalog::update_book(
        books_repository.get_ref().as_ref(),
        book_id.into_inner(),
        object.into_inner(),
    )
    .await;
    Ok(count_response(result, "updated successfully"))
}

#[api_v2_operation]
pub async fn delete_books(
    books_repository: BooksRepositoryData,
    payload: web::Json<BookIdsPayload>,
) -> Result<HttpResponse, Error> {
    let result =
        catalog::delete_books(books_repository.get_ref().as_ref(), payload.into_inner()).await;
    Ok(count_response(result, "deleted successfully"))
}

#[api_v2_operation]
pub async fn delete_book(
    books_repository: BooksRepositoryData,
    book_id: web::Path<BookId>,
) -> Result<HttpResponse, Error> {
    let result =
        catalog::delete_book(books_repository.get_ref().as_ref(), book_id.into_inner()).await;
    Ok(count_response(result, "deleted successfully"))
}

#[cfg(test)]
mod handler_tests {
    use std::sync::Arc;

    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use paperclip::actix::{web, OpenApiExt};
    use serde_json::{json, Value};

    use crate::api::{Book, BookId, NewBook};
    use crate::app_config::{config_app, json_config, path_config, query_config};
    use crate::books_repository::{
        BookRepository, BookRepositoryError, InMemoryBookRepository, ListRequest, MergeBatch,
    };

    /// Store whose every call fails
    struct UnavailableRepository;

    #[async_trait::async_trait]
    impl BookRepository for UnavailableRepository {
        async fn list_books(
            &self,
            _request: &ListRequest,
        ) -> Result<(Vec<Book>, u64), BookRepositoryError> {
            Err(BookRepositoryError::Other("connection lost".to_string()))
        }

        async fn insert_books(&self, _books: Vec<NewBook>) -> Result<u64, BookRepositoryError> {
            Err(BookRepositoryError::Other("connection lost".to_string()))
        }

        async fn upsert_books(
            &self,
            _ids: Vec<BookId>,
            _merge: MergeBatch,
        ) -> Result<u64, BookRepositoryError> {
            Err(BookRepositoryError::Other("connection lost".to_string()))
        }

        async fn delete_books(&self, _ids: &[BookId]) -> Result<u64, BookRepositoryError> {
            Err(BookRepositoryError::Other("connection lost".to_string()))
        }
    }

    macro_rules! init_app {
        () => {{
            let books_repository: Arc<dyn BookRepository> =
                Arc::new(InMemoryBookRepository::default());
            init_app!(books_repository)
        }};
        ($books_repository:expr) => {{
            let books_repository: Arc<dyn BookRepository> = $books_repository;
            test::init_service(
                App::new()
                    .wrap_api()
                    .app_data(web::Data::new(books_repository))
                    .app_data(json_config())
                    .app_data(query_config())
                    .app_data(path_config())
                    .configure(config_app)
                    .build(),
            )
            .await
        }};
    }

    fn books(count: usize) -> Vec<Value> {
        (1..=count)
            .map(|index| {
                json!({
                    "title": format!("Title {}", index),
                    "pages": index,
                    "releaseDate": "2000"
                })
            })
            .collect()
    }

    #[actix_web::test]
    async fn test_create_list_and_get() {
        let app = init_app!();

        let req = test::TestRequest::post()
            .uri("/books/")
            .set_json(json!({ "data": books(25) }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["count"], json!(25));

        let req = test::TestRequest::get()
            .uri("/books/?page=2&page_limit=10")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["Books"].as_array().map(Vec::len), Some(10));
        assert_eq!(body["Books"][0]["id"], json!(11));
        assert_eq!(body["total"], json!(25));
        assert_eq!(body["has_next"], json!(true));
        assert_eq!(body["has_previous"], json!(true));

        let req = test::TestRequest::get().uri("/books/3").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["book_details"]["title"], json!("Title 3"));
        assert_eq!(body["book_details"]["releaseDate"], json!("2000"));

        let req = test::TestRequest::get().uri("/books/300").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_list_errors() {
        let app = init_app!();

        let req = test::TestRequest::get().uri("/books/").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], json!("no content"));

        let req = test::TestRequest::get()
            .uri("/books/?sort=bogus_column")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], json!(false));

        let req = test::TestRequest::get().uri("/books/?page=abc").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_create_validation_errors() {
        let app = init_app!();

        let req = test::TestRequest::post()
            .uri("/books/")
            .set_json(json!({"data": [
                {"title": "A", "pages": 5, "releaseDate": "2001"},
                {"pages": 5, "releaseDate": "2002"}
            ]}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(
            body["validationerrors"],
            json!({"1": {"title": ["Missing data for required field."]}})
        );

        let req = test::TestRequest::post()
            .uri("/books/")
            .set_json(json!({}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], json!("data not found"));

        let req = test::TestRequest::get().uri("/books/").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_update_and_delete() {
        let app = init_app!();

        let req = test::TestRequest::post()
            .uri("/books/")
            .set_json(json!({ "data": books(3) }))
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::put()
            .uri("/books/3")
            .set_json(json!({"title": "New Title"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::put()
            .uri("/books/")
            .set_json(json!({"data": [
                {"id": 1, "pages": 999},
                {"id": 10, "title": "Inserted", "pages": 1, "releaseDate": "2024"}
            ]}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["count"], json!(2));

        let req = test::TestRequest::get().uri("/books/3").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["book_details"]["title"], json!("New Title"));
        assert_eq!(body["book_details"]["pages"], json!(3));

        let req = test::TestRequest::delete()
            .uri("/books/")
            .set_json(json!({"data": [1, 2, 999]}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["count"], json!(2));

        let req = test::TestRequest::delete().uri("/books/999").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], json!("ids not found"));

        let req = test::TestRequest::get().uri("/books/").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let ids: Vec<i64> = body["Books"]
            .as_array()
            .unwrap()
            .iter()
            .map(|book| book["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![3, 10]);
    }

    #[actix_web::test]
    async fn test_malformed_body_is_bad_request() {
        let app = init_app!();

        let req = test::TestRequest::post()
            .uri("/books/")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], json!(false));
    }

    #[actix_web::test]
    async fn test_store_failure_is_internal_error() {
        let app = init_app!(Arc::new(UnavailableRepository));

        let requests = [
            test::TestRequest::get().uri("/books/"),
            test::TestRequest::get().uri("/books/1"),
            test::TestRequest::post()
                .uri("/books/")
                .set_json(json!({ "data": books(1) })),
            test::TestRequest::put()
                .uri("/books/1")
                .set_json(json!({"title": "x"})),
            test::TestRequest::delete()
                .uri("/books/")
                .set_json(json!({ "data": [1] })),
        ];
        for req in requests {
            let resp = test::call_service(&app, req.to_request()).await;
            assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["success"], json!(false));
            assert_eq!(body["message"], json!("Other error connection lost"));
        }
    }
}
