use std::fmt;

use actix_web::error::InternalError;
use actix_web::HttpResponse;
use paperclip::actix::web;

use crate::api::MessageResponse;
use crate::handlers;

pub fn config_app(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(handlers::health)))
        .service(
            web::scope("/books")
                .service(
                    web::resource("/")
                        .route(web::get().to(handlers::list_books))
                        .route(web::post().to(handlers::create_books))
                        .route(web::put().to(handlers::update_books))
                        .route(web::delete().to(handlers::delete_books)),
                )
                .service(
                    web::resource("/{book_id}")
                        .route(web::get().to(handlers::get_book))
                        .route(web::put().to(handlers::update_book))
                        .route(web::delete().to(handlers::delete_book)),
                ),
        );
}

/// Extractor failures are answered with the same envelope as other user errors
fn bad_request<E>(err: E) -> actix_web::Error
where
    E: fmt::Debug + fmt::Display + 'static,
{
    let response = HttpResponse::BadRequest().json(MessageResponse::failure(err.to_string()));
    InternalError::from_response(err, response).into()
}

pub fn json_config() -> actix_web::web::JsonConfig {
    actix_web::web::JsonConfig::default().error_handler(|err, _req| bad_request(err))
}

pub fn query_config() -> actix_web::web::QueryConfig {
    actix_web::web::QueryConfig::default().error_handler(|err, _req| bad_request(err))
}

pub fn path_config() -> actix_web::web::PathConfig {
    actix_web::web::PathConfig::default().error_handler(|err, _req| bad_request(err))
}
