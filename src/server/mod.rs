mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use self::state::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::search_handler,
        api::unclassified_handler,
        api::get_image_handler,
        api::hit_image_handler,
        api::set_tags_handler,
        api::classify_handler,
        api::delete_image_handler,
        api::popular_tags_handler,
        api::most_used_tags_handler,
        api::delete_tag_handler,
        api::stats_handler,
        api::metrics_handler,
    ),
    components(schemas(
        types::SearchResponse,
        types::UnclassifiedResponse,
        types::SetTagsRequest,
        crate::Image,
        crate::Tag,
        crate::PopularTag,
        crate::Stats,
    ))
)]
pub struct ApiDoc;

/// 构建API服务器
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/search", get(api::search_handler))
        .route("/unclassified", get(api::unclassified_handler))
        .route("/images/{id}", get(api::get_image_handler).delete(api::delete_image_handler))
        .route("/images/{id}/hit", post(api::hit_image_handler))
        .route("/images/{id}/tags", post(api::set_tags_handler))
        .route("/images/{id}/classify", post(api::classify_handler))
        .route("/tags/popular", get(api::popular_tags_handler))
        .route("/tags/most_used", get(api::most_used_tags_handler))
        .route("/tags/{name}", axum::routing::delete(api::delete_tag_handler))
        .route("/stats", get(api::stats_handler))
        .route("/metrics", get(api::metrics_handler))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::disable())
        // 请求体限制：1M
        .layer(RequestBodyLimitLayer::new(1024 * 1024))
        .with_state(state)
}
