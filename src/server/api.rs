use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::{Path, Query, State};
use log::info;

use super::error::Result;
use super::state::AppState;
use super::types::*;
use crate::utils::parse_tags;
use crate::{Image, ImageKey, PopularTag, Stats, Tag, UnclassifiedBatch, metrics};

/// 按标签搜索图片
#[utoipa::path(
    get,
    path = "/search",
    params(SearchQuery),
    responses(
        (status = 200, body = SearchResponse),
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>> {
    let start = Instant::now();
    let tags = parse_tags(&query.tags);
    let page_size = state.query.page_size;

    info!("搜索标签: {:?}, 第 {} 页", tags, query.page);

    let result = state.catalog.search(&tags, query.page.saturating_mul(page_size), page_size).await?;

    Ok(Json(SearchResponse { time: start.elapsed().as_millis() as u64, result }))
}

/// 获取一页待分类图片
#[utoipa::path(
    get,
    path = "/unclassified",
    params(PageQuery),
    responses(
        (status = 200, body = UnclassifiedResponse),
    )
)]
pub async fn unclassified_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<UnclassifiedResponse>> {
    // 每个请求独立获取待分类图片，不在请求之间共享
    let images = state.catalog.least_tagged(&state.ignore, state.query.batch).await?;
    let batch = UnclassifiedBatch::new(images, state.query.page_size);
    Ok(Json(UnclassifiedResponse {
        page: query.page,
        pages: batch.pages(),
        total: batch.len(),
        images: batch.page(query.page).to_vec(),
    }))
}

/// 获取图片信息
#[utoipa::path(get, path = "/images/{id}", responses((status = 200, body = Image)))]
pub async fn get_image_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Image>> {
    Ok(Json(state.catalog.get_image(ImageKey::Id(id)).await?))
}

/// 记录一次图片访问
#[utoipa::path(post, path = "/images/{id}/hit")]
pub async fn hit_image_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<()> {
    state.catalog.touch_image(id).await?;
    Ok(())
}

/// 设置图片标签
#[utoipa::path(
    post,
    path = "/images/{id}/tags",
    request_body = SetTagsRequest,
    responses((status = 200, body = Image))
)]
pub async fn set_tags_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(data): Json<SetTagsRequest>,
) -> Result<Json<Image>> {
    Ok(Json(state.catalog.set_tags(id, &data.tags).await?))
}

/// 使用自动标注模型分类图片
#[utoipa::path(post, path = "/images/{id}/classify", responses((status = 200, body = Image)))]
pub async fn classify_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Image>> {
    let image = state.catalog.auto_classify(id, state.predictor.clone(), state.threshold).await?;
    Ok(Json(image))
}

/// 删除图片及其文件
#[utoipa::path(delete, path = "/images/{id}")]
pub async fn delete_image_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<()> {
    state.catalog.delete_image(id).await?;
    Ok(())
}

/// 按关联图片数量排序的标签
#[utoipa::path(
    get,
    path = "/tags/popular",
    params(TagsQuery),
    responses((status = 200, body = Vec<PopularTag>))
)]
pub async fn popular_tags_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TagsQuery>,
) -> Result<Json<Vec<PopularTag>>> {
    Ok(Json(state.catalog.most_popular_tags(Some(query.count), query.min_relevance).await?))
}

/// 按访问次数排序的标签
#[utoipa::path(
    get,
    path = "/tags/most_used",
    params(TagsQuery),
    responses((status = 200, body = Vec<Tag>))
)]
pub async fn most_used_tags_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TagsQuery>,
) -> Result<Json<Vec<Tag>>> {
    Ok(Json(state.catalog.most_used_tags(query.count).await?))
}

/// 删除未被使用的标签
#[utoipa::path(delete, path = "/tags/{name}")]
pub async fn delete_tag_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<()> {
    state.catalog.delete_tag(&name).await?;
    Ok(())
}

/// 图库统计信息
#[utoipa::path(get, path = "/stats", responses((status = 200, body = Stats)))]
pub async fn stats_handler(State(state): State<Arc<AppState>>) -> Result<Json<Stats>> {
    Ok(Json(state.catalog.stats().await?))
}

/// prometheus 指标
#[utoipa::path(get, path = "/metrics")]
pub async fn metrics_handler() -> Result<String> {
    Ok(metrics::gather_text()?)
}
