use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::Image;

/// 搜索请求参数
#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// 空格分隔的标签片段
    #[serde(default)]
    pub tags: String,
    /// 页码，从 0 开始
    #[serde(default)]
    pub page: usize,
}

/// 分页请求参数
#[derive(Debug, Deserialize, IntoParams)]
pub struct PageQuery {
    #[serde(default)]
    pub page: usize,
}

/// 标签列表请求参数
#[derive(Debug, Deserialize, IntoParams)]
pub struct TagsQuery {
    /// 返回数量
    #[serde(default = "default_count")]
    pub count: usize,
    /// 只返回关联图片数量大于该值的标签
    #[serde(default)]
    pub min_relevance: i64,
}

fn default_count() -> usize {
    10
}

/// 搜索响应
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    /// 搜索耗时，单位为毫秒
    pub time: u64,
    pub result: Vec<Image>,
}

/// 待分类图片响应
#[derive(Debug, Serialize, ToSchema)]
pub struct UnclassifiedResponse {
    pub page: usize,
    pub pages: usize,
    pub total: usize,
    pub images: Vec<Image>,
}

/// 设置标签的请求，空列表表示清空
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetTagsRequest {
    pub tags: Vec<String>,
}
