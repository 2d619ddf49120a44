use std::sync::Arc;

use crate::Catalog;
use crate::cli::server::ServerCommand;
use crate::config::QueryOptions;
use crate::predict::TagPredictor;
use crate::utils::parse_suffixes;

/// 应用状态
pub struct AppState {
    /// 图库
    pub catalog: Catalog,
    /// 查询配置选项
    pub query: QueryOptions,
    /// 待分类图片忽略的后缀
    pub ignore: Vec<String>,
    /// 自动标注模型，未配置时为 None
    pub predictor: Option<Arc<dyn TagPredictor>>,
    /// 自动标注最低置信度
    pub threshold: f32,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(
        catalog: Catalog,
        opts: ServerCommand,
        predictor: Option<Arc<dyn TagPredictor>>,
    ) -> Arc<Self> {
        Arc::new(AppState {
            catalog,
            ignore: parse_suffixes(&opts.query.ignore),
            query: opts.query,
            predictor,
            threshold: opts.threshold,
        })
    }
}
