use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;

/// 图库操作的错误类型
#[derive(Debug, Error)]
pub enum CatalogError {
    /// 按 ID、名称或路径查找不到记录，或者查找结果不唯一
    #[error("未找到{0}")]
    NotFound(String),
    /// 操作与现有记录冲突，例如删除仍被图片引用的标签
    #[error("冲突: {0}")]
    Conflict(String),
    /// 调用参数不合法，例如空的标签片段
    #[error("参数无效: {0}")]
    InvalidInput(String),
    /// 文件复制、移动或删除失败
    #[error("文件操作失败 {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 未配置自动标注模型
    #[error("自动标注模型不可用")]
    ExternalUnavailable,
    /// 自动标注模型运行失败
    #[error("自动标注模型出错: {0}")]
    External(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl CatalogError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }
}
