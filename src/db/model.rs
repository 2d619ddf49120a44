use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// 标签记录
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize, ToSchema)]
pub struct Tag {
    /// 标签 ID，同时代表创建顺序
    pub id: i64,
    /// 标签名
    pub name: String,
    /// 被查询或分类操作触碰的次数
    pub hits: i64,
}

/// 带关联数量的标签，用于热门标签排序
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize, ToSchema)]
pub struct PopularTag {
    pub id: i64,
    pub name: String,
    pub hits: i64,
    /// 关联的图片数量
    pub count: i64,
}

/// 图片记录
#[derive(Debug, Clone, sqlx::FromRow, Serialize, ToSchema)]
pub struct Image {
    /// 图片 ID
    pub id: i64,
    /// 规范文件名：`<blake3 哈希>.<原始后缀>`
    pub name: String,
    /// 图片当前所在路径
    pub path: String,
    /// 访问次数
    pub hits: i64,
    /// 是否经过人工或模型分类
    pub classified: bool,
    pub date_created: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
    /// 关联的标签，按标签 ID 排序
    #[sqlx(skip)]
    pub tags: Vec<Tag>,
}

impl Image {
    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(|tag| tag.name.as_str())
    }

    /// 规范文件名的后缀
    pub fn extension(&self) -> Option<&str> {
        self.name.rsplit_once('.').map(|(_, ext)| ext)
    }
}

/// 图片与标签的关联，附带标签信息
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Association {
    pub image_id: i64,
    pub tag_id: i64,
    pub name: String,
    pub hits: i64,
}

/// 新图片
#[derive(Debug, Clone)]
pub struct NewImage {
    pub name: String,
    pub path: String,
    pub classified: bool,
    pub tags: Vec<String>,
}

/// 部分更新图片，`None` 表示不修改该字段
#[derive(Debug, Clone, Default)]
pub struct ImageUpdate {
    pub name: Option<String>,
    pub path: Option<String>,
    /// 替换整个标签集合，空列表表示清空
    pub tags: Option<Vec<String>>,
}

/// 查找单张图片的方式
#[derive(Debug, Clone, Copy)]
pub enum ImageKey<'a> {
    Id(i64),
    Path(&'a str),
}

impl std::fmt::Display for ImageKey<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "图片 #{}", id),
            Self::Path(path) => write!(f, "图片 {}", path),
        }
    }
}
