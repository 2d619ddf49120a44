mod query;
mod tags;

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use sqlx::SqliteConnection;

pub use self::query::*;
use crate::config::ConfDir;
use crate::db::{self, Database, Image, ImageKey, ImageUpdate, NewImage, Tag, crud};
use crate::error::{CatalogError, Result};
use crate::predict::TagPredictor;

/// 每次查询关联时最多使用的参数数量
const ID_CHUNK: usize = 500;

/// 图库：图片、标签及其关联的持久化记录
pub struct Catalog {
    db: Database,
    storage: PathBuf,
}

/// 图库统计信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, utoipa::ToSchema)]
pub struct Stats {
    pub images: i64,
    pub unclassified: i64,
    pub tags: i64,
}

impl Catalog {
    /// 打开配置目录下的图库，不存在时创建
    pub async fn open(conf_dir: &ConfDir) -> Result<Self> {
        tokio::fs::create_dir_all(conf_dir.path())
            .await
            .map_err(|e| CatalogError::io(conf_dir.path(), e))?;
        Self::open_with(conf_dir.database(), conf_dir.storage()).await
    }

    /// 使用指定的数据库文件和存储目录打开图库
    pub async fn open_with(database: impl AsRef<Path>, storage: impl Into<PathBuf>) -> Result<Self> {
        let storage = storage.into();
        tokio::fs::create_dir_all(&storage).await.map_err(|e| CatalogError::io(&storage, e))?;
        let db = db::init_db(database).await?;
        info!("图库存储目录: {}", storage.display());
        Ok(Self { db, storage })
    }

    /// 图库存储目录
    pub fn storage(&self) -> &Path {
        &self.storage
    }

    pub(crate) fn db(&self) -> &Database {
        &self.db
    }

    /// 创建图片记录及其标签
    pub async fn create_image(&self, image: NewImage) -> Result<Image> {
        let mut tx = self.db.begin().await?;
        let id = insert_image(&mut *tx, &image).await?;
        tx.commit().await?;
        self.get_image(ImageKey::Id(id)).await
    }

    /// 按 ID 或路径获取唯一的一张图片
    pub async fn get_image(&self, key: ImageKey<'_>) -> Result<Image> {
        let mut images: Vec<Image> = match key {
            ImageKey::Id(id) => crud::get_image_by_id(&self.db, id).await?.into_iter().collect(),
            ImageKey::Path(path) => crud::get_images_by_path(&self.db, path).await?,
        };
        if images.len() != 1 {
            return Err(CatalogError::not_found(key));
        }
        self.attach_tags(&mut images).await?;
        Ok(images.remove(0))
    }

    /// 部分更新图片的名称、路径或标签集合
    pub async fn update_image(&self, id: i64, update: ImageUpdate) -> Result<Image> {
        let mut tx = self.db.begin().await?;
        if crud::get_image_by_id(&mut *tx, id).await?.is_none() {
            return Err(CatalogError::not_found(ImageKey::Id(id)));
        }
        if let Some(name) = &update.name {
            crud::update_image_name(&mut *tx, id, name).await?;
        }
        if let Some(path) = &update.path {
            crud::update_image_path(&mut *tx, id, path).await?;
        }
        if let Some(tags) = &update.tags {
            replace_tags(&mut *tx, id, tags).await?;
        }
        tx.commit().await?;
        self.get_image(ImageKey::Id(id)).await
    }

    /// 分类操作：替换图片的标签集合
    ///
    /// 非空集合会将图片标记为已分类，并增加这些标签的访问次数；空集合清空标签和分类状态
    pub async fn set_tags<S: AsRef<str>>(&self, id: i64, tags: &[S]) -> Result<Image> {
        let tags = normalize_tags(tags)?;
        let mut tx = self.db.begin().await?;
        if crud::get_image_by_id(&mut *tx, id).await?.is_none() {
            return Err(CatalogError::not_found(ImageKey::Id(id)));
        }
        let attached = replace_tags(&mut *tx, id, &tags).await?;
        for tag in &attached {
            crud::touch_tag_by_id(&mut *tx, tag.id).await?;
        }
        crud::set_image_classified(&mut *tx, id, !attached.is_empty()).await?;
        tx.commit().await?;
        debug!("图片 #{} 设置标签: {:?}", id, tags);
        self.get_image(ImageKey::Id(id)).await
    }

    /// 删除图片记录及其文件
    ///
    /// 文件删除成功后才提交事务，失败时记录保持不变
    pub async fn delete_image(&self, id: i64) -> Result<()> {
        let mut tx = self.db.begin().await?;
        let image = crud::get_image_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| CatalogError::not_found(ImageKey::Id(id)))?;
        crud::delete_image(&mut *tx, id).await?;
        match tokio::fs::remove_file(&image.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("图片文件已不存在: {}", image.path);
            }
            Err(e) => return Err(CatalogError::io(&image.path, e)),
        }
        tx.commit().await?;
        info!("删除图片 #{}: {}", id, image.path);
        Ok(())
    }

    /// 增加图片访问次数
    pub async fn touch_image(&self, id: i64) -> Result<()> {
        if crud::touch_image(&self.db, id, Utc::now()).await? == 0 {
            return Err(CatalogError::not_found(ImageKey::Id(id)));
        }
        Ok(())
    }

    pub async fn list_images(&self, offset: usize, limit: usize) -> Result<Vec<Image>> {
        let mut images = crud::list_images(&self.db, sql_count(offset), sql_count(limit)).await?;
        self.attach_tags(&mut images).await?;
        Ok(images)
    }

    pub async fn count_images(&self) -> Result<i64> {
        Ok(crud::count_images(&self.db).await?)
    }

    pub async fn count_unclassified(&self) -> Result<i64> {
        Ok(crud::count_images_unclassified(&self.db).await?)
    }

    pub async fn stats(&self) -> Result<Stats> {
        Ok(Stats {
            images: self.count_images().await?,
            unclassified: self.count_unclassified().await?,
            tags: crud::count_tags(&self.db).await?,
        })
    }

    /// 使用自动标注模型为图片分类
    ///
    /// 模型未配置时返回 [`CatalogError::ExternalUnavailable`]，预测结果为空时不修改图片
    pub async fn auto_classify(
        &self,
        id: i64,
        predictor: Option<Arc<dyn TagPredictor>>,
        threshold: f32,
    ) -> Result<Image> {
        let predictor = predictor.ok_or(CatalogError::ExternalUnavailable)?;
        let image = self.get_image(ImageKey::Id(id)).await?;

        let path = PathBuf::from(&image.path);
        let predicted = tokio::task::spawn_blocking(move || predictor.predict(&path, threshold))
            .await
            .map_err(|e| CatalogError::External(e.to_string()))?
            .map_err(|e| CatalogError::External(format!("{:#}", e)))?;

        if predicted.is_empty() {
            debug!("图片 #{} 没有预测出标签", id);
            return Ok(image);
        }
        let predicted = predicted.into_iter().collect::<Vec<_>>();
        self.set_tags(id, predicted.as_slice()).await
    }

    /// 为图片填充标签
    pub(crate) async fn attach_tags(&self, images: &mut [Image]) -> Result<()> {
        let ids = images.iter().map(|image| image.id).collect::<Vec<_>>();
        let mut by_image = BTreeMap::<i64, Vec<Tag>>::new();
        for chunk in ids.chunks(ID_CHUNK) {
            for assoc in crud::get_associations(&self.db, chunk).await? {
                by_image.entry(assoc.image_id).or_default().push(Tag {
                    id: assoc.tag_id,
                    name: assoc.name,
                    hits: assoc.hits,
                });
            }
        }
        for image in images {
            image.tags = by_image.remove(&image.id).unwrap_or_default();
        }
        Ok(())
    }

    /// 获取一批图片的全部关联
    pub(crate) async fn associations(&self, ids: &[i64]) -> Result<Vec<db::Association>> {
        let mut result = vec![];
        for chunk in ids.chunks(ID_CHUNK) {
            result.extend(crud::get_associations(&self.db, chunk).await?);
        }
        Ok(result)
    }
}

/// 转换为 SQLite 的数量参数，超出范围时取最大值
pub(crate) fn sql_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// 在事务中插入图片并关联标签
pub(crate) async fn insert_image(conn: &mut SqliteConnection, image: &NewImage) -> Result<i64> {
    let id = crud::add_image(&mut *conn, &image.name, &image.path, image.classified, Utc::now())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                CatalogError::Conflict(format!("图片 {} 已存在", image.name))
            }
            e => e.into(),
        })?;
    for name in normalize_tags(&image.tags)? {
        let tag = crud::get_or_create_tag(&mut *conn, &name).await?;
        crud::add_image_tag(&mut *conn, id, tag.id).await?;
    }
    Ok(id)
}

async fn replace_tags(conn: &mut SqliteConnection, id: i64, tags: &[String]) -> Result<Vec<Tag>> {
    crud::clear_image_tags(&mut *conn, id).await?;
    let mut attached = Vec::with_capacity(tags.len());
    for name in normalize_tags(tags)? {
        let tag = crud::get_or_create_tag(&mut *conn, &name).await?;
        crud::add_image_tag(&mut *conn, id, tag.id).await?;
        attached.push(tag);
    }
    Ok(attached)
}

/// 去除首尾空白并去重，拒绝空标签名
fn normalize_tags<S: AsRef<str>>(tags: &[S]) -> Result<Vec<String>> {
    let mut result = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.as_ref().trim();
        if tag.is_empty() {
            return Err(CatalogError::InvalidInput("标签名不能为空".to_owned()));
        }
        if !result.iter().any(|t: &String| t == tag) {
            result.push(tag.to_owned());
        }
    }
    Ok(result)
}
