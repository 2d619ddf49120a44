use log::{debug, info};

use super::{Catalog, sql_count};
use crate::db::{PopularTag, Tag, crud};
use crate::error::{CatalogError, Result};

impl Catalog {
    /// 精确查找标签，不存在时创建
    ///
    /// 同名标签只会存在一条记录，创建不会改变访问次数
    pub async fn get_or_create_tag(&self, name: &str) -> Result<Tag> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::InvalidInput("标签名不能为空".to_owned()));
        }
        let mut conn = self.db().acquire().await?;
        Ok(crud::get_or_create_tag(&mut conn, name).await?)
    }

    /// 精确查找标签
    pub async fn get_tag(&self, name: &str) -> Result<Tag> {
        crud::get_tag_by_name(self.db(), name)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("标签 {}", name)))
    }

    /// 删除标签
    ///
    /// 仍有图片使用该标签时返回 [`CatalogError::Conflict`]，需要先移除关联
    pub async fn delete_tag(&self, name: &str) -> Result<()> {
        let mut tx = self.db().begin().await?;
        let tag = crud::get_tag_by_name(&mut *tx, name)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("标签 {}", name)))?;
        let count = crud::count_tag_associations(&mut *tx, tag.id).await?;
        if count > 0 {
            return Err(CatalogError::Conflict(format!(
                "标签 {} 仍被 {} 张图片使用",
                name, count
            )));
        }
        crud::delete_tag(&mut *tx, tag.id).await?;
        tx.commit().await?;
        info!("删除标签: {}", name);
        Ok(())
    }

    /// 名称包含 `fragment` 的所有标签访问次数加一，返回受影响的标签数量
    pub async fn touch_tags(&self, fragment: &str) -> Result<u64> {
        check_fragment(fragment)?;
        let touched = crud::touch_tags(self.db(), fragment).await?;
        debug!("标签片段 {:?} 触碰了 {} 个标签", fragment, touched);
        Ok(touched)
    }

    /// 按访问次数排序的标签
    pub async fn most_used_tags(&self, limit: usize) -> Result<Vec<Tag>> {
        Ok(crud::most_used_tags(self.db(), sql_count(limit)).await?)
    }

    /// 按关联图片数量排序的标签，只保留关联数量大于 `min_relevance` 的标签
    ///
    /// `limit` 为 `None` 时返回全部
    pub async fn most_popular_tags(
        &self,
        limit: Option<usize>,
        min_relevance: i64,
    ) -> Result<Vec<PopularTag>> {
        let limit = limit.map(sql_count).unwrap_or(-1);
        Ok(crud::most_popular_tags(self.db(), limit, min_relevance).await?)
    }

    pub async fn count_tags(&self) -> Result<i64> {
        Ok(crud::count_tags(self.db()).await?)
    }
}

/// 空片段会匹配所有标签，在边界处拒绝
pub(super) fn check_fragment(fragment: &str) -> Result<()> {
    if fragment.is_empty() {
        return Err(CatalogError::InvalidInput("标签片段不能为空".to_owned()));
    }
    Ok(())
}
