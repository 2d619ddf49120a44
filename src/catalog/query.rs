use std::collections::HashSet;

use log::debug;

use super::{Catalog, sql_count};
use super::tags::check_fragment;
use crate::db::{Image, crud};
use crate::error::Result;
use crate::metrics;

/// 查询待分类图片时每次读取的数量
const LEAST_TAGGED_PAGE: i64 = 256;

impl Catalog {
    /// 多标签交集搜索
    ///
    /// 每个片段按子串匹配标签名，结果必须匹配所有片段，按访问次数降序排列。
    /// 搜索会同时增加匹配到的标签的访问次数，两者在同一事务中完成。
    /// `tags` 为空时返回全部图片。
    pub async fn search<S: AsRef<str>>(
        &self,
        tags: &[S],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Image>> {
        let fragments = tags.iter().map(|s| s.as_ref().to_owned()).collect::<Vec<_>>();
        for fragment in &fragments {
            check_fragment(fragment)?;
        }

        let mut tx = self.db().begin().await?;
        for fragment in &fragments {
            crud::touch_tags(&mut *tx, fragment).await?;
        }
        let mut images =
            crud::search_images(&mut *tx, &fragments, sql_count(offset), sql_count(limit)).await?;
        tx.commit().await?;

        metrics::inc_search_count(fragments.len());
        debug!("搜索 {:?}: offset={} 返回 {} 张图片", fragments, offset, images.len());

        self.attach_tags(&mut images).await?;
        Ok(images)
    }

    /// 获取没有任何标签的图片，后缀在 `ignore` 中的图片不会返回
    ///
    /// 后缀取文件名最后一个 `.` 之后的部分，比较时忽略大小写
    pub async fn least_tagged<S: AsRef<str>>(
        &self,
        ignore: &[S],
        batch: usize,
    ) -> Result<Vec<Image>> {
        let ignore = ignore
            .iter()
            .map(|s| s.as_ref().trim_start_matches('.').to_lowercase())
            .collect::<HashSet<_>>();
        let is_ignored = |image: &Image| {
            image.extension().is_some_and(|ext| ignore.contains(&ext.to_lowercase()))
        };

        let mut result = Vec::new();
        let mut offset = 0;
        while result.len() < batch {
            let page = crud::least_tagged_images(self.db(), offset, LEAST_TAGGED_PAGE).await?;
            let fetched = page.len();
            result.extend(page.into_iter().filter(|image| !is_ignored(image)));
            if (fetched as i64) < LEAST_TAGGED_PAGE {
                break;
            }
            offset += LEAST_TAGGED_PAGE;
        }
        result.truncate(batch);
        Ok(result)
    }

    /// 按访问次数降序获取图片
    pub async fn most_used_images(&self, limit: usize) -> Result<Vec<Image>> {
        let mut images = crud::most_used_images(self.db(), sql_count(limit)).await?;
        self.attach_tags(&mut images).await?;
        Ok(images)
    }

    /// 获取一批待分类图片，由调用方持有并分页
    pub async fn unclassified_batch<S: AsRef<str>>(
        &self,
        ignore: &[S],
        batch: usize,
        page_size: usize,
    ) -> Result<UnclassifiedBatch> {
        let images = self.least_tagged(ignore, batch).await?;
        Ok(UnclassifiedBatch::new(images, page_size))
    }
}

/// 一次分类流程中待处理的图片快照
///
/// 属于单次请求或会话，不在进程内共享
#[derive(Debug, Clone)]
pub struct UnclassifiedBatch {
    images: Vec<Image>,
    page_size: usize,
}

impl UnclassifiedBatch {
    pub fn new(images: Vec<Image>, page_size: usize) -> Self {
        Self { images, page_size: page_size.max(1) }
    }

    /// 第 `page` 页（从 0 开始），超出范围时为空
    pub fn page(&self, page: usize) -> &[Image] {
        let start = page.saturating_mul(self.page_size).min(self.images.len());
        let end = start.saturating_add(self.page_size).min(self.images.len());
        &self.images[start..end]
    }

    pub fn pages(&self) -> usize {
        self.images.len().div_ceil(self.page_size)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    pub fn into_images(self) -> Vec<Image> {
        self.images
    }
}
