//! 按标签共现频率将图库整理为目录树
//!
//! 每一层选出当前图片集合中最热门的标签作为子目录，递归细分。
//! 每张图片只会被复制一次：分支先让更深的层级认领自己的图片，
//! 剩下的图片复制到分支自身的目录中。

use std::collections::{BTreeMap, HashSet};
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use indicatif::ProgressBar;
use log::{debug, error, info, warn};

use crate::catalog::Catalog;
use crate::db::{Association, Image, PopularTag, crud};
use crate::error::{CatalogError, Result};
use crate::metrics;
use crate::utils::path_segment;

const LOCK_FILE: &str = ".imtag.lock";

/// 复制失败的图片
#[derive(Debug, Clone)]
pub struct CopyFailure {
    pub image_id: i64,
    pub dest: PathBuf,
    pub reason: String,
}

/// 整理过程中在各分支之间传递的状态
///
/// 按值在递归调用之间转移，图片只会在复制成功后记入 `placed`，
/// 复制失败的图片记入 `failed`，之后的分支不再尝试
#[derive(Debug, Default)]
pub struct Placement {
    placed: HashSet<i64>,
    failed: HashSet<i64>,
    /// 新复制的文件数量
    pub copied: usize,
    /// 目标位置已存在同名文件的数量
    pub existing: usize,
    pub failures: Vec<CopyFailure>,
    /// 图片 ID => 所在目录
    pub locations: BTreeMap<i64, PathBuf>,
}

impl Placement {
    pub fn is_placed(&self, id: i64) -> bool {
        self.placed.contains(&id)
    }

    pub fn placed(&self) -> usize {
        self.placed.len()
    }

    /// 图片是否已放置或已复制失败
    fn is_settled(&self, id: i64) -> bool {
        self.placed.contains(&id) || self.failed.contains(&id)
    }

    fn fail(&mut self, image_id: i64, dest: PathBuf, reason: String) {
        if self.failed.insert(image_id) {
            self.failures.push(CopyFailure { image_id, dest, reason });
        }
    }

    fn mark(&mut self, id: i64, dir: &Path) {
        if self.placed.insert(id) {
            self.locations.insert(id, dir.to_path_buf());
            metrics::inc_placed();
        }
    }
}

pub struct Materializer<'a> {
    catalog: &'a Catalog,
    output: PathBuf,
    min_relevance: i64,
    pb: ProgressBar,
}

impl<'a> Materializer<'a> {
    pub fn new(catalog: &'a Catalog, output: impl Into<PathBuf>, min_relevance: i64) -> Self {
        Self { catalog, output: output.into(), min_relevance, pb: ProgressBar::hidden() }
    }

    pub fn with_progress(mut self, pb: ProgressBar) -> Self {
        self.pb = pb;
        self
    }

    /// 整理整个图库
    ///
    /// 同一输出目录同时只能有一个整理任务，否则返回 [`CatalogError::Conflict`]
    pub async fn run(&self) -> Result<Placement> {
        tokio::fs::create_dir_all(&self.output)
            .await
            .map_err(|e| CatalogError::io(&self.output, e))?;
        let _lock = OutputLock::acquire(&self.output)?;

        self.pb.set_length(self.catalog.count_images().await? as u64);
        info!("开始整理图库到 {}", self.output.display());

        let placement = self.branch(vec![], None, Placement::default()).await?;

        info!(
            "整理完成: 放置 {} 张图片，新复制 {} 个文件，{} 个已存在，{} 个失败",
            placement.placed(),
            placement.copied,
            placement.existing,
            placement.failures.len()
        );
        Ok(placement)
    }

    /// 处理一个分支
    ///
    /// `pool` 为 `None` 时表示整个图库，否则为上一层分配给该分支的图片
    fn branch<'b>(
        &'b self,
        path: Vec<String>,
        pool: Option<Vec<Image>>,
        mut placement: Placement,
    ) -> BoxFuture<'b, Result<Placement>> {
        Box::pin(async move {
            // (标签 ID, 图片 ID)，只在分支内部使用
            let (candidates, pairs) = match &pool {
                None => (self.catalog.most_popular_tags(None, self.min_relevance).await?, None),
                Some(images) => {
                    let ids = images.iter().map(|image| image.id).collect::<Vec<_>>();
                    let assocs = self.catalog.associations(&ids).await?;
                    let pairs = assocs
                        .iter()
                        .map(|assoc| (assoc.tag_id, assoc.image_id))
                        .collect::<HashSet<_>>();
                    (rank_tags(&assocs, self.min_relevance), Some(pairs))
                }
            };
            let candidates = candidates
                .into_iter()
                .filter(|tag| !path.contains(&tag.name))
                .collect::<Vec<_>>();

            if candidates.is_empty() {
                debug!("分支 {:?} 没有可用标签", path);
                return Ok(placement);
            }

            for tag in candidates {
                let members = match (&pool, &pairs) {
                    (Some(images), Some(pairs)) => images
                        .iter()
                        .filter(|image| pairs.contains(&(tag.id, image.id)))
                        .cloned()
                        .collect::<Vec<_>>(),
                    _ => crud::get_images_by_tag(self.catalog.db(), tag.id).await?,
                };
                let members = members
                    .into_iter()
                    .filter(|image| !placement.is_settled(image.id))
                    .collect::<Vec<_>>();
                if members.is_empty() {
                    continue;
                }

                let mut child = path.clone();
                child.push(tag.name.clone());
                debug!("分支 {:?}: {} 张图片", child, members.len());

                placement = self.branch(child.clone(), Some(members.clone()), placement).await?;

                let dir = self.dir_of(&child);
                let remaining = members
                    .into_iter()
                    .filter(|image| !placement.is_settled(image.id))
                    .collect::<Vec<_>>();
                placement = self.place(&dir, remaining, placement).await;
            }

            Ok(placement)
        })
    }

    /// 复制图片到目录，遇到错误时停止该分支剩余图片的复制
    ///
    /// 失败的图片不会再被放置，剩余的图片留给上层分支
    async fn place(&self, dir: &Path, images: Vec<Image>, mut placement: Placement) -> Placement {
        let Some(first) = images.first() else {
            return placement;
        };
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            error!("创建目录失败 {}: {}", dir.display(), e);
            placement.fail(first.id, dir.to_path_buf(), e.to_string());
            return placement;
        }

        for image in images {
            let dest = dir.join(&image.name);
            match copy_new(Path::new(&image.path), &dest).await {
                Ok(true) => placement.copied += 1,
                Ok(false) => placement.existing += 1,
                Err(e) => {
                    error!("复制失败 {} -> {}: {}", image.path, dest.display(), e);
                    placement.fail(image.id, dest, e.to_string());
                    break;
                }
            }
            placement.mark(image.id, dir);
            self.pb.inc(1);
        }
        placement
    }

    fn dir_of(&self, path: &[String]) -> PathBuf {
        path.iter().fold(self.output.clone(), |dir, name| dir.join(path_segment(name)))
    }
}

/// 复制文件，目标已存在时跳过并返回 false
async fn copy_new(src: &Path, dest: &Path) -> std::io::Result<bool> {
    if tokio::fs::try_exists(dest).await? {
        return Ok(false);
    }
    tokio::fs::copy(src, dest).await?;
    Ok(true)
}

/// 统计关联中每个标签的图片数量，只保留大于 `min_relevance` 的标签
///
/// 按数量降序排列，数量相同时先创建的标签在前
pub fn rank_tags(associations: &[Association], min_relevance: i64) -> Vec<PopularTag> {
    let mut counts = BTreeMap::<i64, PopularTag>::new();
    for assoc in associations {
        counts
            .entry(assoc.tag_id)
            .or_insert_with(|| PopularTag {
                id: assoc.tag_id,
                name: assoc.name.clone(),
                hits: assoc.hits,
                count: 0,
            })
            .count += 1;
    }
    let mut tags = counts.into_values().filter(|tag| tag.count > min_relevance).collect::<Vec<_>>();
    // BTreeMap 已按 ID 排序，稳定排序保留 ID 顺序
    tags.sort_by(|a, b| b.count.cmp(&a.count));
    tags
}

/// 输出目录锁，防止两个整理任务同时写入
struct OutputLock(PathBuf);

impl OutputLock {
    fn acquire(output: &Path) -> Result<Self> {
        let path = output.join(LOCK_FILE);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self(path)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(CatalogError::Conflict(
                format!("{} 正在被另一个整理任务使用", output.display()),
            )),
            Err(e) => Err(CatalogError::io(path, e)),
        }
    }
}

impl Drop for OutputLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.0) {
            warn!("删除锁文件失败 {}: {}", self.0.display(), e);
        }
    }
}
