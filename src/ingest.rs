use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use indicatif::ProgressBar;
use log::{debug, error, info, warn};
use regex::Regex;
use walkdir::WalkDir;

use crate::catalog::{Catalog, insert_image};
use crate::config::IngestOptions;
use crate::db::{Image, ImageKey, NewImage, crud};
use crate::error::{CatalogError, Result};
use crate::metrics;
use crate::utils::{canonical_name, guess_tags, hash_file, suffix_regex};

/// 图片进入图库的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relocation {
    /// 复制后删除源文件
    Move,
    /// 保留源文件
    Copy,
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// 接受的文件后缀
    pub suffix: Regex,
    pub relocation: Relocation,
    /// 是否删除重复图片的源文件
    pub remove_duplicates: bool,
    /// 新图片的分类状态
    pub classified: bool,
    /// 每个事务提交的图片数量
    pub batch_size: usize,
}

impl IngestConfig {
    pub fn new(suffix: &str) -> Result<Self> {
        let suffix = suffix_regex(suffix)
            .map_err(|e| CatalogError::InvalidInput(format!("无效的后缀列表 {}: {}", suffix, e)))?;
        Ok(Self {
            suffix,
            relocation: Relocation::Move,
            remove_duplicates: true,
            classified: false,
            batch_size: 256,
        })
    }

    pub fn from_options(opts: &IngestOptions) -> Result<Self> {
        Ok(Self {
            relocation: if opts.copy { Relocation::Copy } else { Relocation::Move },
            remove_duplicates: !opts.keep_duplicates,
            classified: opts.classified,
            batch_size: opts.batch_size.max(1),
            ..Self::new(&opts.suffix)?
        })
    }
}

/// 扫描得到的待添加文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    /// 根据目录结构猜测的标签
    pub tags: BTreeSet<String>,
}

/// 单个文件的添加结果
#[derive(Debug)]
pub enum Ingested {
    Added(Image),
    /// 内容与已有图片相同，没有创建新记录
    Duplicate { source: PathBuf, name: String },
    /// 文件无法读取，已跳过
    Unreadable { source: PathBuf, reason: String },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub added: usize,
    pub duplicates: usize,
    pub unreadable: usize,
}

impl IngestReport {
    fn record(&mut self, outcome: &Ingested) {
        match outcome {
            Ingested::Added(_) => self.added += 1,
            Ingested::Duplicate { .. } => self.duplicates += 1,
            Ingested::Unreadable { .. } => self.unreadable += 1,
        }
    }
}

/// 已复制到存储目录、等待写入数据库的图片
struct Staged {
    source: PathBuf,
    dest: PathBuf,
    image: NewImage,
}

pub struct Ingestor<'a> {
    catalog: &'a Catalog,
    config: IngestConfig,
}

impl<'a> Ingestor<'a> {
    pub fn new(catalog: &'a Catalog, config: IngestConfig) -> Self {
        Self { catalog, config }
    }

    /// 递归扫描目录，返回后缀匹配的文件及猜测的标签
    pub fn scan(&self, root: impl AsRef<Path>) -> Vec<Candidate> {
        let root = root.as_ref();
        info!("开始扫描目录: {}", root.display());
        let candidates = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("扫描出错: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .is_some_and(|ext| self.config.suffix.is_match(&ext.to_string_lossy()))
            })
            .map(|entry| Candidate {
                tags: guess_tags(root, entry.path()),
                path: entry.into_path(),
            })
            .collect::<Vec<_>>();
        info!("扫描完成，共 {} 张图片", candidates.len());
        candidates
    }

    /// 扫描目录并分批添加到图库
    pub async fn ingest_dir(&self, root: impl AsRef<Path>, pb: &ProgressBar) -> Result<IngestReport> {
        let candidates = self.scan(root);
        pb.set_length(candidates.len() as u64);

        let mut report = IngestReport::default();
        for chunk in candidates.chunks(self.config.batch_size.max(1)) {
            for outcome in self.ingest_batch(chunk.to_vec()).await? {
                match &outcome {
                    Ingested::Added(image) => pb.set_message(image.name.clone()),
                    Ingested::Duplicate { source, .. } => {
                        pb.set_message(format!("跳过重复图片: {}", source.display()))
                    }
                    Ingested::Unreadable { source, .. } => {
                        pb.set_message(format!("无法读取: {}", source.display()))
                    }
                }
                report.record(&outcome);
                pb.inc(1);
            }
        }

        info!(
            "添加 {} 张图片，跳过 {} 张重复图片，{} 张无法读取",
            report.added, report.duplicates, report.unreadable
        );
        Ok(report)
    }

    /// 添加一批文件
    ///
    /// 所有新图片的记录和标签在同一事务中写入；写入失败时删除已复制的文件，
    /// 提交成功后才会删除源文件
    pub async fn ingest_batch(&self, candidates: Vec<Candidate>) -> Result<Vec<Ingested>> {
        let mut outcomes = Vec::with_capacity(candidates.len());
        let mut staged: Vec<Staged> = vec![];
        let mut seen = HashSet::new();

        for candidate in candidates {
            let source = candidate.path;
            let hash = {
                let source = source.clone();
                tokio::task::spawn_blocking(move || hash_file(source))
                    .await
                    .map_err(|e| CatalogError::External(e.to_string()))?
            };
            let hash = match hash {
                Ok(hash) => hash,
                Err(e) => {
                    warn!("计算哈希失败 {}: {}", source.display(), e);
                    outcomes.push(Ingested::Unreadable { source, reason: e.to_string() });
                    continue;
                }
            };

            let name = canonical_name(&hash, &source);
            let dest = self.catalog.storage().join(&name);

            if !seen.insert(name.clone()) || self.is_duplicate(&name, &dest).await? {
                self.discard_duplicate(&source, &dest).await;
                metrics::inc_ingest_duplicate();
                outcomes.push(Ingested::Duplicate { source, name });
                continue;
            }

            if let Err(e) = tokio::fs::copy(&source, &dest).await {
                cleanup(&staged).await;
                return Err(CatalogError::io(&dest, e));
            }
            debug!("{} -> {}", source.display(), dest.display());

            staged.push(Staged {
                image: NewImage {
                    name,
                    path: dest.to_string_lossy().into_owned(),
                    classified: self.config.classified,
                    tags: candidate.tags.into_iter().collect(),
                },
                source,
                dest,
            });
        }

        let ids = match self.commit(&staged).await {
            Ok(ids) => ids,
            Err(e) => {
                error!("写入数据库失败，回滚 {} 张图片: {}", staged.len(), e);
                cleanup(&staged).await;
                return Err(e);
            }
        };

        if self.config.relocation == Relocation::Move {
            for item in &staged {
                if let Err(e) = tokio::fs::remove_file(&item.source).await {
                    warn!("删除源文件失败 {}: {}", item.source.display(), e);
                }
            }
        }

        for id in ids {
            metrics::inc_ingest_added();
            outcomes.push(Ingested::Added(self.catalog.get_image(ImageKey::Id(id)).await?));
        }
        Ok(outcomes)
    }

    async fn is_duplicate(&self, name: &str, dest: &Path) -> Result<bool> {
        let exists = tokio::fs::try_exists(dest).await.map_err(|e| CatalogError::io(dest, e))?;
        Ok(exists || crud::check_image_name(self.catalog.db(), name).await?)
    }

    async fn discard_duplicate(&self, source: &Path, dest: &Path) {
        if !self.config.remove_duplicates || is_same_file(source, dest).await {
            debug!("跳过重复图片: {}", source.display());
            return;
        }
        match tokio::fs::remove_file(source).await {
            Ok(()) => debug!("删除重复图片: {}", source.display()),
            Err(e) => warn!("删除重复图片失败 {}: {}", source.display(), e),
        }
    }

    async fn commit(&self, staged: &[Staged]) -> Result<Vec<i64>> {
        let mut tx = self.catalog.db().begin().await?;
        let mut ids = Vec::with_capacity(staged.len());
        for item in staged {
            ids.push(insert_image(&mut *tx, &item.image).await?);
        }
        tx.commit().await?;
        Ok(ids)
    }
}

async fn cleanup(staged: &[Staged]) {
    for item in staged {
        if let Err(e) = tokio::fs::remove_file(&item.dest).await {
            warn!("清理文件失败 {}: {}", item.dest.display(), e);
        }
    }
}

/// 源文件本身就是存储目录中的规范文件时不能删除
async fn is_same_file(a: &Path, b: &Path) -> bool {
    match (tokio::fs::canonicalize(a).await, tokio::fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
