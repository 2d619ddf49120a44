use std::collections::BTreeSet;
use std::fs::File;
use std::io;
use std::path::{Component, Path};

use indicatif::ProgressStyle;
use regex::Regex;

/// 计算文件内容的 blake3 哈希
pub fn hash_file(path: impl AsRef<Path>) -> io::Result<blake3::Hash> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize())
}

/// 由内容哈希和原始后缀生成规范文件名，后缀统一为小写
pub fn canonical_name(hash: &blake3::Hash, path: impl AsRef<Path>) -> String {
    match path.as_ref().extension() {
        Some(ext) => format!("{}.{}", hash.to_hex(), ext.to_string_lossy().to_lowercase()),
        None => hash.to_hex().to_string(),
    }
}

/// 根据扫描根目录到文件所在目录之间的每一级目录名猜测标签
///
/// 目录名去除首尾空白，空白目录名不会成为标签
pub fn guess_tags(root: impl AsRef<Path>, file: impl AsRef<Path>) -> BTreeSet<String> {
    let Some(parent) = file.as_ref().parent() else {
        return BTreeSet::new();
    };
    let Ok(relative) = parent.strip_prefix(root.as_ref()) else {
        return BTreeSet::new();
    };
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy().trim().to_owned()),
            _ => None,
        })
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// 构建匹配逗号分隔后缀列表的正则，忽略大小写
pub fn suffix_regex(suffix: &str) -> Result<Regex, regex::Error> {
    let alternatives = suffix
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i)^({})$", alternatives))
}

/// 解析逗号分隔的后缀列表，统一为小写
pub fn parse_suffixes(suffix: &str) -> Vec<String> {
    suffix
        .split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// 拆分请求中以空白分隔的标签，不会产生空片段
pub fn parse_tags(tags: &str) -> Vec<String> {
    tags.split_whitespace().map(str::to_owned).collect()
}

/// 将标签名转换为安全的目录名
pub fn path_segment(name: &str) -> String {
    let segment = name.replace(['/', '\\'], "_");
    match segment.as_str() {
        "." | ".." => segment.replace('.', "_"),
        _ => segment,
    }
}

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        .unwrap()
        .progress_chars("#>-")
}
