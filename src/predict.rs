use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use log::debug;

/// 自动标注模型接口
///
/// 根据图片路径预测标签，只返回置信度不低于 `threshold` 的标签
pub trait TagPredictor: Send + Sync {
    fn predict(&self, image: &Path, threshold: f32) -> Result<BTreeSet<String>>;
}

/// 调用外部程序进行预测
///
/// 程序以图片路径作为最后一个参数运行，每行输出 `标签<TAB>置信度`
#[derive(Debug, Clone)]
pub struct CommandPredictor {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandPredictor {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self { program: program.into(), args }
    }
}

impl TagPredictor for CommandPredictor {
    fn predict(&self, image: &Path, threshold: f32) -> Result<BTreeSet<String>> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(image)
            .output()
            .with_context(|| format!("无法运行 {}", self.program.display()))?;
        if !output.status.success() {
            bail!(
                "{} 退出状态 {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let tags = parse_predictions(&stdout, threshold)?;
        debug!("{} 预测标签: {:?}", image.display(), tags);
        Ok(tags)
    }
}

/// 解析 `标签<TAB>置信度` 格式的输出，缺少置信度时视为 1.0
fn parse_predictions(output: &str, threshold: f32) -> Result<BTreeSet<String>> {
    let mut tags = BTreeSet::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (tag, confidence) = match line.split_once('\t') {
            Some((tag, confidence)) => (
                tag.trim(),
                confidence.trim().parse::<f32>().with_context(|| format!("无效的置信度: {}", line))?,
            ),
            None => (line, 1.0),
        };
        if !tag.is_empty() && confidence >= threshold {
            tags.insert(tag.to_owned());
        }
    }
    Ok(tags)
}
