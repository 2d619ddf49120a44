use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;

use crate::cli::*;

static CONF_DIR: LazyLock<String> = LazyLock::new(|| {
    ProjectDirs::from("", "imtag", "imtag")
        .map(|dirs| dirs.config_dir().to_string_lossy().into_owned())
        .unwrap_or_else(|| ".imtag".to_owned())
});

fn default_config_dir() -> &'static str {
    CONF_DIR.as_str()
}

#[derive(Parser, Debug, Clone)]
pub struct IngestOptions {
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = "png,jpg,gif,webm")]
    pub suffix: String,
    /// 复制图片到图库，而不是移动
    #[arg(long)]
    pub copy: bool,
    /// 保留重复图片的源文件，默认会删除
    #[arg(long)]
    pub keep_duplicates: bool,
    /// 将新图片直接标记为已分类
    #[arg(long)]
    pub classified: bool,
    /// 每个事务提交的图片数量
    #[arg(long, value_name = "SIZE", default_value_t = 256)]
    pub batch_size: usize,
}

#[derive(Parser, Debug, Clone)]
pub struct QueryOptions {
    /// 待分类图片中忽略的后缀名，多个后缀用逗号分隔
    #[arg(long, value_name = "SUFFIX", default_value = "gif,webm")]
    pub ignore: String,
    /// 每次获取的待分类图片数量上限
    #[arg(long, value_name = "SIZE", default_value_t = 100)]
    pub batch: usize,
    /// 每页显示的图片数量
    #[arg(long, value_name = "SIZE", default_value_t = 6)]
    pub page_size: usize,
}

#[derive(Parser, Debug, Clone)]
pub struct MaterializeOptions {
    /// 输出目录，默认为配置目录下的 organized
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// 标签至少需要关联多于该数量的图片才会生成目录
    #[arg(short, long, value_name = "N", default_value_t = 0)]
    pub min_relevance: i64,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "imtag", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// imtag 配置文件目录
    #[arg(short, long, default_value = default_config_dir())]
    pub conf_dir: ConfDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 扫描目录并添加图片到图库
    Add(AddCommand),
    /// 按标签搜索图片
    Search(SearchCommand),
    /// 设置图片的标签，不提供标签时清空
    Tag(TagCommand),
    /// 查看热门标签
    Tags(TagsCommand),
    /// 删除标签
    DeleteTag(DeleteTagCommand),
    /// 删除图片及其文件
    Remove(RemoveCommand),
    /// 查看待分类的图片
    Untagged(UntaggedCommand),
    /// 使用外部模型自动分类图片
    Classify(ClassifyCommand),
    /// 按标签将图库整理为目录树
    Organize(OrganizeCommand),
    /// 显示图库统计信息
    Stats(StatsCommand),
    /// 启动 HTTP 服务
    Server(ServerCommand),
}

#[derive(Debug, Clone)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回数据库文件的路径
    pub fn database(&self) -> PathBuf {
        self.path.join("imtag.db")
    }

    /// 返回图库存储目录
    pub fn storage(&self) -> PathBuf {
        self.path.join("images")
    }

    /// 返回目录树默认输出目录
    pub fn organized(&self) -> PathBuf {
        self.path.join("organized")
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}
