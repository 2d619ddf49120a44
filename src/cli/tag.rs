use clap::Parser;
use log::info;

use crate::cli::SubCommandExtend;
use crate::cli::search::{OutputFormat, print_images};
use crate::config::Opts;
use crate::Catalog;

#[derive(Parser, Debug, Clone)]
pub struct TagCommand {
    /// 图片 ID
    pub id: i64,
    /// 新的标签集合，不提供时清空图片的所有标签
    pub tags: Vec<String>,
}

impl SubCommandExtend for TagCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let catalog = Catalog::open(&opts.conf_dir).await?;
        let image = catalog.set_tags(self.id, &self.tags).await?;
        print_images(&[image], &OutputFormat::Table)
    }
}

#[derive(Parser, Debug, Clone)]
pub struct TagsCommand {
    /// 按关联图片数量排序，而不是按访问次数
    #[arg(long)]
    pub popular: bool,
    /// 显示数量
    #[arg(long, value_name = "COUNT", default_value_t = 10)]
    pub count: usize,
    /// 只显示关联图片数量大于该值的标签，仅用于 --popular
    #[arg(short, long, value_name = "N", default_value_t = 0)]
    pub min_relevance: i64,
}

impl SubCommandExtend for TagsCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let catalog = Catalog::open(&opts.conf_dir).await?;
        if self.popular {
            for tag in catalog.most_popular_tags(Some(self.count), self.min_relevance).await? {
                println!("{}\t{}\t{}", tag.name, tag.count, tag.hits);
            }
        } else {
            for tag in catalog.most_used_tags(self.count).await? {
                println!("{}\t{}", tag.name, tag.hits);
            }
        }
        Ok(())
    }
}

#[derive(Parser, Debug, Clone)]
pub struct DeleteTagCommand {
    /// 标签名，需要完全匹配
    pub name: String,
}

impl SubCommandExtend for DeleteTagCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let catalog = Catalog::open(&opts.conf_dir).await?;
        catalog.delete_tag(&self.name).await?;
        info!("标签已删除: {}", self.name);
        Ok(())
    }
}
