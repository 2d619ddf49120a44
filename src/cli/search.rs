use std::convert::Infallible;
use std::str::FromStr;

use anyhow::Result;
use clap::{Parser, ValueEnum};

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::{Catalog, Image};

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    /// 标签片段，图片需要匹配所有片段；不提供时按访问次数列出全部图片
    pub tags: Vec<String>,
    /// 页码，从 0 开始
    #[arg(short, long, default_value_t = 0)]
    pub page: usize,
    /// 每页数量
    #[arg(long, value_name = "COUNT", default_value_t = 10)]
    pub count: usize,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let catalog = Catalog::open(&opts.conf_dir).await?;
        let tags = self
            .tags
            .iter()
            .flat_map(|tags| crate::utils::parse_tags(tags))
            .collect::<Vec<_>>();
        let result = catalog.search(&tags, self.page.saturating_mul(self.count), self.count).await?;
        print_images(&result, &self.output_format)
    }
}

pub(crate) fn print_images(images: &[Image], format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(images)?)
        }
        OutputFormat::Table => {
            for image in images {
                let tags = image.tag_names().collect::<Vec<_>>().join(" ");
                println!("{}\t{}\t{}\t{}", image.id, image.hits, image.path, tags);
            }
        }
    }
    Ok(())
}

#[derive(ValueEnum, Debug, Clone)]
pub enum OutputFormat {
    Json,
    Table,
}

impl FromStr for OutputFormat {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            _ => Ok(Self::Table),
        }
    }
}
