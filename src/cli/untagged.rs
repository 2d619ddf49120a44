use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::cli::search::{OutputFormat, print_images};
use crate::config::{Opts, QueryOptions};
use crate::utils::parse_suffixes;
use crate::Catalog;

#[derive(Parser, Debug, Clone)]
pub struct UntaggedCommand {
    #[command(flatten)]
    pub query: QueryOptions,
    /// 页码，从 0 开始
    #[arg(short, long, default_value_t = 0)]
    pub page: usize,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for UntaggedCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let catalog = Catalog::open(&opts.conf_dir).await?;
        let ignore = parse_suffixes(&self.query.ignore);
        let batch = catalog
            .unclassified_batch(&ignore, self.query.batch, self.query.page_size)
            .await?;
        print_images(batch.page(self.page), &self.output_format)?;
        eprintln!("第 {}/{} 页，共 {} 张待分类图片", self.page + 1, batch.pages(), batch.len());
        Ok(())
    }
}
