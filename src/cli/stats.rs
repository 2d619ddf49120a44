use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::Catalog;

#[derive(Parser, Debug, Clone)]
pub struct StatsCommand {
    /// 同时显示访问最多的图片数量
    #[arg(long, value_name = "COUNT", default_value_t = 0)]
    pub top: usize,
}

impl SubCommandExtend for StatsCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let catalog = Catalog::open(&opts.conf_dir).await?;
        let stats = catalog.stats().await?;
        println!("images:       {}", stats.images);
        println!("unclassified: {}", stats.unclassified);
        println!("tags:         {}", stats.tags);
        if self.top > 0 {
            for image in catalog.most_used_images(self.top).await? {
                println!("{}\t{}\t{}", image.id, image.hits, image.path);
            }
        }
        Ok(())
    }
}
