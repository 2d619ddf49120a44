use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::Catalog;

#[derive(Parser, Debug, Clone)]
pub struct RemoveCommand {
    /// 图片 ID
    pub ids: Vec<i64>,
}

impl SubCommandExtend for RemoveCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let catalog = Catalog::open(&opts.conf_dir).await?;
        for id in &self.ids {
            catalog.delete_image(*id).await?;
            println!("[OK] 删除图片 #{}", id);
        }
        Ok(())
    }
}
