use std::path::PathBuf;

use clap::Parser;
use indicatif::ProgressBar;

use crate::cli::SubCommandExtend;
use crate::config::{IngestOptions, Opts};
use crate::ingest::{IngestConfig, Ingestor};
use crate::utils::pb_style;
use crate::Catalog;

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    #[command(flatten)]
    pub ingest: IngestOptions,
    /// 图片所在目录，子目录名会作为图片的初始标签
    pub path: PathBuf,
}

impl SubCommandExtend for AddCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let catalog = Catalog::open(&opts.conf_dir).await?;
        let ingestor = Ingestor::new(&catalog, IngestConfig::from_options(&self.ingest)?);

        let pb = ProgressBar::no_length().with_style(pb_style());
        let report = ingestor.ingest_dir(&self.path, &pb).await?;
        pb.finish_with_message("图片添加完成");

        println!(
            "added: {}\tduplicates: {}\tunreadable: {}",
            report.added, report.duplicates, report.unreadable
        );
        Ok(())
    }
}
