use clap::Parser;
use indicatif::ProgressBar;

use crate::cli::SubCommandExtend;
use crate::config::{MaterializeOptions, Opts};
use crate::materialize::Materializer;
use crate::utils::pb_style;
use crate::Catalog;

#[derive(Parser, Debug, Clone)]
pub struct OrganizeCommand {
    #[command(flatten)]
    pub materialize: MaterializeOptions,
}

impl SubCommandExtend for OrganizeCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let catalog = Catalog::open(&opts.conf_dir).await?;
        let output = self.materialize.output.clone().unwrap_or_else(|| opts.conf_dir.organized());

        let pb = ProgressBar::no_length().with_style(pb_style());
        let placement = Materializer::new(&catalog, &output, self.materialize.min_relevance)
            .with_progress(pb.clone())
            .run()
            .await?;
        pb.finish_with_message("整理完成");

        for failure in &placement.failures {
            eprintln!("[ERR] #{} -> {}: {}", failure.image_id, failure.dest.display(), failure.reason);
        }
        println!(
            "placed: {}\tcopied: {}\texisting: {}\tfailed: {}",
            placement.placed(),
            placement.copied,
            placement.existing,
            placement.failures.len()
        );
        Ok(())
    }
}
