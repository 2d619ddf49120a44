use clap::Parser;
use imtag::cli::SubCommandExtend;
use imtag::config::{Opts, SubCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let opts = Opts::parse();

    match &opts.subcmd {
        SubCommand::Add(config) => config.run(&opts).await,
        SubCommand::Search(config) => config.run(&opts).await,
        SubCommand::Tag(config) => config.run(&opts).await,
        SubCommand::Tags(config) => config.run(&opts).await,
        SubCommand::DeleteTag(config) => config.run(&opts).await,
        SubCommand::Remove(config) => config.run(&opts).await,
        SubCommand::Untagged(config) => config.run(&opts).await,
        SubCommand::Classify(config) => config.run(&opts).await,
        SubCommand::Organize(config) => config.run(&opts).await,
        SubCommand::Stats(config) => config.run(&opts).await,
        SubCommand::Server(config) => config.run(&opts).await,
    }
}
