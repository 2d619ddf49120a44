mod add;
mod classify;
mod organize;
mod remove;
mod search;
pub mod server;
mod stats;
mod tag;
mod untagged;

pub use add::*;
pub use classify::*;
pub use organize::*;
pub use remove::*;
pub use search::*;
pub use server::*;
pub use stats::*;
pub use tag::*;
pub use untagged::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}
