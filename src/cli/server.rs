use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::info;
use tokio::net::TcpListener;

use crate::cli::SubCommandExtend;
use crate::config::{Opts, QueryOptions};
use crate::predict::{CommandPredictor, TagPredictor};
use crate::{Catalog, server};

#[derive(Parser, Debug, Clone)]
pub struct ServerCommand {
    #[command(flatten)]
    pub query: QueryOptions,
    /// 监听地址
    #[arg(long, default_value = "127.0.0.1:5050")]
    pub addr: String,
    /// 自动分类使用的外部预测程序
    #[arg(long, value_name = "PROGRAM")]
    pub predictor: Option<PathBuf>,
    /// 自动分类的最低置信度
    #[arg(long, default_value_t = 0.5)]
    pub threshold: f32,
}

impl SubCommandExtend for ServerCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let catalog = Catalog::open(&opts.conf_dir).await?;
        let predictor = self
            .predictor
            .as_ref()
            .map(|program| Arc::new(CommandPredictor::new(program, vec![])) as Arc<dyn TagPredictor>);

        // 创建应用状态
        let state = server::AppState::new(catalog, self.clone(), predictor);

        // 创建应用
        let app = server::create_app(state);

        // 启动服务器
        info!("服务器启动：http://{}", &self.addr);
        let listener = TcpListener::bind(&self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
