use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn};

use crate::cli::SubCommandExtend;
use crate::config::{Opts, QueryOptions};
use crate::predict::{CommandPredictor, TagPredictor};
use crate::utils::parse_suffixes;
use crate::{Catalog, CatalogError};

#[derive(Parser, Debug, Clone)]
pub struct ClassifyCommand {
    #[command(flatten)]
    pub query: QueryOptions,
    /// 预测标签的外部程序，以图片路径为最后一个参数运行，每行输出 `标签<TAB>置信度`
    #[arg(long, value_name = "PROGRAM")]
    pub predictor: Option<PathBuf>,
    /// 传给预测程序的额外参数
    #[arg(long = "predictor-arg", value_name = "ARG")]
    pub predictor_args: Vec<String>,
    /// 最低置信度
    #[arg(short, long, default_value_t = 0.5)]
    pub threshold: f32,
}

impl SubCommandExtend for ClassifyCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let catalog = Catalog::open(&opts.conf_dir).await?;
        let predictor = self.predictor.as_ref().map(|program| {
            Arc::new(CommandPredictor::new(program, self.predictor_args.clone()))
                as Arc<dyn TagPredictor>
        });

        let ignore = parse_suffixes(&self.query.ignore);
        let batch = catalog.least_tagged(&ignore, self.query.batch).await?;
        info!("待分类图片: {}", batch.len());

        let mut classified = 0;
        for image in &batch {
            match catalog.auto_classify(image.id, predictor.clone(), self.threshold).await {
                Ok(image) if image.classified => {
                    classified += 1;
                    let tags = image.tag_names().collect::<Vec<_>>().join(" ");
                    println!("[OK] #{}\t{}", image.id, tags);
                }
                Ok(image) => println!("[SKIP] #{}", image.id),
                Err(CatalogError::ExternalUnavailable) => {
                    warn!("未配置自动标注模型，跳过自动分类");
                    return Ok(());
                }
                Err(e) => error!("自动分类失败 #{}: {}", image.id, e),
            }
        }
        info!("自动分类完成: {}/{}", classified, batch.len());
        Ok(())
    }
}
