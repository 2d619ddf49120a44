use std::sync::LazyLock;

use prometheus::*;

static METRIC_SEARCH_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("imtag_search_count", "count of tag searches", &["fragments"])
        .unwrap()
});

static METRIC_INGEST_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("imtag_ingest_count", "count of ingested files", &["result"])
        .unwrap()
});

static METRIC_PLACED_COUNT: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("imtag_placed_count", "count of images placed into the tag tree")
        .unwrap()
});

/// 增加搜索次数，按标签片段数量分组
pub fn inc_search_count(fragments: usize) {
    let fragments = match fragments {
        0 => "0",
        1 => "1",
        2 => "2",
        _ => "3+",
    };
    METRIC_SEARCH_COUNT.with_label_values(&[fragments]).inc();
}

pub fn inc_ingest_added() {
    METRIC_INGEST_COUNT.with_label_values(&["added"]).inc();
}

pub fn inc_ingest_duplicate() {
    METRIC_INGEST_COUNT.with_label_values(&["duplicate"]).inc();
}

pub fn inc_placed() {
    METRIC_PLACED_COUNT.inc();
}

/// 以文本格式导出所有指标
pub fn gather_text() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    Ok(encoder.encode_to_string(&prometheus::gather())?)
}
