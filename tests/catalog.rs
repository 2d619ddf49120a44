use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use imtag::{
    Catalog, CatalogError, Image, ImageKey, ImageUpdate, IngestConfig, Ingestor, Materializer, NewImage,
    Relocation, TagPredictor,
};
use indicatif::ProgressBar;
use rstest::*;
use tempfile::TempDir;
use walkdir::WalkDir;

#[fixture]
fn workspace() -> TempDir {
    TempDir::new().unwrap()
}

async fn open(dir: &TempDir) -> Result<Catalog> {
    Ok(Catalog::open_with(dir.path().join("imtag.db"), dir.path().join("images")).await?)
}

fn write(root: &Path, relative: &str, content: &str) -> Result<()> {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap())?;
    fs::write(path, content)?;
    Ok(())
}

async fn image(catalog: &Catalog, name: &str, tags: &[&str]) -> Result<Image> {
    Ok(catalog
        .create_image(NewImage {
            name: name.to_owned(),
            path: format!("/nonexistent/{}", name),
            classified: !tags.is_empty(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
        })
        .await?)
}

/// 内容为 `content` 的 png 文件在图库中的规范文件名
fn png_name(content: &str) -> String {
    format!("{}.png", blake3::hash(content.as_bytes()).to_hex())
}

fn ids(images: &[Image]) -> BTreeSet<i64> {
    images.iter().map(|image| image.id).collect()
}

#[rstest]
#[tokio::test]
async fn ingest_dedup_by_content(workspace: TempDir) -> Result<()> {
    let catalog = open(&workspace).await?;
    let src = workspace.path().join("src");
    write(&src, "a/x.png", "same")?;
    write(&src, "b/y.png", "same")?;
    write(&src, "c.png", "other")?;
    write(&src, "notes.txt", "ignored")?;

    let ingestor = Ingestor::new(&catalog, IngestConfig::new("png")?);
    let report = ingestor.ingest_dir(&src, &ProgressBar::hidden()).await?;

    assert_eq!(report.added, 2);
    assert_eq!(report.duplicates, 1);
    assert_eq!(catalog.count_images().await?, 2);

    // 移动模式下源文件被删除，重复文件也被删除
    assert!(!src.join("a/x.png").exists());
    assert!(!src.join("b/y.png").exists());
    assert!(src.join("notes.txt").exists());

    let name = format!("{}.png", blake3::hash(b"same").to_hex());
    let stored = catalog.storage().join(&name);
    assert!(stored.exists());
    let x = catalog.get_image(ImageKey::Path(&stored.to_string_lossy())).await?;
    assert_eq!(x.name, name);
    assert_eq!(x.tag_names().collect::<Vec<_>>(), vec!["a"]);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn ingest_dedup_ignores_extension_case(workspace: TempDir) -> Result<()> {
    let catalog = open(&workspace).await?;
    let src = workspace.path().join("src");
    write(&src, "a.png", "same")?;
    write(&src, "b.PNG", "same")?;

    let report = Ingestor::new(&catalog, IngestConfig::new("png")?)
        .ingest_dir(&src, &ProgressBar::hidden())
        .await?;
    assert_eq!(report.added, 1);
    assert_eq!(report.duplicates, 1);
    assert_eq!(catalog.count_images().await?, 1);

    let image = catalog.list_images(0, 10).await?.remove(0);
    assert_eq!(image.name, png_name("same"));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn ingest_skips_blank_directory_tags(workspace: TempDir) -> Result<()> {
    let catalog = open(&workspace).await?;
    let src = workspace.path().join("src");
    write(&src, " /x.png", "x")?;
    write(&src, "ok/y.png", "y")?;

    let report = Ingestor::new(&catalog, IngestConfig::new("png")?)
        .ingest_dir(&src, &ProgressBar::hidden())
        .await?;
    assert_eq!(report.added, 2);

    let stored = |content: &str| catalog.storage().join(png_name(content)).to_string_lossy().into_owned();
    let x = catalog.get_image(ImageKey::Path(&stored("x"))).await?;
    assert!(x.tags.is_empty());
    let y = catalog.get_image(ImageKey::Path(&stored("y"))).await?;
    assert_eq!(y.tag_names().collect::<Vec<_>>(), vec!["ok"]);
    assert_eq!(catalog.count_tags().await?, 1);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn ingest_twice_is_idempotent(workspace: TempDir) -> Result<()> {
    let catalog = open(&workspace).await?;
    let src = workspace.path().join("src");
    write(&src, "cat/1.jpg", "one")?;
    write(&src, "cat/2.JPG", "two")?;

    let config = IngestConfig {
        relocation: Relocation::Copy,
        remove_duplicates: false,
        ..IngestConfig::new("jpg")?
    };
    let ingestor = Ingestor::new(&catalog, config);

    let first = ingestor.ingest_dir(&src, &ProgressBar::hidden()).await?;
    assert_eq!(first.added, 2);
    let second = ingestor.ingest_dir(&src, &ProgressBar::hidden()).await?;
    assert_eq!(second.added, 0);
    assert_eq!(second.duplicates, 2);

    assert_eq!(catalog.count_images().await?, 2);
    assert!(src.join("cat/1.jpg").exists());
    Ok(())
}

#[rstest]
#[tokio::test]
async fn tag_get_or_create(workspace: TempDir) -> Result<()> {
    let catalog = open(&workspace).await?;
    let a = catalog.get_or_create_tag("sky").await?;
    let b = catalog.get_or_create_tag("sky").await?;
    assert_eq!(a, b);
    assert_eq!(a.hits, 0);
    assert_eq!(catalog.count_tags().await?, 1);

    assert!(matches!(catalog.get_tag("sk").await, Err(CatalogError::NotFound(_))));
    assert!(matches!(catalog.get_or_create_tag(" ").await, Err(CatalogError::InvalidInput(_))));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn search_intersection(workspace: TempDir) -> Result<()> {
    let catalog = open(&workspace).await?;
    let i1 = image(&catalog, "1.png", &["a", "b"]).await?;
    let i2 = image(&catalog, "2.png", &["a"]).await?;
    let i3 = image(&catalog, "3.png", &["b"]).await?;
    let i4 = image(&catalog, "4.png", &[]).await?;

    let found = catalog.search(&["a"], 0, 10).await?;
    assert_eq!(ids(&found), BTreeSet::from([i1.id, i2.id]));

    let found = catalog.search(&["a", "b"], 0, 10).await?;
    assert_eq!(ids(&found), BTreeSet::from([i1.id]));

    let found = catalog.search(&["b", "missing"], 0, 10).await?;
    assert!(found.is_empty());

    let untagged = catalog.least_tagged(&["gif"], 100).await?;
    assert_eq!(ids(&untagged), BTreeSet::from([i4.id]));

    let all = catalog.search::<&str>(&[], 0, 10).await?;
    assert_eq!(all.len(), 4);
    assert!(ids(&all).contains(&i3.id));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn search_orders_by_hits_and_pages(workspace: TempDir) -> Result<()> {
    let catalog = open(&workspace).await?;
    let cold = image(&catalog, "1.png", &["sea"]).await?;
    let hot = image(&catalog, "2.png", &["sea"]).await?;
    catalog.touch_image(hot.id).await?;

    let found = catalog.search(&["sea"], 0, 10).await?;
    assert_eq!(found.iter().map(|i| i.id).collect::<Vec<_>>(), vec![hot.id, cold.id]);
    assert!(found[0].last_used.is_some());

    let second = catalog.search(&["sea"], 1, 1).await?;
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].id, cold.id);

    assert!(catalog.search(&["sea"], usize::MAX, 10).await?.is_empty());
    assert_eq!(catalog.search(&["sea"], 0, usize::MAX).await?.len(), 2);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn touch_matches_substring(workspace: TempDir) -> Result<()> {
    let catalog = open(&workspace).await?;
    image(&catalog, "1.png", &["cat", "category", "dog"]).await?;

    assert_eq!(catalog.touch_tags("cat").await?, 2);
    catalog.search(&["cat"], 0, 10).await?;

    assert_eq!(catalog.get_tag("cat").await?.hits, 2);
    assert_eq!(catalog.get_tag("category").await?.hits, 2);
    assert_eq!(catalog.get_tag("dog").await?.hits, 0);

    // 匹配区分大小写
    assert_eq!(catalog.touch_tags("CAT").await?, 0);

    let used = catalog.most_used_tags(1).await?;
    assert_eq!(used[0].name, "cat");
    Ok(())
}

#[rstest]
#[case("")]
#[tokio::test]
async fn empty_fragment_rejected(workspace: TempDir, #[case] fragment: &str) -> Result<()> {
    let catalog = open(&workspace).await?;
    image(&catalog, "1.png", &["a"]).await?;

    assert!(matches!(catalog.touch_tags(fragment).await, Err(CatalogError::InvalidInput(_))));
    assert!(matches!(
        catalog.search(&[fragment], 0, 10).await,
        Err(CatalogError::InvalidInput(_))
    ));
    assert_eq!(catalog.get_tag("a").await?.hits, 0);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn least_tagged_excludes_ignored(workspace: TempDir) -> Result<()> {
    let catalog = open(&workspace).await?;
    let png = image(&catalog, "1.png", &[]).await?;
    image(&catalog, "2.gif", &[]).await?;
    image(&catalog, "3.WEBM", &[]).await?;
    image(&catalog, "4.png", &["done"]).await?;

    let untagged = catalog.least_tagged(&["gif", "webm"], 100).await?;
    assert_eq!(ids(&untagged), BTreeSet::from([png.id]));

    // 后缀按字面比较，不会被当作通配符
    let untagged = catalog.least_tagged(&["p_g", "%", "g%"], 100).await?;
    assert_eq!(untagged.len(), 3);
    assert!(catalog.least_tagged(&["gif"], 0).await?.is_empty());
    assert_eq!(catalog.least_tagged(&["gif"], 1).await?[0].id, png.id);

    let batch = catalog.unclassified_batch(&["webm"], 100, 1).await?;
    assert_eq!(batch.len(), 2);
    assert_eq!(batch.pages(), 2);
    assert_eq!(batch.page(0)[0].id, png.id);
    assert!(batch.page(5).is_empty());
    Ok(())
}

#[rstest]
#[tokio::test]
async fn set_tags_classifies(workspace: TempDir) -> Result<()> {
    let catalog = open(&workspace).await?;
    let img = image(&catalog, "1.png", &[]).await?;
    assert!(!img.classified);

    let img = catalog.set_tags(img.id, &["x", "y", "x"]).await?;
    assert!(img.classified);
    assert_eq!(img.tag_names().collect::<Vec<_>>(), vec!["x", "y"]);
    assert_eq!(catalog.get_tag("x").await?.hits, 1);

    let stats = catalog.stats().await?;
    assert_eq!((stats.images, stats.unclassified, stats.tags), (1, 0, 2));

    let img = catalog.set_tags::<&str>(img.id, &[]).await?;
    assert!(!img.classified);
    assert!(img.tags.is_empty());

    assert!(matches!(catalog.set_tags(999, &["x"]).await, Err(CatalogError::NotFound(_))));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn update_image_partial(workspace: TempDir) -> Result<()> {
    let catalog = open(&workspace).await?;
    let img = image(&catalog, "1.png", &["old"]).await?;

    let img = catalog
        .update_image(img.id, ImageUpdate { path: Some("/moved/1.png".to_owned()), ..Default::default() })
        .await?;
    assert_eq!(img.path, "/moved/1.png");
    assert_eq!(img.name, "1.png");
    assert_eq!(img.tag_names().collect::<Vec<_>>(), vec!["old"]);

    let img = catalog
        .update_image(img.id, ImageUpdate { tags: Some(vec!["new".to_owned()]), ..Default::default() })
        .await?;
    assert_eq!(img.tag_names().collect::<Vec<_>>(), vec!["new"]);
    assert!(catalog.get_image(ImageKey::Path("/moved/1.png")).await.is_ok());

    // 同一路径对应多张图片时查找结果不唯一
    let other = image(&catalog, "2.png", &[]).await?;
    catalog
        .update_image(other.id, ImageUpdate { path: Some("/moved/1.png".to_owned()), ..Default::default() })
        .await?;
    assert!(matches!(
        catalog.get_image(ImageKey::Path("/moved/1.png")).await,
        Err(CatalogError::NotFound(_))
    ));

    assert!(matches!(
        catalog.update_image(999, ImageUpdate::default()).await,
        Err(CatalogError::NotFound(_))
    ));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn delete_tag_in_use(workspace: TempDir) -> Result<()> {
    let catalog = open(&workspace).await?;
    let img = image(&catalog, "1.png", &["keep", "drop"]).await?;

    assert!(matches!(catalog.delete_tag("drop").await, Err(CatalogError::Conflict(_))));

    catalog.set_tags(img.id, &["keep"]).await?;
    catalog.delete_tag("drop").await?;
    assert!(matches!(catalog.get_tag("drop").await, Err(CatalogError::NotFound(_))));
    assert!(matches!(catalog.delete_tag("drop").await, Err(CatalogError::NotFound(_))));

    let img = catalog.get_image(ImageKey::Id(img.id)).await?;
    assert_eq!(img.tag_names().collect::<Vec<_>>(), vec!["keep"]);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn delete_image_removes_file(workspace: TempDir) -> Result<()> {
    let catalog = open(&workspace).await?;
    let src = workspace.path().join("src");
    write(&src, "tag/a.png", "a")?;
    Ingestor::new(&catalog, IngestConfig::new("png")?)
        .ingest_dir(&src, &ProgressBar::hidden())
        .await?;

    let img = catalog.list_images(0, 10).await?.remove(0);
    assert!(Path::new(&img.path).exists());

    catalog.delete_image(img.id).await?;
    assert!(!Path::new(&img.path).exists());
    assert!(matches!(
        catalog.get_image(ImageKey::Id(img.id)).await,
        Err(CatalogError::NotFound(_))
    ));
    // 关联随图片删除，标签可以被删除
    catalog.delete_tag("tag").await?;
    assert!(matches!(catalog.delete_image(img.id).await, Err(CatalogError::NotFound(_))));
    Ok(())
}

struct FixedPredictor(Vec<(&'static str, f32)>);

impl TagPredictor for FixedPredictor {
    fn predict(&self, _image: &Path, threshold: f32) -> anyhow::Result<BTreeSet<String>> {
        Ok(self
            .0
            .iter()
            .filter(|(_, confidence)| *confidence >= threshold)
            .map(|(tag, _)| tag.to_string())
            .collect())
    }
}

#[rstest]
#[tokio::test]
async fn auto_classify(workspace: TempDir) -> Result<()> {
    let catalog = open(&workspace).await?;
    let img = image(&catalog, "1.png", &[]).await?;

    assert!(matches!(
        catalog.auto_classify(img.id, None, 0.5).await,
        Err(CatalogError::ExternalUnavailable)
    ));

    let predictor: Arc<dyn TagPredictor> =
        Arc::new(FixedPredictor(vec![("girl", 0.9), ("noise", 0.1)]));
    let img = catalog.auto_classify(img.id, Some(predictor), 0.5).await?;
    assert!(img.classified);
    assert_eq!(img.tag_names().collect::<Vec<_>>(), vec!["girl"]);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn materialize_places_each_image_once(workspace: TempDir) -> Result<()> {
    let catalog = open(&workspace).await?;
    let src = workspace.path().join("src");
    write(&src, "a/b/1.png", "1")?;
    write(&src, "a/b/2.png", "2")?;
    write(&src, "a/3.png", "3")?;
    write(&src, "b/4.png", "4")?;
    write(&src, "c/5.png", "5")?;
    write(&src, "6.png", "6")?;
    let report = Ingestor::new(&catalog, IngestConfig::new("png")?)
        .ingest_dir(&src, &ProgressBar::hidden())
        .await?;
    assert_eq!(report.added, 6);

    let output = workspace.path().join("out");
    let placement = Materializer::new(&catalog, &output, 0).run().await?;
    assert!(placement.failures.is_empty());
    assert_eq!(placement.placed(), 5);
    assert_eq!(placement.copied, 5);

    let mut seen = HashMap::new();
    for entry in WalkDir::new(&output) {
        let entry = entry?;
        if entry.file_type().is_file() {
            let name = entry.file_name().to_string_lossy().into_owned();
            assert!(seen.insert(name, entry.into_path()).is_none());
        }
    }
    assert_eq!(seen.len(), 5);
    assert!(!output.join(".imtag.lock").exists());

    // 更深的分支先认领图片，剩下的留在分支自身的目录
    assert_eq!(seen[&png_name("1")], output.join("a/b").join(png_name("1")));
    assert_eq!(seen[&png_name("2")], output.join("a/b").join(png_name("2")));
    assert_eq!(seen[&png_name("3")], output.join("a").join(png_name("3")));
    assert_eq!(seen[&png_name("4")], output.join("b").join(png_name("4")));
    assert_eq!(seen[&png_name("5")], output.join("c").join(png_name("5")));

    let untagged = catalog.least_tagged::<&str>(&[], 10).await?;
    assert_eq!(untagged.len(), 1);
    assert!(!seen.contains_key(&untagged[0].name));
    assert!(!placement.is_placed(untagged[0].id));

    // 再次整理时已有文件不会重复复制
    let again = Materializer::new(&catalog, &output, 0).run().await?;
    assert_eq!(again.copied, 0);
    assert_eq!(again.existing, 5);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn materialize_copy_failure_is_isolated(workspace: TempDir) -> Result<()> {
    let catalog = open(&workspace).await?;
    let broken = image(&catalog, "broken.png", &["a", "b"]).await?;

    let file = workspace.path().join("healthy.png");
    fs::write(&file, "healthy")?;
    let healthy = catalog
        .create_image(NewImage {
            name: "healthy.png".to_owned(),
            path: file.to_string_lossy().into_owned(),
            classified: true,
            tags: vec!["a".to_owned(), "b".to_owned()],
        })
        .await?;

    let output = workspace.path().join("out");
    let placement = Materializer::new(&catalog, &output, 0).run().await?;

    assert_eq!(placement.failures.len(), 1);
    assert_eq!(placement.failures[0].image_id, broken.id);
    assert!(!placement.is_placed(broken.id));
    assert!(placement.is_placed(healthy.id));
    assert_eq!(placement.placed(), 1);
    // a/b 分支在失败处停止，健康图片由上层分支放置
    assert_eq!(placement.locations[&healthy.id], output.join("a"));
    assert!(output.join("a/healthy.png").exists());
    Ok(())
}

#[rstest]
#[tokio::test]
async fn materialize_min_relevance(workspace: TempDir) -> Result<()> {
    let catalog = open(&workspace).await?;
    let src = workspace.path().join("src");
    write(&src, "many/1.png", "1")?;
    write(&src, "many/2.png", "2")?;
    write(&src, "few/3.png", "3")?;
    Ingestor::new(&catalog, IngestConfig::new("png")?)
        .ingest_dir(&src, &ProgressBar::hidden())
        .await?;

    let output = workspace.path().join("out");
    let placement = Materializer::new(&catalog, &output, 1).run().await?;
    assert_eq!(placement.placed(), 2);
    assert!(output.join("many").is_dir());
    assert!(!output.join("few").exists());
    Ok(())
}
