use chrono::{DateTime, Utc};
use sqlx::{Executor, QueryBuilder, Result, Sqlite, SqliteConnection};

use super::{Association, Image, PopularTag, Tag};

const IMAGE_COLUMNS: &str = "id, name, path, hits, classified, date_created, last_used";

/// 添加图片记录
pub async fn add_image<'c, E>(
    executor: E,
    name: &str,
    path: &str,
    classified: bool,
    now: DateTime<Utc>,
) -> Result<i64>
where
    E: Executor<'c, Database = Sqlite>,
{
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO image (name, path, classified, date_created)
        VALUES (?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(name)
    .bind(path)
    .bind(classified)
    .bind(now)
    .fetch_one(executor)
    .await?;

    Ok(id)
}

/// 检查规范文件名是否已存在
pub async fn check_image_name<'c, E>(executor: E, name: &str) -> Result<bool>
where
    E: Executor<'c, Database = Sqlite>,
{
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM image WHERE name = ?")
        .bind(name)
        .fetch_one(executor)
        .await?;

    Ok(count > 0)
}

pub async fn get_image_by_id<'c, E>(executor: E, id: i64) -> Result<Option<Image>>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_as(&format!("SELECT {IMAGE_COLUMNS} FROM image WHERE id = ?"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// 按路径查找图片，最多返回两条，用于判断结果是否唯一
pub async fn get_images_by_path<'c, E>(executor: E, path: &str) -> Result<Vec<Image>>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_as(&format!("SELECT {IMAGE_COLUMNS} FROM image WHERE path = ? LIMIT 2"))
        .bind(path)
        .fetch_all(executor)
        .await
}

pub async fn update_image_name<'c, E>(executor: E, id: i64, name: &str) -> Result<u64>
where
    E: Executor<'c, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE image SET name = ? WHERE id = ?")
        .bind(name)
        .bind(id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

pub async fn update_image_path<'c, E>(executor: E, id: i64, path: &str) -> Result<u64>
where
    E: Executor<'c, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE image SET path = ? WHERE id = ?")
        .bind(path)
        .bind(id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

pub async fn set_image_classified<'c, E>(executor: E, id: i64, classified: bool) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query("UPDATE image SET classified = ? WHERE id = ?")
        .bind(classified)
        .bind(id)
        .execute(executor)
        .await?;

    Ok(())
}

/// 增加图片访问次数并更新最后使用时间
pub async fn touch_image<'c, E>(executor: E, id: i64, now: DateTime<Utc>) -> Result<u64>
where
    E: Executor<'c, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE image SET hits = hits + 1, last_used = ? WHERE id = ?")
        .bind(now)
        .bind(id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

pub async fn delete_image<'c, E>(executor: E, id: i64) -> Result<u64>
where
    E: Executor<'c, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM image WHERE id = ?").bind(id).execute(executor).await?;

    Ok(result.rows_affected())
}

pub async fn list_images<'c, E>(executor: E, offset: i64, limit: i64) -> Result<Vec<Image>>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_as(&format!("SELECT {IMAGE_COLUMNS} FROM image ORDER BY id ASC LIMIT ? OFFSET ?"))
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await
}

pub async fn count_images<'c, E>(executor: E) -> Result<i64>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_scalar("SELECT COUNT(*) FROM image").fetch_one(executor).await
}

pub async fn count_images_unclassified<'c, E>(executor: E) -> Result<i64>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_scalar("SELECT COUNT(*) FROM image WHERE classified = 0").fetch_one(executor).await
}

/// 按访问次数降序获取图片
pub async fn most_used_images<'c, E>(executor: E, limit: i64) -> Result<Vec<Image>>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_as(&format!(
        "SELECT {IMAGE_COLUMNS} FROM image ORDER BY hits DESC, id ASC LIMIT ?"
    ))
    .bind(limit)
    .fetch_all(executor)
    .await
}

/// 获取带有指定标签的所有图片
pub async fn get_images_by_tag<'c, E>(executor: E, tag_id: i64) -> Result<Vec<Image>>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_as(
        r#"
        SELECT image.id, image.name, image.path, image.hits, image.classified,
               image.date_created, image.last_used
        FROM image
        JOIN image_tag ON image_tag.image_id = image.id
        WHERE image_tag.tag_id = ?
        ORDER BY image.hits DESC, image.id ASC
        "#,
    )
    .bind(tag_id)
    .fetch_all(executor)
    .await
}

/// 多标签交集搜索
///
/// 每个片段匹配名称中包含该片段的任意标签（区分大小写），图片必须匹配所有片段
pub async fn search_images<'c, E>(
    executor: E,
    fragments: &[String],
    offset: i64,
    limit: i64,
) -> Result<Vec<Image>>
where
    E: Executor<'c, Database = Sqlite>,
{
    let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {IMAGE_COLUMNS} FROM image"));
    for (i, fragment) in fragments.iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        qb.push(
            "id IN (SELECT it.image_id FROM image_tag it \
             JOIN tag t ON t.id = it.tag_id WHERE instr(t.name, ",
        );
        qb.push_bind(fragment.clone());
        qb.push(") > 0)");
    }
    qb.push(" ORDER BY hits DESC, id ASC LIMIT ");
    qb.push_bind(limit);
    qb.push(" OFFSET ");
    qb.push_bind(offset);

    qb.build_query_as::<Image>().fetch_all(executor).await
}

/// 按添加时间获取没有任何标签的图片
pub async fn least_tagged_images<'c, E>(executor: E, offset: i64, limit: i64) -> Result<Vec<Image>>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_as(&format!(
        "SELECT {IMAGE_COLUMNS} FROM image \
         WHERE NOT EXISTS (SELECT 1 FROM image_tag it WHERE it.image_id = image.id) \
         ORDER BY date_created ASC, id ASC LIMIT ? OFFSET ?"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(executor)
    .await
}

/// 精确查找标签，不存在时创建一个访问次数为 0 的新标签
pub async fn get_or_create_tag(conn: &mut SqliteConnection, name: &str) -> Result<Tag> {
    sqlx::query("INSERT INTO tag (name) VALUES (?) ON CONFLICT (name) DO NOTHING")
        .bind(name)
        .execute(&mut *conn)
        .await?;

    sqlx::query_as("SELECT id, name, hits FROM tag WHERE name = ?")
        .bind(name)
        .fetch_one(&mut *conn)
        .await
}

pub async fn get_tag_by_name<'c, E>(executor: E, name: &str) -> Result<Option<Tag>>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_as("SELECT id, name, hits FROM tag WHERE name = ?")
        .bind(name)
        .fetch_optional(executor)
        .await
}

pub async fn delete_tag<'c, E>(executor: E, id: i64) -> Result<u64>
where
    E: Executor<'c, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM tag WHERE id = ?").bind(id).execute(executor).await?;

    Ok(result.rows_affected())
}

pub async fn count_tags<'c, E>(executor: E) -> Result<i64>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_scalar("SELECT COUNT(*) FROM tag").fetch_one(executor).await
}

pub async fn count_tag_associations<'c, E>(executor: E, tag_id: i64) -> Result<i64>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_scalar("SELECT COUNT(*) FROM image_tag WHERE tag_id = ?")
        .bind(tag_id)
        .fetch_one(executor)
        .await
}

/// 名称包含 `fragment` 的所有标签访问次数加一
pub async fn touch_tags<'c, E>(executor: E, fragment: &str) -> Result<u64>
where
    E: Executor<'c, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE tag SET hits = hits + 1 WHERE instr(name, ?) > 0")
        .bind(fragment)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

pub async fn touch_tag_by_id<'c, E>(executor: E, id: i64) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query("UPDATE tag SET hits = hits + 1 WHERE id = ?").bind(id).execute(executor).await?;

    Ok(())
}

/// 按访问次数降序获取标签，相同时先创建的在前
pub async fn most_used_tags<'c, E>(executor: E, limit: i64) -> Result<Vec<Tag>>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_as("SELECT id, name, hits FROM tag ORDER BY hits DESC, id ASC LIMIT ?")
        .bind(limit)
        .fetch_all(executor)
        .await
}

/// 按关联图片数量降序获取标签，只保留数量大于 `min_relevance` 的标签
///
/// `limit` 为负数时不限制数量
pub async fn most_popular_tags<'c, E>(
    executor: E,
    limit: i64,
    min_relevance: i64,
) -> Result<Vec<PopularTag>>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_as(
        r#"
        SELECT tag.id, tag.name, tag.hits, COUNT(image_tag.image_id) AS count
        FROM tag
        JOIN image_tag ON image_tag.tag_id = tag.id
        GROUP BY tag.id
        HAVING COUNT(image_tag.image_id) > ?
        ORDER BY count DESC, tag.id ASC
        LIMIT ?
        "#,
    )
    .bind(min_relevance)
    .bind(limit)
    .fetch_all(executor)
    .await
}

pub async fn add_image_tag<'c, E>(executor: E, image_id: i64, tag_id: i64) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query("INSERT OR IGNORE INTO image_tag (image_id, tag_id) VALUES (?, ?)")
        .bind(image_id)
        .bind(tag_id)
        .execute(executor)
        .await?;

    Ok(())
}

pub async fn clear_image_tags<'c, E>(executor: E, image_id: i64) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query("DELETE FROM image_tag WHERE image_id = ?")
        .bind(image_id)
        .execute(executor)
        .await?;

    Ok(())
}

/// 获取一批图片的全部关联
///
/// NOTE: 调用方需要控制 `ids` 的数量，避免超过 SQLite 的参数上限
pub async fn get_associations<'c, E>(executor: E, ids: &[i64]) -> Result<Vec<Association>>
where
    E: Executor<'c, Database = Sqlite>,
{
    if ids.is_empty() {
        return Ok(vec![]);
    }

    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT image_tag.image_id, image_tag.tag_id, tag.name, tag.hits \
         FROM image_tag JOIN tag ON tag.id = image_tag.tag_id \
         WHERE image_tag.image_id IN (",
    );
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY image_tag.image_id ASC, image_tag.tag_id ASC");

    qb.build_query_as::<Association>().fetch_all(executor).await
}
