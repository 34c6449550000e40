use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use super::dto::ListTasksQuery;
use super::model::Task;

pub async fn insert_task(pool: &SqlitePool, task: &Task) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO tasks
            (id, user_id, title, description, status, priority, due_date, tags,
             completed_at, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(task.id)
    .bind(task.user_id)
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.status)
    .bind(task.priority)
    .bind(task.due_date)
    .bind(&task.tags)
    .bind(task.completed_at)
    .bind(task.created_at)
    .bind(task.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Lookup scoped to the owner; a foreign id behaves like a missing one.
pub async fn find_task(pool: &SqlitePool, user_id: Uuid, id: Uuid) -> sqlx::Result<Option<Task>> {
    sqlx::query_as("SELECT * FROM tasks WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn update_task(pool: &SqlitePool, task: &Task) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE tasks
         SET title = ?, description = ?, status = ?, priority = ?, due_date = ?,
             tags = ?, completed_at = ?, updated_at = ?
         WHERE id = ? AND user_id = ?",
    )
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.status)
    .bind(task.priority)
    .bind(task.due_date)
    .bind(&task.tags)
    .bind(task.completed_at)
    .bind(task.updated_at)
    .bind(task.id)
    .bind(task.user_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn delete_task(pool: &SqlitePool, user_id: Uuid, id: Uuid) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM tasks WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Filtered, sorted page of the caller's tasks plus the total match count.
pub async fn list_tasks(
    pool: &SqlitePool,
    user_id: Uuid,
    query: &ListTasksQuery,
) -> sqlx::Result<(Vec<Task>, i64)> {
    let mut count_builder = QueryBuilder::new("SELECT COUNT(*) FROM tasks");
    push_filters(&mut count_builder, user_id, query);
    let total: i64 = count_builder.build_query_scalar().fetch_one(pool).await?;

    let (sort_field, sort_order) = query.sort();
    let limit = query.limit();
    let offset = (query.page() - 1) * limit;

    let mut builder = QueryBuilder::new("SELECT * FROM tasks");
    push_filters(&mut builder, user_id, query);
    // Sort column and direction come from fixed allow-lists, never from
    // raw client input.
    builder
        .push(" ORDER BY ")
        .push(sort_field.column())
        .push(" ")
        .push(sort_order.keyword())
        .push(" LIMIT ")
        .push_bind(limit as i64)
        .push(" OFFSET ")
        .push_bind(offset as i64);

    let tasks = builder.build_query_as::<Task>().fetch_all(pool).await?;

    Ok((tasks, total))
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, user_id: Uuid, query: &ListTasksQuery) {
    builder.push(" WHERE user_id = ").push_bind(user_id);

    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(priority) = query.priority {
        builder.push(" AND priority = ").push_bind(priority);
    }
    if let Some(search) = query.search.as_deref() {
        // SQLite LIKE is already case-insensitive for ASCII.
        let pattern = like_pattern(search);
        builder
            .push(" AND (title LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\'")
            .push(" OR description LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\'")
            .push(" OR tags LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\'")
            .push(")");
    }
}

/// Substring match pattern with LIKE metacharacters neutralized, so a
/// search term like "100%" only matches the literal text.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    for c in term.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("milk"), "%milk%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern("back\\slash"), "%back\\\\slash%");
        assert_eq!(like_pattern("  trimmed "), "%trimmed%");
    }
}
