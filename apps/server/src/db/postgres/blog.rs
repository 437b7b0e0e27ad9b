use super::{map_unique_violation, text_column, PostgresStore};
use crate::{
    db::traits::BlogRepository,
    models::{
        blog::{BlogFilter, NewBlog},
        Blog, PageRequest,
    },
    Error, Result,
};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, Postgres, QueryBuilder, Row};
use uuid::Uuid;

const BLOG_COLUMNS: &str = "id, title, slug, content, author_id, category, image_url, status, \
     published_at, created_at, updated_at";

fn map_blog(row: &PgRow) -> Result<Blog> {
    Ok(Blog {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        content: row.try_get("content")?,
        author_id: row.try_get("author_id")?,
        category: row.try_get("category")?,
        image_url: row.try_get("image_url")?,
        status: text_column(row, "status")?,
        published_at: row.try_get("published_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &BlogFilter) {
    builder.push(" WHERE TRUE");
    if let Some(term) = &filter.search {
        let pattern = format!("%{}%", term.replace('%', "\\%").replace('_', "\\_"));
        builder
            .push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR content ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(category) = &filter.category {
        builder
            .push(" AND LOWER(category) = LOWER(")
            .push_bind(category.clone())
            .push(")");
    }
    if let Some(author_id) = filter.author_id {
        builder.push(" AND author_id = ").push_bind(author_id);
    }
}

#[async_trait]
impl BlogRepository for PostgresStore {
    async fn create(&self, new: NewBlog) -> Result<Blog> {
        let sql = format!(
            "INSERT INTO blogs
                (id, title, slug, content, author_id, category, image_url, status, published_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {BLOG_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(&new.title)
            .bind(&new.slug)
            .bind(&new.content)
            .bind(new.author_id)
            .bind(&new.category)
            .bind(&new.image_url)
            .bind(new.status.as_str())
            .bind(new.published_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, format!("Slug '{}' already in use", new.slug)))?;
        map_blog(&row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Blog>> {
        let sql = format!("SELECT {BLOG_COLUMNS} FROM blogs WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(map_blog).transpose()
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Blog>> {
        let sql = format!("SELECT {BLOG_COLUMNS} FROM blogs WHERE slug = $1");
        let row = sqlx::query(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_blog).transpose()
    }

    async fn list(&self, filter: &BlogFilter, page: PageRequest) -> Result<(Vec<Blog>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM blogs");
        push_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {BLOG_COLUMNS} FROM blogs"));
        push_filter(&mut select, filter);
        select
            .push(" ORDER BY COALESCE(published_at, created_at) DESC, id ASC LIMIT ")
            .push_bind(page.limit_i64())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = select.build().fetch_all(&self.pool).await?;
        let items = rows.iter().map(map_blog).collect::<Result<Vec<_>>>()?;
        Ok((items, total))
    }

    async fn update(&self, blog: &Blog) -> Result<Blog> {
        let sql = format!(
            "UPDATE blogs
             SET title = $2, slug = $3, content = $4, category = $5, image_url = $6,
                 status = $7, published_at = $8, updated_at = NOW()
             WHERE id = $1
             RETURNING {BLOG_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(blog.id)
            .bind(&blog.title)
            .bind(&blog.slug)
            .bind(&blog.content)
            .bind(&blog.category)
            .bind(&blog.image_url)
            .bind(blog.status.as_str())
            .bind(blog.published_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, format!("Slug '{}' already in use", blog.slug)))?
            .ok_or_else(|| Error::not_found("Blog", blog.id))?;
        map_blog(&row)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM blogs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
