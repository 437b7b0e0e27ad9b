//! Blog posts: slugs are derived from titles and kept unique with a numeric suffix.

use crate::{
    config::PaginationConfig,
    db::{BlogRepository, Repositories},
    models::{
        blog::{slugify, BlogFilter, NewBlog},
        Blog, BlogStatus, PageRequest, Paginated,
    },
    Error, Result,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

const MAX_SLUG_SUFFIX: u32 = 1000;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBlogRequest {
    #[validate(length(min = 1, max = 300))]
    pub title: String,
    #[validate(length(min = 1))]
    pub content: String,
    pub author_id: Option<Uuid>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
    #[serde(default = "default_status")]
    pub status: BlogStatus,
}

fn default_status() -> BlogStatus {
    BlogStatus::Draft
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBlogRequest {
    #[validate(length(min = 1, max = 300))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub content: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
    pub status: Option<BlogStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogListQuery {
    pub search: Option<String>,
    pub status: Option<BlogStatus>,
    pub category: Option<String>,
    pub author_id: Option<Uuid>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

fn normalize_category(category: Option<String>) -> Option<String> {
    category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

pub struct BlogService {
    blogs: Arc<dyn BlogRepository>,
    pagination: PaginationConfig,
}

impl BlogService {
    pub fn new(repos: &Repositories, pagination: PaginationConfig) -> Self {
        Self {
            blogs: repos.blogs.clone(),
            pagination,
        }
    }

    /// First free slug among `base`, `base-2`, `base-3`, ...; `own_id` may keep its slug.
    async fn unique_slug(&self, title: &str, own_id: Option<Uuid>) -> Result<String> {
        let base = slugify(title);
        for n in 1..=MAX_SLUG_SUFFIX {
            let candidate = if n == 1 {
                base.clone()
            } else {
                format!("{base}-{n}")
            };
            match self.blogs.find_by_slug(&candidate).await? {
                None => return Ok(candidate),
                Some(existing) if Some(existing.id) == own_id => return Ok(candidate),
                Some(_) => continue,
            }
        }
        Err(Error::Conflict(format!("No free slug left for '{base}'")))
    }

    pub async fn create(&self, request: CreateBlogRequest) -> Result<Blog> {
        request.validate()?;
        let slug = self.unique_slug(&request.title, None).await?;
        let published_at = (request.status == BlogStatus::Published).then(Utc::now);

        let blog = self
            .blogs
            .create(NewBlog {
                title: request.title.trim().to_string(),
                slug,
                content: request.content,
                author_id: request.author_id,
                category: normalize_category(request.category),
                image_url: request.image_url,
                status: request.status,
                published_at,
            })
            .await?;
        tracing::info!(blog_id = %blog.id, slug = %blog.slug, "Blog created");
        Ok(blog)
    }

    pub async fn get(&self, id: Uuid) -> Result<Blog> {
        self.blogs
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found("Blog", id))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Blog> {
        self.blogs
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| Error::not_found("Blog", slug))
    }

    pub async fn list(&self, query: BlogListQuery) -> Result<Paginated<Blog>> {
        let page = PageRequest::new(
            query.page,
            query.limit,
            self.pagination.default_limit,
            self.pagination.max_limit,
        );
        let filter = BlogFilter {
            search: query
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            status: query.status,
            category: normalize_category(query.category),
            author_id: query.author_id,
        };
        let (items, total) = self.blogs.list(&filter, page).await?;
        Ok(Paginated::new(items, total, page))
    }

    pub async fn update(&self, id: Uuid, request: UpdateBlogRequest) -> Result<Blog> {
        request.validate()?;
        let mut blog = self.get(id).await?;

        if let Some(title) = request.title {
            let title = title.trim().to_string();
            if title != blog.title {
                blog.slug = self.unique_slug(&title, Some(blog.id)).await?;
                blog.title = title;
            }
        }
        if let Some(content) = request.content {
            blog.content = content;
        }
        if request.category.is_some() {
            blog.category = normalize_category(request.category);
        }
        if let Some(image_url) = request.image_url {
            blog.image_url = Some(image_url);
        }
        if let Some(status) = request.status {
            // First publication stamps the date; republishing keeps it.
            if status == BlogStatus::Published && blog.published_at.is_none() {
                blog.published_at = Some(Utc::now());
            }
            blog.status = status;
        }

        self.blogs.update(&blog).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if !self.blogs.delete(id).await? {
            return Err(Error::not_found("Blog", id));
        }
        tracing::info!(blog_id = %id, "Blog deleted");
        Ok(())
    }
}
