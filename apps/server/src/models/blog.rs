use super::text_enum;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

text_enum! {
    pub enum BlogStatus {
        Draft => "draft",
        Published => "published",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub author_id: Option<Uuid>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub status: BlogStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBlog {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub author_id: Option<Uuid>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub status: BlogStatus,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct BlogFilter {
    /// Case-insensitive match on title or content.
    pub search: Option<String>,
    pub status: Option<BlogStatus>,
    pub category: Option<String>,
    pub author_id: Option<Uuid>,
}

impl BlogFilter {
    pub fn matches(&self, blog: &Blog) -> bool {
        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            if !blog.title.to_lowercase().contains(&term)
                && !blog.content.to_lowercase().contains(&term)
            {
                return false;
            }
        }
        self.status.map_or(true, |s| s == blog.status)
            && self
                .category
                .as_ref()
                .map_or(true, |c| blog.category.as_deref().is_some_and(|bc| bc.eq_ignore_ascii_case(c)))
            && self.author_id.map_or(true, |a| blog.author_id == Some(a))
    }
}

/// URL slug derived from a title: lowercase ASCII words joined by dashes.
/// Non-ASCII letters are transliterated first ("Điều trị" becomes "dieu-tri").
pub fn slugify(title: &str) -> String {
    let ascii = deunicode::deunicode(title);
    let mut slug = String::with_capacity(ascii.len());
    let mut pending_dash = false;
    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        "post".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("  Living well with HIV: 5 tips! "), "living-well-with-hiv-5-tips");
        assert_eq!(slugify("U=U"), "u-u");
        assert_eq!(slugify("???"), "post");
    }

    #[test]
    fn slugify_transliterates_vietnamese() {
        assert_eq!(slugify("Điều trị ARV"), "dieu-tri-arv");
        assert_eq!(slugify("Sống khỏe với HIV"), "song-khoe-voi-hiv");
    }
}
