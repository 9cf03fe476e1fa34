use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::content::slugify;
use crate::domain::{ContentItem, ContentKind};
use crate::error::{AppError, Result};
use crate::storage::Database;

#[derive(Debug, Clone, Deserialize)]
pub struct ContentInput {
    pub kind: ContentKind,
    pub title: String,
    pub slug: Option<String>,
    pub body: Option<String>,
    pub image_url: Option<String>,
    pub link_url: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub is_published: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ContentUpdate {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub body: Option<String>,
    pub image_url: Option<String>,
    pub link_url: Option<String>,
    pub sort_order: Option<i64>,
    pub is_published: Option<bool>,
}

/// Articles, FAQs and banners
pub struct ContentUseCase {
    db: Arc<Database>,
}

impl ContentUseCase {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn published(&self, kind: ContentKind) -> Result<Vec<ContentItem>> {
        self.db.list_content(Some(kind), true)
    }

    /// Admin listing, drafts included; every kind when `kind` is `None`.
    pub fn list(&self, kind: Option<ContentKind>) -> Result<Vec<ContentItem>> {
        self.db.list_content(kind, false)
    }

    pub fn get(&self, id: Uuid) -> Result<ContentItem> {
        self.db.get_content(id)
    }

    pub fn create(&self, input: ContentInput) -> Result<ContentItem> {
        let title = required_title(&input.title)?;
        let slug = self.unique_slug(input.kind, input.slug.as_deref().unwrap_or(&title), None)?;
        let now = Utc::now();
        let item = ContentItem {
            id: Uuid::new_v4(),
            kind: input.kind,
            title,
            slug,
            body: input.body,
            image_url: input.image_url,
            link_url: input.link_url,
            sort_order: input.sort_order,
            is_published: input.is_published,
            published_at: input.is_published.then_some(now),
            created_at: now,
            updated_at: now,
        };
        if item.kind == ContentKind::Banner && item.image_url.is_none() {
            return Err(AppError::field("image_url", "Banners need an image."));
        }
        self.db.insert_content(&item)?;
        info!(content_id = %item.id, kind = %item.kind, slug = %item.slug, "Created content");
        Ok(item)
    }

    pub fn update(&self, id: Uuid, update: ContentUpdate) -> Result<ContentItem> {
        let mut item = self.db.get_content(id)?;
        if let Some(title) = update.title {
            item.title = required_title(&title)?;
        }
        if let Some(slug) = update.slug {
            item.slug = self.unique_slug(item.kind, &slug, Some(id))?;
        }
        if update.body.is_some() {
            item.body = update.body;
        }
        if update.image_url.is_some() {
            item.image_url = update.image_url;
        }
        if update.link_url.is_some() {
            item.link_url = update.link_url;
        }
        if let Some(order) = update.sort_order {
            item.sort_order = order;
        }
        let now = Utc::now();
        if let Some(published) = update.is_published {
            if published && item.published_at.is_none() {
                item.published_at = Some(now);
            }
            item.is_published = published;
        }
        item.updated_at = now;
        self.db.update_content(&item)?;
        info!(content_id = %id, "Updated content");
        Ok(item)
    }

    pub fn delete(&self, id: Uuid) -> Result<()> {
        if !self.db.delete_content(id)? {
            return Err(AppError::not_found("Content"));
        }
        info!(content_id = %id, "Deleted content");
        Ok(())
    }

    fn unique_slug(&self, kind: ContentKind, source: &str, except: Option<Uuid>) -> Result<String> {
        let slug = slugify(source);
        if slug.is_empty() {
            return Err(AppError::field("slug", "The slug must contain letters or digits."));
        }
        if self.db.content_slug_taken(kind, &slug, except)? {
            return Err(AppError::field("slug", "The slug has already been taken."));
        }
        Ok(slug)
    }
}

fn required_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::field("title", "The title field is required."));
    }
    Ok(title.to_string())
}
