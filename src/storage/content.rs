use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::{get_enum, get_opt_ts, get_ts, get_uuid, opt_ts, ts, Database};
use crate::domain::{ContentItem, ContentKind};
use crate::error::{AppError, Result};

const COLUMNS: &str = "id, kind, title, slug, body, image_url, link_url, sort_order, is_published, \
     published_at, created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<ContentItem> {
    Ok(ContentItem {
        id: get_uuid(row, 0)?,
        kind: get_enum(row, 1)?,
        title: row.get(2)?,
        slug: row.get(3)?,
        body: row.get(4)?,
        image_url: row.get(5)?,
        link_url: row.get(6)?,
        sort_order: row.get(7)?,
        is_published: row.get(8)?,
        published_at: get_opt_ts(row, 9)?,
        created_at: get_ts(row, 10)?,
        updated_at: get_ts(row, 11)?,
    })
}

impl Database {
    pub fn get_content(&self, id: Uuid) -> Result<ContentItem> {
        self.read(|c| {
            Ok(c.query_row(
                &format!("SELECT {COLUMNS} FROM content_items WHERE id = ?1"),
                params![id.to_string()],
                from_row,
            )
            .optional()?)
        })?
        .ok_or_else(|| AppError::not_found("Content"))
    }

    pub fn content_slug_taken(&self, kind: ContentKind, slug: &str, except: Option<Uuid>) -> Result<bool> {
        self.read(|c| {
            let count: i64 = c.query_row(
                "SELECT COUNT(*) FROM content_items WHERE kind = ?1 AND slug = ?2
                 AND (?3 IS NULL OR id != ?3)",
                params![kind.as_str(), slug, except.map(|id| id.to_string())],
                |r| r.get(0),
            )?;
            Ok(count > 0)
        })
    }

    pub fn insert_content(&self, item: &ContentItem) -> Result<()> {
        self.read(|c| {
            c.execute(
                &format!(
                    "INSERT INTO content_items ({COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
                ),
                params![
                    item.id.to_string(),
                    item.kind.as_str(),
                    item.title,
                    item.slug,
                    item.body,
                    item.image_url,
                    item.link_url,
                    item.sort_order,
                    item.is_published,
                    opt_ts(&item.published_at),
                    ts(&item.created_at),
                    ts(&item.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn update_content(&self, item: &ContentItem) -> Result<()> {
        self.read(|c| {
            c.execute(
                "UPDATE content_items SET title = ?2, slug = ?3, body = ?4, image_url = ?5,
                 link_url = ?6, sort_order = ?7, is_published = ?8, published_at = ?9,
                 updated_at = ?10 WHERE id = ?1",
                params![
                    item.id.to_string(),
                    item.title,
                    item.slug,
                    item.body,
                    item.image_url,
                    item.link_url,
                    item.sort_order,
                    item.is_published,
                    opt_ts(&item.published_at),
                    ts(&item.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn delete_content(&self, id: Uuid) -> Result<bool> {
        self.read(|c| {
            Ok(c.execute("DELETE FROM content_items WHERE id = ?1", params![id.to_string()])? > 0)
        })
    }

    /// Ordered by `sort_order`, newest first within equal order
    /// Items of one kind, or of every kind when `kind` is `None`.
    pub fn list_content(
        &self,
        kind: Option<ContentKind>,
        published_only: bool,
    ) -> Result<Vec<ContentItem>> {
        self.read(|c| {
            let mut stmt = c.prepare(&format!(
                "SELECT {COLUMNS} FROM content_items
                 WHERE (?1 IS NULL OR kind = ?1) AND (?2 = 0 OR is_published = 1)
                 ORDER BY kind, sort_order, created_at DESC"
            ))?;
            let rows = stmt.query_map(
                params![kind.map(|k| k.as_str()), published_only],
                from_row,
            )?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }
}
