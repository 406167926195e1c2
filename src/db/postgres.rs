//! PostgreSQL implementation of the repositories.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::{FromRow, PgConnection, PgPool};

use super::models::{
    Category, CategoryPatch, Entity, ImageItem, ListFilter, MenuItem, NewCategory,
    NewPlaceImage, NewPlaceMenu, NewPlaceSocialMedia, NewTag, Place, PlaceImage, PlaceImagePatch,
    PlaceMenu, PlaceMenuPatch, PlaceRelations, PlaceRow, PlaceSocialMedia, PlaceWrite,
    SocialLinks, SocialLinksPatch, Tag, TagPatch,
};
use super::{DbError, Repository, Store};
use crate::slug;
use crate::validation::{FieldErrors, NON_FIELD_ERRORS};

const CATEGORY_COLUMNS: &str = "id, name, slug, description, image, created_at, updated_at";
const TAG_COLUMNS: &str = "id, name, slug, created_at";
const PLACE_COLUMNS: &str = "id, name, slug, description, category_id, province, district, \
     sector, cell, village, address, latitude, longitude, views, created_at, updated_at";
const IMAGE_COLUMNS: &str = "id, place_id, image, caption, created_at";
const SOCIAL_COLUMNS: &str = "id, place_id, phone_number, email, instagram, tiktok, twitter, \
     website, facebook, whatsapp";
const MENU_COLUMNS: &str = "id, place_id, name, description, price, created_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Payload field named by a unique constraint (`<table>_<column>_key`).
fn unique_field(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some(c) if c.ends_with("_name_key") => "name",
        Some(c) if c.ends_with("_slug_key") => "slug",
        Some(c) if c.ends_with("_place_id_key") => "place",
        _ => NON_FIELD_ERRORS,
    }
}

/// Converts constraint violations into field errors; anything else stays a database error.
fn write_error<E: Entity>(err: sqlx::Error) -> DbError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return DbError::duplicate::<E>(unique_field(db.constraint()));
        }
        if db.is_foreign_key_violation() {
            return DbError::invalid(NON_FIELD_ERRORS, "Referenced object does not exist.");
        }
        if db.is_check_violation() {
            return DbError::invalid(NON_FIELD_ERRORS, "Value out of the allowed range.");
        }
    }
    DbError::Sqlx(err)
}

async fn value_taken(
    conn: &mut PgConnection,
    table: &str,
    column: &str,
    value: &str,
    exclude_id: Option<i64>,
) -> Result<bool, sqlx::Error> {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE {column} = $1 AND id <> $2)");
    sqlx::query_scalar(&sql)
        .bind(value)
        .bind(exclude_id.unwrap_or(0))
        .fetch_one(&mut *conn)
        .await
}

async fn row_exists(conn: &mut PgConnection, table: &str, id: i64) -> Result<bool, sqlx::Error> {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = $1)");
    sqlx::query_scalar(&sql).bind(id).fetch_one(&mut *conn).await
}

/// Allocates a free slug derived from `name`. Takes a transaction-scoped
/// advisory lock on `table`, so concurrent creates are serialized until commit.
async fn allocate_slug(
    conn: &mut PgConnection,
    table: &str,
    name: &str,
    fallback: &str,
) -> Result<String, sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(format!("{table}.slug"))
        .execute(&mut *conn)
        .await?;

    let base = slug::slugify(name, fallback);
    let sql = format!("SELECT slug FROM {table} WHERE slug = $1 OR slug LIKE $2");
    let taken: HashSet<String> = sqlx::query_scalar::<_, String>(&sql)
        .bind(&base)
        .bind(format!("{base}-%"))
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .collect();

    Ok(slug::disambiguate(&base, |candidate| taken.contains(candidate)))
}

/// Resolves the slug for a category or tag: an explicit one must be free,
/// otherwise one is derived from the name.
async fn resolve_slug<E: Entity>(
    conn: &mut PgConnection,
    table: &str,
    name: &str,
    explicit: Option<&str>,
    exclude_id: Option<i64>,
) -> Result<String, DbError> {
    match explicit {
        Some(slug) => {
            if value_taken(conn, table, "slug", slug, exclude_id).await? {
                return Err(DbError::duplicate::<E>("slug"));
            }
            Ok(slug.to_string())
        }
        None => Ok(allocate_slug(conn, table, name, E::NOUN).await?),
    }
}

async fn delete_row(pool: &PgPool, table: &str, id: i64) -> Result<(), DbError> {
    let sql = format!("DELETE FROM {table} WHERE id = $1");
    let result = sqlx::query(&sql).bind(id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

// ============================================================================
// Category
// ============================================================================

#[async_trait]
impl Repository<Category> for PgStore {
    async fn list(&self, _filter: ListFilter) -> Result<Vec<Category>, DbError> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY id DESC");
        Ok(sqlx::query_as(&sql).fetch_all(&self.pool).await?)
    }

    async fn get(&self, id: i64) -> Result<Category, DbError> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1");
        sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DbError::NotFound)
    }

    async fn create(&self, input: NewCategory) -> Result<Category, DbError> {
        let mut tx = self.pool.begin().await?;

        if value_taken(&mut tx, "categories", "name", &input.name, None).await? {
            return Err(DbError::duplicate::<Category>("name"));
        }
        let slug =
            resolve_slug::<Category>(&mut tx, "categories", &input.name, input.slug.as_deref(), None)
                .await?;

        let sql = format!(
            "INSERT INTO categories (name, slug, description, image) \
             VALUES ($1, $2, $3, $4) RETURNING {CATEGORY_COLUMNS}"
        );
        let category: Category = sqlx::query_as(&sql)
            .bind(&input.name)
            .bind(&slug)
            .bind(&input.description)
            .bind(&input.image)
            .fetch_one(&mut *tx)
            .await
            .map_err(write_error::<Category>)?;

        tx.commit().await?;
        Ok(category)
    }

    async fn update(&self, id: i64, patch: CategoryPatch) -> Result<Category, DbError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1 FOR UPDATE");
        let mut category: Category = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;

        if let Some(name) = &patch.name {
            if value_taken(&mut tx, "categories", "name", name, Some(id)).await? {
                return Err(DbError::duplicate::<Category>("name"));
            }
        }
        if let Some(slug) = &patch.slug {
            if value_taken(&mut tx, "categories", "slug", slug, Some(id)).await? {
                return Err(DbError::duplicate::<Category>("slug"));
            }
        }
        patch.apply(&mut category);

        let sql = format!(
            "UPDATE categories SET name = $1, slug = $2, description = $3, image = $4, \
             updated_at = now() WHERE id = $5 RETURNING {CATEGORY_COLUMNS}"
        );
        let category: Category = sqlx::query_as(&sql)
            .bind(&category.name)
            .bind(&category.slug)
            .bind(&category.description)
            .bind(&category.image)
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(write_error::<Category>)?;

        tx.commit().await?;
        Ok(category)
    }

    async fn delete(&self, id: i64) -> Result<(), DbError> {
        // places.category_id is ON DELETE SET NULL
        delete_row(&self.pool, "categories", id).await
    }
}

// ============================================================================
// Tag
// ============================================================================

#[async_trait]
impl Repository<Tag> for PgStore {
    async fn list(&self, _filter: ListFilter) -> Result<Vec<Tag>, DbError> {
        let sql = format!("SELECT {TAG_COLUMNS} FROM tags ORDER BY id DESC");
        Ok(sqlx::query_as(&sql).fetch_all(&self.pool).await?)
    }

    async fn get(&self, id: i64) -> Result<Tag, DbError> {
        let sql = format!("SELECT {TAG_COLUMNS} FROM tags WHERE id = $1");
        sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DbError::NotFound)
    }

    async fn create(&self, input: NewTag) -> Result<Tag, DbError> {
        let mut tx = self.pool.begin().await?;

        if value_taken(&mut tx, "tags", "name", &input.name, None).await? {
            return Err(DbError::duplicate::<Tag>("name"));
        }
        let slug =
            resolve_slug::<Tag>(&mut tx, "tags", &input.name, input.slug.as_deref(), None).await?;

        let sql = format!("INSERT INTO tags (name, slug) VALUES ($1, $2) RETURNING {TAG_COLUMNS}");
        let tag: Tag = sqlx::query_as(&sql)
            .bind(&input.name)
            .bind(&slug)
            .fetch_one(&mut *tx)
            .await
            .map_err(write_error::<Tag>)?;

        tx.commit().await?;
        Ok(tag)
    }

    async fn update(&self, id: i64, patch: TagPatch) -> Result<Tag, DbError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {TAG_COLUMNS} FROM tags WHERE id = $1 FOR UPDATE");
        let mut tag: Tag = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;

        if let Some(name) = &patch.name {
            if value_taken(&mut tx, "tags", "name", name, Some(id)).await? {
                return Err(DbError::duplicate::<Tag>("name"));
            }
        }
        if let Some(slug) = &patch.slug {
            if value_taken(&mut tx, "tags", "slug", slug, Some(id)).await? {
                return Err(DbError::duplicate::<Tag>("slug"));
            }
        }
        patch.apply(&mut tag);

        let sql =
            format!("UPDATE tags SET name = $1, slug = $2 WHERE id = $3 RETURNING {TAG_COLUMNS}");
        let tag: Tag = sqlx::query_as(&sql)
            .bind(&tag.name)
            .bind(&tag.slug)
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(write_error::<Tag>)?;

        tx.commit().await?;
        Ok(tag)
    }

    async fn delete(&self, id: i64) -> Result<(), DbError> {
        delete_row(&self.pool, "tags", id).await
    }
}

// ============================================================================
// Place
// ============================================================================

#[derive(FromRow)]
struct TaggedRow {
    place_id: i64,
    #[sqlx(flatten)]
    tag: Tag,
}

/// Loads every relation of `rows` with one query per relation and assembles the read views.
async fn hydrate(conn: &mut PgConnection, rows: Vec<PlaceRow>) -> Result<Vec<Place>, sqlx::Error> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let category_ids: Vec<i64> = rows.iter().filter_map(|r| r.category_id).collect();

    let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ANY($1)");
    let categories: HashMap<i64, Category> = sqlx::query_as::<_, Category>(&sql)
        .bind(&category_ids)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    let mut relations: HashMap<i64, PlaceRelations> = HashMap::new();

    let tagged: Vec<TaggedRow> = sqlx::query_as(
        "SELECT pt.place_id, t.id, t.name, t.slug, t.created_at \
         FROM place_tags pt JOIN tags t ON t.id = pt.tag_id \
         WHERE pt.place_id = ANY($1) ORDER BY t.name",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;
    for row in tagged {
        relations.entry(row.place_id).or_default().tags.push(row.tag);
    }

    let sql = format!(
        "SELECT {IMAGE_COLUMNS} FROM place_images WHERE place_id = ANY($1) ORDER BY id DESC"
    );
    let images: Vec<PlaceImage> = sqlx::query_as(&sql).bind(&ids).fetch_all(&mut *conn).await?;
    for image in images {
        relations.entry(image.place).or_default().images.push(image);
    }

    let sql = format!("SELECT {SOCIAL_COLUMNS} FROM place_social_media WHERE place_id = ANY($1)");
    let socials: Vec<PlaceSocialMedia> =
        sqlx::query_as(&sql).bind(&ids).fetch_all(&mut *conn).await?;
    for social in socials {
        let place_id = social.place;
        relations.entry(place_id).or_default().social_media = Some(social);
    }

    let sql = format!(
        "SELECT {MENU_COLUMNS} FROM place_menu WHERE place_id = ANY($1) ORDER BY name, id"
    );
    let menu: Vec<PlaceMenu> = sqlx::query_as(&sql).bind(&ids).fetch_all(&mut *conn).await?;
    for item in menu {
        relations.entry(item.place).or_default().menu.push(item);
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let mut rel = relations.remove(&row.id).unwrap_or_default();
            rel.category = row.category_id.and_then(|id| categories.get(&id).cloned());
            Place::assemble(row, rel)
        })
        .collect())
}

async fn load_place(conn: &mut PgConnection, id: i64) -> Result<Place, DbError> {
    let sql = format!("SELECT {PLACE_COLUMNS} FROM places WHERE id = $1");
    let row: PlaceRow = sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(DbError::NotFound)?;
    hydrate(conn, vec![row])
        .await?
        .pop()
        .ok_or(DbError::NotFound)
}

/// Category and tag references of a place write must point at existing rows.
async fn check_references(conn: &mut PgConnection, write: &PlaceWrite) -> Result<(), DbError> {
    let mut errors = FieldErrors::new();

    if let Some(Some(category_id)) = write.fields.category_id {
        if !row_exists(conn, "categories", category_id).await? {
            errors.add(
                "category",
                format!("Invalid pk \"{category_id}\" - object does not exist."),
            );
        }
    }
    if let Some(tag_ids) = &write.tag_ids {
        let found: HashSet<i64> = sqlx::query_scalar::<_, i64>("SELECT id FROM tags WHERE id = ANY($1)")
            .bind(tag_ids)
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .collect();
        for id in tag_ids.iter().filter(|id| !found.contains(id)) {
            errors.add("tags", format!("Invalid pk \"{id}\" - object does not exist."));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(DbError::Invalid(errors))
    }
}

async fn insert_image(
    conn: &mut PgConnection,
    place_id: i64,
    item: &ImageItem,
) -> Result<PlaceImage, sqlx::Error> {
    let sql = format!(
        "INSERT INTO place_images (place_id, image, caption) VALUES ($1, $2, $3) \
         RETURNING {IMAGE_COLUMNS}"
    );
    sqlx::query_as(&sql)
        .bind(place_id)
        .bind(&item.image)
        .bind(&item.caption)
        .fetch_one(&mut *conn)
        .await
}

async fn insert_social(
    conn: &mut PgConnection,
    place_id: i64,
    links: &SocialLinks,
) -> Result<PlaceSocialMedia, sqlx::Error> {
    let sql = format!(
        "INSERT INTO place_social_media \
         (place_id, phone_number, email, instagram, tiktok, twitter, website, facebook, whatsapp) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {SOCIAL_COLUMNS}"
    );
    sqlx::query_as(&sql)
        .bind(place_id)
        .bind(&links.phone_number)
        .bind(&links.email)
        .bind(&links.instagram)
        .bind(&links.tiktok)
        .bind(&links.twitter)
        .bind(&links.website)
        .bind(&links.facebook)
        .bind(&links.whatsapp)
        .fetch_one(&mut *conn)
        .await
}

async fn insert_menu_item(
    conn: &mut PgConnection,
    place_id: i64,
    item: &MenuItem,
) -> Result<PlaceMenu, sqlx::Error> {
    let sql = format!(
        "INSERT INTO place_menu (place_id, name, description, price) VALUES ($1, $2, $3, $4) \
         RETURNING {MENU_COLUMNS}"
    );
    sqlx::query_as(&sql)
        .bind(place_id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.price)
        .fetch_one(&mut *conn)
        .await
}

/// Replaces every relation collection present in `write`.
async fn write_relations(
    conn: &mut PgConnection,
    place_id: i64,
    write: &PlaceWrite,
) -> Result<(), sqlx::Error> {
    if let Some(tag_ids) = &write.tag_ids {
        sqlx::query("DELETE FROM place_tags WHERE place_id = $1")
            .bind(place_id)
            .execute(&mut *conn)
            .await?;
        sqlx::query(
            "INSERT INTO place_tags (place_id, tag_id) SELECT $1, UNNEST($2::BIGINT[]) \
             ON CONFLICT DO NOTHING",
        )
        .bind(place_id)
        .bind(tag_ids)
        .execute(&mut *conn)
        .await?;
    }
    if let Some(images) = &write.images {
        sqlx::query("DELETE FROM place_images WHERE place_id = $1")
            .bind(place_id)
            .execute(&mut *conn)
            .await?;
        for item in images {
            insert_image(conn, place_id, item).await?;
        }
    }
    if let Some(social) = &write.social_media {
        sqlx::query("DELETE FROM place_social_media WHERE place_id = $1")
            .bind(place_id)
            .execute(&mut *conn)
            .await?;
        if let Some(links) = social {
            insert_social(conn, place_id, links).await?;
        }
    }
    if let Some(menu) = &write.menu {
        sqlx::query("DELETE FROM place_menu WHERE place_id = $1")
            .bind(place_id)
            .execute(&mut *conn)
            .await?;
        for item in menu {
            insert_menu_item(conn, place_id, item).await?;
        }
    }
    Ok(())
}

async fn save_place_row(
    conn: &mut PgConnection,
    row: &PlaceRow,
    insert: bool,
) -> Result<i64, sqlx::Error> {
    let sql = if insert {
        "INSERT INTO places (name, slug, description, category_id, province, district, sector, \
         cell, village, address, latitude, longitude, views) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) RETURNING id"
    } else {
        "UPDATE places SET name = $1, slug = $2, description = $3, category_id = $4, \
         province = $5, district = $6, sector = $7, cell = $8, village = $9, address = $10, \
         latitude = $11, longitude = $12, views = $13, updated_at = now() \
         WHERE id = $14 RETURNING id"
    };
    let mut query = sqlx::query_scalar(sql)
        .bind(&row.name)
        .bind(&row.slug)
        .bind(&row.description)
        .bind(row.category_id)
        .bind(&row.province)
        .bind(&row.district)
        .bind(&row.sector)
        .bind(&row.cell)
        .bind(&row.village)
        .bind(&row.address)
        .bind(row.latitude)
        .bind(row.longitude)
        .bind(row.views);
    if !insert {
        query = query.bind(row.id);
    }
    query.fetch_one(&mut *conn).await
}

#[async_trait]
impl Repository<Place> for PgStore {
    async fn list(&self, _filter: ListFilter) -> Result<Vec<Place>, DbError> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("SELECT {PLACE_COLUMNS} FROM places ORDER BY id DESC");
        let rows: Vec<PlaceRow> = sqlx::query_as(&sql).fetch_all(&mut *conn).await?;
        Ok(hydrate(&mut conn, rows).await?)
    }

    async fn get(&self, id: i64) -> Result<Place, DbError> {
        let mut conn = self.pool.acquire().await?;
        load_place(&mut conn, id).await
    }

    async fn create(&self, input: PlaceWrite) -> Result<Place, DbError> {
        let mut tx = self.pool.begin().await?;

        check_references(&mut tx, &input).await?;

        let name = input.fields.name.clone().unwrap_or_default();
        let slug = allocate_slug(&mut tx, "places", &name, Place::NOUN).await?;
        let row = input.new_row(0, slug, chrono::Utc::now());
        let id = save_place_row(&mut tx, &row, true)
            .await
            .map_err(write_error::<Place>)?;

        write_relations(&mut tx, id, &input)
            .await
            .map_err(write_error::<Place>)?;

        let place = load_place(&mut tx, id).await?;
        tx.commit().await?;
        Ok(place)
    }

    async fn update(&self, id: i64, patch: PlaceWrite) -> Result<Place, DbError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {PLACE_COLUMNS} FROM places WHERE id = $1 FOR UPDATE");
        let mut row: PlaceRow = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;

        check_references(&mut tx, &patch).await?;

        // the slug was fixed at creation and never follows later renames
        patch.fields.clone().apply(&mut row);
        save_place_row(&mut tx, &row, false)
            .await
            .map_err(write_error::<Place>)?;

        write_relations(&mut tx, id, &patch)
            .await
            .map_err(write_error::<Place>)?;

        let place = load_place(&mut tx, id).await?;
        tx.commit().await?;
        Ok(place)
    }

    async fn delete(&self, id: i64) -> Result<(), DbError> {
        // images, social media, menu items and tag links cascade
        delete_row(&self.pool, "places", id).await
    }
}

// ============================================================================
// Place images
// ============================================================================

#[async_trait]
impl Repository<PlaceImage> for PgStore {
    async fn list(&self, filter: ListFilter) -> Result<Vec<PlaceImage>, DbError> {
        let sql = format!(
            "SELECT {IMAGE_COLUMNS} FROM place_images \
             WHERE ($1::BIGINT IS NULL OR place_id = $1) ORDER BY id DESC"
        );
        Ok(sqlx::query_as(&sql)
            .bind(filter.place)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get(&self, id: i64) -> Result<PlaceImage, DbError> {
        let sql = format!("SELECT {IMAGE_COLUMNS} FROM place_images WHERE id = $1");
        sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DbError::NotFound)
    }

    async fn create(&self, input: NewPlaceImage) -> Result<PlaceImage, DbError> {
        let mut conn = self.pool.acquire().await?;
        if !row_exists(&mut conn, "places", input.place_id).await? {
            return Err(DbError::missing_pk("place", input.place_id));
        }
        insert_image(&mut conn, input.place_id, &input.item)
            .await
            .map_err(write_error::<PlaceImage>)
    }

    async fn update(&self, id: i64, patch: PlaceImagePatch) -> Result<PlaceImage, DbError> {
        let mut image = Repository::<PlaceImage>::get(self, id).await?;
        patch.apply(&mut image);

        let sql = format!(
            "UPDATE place_images SET image = $1, caption = $2 WHERE id = $3 \
             RETURNING {IMAGE_COLUMNS}"
        );
        sqlx::query_as(&sql)
            .bind(&image.image)
            .bind(&image.caption)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(write_error::<PlaceImage>)?
            .ok_or(DbError::NotFound)
    }

    async fn delete(&self, id: i64) -> Result<(), DbError> {
        delete_row(&self.pool, "place_images", id).await
    }
}

// ============================================================================
// Place social media
// ============================================================================

#[async_trait]
impl Repository<PlaceSocialMedia> for PgStore {
    async fn list(&self, filter: ListFilter) -> Result<Vec<PlaceSocialMedia>, DbError> {
        let sql = format!(
            "SELECT {SOCIAL_COLUMNS} FROM place_social_media \
             WHERE ($1::BIGINT IS NULL OR place_id = $1) ORDER BY id DESC"
        );
        Ok(sqlx::query_as(&sql)
            .bind(filter.place)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get(&self, id: i64) -> Result<PlaceSocialMedia, DbError> {
        let sql = format!("SELECT {SOCIAL_COLUMNS} FROM place_social_media WHERE id = $1");
        sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DbError::NotFound)
    }

    async fn create(&self, input: NewPlaceSocialMedia) -> Result<PlaceSocialMedia, DbError> {
        let mut conn = self.pool.acquire().await?;
        if !row_exists(&mut conn, "places", input.place_id).await? {
            return Err(DbError::missing_pk("place", input.place_id));
        }
        let existing: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM place_social_media WHERE place_id = $1)",
        )
        .bind(input.place_id)
        .fetch_one(&mut *conn)
        .await?;
        if existing {
            return Err(DbError::duplicate::<PlaceSocialMedia>("place"));
        }
        insert_social(&mut conn, input.place_id, &input.links)
            .await
            .map_err(write_error::<PlaceSocialMedia>)
    }

    async fn update(&self, id: i64, patch: SocialLinksPatch) -> Result<PlaceSocialMedia, DbError> {
        let mut record = Repository::<PlaceSocialMedia>::get(self, id).await?;
        patch.apply(&mut record.links);

        let links = &record.links;
        let sql = format!(
            "UPDATE place_social_media SET phone_number = $1, email = $2, instagram = $3, \
             tiktok = $4, twitter = $5, website = $6, facebook = $7, whatsapp = $8 \
             WHERE id = $9 RETURNING {SOCIAL_COLUMNS}"
        );
        sqlx::query_as(&sql)
            .bind(&links.phone_number)
            .bind(&links.email)
            .bind(&links.instagram)
            .bind(&links.tiktok)
            .bind(&links.twitter)
            .bind(&links.website)
            .bind(&links.facebook)
            .bind(&links.whatsapp)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(write_error::<PlaceSocialMedia>)?
            .ok_or(DbError::NotFound)
    }

    async fn delete(&self, id: i64) -> Result<(), DbError> {
        delete_row(&self.pool, "place_social_media", id).await
    }
}

// ============================================================================
// Place menu
// ============================================================================

#[async_trait]
impl Repository<PlaceMenu> for PgStore {
    async fn list(&self, filter: ListFilter) -> Result<Vec<PlaceMenu>, DbError> {
        let sql = format!(
            "SELECT {MENU_COLUMNS} FROM place_menu \
             WHERE ($1::BIGINT IS NULL OR place_id = $1) ORDER BY id DESC"
        );
        Ok(sqlx::query_as(&sql)
            .bind(filter.place)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get(&self, id: i64) -> Result<PlaceMenu, DbError> {
        let sql = format!("SELECT {MENU_COLUMNS} FROM place_menu WHERE id = $1");
        sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DbError::NotFound)
    }

    async fn create(&self, input: NewPlaceMenu) -> Result<PlaceMenu, DbError> {
        let mut conn = self.pool.acquire().await?;
        if !row_exists(&mut conn, "places", input.place_id).await? {
            return Err(DbError::missing_pk("place", input.place_id));
        }
        insert_menu_item(&mut conn, input.place_id, &input.item)
            .await
            .map_err(write_error::<PlaceMenu>)
    }

    async fn update(&self, id: i64, patch: PlaceMenuPatch) -> Result<PlaceMenu, DbError> {
        let mut item = Repository::<PlaceMenu>::get(self, id).await?;
        patch.apply(&mut item);

        let sql = format!(
            "UPDATE place_menu SET name = $1, description = $2, price = $3 WHERE id = $4 \
             RETURNING {MENU_COLUMNS}"
        );
        sqlx::query_as(&sql)
            .bind(&item.name)
            .bind(&item.description)
            .bind(item.price)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(write_error::<PlaceMenu>)?
            .ok_or(DbError::NotFound)
    }

    async fn delete(&self, id: i64) -> Result<(), DbError> {
        delete_row(&self.pool, "place_menu", id).await
    }
}

#[async_trait]
impl Store for PgStore {
    fn categories(&self) -> &dyn Repository<Category> {
        self
    }

    fn tags(&self) -> &dyn Repository<Tag> {
        self
    }

    fn places(&self) -> &dyn Repository<Place> {
        self
    }

    fn place_images(&self) -> &dyn Repository<PlaceImage> {
        self
    }

    fn social_media(&self) -> &dyn Repository<PlaceSocialMedia> {
        self
    }

    fn menu_items(&self) -> &dyn Repository<PlaceMenu> {
        self
    }

    async fn ping(&self) -> Result<Duration, DbError> {
        let start = Instant::now();
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(start.elapsed())
    }
}
