//! Database Models - row types, read views and write DTOs for every entity.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A stored entity, with the names used in API messages and its write DTOs.
pub trait Entity: Serialize + Send + Sync + Sized + 'static {
    /// Type name used in not-found messages (`"Category with id 3 not found."`).
    const LABEL: &'static str;
    /// Lowercase noun for success/failure messages.
    const NOUN: &'static str;
    const PLURAL: &'static str;

    /// Validated payload for creation.
    type New: Send + 'static;
    /// Validated payload for update; `None` fields are left untouched.
    type Patch: Send + 'static;
}

/// Row filter for list operations. Only nested resources look at `place`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub place: Option<i64>,
}

impl ListFilter {
    pub fn for_place(place_id: i64) -> Self {
        Self {
            place: Some(place_id),
        }
    }
}

// ============================================================================
// Category
// ============================================================================

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    /// Derived from `name` when absent.
    pub slug: Option<String>,
    pub description: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image: Option<Option<String>>,
}

impl CategoryPatch {
    pub fn apply(self, category: &mut Category) {
        if let Some(name) = self.name {
            category.name = name;
        }
        if let Some(slug) = self.slug {
            category.slug = slug;
        }
        if let Some(description) = self.description {
            category.description = description;
        }
        if let Some(image) = self.image {
            category.image = image;
        }
    }
}

impl Entity for Category {
    const LABEL: &'static str = "Category";
    const NOUN: &'static str = "category";
    const PLURAL: &'static str = "categories";
    type New = NewCategory;
    type Patch = CategoryPatch;
}

// ============================================================================
// Tag
// ============================================================================

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTag {
    pub name: String,
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TagPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
}

impl TagPatch {
    pub fn apply(self, tag: &mut Tag) {
        if let Some(name) = self.name {
            tag.name = name;
        }
        if let Some(slug) = self.slug {
            tag.slug = slug;
        }
    }
}

impl Entity for Tag {
    const LABEL: &'static str = "Tag";
    const NOUN: &'static str = "tag";
    const PLURAL: &'static str = "tags";
    type New = NewTag;
    type Patch = TagPatch;
}

// ============================================================================
// Nested place records
// ============================================================================

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct PlaceImage {
    pub id: i64,
    #[sqlx(rename = "place_id")]
    pub place: i64,
    pub image: String,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Image payload, either standalone or inside a place write.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageItem {
    pub image: String,
    pub caption: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPlaceImage {
    pub place_id: i64,
    pub item: ImageItem,
}

#[derive(Debug, Clone, Default)]
pub struct PlaceImagePatch {
    pub image: Option<String>,
    pub caption: Option<Option<String>>,
}

impl PlaceImagePatch {
    pub fn apply(self, image: &mut PlaceImage) {
        if let Some(path) = self.image {
            image.image = path;
        }
        if let Some(caption) = self.caption {
            image.caption = caption;
        }
    }
}

impl Entity for PlaceImage {
    const LABEL: &'static str = "PlaceImage";
    const NOUN: &'static str = "place image";
    const PLURAL: &'static str = "images";
    type New = NewPlaceImage;
    type Patch = PlaceImagePatch;
}

/// Contact and social links of a place. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, FromRow, Serialize, Deserialize)]
pub struct SocialLinks {
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub instagram: Option<String>,
    pub tiktok: Option<String>,
    pub twitter: Option<String>,
    pub website: Option<String>,
    pub facebook: Option<String>,
    pub whatsapp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct PlaceSocialMedia {
    pub id: i64,
    #[sqlx(rename = "place_id")]
    pub place: i64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub links: SocialLinks,
}

#[derive(Debug, Clone)]
pub struct NewPlaceSocialMedia {
    pub place_id: i64,
    pub links: SocialLinks,
}

#[derive(Debug, Clone, Default)]
pub struct SocialLinksPatch {
    pub phone_number: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub instagram: Option<Option<String>>,
    pub tiktok: Option<Option<String>>,
    pub twitter: Option<Option<String>>,
    pub website: Option<Option<String>>,
    pub facebook: Option<Option<String>>,
    pub whatsapp: Option<Option<String>>,
}

impl SocialLinksPatch {
    pub fn apply(self, links: &mut SocialLinks) {
        let fields = [
            (self.phone_number, &mut links.phone_number),
            (self.email, &mut links.email),
            (self.instagram, &mut links.instagram),
            (self.tiktok, &mut links.tiktok),
            (self.twitter, &mut links.twitter),
            (self.website, &mut links.website),
            (self.facebook, &mut links.facebook),
            (self.whatsapp, &mut links.whatsapp),
        ];
        for (patch, slot) in fields {
            if let Some(value) = patch {
                *slot = value;
            }
        }
    }
}

impl Entity for PlaceSocialMedia {
    const LABEL: &'static str = "PlaceSocialMedia";
    const NOUN: &'static str = "social media record";
    const PLURAL: &'static str = "social media records";
    type New = NewPlaceSocialMedia;
    type Patch = SocialLinksPatch;
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct PlaceMenu {
    pub id: i64,
    #[sqlx(rename = "place_id")]
    pub place: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Menu item payload, either standalone or inside a place write.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuItem {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewPlaceMenu {
    pub place_id: i64,
    pub item: MenuItem,
}

#[derive(Debug, Clone, Default)]
pub struct PlaceMenuPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub price: Option<Decimal>,
}

impl PlaceMenuPatch {
    pub fn apply(self, menu: &mut PlaceMenu) {
        if let Some(name) = self.name {
            menu.name = name;
        }
        if let Some(description) = self.description {
            menu.description = description;
        }
        if let Some(price) = self.price {
            menu.price = price;
        }
    }
}

impl Entity for PlaceMenu {
    const LABEL: &'static str = "PlaceMenu";
    const NOUN: &'static str = "menu item";
    const PLURAL: &'static str = "menu items";
    type New = NewPlaceMenu;
    type Patch = PlaceMenuPatch;
}

// ============================================================================
// Place
// ============================================================================

/// A row of the `places` table, without its relations.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PlaceRow {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub province: Option<String>,
    pub district: Option<String>,
    pub sector: Option<String>,
    pub cell: Option<String>,
    pub village: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub views: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Place read view: scalar fields plus every relation, expanded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub tags: Vec<Tag>,
    pub province: Option<String>,
    pub district: Option<String>,
    pub sector: Option<String>,
    pub cell: Option<String>,
    pub village: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub views: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub images: Vec<PlaceImage>,
    pub social_media: Option<PlaceSocialMedia>,
    pub menu: Vec<PlaceMenu>,
}

/// Relations of one place, loaded separately from its row.
#[derive(Debug, Clone, Default)]
pub struct PlaceRelations {
    pub category: Option<Category>,
    pub tags: Vec<Tag>,
    pub images: Vec<PlaceImage>,
    pub social_media: Option<PlaceSocialMedia>,
    pub menu: Vec<PlaceMenu>,
}

impl Place {
    pub fn assemble(row: PlaceRow, relations: PlaceRelations) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            category: relations.category,
            tags: relations.tags,
            province: row.province,
            district: row.district,
            sector: row.sector,
            cell: row.cell,
            village: row.village,
            address: row.address,
            latitude: row.latitude,
            longitude: row.longitude,
            views: row.views,
            created_at: row.created_at,
            updated_at: row.updated_at,
            images: relations.images,
            social_media: relations.social_media,
            menu: relations.menu,
        }
    }
}

/// Scalar place fields shared by create and update payloads.
#[derive(Debug, Clone, Default)]
pub struct PlaceFields {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub category_id: Option<Option<i64>>,
    pub province: Option<Option<String>>,
    pub district: Option<Option<String>>,
    pub sector: Option<Option<String>>,
    pub cell: Option<Option<String>>,
    pub village: Option<Option<String>>,
    pub address: Option<Option<String>>,
    pub latitude: Option<Option<f64>>,
    pub longitude: Option<Option<f64>>,
    pub views: Option<i64>,
}

impl PlaceFields {
    pub fn apply(self, row: &mut PlaceRow) {
        if let Some(name) = self.name {
            row.name = name;
        }
        if let Some(description) = self.description {
            row.description = description;
        }
        if let Some(category_id) = self.category_id {
            row.category_id = category_id;
        }
        let texts = [
            (self.province, &mut row.province),
            (self.district, &mut row.district),
            (self.sector, &mut row.sector),
            (self.cell, &mut row.cell),
            (self.village, &mut row.village),
            (self.address, &mut row.address),
        ];
        for (patch, slot) in texts {
            if let Some(value) = patch {
                *slot = value;
            }
        }
        if let Some(latitude) = self.latitude {
            row.latitude = latitude;
        }
        if let Some(longitude) = self.longitude {
            row.longitude = longitude;
        }
        if let Some(views) = self.views {
            row.views = views;
        }
    }
}

/// Place write payload. On create `fields.name` is always set; on update
/// every `None` leaves the stored value (or relation) as it is.
#[derive(Debug, Clone, Default)]
pub struct PlaceWrite {
    pub fields: PlaceFields,
    pub tag_ids: Option<Vec<i64>>,
    pub images: Option<Vec<ImageItem>>,
    pub social_media: Option<Option<SocialLinks>>,
    pub menu: Option<Vec<MenuItem>>,
}

impl PlaceWrite {
    /// Row for a new place, with defaults for everything not in the payload.
    pub fn new_row(&self, id: i64, slug: String, now: DateTime<Utc>) -> PlaceRow {
        let mut row = PlaceRow {
            id,
            name: String::new(),
            slug,
            description: None,
            category_id: None,
            province: None,
            district: None,
            sector: None,
            cell: None,
            village: None,
            address: None,
            latitude: None,
            longitude: None,
            views: 0,
            created_at: now,
            updated_at: now,
        };
        self.fields.clone().apply(&mut row);
        row
    }
}

impl Entity for Place {
    const LABEL: &'static str = "Place";
    const NOUN: &'static str = "place";
    const PLURAL: &'static str = "places";
    type New = PlaceWrite;
    type Patch = PlaceWrite;
}
