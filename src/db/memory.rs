//! In-process store used when no database is configured, and by the tests.
//!
//! Mirrors the PostgreSQL constraints: unique names and slugs, one social
//! media record per place, `SET NULL` on category deletion and cascading
//! deletion of everything owned by a place.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::models::{
    Category, CategoryPatch, Entity, ImageItem, ListFilter, MenuItem, NewCategory,
    NewPlaceImage, NewPlaceMenu, NewPlaceSocialMedia, NewTag, Place, PlaceImage, PlaceImagePatch,
    PlaceMenu, PlaceMenuPatch, PlaceRelations, PlaceRow, PlaceSocialMedia, PlaceWrite,
    SocialLinks, SocialLinksPatch, Tag, TagPatch,
};
use super::{DbError, Repository, Store};
use crate::slug;
use crate::validation::FieldErrors;

#[derive(Debug, Default)]
struct Tables {
    last_id: i64,
    categories: BTreeMap<i64, Category>,
    tags: BTreeMap<i64, Tag>,
    places: BTreeMap<i64, PlaceRow>,
    /// (place_id, tag_id)
    place_tags: BTreeSet<(i64, i64)>,
    images: BTreeMap<i64, PlaceImage>,
    social_media: BTreeMap<i64, PlaceSocialMedia>,
    menu: BTreeMap<i64, PlaceMenu>,
}

impl Tables {
    /// Ids are unique across tables, which keeps them increasing per table too.
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn newest_first<T: Clone>(map: &BTreeMap<i64, T>, keep: impl Fn(&T) -> bool) -> Vec<T> {
        map.values().rev().filter(|v| keep(v)).cloned().collect()
    }

    fn require_place(&self, place_id: i64) -> Result<(), DbError> {
        if self.places.contains_key(&place_id) {
            Ok(())
        } else {
            Err(DbError::missing_pk("place", place_id))
        }
    }

    fn assemble(&self, row: &PlaceRow) -> Place {
        let mut menu: Vec<PlaceMenu> = self
            .menu
            .values()
            .filter(|m| m.place == row.id)
            .cloned()
            .collect();
        menu.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        let mut tags: Vec<Tag> = self
            .place_tags
            .range((row.id, i64::MIN)..=(row.id, i64::MAX))
            .filter_map(|(_, tag_id)| self.tags.get(tag_id).cloned())
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));

        let relations = PlaceRelations {
            category: row.category_id.and_then(|id| self.categories.get(&id).cloned()),
            tags,
            images: Self::newest_first(&self.images, |i| i.place == row.id),
            social_media: self
                .social_media
                .values()
                .find(|s| s.place == row.id)
                .cloned(),
            menu,
        };
        Place::assemble(row.clone(), relations)
    }

    fn check_references(&self, write: &PlaceWrite) -> Result<(), DbError> {
        let mut errors = FieldErrors::new();
        if let Some(Some(category_id)) = write.fields.category_id {
            if !self.categories.contains_key(&category_id) {
                errors.add(
                    "category",
                    format!("Invalid pk \"{category_id}\" - object does not exist."),
                );
            }
        }
        if let Some(tag_ids) = &write.tag_ids {
            for id in tag_ids.iter().filter(|id| !self.tags.contains_key(id)) {
                errors.add("tags", format!("Invalid pk \"{id}\" - object does not exist."));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(DbError::Invalid(errors))
        }
    }

    fn insert_image(&mut self, place_id: i64, item: ImageItem) -> PlaceImage {
        let id = self.next_id();
        let image = PlaceImage {
            id,
            place: place_id,
            image: item.image,
            caption: item.caption,
            created_at: Utc::now(),
        };
        self.images.insert(id, image.clone());
        image
    }

    fn insert_social(&mut self, place_id: i64, links: SocialLinks) -> PlaceSocialMedia {
        let id = self.next_id();
        let record = PlaceSocialMedia {
            id,
            place: place_id,
            links,
        };
        self.social_media.insert(id, record.clone());
        record
    }

    fn insert_menu_item(&mut self, place_id: i64, item: MenuItem) -> PlaceMenu {
        let id = self.next_id();
        let menu = PlaceMenu {
            id,
            place: place_id,
            name: item.name,
            description: item.description,
            price: item.price,
            created_at: Utc::now(),
        };
        self.menu.insert(id, menu.clone());
        menu
    }

    fn write_relations(&mut self, place_id: i64, write: PlaceWrite) {
        if let Some(tag_ids) = write.tag_ids {
            self.place_tags.retain(|(p, _)| *p != place_id);
            self.place_tags
                .extend(tag_ids.into_iter().map(|tag_id| (place_id, tag_id)));
        }
        if let Some(images) = write.images {
            self.images.retain(|_, i| i.place != place_id);
            for item in images {
                self.insert_image(place_id, item);
            }
        }
        if let Some(social) = write.social_media {
            self.social_media.retain(|_, s| s.place != place_id);
            if let Some(links) = social {
                self.insert_social(place_id, links);
            }
        }
        if let Some(menu) = write.menu {
            self.menu.retain(|_, m| m.place != place_id);
            for item in menu {
                self.insert_menu_item(place_id, item);
            }
        }
    }
}

fn slug_for<E: Entity>(
    explicit: Option<String>,
    name: &str,
    taken: impl Fn(&str) -> bool,
) -> Result<String, DbError> {
    match explicit {
        Some(slug) if taken(&slug) => Err(DbError::duplicate::<E>("slug")),
        Some(slug) => Ok(slug),
        None => Ok(slug::disambiguate(&slug::slugify(name, E::NOUN), taken)),
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

// ============================================================================
// Category
// ============================================================================

#[async_trait]
impl Repository<Category> for MemoryStore {
    async fn list(&self, _filter: ListFilter) -> Result<Vec<Category>, DbError> {
        let tables = self.tables.read().await;
        Ok(Tables::newest_first(&tables.categories, |_| true))
    }

    async fn get(&self, id: i64) -> Result<Category, DbError> {
        let tables = self.tables.read().await;
        tables.categories.get(&id).cloned().ok_or(DbError::NotFound)
    }

    async fn create(&self, input: NewCategory) -> Result<Category, DbError> {
        let mut tables = self.tables.write().await;

        if tables.categories.values().any(|c| c.name == input.name) {
            return Err(DbError::duplicate::<Category>("name"));
        }
        let slug = slug_for::<Category>(input.slug, &input.name, |s| {
            tables.categories.values().any(|c| c.slug == s)
        })?;

        let id = tables.next_id();
        let now = Utc::now();
        let category = Category {
            id,
            name: input.name,
            slug,
            description: input.description,
            image: input.image,
            created_at: now,
            updated_at: now,
        };
        tables.categories.insert(id, category.clone());
        Ok(category)
    }

    async fn update(&self, id: i64, patch: CategoryPatch) -> Result<Category, DbError> {
        let mut tables = self.tables.write().await;

        let mut category = tables.categories.get(&id).cloned().ok_or(DbError::NotFound)?;
        if let Some(name) = &patch.name {
            if tables.categories.values().any(|c| c.id != id && &c.name == name) {
                return Err(DbError::duplicate::<Category>("name"));
            }
        }
        if let Some(slug) = &patch.slug {
            if tables.categories.values().any(|c| c.id != id && &c.slug == slug) {
                return Err(DbError::duplicate::<Category>("slug"));
            }
        }
        patch.apply(&mut category);
        category.updated_at = Utc::now();
        tables.categories.insert(id, category.clone());
        Ok(category)
    }

    async fn delete(&self, id: i64) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        tables.categories.remove(&id).ok_or(DbError::NotFound)?;
        for place in tables.places.values_mut() {
            if place.category_id == Some(id) {
                place.category_id = None;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tag
// ============================================================================

#[async_trait]
impl Repository<Tag> for MemoryStore {
    async fn list(&self, _filter: ListFilter) -> Result<Vec<Tag>, DbError> {
        let tables = self.tables.read().await;
        Ok(Tables::newest_first(&tables.tags, |_| true))
    }

    async fn get(&self, id: i64) -> Result<Tag, DbError> {
        let tables = self.tables.read().await;
        tables.tags.get(&id).cloned().ok_or(DbError::NotFound)
    }

    async fn create(&self, input: NewTag) -> Result<Tag, DbError> {
        let mut tables = self.tables.write().await;

        if tables.tags.values().any(|t| t.name == input.name) {
            return Err(DbError::duplicate::<Tag>("name"));
        }
        let slug = slug_for::<Tag>(input.slug, &input.name, |s| {
            tables.tags.values().any(|t| t.slug == s)
        })?;

        let id = tables.next_id();
        let tag = Tag {
            id,
            name: input.name,
            slug,
            created_at: Utc::now(),
        };
        tables.tags.insert(id, tag.clone());
        Ok(tag)
    }

    async fn update(&self, id: i64, patch: TagPatch) -> Result<Tag, DbError> {
        let mut tables = self.tables.write().await;

        let mut tag = tables.tags.get(&id).cloned().ok_or(DbError::NotFound)?;
        if let Some(name) = &patch.name {
            if tables.tags.values().any(|t| t.id != id && &t.name == name) {
                return Err(DbError::duplicate::<Tag>("name"));
            }
        }
        if let Some(slug) = &patch.slug {
            if tables.tags.values().any(|t| t.id != id && &t.slug == slug) {
                return Err(DbError::duplicate::<Tag>("slug"));
            }
        }
        patch.apply(&mut tag);
        tables.tags.insert(id, tag.clone());
        Ok(tag)
    }

    async fn delete(&self, id: i64) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        tables.tags.remove(&id).ok_or(DbError::NotFound)?;
        tables.place_tags.retain(|(_, tag_id)| *tag_id != id);
        Ok(())
    }
}

// ============================================================================
// Place
// ============================================================================

#[async_trait]
impl Repository<Place> for MemoryStore {
    async fn list(&self, _filter: ListFilter) -> Result<Vec<Place>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables
            .places
            .values()
            .rev()
            .map(|row| tables.assemble(row))
            .collect())
    }

    async fn get(&self, id: i64) -> Result<Place, DbError> {
        let tables = self.tables.read().await;
        let row = tables.places.get(&id).ok_or(DbError::NotFound)?;
        Ok(tables.assemble(row))
    }

    async fn create(&self, input: PlaceWrite) -> Result<Place, DbError> {
        let mut tables = self.tables.write().await;

        tables.check_references(&input)?;

        let name = input.fields.name.clone().unwrap_or_default();
        let base = slug::slugify(&name, Place::NOUN);
        let slug = slug::disambiguate(&base, |s| tables.places.values().any(|p| p.slug == s));

        let id = tables.next_id();
        let row = input.new_row(id, slug, Utc::now());
        tables.places.insert(id, row);
        tables.write_relations(id, input);

        let row = &tables.places[&id];
        Ok(tables.assemble(row))
    }

    async fn update(&self, id: i64, patch: PlaceWrite) -> Result<Place, DbError> {
        let mut tables = self.tables.write().await;

        let mut row = tables.places.get(&id).cloned().ok_or(DbError::NotFound)?;
        tables.check_references(&patch)?;

        patch.fields.clone().apply(&mut row);
        row.updated_at = Utc::now();
        tables.places.insert(id, row);
        tables.write_relations(id, patch);

        let row = &tables.places[&id];
        Ok(tables.assemble(row))
    }

    async fn delete(&self, id: i64) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        tables.places.remove(&id).ok_or(DbError::NotFound)?;
        tables.place_tags.retain(|(place_id, _)| *place_id != id);
        tables.images.retain(|_, i| i.place != id);
        tables.social_media.retain(|_, s| s.place != id);
        tables.menu.retain(|_, m| m.place != id);
        Ok(())
    }
}

// ============================================================================
// Nested place records
// ============================================================================

#[async_trait]
impl Repository<PlaceImage> for MemoryStore {
    async fn list(&self, filter: ListFilter) -> Result<Vec<PlaceImage>, DbError> {
        let tables = self.tables.read().await;
        Ok(Tables::newest_first(&tables.images, |i| {
            filter.place.map_or(true, |p| i.place == p)
        }))
    }

    async fn get(&self, id: i64) -> Result<PlaceImage, DbError> {
        let tables = self.tables.read().await;
        tables.images.get(&id).cloned().ok_or(DbError::NotFound)
    }

    async fn create(&self, input: NewPlaceImage) -> Result<PlaceImage, DbError> {
        let mut tables = self.tables.write().await;
        tables.require_place(input.place_id)?;
        Ok(tables.insert_image(input.place_id, input.item))
    }

    async fn update(&self, id: i64, patch: PlaceImagePatch) -> Result<PlaceImage, DbError> {
        let mut tables = self.tables.write().await;
        let image = tables.images.get_mut(&id).ok_or(DbError::NotFound)?;
        patch.apply(image);
        Ok(image.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        tables.images.remove(&id).map(|_| ()).ok_or(DbError::NotFound)
    }
}

#[async_trait]
impl Repository<PlaceSocialMedia> for MemoryStore {
    async fn list(&self, filter: ListFilter) -> Result<Vec<PlaceSocialMedia>, DbError> {
        let tables = self.tables.read().await;
        Ok(Tables::newest_first(&tables.social_media, |s| {
            filter.place.map_or(true, |p| s.place == p)
        }))
    }

    async fn get(&self, id: i64) -> Result<PlaceSocialMedia, DbError> {
        let tables = self.tables.read().await;
        tables.social_media.get(&id).cloned().ok_or(DbError::NotFound)
    }

    async fn create(&self, input: NewPlaceSocialMedia) -> Result<PlaceSocialMedia, DbError> {
        let mut tables = self.tables.write().await;
        tables.require_place(input.place_id)?;
        if tables.social_media.values().any(|s| s.place == input.place_id) {
            return Err(DbError::duplicate::<PlaceSocialMedia>("place"));
        }
        Ok(tables.insert_social(input.place_id, input.links))
    }

    async fn update(&self, id: i64, patch: SocialLinksPatch) -> Result<PlaceSocialMedia, DbError> {
        let mut tables = self.tables.write().await;
        let record = tables.social_media.get_mut(&id).ok_or(DbError::NotFound)?;
        patch.apply(&mut record.links);
        Ok(record.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        tables.social_media.remove(&id).map(|_| ()).ok_or(DbError::NotFound)
    }
}

#[async_trait]
impl Repository<PlaceMenu> for MemoryStore {
    async fn list(&self, filter: ListFilter) -> Result<Vec<PlaceMenu>, DbError> {
        let tables = self.tables.read().await;
        Ok(Tables::newest_first(&tables.menu, |m| {
            filter.place.map_or(true, |p| m.place == p)
        }))
    }

    async fn get(&self, id: i64) -> Result<PlaceMenu, DbError> {
        let tables = self.tables.read().await;
        tables.menu.get(&id).cloned().ok_or(DbError::NotFound)
    }

    async fn create(&self, input: NewPlaceMenu) -> Result<PlaceMenu, DbError> {
        let mut tables = self.tables.write().await;
        tables.require_place(input.place_id)?;
        Ok(tables.insert_menu_item(input.place_id, input.item))
    }

    async fn update(&self, id: i64, patch: PlaceMenuPatch) -> Result<PlaceMenu, DbError> {
        let mut tables = self.tables.write().await;
        let item = tables.menu.get_mut(&id).ok_or(DbError::NotFound)?;
        patch.apply(item);
        Ok(item.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        tables.menu.remove(&id).map(|_| ()).ok_or(DbError::NotFound)
    }
}

#[async_trait]
impl Store for MemoryStore {
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
        drop(self.tables.read().await);
        Ok(start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::PlaceFields;
    use rust_decimal::Decimal;

    fn place_named(name: &str) -> PlaceWrite {
        PlaceWrite {
            fields: PlaceFields {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    async fn category(store: &MemoryStore, name: &str) -> Category {
        store
            .categories()
            .create(NewCategory {
                name: name.to_string(),
                slug: None,
                description: format!("{name} places"),
                image: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_category_slug_derived_and_unique_name() {
        let store = MemoryStore::new();
        let food = category(&store, "Food & Drinks").await;
        assert_eq!(food.slug, "food-drinks");

        let err = store
            .categories()
            .create(NewCategory {
                name: "Food & Drinks".to_string(),
                slug: None,
                description: String::new(),
                image: None,
            })
            .await
            .unwrap_err();
        match err {
            DbError::Invalid(errors) => assert!(errors.get("name").is_some()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_explicit_slug_collision_is_rejected() {
        let store = MemoryStore::new();
        store
            .tags()
            .create(NewTag {
                name: "Rooftop".to_string(),
                slug: None,
            })
            .await
            .unwrap();
        let err = store
            .tags()
            .create(NewTag {
                name: "Roof top".to_string(),
                slug: Some("rooftop".to_string()),
            })
            .await
            .unwrap_err();
        match err {
            DbError::Invalid(errors) => {
                assert_eq!(errors.get("slug").unwrap(), ["tag with this slug already exists."])
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_place_slugs_get_numeric_suffix() {
        let store = MemoryStore::new();
        let first = store.places().create(place_named("Kigali Club")).await.unwrap();
        let second = store.places().create(place_named("Kigali Club")).await.unwrap();
        let third = store.places().create(place_named("Kigali  club")).await.unwrap();
        assert_eq!(first.slug, "kigali-club");
        assert_eq!(second.slug, "kigali-club-2");
        assert_eq!(third.slug, "kigali-club-3");
    }

    #[tokio::test]
    async fn test_deleting_category_detaches_places() {
        let store = MemoryStore::new();
        let food = category(&store, "Food").await;
        let mut write = place_named("Pili Pili");
        write.fields.category_id = Some(Some(food.id));
        let place = store.places().create(write).await.unwrap();
        assert_eq!(place.category.as_ref().map(|c| c.id), Some(food.id));

        store.categories().delete(food.id).await.unwrap();
        let place = store.places().get(place.id).await.unwrap();
        assert!(place.category.is_none());
    }

    #[tokio::test]
    async fn test_deleting_place_cascades() {
        let store = MemoryStore::new();
        let mut write = place_named("Heaven");
        write.menu = Some(vec![MenuItem {
            name: "Brochette".to_string(),
            description: None,
            price: Decimal::new(3500, 2),
        }]);
        write.social_media = Some(Some(SocialLinks {
            instagram: Some("@heaven".to_string()),
            ..Default::default()
        }));
        let place = store.places().create(write).await.unwrap();
        let image = store
            .place_images()
            .create(NewPlaceImage {
                place_id: place.id,
                item: ImageItem {
                    image: "places/heaven.jpg".to_string(),
                    caption: None,
                },
            })
            .await
            .unwrap();

        store.places().delete(place.id).await.unwrap();

        let filter = ListFilter::for_place(place.id);
        assert!(store.menu_items().list(filter).await.unwrap().is_empty());
        assert!(store.social_media().list(filter).await.unwrap().is_empty());
        assert!(matches!(
            store.place_images().get(image.id).await,
            Err(DbError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_unknown_references_are_field_errors() {
        let store = MemoryStore::new();
        let mut write = place_named("Nowhere");
        write.fields.category_id = Some(Some(99));
        write.tag_ids = Some(vec![7]);
        match store.places().create(write).await.unwrap_err() {
            DbError::Invalid(errors) => {
                assert_eq!(
                    errors.get("category").unwrap(),
                    ["Invalid pk \"99\" - object does not exist."]
                );
                assert!(errors.get("tags").is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(store.places().list(ListFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_social_record_for_place_rejected() {
        let store = MemoryStore::new();
        let place = store.places().create(place_named("Inka")).await.unwrap();
        let new = || NewPlaceSocialMedia {
            place_id: place.id,
            links: SocialLinks::default(),
        };
        store.social_media().create(new()).await.unwrap();
        assert!(matches!(
            store.social_media().create(new()).await,
            Err(DbError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_place_update_replaces_present_collections_only() {
        let store = MemoryStore::new();
        let mut write = place_named("Repub Lounge");
        write.images = Some(vec![ImageItem {
            image: "places/a.jpg".to_string(),
            caption: None,
        }]);
        write.menu = Some(vec![MenuItem {
            name: "Isombe".to_string(),
            description: None,
            price: Decimal::new(500, 0),
        }]);
        let place = store.places().create(write).await.unwrap();

        let patch = PlaceWrite {
            images: Some(vec![]),
            ..Default::default()
        };
        let place = store.places().update(place.id, patch).await.unwrap();
        assert!(place.images.is_empty());
        assert_eq!(place.menu.len(), 1);
        assert_eq!(place.slug, "repub-lounge");
    }

    #[tokio::test]
    async fn test_lists_are_newest_first() {
        let store = MemoryStore::new();
        let a = category(&store, "A").await;
        let b = category(&store, "B").await;
        let ids: Vec<i64> = store
            .categories()
            .list(ListFilter::default())
            .await
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }
}
