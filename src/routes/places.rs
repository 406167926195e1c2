/**
 * Place Routes
 * Payload parsing for the place aggregate: scalar fields, category and tag
 * references, and the nested images / social media / menu collections
 */
use axum::{
    extract::{Path, State},
    Json,
};

use crate::db::models::{Place, PlaceFields, PlaceWrite};
use crate::db::{Repository, Store};
use crate::error::ApiError;
use crate::routes::crud::{self, Resource};
use crate::routes::{menu, place_images, social_media, Envelope};
use crate::validation::{FieldErrors, Fields, Object};
use crate::AppState;

const NAME_MAX: usize = 255;
const LOCATION_MAX: usize = 255;

/// Parses each element with `parse`, reporting errors as `key[i].field`.
fn parse_each<T>(
    f: &mut Fields<'_>,
    key: &str,
    items: Option<Vec<&Object>>,
    parse: fn(&Object) -> Result<T, FieldErrors>,
) -> Option<Vec<T>> {
    let items = items?;
    let mut parsed = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        match parse(item) {
            Ok(value) => parsed.push(value),
            Err(errors) => f.absorb(&format!("{key}[{i}]"), errors),
        }
    }
    Some(parsed)
}

fn parse_place(body: &Object, partial: bool) -> Result<PlaceWrite, FieldErrors> {
    let mut f = Fields::new(body, partial);

    let fields = PlaceFields {
        name: f.text("name", NAME_MAX),
        description: f.optional_text("description", None),
        category_id: f.optional_pk("category"),
        province: f.optional_text("province", Some(LOCATION_MAX)),
        district: f.optional_text("district", Some(LOCATION_MAX)),
        sector: f.optional_text("sector", Some(LOCATION_MAX)),
        cell: f.optional_text("cell", Some(LOCATION_MAX)),
        village: f.optional_text("village", Some(LOCATION_MAX)),
        address: f.optional_text("address", Some(LOCATION_MAX)),
        latitude: f.number_in("latitude", -90.0, 90.0),
        longitude: f.number_in("longitude", -180.0, 180.0),
        views: f.count("views"),
    };
    let tag_ids = f.pk_list("tags");

    let images = f.nested_list("images");
    let images = parse_each(&mut f, "images", images, place_images::parse_item);

    let menu_items = f.nested_list("menu");
    let menu_items = parse_each(&mut f, "menu", menu_items, menu::parse_item);

    let social = match f.nested("social_media") {
        Some(Some(object)) => match social_media::parse_links(object) {
            Ok(links) => Some(Some(links)),
            Err(errors) => {
                f.absorb("social_media", errors);
                None
            }
        },
        Some(None) => Some(None),
        None => None,
    };

    f.build(|| {
        Some(PlaceWrite {
            fields,
            tag_ids,
            images,
            social_media: social,
            menu: menu_items,
        })
    })
}

impl Resource for Place {
    fn repo(store: &dyn Store) -> &dyn Repository<Self> {
        store.places()
    }

    fn parse_new(body: &Object) -> Result<PlaceWrite, FieldErrors> {
        parse_place(body, false)
    }

    fn parse_patch(body: &Object, partial: bool) -> Result<PlaceWrite, FieldErrors> {
        parse_place(body, partial)
    }
}

// ============================================================================
// Public read endpoints
// ============================================================================

/// GET /api/places/
pub async fn list_places(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<Place>>>, ApiError> {
    let Json(mut envelope) = crud::list::<Place>(State(state)).await?;
    envelope.detail = format!(
        "Successfully retrieved {} places with detailed info.",
        envelope.data.len()
    );
    Ok(Json(envelope))
}

/// GET /api/place/{id}/
pub async fn place_details(
    State(state): State<AppState>,
    id: Path<String>,
) -> Result<Json<Envelope<Place>>, ApiError> {
    let Json(mut envelope) = crud::retrieve::<Place>(State(state), id).await?;
    envelope.detail =
        "Successfully retrieved comprehensive details for the selected Place.".to_string();
    Ok(Json(envelope))
}
