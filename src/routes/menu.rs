use crate::db::models::{MenuItem, NewPlaceMenu, PlaceMenu, PlaceMenuPatch};
use crate::db::{Repository, Store};
use crate::routes::crud::Resource;
use crate::validation::{FieldErrors, Fields, Object};

const NAME_MAX: usize = 255;
/// NUMERIC(10, 2)
const PRICE_DIGITS: u32 = 10;
const PRICE_PLACES: u32 = 2;

/// `{name, description, price}`, standalone or as an element of a place's `menu`.
pub fn parse_item(body: &Object) -> Result<MenuItem, FieldErrors> {
    let mut f = Fields::new(body, false);
    let name = f.text("name", NAME_MAX);
    let description = f.optional_text("description", None);
    let price = f.price("price", PRICE_DIGITS, PRICE_PLACES);
    f.build(|| {
        Some(MenuItem {
            name: name?,
            description: description.flatten(),
            price: price?,
        })
    })
}

impl Resource for PlaceMenu {
    fn repo(store: &dyn Store) -> &dyn Repository<Self> {
        store.menu_items()
    }

    fn parse_new(body: &Object) -> Result<NewPlaceMenu, FieldErrors> {
        let mut f = Fields::new(body, false);
        let place_id = f.pk("place");
        let item = parse_item(body).map_err(|e| f.merge(e)).ok();
        f.build(|| {
            Some(NewPlaceMenu {
                place_id: place_id?,
                item: item?,
            })
        })
    }

    fn parse_patch(body: &Object, partial: bool) -> Result<PlaceMenuPatch, FieldErrors> {
        let mut f = Fields::new(body, partial);
        let patch = PlaceMenuPatch {
            name: f.text("name", NAME_MAX),
            description: f.optional_text("description", None),
            price: f.price("price", PRICE_DIGITS, PRICE_PLACES),
        };
        f.build(|| Some(patch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::body_object;
    use rust_decimal::Decimal;
    use serde_json::json;

    #[test]
    fn test_price_accepts_strings_and_numbers() {
        let body = body_object(json!({"name": "Tilapia", "price": "12.5"})).unwrap();
        assert_eq!(parse_item(&body).unwrap().price, Decimal::new(1250, 2));

        let body = body_object(json!({"name": "Tilapia", "price": 8})).unwrap();
        assert_eq!(parse_item(&body).unwrap().price.to_string(), "8.00");
    }

    #[test]
    fn test_negative_price_rejected() {
        let body = body_object(json!({"place": 1, "name": "Tilapia", "price": -1})).unwrap();
        let errors = PlaceMenu::parse_new(&body).unwrap_err();
        assert_eq!(
            errors.get("price").unwrap(),
            ["Ensure this value is greater than or equal to 0."]
        );
    }

    #[test]
    fn test_patch_price_only() {
        let body = body_object(json!({"price": "3000"})).unwrap();
        let patch = PlaceMenu::parse_patch(&body, true).unwrap();
        assert!(patch.name.is_none());
        assert_eq!(patch.price, Some(Decimal::new(300000, 2)));
    }
}
