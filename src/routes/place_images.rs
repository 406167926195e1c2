use crate::db::models::{ImageItem, NewPlaceImage, PlaceImage, PlaceImagePatch};
use crate::db::{Repository, Store};
use crate::routes::crud::Resource;
use crate::validation::{FieldErrors, Fields, Object};

const CAPTION_MAX: usize = 255;

/// `{image, caption}`, standalone or as an element of a place's `images`.
pub fn parse_item(body: &Object) -> Result<ImageItem, FieldErrors> {
    let mut f = Fields::new(body, false);
    let image = f.text("image", usize::MAX);
    let caption = f.optional_text("caption", Some(CAPTION_MAX));
    f.build(|| {
        Some(ImageItem {
            image: image?,
            caption: caption.flatten(),
        })
    })
}

impl Resource for PlaceImage {
    fn repo(store: &dyn Store) -> &dyn Repository<Self> {
        store.place_images()
    }

    fn parse_new(body: &Object) -> Result<NewPlaceImage, FieldErrors> {
        let mut f = Fields::new(body, false);
        let place_id = f.pk("place");
        let item = parse_item(body).map_err(|e| f.merge(e)).ok();
        f.build(|| {
            Some(NewPlaceImage {
                place_id: place_id?,
                item: item?,
            })
        })
    }

    fn parse_patch(body: &Object, partial: bool) -> Result<PlaceImagePatch, FieldErrors> {
        let mut f = Fields::new(body, partial);
        let patch = PlaceImagePatch {
            image: f.text("image", usize::MAX),
            caption: f.optional_text("caption", Some(CAPTION_MAX)),
        };
        f.build(|| Some(patch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{body_object, REQUIRED};
    use serde_json::json;

    #[test]
    fn test_parse_new_reports_all_missing_fields() {
        let body = body_object(json!({"caption": "front"})).unwrap();
        let errors = PlaceImage::parse_new(&body).unwrap_err();
        assert_eq!(errors.get("place").unwrap(), [REQUIRED]);
        assert_eq!(errors.get("image").unwrap(), [REQUIRED]);
    }

    #[test]
    fn test_parse_new_with_place() {
        let body = body_object(json!({"place": 4, "image": "places/a.jpg"})).unwrap();
        let new = PlaceImage::parse_new(&body).unwrap();
        assert_eq!(new.place_id, 4);
        assert!(new.item.caption.is_none());
    }
}
