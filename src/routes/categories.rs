/**
 * Category Routes
 * Payload parsing for categories; handlers come from `crud`
 */
use crate::db::models::{Category, CategoryPatch, NewCategory};
use crate::db::{Repository, Store};
use crate::routes::crud::Resource;
use crate::validation::{FieldErrors, Fields, Object};

pub const NAME_MAX: usize = 100;
const DESCRIPTION_MAX: usize = 10_000;

/// Blank image paths mean "no image".
pub(crate) fn image_path(value: Option<Option<String>>) -> Option<Option<String>> {
    value.map(|v| v.filter(|s| !s.is_empty()))
}

impl Resource for Category {
    fn repo(store: &dyn Store) -> &dyn Repository<Self> {
        store.categories()
    }

    fn parse_new(body: &Object) -> Result<NewCategory, FieldErrors> {
        let mut f = Fields::new(body, false);
        let name = f.text("name", NAME_MAX);
        let slug = f.slug("slug");
        let description = f.text("description", DESCRIPTION_MAX);
        let image = image_path(f.optional_text("image", None));

        f.build(|| {
            Some(NewCategory {
                name: name?,
                slug,
                description: description?,
                image: image.flatten(),
            })
        })
    }

    fn parse_patch(body: &Object, partial: bool) -> Result<CategoryPatch, FieldErrors> {
        let mut f = Fields::new(body, partial);
        let patch = CategoryPatch {
            name: f.text("name", NAME_MAX),
            slug: f.slug("slug"),
            description: f.text("description", DESCRIPTION_MAX),
            image: image_path(f.optional_text("image", None)),
        };
        f.build(|| Some(patch))
    }
}
