use crate::db::models::{NewTag, Tag, TagPatch};
use crate::db::{Repository, Store};
use crate::routes::crud::Resource;
use crate::validation::{FieldErrors, Fields, Object};

const NAME_MAX: usize = 100;

impl Resource for Tag {
    fn repo(store: &dyn Store) -> &dyn Repository<Self> {
        store.tags()
    }

    fn parse_new(body: &Object) -> Result<NewTag, FieldErrors> {
        let mut f = Fields::new(body, false);
        let name = f.text("name", NAME_MAX);
        let slug = f.slug("slug");
        f.build(|| Some(NewTag { name: name?, slug }))
    }

    fn parse_patch(body: &Object, partial: bool) -> Result<TagPatch, FieldErrors> {
        let mut f = Fields::new(body, partial);
        let patch = TagPatch {
            name: f.text("name", NAME_MAX),
            slug: f.slug("slug"),
        };
        f.build(|| Some(patch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{body_object, NOT_BLANK};
    use serde_json::json;

    #[test]
    fn test_blank_name_rejected() {
        let body = body_object(json!({"name": "   "})).unwrap();
        let errors = Tag::parse_new(&body).unwrap_err();
        assert_eq!(errors.get("name").unwrap(), [NOT_BLANK]);
    }

    #[test]
    fn test_explicit_slug_kept() {
        let body = body_object(json!({"name": "Live Music", "slug": "live_music"})).unwrap();
        let tag = Tag::parse_new(&body).unwrap();
        assert_eq!(tag.slug.as_deref(), Some("live_music"));
    }
}
