use crate::db::models::{NewPlaceSocialMedia, PlaceSocialMedia, SocialLinks, SocialLinksPatch};
use crate::db::{Repository, Store};
use crate::routes::crud::Resource;
use crate::validation::{FieldErrors, Fields, Object};

const PHONE_MAX: usize = 20;
const HANDLE_MAX: usize = 200;

fn read_links(f: &mut Fields<'_>) -> SocialLinksPatch {
    SocialLinksPatch {
        phone_number: f.optional_text("phone_number", Some(PHONE_MAX)),
        email: f.email("email"),
        instagram: f.optional_text("instagram", Some(HANDLE_MAX)),
        tiktok: f.optional_text("tiktok", Some(HANDLE_MAX)),
        twitter: f.optional_text("twitter", Some(HANDLE_MAX)),
        website: f.url("website"),
        facebook: f.url("facebook"),
        whatsapp: f.optional_text("whatsapp", Some(HANDLE_MAX)),
    }
}

/// Every link is optional, so a full payload is just a patch over empty links.
pub fn parse_links(body: &Object) -> Result<SocialLinks, FieldErrors> {
    let mut f = Fields::new(body, false);
    let patch = read_links(&mut f);
    f.build(|| {
        let mut links = SocialLinks::default();
        patch.apply(&mut links);
        Some(links)
    })
}

impl Resource for PlaceSocialMedia {
    fn repo(store: &dyn Store) -> &dyn Repository<Self> {
        store.social_media()
    }

    fn parse_new(body: &Object) -> Result<NewPlaceSocialMedia, FieldErrors> {
        let mut f = Fields::new(body, false);
        let place_id = f.pk("place");
        let links = parse_links(body).map_err(|e| f.merge(e)).ok();
        f.build(|| {
            Some(NewPlaceSocialMedia {
                place_id: place_id?,
                links: links?,
            })
        })
    }

    fn parse_patch(body: &Object, partial: bool) -> Result<SocialLinksPatch, FieldErrors> {
        let mut f = Fields::new(body, partial);
        let patch = read_links(&mut f);
        f.build(|| Some(patch))
    }
}
