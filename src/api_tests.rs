//! Request-level tests of the whole router against the in-memory store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Duration;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::auth::issue_access_token;
use crate::config::AppConfig;
use crate::db::MemoryStore;
use crate::{create_app, AppState};

struct TestApp {
    router: Router,
    token: String,
}

impl TestApp {
    fn new() -> Self {
        let config = AppConfig::for_tests();
        let token =
            issue_access_token(&config.jwt_secret, "tester", "staff", Duration::minutes(5)).unwrap();
        let state = AppState::new(Arc::new(MemoryStore::new()), config).unwrap();
        Self {
            router: create_app(state),
            token,
        }
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        auth: bool,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if auth {
            req = req.header("authorization", format!("Bearer {}", self.token));
        }
        let req = match body {
            Some(body) => req
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn admin(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(method, uri, body, true).await
    }

    async fn public(&self, uri: &str) -> (StatusCode, Value) {
        self.send("GET", uri, None, false).await
    }

    async fn create(&self, uri: &str, body: Value) -> Value {
        let (status, json) = self.admin("POST", uri, Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json["data"].clone()
    }
}

#[tokio::test]
async fn test_admin_requires_token() {
    let app = TestApp::new();
    let (status, body) = app.send("GET", "/api/admin/categories/", None, false).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Authentication credentials were not provided.");

    let req = Request::get("/api/admin/categories/")
        .header("authorization", "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let res = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_kigali_club_minimal_create() {
    let app = TestApp::new();
    let (status, body) = app
        .admin("POST", "/api/admin/place/add/", Some(json!({"name": "Kigali Club"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["detail"], "Place created successfully.");
    assert_eq!(body["data"]["slug"], "kigali-club");
    assert_eq!(body["data"]["category"], Value::Null);
    assert_eq!(body["data"]["tags"], json!([]));
    assert_eq!(body["data"]["views"], 0);
}

#[tokio::test]
async fn test_category_create_then_retrieve() {
    let app = TestApp::new();
    let created = app
        .create(
            "/api/admin/category/add/",
            json!({"name": "Restaurants", "description": "Places to eat", "image": "categories/r.png"}),
        )
        .await;
    assert_eq!(created["slug"], "restaurants");

    let id = created["id"].as_i64().unwrap();
    let (status, body) = app.admin("GET", &format!("/api/admin/category/{id}/"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["detail"], "Successfully retrieved category details.");
    assert_eq!(body["data"], created);

    let (status, body) = app.public("/api/categories/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["detail"], "Successfully retrieved 1 categories.");
}

#[tokio::test]
async fn test_invalid_create_reports_errors() {
    let app = TestApp::new();
    let (status, body) = app
        .admin("POST", "/api/admin/category/add/", Some(json!({"name": ""})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Failed to create category. Please review the input data.");
    assert_eq!(body["errors"]["name"][0], "This field may not be blank.");
    assert_eq!(body["errors"]["description"][0], "This field is required.");

    let (_, body) = app.public("/api/categories/").await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_malformed_body_is_non_field_error() {
    let app = TestApp::new();
    let req = Request::post("/api/admin/tag/add/")
        .header("authorization", format!("Bearer {}", app.token))
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let res = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["errors"]["non_field_errors"].is_array());
}

#[tokio::test]
async fn test_missing_ids_are_404() {
    let app = TestApp::new();
    let (status, body) = app.admin("GET", "/api/admin/tag/99/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["detail"],
        "Tag with id 99 not found. Please verify the provided identifier."
    );

    let (status, body) = app
        .admin("PATCH", "/api/admin/tag/99/edit/", Some(json!({"name": "x"})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Tag with id 99 not found for update.");

    let (status, body) = app.admin("DELETE", "/api/admin/menu/99/delete/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "PlaceMenu with id 99 not found. Deletion aborted.");
}

#[tokio::test]
async fn test_patch_views_changes_only_views() {
    let app = TestApp::new();
    let place = app
        .create(
            "/api/admin/place/add/",
            json!({"name": "Heaven", "district": "Kiyovu", "latitude": -1.95}),
        )
        .await;
    let id = place["id"].as_i64().unwrap();

    let (status, body) = app
        .admin("PATCH", &format!("/api/admin/place/{id}/edit/"), Some(json!({"views": 42})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["detail"], "Place updated successfully.");
    let updated = &body["data"];
    assert_eq!(updated["views"], 42);
    for field in ["name", "slug", "district", "latitude", "category", "tags", "menu"] {
        assert_eq!(updated[field], place[field], "{field} changed");
    }
}

#[tokio::test]
async fn test_put_requires_full_payload() {
    let app = TestApp::new();
    let tag = app.create("/api/admin/tag/add/", json!({"name": "Rooftop"})).await;
    let id = tag["id"].as_i64().unwrap();

    let (status, body) = app
        .admin("PUT", &format!("/api/admin/tag/{id}/edit/"), Some(json!({"slug": "roof"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Failed to update tag. Please review the errors.");
    assert_eq!(body["errors"]["name"][0], "This field is required.");
}

#[tokio::test]
async fn test_place_aggregate_roundtrip() {
    let app = TestApp::new();
    let category = app
        .create(
            "/api/admin/category/add/",
            json!({"name": "Bars", "description": "Drinks"}),
        )
        .await;
    let tag = app.create("/api/admin/tag/add/", json!({"name": "Live Music"})).await;

    let place = app
        .create(
            "/api/admin/place/add/",
            json!({
                "name": "Pili Pili",
                "category": category["id"],
                "tags": [tag["id"]],
                "images": [{"image": "places/pili.jpg", "caption": "Terrace"}],
                "social_media": {"instagram": "@pilipili", "website": "https://pilipili.rw"},
                "menu": [
                    {"name": "Pizza", "price": "9000"},
                    {"name": "Brochette", "price": 3500.5}
                ]
            }),
        )
        .await;

    assert_eq!(place["category"]["name"], "Bars");
    assert_eq!(place["tags"][0]["slug"], "live-music");
    assert_eq!(place["images"][0]["caption"], "Terrace");
    assert_eq!(place["social_media"]["instagram"], "@pilipili");
    assert_eq!(place["menu"][0]["name"], "Brochette");
    assert_eq!(place["menu"][0]["price"], "3500.50");
    assert_eq!(place["menu"][1]["price"], "9000.00");

    let id = place["id"].as_i64().unwrap();
    let (status, body) = app.public(&format!("/api/place/{id}/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], place);
}

#[tokio::test]
async fn test_unknown_category_is_rejected() {
    let app = TestApp::new();
    let (status, body) = app
        .admin(
            "POST",
            "/api/admin/place/add/",
            Some(json!({"name": "Ghost", "category": 404, "tags": [1, 2]})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"]["category"][0],
        "Invalid pk \"404\" - object does not exist."
    );
    assert_eq!(body["errors"]["tags"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_identical_names_get_distinct_slugs() {
    let app = TestApp::new();
    let first = app.create("/api/admin/place/add/", json!({"name": "Inka Steakhouse"})).await;
    let second = app.create("/api/admin/place/add/", json!({"name": "Inka Steakhouse"})).await;
    assert_ne!(first["slug"], second["slug"]);
    assert_eq!(second["slug"], "inka-steakhouse-2");
}

#[tokio::test]
async fn test_nested_resources_under_place() {
    let app = TestApp::new();
    let place = app.create("/api/admin/place/add/", json!({"name": "Repub"})).await;
    let id = place["id"].as_i64().unwrap();

    let item = app
        .create(
            &format!("/api/admin/place/{id}/menu/add/"),
            json!({"name": "Isombe", "price": "2500", "place": 999}),
        )
        .await;
    assert_eq!(item["place"], id);

    let (status, body) = app.admin("GET", &format!("/api/admin/place/{id}/menu/"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["detail"],
        format!("Successfully retrieved 1 menu items for Place id {id}.")
    );

    // the owning place cannot be changed
    let item_id = item["id"].as_i64().unwrap();
    let (status, body) = app
        .admin(
            "PATCH",
            &format!("/api/admin/menu/{item_id}/edit/"),
            Some(json!({"place": 12345, "price": "3000"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["place"], id);
    assert_eq!(body["data"]["price"], "3000.00");

    app.create(
        &format!("/api/admin/places/{id}/social/add/"),
        json!({"whatsapp": "+250788000000"}),
    )
    .await;
    let (status, body) = app
        .admin(
            "POST",
            &format!("/api/admin/places/{id}/social/add/"),
            Some(json!({"twitter": "@repub"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["place"].is_array());
}

#[tokio::test]
async fn test_nested_create_for_unknown_place() {
    let app = TestApp::new();
    let (status, body) = app
        .admin(
            "POST",
            "/api/admin/place/77/images/add/",
            Some(json!({"image": "places/x.jpg"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"]["place"][0], "Invalid pk \"77\" - object does not exist.");

    let (status, body) = app.admin("GET", "/api/admin/place/77/images/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_delete_place_cascades_and_404s() {
    let app = TestApp::new();
    let place = app
        .create(
            "/api/admin/place/add/",
            json!({"name": "Sundowner", "menu": [{"name": "Fanta", "price": 1000}]}),
        )
        .await;
    let id = place["id"].as_i64().unwrap();
    let image = app
        .create(
            &format!("/api/admin/place/{id}/images/add/"),
            json!({"image": "places/s.jpg"}),
        )
        .await;

    let (status, body) = app.admin("DELETE", &format!("/api/admin/place/{id}/delete/"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, body) = app.public(&format!("/api/place/{id}/")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().unwrap().contains(&id.to_string()));

    let image_id = image["id"].as_i64().unwrap();
    let (status, _) = app.admin("GET", &format!("/api/admin/images/{image_id}/"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = app.admin("GET", &format!("/api/admin/place/{id}/menu/"), None).await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_delete_category_nulls_place_category() {
    let app = TestApp::new();
    let category = app
        .create(
            "/api/admin/category/add/",
            json!({"name": "Cafes", "description": "Coffee"}),
        )
        .await;
    let cat_id = category["id"].as_i64().unwrap();
    let place = app
        .create(
            "/api/admin/place/add/",
            json!({"name": "Question Coffee", "category": cat_id}),
        )
        .await;

    let (status, _) = app
        .admin("DELETE", &format!("/api/admin/category/{cat_id}/delete/"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let id = place["id"].as_i64().unwrap();
    let (_, body) = app.public(&format!("/api/place/{id}/")).await;
    assert_eq!(body["data"]["category"], Value::Null);
}

#[tokio::test]
async fn test_public_routes_are_read_only() {
    let app = TestApp::new();
    let (status, body) = app.public("/api/places/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["detail"], "Successfully retrieved 0 places with detailed info.");

    let (status, _) = app
        .send("POST", "/api/places/", Some(json!({"name": "Nope"})), false)
        .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_create_then_retrieve_every_nested_entity() {
    let app = TestApp::new();
    let place = app.create("/api/admin/place/add/", json!({"name": "Meze Fresh"})).await;
    let id = place["id"].as_i64().unwrap();

    let created = [
        (
            app.create("/api/admin/tag/add/", json!({"name": "Vegan", "slug": "plant_based"}))
                .await,
            "tag",
        ),
        (
            app.create(
                &format!("/api/admin/place/{id}/images/add/"),
                json!({"image": "places/meze.png", "caption": "Counter"}),
            )
            .await,
            "images",
        ),
        (
            app.create(
                &format!("/api/admin/places/{id}/social/add/"),
                json!({"email": "hello@meze.rw", "website": "https://meze.rw"}),
            )
            .await,
            "social",
        ),
        (
            app.create(
                &format!("/api/admin/place/{id}/menu/add/"),
                json!({"name": "Burrito", "description": "Beef", "price": "7500.5"}),
            )
            .await,
            "menu",
        ),
    ];

    for (item, path) in created {
        let item_id = item["id"].as_i64().unwrap();
        let (status, body) = app.admin("GET", &format!("/api/admin/{path}/{item_id}/"), None).await;
        assert_eq!(status, StatusCode::OK, "{path}");
        assert_eq!(body["data"], item, "{path}");
    }
}

#[tokio::test]
async fn test_public_place_details_message() {
    let app = TestApp::new();
    let place = app.create("/api/admin/place/add/", json!({"name": "Car Wash"})).await;
    let id = place["id"].as_i64().unwrap();

    let (status, body) = app.public(&format!("/api/place/{id}/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["detail"],
        "Successfully retrieved comprehensive details for the selected Place."
    );

    let (_, body) = app.public("/api/places/").await;
    assert_eq!(body["detail"], "Successfully retrieved 1 places with detailed info.");
}

#[tokio::test]
async fn test_non_finite_coordinates_are_rejected() {
    let app = TestApp::new();
    let (status, body) = app
        .admin(
            "POST",
            "/api/admin/place/add/",
            Some(json!({"name": "Nan Place", "latitude": "NaN", "longitude": "nan"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"]["latitude"][0], "A valid number is required.");
    assert_eq!(body["errors"]["longitude"][0], "A valid number is required.");

    let (_, body) = app.public("/api/places/").await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_out_of_range_ids_are_not_found() {
    let app = TestApp::new();
    let huge = "99999999999999999999";

    let (status, body) = app.public(&format!("/api/place/{huge}/")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["detail"],
        format!("Place with id {huge} not found. Please verify the provided identifier.")
    );

    let (status, body) = app
        .admin("PATCH", &format!("/api/admin/tag/{huge}/edit/"), Some(json!({"name": "x"})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], format!("Tag with id {huge} not found for update."));

    let (status, body) = app
        .admin("DELETE", &format!("/api/admin/category/{huge}/delete/"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["detail"],
        format!("Category with id {huge} not found. Deletion aborted.")
    );

    let (status, body) = app.admin("GET", &format!("/api/admin/place/{huge}/menu/"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));

    let (status, body) = app
        .admin(
            "POST",
            &format!("/api/admin/place/{huge}/images/add/"),
            Some(json!({"image": "places/x.jpg"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"]["place"][0],
        format!("Invalid pk \"{huge}\" - object does not exist.")
    );
}
