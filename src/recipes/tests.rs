//! Router-level tests for tags, ingredients and recipes.

use axum::http::{Method, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::app::build_app;
use crate::state::test_support::{fake, png_bytes, send, send_multipart, user_with_token};
use crate::state::AppState;

const TAGS_URL: &str = "/api/recipe/tags";
const INGREDIENTS_URL: &str = "/api/recipe/ingredients";
const RECIPES_URL: &str = "/api/recipe/recipes";

fn detail_url(id: i64) -> String {
    format!("{RECIPES_URL}/{id}")
}

fn image_upload_url(id: i64) -> String {
    format!("{RECIPES_URL}/{id}/upload-image")
}

struct Ctx {
    _media: TempDir,
    media_root: std::path::PathBuf,
    state: AppState,
    app: Router,
    token: String,
}

async fn authed() -> Ctx {
    let media = tempfile::tempdir().unwrap();
    let media_root = media.path().to_path_buf();
    let state = fake(&media_root);
    let app = build_app(state.clone());
    let (_, token) = user_with_token(&state, "test@test.com").await;
    Ctx {
        _media: media,
        media_root,
        state,
        app,
        token,
    }
}

impl Ctx {
    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        send(&self.app, Method::GET, uri, Some(&self.token), None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        send(&self.app, Method::POST, uri, Some(&self.token), Some(body)).await
    }

    async fn other_user_token(&self) -> String {
        user_with_token(&self.state, "other@test.com").await.1
    }

    async fn attribute(&self, uri: &str, name: &str) -> i64 {
        let (status, body) = self.post(uri, json!({ "name": name })).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }

    async fn recipe(&self, title: &str, tags: &[i64], ingredients: &[i64]) -> i64 {
        let payload = json!({
            "title": title,
            "time_minutes": 10,
            "price": "5.00",
            "tags": tags,
            "ingredients": ingredients,
        });
        let (status, body) = self.post(RECIPES_URL, payload).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }
}

fn ids(body: &Value) -> Vec<i64> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|v| v["id"].as_i64().unwrap())
        .collect()
}

fn names(body: &Value) -> Vec<&str> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|v| v["name"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn login_required_everywhere() {
    let ctx = authed().await;
    for uri in [TAGS_URL, INGREDIENTS_URL, RECIPES_URL] {
        let (status, _) = send(&ctx.app, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        let (status, _) = send(&ctx.app, Method::POST, uri, None, Some(json!({}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn retrieve_tags_ordered_by_name_desc() {
    let ctx = authed().await;
    ctx.attribute(TAGS_URL, "Vegan").await;
    ctx.attribute(TAGS_URL, "Dessert").await;

    let (status, body) = ctx.get(TAGS_URL).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&body), vec!["Vegan", "Dessert"]);
    assert!(body[0].get("user_id").is_none());
}

#[tokio::test]
async fn tags_limited_to_user() {
    let ctx = authed().await;
    let other = ctx.other_user_token().await;
    send(&ctx.app, Method::POST, TAGS_URL, Some(&other), Some(json!({ "name": "Fruity" }))).await;
    let mine = ctx.attribute(TAGS_URL, "Comfort Food").await;

    let (status, body) = ctx.get(TAGS_URL).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![mine]);
    assert_eq!(body[0]["name"], "Comfort Food");
}

#[tokio::test]
async fn same_tag_name_allowed_for_different_users() {
    let ctx = authed().await;
    let other = ctx.other_user_token().await;
    ctx.attribute(TAGS_URL, "Vegan").await;
    let (status, _) =
        send(&ctx.app, Method::POST, TAGS_URL, Some(&other), Some(json!({ "name": "Vegan" }))).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn create_tag_successful_and_invalid() {
    let ctx = authed().await;
    let (status, body) = ctx.post(TAGS_URL, json!({ "name": "Test tag" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "Test tag");

    let (status, body) = ctx.post(TAGS_URL, json!({ "name": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["name"].is_array());

    let (_, list) = ctx.get(TAGS_URL).await;
    assert_eq!(names(&list), vec!["Test tag"]);
}

#[tokio::test]
async fn create_ingredient_successful_and_invalid() {
    let ctx = authed().await;
    let (status, body) = ctx.post(INGREDIENTS_URL, json!({ "name": "Cabbage" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "Cabbage");

    let (status, _) = ctx.post(INGREDIENTS_URL, json!({ "name": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, list) = ctx.get(INGREDIENTS_URL).await;
    assert_eq!(names(&list), vec!["Cabbage"]);
}

#[tokio::test]
async fn ingredients_limited_to_user() {
    let ctx = authed().await;
    let other = ctx.other_user_token().await;
    send(&ctx.app, Method::POST, INGREDIENTS_URL, Some(&other), Some(json!({ "name": "Vinegar" })))
        .await;
    ctx.attribute(INGREDIENTS_URL, "Kale").await;
    ctx.attribute(INGREDIENTS_URL, "Salt").await;

    let (status, body) = ctx.get(INGREDIENTS_URL).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&body), vec!["Salt", "Kale"]);
}

#[tokio::test]
async fn assigned_only_filters_and_deduplicates() {
    let ctx = authed().await;
    let breakfast = ctx.attribute(TAGS_URL, "Breakfast").await;
    ctx.attribute(TAGS_URL, "Lunch").await;
    let eggs = ctx.attribute(INGREDIENTS_URL, "Eggs").await;
    ctx.attribute(INGREDIENTS_URL, "Cheese").await;

    ctx.recipe("Pancakes", &[breakfast], &[eggs]).await;
    ctx.recipe("Porridge", &[breakfast], &[eggs]).await;

    let (_, tags) = ctx.get(&format!("{TAGS_URL}?assigned_only=1")).await;
    assert_eq!(ids(&tags), vec![breakfast]);

    let (_, ingredients) = ctx.get(&format!("{INGREDIENTS_URL}?assigned_only=1")).await;
    assert_eq!(ids(&ingredients), vec![eggs]);

    let (_, all) = ctx.get(&format!("{TAGS_URL}?assigned_only=0")).await;
    assert_eq!(all.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn assigned_only_ignores_other_users_recipes() {
    let ctx = authed().await;
    let tag = ctx.attribute(TAGS_URL, "Dinner").await;
    ctx.recipe("Stew", &[tag], &[]).await;

    let other = ctx.other_user_token().await;
    let (_, body) = send(
        &ctx.app,
        Method::GET,
        &format!("{TAGS_URL}?assigned_only=1"),
        Some(&other),
        None,
    )
    .await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn retrieve_recipes_newest_first_and_limited_to_user() {
    let ctx = authed().await;
    let first = ctx.recipe("Sample recipe", &[], &[]).await;
    let second = ctx.recipe("Another recipe", &[], &[]).await;

    let other = ctx.other_user_token().await;
    send(
        &ctx.app,
        Method::POST,
        RECIPES_URL,
        Some(&other),
        Some(json!({ "title": "Theirs", "time_minutes": 5, "price": 1 })),
    )
    .await;

    let (status, body) = ctx.get(RECIPES_URL).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![second, first]);
    assert_eq!(body[0]["price"], "5.00");
    assert_eq!(body[0]["image"], Value::Null);
}

#[tokio::test]
async fn create_basic_recipe() {
    let ctx = authed().await;
    let payload = json!({ "title": "Chocolate cheesecake", "time_minutes": 30, "price": 5.00 });
    let (status, body) = ctx.post(RECIPES_URL, payload).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["title"], "Chocolate cheesecake");
    assert_eq!(body["time_minutes"], 30);
    assert_eq!(body["price"], "5.00");
    assert_eq!(body["tags"], json!([]));
}

#[tokio::test]
async fn create_recipe_requires_title() {
    let ctx = authed().await;
    let (status, body) = ctx
        .post(RECIPES_URL, json!({ "time_minutes": 30, "price": "5.00" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["title"].is_array());

    let (_, list) = ctx.get(RECIPES_URL).await;
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn create_recipe_with_tags_and_ingredients() {
    let ctx = authed().await;
    let vegan = ctx.attribute(TAGS_URL, "Vegan").await;
    let dessert = ctx.attribute(TAGS_URL, "Dessert").await;
    let prawns = ctx.attribute(INGREDIENTS_URL, "Prawns").await;
    let ginger = ctx.attribute(INGREDIENTS_URL, "Ginger").await;

    let id = ctx
        .recipe("Avocado lime cheesecake", &[vegan, dessert], &[prawns, ginger])
        .await;

    let (status, body) = ctx.get(&detail_url(id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body["tags"]), vec![vegan, dessert]);
    assert_eq!(body["tags"][0]["name"], "Vegan");
    assert_eq!(ids(&body["ingredients"]), vec![prawns, ginger]);
}

#[tokio::test]
async fn create_recipe_with_foreign_tag_rejected() {
    let ctx = authed().await;
    let other = ctx.other_user_token().await;
    let (_, foreign) =
        send(&ctx.app, Method::POST, TAGS_URL, Some(&other), Some(json!({ "name": "Theirs" }))).await;
    let foreign = foreign["id"].as_i64().unwrap();

    let payload = json!({ "title": "Soup", "time_minutes": 5, "price": "1.00", "tags": [foreign] });
    let (status, body) = ctx.post(RECIPES_URL, payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["tags"].is_array());

    let (_, list) = ctx.get(RECIPES_URL).await;
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn view_recipe_detail_of_other_user_is_404() {
    let ctx = authed().await;
    let id = ctx.recipe("Private", &[], &[]).await;
    let other = ctx.other_user_token().await;

    let (status, _) = send(&ctx.app, Method::GET, &detail_url(id), Some(&other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = ctx.get(&detail_url(id + 100)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn partial_update_replaces_tags() {
    let ctx = authed().await;
    let spicy = ctx.attribute(TAGS_URL, "Spicy").await;
    let curry = ctx.attribute(TAGS_URL, "Curry").await;
    let id = ctx.recipe("Chicken tikka", &[spicy], &[]).await;

    let (status, body) = send(
        &ctx.app,
        Method::PATCH,
        &detail_url(id),
        Some(&ctx.token),
        Some(json!({ "title": "Chicken tikka masala", "tags": [curry] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Chicken tikka masala");
    assert_eq!(body["tags"], json!([curry]));
    assert_eq!(body["time_minutes"], 10);
}

#[tokio::test]
async fn full_update_clears_omitted_tags() {
    let ctx = authed().await;
    let spicy = ctx.attribute(TAGS_URL, "Spicy").await;
    let id = ctx.recipe("Chicken tikka", &[spicy], &[]).await;

    let payload = json!({ "title": "Spaghetti carbonara", "time_minutes": 25, "price": "5.00" });
    let (status, body) =
        send(&ctx.app, Method::PUT, &detail_url(id), Some(&ctx.token), Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Spaghetti carbonara");
    assert_eq!(body["time_minutes"], 25);
    assert_eq!(body["tags"], json!([]));

    let (status, _) = send(
        &ctx.app,
        Method::PUT,
        &detail_url(id),
        Some(&ctx.token),
        Some(json!({ "title": "Missing fields" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn filter_recipes_by_tags() {
    let ctx = authed().await;
    let vegan = ctx.attribute(TAGS_URL, "Vegan").await;
    let vegetarian = ctx.attribute(TAGS_URL, "Vegetarian").await;
    let curry = ctx.recipe("Thai vegetable curry", &[vegan], &[]).await;
    let tahini = ctx.recipe("Aubergine with tahini", &[vegetarian], &[]).await;
    ctx.recipe("Fish and chips", &[], &[]).await;

    let (status, body) = ctx.get(&format!("{RECIPES_URL}?tags={vegan},{vegetarian}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![tahini, curry]);

    let (_, body) = ctx.get(&format!("{RECIPES_URL}?tags={vegan}")).await;
    assert_eq!(ids(&body), vec![curry]);

    let (status, _) = ctx.get(&format!("{RECIPES_URL}?tags=abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn filter_recipes_by_ingredients() {
    let ctx = authed().await;
    let feta = ctx.attribute(INGREDIENTS_URL, "Feta cheese").await;
    let chicken = ctx.attribute(INGREDIENTS_URL, "Chicken").await;
    let beans = ctx.recipe("Posh beans on toast", &[], &[feta]).await;
    let cacciatore = ctx.recipe("Chicken cacciatore", &[], &[chicken, feta]).await;
    ctx.recipe("Steak and mushrooms", &[], &[]).await;

    let (_, body) = ctx.get(&format!("{RECIPES_URL}?ingredients={feta}")).await;
    assert_eq!(ids(&body), vec![cacciatore, beans]);

    let (_, body) = ctx.get(&format!("{RECIPES_URL}?ingredients={chicken}")).await;
    assert_eq!(ids(&body), vec![cacciatore]);
}

#[tokio::test]
async fn upload_image_to_recipe() {
    let ctx = authed().await;
    let id = ctx.recipe("Sample recipe", &[], &[]).await;

    let (status, body) = send_multipart(
        &ctx.app,
        &image_upload_url(id),
        &ctx.token,
        "image",
        "myimage.png",
        &png_bytes(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let url = body["image"].as_str().unwrap();
    let key = url.strip_prefix("/media/").unwrap();
    assert!(key.starts_with("uploads/recipe/"));
    assert!(key.ends_with(".png"));
    assert!(!key.contains("myimage"));
    assert!(ctx.media_root.join(key).exists());

    let (_, detail) = ctx.get(&detail_url(id)).await;
    assert_eq!(detail["image"], url);
}

#[tokio::test]
async fn replacing_image_removes_previous_file() {
    let ctx = authed().await;
    let id = ctx.recipe("Sample recipe", &[], &[]).await;
    let url = image_upload_url(id);
    let png = png_bytes();

    let (_, first) = send_multipart(&ctx.app, &url, &ctx.token, "image", "a.png", &png).await;
    let (_, second) = send_multipart(&ctx.app, &url, &ctx.token, "image", "a.png", &png).await;
    let first_key = first["image"].as_str().unwrap().trim_start_matches("/media/");
    let second_key = second["image"].as_str().unwrap().trim_start_matches("/media/");
    assert_ne!(first_key, second_key);
    assert!(!ctx.media_root.join(first_key).exists());
    assert!(ctx.media_root.join(second_key).exists());
}

#[tokio::test]
async fn upload_image_bad_request() {
    let ctx = authed().await;
    let id = ctx.recipe("Sample recipe", &[], &[]).await;

    let (status, body) = send_multipart(
        &ctx.app,
        &image_upload_url(id),
        &ctx.token,
        "image",
        "notimage.jpg",
        b"notimage",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["image"].is_array());
    assert!(!ctx.media_root.join("uploads").exists());

    let (_, detail) = ctx.get(&detail_url(id)).await;
    assert_eq!(detail["image"], Value::Null);
}

#[tokio::test]
async fn upload_image_to_missing_recipe_is_404() {
    let ctx = authed().await;
    let (status, _) = send_multipart(
        &ctx.app,
        &image_upload_url(999),
        &ctx.token,
        "image",
        "a.png",
        &png_bytes(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_recipe_removes_it_and_its_image() {
    let ctx = authed().await;
    let id = ctx.recipe("Short lived", &[], &[]).await;
    let (_, body) =
        send_multipart(&ctx.app, &image_upload_url(id), &ctx.token, "image", "a.png", &png_bytes())
            .await;
    let key = body["image"].as_str().unwrap().trim_start_matches("/media/").to_string();

    let other = ctx.other_user_token().await;
    let (status, _) = send(&ctx.app, Method::DELETE, &detail_url(id), Some(&other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&ctx.app, Method::DELETE, &detail_url(id), Some(&ctx.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!ctx.media_root.join(&key).exists());

    let (status, _) = ctx.get(&detail_url(id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn tag_names_order_case_sensitively() {
    let ctx = authed().await;
    ctx.attribute(TAGS_URL, "Banana").await;
    ctx.attribute(TAGS_URL, "apple").await;

    let (_, body) = ctx.get(TAGS_URL).await;
    assert_eq!(names(&body), vec!["apple", "Banana"]);
}

#[tokio::test]
async fn repeated_filter_params_are_merged() {
    let ctx = authed().await;
    let vegan = ctx.attribute(TAGS_URL, "Vegan").await;
    let spicy = ctx.attribute(TAGS_URL, "Spicy").await;
    let curry = ctx.recipe("Curry", &[vegan], &[]).await;
    let chilli = ctx.recipe("Chilli", &[spicy], &[]).await;
    ctx.recipe("Plain rice", &[], &[]).await;

    let (status, body) = ctx.get(&format!("{RECIPES_URL}?tags={vegan}&tags={spicy}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![chilli, curry]);
}

#[tokio::test]
async fn bad_query_string_is_a_json_400() {
    let ctx = authed().await;
    let (status, body) = ctx
        .get(&format!("{TAGS_URL}?assigned_only=1&assigned_only=0"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["non_field_errors"].is_array());

    let (status, body) = ctx.get(&format!("{RECIPES_URL}?ingredients=x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["ingredients"].is_array());
}

#[tokio::test]
async fn non_numeric_recipe_id_is_404() {
    let ctx = authed().await;
    let (status, body) = ctx.get(&format!("{RECIPES_URL}/abc")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "detail": "Not found." }));

    let (status, _) = send(
        &ctx.app,
        Method::PATCH,
        &format!("{RECIPES_URL}/abc"),
        Some(&ctx.token),
        Some(json!({ "title": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_multipart(
        &ctx.app,
        &format!("{RECIPES_URL}/abc/upload-image"),
        &ctx.token,
        "image",
        "a.png",
        &png_bytes(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&ctx.app, Method::GET, &format!("{RECIPES_URL}/abc"), None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
