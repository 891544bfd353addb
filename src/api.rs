use std::{convert::Infallible, sync::Arc};

use warp::{fs::File, Filter, Reply};

use crate::state::Context;

mod catalog;
mod recipes;
mod reply;
mod users;

pub use reply::handle_rejection;

/// Every endpoint of the service plus the media files, with rejections
/// rendered as JSON errors.
pub fn routes(
    context: Arc<Context>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let media = warp::path("media")
        .and(warp::get())
        .and(warp::fs::dir(context.images.root().to_owned()))
        .map(|file: File| file.into_response());

    users::routes(context.clone())
        .or(recipes::routes(context.clone()))
        .unify()
        .or(catalog::routes(context))
        .unify()
        .or(media)
        .unify()
        .recover(handle_rejection)
        .unify()
        .with(warp::log("foodgram::api"))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use warp::http::StatusCode;

    use super::*;
    use crate::{
        actions::recipes::tests::seed_catalog, images::ImageStore, jwt::SessionKeys,
        memory::MemoryStore,
    };

    const IMAGE: &str = "data:image/png;base64,aGVsbG8=";

    fn context(dir: &TempDir) -> Arc<Context> {
        Arc::new(Context::new(
            Arc::new(MemoryStore::new()),
            SessionKeys::new(b"secret", Duration::hours(1)).unwrap(),
            ImageStore::new(dir.path(), "/media/"),
        ))
    }

    fn body(response: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    async fn register(name: &str, context: &Arc<Context>) -> (i64, String) {
        let api = routes(context.clone());

        let response = warp::test::request()
            .method("POST")
            .path("/api/users/")
            .json(&json!({
                "email": format!("{name}@example.com"),
                "username": name,
                "first_name": "First",
                "last_name": "Last",
                "password": "password",
            }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = body(&response)["id"].as_i64().unwrap();

        let response = warp::test::request()
            .method("POST")
            .path("/api/auth/token/login/")
            .json(&json!({ "email": format!("{name}@example.com"), "password": "password" }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let token = body(&response)["auth_token"].as_str().unwrap().to_string();

        (id, format!("Token {token}"))
    }

    #[tokio::test]
    async fn test_accounts() {
        let dir = TempDir::new().unwrap();
        let context = context(&dir);
        let api = routes(context.clone());
        let (alice_id, alice) = register("alice", &context).await;

        let response = warp::test::request()
            .path("/api/users/me/")
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = warp::test::request()
            .path("/api/users/me/")
            .header("authorization", &alice)
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response)["id"].as_i64(), Some(alice_id));
        assert!(body(&response).get("password").is_none());

        let response = warp::test::request()
            .method("POST")
            .path("/api/users/")
            .json(&json!({
                "email": "alice@example.com",
                "username": "alice2",
                "first_name": "First",
                "last_name": "Last",
                "password": "password",
            }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = warp::test::request()
            .path("/api/users/?limit=1")
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response)["count"], json!(1));
        assert_eq!(body(&response)["next"], Value::Null);

        for path in [
            "/api/users/?page=9223372036854775807&limit=100",
            "/api/recipes/?page=9223372036854775807&limit=100",
        ] {
            let response = warp::test::request()
                .path(path)
                .header("authorization", &alice)
                .reply(&api)
                .await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
            assert_eq!(body(&response), json!({ "errors": "Invalid page" }));
        }

        let response = warp::test::request()
            .path("/api/users/999/")
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_recipe_lifecycle() {
        let dir = TempDir::new().unwrap();
        let context = context(&dir);
        let api = routes(context.clone());
        let (_, alice) = register("alice", &context).await;
        let (_, bob) = register("bob", &context).await;
        let (tag, salt, water) = seed_catalog(context.store()).await;

        let recipe = json!({
            "name": "Soup",
            "text": "Boil",
            "cooking_time": 10,
            "image": IMAGE,
            "tags": [tag],
            "ingredients": [{ "id": salt, "amount": 1 }, { "id": water, "amount": 500 }],
        });
        let response = warp::test::request()
            .method("POST")
            .path("/api/recipes/")
            .header("authorization", &alice)
            .json(&recipe)
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body(&response);
        let id = created["id"].as_i64().unwrap();
        assert_eq!(created["ingredients"].as_array().unwrap().len(), 2);
        assert_eq!(created["author"]["username"], json!("alice"));
        assert_eq!(created["is_favorited"], json!(false));
        assert!(created["image"].as_str().unwrap().starts_with("/media/recipes/"));

        // The stored image is served under /media/
        let image_path = created["image"].as_str().unwrap().to_string();
        let response = warp::test::request().path(&image_path).reply(&api).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_ref(), b"hello");

        let response = warp::test::request()
            .method("PATCH")
            .path(&format!("/api/recipes/{id}/"))
            .header("authorization", &bob)
            .json(&json!({ "cooking_time": 0 }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = warp::test::request()
            .method("PATCH")
            .path(&format!("/api/recipes/{id}/"))
            .header("authorization", &alice)
            .json(&json!({ "cooking_time": 0 }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body(&response)["cooking_time"].is_array());

        let response = warp::test::request()
            .method("PATCH")
            .path(&format!("/api/recipes/{id}/"))
            .header("authorization", &alice)
            .json(&json!({ "ingredients": [{ "id": salt, "amount": 2 }] }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body(&response)["ingredients"],
            json!([{ "id": salt, "name": "salt", "measurement_unit": "g", "amount": 2 }])
        );

        let response = warp::test::request()
            .path("/api/recipes/?tags=lunch")
            .header("authorization", &bob)
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response)["count"], json!(1));

        let response = warp::test::request()
            .method("DELETE")
            .path(&format!("/api/recipes/{id}/"))
            .header("authorization", &bob)
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = warp::test::request()
            .method("DELETE")
            .path(&format!("/api/recipes/{id}/"))
            .header("authorization", &alice)
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = warp::test::request()
            .path(&format!("/api/recipes/{id}/"))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_collections_and_download() {
        let dir = TempDir::new().unwrap();
        let context = context(&dir);
        let api = routes(context.clone());
        let (alice_id, alice) = register("alice", &context).await;
        let (_, bob) = register("bob", &context).await;
        let (tag, salt, _) = seed_catalog(context.store()).await;

        let response = warp::test::request()
            .method("POST")
            .path("/api/recipes/")
            .header("authorization", &alice)
            .json(&json!({
                "name": "Soup",
                "text": "Boil",
                "cooking_time": 10,
                "image": IMAGE,
                "tags": [tag],
                "ingredients": [{ "id": salt, "amount": 3 }],
            }))
            .reply(&api)
            .await;
        let id = body(&response)["id"].as_i64().unwrap();

        for (segment, statuses) in [
            ("favorite", [StatusCode::CREATED, StatusCode::CONFLICT]),
            ("shopping_cart", [StatusCode::CREATED, StatusCode::CONFLICT]),
        ] {
            for status in statuses {
                let response = warp::test::request()
                    .method("POST")
                    .path(&format!("/api/recipes/{id}/{segment}/"))
                    .header("authorization", &bob)
                    .reply(&api)
                    .await;
                assert_eq!(response.status(), status);
            }
        }

        let response = warp::test::request()
            .path(&format!("/api/recipes/{id}/"))
            .header("authorization", &bob)
            .reply(&api)
            .await;
        assert_eq!(body(&response)["is_favorited"], json!(true));
        assert_eq!(body(&response)["is_in_shopping_cart"], json!(true));

        let response = warp::test::request()
            .path("/api/recipes/download_shopping_cart/")
            .header("authorization", &bob)
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()["content-disposition"].to_str().unwrap();
        assert!(disposition.contains("shopping_list_"));
        let content = String::from_utf8(response.body().to_vec()).unwrap();
        assert!(content.contains("1. salt - 3 g"));

        let response = warp::test::request()
            .method("DELETE")
            .path(&format!("/api/recipes/{id}/favorite/"))
            .header("authorization", &bob)
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = warp::test::request()
            .method("DELETE")
            .path(&format!("/api/recipes/{id}/favorite/"))
            .header("authorization", &bob)
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = warp::test::request()
            .method("POST")
            .path(&format!("/api/users/{alice_id}/subscribe/?recipes_limit=1"))
            .header("authorization", &bob)
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let subscription = body(&response);
        assert_eq!(subscription["recipes_count"], json!(1));
        assert_eq!(subscription["is_subscribed"], json!(true));

        let response = warp::test::request()
            .path("/api/users/subscriptions/")
            .header("authorization", &bob)
            .reply(&api)
            .await;
        assert_eq!(body(&response)["count"], json!(1));

        let response = warp::test::request()
            .method("POST")
            .path(&format!("/api/users/{alice_id}/subscribe/"))
            .header("authorization", &alice)
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_catalog() {
        let dir = TempDir::new().unwrap();
        let context = context(&dir);
        let api = routes(context.clone());
        let (tag, salt, _) = seed_catalog(context.store()).await;

        let response = warp::test::request().path("/api/tags/").reply(&api).await;
        assert_eq!(body(&response).as_array().unwrap().len(), 1);

        let response = warp::test::request()
            .path(&format!("/api/tags/{tag}/"))
            .reply(&api)
            .await;
        assert_eq!(body(&response)["slug"], json!("lunch"));

        let response = warp::test::request()
            .path("/api/ingredients/?name=SA")
            .reply(&api)
            .await;
        assert_eq!(
            body(&response),
            json!([{ "id": salt, "name": "salt", "measurement_unit": "g" }])
        );

        let response = warp::test::request()
            .method("POST")
            .path("/api/tags/")
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let response = warp::test::request().path("/api/nothing/").reply(&api).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
