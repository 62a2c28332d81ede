mod common;

use axum::{body::Body, http::StatusCode};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use common::TestApp;

fn tea() -> Value {
    json!({
        "name": "Tea",
        "ingredients": ["water", "tea leaves"],
        "instructions": ["boil", "steep"]
    })
}

fn timestamp(value: &Value) -> DateTime<Utc> {
    value.as_str().unwrap().parse().unwrap()
}

async fn create(app: &TestApp, body: Value) -> Value {
    let (status, recipe) = app.request("POST", "/api/recipes", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    recipe
}

#[tokio::test]
async fn test_create_get_delete_round_trip() {
    let app = TestApp::new().await;

    let created = create(&app, tea()).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["ingredients"].as_array().unwrap().len(), 2);
    assert_eq!(created["createdAt"], created["updatedAt"]);
    assert_eq!(created["tags"], json!([]));
    assert_eq!(created["prepTime"], Value::Null);

    let (status, fetched) = app.request("GET", &format!("/api/recipes/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, _) = app
        .request("DELETE", &format!("/api/recipes/{}", id), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.request("GET", &format!("/api/recipes/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Recipe not found");

    let (_, listing) = app.request("GET", "/api/recipes", None).await;
    assert_eq!(listing["total"], 0);
}

#[tokio::test]
async fn test_create_requires_name_and_lists() {
    let app = TestApp::new().await;

    for body in [
        json!({ "ingredients": [], "instructions": [] }),
        json!({ "name": "  ", "ingredients": [], "instructions": [] }),
        json!({ "name": "Soup", "ingredients": [] }),
        json!({ "name": "Salt", "instructions": [] }),
    ] {
        let (status, error) = app.request("POST", "/api/recipes", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            error["error"],
            "name, ingredients (array), and instructions (array) are required"
        );
    }

    let (_, listing) = app.request("GET", "/api/recipes", None).await;
    assert_eq!(listing["total"], 0);
}

#[tokio::test]
async fn test_create_rejects_wrongly_shaped_lists() {
    let app = TestApp::new().await;

    let (status, _) = app
        .request(
            "POST",
            "/api/recipes",
            Some(json!({ "name": "Soup", "ingredients": "carrots", "instructions": [] })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_rejects_invalid_servings() {
    let app = TestApp::new().await;
    let mut body = tea();
    body["servings"] = json!(0);

    let (status, error) = app.request("POST", "/api/recipes", Some(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error["error"].as_str().unwrap().contains("servings"));
}

#[tokio::test]
async fn test_malformed_json_body_is_bad_request() {
    let app = TestApp::new().await;

    let (status, _) = app
        .request_text("POST", "/api/recipes", Body::from("{not json"))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_pages_newest_first() {
    let app = TestApp::new().await;
    for name in ["First", "Second", "Third"] {
        let mut body = tea();
        body["name"] = json!(name);
        create(&app, body).await;
    }

    let (status, page) = app.request("GET", "/api/recipes?limit=2&offset=0", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 3);
    assert_eq!(page["limit"], 2);
    assert_eq!(page["offset"], 0);
    let names: Vec<_> = page["recipes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Third", "Second"]);
}

#[tokio::test]
async fn test_list_normalizes_bad_paging_values() {
    let app = TestApp::new().await;

    let (status, page) = app
        .request("GET", "/api/recipes?limit=abc&offset=-4", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["limit"], 50);
    assert_eq!(page["offset"], 0);

    let (_, page) = app.request("GET", "/api/recipes?limit=1000", None).await;
    assert_eq!(page["limit"], 100);
}

#[tokio::test]
async fn test_query_param_switches_to_search() {
    let app = TestApp::new().await;
    let mut pasta = tea();
    pasta["name"] = json!("Weeknight Pasta");
    create(&app, pasta).await;
    create(&app, tea()).await;

    let (status, results) = app.request("GET", "/api/recipes?q=PASTA", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(results["total"], 1);
    assert_eq!(results["recipes"][0]["name"], "Weeknight Pasta");
    assert!(results.get("limit").is_none());
}

#[tokio::test]
async fn test_empty_query_param_lists_instead_of_searching() {
    let app = TestApp::new().await;
    for _ in 0..35 {
        create(&app, tea()).await;
    }

    let (status, page) = app.request("GET", "/api/recipes?q=", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 35);
    assert_eq!(page["limit"], 50);
    assert_eq!(page["offset"], 0);
    assert_eq!(page["recipes"].as_array().unwrap().len(), 35);
}

#[tokio::test]
async fn test_update_merges_fields() {
    let app = TestApp::new().await;
    let created = create(&app, tea()).await;
    let uri = format!("/api/recipes/{}", created["id"].as_str().unwrap());

    let (status, updated) = app
        .request("PUT", &uri, Some(json!({ "cuisine": "Chinese", "tags": ["hot", "hot"] })))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["cuisine"], "Chinese");
    assert_eq!(updated["tags"], json!(["hot"]));
    assert_eq!(updated["name"], "Tea");
    assert_eq!(updated["ingredients"], created["ingredients"]);
    assert_eq!(updated["createdAt"], created["createdAt"]);
    assert!(timestamp(&updated["updatedAt"]) >= timestamp(&created["updatedAt"]));
}

#[tokio::test]
async fn test_update_and_delete_missing_recipe() {
    let app = TestApp::new().await;

    let (status, _) = app
        .request("PUT", "/api/recipes/missing", Some(json!({ "name": "X" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.request("DELETE", "/api/recipes/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_and_service_info() {
    let app = TestApp::new().await;

    let (status, health) = app.request("GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["database"]["status"], "connected");

    let (status, info) = app.request("GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["endpoints"]["mcp"]["sse"], "GET /sse");
    assert_eq!(info["tools"].as_array().unwrap().len(), 6);
}
