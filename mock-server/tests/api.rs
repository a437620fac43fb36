use axum::http::{self, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mock_server::{app, API_TOKEN};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

fn post(uri: &str, token: &str, body: Value) -> Request<String> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .header(http::header::AUTHORIZATION, token)
        .body(body.to_string())
        .unwrap()
}

async fn call(app: &Router, request: Request<String>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(request).await.unwrap();
    let status = resp.status();
    (status, body_json(resp).await)
}

// --- reads ---

#[tokio::test]
async fn package_list_starts_empty() {
    let app = app();
    let (status, body) = call(&app, get("/api/3/action/package_list")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["result"], json!([]));
}

#[tokio::test]
async fn package_show_unknown_is_error_envelope() {
    let app = app();
    let (status, body) = call(&app, get("/api/3/action/package_show?id=nope")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["__type"], "Not Found Error");
}

#[tokio::test]
async fn unknown_action_is_bad_request() {
    let app = app();
    let (status, body) = call(&app, get("/api/3/action/frobnicate")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn license_list_is_served() {
    let app = app();
    let (_, body) = call(&app, get("/api/3/action/license_list")).await;
    assert_eq!(body["result"][0]["id"], "cc-by");
}

// --- writes ---

#[tokio::test]
async fn write_without_token_is_forbidden() {
    let app = app();
    let (status, body) = call(
        &app,
        post("/api/3/action/package_create", "", json!({"name": "lakes"})),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["__type"], "Authorization Error");
}

#[tokio::test]
async fn package_create_assigns_id_and_rejects_duplicates() {
    let app = app();
    let (status, body) = call(
        &app,
        post("/api/3/action/package_create", API_TOKEN, json!({"name": "lakes", "holder": "PAT"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["result"]["id"].as_str().is_some());
    assert_eq!(body["result"]["holder"], "PAT");

    let (status, body) = call(
        &app,
        post("/api/3/action/package_create", API_TOKEN, json!({"name": "lakes"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (_, body) = call(&app, get("/api/3/action/package_list?limit=1&offset=0")).await;
    assert_eq!(body["result"], json!(["lakes"]));
}

#[tokio::test]
async fn package_update_replaces_the_whole_record() {
    let app = app();
    let (_, created) = call(
        &app,
        post(
            "/api/3/action/package_create",
            API_TOKEN,
            json!({"name": "lakes", "holder": "PAT", "extras": [{"key": "a", "value": "1"}]}),
        ),
    )
    .await;
    let id = created["result"]["id"].as_str().unwrap().to_string();

    let (status, updated) = call(
        &app,
        post("/api/3/action/package_update", API_TOKEN, json!({"id": id, "name": "lakes", "title": "Lakes"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["result"]["id"], id.as_str());
    assert_eq!(updated["result"]["title"], "Lakes");
    assert!(updated["result"].get("holder").is_none());
    assert!(updated["result"].get("extras").is_none());
    assert_eq!(updated["result"]["metadata_created"], created["result"]["metadata_created"]);
}

#[tokio::test]
async fn resources_are_nested_without_package_id() {
    let app = app();
    let (_, created) = call(
        &app,
        post("/api/3/action/package_create", API_TOKEN, json!({"name": "lakes"})),
    )
    .await;
    let dataset_id = created["result"]["id"].as_str().unwrap().to_string();

    let (status, resource) = call(
        &app,
        post(
            "/api/3/action/resource_create",
            API_TOKEN,
            json!({"package_id": dataset_id, "name": "csv", "url": "http://x/a.csv"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resource["result"]["package_id"], dataset_id.as_str());
    let resource_id = resource["result"]["id"].as_str().unwrap().to_string();

    let (_, shown) = call(&app, get(&format!("/api/3/action/resource_show?id={resource_id}"))).await;
    assert_eq!(shown["result"]["name"], "csv");
    assert_eq!(shown["result"]["package_id"], dataset_id.as_str());

    let (_, dataset) = call(&app, get("/api/3/action/package_show?id=lakes")).await;
    let nested = &dataset["result"]["resources"][0];
    assert_eq!(nested["id"], resource_id.as_str());
    assert!(nested.get("package_id").is_none());
}

#[tokio::test]
async fn resource_update_replaces_custom_fields() {
    let app = app();
    let (_, created) = call(
        &app,
        post(
            "/api/3/action/package_create",
            API_TOKEN,
            json!({"name": "lakes", "resources": [{"name": "csv", "k": "v"}]}),
        ),
    )
    .await;
    let resource_id = created["result"]["resources"][0]["id"].as_str().unwrap().to_string();

    let (status, updated) = call(
        &app,
        post("/api/3/action/resource_update", API_TOKEN, json!({"id": resource_id, "name": "csv2"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["result"]["name"], "csv2");
    assert!(updated["result"].get("k").is_none());
}

#[tokio::test]
async fn package_search_matches_text_and_counts() {
    let app = app();
    for (name, title) in [("lakes", "Alpine lakes"), ("rivers", "Rivers"), ("ponds", "Lakes and ponds")] {
        call(
            &app,
            post("/api/3/action/package_create", API_TOKEN, json!({"name": name, "title": title})),
        )
        .await;
    }

    let (_, body) = call(&app, get("/api/3/action/package_search?q=lakes&rows=1&start=0")).await;
    assert_eq!(body["result"]["count"], 2);
    assert_eq!(body["result"]["results"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn organization_create_and_list() {
    let app = app();
    let (status, _) = call(
        &app,
        post("/api/3/action/organization_create", API_TOKEN, json!({"name": "acme", "title": "Acme"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, names) = call(&app, get("/api/3/action/organization_list")).await;
    assert_eq!(names["result"], json!(["acme"]));

    let (_, full) = call(&app, get("/api/3/action/organization_list?all_fields=True")).await;
    assert_eq!(full["result"][0]["is_organization"], true);

    let (_, shown) = call(&app, get("/api/3/action/organization_show?id=acme")).await;
    assert_eq!(shown["result"]["title"], "Acme");
}
