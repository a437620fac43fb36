//! In-memory fake of the CKAN action API.
//!
//! Serves the subset of `/api/3/action/*` the client uses, with CKAN's
//! envelope format and its destructive update semantics: `package_update`
//! and `resource_update` replace the stored record with exactly what was
//! posted. Nested resources are returned without `package_id`, like real
//! CKAN instances often do.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

/// Token the fake accepts in the `Authorization` header for writes.
pub const API_TOKEN: &str = "mock-token";

const CREATED_AT: &str = "2015-03-05T10:20:30.123456";

#[derive(Debug, Default)]
pub struct Catalog {
    datasets: Vec<Map<String, Value>>,
    organizations: Vec<Map<String, Value>>,
}

pub type Db = Arc<RwLock<Catalog>>;

type Reply = (StatusCode, Json<Value>);

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Catalog::default()));
    Router::new()
        .route("/api/3/action/{action}", get(read_action).post(write_action))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn ok(action: &str, result: Value) -> Reply {
    (
        StatusCode::OK,
        Json(json!({
            "help": format!("http://localhost/api/3/action/help_show?name={action}"),
            "success": true,
            "result": result,
        })),
    )
}

fn fail(status: StatusCode, kind: &str, message: &str) -> Reply {
    (
        status,
        Json(json!({
            "help": "",
            "success": false,
            "error": {"__type": kind, "message": message},
        })),
    )
}

fn not_found() -> Reply {
    fail(StatusCode::NOT_FOUND, "Not Found Error", "Not found")
}

fn str_field<'a>(record: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}

fn matches_id_or_name(record: &Map<String, Value>, wanted: &str) -> bool {
    str_field(record, "id") == Some(wanted) || str_field(record, "name") == Some(wanted)
}

/// Dataset as served: nested resources lose their `package_id`.
fn dataset_view(dataset: &Map<String, Value>) -> Value {
    let mut view = dataset.clone();
    if let Some(Value::Array(resources)) = view.get_mut("resources") {
        for resource in resources.iter_mut() {
            if let Value::Object(r) = resource {
                r.remove("package_id");
            }
        }
    }
    Value::Object(view)
}

fn paged<T>(items: impl Iterator<Item = T>, params: &HashMap<String, String>, limit_key: &str, offset_key: &str) -> Vec<T> {
    let offset = params.get(offset_key).and_then(|v| v.parse().ok()).unwrap_or(0);
    let limit = params.get(limit_key).and_then(|v| v.parse().ok()).unwrap_or(usize::MAX);
    items.skip(offset).take(limit).collect()
}

async fn read_action(
    State(db): State<Db>,
    Path(action): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Reply {
    debug!(%action, ?params, "read action");
    let catalog = db.read().await;
    match action.as_str() {
        "package_list" => {
            let names = catalog
                .datasets
                .iter()
                .filter_map(|d| str_field(d, "name").map(str::to_string));
            ok(&action, json!(paged(names, &params, "limit", "offset")))
        }
        "package_show" => {
            let Some(id) = params.get("id") else {
                return fail(StatusCode::CONFLICT, "Validation Error", "Missing value: id");
            };
            match catalog.datasets.iter().find(|d| matches_id_or_name(d, id)) {
                Some(dataset) => ok(&action, dataset_view(dataset)),
                None => not_found(),
            }
        }
        "resource_show" => {
            let id = params.get("id").map(String::as_str).unwrap_or_default();
            match find_resource(&catalog, id) {
                Some(resource) => ok(&action, resource),
                None => not_found(),
            }
        }
        "package_search" => {
            let text = params.get("q").map(|q| q.to_lowercase()).unwrap_or_default();
            let hits: Vec<Value> = catalog
                .datasets
                .iter()
                .filter(|d| {
                    text.is_empty()
                        || ["name", "title", "notes"].iter().any(|key| {
                            str_field(d, key).is_some_and(|v| v.to_lowercase().contains(&text))
                        })
                })
                .map(dataset_view)
                .collect();
            let count = hits.len();
            let results = paged(hits.into_iter(), &params, "rows", "start");
            ok(&action, json!({"count": count, "results": results}))
        }
        "organization_list" => {
            let all_fields = params.get("all_fields").is_some_and(|v| v == "True");
            let orgs: Vec<Value> = catalog
                .organizations
                .iter()
                .map(|o| {
                    if all_fields {
                        Value::Object(o.clone())
                    } else {
                        o.get("name").cloned().unwrap_or(Value::Null)
                    }
                })
                .collect();
            ok(&action, json!(orgs))
        }
        "organization_show" => {
            let id = params.get("id").map(String::as_str).unwrap_or_default();
            match catalog.organizations.iter().find(|o| matches_id_or_name(o, id)) {
                Some(org) => ok(&action, Value::Object(org.clone())),
                None => not_found(),
            }
        }
        "license_list" => ok(
            &action,
            json!([
                {"id": "cc-by", "title": "Creative Commons Attribution", "status": "active", "url": "http://www.opendefinition.org/licenses/cc-by"},
                {"id": "odc-odbl", "title": "Open Data Commons Open Database License (ODbL)", "status": "active"}
            ]),
        ),
        "group_list" | "tag_list" | "user_list" => ok(&action, json!([])),
        _ => fail(StatusCode::BAD_REQUEST, "Bad Request", "Action name not known"),
    }
}

fn find_resource(catalog: &Catalog, id: &str) -> Option<Value> {
    catalog.datasets.iter().find_map(|dataset| {
        let resources = dataset.get("resources")?.as_array()?;
        let resource = resources
            .iter()
            .find(|r| r.get("id").and_then(Value::as_str) == Some(id))?;
        let mut resource = resource.clone();
        if let (Value::Object(r), Some(package_id)) = (&mut resource, str_field(dataset, "id")) {
            r.insert("package_id".to_string(), json!(package_id));
        }
        Some(resource)
    })
}

/// Give every resource an id and drop its `package_id` before storing.
fn normalize_resources(dataset: &mut Map<String, Value>) {
    if let Some(Value::Array(resources)) = dataset.get_mut("resources") {
        for resource in resources.iter_mut() {
            if let Value::Object(r) = resource {
                r.remove("package_id");
                if r.get("id").and_then(Value::as_str).is_none() {
                    r.insert("id".to_string(), json!(Uuid::new_v4().to_string()));
                }
            }
        }
    }
}

async fn write_action(
    State(db): State<Db>,
    Path(action): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == API_TOKEN);
    debug!(%action, authorized, "write action");
    if !authorized {
        return fail(StatusCode::FORBIDDEN, "Authorization Error", "Access denied");
    }
    let Value::Object(mut record) = body else {
        return fail(StatusCode::BAD_REQUEST, "Bad Request", "Body must be a JSON object");
    };

    let mut catalog = db.write().await;
    match action.as_str() {
        "package_create" => {
            let Some(name) = str_field(&record, "name").map(str::to_string) else {
                return fail(StatusCode::CONFLICT, "Validation Error", "Missing value: name");
            };
            if catalog.datasets.iter().any(|d| str_field(d, "name") == Some(name.as_str())) {
                return fail(StatusCode::CONFLICT, "Validation Error", "That URL is already in use.");
            }
            record.insert("id".to_string(), json!(Uuid::new_v4().to_string()));
            record.insert("metadata_created".to_string(), json!(CREATED_AT));
            normalize_resources(&mut record);
            let view = dataset_view(&record);
            catalog.datasets.push(record);
            ok(&action, view)
        }
        "package_update" => {
            let wanted = str_field(&record, "id")
                .or_else(|| str_field(&record, "name"))
                .unwrap_or_default()
                .to_string();
            let Some(slot) = catalog.datasets.iter_mut().find(|d| matches_id_or_name(d, &wanted)) else {
                return not_found();
            };
            record.insert("id".to_string(), slot.get("id").cloned().unwrap_or(Value::Null));
            if let Some(created) = slot.get("metadata_created") {
                record.insert("metadata_created".to_string(), created.clone());
            }
            normalize_resources(&mut record);
            *slot = record;
            ok(&action, dataset_view(slot))
        }
        "resource_create" => {
            let package_id = str_field(&record, "package_id").unwrap_or_default().to_string();
            let Some(dataset) = catalog.datasets.iter_mut().find(|d| matches_id_or_name(d, &package_id)) else {
                return not_found();
            };
            let resource_id = Uuid::new_v4().to_string();
            record.insert("id".to_string(), json!(resource_id));
            record.remove("package_id");
            let resources = dataset
                .entry("resources")
                .or_insert_with(|| json!([]));
            if let Value::Array(resources) = resources {
                resources.push(Value::Object(record));
            }
            match find_resource(&catalog, &resource_id) {
                Some(resource) => ok(&action, resource),
                None => not_found(),
            }
        }
        "resource_update" => {
            let id = str_field(&record, "id").unwrap_or_default().to_string();
            record.remove("package_id");
            let mut replaced = false;
            for dataset in catalog.datasets.iter_mut() {
                if let Some(Value::Array(resources)) = dataset.get_mut("resources") {
                    if let Some(slot) = resources
                        .iter_mut()
                        .find(|r| r.get("id").and_then(Value::as_str) == Some(id.as_str()))
                    {
                        *slot = Value::Object(record.clone());
                        replaced = true;
                        break;
                    }
                }
            }
            if !replaced {
                return not_found();
            }
            match find_resource(&catalog, &id) {
                Some(resource) => ok(&action, resource),
                None => not_found(),
            }
        }
        "organization_create" => {
            let Some(name) = str_field(&record, "name").map(str::to_string) else {
                return fail(StatusCode::CONFLICT, "Validation Error", "Missing value: name");
            };
            if catalog.organizations.iter().any(|o| str_field(o, "name") == Some(name.as_str())) {
                return fail(StatusCode::CONFLICT, "Validation Error", "Group name already exists in database");
            }
            record.insert("id".to_string(), json!(Uuid::new_v4().to_string()));
            record.insert("is_organization".to_string(), json!(true));
            record.insert("created".to_string(), json!(CREATED_AT));
            catalog.organizations.push(record.clone());
            ok(&action, Value::Object(record))
        }
        _ => fail(StatusCode::BAD_REQUEST, "Bad Request", "Action name not known"),
    }
}
