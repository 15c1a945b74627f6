//! In-process stand-in for the Firebase Realtime Database REST API.
//!
//! Supports GET/PUT/PATCH/DELETE on `*.json` paths, `orderBy`/`equalTo`
//! queries, and drops nulls and empty containers on write like the real service.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use url::Url;

#[derive(Clone, Default)]
pub struct FakeFirebase {
    root: Arc<Mutex<Value>>,
    reject_indexed_queries: Arc<AtomicBool>,
    unavailable: Arc<AtomicBool>,
    auth_tokens: Arc<Mutex<Vec<String>>>,
}

impl FakeFirebase {
    /// Serves on an ephemeral local port and returns the database URL.
    pub async fn start() -> (Self, Url) {
        let fake = Self::default();
        let app = Router::new().fallback(handle).with_state(fake.clone());
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake firebase listener");
        let addr = listener.local_addr().expect("fake firebase address");
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .await
                .expect("fake firebase server");
        });
        let url = Url::parse(&format!("http://{addr}/")).expect("fake firebase url");
        (fake, url)
    }

    /// Answer indexed queries with the 400 Firebase sends when `.indexOn` is missing.
    pub fn reject_indexed_queries(&self) {
        self.reject_indexed_queries.store(true, Ordering::SeqCst);
    }

    /// Answer every request with 503.
    pub fn go_offline(&self) {
        self.unavailable.store(true, Ordering::SeqCst);
    }

    pub fn insert_raw(&self, path: &str, value: Value) {
        let segments = split_path(path);
        set_at(&mut self.root.lock().expect("fake db lock"), &segments, value);
    }

    pub fn child_count(&self, path: &str) -> usize {
        let root = self.root.lock().expect("fake db lock");
        get_at(&root, &split_path(path))
            .as_object()
            .map_or(0, Map::len)
    }

    pub fn auth_tokens(&self) -> Vec<String> {
        self.auth_tokens.lock().expect("auth token lock").clone()
    }
}

fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn get_at(root: &Value, segments: &[String]) -> Value {
    let mut node = root;
    for segment in segments {
        match node.get(segment) {
            Some(child) => node = child,
            None => return Value::Null,
        }
    }
    node.clone()
}

fn prune(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let pruned: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, prune(v)))
                .filter(|(_, v)| !v.is_null())
                .collect();
            if pruned.is_empty() {
                Value::Null
            } else {
                Value::Object(pruned)
            }
        }
        Value::Array(items) if items.is_empty() => Value::Null,
        other => other,
    }
}

fn set_at(root: &mut Value, segments: &[String], value: Value) {
    let value = prune(value);
    let Some((last, parents)) = segments.split_last() else {
        *root = value;
        return;
    };
    let mut node = root;
    for segment in parents {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = node
            .as_object_mut()
            .expect("object node")
            .entry(segment.clone())
            .or_insert(Value::Null);
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    let map = node.as_object_mut().expect("object node");
    if value.is_null() {
        map.remove(last);
    } else {
        map.insert(last.clone(), value);
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn handle(
    State(fake): State<FakeFirebase>,
    method: Method,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    if fake.unavailable.load(Ordering::SeqCst) {
        return error(StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable");
    }
    if let Some(token) = params.get("auth") {
        fake.auth_tokens
            .lock()
            .expect("auth token lock")
            .push(token.clone());
    }
    let Some(path) = uri.path().strip_suffix(".json") else {
        return error(StatusCode::BAD_REQUEST, "Paths must end in .json");
    };
    let segments = split_path(path);
    let payload = if body.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => value,
            Err(_) => return error(StatusCode::BAD_REQUEST, "Invalid data; couldn't parse JSON object"),
        }
    };

    let mut root = fake.root.lock().expect("fake db lock");
    match method {
        Method::GET => {
            let node = get_at(&root, &segments);
            let Some(order_by) = params.get("orderBy") else {
                return Json(node).into_response();
            };
            if fake.reject_indexed_queries.load(Ordering::SeqCst) {
                return error(
                    StatusCode::BAD_REQUEST,
                    "Index not defined, add \".indexOn\": \"username\" to the rules",
                );
            }
            let field: String = serde_json::from_str(order_by).unwrap_or_default();
            let equal_to: Option<Value> = params
                .get("equalTo")
                .and_then(|raw| serde_json::from_str(raw).ok());
            let filtered: Map<String, Value> = node
                .as_object()
                .into_iter()
                .flatten()
                .filter(|(_, child)| {
                    equal_to
                        .as_ref()
                        .is_none_or(|expected| child.get(&field) == Some(expected))
                })
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Json(Value::Object(filtered)).into_response()
        }
        Method::PUT => {
            set_at(&mut root, &segments, payload.clone());
            Json(payload).into_response()
        }
        Method::PATCH => {
            let Value::Object(children) = payload.clone() else {
                return error(StatusCode::BAD_REQUEST, "PATCH body must be an object");
            };
            for (key, value) in children {
                let mut child_path = segments.clone();
                child_path.push(key);
                set_at(&mut root, &child_path, value);
            }
            Json(payload).into_response()
        }
        Method::DELETE => {
            set_at(&mut root, &segments, Value::Null);
            Json(Value::Null).into_response()
        }
        _ => error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"),
    }
}
