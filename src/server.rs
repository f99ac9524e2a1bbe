use crate::scheme::{ColorScheme, RootClassList};
use crate::store::TaskStore;
use crate::task::{InvalidPriority, NewTask, Priority, TaskId};
use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::Path as FsPath;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

/// Everything the web UI reads and mutates.
pub struct AppState {
    pub tasks: TaskStore,
    pub scheme: ColorScheme,
    pub classes: RootClassList,
}

pub type SharedState = Arc<Mutex<AppState>>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddTaskRequest {
    text: String,
    priority: Option<String>,
    due_date: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UpdateTaskRequest {
    text: Option<String>,
    done: Option<bool>,
    priority: Option<String>,
    // absent: untouched, null or "": cleared
    #[serde(default, deserialize_with = "present")]
    due_date: Option<Option<String>>,
}

fn present<'de, D>(de: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(de).map(Some)
}

struct ApiError(StatusCode, String);

impl From<InvalidPriority> for ApiError {
    fn from(e: InvalidPriority) -> Self {
        ApiError(StatusCode::BAD_REQUEST, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({"status": "error", "message": self.1}))).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

fn success() -> ApiResult {
    Ok(Json(json!({"status": "success"})))
}

fn lock(state: &SharedState) -> MutexGuard<'_, AppState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn parse_priority(priority: Option<String>) -> Result<Option<Priority>, InvalidPriority> {
    priority.map(|p| p.parse()).transpose()
}

pub fn router(state: SharedState, ui_dir: &FsPath) -> Router {
    Router::new()
        .route("/api/tasks", get(list_tasks).post(add_task))
        .route("/api/tasks/clear-done", post(clear_done))
        .route("/api/tasks/{id}", patch(update_task).delete(delete_task))
        .route("/api/tasks/{id}/toggle", post(toggle_task))
        .route("/api/scheme", get(get_scheme))
        .route("/api/scheme/toggle", post(toggle_scheme))
        .fallback_service(ServeDir::new(ui_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(state: SharedState, port: u16, ui_dir: &FsPath) -> anyhow::Result<()> {
    let app = router(state, ui_dir);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    log::info!("serving UI from {}", ui_dir.display());
    println!("🌐 Task list WebUI is running at: http://localhost:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn list_tasks(State(state): State<SharedState>) -> Json<Value> {
    let app = lock(&state);
    Json(json!({"tasks": app.tasks.tasks(), "counts": app.tasks.counts()}))
}

async fn add_task(
    State(state): State<SharedState>,
    Json(req): Json<AddTaskRequest>,
) -> ApiResult {
    let priority = parse_priority(req.priority)?.unwrap_or_default();
    let task = NewTask::new(req.text).priority(priority).due_date(req.due_date);
    let id = lock(&state).tasks.add(task);
    Ok(Json(json!({"status": "success", "id": id})))
}

async fn update_task(
    State(state): State<SharedState>,
    Path(id): Path<TaskId>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult {
    let priority = parse_priority(req.priority)?;
    let mut app = lock(&state);
    if let Some(text) = req.text {
        app.tasks.update_text(id, text);
    }
    if let Some(done) = req.done {
        app.tasks.set_done(id, done);
    }
    if let Some(priority) = priority {
        app.tasks.update_priority(id, priority);
    }
    if let Some(due_date) = req.due_date {
        app.tasks.update_due_date(id, due_date);
    }
    success()
}

async fn delete_task(State(state): State<SharedState>, Path(id): Path<TaskId>) -> ApiResult {
    lock(&state).tasks.remove(id);
    success()
}

async fn toggle_task(State(state): State<SharedState>, Path(id): Path<TaskId>) -> ApiResult {
    lock(&state).tasks.toggle(id);
    success()
}

async fn clear_done(State(state): State<SharedState>) -> ApiResult {
    lock(&state).tasks.clear_done();
    success()
}

async fn get_scheme(State(state): State<SharedState>) -> Json<Value> {
    let app = lock(&state);
    Json(json!({
        "isDark": app.scheme.is_dark(),
        "scheme": app.scheme.scheme(),
        "classes": app.classes.classes(),
    }))
}

async fn toggle_scheme(State(state): State<SharedState>) -> Json<Value> {
    let mut app = lock(&state);
    app.scheme.toggle();
    Json(json!({"status": "success", "isDark": app.scheme.is_dark()}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::NoAmbient;
    use crate::storage::{MemoryStorage, Storage};

    fn state() -> (SharedState, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let classes = RootClassList::new();
        let mut scheme = ColorScheme::new(storage.clone(), Arc::new(classes.clone()));
        scheme.load_initial(&NoAmbient);
        let tasks = TaskStore::load(storage.clone());
        (Arc::new(Mutex::new(AppState { tasks, scheme, classes })), storage)
    }

    fn add_req(text: &str, priority: Option<&str>) -> AddTaskRequest {
        AddTaskRequest { text: text.into(), priority: priority.map(String::from), due_date: None }
    }

    #[tokio::test]
    async fn add_then_list_reports_counts() {
        let (state, _) = state();
        let Json(first) = add_task(State(state.clone()), Json(add_req("a", Some("high"))))
            .await
            .ok()
            .unwrap();
        let Json(second) =
            add_task(State(state.clone()), Json(add_req("b", None))).await.ok().unwrap();
        assert_eq!(first["status"], "success");
        assert!(second["id"].as_i64().unwrap() > first["id"].as_i64().unwrap());

        let Json(body) = list_tasks(State(state)).await;
        assert_eq!(body["counts"]["total"], 2);
        assert_eq!(body["tasks"][0]["priority"], "high");
        assert_eq!(body["tasks"][1]["priority"], "medium");
    }

    #[tokio::test]
    async fn invalid_priority_is_rejected_without_mutation() {
        let (state, _) = state();
        let err = add_task(State(state.clone()), Json(add_req("a", Some("urgent"))))
            .await
            .err()
            .unwrap();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert!(lock(&state).tasks.is_empty());
    }

    #[tokio::test]
    async fn patch_updates_fields_and_clears_due_date() {
        let (state, _) = state();
        let id = lock(&state).tasks.add(NewTask::new("a").due_date(Some("2026-05-01".into())));

        let req: UpdateTaskRequest =
            serde_json::from_value(json!({"text": "b", "done": true, "dueDate": null})).unwrap();
        let Json(body) = update_task(State(state.clone()), Path(id), Json(req)).await.ok().unwrap();
        assert_eq!(body["status"], "success");

        let app = lock(&state);
        let task = app.tasks.get(id).unwrap();
        assert_eq!(task.text, "b");
        assert!(task.done);
        assert_eq!(task.due_date, None);
    }

    #[test]
    fn absent_due_date_leaves_it_untouched() {
        let req: UpdateTaskRequest = serde_json::from_value(json!({"text": "b"})).unwrap();
        assert_eq!(req.due_date, None);
        let req: UpdateTaskRequest =
            serde_json::from_value(json!({"dueDate": "2026-01-01"})).unwrap();
        assert_eq!(req.due_date, Some(Some("2026-01-01".to_string())));
    }

    #[tokio::test]
    async fn toggle_clear_and_delete() {
        let (state, storage) = state();
        let (a, b) = {
            let mut app = lock(&state);
            (app.tasks.add("a"), app.tasks.add("b"))
        };
        let Json(toggled) = toggle_task(State(state.clone()), Path(a)).await.ok().unwrap();
        let Json(cleared) = clear_done(State(state.clone())).await.ok().unwrap();
        let Json(deleted) = delete_task(State(state.clone()), Path(12345)).await.ok().unwrap();
        for body in [toggled, cleared, deleted] {
            assert_eq!(body["status"], "success");
        }

        let ids: Vec<TaskId> = lock(&state).tasks.tasks().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![b]);
        let raw = storage.get("todos").unwrap().unwrap();
        assert!(raw.contains("\"b\""));
        assert!(!raw.contains("\"a\""));
    }

    #[tokio::test]
    async fn scheme_toggle_updates_classes() {
        let (state, storage) = state();
        let Json(body) = toggle_scheme(State(state.clone())).await;
        assert_eq!(body["isDark"], true);

        let Json(body) = get_scheme(State(state)).await;
        assert_eq!(body["scheme"], "dark");
        assert_eq!(body["classes"], json!(["dark"]));
        assert_eq!(storage.get("color-scheme").unwrap().as_deref(), Some("dark"));
    }
}
