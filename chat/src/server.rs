use std::sync::Arc;

use agent::Agent;
use async_trait::async_trait;
use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use crate::page;

/// Turns the text typed into the form into the text shown below it.
#[async_trait]
pub(crate) trait Responder: Send + Sync {
    async fn respond(&self, input: &str) -> String;
}

#[async_trait]
impl Responder for Agent {
    async fn respond(&self, input: &str) -> String {
        match self.ask(input).await {
            Ok(answer) => answer,
            Err(err) => {
                tracing::error!(error = %err, "agent failed");
                format!("Error: {err}")
            }
        }
    }
}

/// Answers with the input unchanged.
#[derive(Debug)]
pub(crate) struct Echo;

#[async_trait]
impl Responder for Echo {
    async fn respond(&self, input: &str) -> String {
        input.to_string()
    }
}

#[derive(Clone)]
pub(crate) struct AppState {
    responder: Arc<dyn Responder>,
}

impl AppState {
    pub(crate) fn new(responder: Arc<dyn Responder>) -> Self {
        Self { responder }
    }
}

#[derive(Deserialize)]
struct FormInput {
    #[serde(default)]
    input: String,
}

#[derive(Serialize, Deserialize)]
struct Predict {
    data: Vec<String>,
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index).post(submit))
        .route("/api/predict", post(predict))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> Html<String> {
    Html(page::render("", None))
}

async fn submit(State(state): State<AppState>, Form(form): Form<FormInput>) -> Html<String> {
    if form.input.trim().is_empty() {
        return Html(page::render(&form.input, None));
    }
    let output = state.responder.respond(&form.input).await;
    Html(page::render(&form.input, Some(&output)))
}

async fn predict(
    State(state): State<AppState>,
    Json(body): Json<Predict>,
) -> Result<Json<Predict>, (StatusCode, Json<Value>)> {
    let Some(input) = body.data.first() else {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": "data must contain the input text"})),
        ));
    };
    let output = state.responder.respond(input).await;
    Ok(Json(Predict { data: vec![output] }))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}
