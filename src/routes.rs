use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::feed::{category_names, topic_code, FeedError};
use crate::pipeline::{Article, NewsService};

const DEFAULT_COUNTRY: &str = "US";
const DEFAULT_CATEGORY: &str = "top";
const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

pub struct AppState {
    pub news: Arc<NewsService>,
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/categories", get(categories))
        .route("/api/news", get(news))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid category")]
    InvalidCategory,
    #[error("Invalid query: {}", .0.body_text())]
    InvalidQuery(#[from] QueryRejection),
    #[error(transparent)]
    Feed(#[from] FeedError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidCategory => StatusCode::BAD_REQUEST,
            ApiError::InvalidQuery(rejection) => rejection.status(),
            ApiError::Feed(e) => {
                error!(error = %e, "News request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (
            status,
            Json(json!({ "success": false, "error": self.to_string() })),
        )
            .into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NewsQuery {
    pub country: Option<String>,
    pub category: Option<String>,
    pub limit: Option<usize>,
}

impl NewsQuery {
    pub fn country(&self) -> String {
        self.country
            .as_deref()
            .unwrap_or(DEFAULT_COUNTRY)
            .to_uppercase()
    }

    pub fn category(&self) -> String {
        self.category
            .as_deref()
            .unwrap_or(DEFAULT_CATEGORY)
            .to_lowercase()
    }

    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewsReport {
    pub success: bool,
    pub country: String,
    pub category: String,
    pub total_articles: usize,
    pub articles: Vec<Article>,
}

// Route handlers
pub async fn index() -> impl IntoResponse {
    Json(json!({
        "message": "Google News Scraper API",
        "endpoints": {
            "/api/news": "Get news",
            "/api/categories": "List categories"
        }
    }))
}

pub async fn categories() -> impl IntoResponse {
    Json(json!({ "success": true, "categories": category_names() }))
}

pub async fn news(
    State(state): State<Arc<AppState>>,
    query: Result<Query<NewsQuery>, QueryRejection>,
) -> Result<Json<NewsReport>, ApiError> {
    let Query(query) = query?;
    let country = query.country();
    let category = query.category();
    let limit = query.limit();

    if topic_code(&category).is_none() {
        return Err(ApiError::InvalidCategory);
    }

    let articles = state.news.scrape(&country, &category, limit).await?;

    Ok(Json(NewsReport {
        success: true,
        country,
        category,
        total_articles: articles.len(),
        articles,
    }))
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}
