use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json, Redirect, Response},
};
use std::sync::Arc;

use crate::error::{AppError, RegistryError};
use crate::geo::{Coordinates, RedirectContext};
use crate::models::*;
use crate::AppState;

pub const MAX_BATCH_SIZE: usize = 5;
pub const GEO_POSITION_HEADER: &str = "x-geo-position";

pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "QuickURL".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn create_short_url(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateUrlRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let record = state.registry.create_from(&payload).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn create_batch(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Vec<CreateUrlRequest>>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    if payload.is_empty() {
        return Err(AppError::BadRequest("At least one URL is required".into()));
    }
    if payload.len() > MAX_BATCH_SIZE {
        return Err(AppError::BadRequest(format!(
            "At most {} URLs can be shortened at once",
            MAX_BATCH_SIZE
        )));
    }

    let mut results = Vec::with_capacity(payload.len());
    for (index, request) in payload.iter().enumerate() {
        let result = match state.registry.create_from(request).await {
            Ok(record) => BatchEntryResult {
                index,
                record: Some(record),
                error: None,
            },
            Err(err) => BatchEntryResult {
                index,
                record: None,
                error: Some(err.to_string()),
            },
        };
        results.push(result);
    }

    Ok((StatusCode::CREATED, Json(BatchCreateResponse { results })))
}

pub async fn list_urls(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let urls = state.registry.list_all().await;
    Json(ListUrlsResponse { urls })
}

pub async fn get_url_info(
    Path(code): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    match state.registry.lookup(&code).await {
        Some(record) => Ok(Json(record)),
        None => Err(RegistryError::NotFound(code).into()),
    }
}

pub async fn delete_url(
    Path(code): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    if !state.registry.delete(&code).await {
        return Err(RegistryError::NotFound(code).into());
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn statistics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.registry.statistics().await)
}

pub async fn list_logs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.registry.log().entries())
}

pub async fn clear_logs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.registry.log().clear();
    StatusCode::NO_CONTENT
}

pub async fn redirect_url(
    Path(code): Path<String>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let ctx = redirect_context(&headers);
    let original_url = state.registry.redirect(&code, ctx).await?;

    let delay = state.config.redirect_delay_secs;
    if delay == 0 {
        return Ok(Redirect::temporary(&original_url).into_response());
    }

    Ok(Html(interstitial_page(&original_url, delay)).into_response())
}

fn redirect_context(headers: &HeaderMap) -> RedirectContext {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    RedirectContext {
        referrer: header_value(header::REFERER.as_str()),
        user_agent: header_value(header::USER_AGENT.as_str()),
        coordinates: header_value(GEO_POSITION_HEADER).and_then(|raw| Coordinates::parse(&raw)),
    }
}

fn interstitial_page(url: &str, delay_secs: u64) -> String {
    let url = escape_html(url);
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="{delay_secs};url={url}">
<title>Redirecting...</title>
</head>
<body>
<p>Redirecting to <a href="{url}">{url}</a> in {delay_secs} seconds.</p>
</body>
</html>
"#
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_redirect_context_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::REFERER, HeaderValue::from_static("https://news.example"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8.0"));
        headers.insert(GEO_POSITION_HEADER, HeaderValue::from_static("10.123,20.456"));

        let ctx = redirect_context(&headers);
        assert_eq!(ctx.referrer.as_deref(), Some("https://news.example"));
        assert_eq!(ctx.user_agent.as_deref(), Some("curl/8.0"));
        assert_eq!(ctx.coordinates.map(|c| c.display()).as_deref(), Some("10.12, 20.46"));
    }

    #[test]
    fn test_interstitial_escapes_url() {
        let page = interstitial_page("https://example.com/?a=1&b=\"x\"", 2);
        assert!(page.contains("content=\"2;url=https://example.com/?a=1&amp;b=&quot;x&quot;\""));
        assert!(!page.contains("\"x\""));
    }
}
