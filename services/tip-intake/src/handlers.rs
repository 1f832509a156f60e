// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the tip intake service.
//!
//! Public routes take submissions and serve the moderated feed. Admin routes
//! manage bans and reverse submitter tokens; access control for them sits in
//! front of this service.

use crate::config::Config;
use crate::error::{ApiError, SubmitError};
use crate::models::{BanDuration, BanRecord, Tip, TipStatus};
use crate::service::{Submission, SubmissionOutcome, SubmissionRequest, TipService};
use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Path, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};

/// Name of the header that also carries the submitter token.
pub const TOKEN_HEADER: &str = "x-submitter-token";

const COOKIE_MAX_AGE_SECS: u64 = 365 * 24 * 60 * 60;

/// Shared application state.
pub struct AppState {
    pub service: TipService,
    pub config: Config,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub classifier: bool,
}

#[derive(Debug, Deserialize)]
pub struct SubmitTipRequest {
    pub content: String,
}

/// Body of every `POST /tips` response.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTipResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tip_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anon_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

/// Public view of a tip.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicTip {
    pub id: String,
    pub moderated_content: String,
    pub anon_id: String,
    pub status: TipStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub keywords: Vec<String>,
}

impl From<Tip> for PublicTip {
    fn from(tip: Tip) -> Self {
        Self {
            id: tip.id,
            moderated_content: tip.moderated_content,
            anon_id: tip.anon_id,
            status: tip.status,
            reason: tip.reason,
            timestamp: tip.timestamp,
            keywords: tip.keywords,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResponse {
    pub tip_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BanRequest {
    pub anon_id: String,
    /// Absent or zero means permanent.
    #[serde(default)]
    pub duration_secs: Option<u64>,
    pub reason: String,
    #[serde(default = "default_actor")]
    pub actor: String,
}

fn default_actor() -> String {
    "admin".to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnbanResponse {
    pub anon_id: String,
    pub removed: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReverseRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseResponse {
    pub anon_id: String,
    pub source_address: String,
    pub user_agent: String,
    pub issued_at: DateTime<Utc>,
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/tips", post(submit_tip).get(list_tips))
        .route("/tips/pending/claim", post(claim_pending))
        .route("/tips/:id", get(get_tip))
        .route("/admin/bans", get(list_bans).post(create_ban))
        .route("/admin/bans/:anon_id", get(get_ban).delete(delete_ban))
        .route("/admin/submitters/:anon_id/tips", get(submitter_tips))
        .route("/admin/identity/reverse", post(reverse_token));

    if state.config.metrics.enabled {
        router = router.route(&state.config.metrics.path, get(metrics));
    }

    router.with_state(state)
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "tip-intake",
        version: env!("CARGO_PKG_VERSION"),
        classifier: state.service.has_classifier(),
    })
}

/// Source address of the request. Forwarded headers are only honoured when
/// configured, since clients can set them freely.
pub fn client_address(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded: bool,
) -> String {
    if trust_forwarded {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(address) = forwarded {
            return address.to_string();
        }
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Token presented by the client, from the token header or the cookie.
pub fn presented_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(token) = headers
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Submit a tip.
pub async fn submit_tip(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Result<Json<SubmitTipRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::Invalid(e.body_text()))?;

    let request = SubmissionRequest {
        content: body.content,
        token: presented_token(&headers, &state.config.identity.cookie_name),
        source_address: client_address(
            &headers,
            peer.map(|ConnectInfo(addr)| addr),
            state.config.identity.trust_forwarded_headers,
        ),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
    };
    debug!(source = %request.source_address, "Processing tip submission");

    let submission = state.service.submit(request).await?;
    Ok(submission_response(&state, submission))
}

fn submission_response(state: &AppState, submission: Submission) -> Response {
    let Submission { submitter, result } = submission;
    let anon_id = submitter.token.anon_id().to_string();

    let (code, body) = match result {
        Ok(SubmissionOutcome::Accepted(tip)) => {
            let moderated = tip.status == TipStatus::Redacted;
            (
                StatusCode::OK,
                SubmitTipResponse {
                    status: if moderated { "redacted" } else { "success" },
                    tip_id: Some(tip.id),
                    anon_id: Some(anon_id.clone()),
                    moderated: Some(moderated),
                    reason: tip.reason,
                    ..Default::default()
                },
            )
        }
        Ok(SubmissionOutcome::Rejected { reason }) => (
            StatusCode::OK,
            SubmitTipResponse {
                status: "rejected",
                reason: Some(reason),
                ..Default::default()
            },
        ),
        Ok(SubmissionOutcome::RateLimited(exceeded)) => (
            StatusCode::TOO_MANY_REQUESTS,
            SubmitTipResponse {
                status: "rate_limited",
                reason: Some(exceeded.to_string()),
                reset_at: Some(exceeded.reset_at),
                ..Default::default()
            },
        ),
        Ok(SubmissionOutcome::Banned(ban)) => (
            StatusCode::FORBIDDEN,
            SubmitTipResponse {
                status: "banned",
                reason: Some(ban_reason(&ban)),
                expires_at: ban.expires_at,
                ..Default::default()
            },
        ),
        Err(SubmitError::Invalid(e)) => (
            StatusCode::BAD_REQUEST,
            SubmitTipResponse {
                status: "invalid",
                reason: Some(e.to_string()),
                ..Default::default()
            },
        ),
        Err(SubmitError::Persistence(e)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            SubmitTipResponse {
                status: "error",
                reason: Some("Service temporarily unavailable, please retry".to_string()),
                retryable: Some(e.is_retryable()),
                ..Default::default()
            },
        ),
    };

    info!(anon_id = %anon_id, status = body.status, code = code.as_u16(), "Tip submission handled");

    let mut response = (code, Json(body)).into_response();
    let headers = response.headers_mut();

    let quota = state.service.quota(&anon_id);
    headers.insert(
        HeaderName::from_static("x-ratelimit-limit"),
        HeaderValue::from(quota.limit),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-remaining"),
        HeaderValue::from(quota.remaining),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-reset"),
        HeaderValue::from(quota.reset_at.timestamp()),
    );
    if code == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = (quota.reset_at - Utc::now()).num_seconds().max(1);
        headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    }

    if submitter.minted {
        let encoded = submitter.token.encode();
        let cookie = format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Strict",
            state.config.identity.cookie_name, encoded, COOKIE_MAX_AGE_SECS
        );
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            headers.insert(header::SET_COOKIE, value);
        }
        if let Ok(value) = HeaderValue::from_str(&encoded) {
            headers.insert(HeaderName::from_static(TOKEN_HEADER), value);
        }
    }

    response
}

fn ban_reason(ban: &BanRecord) -> String {
    match ban.expires_at {
        Some(expires_at) => format!(
            "Submissions blocked until {}: {}",
            expires_at.to_rfc3339(),
            ban.reason
        ),
        None => format!("Submissions blocked: {}", ban.reason),
    }
}

/// Recent public tips, newest first.
pub async fn list_tips(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<PublicTip>>, ApiError> {
    let tips = state.service.recent_public(query.limit).await?;
    Ok(Json(tips.into_iter().map(PublicTip::from).collect()))
}

/// Full tip record.
pub async fn get_tip(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Tip>, ApiError> {
    state
        .service
        .get_tip(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("tip {id}")))
}

/// Claim pending tip IDs for attachment to location logs.
pub async fn claim_pending(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Json<ClaimResponse> {
    Json(ClaimResponse {
        tip_ids: state.service.claim_pending(query.limit).await,
    })
}

pub async fn list_bans(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<BanRecord>>, ApiError> {
    Ok(Json(state.service.list_bans().await?))
}

pub async fn get_ban(
    State(state): State<Arc<AppState>>,
    Path(anon_id): Path<String>,
) -> Result<Json<BanRecord>, ApiError> {
    state
        .service
        .active_ban(&anon_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("ban for {anon_id}")))
}

pub async fn create_ban(
    State(state): State<Arc<AppState>>,
    body: Result<Json<BanRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BanRecord>), ApiError> {
    let Json(request) = body.map_err(|e| ApiError::Invalid(e.body_text()))?;
    if request.anon_id.trim().is_empty() {
        return Err(ApiError::Invalid("anonId is required".to_string()));
    }

    let record = state
        .service
        .ban(
            request.anon_id.trim(),
            BanDuration::from_secs(request.duration_secs),
            &request.reason,
            &request.actor,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn delete_ban(
    State(state): State<Arc<AppState>>,
    Path(anon_id): Path<String>,
) -> Result<Json<UnbanResponse>, ApiError> {
    let removed = state.service.unban(&anon_id).await?;
    Ok(Json(UnbanResponse { anon_id, removed }))
}

pub async fn submitter_tips(
    State(state): State<Arc<AppState>>,
    Path(anon_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<Tip>>, ApiError> {
    Ok(Json(state.service.submitter_tips(&anon_id, query.limit).await?))
}

/// Recover the metadata sealed in a submitter token.
pub async fn reverse_token(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ReverseRequest>, JsonRejection>,
) -> Result<Json<ReverseResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::Invalid(e.body_text()))?;
    let (anon_id, metadata) = state.service.reverse_token(request.token.trim())?;
    Ok(Json(ReverseResponse {
        anon_id,
        source_address: metadata.source_address,
        user_agent: metadata.user_agent,
        issued_at: metadata.issued_at,
    }))
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let body = state
        .service
        .metrics()
        .render()
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}
