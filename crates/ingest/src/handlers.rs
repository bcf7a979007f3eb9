//! HTTP route handlers
//!
//! The batch handler opens one transaction for the whole batch: every
//! accepted item's raw event and outbox rows commit atomically, and a store
//! failure rejects the entire batch so producers can retry it wholesale.

use std::collections::HashSet;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use sb_protocol::{routing_keys, Envelope, EnvelopeMode, NormalizedEvent};
use sb_store::{optout, outbox, privacy, raw_events};

use crate::auth::authorize;
use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::types::{BatchOutcome, OptOutRequest, PrivacyDeleteRequest, RejectedItem};

/// POST /v1/events - ingest a batch of envelopes
pub async fn ingest_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response> {
    state.metrics.record_request();
    authorize(&headers, &state.auth)?;

    let trace_header = headers
        .get(state.config.trace_id_header.as_str())
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    let Some(items) = body.as_array() else {
        return Err(ApiError::BadRequest(
            "body must be a JSON array of envelopes".to_string(),
        ));
    };
    if items.is_empty() {
        return Err(ApiError::BadRequest("empty batch".to_string()));
    }

    let mode = if state.config.strict_envelope {
        EnvelopeMode::Strict
    } else {
        EnvelopeMode::Lax
    };

    let mut outcome = BatchOutcome::with_capacity(items.len());
    let mut tx = state.pool.begin().await.map_err(sb_store::StoreError::from)?;
    // One lookup per opted-out identity per batch.
    let mut opted_out_cache: HashSet<(Uuid, String)> = HashSet::new();

    for (index, doc) in items.iter().enumerate() {
        let ev = match Envelope::parse(doc, mode) {
            Ok(ev) => ev,
            Err(e) => {
                debug!(index, code = e.code(), error = %e, "envelope rejected");
                outcome.reject(RejectedItem::from_envelope_error(index, &e));
                continue;
            }
        };

        let cache_key = (ev.app_uuid, ev.anon_user_id.clone());
        let opted_out = opted_out_cache.contains(&cache_key)
            || optout::is_opted_out(&mut *tx, ev.app_uuid, &ev.anon_user_id).await?;
        if opted_out {
            opted_out_cache.insert(cache_key);
            if state.config.reject_opted_out {
                outcome.reject(RejectedItem::opted_out(index));
            } else {
                // Silent accept: the producer sees success, nothing is stored.
                outcome.accept(false);
            }
            continue;
        }

        let inserted = raw_events::insert(&mut *tx, &ev, doc).await?;
        if !inserted {
            outcome.accept(true);
            continue;
        }

        stage_fanout(&mut *tx, &ev).await?;
        outcome.accept(false);
    }

    tx.commit().await.map_err(sb_store::StoreError::from)?;

    state.metrics.record_batch(
        outcome.accepted() as u64,
        outcome.deduped_count() as u64,
        outcome.rejected_count() as u64,
    );
    info!(
        trace_id = trace_header,
        accepted = outcome.accepted(),
        deduped = outcome.deduped_count(),
        rejected = outcome.rejected_count(),
        "batch ingested"
    );

    if state.config.strict_envelope && outcome.all_rejected() {
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(outcome.into_response()),
        )
            .into_response());
    }

    Ok(Json(outcome.into_response()).into_response())
}

/// Stage the raw copy plus the family topic for one accepted event.
async fn stage_fanout(conn: &mut sqlx::PgConnection, ev: &NormalizedEvent) -> Result<()> {
    let staged = serde_json::to_value(ev)
        .map_err(|e| ApiError::BadRequest(format!("unserializable envelope: {e}")))?;

    for routing_key in routing_keys(&ev.event_name) {
        outbox::stage(&mut *conn, ev, routing_key, &staged).await?;
    }
    Ok(())
}

/// POST /v1/opt-out - register an opt-out
pub async fn opt_out(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<OptOutRequest>,
) -> Result<Response> {
    authorize(&headers, &state.auth)?;

    if request.anon_user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("anon_user_id is required".to_string()));
    }

    let mut conn = state.pool.acquire().await.map_err(sb_store::StoreError::from)?;
    optout::register(&mut *conn, request.app_uuid, &request.anon_user_id).await?;

    state.metrics.record_opt_out();
    info!(app_uuid = %request.app_uuid, "opt-out registered");

    Ok(Json(serde_json::json!({"status": "ok"})).into_response())
}

/// POST /v1/privacy/delete - delete all stored state for one identity
pub async fn privacy_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<PrivacyDeleteRequest>,
) -> Result<Response> {
    authorize(&headers, &state.auth)?;

    if request.anon_user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("anon_user_id is required".to_string()));
    }

    let mut tx = state.pool.begin().await.map_err(sb_store::StoreError::from)?;
    let deleted = privacy::delete_user(
        &mut *tx,
        request.app_uuid,
        &request.anon_user_id,
        request.delete_opt_out,
    )
    .await?;
    tx.commit().await.map_err(sb_store::StoreError::from)?;

    state.metrics.record_privacy_delete();
    info!(app_uuid = %request.app_uuid, "privacy delete executed");

    Ok(Json(serde_json::json!({
        "status": "ok",
        "app_uuid": request.app_uuid,
        "anon_user_id": request.anon_user_id,
        "deleted": deleted,
    }))
    .into_response())
}

/// GET /health - liveness
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}
