use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::time::sleep;
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::lifecycle;
use crate::error::AppError;
use crate::geo::{validate_coordinates, GeoJsonPoint};
use crate::models::event::TrackingEvent;
use crate::models::update::{
    RejectionReason, SubmitOutcome, TrackingUpdate, TrackingUpdateInput,
};
use crate::registry::SessionMutation;
use crate::state::AppState;
use crate::store::Appended;

/// Ingests one driver report: validate, deduplicate, append to the
/// audit log, and conditionally advance the order's delivery session.
///
/// The append is unconditional for well-formed input — lifecycle
/// violations and stale timestamps still land in the audit log, they
/// just do not mutate the session (`applied = false`). The whole
/// read-validate-append-mutate sequence runs under the order's lock, so
/// submissions for the same order are serialized while different orders
/// proceed in parallel.
pub async fn submit(
    state: &AppState,
    input: TrackingUpdateInput,
) -> Result<SubmitOutcome, AppError> {
    let start = Instant::now();

    if input.tracking_number.trim().is_empty() {
        return Err(AppError::Validation(
            "trackingNumber must not be empty".to_string(),
        ));
    }

    if let Some(point) = &input.location {
        validate_coordinates(point)?;
    }

    let known = state
        .orders
        .get(input.order_id)
        .ok_or(AppError::UnknownOrder(input.order_id))?;

    if known.tracking_number != input.tracking_number {
        return Err(AppError::Validation(format!(
            "trackingNumber {} does not belong to order {}",
            input.tracking_number, input.order_id
        )));
    }

    let timestamp = input.timestamp.unwrap_or_else(Utc::now);
    let client_update_id = input.client_update_id;

    let update = TrackingUpdate {
        id: Uuid::new_v4(),
        order_id: input.order_id,
        tracking_number: input.tracking_number,
        latitude: input.location.map(|p| p.latitude),
        longitude: input.location.map(|p| p.longitude),
        location: input.location.map(|p| GeoJsonPoint::from_point(&p)),
        location_description: input.location_description.or_else(|| {
            input
                .location
                .map(|p| format!("Location at {:.4}, {:.4}", p.latitude, p.longitude))
        }),
        status: input.status,
        notes: input.notes,
        timestamp,
        driver_id: input.driver_id,
        driver_name: input.driver_name,
        speed: input.speed,
        heading: input.heading,
        accuracy: input.accuracy,
    };

    let order_lock = state.registry.lock_for(update.order_id);
    let _guard = order_lock.lock().await;

    let current = state.registry.get(update.order_id);
    let decision: Result<(), RejectionReason> = match &current {
        Some(session) if timestamp < session.last_update_timestamp => {
            Err(RejectionReason::StaleTimestamp)
        }
        Some(session) => {
            lifecycle::validate_transition(session.current_status, update.status).map(|_| ())
        }
        // First update for the order: nothing to transition from.
        None => Ok(()),
    };

    let appended = retry_with_backoff(
        state.persist_max_attempts,
        state.persist_backoff,
        || state.store.append(update.clone(), client_update_id),
    )
    .await?;

    if let Appended::Duplicate(original) = &appended {
        debug!(order_id = update.order_id, client_update_id = ?client_update_id, "duplicate submission ignored");
        let session =
            state
                .registry
                .open_if_absent(original.order_id, original.status, original.timestamp);
        record_outcome(state, "duplicate", start);
        return Ok(SubmitOutcome {
            update: (**original).clone(),
            applied: false,
            rejection: None,
            session,
        });
    }

    let stored = appended.update().clone();

    let (applied, rejection, session) = match decision {
        Ok(()) => {
            let session = state.registry.upsert(
                stored.order_id,
                SessionMutation {
                    status: stored.status,
                    timestamp: stored.timestamp,
                    location: stored.point(),
                    driver_id: stored.driver_id,
                },
            );

            info!(
                order_id = stored.order_id,
                tracking_number = %stored.tracking_number,
                status = ?stored.status,
                "tracking update applied"
            );

            if !session.active {
                let _ = state.events_tx.send(TrackingEvent::SessionClosed {
                    session: session.clone(),
                });
            }

            (true, None, session)
        }
        Err(reason) => {
            // `current` is always Some here: the first update for an
            // order never fails the transition check.
            let session = current.ok_or_else(|| {
                AppError::Internal("rejected transition without a session".to_string())
            })?;

            debug!(
                order_id = stored.order_id,
                current = ?session.current_status,
                proposed = ?stored.status,
                reason = ?reason,
                "update stored as audit-only"
            );

            (false, Some(reason), session)
        }
    };

    let _ = state.events_tx.send(TrackingEvent::Updated {
        update: (*stored).clone(),
        applied,
        rejection,
    });

    record_outcome(state, if applied { "applied" } else { "audit_only" }, start);

    Ok(SubmitOutcome {
        update: (*stored).clone(),
        applied,
        rejection,
        session,
    })
}

fn record_outcome(state: &AppState, outcome: &str, start: Instant) {
    state
        .metrics
        .updates_total
        .with_label_values(&[outcome])
        .inc();
    state
        .metrics
        .ingest_latency_seconds
        .with_label_values(&[outcome])
        .observe(start.elapsed().as_secs_f64());
    state
        .metrics
        .active_sessions
        .set(state.registry.active_count() as i64);
    state.metrics.audit_log_size.set(state.store.len() as i64);
}

/// Runs `op` up to `max_attempts` times, doubling the delay between
/// attempts. Only safe for idempotent operations (the store append
/// deduplicates via `clientUpdateId` when the caller supplies one).
pub async fn retry_with_backoff<T, F>(
    max_attempts: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Result<T, AppError>,
{
    let mut delay = base_delay;
    let mut attempt = 1;

    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= max_attempts.max(1) => return Err(err),
            Err(err) => {
                debug!(attempt, error = %err, "persistence attempt failed; backing off");
                sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::retry_with_backoff;
    use crate::error::AppError;

    #[tokio::test]
    async fn retry_succeeds_after_transient_failures() {
        let mut failures_left = 2;
        let result = retry_with_backoff(3, Duration::from_millis(1), || {
            if failures_left > 0 {
                failures_left -= 1;
                Err(AppError::Persistence("storage unavailable".to_string()))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn retry_gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: Result<(), _> = retry_with_backoff(3, Duration::from_millis(1), || {
            calls += 1;
            Err(AppError::Persistence("storage unavailable".to_string()))
        })
        .await;

        assert!(matches!(result, Err(AppError::Persistence(_))));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn first_success_returns_immediately() {
        let mut calls = 0;
        let result = retry_with_backoff(5, Duration::from_millis(1), || {
            calls += 1;
            Ok::<_, AppError>("done")
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls, 1);
    }
}
