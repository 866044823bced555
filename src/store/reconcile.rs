use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

use crate::error::Result;
use crate::model::{CanonicalObservation, IngestSource, Status, Transition};

/// Stored state of a build that change detection compares against.
struct StoredBuild {
    id: i64,
    status: Status,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    duration_seconds: Option<i64>,
    web_url: Option<String>,
}

/// Applies every observation inside one immediate transaction.
///
/// `IMMEDIATE` takes the write lock up front, so the read-compare-write of
/// each build cannot interleave with another writer on the same file.
pub(super) fn reconcile_batch(
    conn: &mut Connection,
    observations: &[CanonicalObservation],
    source: IngestSource,
) -> Result<Vec<Transition>> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut transitions = Vec::new();
    for observation in observations {
        if let Some(transition) = apply(&tx, observation, source)? {
            transitions.push(transition);
        }
    }

    tx.commit()?;

    if !transitions.is_empty() {
        info!(
            "Reconciled {} observations from {}: {} transitions",
            observations.len(),
            source.as_str(),
            transitions.len()
        );
    }
    Ok(transitions)
}

fn apply(
    tx: &Transaction<'_>,
    observation: &CanonicalObservation,
    source: IngestSource,
) -> Result<Option<Transition>> {
    let pipeline_id = resolve_pipeline(tx, observation)?;

    // In-progress builds never store an end time, whoever built the observation.
    let (finished_at, duration_seconds) = if observation.status.is_in_progress() {
        (None, None)
    } else {
        (observation.finished_at, observation.duration_seconds)
    };

    let Some(stored) = find_stored_build(tx, pipeline_id, &observation.external_id)? else {
        tx.execute(
            "INSERT INTO builds (pipeline_id, external_id, status, started_at, finished_at,
                                 duration_seconds, web_url, event_source)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                pipeline_id,
                observation.external_id,
                observation.status.as_str(),
                observation.started_at,
                finished_at,
                duration_seconds,
                observation.web_url,
                source.as_str(),
            ],
        )?;

        return Ok(Some(transition(observation, None, observation.web_url.clone(), duration_seconds)));
    };

    let changed = stored.status != observation.status || stored.duration_seconds != duration_seconds;
    let refreshed = stored.started_at != observation.started_at
        || stored.finished_at != finished_at
        || (observation.web_url.is_some() && observation.web_url != stored.web_url);

    if !changed && !refreshed {
        debug!(
            "{} {}#{} unchanged",
            observation.provider, observation.pipeline_name, observation.external_id
        );
        return Ok(None);
    }

    let web_url = observation.web_url.clone().or(stored.web_url);
    tx.execute(
        "UPDATE builds
         SET status = ?1, started_at = ?2, finished_at = ?3, duration_seconds = ?4,
             web_url = ?5, event_source = ?6
         WHERE id = ?7",
        params![
            observation.status.as_str(),
            observation.started_at,
            finished_at,
            duration_seconds,
            web_url,
            source.as_str(),
            stored.id,
        ],
    )?;

    // Only status and duration changes are notification-worthy.
    if changed {
        Ok(Some(transition(observation, Some(stored.status), web_url, duration_seconds)))
    } else {
        Ok(None)
    }
}

/// Finds or lazily creates the pipeline; fills in its URL if it had none.
fn resolve_pipeline(tx: &Transaction<'_>, observation: &CanonicalObservation) -> Result<i64> {
    let existing: Option<(i64, Option<String>)> = tx
        .query_row(
            "SELECT id, url FROM pipelines WHERE provider = ?1 AND name = ?2",
            params![observation.provider.as_str(), observation.pipeline_name],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match existing {
        Some((id, None)) if observation.web_url.is_some() => {
            tx.execute(
                "UPDATE pipelines SET url = ?1 WHERE id = ?2",
                params![observation.web_url, id],
            )?;
            Ok(id)
        }
        Some((id, _)) => Ok(id),
        None => {
            tx.execute(
                "INSERT INTO pipelines (provider, name, url) VALUES (?1, ?2, ?3)",
                params![
                    observation.provider.as_str(),
                    observation.pipeline_name,
                    observation.web_url,
                ],
            )?;
            debug!(
                "New pipeline {} {}",
                observation.provider, observation.pipeline_name
            );
            Ok(tx.last_insert_rowid())
        }
    }
}

fn find_stored_build(
    tx: &Transaction<'_>,
    pipeline_id: i64,
    external_id: &str,
) -> Result<Option<StoredBuild>> {
    Ok(tx
        .query_row(
            "SELECT id, status, started_at, finished_at, duration_seconds, web_url
             FROM builds WHERE pipeline_id = ?1 AND external_id = ?2",
            params![pipeline_id, external_id],
            |row| {
                let status: String = row.get(1)?;
                Ok(StoredBuild {
                    id: row.get(0)?,
                    status: Status::from(status),
                    started_at: row.get(2)?,
                    finished_at: row.get(3)?,
                    duration_seconds: row.get(4)?,
                    web_url: row.get(5)?,
                })
            },
        )
        .optional()?)
}

fn transition(
    observation: &CanonicalObservation,
    status_old: Option<Status>,
    web_url: Option<String>,
    duration_seconds: Option<i64>,
) -> Transition {
    Transition {
        provider: observation.provider,
        pipeline_name: observation.pipeline_name.clone(),
        external_id: observation.external_id.clone(),
        status_old,
        status_new: observation.status.clone(),
        web_url,
        duration_seconds,
        started_at: observation.started_at,
    }
}
