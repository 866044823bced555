use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{CiPulseError, Result};
use crate::model::{BuildRecord, Provider, Status};

const BUILD_COLUMNS: &str = "
    b.id, p.provider, p.name, b.external_id, b.status, b.started_at,
    b.finished_at, b.duration_seconds, b.web_url, b.event_source, b.logs
";

pub(super) fn find_build(
    conn: &Connection,
    provider: Provider,
    pipeline_name: &str,
    external_id: &str,
) -> Result<Option<BuildRecord>> {
    let sql = format!(
        "SELECT {BUILD_COLUMNS}
         FROM builds b JOIN pipelines p ON p.id = b.pipeline_id
         WHERE p.provider = ?1 AND p.name = ?2 AND b.external_id = ?3"
    );

    Ok(conn
        .query_row(
            &sql,
            params![provider.as_str(), pipeline_name, external_id],
            map_row,
        )
        .optional()?)
}

pub(super) fn recent_builds(conn: &Connection, limit: usize) -> Result<Vec<BuildRecord>> {
    let sql = format!(
        "SELECT {BUILD_COLUMNS}
         FROM builds b JOIN pipelines p ON p.id = b.pipeline_id
         ORDER BY b.started_at IS NULL, b.started_at DESC, b.id DESC
         LIMIT ?1"
    );
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![limit], map_row)?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub(super) fn build_count(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM builds", [], |row| row.get(0))?;
    u64::try_from(count)
        .map_err(|_| CiPulseError::StorageUnavailable(format!("invalid build count {count}")))
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<BuildRecord> {
    let provider: String = row.get(1)?;
    let provider = provider.parse::<Provider>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    })?;
    let status: String = row.get(4)?;

    Ok(BuildRecord {
        id: row.get(0)?,
        provider,
        pipeline_name: row.get(2)?,
        external_id: row.get(3)?,
        status: Status::from(status),
        started_at: row.get(5)?,
        finished_at: row.get(6)?,
        duration_seconds: row.get(7)?,
        web_url: row.get(8)?,
        event_source: row.get(9)?,
        logs: row.get(10)?,
    })
}
