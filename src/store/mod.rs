//! Canonical build history: the only writer of pipeline and build rows.

mod queries;
mod reconcile;
mod schema;

use std::path::Path;
use std::sync::{Arc, Mutex};

use log::info;
use rusqlite::Connection;

use crate::error::{CiPulseError, Result};
use crate::model::{BuildRecord, CanonicalObservation, IngestSource, Provider, Transition};

/// Handle to the SQLite build store.
///
/// All writes go through one writer connection behind a mutex, so
/// reconciliations of the same build are applied one after another. A
/// file-backed store reads through its own connection (WAL mode) and never
/// waits on the writer.
#[derive(Clone)]
pub struct BuildStore {
    writer: Arc<Mutex<Connection>>,
    reader: Arc<Mutex<Connection>>,
}

impl BuildStore {
    /// Opens (or creates) a database file and ensures the schema exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the schema cannot be
    /// created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let writer = Connection::open(path)?;
        schema::configure_file_connection(&writer)?;
        schema::bootstrap(&writer)?;

        let reader = Connection::open(path)?;
        schema::configure_connection(&reader)?;

        info!("Build store opened at {}", path.display());

        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
            reader: Arc::new(Mutex::new(reader)),
        })
    }

    /// A private in-memory database; reads share the writer connection.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::configure_connection(&conn)?;
        schema::bootstrap(&conn)?;

        let shared = Arc::new(Mutex::new(conn));
        Ok(Self {
            writer: Arc::clone(&shared),
            reader: shared,
        })
    }

    /// Upserts a batch of observations and returns the transitions it caused.
    ///
    /// The batch commits as one transaction. On error nothing from the batch
    /// is visible and no transitions are returned.
    pub async fn reconcile(
        &self,
        observations: Vec<CanonicalObservation>,
        source: IngestSource,
    ) -> Result<Vec<Transition>> {
        if observations.is_empty() {
            return Ok(Vec::new());
        }
        with_connection(Arc::clone(&self.writer), move |conn| {
            reconcile::reconcile_batch(conn, &observations, source)
        })
        .await
    }

    pub async fn find_build(
        &self,
        provider: Provider,
        pipeline_name: &str,
        external_id: &str,
    ) -> Result<Option<BuildRecord>> {
        let pipeline_name = pipeline_name.to_string();
        let external_id = external_id.to_string();
        with_connection(Arc::clone(&self.reader), move |conn| {
            queries::find_build(conn, provider, &pipeline_name, &external_id)
        })
        .await
    }

    /// Most recently started builds first.
    pub async fn recent_builds(&self, limit: usize) -> Result<Vec<BuildRecord>> {
        with_connection(Arc::clone(&self.reader), move |conn| {
            queries::recent_builds(conn, limit)
        })
        .await
    }

    pub async fn build_count(&self) -> Result<u64> {
        with_connection(Arc::clone(&self.reader), |conn| queries::build_count(conn)).await
    }
}

/// Runs blocking SQLite work off the async runtime.
async fn with_connection<T, F>(conn: Arc<Mutex<Connection>>, f: F) -> Result<T>
where
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn
            .lock()
            .map_err(|_| CiPulseError::StorageUnavailable("connection lock poisoned".into()))?;
        f(&mut guard)
    })
    .await
    .map_err(|e| CiPulseError::StorageUnavailable(format!("storage task failed: {e}")))?
}
