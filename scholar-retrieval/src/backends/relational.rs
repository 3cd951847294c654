//! Relational backend over an SQLite paper database.
//!
//! The database holds the `papers`, `authors` and `paper_authors` tables
//! written by the ingestion job. Statements run on tokio's blocking pool
//! against a single long-lived connection, opened on first use so that a
//! missing database surfaces as an unavailable backend rather than a
//! startup failure. Relational hits are unscored.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode, OpenFlags};
use serde_json::Value;

use crate::error::RetrievalError;
use crate::retriever::{natural_key, Retriever};
use crate::types::{Candidate, Payload, Source, SubQuery};

/// URL scheme accepted in front of a database path.
const SQLITE_SCHEME: &str = "sqlite://";

/// SQLite paper-database retriever.
#[derive(Debug, Clone)]
pub struct RelationalRetriever {
    path: Option<PathBuf>,
    conn: Arc<Mutex<Option<Connection>>>,
}

impl RelationalRetriever {
    /// Create a retriever for `db_url` (`sqlite://path/to/db` or a bare path).
    ///
    /// The file is opened read-only on the first query.
    pub fn new(db_url: &str) -> Self {
        Self {
            path: Some(database_path(db_url)),
            conn: Arc::new(Mutex::new(None)),
        }
    }

    /// Wrap an already open connection (in-memory databases, tests).
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            path: None,
            conn: Arc::new(Mutex::new(Some(conn))),
        }
    }

    /// The database file this retriever reads, if it was built from a URL.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Strip an optional `sqlite://` scheme from `db_url`.
pub fn database_path(db_url: &str) -> PathBuf {
    let trimmed = db_url.trim();
    PathBuf::from(trimmed.strip_prefix(SQLITE_SCHEME).unwrap_or(trimmed))
}

fn open(path: &Path) -> Result<Connection, RetrievalError> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| {
        RetrievalError::unavailable(
            Source::Relational,
            format!("cannot open {}: {e}", path.display()),
        )
    })
}

/// Classify an SQLite failure: I/O, locking and open problems mean the
/// store is unavailable; everything else is a bad statement.
fn classify(err: rusqlite::Error) -> RetrievalError {
    let unavailable = matches!(
        err.sqlite_error_code(),
        Some(
            ErrorCode::CannotOpen
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::NotADatabase
                | ErrorCode::SystemIoFailure
                | ErrorCode::PermissionDenied
        )
    );
    if unavailable {
        RetrievalError::unavailable(Source::Relational, err.to_string())
    } else {
        RetrievalError::query(Source::Relational, err.to_string())
    }
}

fn cell_to_json(cell: ValueRef<'_>) -> Value {
    match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(format!("<blob {} bytes>", bytes.len())),
    }
}

/// Run `sub_query` on `conn`, returning at most `limit` rows as candidates.
///
/// Parameters are bound by name; names the statement does not use are
/// ignored.
fn run_query(
    conn: &Connection,
    sub_query: &SubQuery,
    limit: usize,
) -> Result<Vec<Candidate>, RetrievalError> {
    let mut stmt = conn.prepare(&sub_query.text).map_err(classify)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(str::to_owned)
        .collect();

    for (name, value) in &sub_query.params {
        let placeholder = if name.starts_with([':', '@', '$']) {
            name.clone()
        } else {
            format!(":{name}")
        };
        if let Some(index) = stmt.parameter_index(&placeholder).map_err(classify)? {
            stmt.raw_bind_parameter(index, value).map_err(classify)?;
        }
    }

    let mut rows = stmt.raw_query();
    let mut candidates = Vec::new();
    while candidates.len() < limit {
        let Some(row) = rows.next().map_err(classify)? else {
            break;
        };
        let mut record = Payload::new();
        for (i, column) in columns.iter().enumerate() {
            let cell = row.get_ref(i).map_err(classify)?;
            record.insert(column.clone(), cell_to_json(cell));
        }
        let identity = natural_key(&record);
        candidates.push(Candidate {
            source: Source::Relational,
            identity_key: identity,
            raw_payload: record,
            score: None,
        });
    }
    Ok(candidates)
}

#[async_trait]
impl Retriever for RelationalRetriever {
    async fn retrieve(
        &self,
        sub_query: &SubQuery,
        limit: usize,
    ) -> Result<Vec<Candidate>, RetrievalError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        tracing::trace!(sql = %sub_query.text, limit, "relational query");

        let conn = Arc::clone(&self.conn);
        let path = self.path.clone();
        let sub_query = sub_query.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| {
                RetrievalError::unavailable(Source::Relational, "connection lock poisoned")
            })?;
            if guard.is_none() {
                let path = path.ok_or_else(|| {
                    RetrievalError::unavailable(Source::Relational, "no database configured")
                })?;
                *guard = Some(open(&path)?);
            }
            match guard.as_ref() {
                Some(conn) => run_query(conn, &sub_query, limit),
                None => Err(RetrievalError::unavailable(
                    Source::Relational,
                    "connection not open",
                )),
            }
        })
        .await
        .map_err(|e| RetrievalError::unavailable(Source::Relational, format!("query task failed: {e}")))?
    }

    fn source(&self) -> Source {
        Source::Relational
    }
}
