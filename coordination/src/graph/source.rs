//! Read-only loaders for knowledge-graph snapshots.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};
use tracing::{info, warn};

use super::types::{Entity, EntityKind, GraphSnapshot, Relation, RelationKind, TestPrior};
use super::{GraphError, GraphResult};

/// Anything that can produce a full [`GraphSnapshot`] in one read.
///
/// Loads are blocking; async callers go through [`super::GraphHandle::reload`].
pub trait GraphSource: Send + Sync {
    fn load(&self) -> GraphResult<GraphSnapshot>;

    /// Short label for logs.
    fn describe(&self) -> String;
}

/// A serde JSON file holding `{entities, relations, test_priors}`.
#[derive(Debug, Clone)]
pub struct JsonGraphSource {
    path: PathBuf,
}

impl JsonGraphSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl GraphSource for JsonGraphSource {
    fn load(&self) -> GraphResult<GraphSnapshot> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| GraphError::Io {
            path: self.path.clone(),
            source,
        })?;
        let snapshot: GraphSnapshot = serde_json::from_str(&raw)?;
        info!(
            path = %self.path.display(),
            entities = snapshot.entities.len(),
            relations = snapshot.relations.len(),
            test_priors = snapshot.test_priors.len(),
            "Loaded graph snapshot from JSON"
        );
        Ok(snapshot)
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

/// SQLite database with `entities(id, name, type)`,
/// `relations(id, src, rel, dst, source_doc, weight)` and
/// `tests(id, name, sensitivity, specificity, cost, risk)`.
///
/// Opened read-only. A missing `tests` table means "no priors".
#[derive(Debug, Clone)]
pub struct SqliteGraphSource {
    path: PathBuf,
}

impl SqliteGraphSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn open(&self) -> GraphResult<Connection> {
        if !self.path.exists() {
            return Err(GraphError::Io {
                path: self.path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "graph database not found"),
            });
        }
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(conn)
    }
}

impl GraphSource for SqliteGraphSource {
    fn load(&self) -> GraphResult<GraphSnapshot> {
        let conn = self.open()?;
        let entities = read_entities(&conn)?;
        let relations = read_relations(&conn)?;
        let test_priors = if table_exists(&conn, "tests")? {
            read_test_priors(&conn)?
        } else {
            Vec::new()
        };
        info!(
            path = %self.path.display(),
            entities = entities.len(),
            relations = relations.len(),
            test_priors = test_priors.len(),
            "Loaded graph snapshot from SQLite"
        );
        Ok(GraphSnapshot {
            entities,
            relations,
            test_priors,
        })
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}

/// Pick a source by file extension: `.json` → JSON, anything else → SQLite.
pub fn source_for_path(path: &Path) -> Box<dyn GraphSource> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Box::new(JsonGraphSource::new(path)),
        _ => Box::new(SqliteGraphSource::new(path)),
    }
}

fn table_exists(conn: &Connection, name: &str) -> GraphResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn read_entities(conn: &Connection) -> GraphResult<Vec<Entity>> {
    let mut stmt = conn.prepare("SELECT id, name, type FROM entities ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut entities = Vec::new();
    for row in rows {
        let (id, name, raw_kind) = row?;
        match EntityKind::parse(&raw_kind) {
            Some(kind) => entities.push(Entity { id, name, kind }),
            None => warn!(id, kind = %raw_kind, "Skipping entity with unknown type"),
        }
    }
    Ok(entities)
}

fn read_relations(conn: &Connection) -> GraphResult<Vec<Relation>> {
    let mut stmt =
        conn.prepare("SELECT src, rel, dst, source_doc, weight FROM relations ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok(Relation {
            src: row.get(0)?,
            rel: RelationKind::parse(&row.get::<_, String>(1)?),
            dst: row.get(2)?,
            source_doc: row.get(3)?,
            weight: row.get::<_, Option<f64>>(4)?.unwrap_or(1.0),
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn read_test_priors(conn: &Connection) -> GraphResult<Vec<TestPrior>> {
    let mut stmt = conn.prepare(
        "SELECT name, sensitivity, specificity, cost, risk FROM tests ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(TestPrior {
            name: row.get(0)?,
            sensitivity: row.get(1)?,
            specificity: row.get(2)?,
            cost: row.get::<_, Option<f64>>(3)?.unwrap_or(1.0),
            risk: row.get::<_, Option<f64>>(4)?.unwrap_or(1.0),
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
