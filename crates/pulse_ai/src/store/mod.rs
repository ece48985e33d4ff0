//! Durable chunk collection: SQLite keyed by chunk id, embeddings stored as
//! little-endian f32 blobs. The external embedding model is the only party
//! that understands vector contents; this adapter just persists and ranks.
//!
//! Visibility contract: a community's chunks become searchable only after the
//! writing transaction commits. `reindex_community` runs delete-then-insert
//! inside one transaction so no stale chunk survives a profile update.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use rusqlite::{params, params_from_iter, Connection};
use sha2::{Digest, Sha256};

use pulse_core::domain::SectionTag;
use pulse_core::error::AppError;

use crate::chunker::model::{Chunk, MetricValue, VizRef};
use crate::embeddings::Embedder;

const MIGRATION_0001: (&str, &str) = (
    "0001_init.sql",
    include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../migrations/0001_init.sql"
    )),
);

fn migrations() -> Vec<(&'static str, &'static str)> {
    vec![MIGRATION_0001]
}

pub struct ChunkStore {
    conn: Connection,
}

impl ChunkStore {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        let mut conn = Connection::open(path).map_err(|e| {
            AppError::retryable("INDEX_UNAVAILABLE", "Failed to open chunk store")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        migrate(&mut conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        let mut conn = Connection::open_in_memory().map_err(|e| {
            AppError::retryable("INDEX_UNAVAILABLE", "Failed to open in-memory chunk store")
                .with_details(e.to_string())
        })?;
        migrate(&mut conn)?;
        Ok(Self { conn })
    }

    /// Replace any stored chunk sharing a `chunk_id`. Embeddings are computed
    /// up front (reusing the stored vector when the text hash is unchanged)
    /// and all rows land in a single transaction. An empty set is a no-op.
    pub fn upsert(
        &mut self,
        embedder: &dyn Embedder,
        model: &str,
        chunks: &[Chunk],
    ) -> Result<usize, AppError> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let rows = self.prepare_rows(embedder, model, chunks)?;
        let tx = self.conn.transaction().map_err(db_unavailable)?;
        insert_rows(&tx, &rows)?;
        tx.commit().map_err(db_unavailable)?;
        Ok(rows.len())
    }

    /// Remove every chunk owned by `community`. Returns the number removed.
    pub fn delete_community(&mut self, community: &str) -> Result<usize, AppError> {
        self.conn
            .execute("DELETE FROM chunks WHERE community = ?1", params![community])
            .map_err(db_unavailable)
    }

    /// Delete-then-upsert as one transaction: the logical unit used when a
    /// profile is (re)indexed. An embedding failure leaves the store
    /// untouched; a commit leaves exactly the new chunk set visible.
    pub fn reindex_community(
        &mut self,
        embedder: &dyn Embedder,
        model: &str,
        community: &str,
        chunks: &[Chunk],
    ) -> Result<usize, AppError> {
        let rows = self.prepare_rows(embedder, model, chunks)?;
        let tx = self.conn.transaction().map_err(db_unavailable)?;
        tx.execute("DELETE FROM chunks WHERE community = ?1", params![community])
            .map_err(db_unavailable)?;
        insert_rows(&tx, &rows)?;
        tx.commit().map_err(db_unavailable)?;
        Ok(rows.len())
    }

    /// Rank stored chunks against `query_text`, optionally hard-filtered to a
    /// set of community slugs. An empty index yields an empty result set
    /// without consulting the embedder. Ties order by ascending chunk id.
    pub fn search(
        &self,
        embedder: &dyn Embedder,
        model: &str,
        query_text: &str,
        k: usize,
        filter: Option<&[String]>,
    ) -> Result<Vec<(Chunk, f32)>, AppError> {
        if k == 0 || self.count()? == 0 {
            return Ok(Vec::new());
        }

        let qv = embedder.embed(model, query_text).map_err(|e| {
            AppError::new("EMBEDDINGS_FAILED", "Failed to embed query text")
                .with_details(e.to_string())
                .with_retryable(e.retryable)
        })?;
        let qnorm = l2_norm(&qv);
        if qnorm == 0.0 {
            return Err(AppError::new(
                "RETRIEVAL_FAILED",
                "Query embedding norm is zero",
            ));
        }

        let rows = self.load_rows(filter)?;
        let mut hits: Vec<(Chunk, f32)> = Vec::new();
        for (chunk, embedding) in rows {
            if embedding.len() != qv.len() {
                return Err(AppError::new(
                    "RETRIEVAL_FAILED",
                    "Stored embedding dims do not match query dims",
                )
                .with_details(format!(
                    "chunk_id={}; stored={}; query={}",
                    chunk.chunk_id,
                    embedding.len(),
                    qv.len()
                )));
            }
            let vnorm = l2_norm(&embedding);
            if vnorm == 0.0 {
                continue;
            }
            let score = cosine(&qv, &embedding, qnorm, vnorm);
            hits.push((chunk, score));
        }

        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.chunk_id.cmp(&b.0.chunk_id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    /// Known community registry, ascending.
    pub fn list_communities(&self) -> Result<Vec<String>, AppError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT community FROM chunks ORDER BY community")
            .map_err(db_unavailable)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(db_unavailable)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r.map_err(db_unavailable)?);
        }
        Ok(out)
    }

    pub fn count(&self) -> Result<usize, AppError> {
        self.conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
            .map_err(db_unavailable)
    }

    pub fn get_chunk(&self, chunk_id: &str) -> Result<Option<Chunk>, AppError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT chunk_id, community, section, text, metrics_json, viz_json \
                 FROM chunks WHERE chunk_id = ?1",
            )
            .map_err(db_unavailable)?;
        let mut rows = stmt
            .query_map(params![chunk_id], raw_row)
            .map_err(db_unavailable)?;
        match rows.next() {
            Some(raw) => Ok(Some(decode_chunk(raw.map_err(db_unavailable)?)?)),
            None => Ok(None),
        }
    }

    /// Drop the whole collection (wipe-and-rebuild indexing).
    pub fn wipe(&mut self) -> Result<usize, AppError> {
        self.conn
            .execute("DELETE FROM chunks", [])
            .map_err(db_unavailable)
    }

    fn prepare_rows(
        &self,
        embedder: &dyn Embedder,
        model: &str,
        chunks: &[Chunk],
    ) -> Result<Vec<StoredRow>, AppError> {
        let mut dims = self.stored_dims()?;
        let mut rows = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let text_sha256 = sha256_hex(chunk.text.as_bytes());
            let embedding = match self.stored_embedding_if_unchanged(&chunk.chunk_id, &text_sha256)? {
                Some(v) => v,
                None => embedder.embed(model, &chunk.text).map_err(|e| {
                    AppError::new("EMBEDDINGS_FAILED", "Failed to embed chunk text")
                        .with_details(format!("chunk_id={}; err={}", chunk.chunk_id, e))
                        .with_retryable(e.retryable)
                })?,
            };
            match dims {
                Some(d) if d != embedding.len() => {
                    return Err(AppError::new(
                        "EMBEDDINGS_FAILED",
                        "Embedding dimension mismatch across chunks",
                    )
                    .with_details(format!(
                        "chunk_id={}; expected={}; got={}",
                        chunk.chunk_id,
                        d,
                        embedding.len()
                    )));
                }
                Some(_) => {}
                None => dims = Some(embedding.len()),
            }
            let metrics_json = serde_json::to_string(&chunk.metrics).map_err(|e| {
                AppError::new("CHUNK_STORE_CORRUPT", "Failed to encode chunk metrics")
                    .with_details(e.to_string())
            })?;
            let viz_json = match &chunk.viz_ref {
                Some(v) => Some(serde_json::to_string(v).map_err(|e| {
                    AppError::new("CHUNK_STORE_CORRUPT", "Failed to encode chunk viz_ref")
                        .with_details(e.to_string())
                })?),
                None => None,
            };
            rows.push(StoredRow {
                chunk: chunk.clone(),
                text_sha256,
                metrics_json,
                viz_json,
                embedding,
            });
        }
        Ok(rows)
    }

    fn stored_dims(&self) -> Result<Option<usize>, AppError> {
        let mut stmt = self
            .conn
            .prepare("SELECT dims FROM chunks LIMIT 1")
            .map_err(db_unavailable)?;
        let mut rows = stmt
            .query_map([], |row| row.get::<_, i64>(0))
            .map_err(db_unavailable)?;
        match rows.next() {
            Some(d) => Ok(Some(d.map_err(db_unavailable)? as usize)),
            None => Ok(None),
        }
    }

    fn stored_embedding_if_unchanged(
        &self,
        chunk_id: &str,
        text_sha256: &str,
    ) -> Result<Option<Vec<f32>>, AppError> {
        let mut stmt = self
            .conn
            .prepare("SELECT text_sha256, embedding FROM chunks WHERE chunk_id = ?1")
            .map_err(db_unavailable)?;
        let mut rows = stmt
            .query_map(params![chunk_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
            })
            .map_err(db_unavailable)?;
        match rows.next() {
            Some(r) => {
                let (stored_sha, blob) = r.map_err(db_unavailable)?;
                if stored_sha == text_sha256 {
                    Ok(Some(blob_to_embedding(&blob)?))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    fn load_rows(&self, filter: Option<&[String]>) -> Result<Vec<(Chunk, Vec<f32>)>, AppError> {
        let (sql, bind): (String, Vec<String>) = match filter {
            Some(names) if !names.is_empty() => {
                let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();
                let placeholders = vec!["?"; wanted.len()].join(", ");
                let mut bind: Vec<String> = wanted.into_iter().map(String::from).collect();
                bind.sort();
                (
                    format!(
                        "SELECT chunk_id, community, section, text, metrics_json, viz_json, embedding \
                         FROM chunks WHERE community IN ({placeholders})"
                    ),
                    bind,
                )
            }
            _ => (
                "SELECT chunk_id, community, section, text, metrics_json, viz_json, embedding \
                 FROM chunks"
                    .to_string(),
                Vec::new(),
            ),
        };

        let mut stmt = self.conn.prepare(&sql).map_err(db_unavailable)?;
        let rows = stmt
            .query_map(params_from_iter(bind.iter()), |row| {
                Ok((
                    RawRow {
                        chunk_id: row.get(0)?,
                        community: row.get(1)?,
                        section: row.get(2)?,
                        text: row.get(3)?,
                        metrics_json: row.get(4)?,
                        viz_json: row.get(5)?,
                    },
                    row.get::<_, Vec<u8>>(6)?,
                ))
            })
            .map_err(db_unavailable)?;

        let mut out = Vec::new();
        for r in rows {
            let (raw, blob) = r.map_err(db_unavailable)?;
            out.push((decode_chunk(raw)?, blob_to_embedding(&blob)?));
        }
        Ok(out)
    }
}

struct StoredRow {
    chunk: Chunk,
    text_sha256: String,
    metrics_json: String,
    viz_json: Option<String>,
    embedding: Vec<f32>,
}

struct RawRow {
    chunk_id: String,
    community: String,
    section: String,
    text: String,
    metrics_json: String,
    viz_json: Option<String>,
}

fn raw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        chunk_id: row.get(0)?,
        community: row.get(1)?,
        section: row.get(2)?,
        text: row.get(3)?,
        metrics_json: row.get(4)?,
        viz_json: row.get(5)?,
    })
}

fn decode_chunk(raw: RawRow) -> Result<Chunk, AppError> {
    let section = SectionTag::parse(&raw.section).ok_or_else(|| {
        AppError::new("CHUNK_STORE_CORRUPT", "Stored chunk has an unknown section tag")
            .with_details(format!("chunk_id={}; section={}", raw.chunk_id, raw.section))
    })?;
    let metrics: BTreeMap<String, MetricValue> =
        serde_json::from_str(&raw.metrics_json).map_err(|e| {
            AppError::new("CHUNK_STORE_CORRUPT", "Failed to decode stored chunk metrics")
                .with_details(format!("chunk_id={}; err={}", raw.chunk_id, e))
        })?;
    let viz_ref: Option<VizRef> = match raw.viz_json {
        Some(json) => Some(serde_json::from_str(&json).map_err(|e| {
            AppError::new("CHUNK_STORE_CORRUPT", "Failed to decode stored chunk viz_ref")
                .with_details(format!("chunk_id={}; err={}", raw.chunk_id, e))
        })?),
        None => None,
    };
    Ok(Chunk {
        chunk_id: raw.chunk_id,
        community: raw.community,
        section,
        text: raw.text,
        metrics,
        viz_ref,
    })
}

fn insert_rows(tx: &rusqlite::Transaction<'_>, rows: &[StoredRow]) -> Result<(), AppError> {
    for row in rows {
        tx.execute(
            "INSERT OR REPLACE INTO chunks \
             (chunk_id, community, section, text, text_sha256, metrics_json, viz_json, embedding, dims) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                row.chunk.chunk_id,
                row.chunk.community,
                row.chunk.section.as_str(),
                row.chunk.text,
                row.text_sha256,
                row.metrics_json,
                row.viz_json,
                embedding_to_blob(&row.embedding),
                row.embedding.len() as i64,
            ],
        )
        .map_err(db_unavailable)?;
    }
    Ok(())
}

fn migrate(conn: &mut Connection) -> Result<(), AppError> {
    // Track migrations by name, applying each exactly once, in order.
    conn.execute_batch(
        r#"
      CREATE TABLE IF NOT EXISTS _migrations (
        name TEXT PRIMARY KEY NOT NULL,
        applied_at TEXT NOT NULL
      );
    "#,
    )
    .map_err(db_unavailable)?;

    let applied: HashSet<String> = {
        let mut stmt = conn
            .prepare("SELECT name FROM _migrations")
            .map_err(db_unavailable)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(db_unavailable)?;
        let mut set = HashSet::new();
        for r in rows {
            set.insert(r.map_err(db_unavailable)?);
        }
        set
    };

    for (name, sql) in migrations() {
        if applied.contains(name) {
            continue;
        }
        let tx = conn.transaction().map_err(db_unavailable)?;
        tx.execute_batch(sql).map_err(|e| {
            AppError::new("INDEX_UNAVAILABLE", "Failed to apply chunk store migration")
                .with_details(format!("migration={name}; err={e}"))
        })?;
        tx.execute(
            "INSERT INTO _migrations (name, applied_at) VALUES (?1, datetime('now'))",
            params![name],
        )
        .map_err(db_unavailable)?;
        tx.commit().map_err(db_unavailable)?;
    }
    Ok(())
}

fn db_unavailable(e: rusqlite::Error) -> AppError {
    AppError::retryable("INDEX_UNAVAILABLE", "Chunk store operation failed")
        .with_details(e.to_string())
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(digest)
}

fn embedding_to_blob(v: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(v.len() * 4);
    for f in v {
        out.extend_from_slice(&f.to_le_bytes());
    }
    out
}

fn blob_to_embedding(blob: &[u8]) -> Result<Vec<f32>, AppError> {
    if blob.len() % 4 != 0 {
        return Err(AppError::new(
            "CHUNK_STORE_CORRUPT",
            "Stored embedding blob has a truncated length",
        )
        .with_details(format!("len={}", blob.len())));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine(a: &[f32], b: &[f32], a_norm: f32, b_norm: f32) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    dot / (a_norm * b_norm)
}
