//! Relational storage backend, gated behind the `sqlite` feature.
//!
//! Schema, grounded directly on the reference system's SQLAlchemy models:
//!
//! ```text
//! CREATE TABLE params  (id INTEGER PRIMARY KEY CHECK (id = 0),
//!                       num_tables INTEGER, hash_size INTEGER, embedding_size INTEGER)
//! CREATE TABLE htables (htno INTEGER, i INTEGER, j INTEGER, val REAL,
//!                       PRIMARY KEY (htno, i, j))
//! CREATE TABLE findex  (vec_id TEXT, hash_bucket TEXT, euc_bucket TEXT,
//!                       PRIMARY KEY (vec_id, hash_bucket, euc_bucket))
//! ```
use crate::error::{Error, Result};
use crate::magnitude::MagnitudeKey;
use crate::params::IndexParams;
use crate::projector::HashCode;
use crate::store::IndexStore;
use fnv::FnvHashSet;
use ndarray::Array2;
use rusqlite::{params, Connection, OptionalExtension};

/// A store backed by a single `rusqlite::Connection` — a file path or
/// `:memory:` (handy for tests).
pub struct SqlStore {
    conn: Connection,
}

impl SqlStore {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             CREATE TABLE IF NOT EXISTS params (
                 id INTEGER PRIMARY KEY CHECK (id = 0),
                 num_tables INTEGER NOT NULL,
                 hash_size INTEGER NOT NULL,
                 embedding_size INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS htables (
                 htno INTEGER NOT NULL,
                 i INTEGER NOT NULL,
                 j INTEGER NOT NULL,
                 val REAL NOT NULL,
                 PRIMARY KEY (htno, i, j)
             );
             CREATE TABLE IF NOT EXISTS findex (
                 vec_id TEXT NOT NULL,
                 hash_bucket TEXT NOT NULL,
                 euc_bucket TEXT NOT NULL,
                 PRIMARY KEY (vec_id, hash_bucket, euc_bucket)
             );",
        )?;
        Ok(SqlStore { conn })
    }
}

impl IndexStore for SqlStore {
    fn is_initialised(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM params WHERE id = 0", [], |r| r.get(0))?;
        Ok(count > 0)
    }

    fn save_params(&mut self, params: &IndexParams) -> Result<()> {
        self.conn.execute(
            "INSERT INTO params (id, num_tables, hash_size, embedding_size) VALUES (0, ?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                 num_tables = excluded.num_tables,
                 hash_size = excluded.hash_size,
                 embedding_size = excluded.embedding_size",
            rusqlite::params![
                params.num_tables as i64,
                params.hash_size as i64,
                params.embedding_size as i64
            ],
        )?;
        Ok(())
    }

    fn load_params(&self) -> Result<IndexParams> {
        self.conn
            .query_row(
                "SELECT num_tables, hash_size, embedding_size FROM params WHERE id = 0",
                [],
                |r| {
                    let num_tables: i64 = r.get(0)?;
                    let hash_size: i64 = r.get(1)?;
                    let embedding_size: i64 = r.get(2)?;
                    Ok((num_tables, hash_size, embedding_size))
                },
            )
            .optional()?
            .map(|(t, h, d)| IndexParams::new(t as usize, h as usize, d as usize))
            .ok_or(Error::Uninitialised)?
    }

    fn save_matrices(&mut self, matrices: &[Array2<f64>]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO htables (htno, i, j, val) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(htno, i, j) DO UPDATE SET val = excluded.val",
            )?;
            for (t, m) in matrices.iter().enumerate() {
                for i in 0..m.nrows() {
                    for j in 0..m.ncols() {
                        stmt.execute(params![t as i64, i as i64, j as i64, m[[i, j]]])?;
                    }
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_matrices(&self) -> Result<Vec<Array2<f64>>> {
        let p = self.load_params()?;
        let mut out = Vec::with_capacity(p.num_tables);
        let mut stmt = self
            .conn
            .prepare("SELECT i, j, val FROM htables WHERE htno = ?1 ORDER BY i, j")?;
        for t in 0..p.num_tables {
            let mut m = Array2::<f64>::zeros((p.embedding_size, p.hash_size));
            let mut rows = stmt.query(params![t as i64])?;
            let mut seen = 0usize;
            while let Some(row) = rows.next()? {
                let i: i64 = row.get(0)?;
                let j: i64 = row.get(1)?;
                let val: f64 = row.get(2)?;
                m[[i as usize, j as usize]] = val;
                seen += 1;
            }
            if seen != p.embedding_size * p.hash_size {
                return Err(Error::StorageFailure(format!(
                    "hash table {} has {} persisted cells, expected {}",
                    t,
                    seen,
                    p.embedding_size * p.hash_size
                )));
            }
            out.push(m);
        }
        Ok(out)
    }

    fn put(&mut self, id: &str, codes: &[HashCode], magnitude_key: &MagnitudeKey) -> Result<()> {
        let mut distinct: Vec<HashCode> = codes.to_vec();
        distinct.sort_unstable();
        distinct.dedup();
        let mut stmt = self
            .conn
            .prepare_cached("INSERT OR IGNORE INTO findex (vec_id, hash_bucket, euc_bucket) VALUES (?1, ?2, ?3)")?;
        for code in distinct {
            // a primary-key conflict here means this exact (id, code, key)
            // triple was already recorded; `INSERT OR IGNORE` treats that
            // as success rather than an error.
            stmt.execute(params![id, code.to_string(), magnitude_key])?;
        }
        Ok(())
    }

    fn ids_in(&self, codes: &[HashCode], magnitude_keys: &[MagnitudeKey]) -> Result<FnvHashSet<String>> {
        if codes.is_empty() || magnitude_keys.is_empty() {
            return Ok(FnvHashSet::default());
        }
        // placeholders are positional only; every value still goes through
        // a bound parameter, so keys containing quotes or other special
        // characters can't affect the query.
        let code_placeholders = (1..=codes.len()).map(|n| format!("?{}", n)).collect::<Vec<_>>().join(",");
        let key_placeholders = (1..=magnitude_keys.len())
            .map(|n| format!("?{}", n + codes.len()))
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!(
            "SELECT DISTINCT vec_id FROM findex WHERE hash_bucket IN ({}) AND euc_bucket IN ({})",
            code_placeholders, key_placeholders
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let bound: Vec<Box<dyn rusqlite::ToSql>> = codes
            .iter()
            .map(|c| Box::new(c.to_string()) as Box<dyn rusqlite::ToSql>)
            .chain(magnitude_keys.iter().map(|k| Box::new(k.clone()) as Box<dyn rusqlite::ToSql>))
            .collect();
        let mut rows = stmt.query(rusqlite::params_from_iter(bound.iter()))?;
        let mut out = FnvHashSet::default();
        while let Some(row) = rows.next()? {
            out.insert(row.get(0)?);
        }
        Ok(out)
    }
}
