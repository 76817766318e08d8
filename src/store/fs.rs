//! Filesystem storage backend: one directory per index, laid out as
//!
//! ```text
//! <root>/params.json
//! <root>/hash_tables/ht<t>.bin
//! <root>/buckets/<code>/<mag_key>/idx.txt
//! <root>/global_idx.txt
//! ```
use crate::error::{Error, Result};
use crate::magnitude::MagnitudeKey;
use crate::params::IndexParams;
use crate::projector::{read_matrix, write_matrix, HashCode};
use crate::store::IndexStore;
use fnv::FnvHashSet;
use ndarray::Array2;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// A store rooted at an on-disk directory. The directory need not exist
/// yet when the value is constructed — `save_params` creates the full tree.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsStore { root: root.into() }
    }

    fn params_file(&self) -> PathBuf {
        self.root.join("params.json")
    }

    fn hash_tables_dir(&self) -> PathBuf {
        self.root.join("hash_tables")
    }

    fn hash_table_file(&self, t: usize) -> PathBuf {
        self.hash_tables_dir().join(format!("ht{}.bin", t))
    }

    fn buckets_dir(&self) -> PathBuf {
        self.root.join("buckets")
    }

    fn bucket_idx_file(&self, code: HashCode, key: &MagnitudeKey) -> PathBuf {
        self.buckets_dir().join(code.to_string()).join(key).join("idx.txt")
    }

    fn global_idx_file(&self) -> PathBuf {
        self.root.join("global_idx.txt")
    }

    /// Appends a single LF-terminated line to `path`, creating parent
    /// directories and the file itself as needed.
    fn append_line(path: &Path, line: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut f = OpenOptions::new().create(true).append(true).open(path)?;
        f.write_all(line.as_bytes())?;
        f.write_all(b"\n")?;
        Ok(())
    }

    /// Reads every non-empty, fully LF-terminated line of `path`. A crash
    /// mid-append can leave a partial final line with no trailing `\n`;
    /// that line is silently dropped rather than returned half-written.
    fn read_complete_lines(path: &Path) -> Result<Vec<String>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read(path)?;
        let ends_with_newline = raw.last() == Some(&b'\n');
        let reader = BufReader::new(raw.as_slice());
        let mut lines: Vec<String> = reader.lines().filter_map(|l| l.ok()).collect();
        if !ends_with_newline && !lines.is_empty() {
            lines.pop();
        }
        Ok(lines.into_iter().filter(|l| !l.is_empty()).collect())
    }
}

impl IndexStore for FsStore {
    fn is_initialised(&self) -> Result<bool> {
        match fs::read_dir(&self.root) {
            Ok(mut entries) => Ok(entries.next().is_some()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn save_params(&mut self, params: &IndexParams) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        fs::create_dir_all(self.hash_tables_dir())?;
        fs::create_dir_all(self.buckets_dir())?;
        let mut f = File::create(self.params_file())?;
        f.write_all(params.to_json()?.as_bytes())?;
        Ok(())
    }

    fn load_params(&self) -> Result<IndexParams> {
        let raw = fs::read_to_string(self.params_file())?;
        IndexParams::from_json(&raw)
    }

    fn save_matrices(&mut self, matrices: &[Array2<f64>]) -> Result<()> {
        fs::create_dir_all(self.hash_tables_dir())?;
        for (t, m) in matrices.iter().enumerate() {
            let mut f = File::create(self.hash_table_file(t))?;
            write_matrix(&mut f, m)?;
        }
        Ok(())
    }

    fn load_matrices(&self) -> Result<Vec<Array2<f64>>> {
        let params = self.load_params()?;
        (0..params.num_tables)
            .map(|t| {
                let mut f = File::open(self.hash_table_file(t)).map_err(|e| {
                    Error::StorageFailure(format!(
                        "missing hash table file {}: {}",
                        self.hash_table_file(t).display(),
                        e
                    ))
                })?;
                read_matrix(&mut f)
            })
            .collect()
    }

    fn put(&mut self, id: &str, codes: &[HashCode], magnitude_key: &MagnitudeKey) -> Result<()> {
        let mut distinct: Vec<HashCode> = codes.to_vec();
        distinct.sort_unstable();
        distinct.dedup();
        for code in distinct {
            Self::append_line(&self.bucket_idx_file(code, magnitude_key), id)?;
        }
        Self::append_line(&self.global_idx_file(), id)?;
        Ok(())
    }

    fn ids_in(&self, codes: &[HashCode], magnitude_keys: &[MagnitudeKey]) -> Result<FnvHashSet<String>> {
        let mut out = FnvHashSet::default();
        for &code in codes {
            for key in magnitude_keys {
                let path = self.bucket_idx_file(code, key);
                for id in Self::read_complete_lines(&path)? {
                    out.insert(id);
                }
            }
        }
        Ok(out)
    }
}
