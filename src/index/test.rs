//! End-to-end scenarios cutting across `Projector`, `IndexStore` and
//! `BoundedTopK`.
use super::*;
use crate::error::MapperError;
use crate::store::fs::FsStore;
#[cfg(feature = "sqlite")]
use crate::store::sql::SqlStore;
use ndarray::arr1;
use std::collections::HashMap;
use tempfile::tempdir;

fn mapper_over(table: HashMap<String, Vec<f64>>) -> impl Mapper {
    move |id: &str| {
        table
            .get(id)
            .cloned()
            .ok_or_else(|| MapperError::Miss(id.to_string()))
    }
}

#[test]
fn test_recall_of_self_is_exact() {
    let params = IndexParams::new(16, 6, 5).unwrap();
    let dir = tempdir().unwrap();
    let mut index = Index::init(params, FsStore::new(dir.path()), 1234).unwrap();

    let v = arr1(&[0.4, -1.2, 3.3, 0.0, -0.7]);
    index.add("self", v.view()).unwrap();
    let mut table = HashMap::new();
    table.insert("self".to_string(), v.to_vec());
    let mapper = mapper_over(table);

    let report = index.query(v.view(), 1, &mapper, 2).unwrap();
    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.matches[0].0, "self");
    assert_eq!(report.matches[0].1, 0.0);
}

#[test]
fn test_s2_approximate_recall_against_brute_force() {
    use crate::utils::{create_rng, l2_norm};
    use rand::Rng;
    use std::collections::HashSet;

    let dim = 8;
    let params = IndexParams::new(24, 6, dim).unwrap();
    let dir = tempdir().unwrap();
    let mut index = Index::init(params, FsStore::new(dir.path()), 777).unwrap();

    let mut rng = create_rng(555);
    let mut table = HashMap::new();
    let mut vectors: Vec<(String, Vec<f64>)> = Vec::new();
    for i in 0..100 {
        let id = format!("v{}", i);
        let v: Vec<f64> = (0..dim).map(|_| rng.gen_range(-5.0, 5.0)).collect();
        index.add(id.as_str(), arr1(&v).view()).unwrap();
        table.insert(id.clone(), v.clone());
        vectors.push((id, v));
    }
    let mapper = mapper_over(table);

    // Querying with one of the indexed vectors itself guarantees the
    // brute-force top-2 includes it at distance 0, so a passing assertion
    // documents recall rather than asserting an exact match on an
    // approximate index.
    let (query_id, query_v) = vectors[42].clone();
    let query = arr1(&query_v);

    let mut brute: Vec<(String, f64)> = vectors
        .iter()
        .map(|(id, v)| {
            let candidate = arr1(v);
            let diff = &candidate - &query;
            (id.clone(), l2_norm(diff.view()))
        })
        .collect();
    brute.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
    let brute_top2: HashSet<String> = brute[..2].iter().map(|(id, _)| id.clone()).collect();

    let report = index.query(query.view(), 2, &mapper, 2).unwrap();
    let index_top2: HashSet<String> = report.matches.iter().map(|(id, _)| id.clone()).collect();

    assert!(
        !index_top2.is_disjoint(&brute_top2),
        "expected index top-2 {:?} to intersect brute-force top-2 {:?} for query {}",
        index_top2,
        brute_top2,
        query_id
    );
}

#[test]
fn test_s1_seeded_query_finds_nearest() {
    // T=4, H=2, D=3. The query is a positive scalar multiple of "near",
    // so every projection matrix — whatever this fixed seed happens to
    // sample — assigns it the exact same sign pattern as "near" in every
    // table: the collision is guaranteed, not just likely.
    let params = IndexParams::new(4, 2, 3).unwrap();
    let dir = tempdir().unwrap();
    let store = FsStore::new(dir.path());
    let mut index = Index::init(params, store, 42).unwrap();

    let vectors = vec![
        ("near", vec![1.0, 0.0, 0.0]),
        ("far", vec![-1.0, -1.0, -1.0]),
        ("mid", vec![0.2, 0.3, -0.1]),
    ];
    let mut table = HashMap::new();
    for (id, v) in &vectors {
        index.add(*id, arr1(v).view()).unwrap();
        table.insert(id.to_string(), v.clone());
    }
    let mapper = mapper_over(table);

    let query = arr1(&[0.95, 0.0, 0.0]);
    let report = index.query(query.view(), 2, &mapper, 2).unwrap();

    assert!(!report.matches.is_empty());
    assert_eq!(report.matches[0].0, "near");
}

#[test]
fn test_s3_double_init_fails() {
    let params = IndexParams::new(3, 4, 5).unwrap();
    let dir = tempdir().unwrap();
    let store = FsStore::new(dir.path());
    let index = Index::init(params, store, 7).unwrap();
    let params_after_first = index.params();

    let store_again = FsStore::new(dir.path());
    let err = Index::init(params, store_again, 999).unwrap_err();
    assert!(matches!(err, Error::AlreadyInitialised));

    // params on disk are unaffected by the failed re-init
    let reopened = Index::open(FsStore::new(dir.path())).unwrap();
    assert_eq!(reopened.params(), params_after_first);
}

#[test]
fn test_s4_tolerates_crash_mid_add() {
    let params = IndexParams::new(2, 3, 2).unwrap();
    let dir = tempdir().unwrap();
    let store = FsStore::new(dir.path());
    let mut index = Index::init(params, store, 11).unwrap();

    let v = arr1(&[1.0, 1.0]);
    index.add("whole", v.view()).unwrap();

    // simulate a crash: corrupt every bucket file this vector landed in
    // with a dangling partial line.
    let buckets_root = dir.path().join("buckets");
    for code_dir in std::fs::read_dir(&buckets_root).unwrap() {
        let code_dir = code_dir.unwrap().path();
        for mag_dir in std::fs::read_dir(&code_dir).unwrap() {
            let idx_file = mag_dir.unwrap().path().join("idx.txt");
            use std::io::Write;
            let mut f = std::fs::OpenOptions::new().append(true).open(&idx_file).unwrap();
            f.write_all(b"partia").unwrap();
        }
    }

    let reopened = Index::open(FsStore::new(dir.path())).unwrap();
    let mut table = HashMap::new();
    table.insert("whole".to_string(), vec![1.0, 1.0]);
    let mapper = mapper_over(table);

    let report = reopened.query(v.view(), 5, &mapper, 2).unwrap();
    let ids: Vec<&str> = report.matches.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, vec!["whole"]);
    // the dangling "partia" fragment must never surface as a candidate id
    assert!(!ids.contains(&"partia"));
}

#[test]
fn test_s5_mapper_miss_rate_reported() {
    // Every stored vector and the query itself are positive scalar
    // multiples of the same base direction, so all 20 inserts and the
    // query are guaranteed to share a hash code in every table and a
    // magnitude key close enough to fall within the default radius —
    // the bucket collision is deterministic, independent of the seed.
    let params = IndexParams::new(3, 3, 2).unwrap();
    let dir = tempdir().unwrap();
    let store = FsStore::new(dir.path());
    let mut index = Index::init(params, store, 5).unwrap();

    let mut table = HashMap::new();
    for i in 0..20 {
        let id = format!("v{}", i);
        let scale = 1.0 + i as f64 * 0.001;
        let v = arr1(&[0.0, scale]);
        index.add(id.as_str(), v.view()).unwrap();
        // withhold every tenth vector from the mapper to force misses.
        if i % 10 != 0 {
            table.insert(id, vec![0.0, scale]);
        }
    }
    let mapper = mapper_over(table);

    let query = arr1(&[0.0, 1.0]);
    let report = index.query(query.view(), 20, &mapper, 2).unwrap();

    assert_eq!(report.mapper_misses, 2);
    assert_eq!(report.mapper_failures, 0);
    assert_eq!(report.matches.len(), 18);
}

#[test]
fn test_s6_query_sweeps_neighbouring_magnitude_buckets() {
    // The query is `stored` scaled by a positive 1.02, so every table's
    // hash code is guaranteed to collide, but its magnitude key lands one
    // 0.1 step away from `stored`'s ("5d1" vs "5d0") — this only succeeds
    // if `query` actually sweeps neighbouring magnitude buckets, not just
    // the exact one.
    let params = IndexParams::new(8, 3, 2).unwrap();
    let dir = tempdir().unwrap();
    let store = FsStore::new(dir.path());
    let mut index = Index::init(params, store, 3).unwrap();

    let stored = arr1(&[3.0, 4.0]); // norm 5.0 -> "5d0"
    index.add("stored", stored.view()).unwrap();
    let mut table = HashMap::new();
    table.insert("stored".to_string(), vec![3.0, 4.0]);
    let mapper = mapper_over(table);

    let query = arr1(&[3.06, 4.08]); // 1.02x stored, norm 5.1 -> "5d1"
    let report = index
        .query(query.view(), 1, &mapper, crate::constants::DEFAULT_MAGNITUDE_RADIUS)
        .unwrap();

    assert_eq!(report.matches.first().map(|(id, _)| id.as_str()), Some("stored"));
}

#[test]
fn test_dimension_mismatch_rejected() {
    let params = IndexParams::new(2, 2, 3).unwrap();
    let dir = tempdir().unwrap();
    let store = FsStore::new(dir.path());
    let mut index = Index::init(params, store, 1).unwrap();
    let err = index.add("x", arr1(&[1.0, 2.0]).view()).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { .. }));
}

#[test]
fn test_empty_id_rejected() {
    let params = IndexParams::new(2, 2, 2).unwrap();
    let dir = tempdir().unwrap();
    let store = FsStore::new(dir.path());
    let mut index = Index::init(params, store, 1).unwrap();
    let err = index.add("", arr1(&[1.0, 2.0]).view()).unwrap_err();
    assert!(matches!(err, Error::EmptyId));
}

#[test]
fn test_add_batch_matches_sequential_add() {
    let params = IndexParams::new(4, 3, 2).unwrap();

    let dir_batch = tempdir().unwrap();
    let mut batch_index = Index::init(params, FsStore::new(dir_batch.path()), 77).unwrap();
    let items: Vec<(VectorId, Embedding)> = vec![
        ("a".to_string(), arr1(&[1.0, 2.0])),
        ("b".to_string(), arr1(&[3.0, -1.0])),
        ("c".to_string(), arr1(&[0.0, 0.0])),
    ];
    batch_index.add_batch(&items).unwrap();

    let dir_seq = tempdir().unwrap();
    let mut seq_index = Index::init(params, FsStore::new(dir_seq.path()), 77).unwrap();
    for (id, v) in &items {
        seq_index.add(id.clone(), v.view()).unwrap();
    }

    let mut table = HashMap::new();
    for (id, v) in &items {
        table.insert(id.clone(), v.to_vec());
    }
    let mapper = mapper_over(table);

    let query = arr1(&[1.0, 2.0]);
    let batch_report = batch_index.query(query.view(), 3, &mapper, 2).unwrap();
    let seq_report = seq_index.query(query.view(), 3, &mapper, 2).unwrap();
    assert_eq!(batch_report.matches, seq_report.matches);
}

#[cfg(feature = "sqlite")]
#[test]
fn test_fs_and_sql_backends_agree() {
    let params = IndexParams::new(6, 3, 3).unwrap();
    let seed = 2024;

    let dir = tempdir().unwrap();
    let mut fs_index = Index::init(params, FsStore::new(dir.path()), seed).unwrap();
    let mut sql_index = Index::init(params, SqlStore::in_memory().unwrap(), seed).unwrap();

    let vectors = vec![
        ("a", vec![1.0, 0.0, 0.0]),
        ("b", vec![0.0, 1.0, 0.0]),
        ("c", vec![0.9, 0.1, 0.0]),
        ("d", vec![-2.0, -2.0, -2.0]),
    ];
    let mut table = HashMap::new();
    for (id, v) in &vectors {
        fs_index.add(*id, arr1(v).view()).unwrap();
        sql_index.add(*id, arr1(v).view()).unwrap();
        table.insert(id.to_string(), v.clone());
    }
    let mapper = mapper_over(table);

    let query = arr1(&[0.95, 0.05, 0.0]);
    let fs_report = fs_index.query(query.view(), 2, &mapper, 2).unwrap();
    let sql_report = sql_index.query(query.view(), 2, &mapper, 2).unwrap();

    assert_eq!(fs_report.matches, sql_report.matches);
}
