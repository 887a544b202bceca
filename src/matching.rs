use std::sync::mpsc;
use std::time::Duration;

use indicatif::ProgressBar;
use rayon::prelude::*;

use crate::cache::{CacheStore, MatchRecord};
use crate::{Error, Result};

/// Worker pool size: a fixed fraction of the available cores, rounded down,
/// never zero.
pub fn worker_count(ratio: f64) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    ((ratio * cores as f64).floor() as usize).max(1)
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// K nearest neighbors of every descriptor in `desc_i` among `desc_j`, by
/// Euclidean distance. Rows are sorted ascending by distance with ties
/// broken by ascending column index; each row holds min(k, |desc_j|)
/// entries.
pub fn knn_from_descriptors(desc_i: &[Vec<f32>], desc_j: &[Vec<f32>], k: usize) -> MatchRecord {
    let keep = k.min(desc_j.len());
    let mut indices = Vec::with_capacity(desc_i.len());
    let mut distances = Vec::with_capacity(desc_i.len());
    for a in desc_i {
        let mut row: Vec<(f32, usize)> = desc_j
            .iter()
            .enumerate()
            .map(|(col, b)| (euclidean(a, b), col))
            .collect();
        row.sort_by(|x, y| {
            x.0.partial_cmp(&y.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(x.1.cmp(&y.1))
        });
        row.truncate(keep);
        indices.push(row.iter().map(|&(_, col)| col).collect());
        distances.push(row.iter().map(|&(d, _)| d).collect());
    }
    MatchRecord { indices, distances }
}

/// Computes and persists one pair's match record. Hard skip when the record
/// already exists; staleness is not checked.
pub fn compute_pair_matches(store: &CacheStore, i: usize, j: usize, k: usize) -> Result<bool> {
    if store.has_matches(i, j) {
        log::trace!("match cache hit for pair ({}, {})", i, j);
        return Ok(false);
    }
    let desc_i = store.load_features(i)?.descriptors;
    let desc_j = store.load_features(j)?.descriptors;
    let record = knn_from_descriptors(&desc_i, &desc_j, k);
    store.write_matches(i, j, &record)?;
    Ok(true)
}

/// Runs the match stage for a batch of pairs on a bounded worker pool.
/// Workers signal each finished item over a channel; the calling thread
/// polls the channel at a ~1 s cadence to drive the progress bar, then
/// blocks until the pool has drained. A failed worker fails the batch.
/// Returns the number of records actually computed (skips excluded).
pub fn build_match_caches(
    store: &CacheStore,
    pairs: &[(usize, usize)],
    k: usize,
    worker_ratio: f64,
) -> Result<usize> {
    if pairs.is_empty() {
        return Ok(0);
    }
    let workers = worker_count(worker_ratio);
    log::info!(
        "matching {} pairs on {} workers",
        pairs.len(),
        workers
    );
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| Error::Pool(e.to_string()))?;

    let (tx, rx) = mpsc::channel::<bool>();
    let total = pairs.len() as u64;
    let batch: Vec<(usize, usize)> = pairs.to_vec();
    let worker_store = store.clone();
    let handle = std::thread::spawn(move || -> Result<()> {
        pool.install(|| {
            batch.par_iter().try_for_each_with(tx, |tx, &(i, j)| {
                let computed = compute_pair_matches(&worker_store, i, j, k)?;
                let _ = tx.send(computed);
                Ok(())
            })
        })
    });

    let progress = ProgressBar::new(total);
    let mut done = 0u64;
    let mut computed = 0usize;
    loop {
        while let Ok(was_computed) = rx.try_recv() {
            done += 1;
            if was_computed {
                computed += 1;
            }
        }
        progress.set_position(done);
        if handle.is_finished() {
            break;
        }
        std::thread::sleep(Duration::from_secs(1));
    }
    handle
        .join()
        .map_err(|_| Error::Pool("match worker panicked".to_string()))??;
    // Drain anything that raced with the final poll.
    while let Ok(was_computed) = rx.try_recv() {
        done += 1;
        if was_computed {
            computed += 1;
        }
    }
    progress.set_position(done);
    progress.finish_and_clear();
    log::info!("match stage done: {} computed, {} cached", computed, done as usize - computed);
    Ok(computed)
}
