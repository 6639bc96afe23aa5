//! Snapshot store: one `WeeklyRanking` document per (category, week id).
//!
//! Point lookups and history queries run against an in-memory keyed index;
//! the directory is scanned exactly once, at open. Writes go through a
//! temp-file-then-rename so a failed write never leaves a half-written
//! snapshot, and a write whose `generated_at` is older than the stored
//! snapshot's is rejected so a slow stale run cannot clobber a newer one.
//!
//! A missing snapshot is a normal "no data yet" outcome, never an error.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::Utc;
use metrics::counter;
use thiserror::Error;

use crate::model::{ProductTrendPoint, WeeklyRanking};
use crate::week;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to persist snapshot {category}/{week_id}")]
    Write {
        category: String,
        week_id: String,
        #[source]
        source: std::io::Error,
    },
    #[error("stale write rejected for {category}/{week_id}")]
    StaleWrite { category: String, week_id: String },
    #[error("failed to encode snapshot")]
    Encode(#[from] serde_json::Error),
}

type StoreKey = (String, String); // (category, week id)

pub struct SnapshotStore {
    dir: Option<PathBuf>,
    index: RwLock<BTreeMap<StoreKey, WeeklyRanking>>,
}

impl SnapshotStore {
    /// Volatile store for tests and embedded use.
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            index: RwLock::new(BTreeMap::new()),
        }
    }

    /// Open a persistent store, loading every snapshot under `dir` into the
    /// index. Unreadable files are skipped with a warning; they do not block
    /// the boot.
    pub fn open<P: AsRef<Path>>(dir: P) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut index = BTreeMap::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read_to_string(&path)
                .map_err(anyhow::Error::from)
                .and_then(|s| Ok(serde_json::from_str::<WeeklyRanking>(&s)?))
            {
                Ok(ranking) => {
                    index.insert(
                        (ranking.category.clone(), ranking.week_id.clone()),
                        ranking,
                    );
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = ?e, "skipping unreadable snapshot");
                }
            }
        }
        tracing::info!(snapshots = index.len(), dir = %dir.display(), "snapshot store opened");

        Ok(Self {
            dir: Some(dir),
            index: RwLock::new(index),
        })
    }

    /// Full overwrite of the keyed entry, last-writer-wins. The write lock is
    /// held across the disk rename, which keeps concurrent regenerations of
    /// the same key single-writer.
    pub fn save(&self, ranking: WeeklyRanking) -> Result<(), StoreError> {
        let key = (ranking.category.clone(), ranking.week_id.clone());
        let mut index = self.index.write().expect("store lock poisoned");

        if let Some(existing) = index.get(&key) {
            if existing.generated_at > ranking.generated_at {
                counter!("ranking_stale_writes_total").increment(1);
                tracing::warn!(
                    category = %key.0,
                    week = %key.1,
                    "rejecting stale snapshot write"
                );
                return Err(StoreError::StaleWrite {
                    category: key.0,
                    week_id: key.1,
                });
            }
        }

        if let Some(dir) = &self.dir {
            self.persist(dir, &ranking)?;
        }
        index.insert(key, ranking);
        counter!("ranking_snapshots_written_total").increment(1);
        Ok(())
    }

    fn persist(&self, dir: &Path, ranking: &WeeklyRanking) -> Result<(), StoreError> {
        let json = serde_json::to_string(ranking)?;
        let path = snapshot_path(dir, &ranking.category, &ranking.week_id);
        let tmp = path.with_extension("json.tmp");

        let write = || -> std::io::Result<()> {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(json.as_bytes())?;
            fs::rename(&tmp, &path)?;
            Ok(())
        };
        write().map_err(|source| StoreError::Write {
            category: ranking.category.clone(),
            week_id: ranking.week_id.clone(),
            source,
        })
    }

    pub fn get(&self, category: &str, week_id: &str) -> Option<WeeklyRanking> {
        let index = self.index.read().expect("store lock poisoned");
        index.get(&(category.to_string(), week_id.to_string())).cloned()
    }

    pub fn get_current(&self, category: &str) -> Option<WeeklyRanking> {
        self.get(category, &week::current_week_id())
    }

    /// All snapshots for a category, most recent week first. Week ids sort
    /// lexically in chronological order, so the index order is enough.
    pub fn get_history(&self, category: &str, limit: Option<usize>) -> Vec<WeeklyRanking> {
        let index = self.index.read().expect("store lock poisoned");
        let mut out: Vec<WeeklyRanking> = index
            .iter()
            .filter(|((cat, _), _)| cat == category)
            .map(|(_, r)| r.clone())
            .collect();
        out.reverse();
        if let Some(limit) = limit {
            out.truncate(limit);
        }
        out
    }

    /// Week-by-week placement of one product across the category's history,
    /// oldest week first. `rank`/`score` are `None` for weeks where the
    /// product missed the top-N.
    pub fn get_product_trend(&self, product_id: &str, category: &str) -> Vec<ProductTrendPoint> {
        let index = self.index.read().expect("store lock poisoned");
        index
            .iter()
            .filter(|((cat, _), _)| cat == category)
            .map(|(_, ranking)| {
                let entry = ranking.entry_for(product_id);
                ProductTrendPoint {
                    week_start: ranking.week_start,
                    week_id: ranking.week_id.clone(),
                    rank: entry.map(|e| e.rank),
                    score: entry.map(|e| e.score),
                }
            })
            .collect()
    }

    /// Rank of the product in the snapshot exactly one week before the
    /// current week; `None` when that snapshot is absent or the product was
    /// not ranked in it.
    pub fn get_previous_rank(&self, product_id: &str, category: &str) -> Option<u32> {
        let previous = week::previous_week_id(Utc::now());
        self.get(category, &previous)
            .and_then(|r| r.entry_for(product_id).map(|e| e.rank))
    }
}

fn category_slug(category: &str) -> String {
    category
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

fn snapshot_path(dir: &Path, category: &str, week_id: &str) -> PathBuf {
    dir.join(format!("{}__{}.json", category_slug(category), week_id))
}
