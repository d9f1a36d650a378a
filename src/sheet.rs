use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

/// One raw sheet row as the source hands it over: column name to raw JSON
/// cell, in source column order.
pub type RawRow = serde_json::Map<String, serde_json::Value>;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(180);

/// Where the raw rows come from. The pipeline only needs the full row list
/// materialized up front; it never streams and never writes back.
pub trait RecordSource {
    fn fetch(&self) -> anyhow::Result<Vec<RawRow>>;
    fn describe(&self) -> String;
}

/// Expect a JSON array of objects, the shape a "get all records" sheet
/// endpoint returns.
pub fn parse_rows(value: serde_json::Value) -> anyhow::Result<Vec<RawRow>> {
    let serde_json::Value::Array(items) = value else {
        bail!("sheet payload must be a JSON array of row objects");
    };
    let mut rows = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        let serde_json::Value::Object(row) = item else {
            bail!("sheet row {} is not an object", i);
        };
        rows.push(row);
    }
    Ok(rows)
}

pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl RecordSource for JsonFileSource {
    fn fetch(&self) -> anyhow::Result<Vec<RawRow>> {
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("read sheet file {}", self.path.display()))?;
        let value: serde_json::Value = serde_json::from_str(&text)
            .with_context(|| format!("parse sheet file {}", self.path.display()))?;
        parse_rows(value)
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

pub struct HttpJsonSource {
    url: String,
    client: reqwest::blocking::Client,
}

impl HttpJsonSource {
    pub fn new(url: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self { url, client })
    }
}

impl RecordSource for HttpJsonSource {
    fn fetch(&self) -> anyhow::Result<Vec<RawRow>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .with_context(|| format!("fetch sheet from {}", self.url))?
            .error_for_status()
            .with_context(|| format!("sheet endpoint {} returned an error", self.url))?;
        let value: serde_json::Value = response
            .json()
            .with_context(|| format!("decode sheet payload from {}", self.url))?;
        parse_rows(value)
    }

    fn describe(&self) -> String {
        format!("http:{}", self.url)
    }
}

struct Snapshot {
    rows: Vec<RawRow>,
    taken: Instant,
    fetched_at: DateTime<Utc>,
}

/// Read-through cache over the raw fetch. The whole dataset is the cache
/// unit, keyed by nothing but a timer; a hit returns the last fetch verbatim.
/// A failed refetch surfaces the error and leaves the old snapshot alone.
pub struct SheetCache {
    ttl: Duration,
    snapshot: Option<Snapshot>,
}

#[derive(Debug, Clone)]
pub struct CacheStatus {
    pub row_count: usize,
    pub age_secs: u64,
    pub fetched_at: DateTime<Utc>,
}

impl SheetCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, snapshot: None }
    }

    pub fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = ttl;
    }

    pub fn invalidate(&mut self) {
        self.snapshot = None;
    }

    pub fn rows(&mut self, source: &dyn RecordSource) -> anyhow::Result<Vec<RawRow>> {
        if let Some(snapshot) = &self.snapshot {
            if snapshot.taken.elapsed() < self.ttl {
                return Ok(snapshot.rows.clone());
            }
        }
        self.refetch(source)?;
        Ok(self
            .snapshot
            .as_ref()
            .map(|s| s.rows.clone())
            .unwrap_or_default())
    }

    /// Drop the timer and fetch now.
    pub fn refresh(&mut self, source: &dyn RecordSource) -> anyhow::Result<usize> {
        self.refetch(source)?;
        Ok(self.snapshot.as_ref().map(|s| s.rows.len()).unwrap_or(0))
    }

    fn refetch(&mut self, source: &dyn RecordSource) -> anyhow::Result<()> {
        let started = Instant::now();
        let rows = source.fetch()?;
        info!(
            source = %source.describe(),
            rows = rows.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sheet fetched"
        );
        self.snapshot = Some(Snapshot {
            rows,
            taken: Instant::now(),
            fetched_at: Utc::now(),
        });
        Ok(())
    }

    pub fn status(&self) -> Option<CacheStatus> {
        self.snapshot.as_ref().map(|s| CacheStatus {
            row_count: s.rows.len(),
            age_secs: s.taken.elapsed().as_secs(),
            fetched_at: s.fetched_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell as StdCell;
    use std::time::{SystemTime, UNIX_EPOCH};

    struct CountingSource {
        fetches: StdCell<usize>,
        rows: Vec<RawRow>,
    }

    impl CountingSource {
        fn new(rows: serde_json::Value) -> Self {
            Self {
                fetches: StdCell::new(0),
                rows: parse_rows(rows).expect("fixture rows"),
            }
        }
    }

    impl RecordSource for CountingSource {
        fn fetch(&self) -> anyhow::Result<Vec<RawRow>> {
            self.fetches.set(self.fetches.get() + 1);
            Ok(self.rows.clone())
        }

        fn describe(&self) -> String {
            "test:counting".to_string()
        }
    }

    #[test]
    fn payload_must_be_an_array_of_objects() {
        assert!(parse_rows(serde_json::json!({ "ID": "1" })).is_err());
        assert!(parse_rows(serde_json::json!([1, 2])).is_err());
        let rows = parse_rows(serde_json::json!([{ "ID": "1" }])).expect("rows");
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn cache_serves_the_same_snapshot_within_ttl() {
        let source = CountingSource::new(serde_json::json!([{ "ID": "1", "Name": "An" }]));
        let mut cache = SheetCache::new(Duration::from_secs(3600));
        let first = cache.rows(&source).expect("first fetch");
        let second = cache.rows(&source).expect("cache hit");
        assert_eq!(source.fetches.get(), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn zero_ttl_refetches_every_time() {
        let source = CountingSource::new(serde_json::json!([{ "ID": "1" }]));
        let mut cache = SheetCache::new(Duration::from_secs(0));
        let _ = cache.rows(&source).expect("fetch");
        let _ = cache.rows(&source).expect("fetch again");
        assert_eq!(source.fetches.get(), 2);
    }

    #[test]
    fn refresh_forces_a_fetch_inside_the_ttl_window() {
        let source = CountingSource::new(serde_json::json!([{ "ID": "1" }]));
        let mut cache = SheetCache::new(Duration::from_secs(3600));
        let _ = cache.rows(&source).expect("fetch");
        let count = cache.refresh(&source).expect("refresh");
        assert_eq!(count, 1);
        assert_eq!(source.fetches.get(), 2);
    }

    #[test]
    fn file_source_reads_a_json_sheet() {
        let dir = std::env::temp_dir().join(format!(
            "classreportd-sheet-{}",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        let path = dir.join("sheet.json");
        std::fs::write(&path, r#"[{ "ID": "1", "Name": "An" }]"#).expect("write fixture");

        let source = JsonFileSource::new(path);
        let rows = source.fetch().expect("fetch");
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].get("Name").and_then(|v| v.as_str()),
            Some("An")
        );
        let _ = std::fs::remove_dir_all(dir);
    }
}
