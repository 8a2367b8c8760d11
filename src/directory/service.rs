//! Cached mirror of the upstream student directory
//!
//! [`DirectoryService`] fetches the full student list from a single REST
//! endpoint (`<api_url>/students`), keeps it in memory for a fixed freshness
//! window, and answers lookup queries by linear scan over the cached list.
//!
//! # Failure semantics
//!
//! The service never surfaces an error to its callers. A failed refresh is
//! logged at WARN and the previous cache content is served when present
//! (otherwise an empty list); the stale timestamp is kept so the next read
//! retries the upstream. A successful fetch replaces the cache wholesale.
//! Concurrent refreshes may duplicate a fetch; last writer wins.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::directory::student::Student;

/// Source of monotonic time for cache freshness checks.
///
/// Injectable so that tests can advance time without sleeping.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// The current instant.
    fn now(&self) -> Instant;
}

/// Production [`Clock`] backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// One cached snapshot of the upstream student list.
#[derive(Debug, Clone)]
struct CacheEntry {
    students: Vec<Student>,
    fetched_at: Instant,
}

/// Time-bounded in-memory mirror of the upstream student list.
///
/// Cheap to share: wrap in an [`Arc`] and clone the `Arc`. All methods take
/// `&self`; the cache is interior-mutable behind a [`RwLock`].
#[derive(Debug)]
pub struct DirectoryService {
    http: reqwest::Client,
    api_url: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    cache: RwLock<Option<CacheEntry>>,
}

impl DirectoryService {
    /// Create a service that fetches from `<api_url>/students` and keeps
    /// records fresh for `ttl`.
    pub fn new(api_url: impl Into<String>, ttl: Duration) -> Self {
        Self::with_clock(api_url, ttl, Arc::new(SystemClock))
    }

    /// Create a service with an explicit [`Clock`], for freshness tests.
    pub fn with_clock(api_url: impl Into<String>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into(),
            ttl,
            clock,
            cache: RwLock::new(None),
        }
    }

    /// The upstream base URL this service fetches from.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Return the full student list, refreshing the cache when it is absent
    /// or older than the freshness window.
    ///
    /// Never returns an error: a failed refresh serves the previous content
    /// (or an empty list when there is none) and leaves the cache untouched
    /// so the next read retries.
    pub async fn get_all(&self) -> Vec<Student> {
        let now = self.clock.now();

        {
            let guard = self.cache.read().await;
            if let Some(entry) = guard.as_ref() {
                let age = now.duration_since(entry.fetched_at);
                if age <= self.ttl {
                    tracing::debug!(
                        age_secs = age.as_secs(),
                        count = entry.students.len(),
                        "serving cached student directory"
                    );
                    return entry.students.clone();
                }
            }
        }

        tracing::info!("student directory cache expired or empty, fetching from upstream");
        match self.fetch_students().await {
            Ok(students) => {
                tracing::info!(count = students.len(), "student directory cache refreshed");
                let mut guard = self.cache.write().await;
                *guard = Some(CacheEntry {
                    students: students.clone(),
                    fetched_at: self.clock.now(),
                });
                students
            }
            Err(e) => {
                tracing::warn!("failed to refresh student directory: {e}");
                let guard = self.cache.read().await;
                guard
                    .as_ref()
                    .map(|entry| entry.students.clone())
                    .unwrap_or_default()
            }
        }
    }

    /// Number of records in the current (possibly refreshed) cache.
    pub async fn count(&self) -> usize {
        self.get_all().await.len()
    }

    /// Look up a student by upstream identifier.
    pub async fn get_by_id(&self, id: i64) -> Option<Student> {
        let students = self.get_all().await;
        let found = students.into_iter().find(|s| s.student_id == id);
        if found.is_none() {
            tracing::warn!(id, "no student found with requested id");
        }
        found
    }

    /// Look up a student by full name (`"First Last"`).
    ///
    /// The name is split on the first whitespace into exactly two trimmed
    /// parts; anything else returns `None`. Both parts are compared
    /// case-insensitively against the record's first and last name.
    pub async fn get_by_full_name(&self, name: &str) -> Option<Student> {
        let Some((first, last)) = split_full_name(name) else {
            tracing::warn!(name, "invalid name format, expected 'FirstName LastName'");
            return None;
        };

        let students = self.get_all().await;

        for s in &students {
            if s.first_name.to_lowercase().contains(&first.to_lowercase()) {
                tracing::debug!(
                    first_name = %s.first_name,
                    last_name = %s.last_name,
                    "partial first name match"
                );
            }
        }

        let found = students.into_iter().find(|s| {
            eq_ignore_case(&s.first_name, &first) && eq_ignore_case(&s.last_name, &last)
        });
        if found.is_none() {
            tracing::warn!(name, "no student found with requested name");
        }
        found
    }

    /// All students enrolled at the given school (case-insensitive equality).
    pub async fn get_by_school(&self, school: &str) -> Vec<Student> {
        let matches: Vec<Student> = self
            .get_all()
            .await
            .into_iter()
            .filter(|s| eq_ignore_case(&s.school, school))
            .collect();
        if matches.is_empty() {
            tracing::warn!(school, "no students found for school");
        }
        matches
    }

    /// All students with the given last name (case-insensitive equality).
    pub async fn get_by_last_name(&self, last_name: &str) -> Vec<Student> {
        let matches: Vec<Student> = self
            .get_all()
            .await
            .into_iter()
            .filter(|s| eq_ignore_case(&s.last_name, last_name))
            .collect();
        if matches.is_empty() {
            tracing::warn!(last_name, "no students found with last name");
        }
        matches
    }

    /// All students with the given first name (case-insensitive equality).
    pub async fn get_by_first_name(&self, first_name: &str) -> Vec<Student> {
        let matches: Vec<Student> = self
            .get_all()
            .await
            .into_iter()
            .filter(|s| eq_ignore_case(&s.first_name, first_name))
            .collect();
        if matches.is_empty() {
            tracing::warn!(first_name, "no students found with first name");
        }
        matches
    }

    /// One upstream fetch of the full student list.
    async fn fetch_students(&self) -> crate::error::Result<Vec<Student>> {
        let url = format!("{}/students", self.api_url.trim_end_matches('/'));
        tracing::info!(%url, "fetching students from upstream");
        let response = self.http.get(&url).send().await?.error_for_status()?;
        let students: Vec<Student> = response.json().await?;
        Ok(students)
    }

    /// Seed the cache directly, bypassing the upstream fetch.
    #[cfg(test)]
    pub(crate) async fn prime_cache(&self, students: Vec<Student>) {
        let mut guard = self.cache.write().await;
        *guard = Some(CacheEntry {
            students,
            fetched_at: self.clock.now(),
        });
    }
}

/// Split `"First Last"` on the first whitespace into two trimmed,
/// non-empty parts.
fn split_full_name(name: &str) -> Option<(String, String)> {
    let (first, last) = name.trim().split_once(char::is_whitespace)?;
    let first = first.trim();
    let last = last.trim();
    if first.is_empty() || last.is_empty() {
        return None;
    }
    Some((first.to_string(), last.to_string()))
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}
