//! In-memory report storage for tests.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only

use reportdesk_core::repository::RepositoryFuture;
use reportdesk_core::{
    Report, ReportId, ReportQuery, ReportRepository, ReportUpdate, RepositoryError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct State {
    // Insertion order breaks ties between equal `created_at` values.
    reports: Vec<Report>,
    index: HashMap<ReportId, usize>,
    sequences: HashMap<i32, u64>,
}

/// `HashMap`-backed [`ReportRepository`].
///
/// Listing is newest first; reports created at the same instant are ordered
/// by insertion, latest first, matching the `PostgreSQL` adapter.
///
/// Call [`fail_storage`](Self::fail_storage) to make every operation return
/// [`RepositoryError::Database`].
#[derive(Clone, Debug, Default)]
pub struct InMemoryReportRepository {
    state: Arc<RwLock<State>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryReportRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a report directly, bypassing sequence allocation.
    ///
    /// Useful to simulate identifiers minted by an older deployment.
    pub fn seed(&self, report: Report) {
        let mut state = self.state.write().unwrap();
        let position = state.reports.len();
        state.index.insert(report.id.clone(), position);
        state.reports.push(report);
    }

    /// Toggle simulated storage failure.
    pub fn fail_storage(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of stored reports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().unwrap().reports.len()
    }

    /// Whether no report is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database("simulated storage failure".to_string()));
        }
        Ok(())
    }
}

impl ReportRepository for InMemoryReportRepository {
    fn insert_report_with_updates<'a>(
        &'a self,
        report: &'a Report,
        updates: &'a [ReportUpdate; 3],
    ) -> RepositoryFuture<'a, ()> {
        Box::pin(async move {
            self.check()?;
            let mut state = self.state.write().unwrap();
            if state.index.contains_key(&report.id) {
                return Err(RepositoryError::Duplicate(report.id.clone()));
            }
            let mut stored = report.clone();
            stored.updates = updates.to_vec();
            let position = state.reports.len();
            state.index.insert(stored.id.clone(), position);
            state.reports.push(stored);
            Ok(())
        })
    }

    fn find_report<'a>(&'a self, id: &'a ReportId) -> RepositoryFuture<'a, Report> {
        Box::pin(async move {
            self.check()?;
            let state = self.state.read().unwrap();
            state
                .index
                .get(id)
                .map(|&i| state.reports[i].clone())
                .ok_or_else(|| RepositoryError::NotFound(id.clone()))
        })
    }

    fn list_reports<'a>(&'a self, query: &'a ReportQuery) -> RepositoryFuture<'a, Vec<Report>> {
        Box::pin(async move {
            self.check()?;
            let state = self.state.read().unwrap();
            let mut matching: Vec<(usize, &Report)> = state
                .reports
                .iter()
                .enumerate()
                .filter(|(_, r)| query.matches(r))
                .collect();
            matching.sort_by(|(ia, a), (ib, b)| {
                b.created_at.cmp(&a.created_at).then_with(|| ib.cmp(ia))
            });
            Ok(matching.into_iter().map(|(_, r)| r.clone()).collect())
        })
    }

    fn save_report<'a>(&'a self, report: &'a Report) -> RepositoryFuture<'a, ()> {
        Box::pin(async move {
            self.check()?;
            let mut state = self.state.write().unwrap();
            let position = *state
                .index
                .get(&report.id)
                .ok_or_else(|| RepositoryError::NotFound(report.id.clone()))?;
            let stored = &mut state.reports[position];
            stored.status = report.status;
            stored.updated_at = report.updated_at;
            Ok(())
        })
    }

    fn count_reports<'a>(&'a self, query: &'a ReportQuery) -> RepositoryFuture<'a, u64> {
        Box::pin(async move {
            self.check()?;
            let state = self.state.read().unwrap();
            Ok(state.reports.iter().filter(|r| query.matches(r)).count() as u64)
        })
    }

    fn next_sequence(&self, year: i32) -> RepositoryFuture<'_, u64> {
        Box::pin(async move {
            self.check()?;
            let mut state = self.state.write().unwrap();
            let existing = state
                .reports
                .iter()
                .filter(|r| r.id.year() == Some(year))
                .count() as u64;
            let counter = state.sequences.entry(year).or_insert(existing);
            *counter += 1;
            Ok(*counter)
        })
    }
}
