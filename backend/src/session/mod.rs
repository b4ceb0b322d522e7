//! Working sessions.
//!
//! A [`Session`] keeps the table as ingested (the restore point) next to
//! the working table every transform and filter produces. Sessions are
//! explicit values; the HTTP server keeps them in a [`SessionStore`].
//!
//! Uploads are sequenced per client by an [`UploadTracker`]: when a second
//! upload starts before the first finished, only the newest one may create a
//! session.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::api::logs::log_warning;
use crate::error::{ExportResult, SessionError, TableError, TransformResult};
use crate::export::to_csv_string;
use crate::filter::{apply_filter, paginate, search, FilterSpec, Page};
use crate::models::Table;
use crate::stats::{table_stats, ColumnStats};
use crate::transform::{apply, auto_suggest, ConversionWarning, TransformOutcome, TransformSpec};

// =============================================================================
// Session
// =============================================================================

/// What a transform did to the working table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformReport {
    pub rows: usize,
    pub columns: Vec<String>,
    pub rows_removed: usize,
    pub warnings: Vec<ConversionWarning>,
}

/// Restore point plus working table.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    original: Arc<Table>,
    current: Table,
    upload_seq: u64,
}

impl Session {
    pub fn new(table: Table) -> Self {
        Self::with_upload_seq(table, 0)
    }

    /// Session created by upload number `seq`.
    pub fn with_upload_seq(table: Table, seq: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            current: table.clone(),
            original: Arc::new(table),
            upload_seq: seq,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn original(&self) -> &Table {
        &self.original
    }

    pub fn current(&self) -> &Table {
        &self.current
    }

    pub fn upload_seq(&self) -> u64 {
        self.upload_seq
    }

    /// Transform the working table.
    ///
    /// On error the working table is left as it was.
    pub fn apply_transform(&mut self, spec: &TransformSpec) -> TransformResult<TransformReport> {
        let TransformOutcome {
            table,
            warnings,
            rows_removed,
        } = apply(&self.current, spec)?;

        self.current = table;
        Ok(TransformReport {
            rows: self.current.row_count(),
            columns: self.current.columns().to_vec(),
            rows_removed,
            warnings,
        })
    }

    /// Replace the working table with a filtered view of the original.
    pub fn apply_filter(&mut self, spec: &FilterSpec) -> Result<&Table, TableError> {
        self.current = apply_filter(&self.original, spec)?;
        Ok(&self.current)
    }

    /// Restore the working table to the table as ingested.
    pub fn reset(&mut self) -> &Table {
        self.current = self.original.as_ref().clone();
        &self.current
    }

    pub fn stats(&self) -> Vec<ColumnStats> {
        table_stats(&self.current)
    }

    pub fn suggest(&self) -> TransformSpec {
        auto_suggest(&self.current)
    }

    /// One page of the working table, optionally narrowed by a global search.
    pub fn page(&self, page: usize, per_page: usize, query: Option<&str>) -> Page {
        match query {
            Some(q) => paginate(&search(&self.current, q), page, per_page),
            None => paginate(&self.current, page, per_page),
        }
    }

    pub fn export_csv(&self) -> ExportResult<String> {
        to_csv_string(&self.current)
    }
}

// =============================================================================
// Upload sequencing
// =============================================================================

/// Sequence stamp handed out when an upload starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTicket {
    client: String,
    seq: u64,
}

impl UploadTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn client(&self) -> &str {
        &self.client
    }
}

/// Hands out increasing upload tickets and remembers the newest per client.
///
/// A client's entry lives only while one of its uploads is in flight: it is
/// removed when the upload is accepted or finishes without a session.
#[derive(Debug, Default)]
pub struct UploadTracker {
    counter: AtomicU64,
    latest: Mutex<HashMap<String, u64>>,
}

impl UploadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an upload for `client`. Supersedes any upload still in flight.
    pub fn begin(&self, client: &str) -> UploadTicket {
        let seq = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.latest_map().insert(client.to_string(), seq);
        UploadTicket {
            client: client.to_string(),
            seq,
        }
    }

    /// Succeeds only if no newer upload was started by the same client.
    ///
    /// When the client has nothing in flight any more, the reported `latest`
    /// is the newest ticket handed out.
    pub fn accept(&self, ticket: &UploadTicket) -> Result<(), SessionError> {
        let mut map = self.latest_map();
        match map.get(&ticket.client).copied() {
            Some(latest) if latest == ticket.seq => {
                map.remove(&ticket.client);
                Ok(())
            }
            Some(latest) => Err(SessionError::StaleUpload {
                ticket: ticket.seq,
                latest,
            }),
            None => Err(SessionError::StaleUpload {
                ticket: ticket.seq,
                latest: self.counter.load(Ordering::SeqCst),
            }),
        }
    }

    /// Drop an upload that will not create a session. Newer uploads of the
    /// same client are unaffected.
    pub fn abandon(&self, ticket: &UploadTicket) {
        let mut map = self.latest_map();
        if map.get(&ticket.client) == Some(&ticket.seq) {
            map.remove(&ticket.client);
        }
    }

    /// Clients with an upload in flight.
    pub fn in_flight(&self) -> usize {
        self.latest_map().len()
    }

    fn latest_map(&self) -> std::sync::MutexGuard<'_, HashMap<String, u64>> {
        self.latest.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// =============================================================================
// Session store
// =============================================================================

/// Sessions kept by a [`SessionStore`] unless configured otherwise.
pub const DEFAULT_MAX_SESSIONS: usize = 100;

#[derive(Debug)]
struct Slot {
    order: u64,
    session: Session,
}

#[derive(Debug, Default)]
struct Sessions {
    slots: HashMap<Uuid, Slot>,
    next_order: u64,
}

/// Shared map of live sessions.
///
/// Holds at most `limit` sessions; inserting past the limit evicts the
/// oldest one.
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<Sessions>>,
    limit: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store keeping at most `limit` sessions (at least one).
    pub fn with_limit(limit: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Sessions::default())),
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Insert a session, evicting the oldest ones while the store is full.
    pub async fn insert(&self, session: Session) -> Uuid {
        let id = session.id();
        let mut inner = self.inner.write().await;

        while inner.slots.len() >= self.limit {
            let oldest = inner
                .slots
                .iter()
                .min_by_key(|(_, slot)| slot.order)
                .map(|(key, _)| *key);
            match oldest {
                Some(old) => {
                    inner.slots.remove(&old);
                    log_warning(format!("Session {} evicted (limit {})", old, self.limit));
                }
                None => break,
            }
        }

        let order = inner.next_order;
        inner.next_order += 1;
        inner.slots.insert(id, Slot { order, session });
        id
    }

    /// Run `f` against a session.
    pub async fn read<R>(&self, id: Uuid, f: impl FnOnce(&Session) -> R) -> Result<R, SessionError> {
        let inner = self.inner.read().await;
        inner
            .slots
            .get(&id)
            .map(|slot| f(&slot.session))
            .ok_or(SessionError::NotFound(id))
    }

    /// Run `f` against a session with write access.
    pub async fn write<R>(&self, id: Uuid, f: impl FnOnce(&mut Session) -> R) -> Result<R, SessionError> {
        let mut inner = self.inner.write().await;
        inner
            .slots
            .get_mut(&id)
            .map(|slot| f(&mut slot.session))
            .ok_or(SessionError::NotFound(id))
    }

    pub async fn remove(&self, id: Uuid) -> Option<Session> {
        self.inner.write().await.slots.remove(&id).map(|slot| slot.session)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.slots.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;
    use crate::transform::ColumnTransform;

    fn table() -> Table {
        Table::from_cells(
            &["a", "b"],
            vec![
                vec![Cell::text("1"), Cell::text("")],
                vec![Cell::text("2"), Cell::text("x")],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_reset_restores_original() {
        let original = table();
        let mut session = Session::new(original.clone());

        session.apply_filter(&FilterSpec::new().excluding_nulls()).unwrap();
        assert_eq!(session.current().row_count(), 1);

        session
            .apply_transform(&TransformSpec::new().with_transform("a", ColumnTransform::new().rename("z")))
            .unwrap();
        assert_eq!(session.current().columns(), &["z", "b"]);

        assert_eq!(session.reset(), &original);
        assert_eq!(session.original(), &original);
    }

    #[test]
    fn test_filter_starts_from_original() {
        let mut session = Session::new(table());
        session
            .apply_filter(&FilterSpec::new().with_column_filter("a", "1"))
            .unwrap();
        session
            .apply_filter(&FilterSpec::new().with_column_filter("a", "2"))
            .unwrap();
        assert_eq!(session.current().row_count(), 1);
        assert_eq!(session.current().value(0, "a"), Some(&Cell::text("2")));
    }

    #[test]
    fn test_transforms_chain_on_current() {
        let mut session = Session::new(table());
        session
            .apply_transform(&TransformSpec::new().with_transform("b", ColumnTransform::new().fill_na("none")))
            .unwrap();
        let report = session
            .apply_transform(&TransformSpec::new().with_transform("b", ColumnTransform::new().rename("label")))
            .unwrap();

        assert_eq!(report.columns, vec!["a", "label"]);
        assert_eq!(session.current().value(0, "label"), Some(&Cell::text("none")));
    }

    #[test]
    fn test_failed_transform_keeps_current() {
        let mut session = Session::new(table());
        let before = session.current().clone();
        let spec = TransformSpec::new().with_transform("missing", ColumnTransform::new().fill_na("x"));

        assert!(session.apply_transform(&spec).is_err());
        assert_eq!(session.current(), &before);
    }

    #[test]
    fn test_stale_upload_rejected() {
        let tracker = UploadTracker::new();
        let first = tracker.begin("client-a");
        let second = tracker.begin("client-a");
        let other = tracker.begin("client-b");

        assert_eq!(
            tracker.accept(&first),
            Err(SessionError::StaleUpload {
                ticket: first.seq(),
                latest: second.seq()
            })
        );
        assert!(tracker.accept(&second).is_ok());
        assert!(tracker.accept(&other).is_ok());
        assert!(second.seq() > first.seq());
    }

    #[test]
    fn test_tracker_forgets_finished_clients() {
        let tracker = UploadTracker::new();
        for i in 0..50 {
            let ticket = tracker.begin(&format!("client-{}", i));
            tracker.accept(&ticket).unwrap();
        }
        assert_eq!(tracker.in_flight(), 0);

        let failed = tracker.begin("client-x");
        assert_eq!(tracker.in_flight(), 1);
        tracker.abandon(&failed);
        assert_eq!(tracker.in_flight(), 0);
    }

    #[test]
    fn test_stale_upload_rejected_after_newer_accepted() {
        let tracker = UploadTracker::new();
        let first = tracker.begin("client-a");
        let second = tracker.begin("client-a");

        tracker.accept(&second).unwrap();
        assert_eq!(
            tracker.accept(&first),
            Err(SessionError::StaleUpload {
                ticket: first.seq(),
                latest: second.seq()
            })
        );
        assert_eq!(tracker.in_flight(), 0);
    }

    #[test]
    fn test_abandon_keeps_newer_upload() {
        let tracker = UploadTracker::new();
        let first = tracker.begin("client-a");
        let second = tracker.begin("client-a");

        tracker.abandon(&first);
        assert_eq!(tracker.in_flight(), 1);
        assert!(tracker.accept(&second).is_ok());
    }

    #[tokio::test]
    async fn test_store_evicts_oldest() {
        let store = SessionStore::with_limit(2);
        let first = store.insert(Session::new(table())).await;
        let second = store.insert(Session::new(table())).await;
        let third = store.insert(Session::new(table())).await;

        assert_eq!(store.len().await, 2);
        assert_eq!(store.read(first, |_| ()).await, Err(SessionError::NotFound(first)));
        assert!(store.read(second, |_| ()).await.is_ok());
        assert!(store.read(third, |_| ()).await.is_ok());
    }

    #[tokio::test]
    async fn test_store_roundtrip() {
        let store = SessionStore::new();
        let id = store.insert(Session::new(table())).await;

        let rows = store.read(id, |s| s.current().row_count()).await.unwrap();
        assert_eq!(rows, 2);

        store
            .write(id, |s| s.apply_filter(&FilterSpec::new().excluding_nulls()).map(|t| t.row_count()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(store.read(id, |s| s.current().row_count()).await.unwrap(), 1);

        assert!(store.remove(id).await.is_some());
        assert_eq!(store.read(id, |_| ()).await, Err(SessionError::NotFound(id)));
        assert!(store.is_empty().await);
    }
}
