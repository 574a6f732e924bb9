//! Snapshot construction, filtering and ordering
//!
//! The store builds an immutable [`Snapshot`] for every refresh, sort or
//! drill-down and swaps it in as the current view. Records of the system
//! bucket always come before user records; sorting only reorders records
//! inside a bucket.
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;

use crate::classifier::Classifier;
use crate::connection::{Bucket, ConnectionRecord, RecordId};
use crate::error::MonitorError;
use crate::selection::SelectionSet;
use crate::sources::traits::{CancelToken, ConnectionSource, ProcessResolver};

/// Column a snapshot can be sorted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Local,
    Remote,
    Status,
    Process,
}

impl SortField {
    fn key(self, record: &ConnectionRecord) -> &str {
        match self {
            SortField::Local => &record.local_address,
            SortField::Remote => &record.remote_address,
            SortField::Status => &record.status,
            SortField::Process => &record.process_name,
        }
    }
}

impl FromStr for SortField {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(SortField::Local),
            "remote" => Ok(SortField::Remote),
            "status" => Ok(SortField::Status),
            "process" => Ok(SortField::Process),
            _ => Err(MonitorError::UnknownSortField(s.to_string())),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortField::Local => "local",
            SortField::Remote => "remote",
            SortField::Status => "status",
            SortField::Process => "process",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SortOrder {
    pub field: SortField,
    pub ascending: bool,
}

/// Which records a snapshot retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Filter {
    None,
    /// Case-insensitive substring of the process name, stored lower-cased.
    Substring(String),
    /// Exact process name, as used by drill-down.
    Exact(String),
}

impl Filter {
    /// Search box semantics: surrounding whitespace is ignored and an empty
    /// search is the same as no search.
    pub fn search(text: Option<&str>) -> Self {
        match text.map(str::trim) {
            Some(t) if !t.is_empty() => Filter::Substring(t.to_lowercase()),
            _ => Filter::None,
        }
    }

    pub fn matches(&self, process_name: &str) -> bool {
        match self {
            Filter::None => true,
            Filter::Substring(needle) => process_name.to_lowercase().contains(needle.as_str()),
            Filter::Exact(name) => process_name == name,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::None => write!(f, "none"),
            Filter::Substring(text) => write!(f, "contains {:?}", text),
            Filter::Exact(name) => write!(f, "process {:?}", name),
        }
    }
}

/// A record together with its identity and classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotEntry {
    pub id: RecordId,
    pub pid: Option<u32>,
    pub bucket: Bucket,
    pub record: ConnectionRecord,
}

/// Ordered, bucketed view produced by one store operation.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub generation: u64,
    pub taken_at: DateTime<Utc>,
    pub filter: Filter,
    pub sort: Option<SortOrder>,
    entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self {
            generation: 0,
            taken_at: Utc::now(),
            filter: Filter::None,
            sort: None,
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &ConnectionRecord> {
        self.entries.iter().map(|e| &e.record)
    }

    pub fn get(&self, id: RecordId) -> Option<&SnapshotEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Selected records in display order, plus the selected ids this snapshot does not contain.
    pub fn select(&self, selection: &SelectionSet) -> (Vec<ConnectionRecord>, Vec<RecordId>) {
        let records = self
            .entries
            .iter()
            .filter(|e| selection.contains(e.id))
            .map(|e| e.record.clone())
            .collect();
        let present: HashSet<RecordId> = self.entries.iter().map(|e| e.id).collect();
        let missing = selection
            .current()
            .iter()
            .copied()
            .filter(|id| !present.contains(id))
            .collect();
        (records, missing)
    }

    /// Re-order each bucket independently; system records stay in front.
    fn sorted(&self, order: SortOrder, generation: u64) -> Self {
        let (mut system, mut user): (Vec<_>, Vec<_>) = self
            .entries
            .iter()
            .cloned()
            .partition(|e| e.bucket == Bucket::System);

        let compare = |a: &SnapshotEntry, b: &SnapshotEntry| -> Ordering {
            let ord = order.field.key(&a.record).cmp(order.field.key(&b.record));
            if order.ascending {
                ord
            } else {
                ord.reverse()
            }
        };
        system.sort_by(compare);
        user.sort_by(compare);
        system.extend(user);

        Self {
            generation,
            taken_at: self.taken_at,
            filter: self.filter.clone(),
            sort: Some(order),
            entries: system,
        }
    }
}

/// Owner of the current snapshot and the components that produce it.
pub struct SnapshotStore {
    source: Box<dyn ConnectionSource>,
    resolver: Box<dyn ProcessResolver>,
    classifier: Classifier,
    current: Arc<Snapshot>,
    previous: Option<Arc<Snapshot>>,
    cancel: CancelToken,
    generation: u64,
}

impl SnapshotStore {
    pub fn new(
        source: Box<dyn ConnectionSource>,
        resolver: Box<dyn ProcessResolver>,
        classifier: Classifier,
    ) -> Self {
        Self {
            source,
            resolver,
            classifier,
            current: Arc::new(Snapshot::empty()),
            previous: None,
            cancel: CancelToken::new(),
            generation: 0,
        }
    }

    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current)
    }

    /// The snapshot that was current before the last successful operation.
    pub fn previous(&self) -> Option<Arc<Snapshot>> {
        self.previous.clone()
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Token a host can trip from another thread to abort a running build.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Re-enumerate, keeping records whose process name contains `filter` (case-insensitive).
    pub fn refresh(&mut self, filter: Option<&str>) -> Result<Arc<Snapshot>, MonitorError> {
        self.build(Filter::search(filter))
    }

    /// Re-enumerate, keeping only records owned by exactly `process_name`.
    pub fn drill_down(&mut self, process_name: &str) -> Result<Arc<Snapshot>, MonitorError> {
        self.build(Filter::Exact(process_name.to_string()))
    }

    /// Re-sort the data already in memory.
    pub fn sort_by(&mut self, field: SortField, ascending: bool) -> Arc<Snapshot> {
        let generation = self.next_generation();
        let sorted = self.current.sorted(SortOrder { field, ascending }, generation);
        debug!("Sorted snapshot by {} ({})", field, if ascending { "asc" } else { "desc" });
        self.publish(sorted)
    }

    fn build(&mut self, filter: Filter) -> Result<Arc<Snapshot>, MonitorError> {
        self.cancel.reset();
        let raw = self.source.enumerate()?;
        if self.cancel.is_cancelled() {
            return Err(MonitorError::Cancelled);
        }
        self.resolver.refresh();

        let mut system = Vec::new();
        let mut user = Vec::new();
        let mut seen = HashSet::new();
        for conn in &raw {
            if self.cancel.is_cancelled() {
                return Err(MonitorError::Cancelled);
            }
            let process_name = self.resolver.resolve(conn.pid);
            if !filter.matches(&process_name) {
                continue;
            }

            let mut salt = 0;
            let mut id = RecordId::derive(conn, salt);
            while !seen.insert(id) {
                salt += 1;
                id = RecordId::derive(conn, salt);
            }

            let bucket = self.classifier.classify(&process_name);
            let entry = SnapshotEntry {
                id,
                pid: conn.pid,
                bucket,
                record: ConnectionRecord::from_raw(conn, process_name),
            };
            match bucket {
                Bucket::System => system.push(entry),
                Bucket::User => user.push(entry),
            }
        }

        info!(
            "Built snapshot from {}: {} system, {} user of {} connections (filter: {})",
            self.source.name(),
            system.len(),
            user.len(),
            raw.len(),
            filter
        );

        system.extend(user);
        let snapshot = Snapshot {
            generation: self.next_generation(),
            taken_at: Utc::now(),
            filter,
            sort: None,
            entries: system,
        };
        Ok(self.publish(snapshot))
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn publish(&mut self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        let old = std::mem::replace(&mut self.current, Arc::clone(&snapshot));
        self.previous = Some(old);
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::RawConnection;
    use crate::sources::capture::CaptureFile;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn raw(local: &str, remote: Option<&str>, status: &str, pid: Option<u32>) -> RawConnection {
        RawConnection {
            local: local.parse().unwrap(),
            remote: remote.map(|r| r.parse().unwrap()),
            status: status.to_string(),
            pid,
        }
    }

    fn store_for(connections: Vec<RawConnection>, names: &[(u32, &str)]) -> SnapshotStore {
        let processes: BTreeMap<u32, String> =
            names.iter().map(|(p, n)| (*p, n.to_string())).collect();
        let capture = CaptureFile::new(connections, processes);
        SnapshotStore::new(
            Box::new(capture.clone()),
            Box::new(capture),
            Classifier::new(),
        )
    }

    fn mixed_store() -> SnapshotStore {
        store_for(
            vec![
                raw("10.0.0.1:8080", None, "LISTEN", Some(1)),
                raw("10.0.0.1:22", Some("10.0.0.9:6000"), "ESTABLISHED", Some(2)),
                raw("0.0.0.0:445", None, "LISTEN", Some(4)),
                raw("10.0.0.1:9000", Some("10.0.0.7:1234"), "CLOSE_WAIT", Some(1)),
                raw("0.0.0.0:139", None, "LISTEN", Some(4)),
                raw("127.0.0.1:53", None, "NONE", None),
            ],
            &[(1, "nginx"), (2, "sshd"), (4, "System")],
        )
    }

    /// Failing source used to check that errors leave the prior snapshot alone.
    struct Denied;

    impl ConnectionSource for Denied {
        fn name(&self) -> &str {
            "denied"
        }

        fn enumerate(&self) -> Result<Vec<RawConnection>, MonitorError> {
            Err(MonitorError::PermissionDenied("no access".to_string()))
        }
    }

    fn is_bucketed(snapshot: &Snapshot) -> bool {
        let first_user = snapshot
            .entries()
            .iter()
            .position(|e| e.bucket == Bucket::User)
            .unwrap_or(snapshot.len());
        snapshot.entries()[first_user..]
            .iter()
            .all(|e| e.bucket == Bucket::User)
    }

    #[test]
    fn refresh_puts_system_bucket_first() {
        let mut store = store_for(
            vec![
                raw("1.2.3.4:80", None, "LISTEN", Some(10)),
                raw("5.6.7.8:443", Some("9.9.9.9:51000"), "ESTABLISHED", Some(20)),
            ],
            &[(10, "nginx"), (20, "System")],
        );
        let snapshot = store.refresh(None).unwrap();
        let records: Vec<_> = snapshot.records().map(|r| r.fields()).collect();
        assert_eq!(
            records,
            vec![
                ["5.6.7.8:443", "9.9.9.9:51000", "ESTABLISHED", "System"],
                ["1.2.3.4:80", "N/A", "LISTEN", "nginx"],
            ]
        );
    }

    #[test]
    fn enumeration_order_is_kept_within_buckets() {
        let mut store = mixed_store();
        let snapshot = store.refresh(None).unwrap();
        let locals: Vec<_> = snapshot.records().map(|r| r.local_address.as_str()).collect();
        assert_eq!(
            locals,
            vec![
                "0.0.0.0:445",
                "0.0.0.0:139",
                "10.0.0.1:8080",
                "10.0.0.1:22",
                "10.0.0.1:9000",
                "127.0.0.1:53",
            ]
        );
    }

    #[test]
    fn unresolvable_pids_become_placeholder_users() {
        let mut store = mixed_store();
        let snapshot = store.refresh(None).unwrap();
        let last = snapshot.entries().last().unwrap();
        assert_eq!(last.record.process_name, "N/A");
        assert_eq!(last.bucket, Bucket::User);
    }

    #[test]
    fn empty_and_missing_filters_agree() {
        let mut store = mixed_store();
        let none: Vec<_> = store.refresh(None).unwrap().entries().to_vec();
        let empty: Vec<_> = store.refresh(Some("")).unwrap().entries().to_vec();
        let blank: Vec<_> = store.refresh(Some("   ")).unwrap().entries().to_vec();
        assert_eq!(none, empty);
        assert_eq!(none, blank);
    }

    #[test]
    fn filter_is_case_insensitive_substring() {
        let mut store = mixed_store();
        let snapshot = store.refresh(Some("NGI")).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.records().all(|r| r.process_name == "nginx"));
        assert_eq!(snapshot.filter, Filter::Substring("ngi".to_string()));
    }

    #[test]
    fn sort_keeps_bucket_precedence() {
        let mut store = mixed_store();
        store.refresh(None).unwrap();
        let sorted = store.sort_by(SortField::Local, true);
        let locals: Vec<_> = sorted.records().map(|r| r.local_address.as_str()).collect();
        assert_eq!(
            locals,
            vec![
                "0.0.0.0:139",
                "0.0.0.0:445",
                "10.0.0.1:22",
                "10.0.0.1:8080",
                "10.0.0.1:9000",
                "127.0.0.1:53",
            ]
        );
        assert!(is_bucketed(&sorted));
    }

    #[test]
    fn descending_sort_reverses_within_buckets() {
        let mut store = mixed_store();
        store.refresh(None).unwrap();
        let sorted = store.sort_by(SortField::Status, false);
        let statuses: Vec<_> = sorted.records().map(|r| r.status.as_str()).collect();
        assert_eq!(
            statuses,
            vec!["LISTEN", "LISTEN", "NONE", "LISTEN", "ESTABLISHED", "CLOSE_WAIT"]
        );
        assert_eq!(
            sorted.sort,
            Some(SortOrder {
                field: SortField::Status,
                ascending: false
            })
        );
    }

    #[test]
    fn sort_uses_in_memory_data_and_keeps_ids() {
        let mut store = mixed_store();
        let before = store.refresh(Some("nginx")).unwrap();
        let sorted = store.sort_by(SortField::Remote, true);
        assert_eq!(sorted.filter, before.filter);
        assert_eq!(sorted.len(), before.len());
        for entry in before.entries() {
            assert_eq!(sorted.get(entry.id).map(|e| &e.record), Some(&entry.record));
        }
    }

    #[test]
    fn drill_down_replaces_substring_filter() {
        let mut store = mixed_store();
        store.refresh(Some("ss")).unwrap();
        let snapshot = store.drill_down("nginx").unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.entries().iter().all(|e| e.bucket == Bucket::User));
        assert_eq!(snapshot.filter, Filter::Exact("nginx".to_string()));
    }

    #[test]
    fn drill_down_is_exact_and_case_sensitive() {
        let mut store = mixed_store();
        assert!(store.drill_down("NGINX").unwrap().is_empty());
        assert!(store.drill_down("ngin").unwrap().is_empty());
    }

    #[test]
    fn drill_down_returns_only_that_process() {
        let mut store = store_for(
            vec![
                raw("10.0.0.1:80", None, "LISTEN", Some(1)),
                raw("0.0.0.0:445", None, "LISTEN", Some(4)),
                raw("10.0.0.1:443", None, "LISTEN", Some(1)),
                raw("0.0.0.0:139", None, "LISTEN", Some(4)),
                raw("10.0.0.1:8443", Some("1.1.1.1:999"), "ESTABLISHED", Some(1)),
            ],
            &[(1, "nginx"), (4, "System")],
        );
        store.refresh(None).unwrap();
        let snapshot = store.drill_down("nginx").unwrap();
        assert_eq!(snapshot.len(), 3);
        assert!(snapshot
            .entries()
            .iter()
            .all(|e| e.record.process_name == "nginx" && e.bucket == Bucket::User));
    }

    #[test]
    fn failed_refresh_keeps_prior_snapshot() {
        let mut store = mixed_store();
        let good = store.refresh(None).unwrap();

        store.source = Box::new(Denied);
        let err = store.refresh(None).unwrap_err();
        assert!(matches!(err, MonitorError::PermissionDenied(_)));
        assert!(matches!(store.drill_down("nginx"), Err(MonitorError::PermissionDenied(_))));
        assert!(Arc::ptr_eq(&store.current(), &good));
    }

    #[test]
    fn previous_snapshot_is_retained() {
        let mut store = mixed_store();
        let first = store.refresh(None).unwrap();
        let second = store.sort_by(SortField::Process, true);
        assert!(Arc::ptr_eq(&store.previous().unwrap(), &first));
        assert!(Arc::ptr_eq(&store.current(), &second));
        assert!(second.generation > first.generation);
    }

    #[test]
    fn ids_are_unique_for_duplicate_rows() {
        let mut store = store_for(
            vec![
                raw("0.0.0.0:68", None, "NONE", Some(3)),
                raw("0.0.0.0:68", None, "NONE", Some(3)),
            ],
            &[(3, "dhclient")],
        );
        let snapshot = store.refresh(None).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_ne!(snapshot.entries()[0].id, snapshot.entries()[1].id);
    }

    #[test]
    fn select_reports_stale_ids() {
        let mut store = mixed_store();
        let snapshot = store.refresh(None).unwrap();
        let wanted = snapshot.entries()[3].id;
        let stale = RecordId::from(0xdead_beef);
        let mut selection = SelectionSet::new();
        selection.replace([stale, wanted]);

        let (records, missing) = snapshot.select(&selection);
        assert_eq!(records, vec![snapshot.entries()[3].record.clone()]);
        if snapshot.get(stale).is_none() {
            assert_eq!(missing, vec![stale]);
        }
    }

    #[test]
    fn cancelled_build_keeps_prior_snapshot() {
        struct CancelOnEnumerate {
            inner: CaptureFile,
            token: CancelToken,
        }

        impl ConnectionSource for CancelOnEnumerate {
            fn name(&self) -> &str {
                "cancelling"
            }

            fn enumerate(&self) -> Result<Vec<RawConnection>, MonitorError> {
                self.token.cancel();
                self.inner.enumerate()
            }
        }

        let mut store = mixed_store();
        let good = store.refresh(None).unwrap();
        let inner = CaptureFile::new(vec![raw("1.1.1.1:1", None, "LISTEN", None)], BTreeMap::new());
        store.source = Box::new(CancelOnEnumerate {
            inner,
            token: store.cancel_token(),
        });
        assert!(matches!(store.refresh(None), Err(MonitorError::Cancelled)));
        assert!(Arc::ptr_eq(&store.current(), &good));
    }

    #[test]
    fn sort_field_parses_names() {
        assert_eq!("Process".parse::<SortField>().unwrap(), SortField::Process);
        assert_eq!(" local ".parse::<SortField>().unwrap(), SortField::Local);
        assert!(matches!(
            "pid".parse::<SortField>(),
            Err(MonitorError::UnknownSortField(_))
        ));
    }

    fn arb_connection() -> impl Strategy<Value = RawConnection> {
        (
            any::<[u8; 4]>(),
            1u16..=u16::MAX,
            proptest::option::of((any::<[u8; 4]>(), 1u16..=u16::MAX)),
            prop::sample::select(vec!["ESTABLISHED", "LISTEN", "TIME_WAIT", "CLOSE_WAIT"]),
            proptest::option::of(0u32..6),
        )
            .prop_map(|(ip, port, remote, status, pid)| RawConnection {
                local: (ip, port).into(),
                remote: remote.map(|(ip, port)| (ip, port).into()),
                status: status.to_string(),
                pid,
            })
    }

    fn arb_table() -> impl Strategy<Value = Vec<RawConnection>> {
        prop::collection::vec(arb_connection(), 0..40)
    }

    fn table_store(conns: Vec<RawConnection>) -> SnapshotStore {
        store_for(
            conns,
            &[(0, "System"), (1, "nginx"), (2, "SYSTEM"), (3, "sshd"), (4, "system idle process")],
        )
    }

    fn arb_field() -> impl Strategy<Value = SortField> {
        prop::sample::select(vec![
            SortField::Local,
            SortField::Remote,
            SortField::Status,
            SortField::Process,
        ])
    }

    proptest! {
        #[test]
        fn system_bucket_precedes_user_after_any_sort(
            table in arb_table(),
            field in arb_field(),
            ascending in any::<bool>(),
            filter in proptest::option::of("[a-zA-Z ]{0,4}"),
        ) {
            let mut store = table_store(table);
            store.refresh(filter.as_deref()).unwrap();
            let sorted = store.sort_by(field, ascending);
            prop_assert!(is_bucketed(&sorted));
        }

        #[test]
        fn sorting_never_changes_membership(
            table in arb_table(),
            field in arb_field(),
            ascending in any::<bool>(),
        ) {
            let mut store = table_store(table);
            let before = store.refresh(None).unwrap();
            let sorted = store.sort_by(field, ascending);
            let mut a: Vec<_> = before.entries().iter().map(|e| (e.id, e.bucket)).collect();
            let mut b: Vec<_> = sorted.entries().iter().map(|e| (e.id, e.bucket)).collect();
            a.sort();
            b.sort();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn empty_filter_is_identity(table in arb_table()) {
            let mut store = table_store(table);
            let none = store.refresh(None).unwrap().entries().to_vec();
            let empty = store.refresh(Some("")).unwrap().entries().to_vec();
            prop_assert_eq!(none, empty);
        }
    }
}
