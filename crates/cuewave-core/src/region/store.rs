//! In-memory region storage keyed by track
//!
//! Each track's regions sit behind their own lock, so mutations on different
//! tracks never wait on each other. The outer map lock is only held long
//! enough to find (or create) a track's slot.
//!
//! A mutation queues its notification under the track lock and the queue is
//! emitted after the lock is released, so listeners are free to read or
//! mutate the store. Only one thread emits a track's queue at a time, which
//! keeps notifications in mutation order. A notification queued while
//! another thread (or an outer listener on this thread) is emitting is
//! delivered by that emitter before it returns.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use super::{normalize_bounds, Region, RegionDraft, RegionKind};
use crate::error::{EngineError, EngineResult};
use crate::events::{Listeners, Subscription};
use crate::types::TrackId;

/// What happened to a region
#[derive(Debug, Clone, PartialEq)]
pub enum RegionEventKind {
    Added(Region),
    Updated(Region),
    Deleted(String),
}

/// Notification emitted by the store after every successful mutation
#[derive(Debug, Clone, PartialEq)]
pub struct RegionEvent {
    pub track_id: TrackId,
    pub kind: RegionEventKind,
}

/// Regions of one track, in insertion order
#[derive(Debug, Default)]
struct TrackRegions {
    by_id: HashMap<String, Region>,
    order: Vec<String>,
    /// Notifications not yet handed to listeners
    pending: VecDeque<RegionEventKind>,
}

impl TrackRegions {
    /// Store a region under a free id
    ///
    /// Returns `false` (storing nothing) when the id is already taken.
    fn insert(&mut self, region: Region) -> bool {
        if self.by_id.contains_key(&region.id) {
            return false;
        }
        self.order.push(region.id.clone());
        self.by_id.insert(region.id.clone(), region);
        true
    }

    fn remove(&mut self, id: &str) -> Option<Region> {
        let removed = self.by_id.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(removed)
    }

    fn list(&self) -> Vec<Region> {
        self.order
            .iter()
            .filter_map(|id| self.by_id.get(id).cloned())
            .collect()
    }
}

#[derive(Debug, Default)]
struct TrackState {
    regions: Mutex<TrackRegions>,
    /// Set while some thread is emitting this track's pending notifications
    emitting: AtomicBool,
}

impl TrackState {
    fn lock(&self) -> MutexGuard<'_, TrackRegions> {
        self.regions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

type TrackSlot = Arc<TrackState>;

/// Clears the emitting flag even if a listener panics
struct EmitGuard<'a>(&'a AtomicBool);

impl Drop for EmitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Collection of annotated regions for any number of tracks
pub struct RegionStore {
    tracks: RwLock<HashMap<TrackId, TrackSlot>>,
    listeners: Listeners<RegionEvent>,
    sequence: AtomicU64,
}

impl Default for RegionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionStore {
    pub fn new() -> Self {
        Self {
            tracks: RwLock::new(HashMap::new()),
            listeners: Listeners::new(),
            sequence: AtomicU64::new(0),
        }
    }

    /// Register a listener for region notifications on every track
    #[must_use = "dropping the subscription unregisters the listener immediately"]
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&RegionEvent) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    /// Create a region with the kind's default label and colour
    ///
    /// Reversed bounds are swapped before storing.
    pub fn add_region(
        &self,
        track_id: &TrackId,
        start: f64,
        end: f64,
        kind: RegionKind,
    ) -> EngineResult<Region> {
        let (start, end) = normalize_bounds(start, end)?;
        let region = Region {
            id: String::new(),
            start,
            end,
            label: kind.default_label().to_string(),
            kind,
            color: kind.default_color().to_string(),
        };
        Ok(self.insert(track_id, region, false))
    }

    /// Validate an externally shaped region and store it
    ///
    /// A draft without an id (or whose id is already taken on this track)
    /// gets a freshly generated one.
    pub fn insert_draft(&self, track_id: &TrackId, draft: RegionDraft) -> EngineResult<Region> {
        let kind = draft.parsed_kind()?;
        let (start, end) = normalize_bounds(draft.start, draft.end)?;

        let region = Region {
            id: draft.id.unwrap_or_default(),
            start,
            end,
            label: draft
                .label
                .unwrap_or_else(|| kind.default_label().to_string()),
            kind,
            color: draft
                .color
                .unwrap_or_else(|| kind.default_color().to_string()),
        };
        Ok(self.insert(track_id, region, true))
    }

    /// Move or resize a region
    pub fn update_region(
        &self,
        track_id: &TrackId,
        id: &str,
        new_start: f64,
        new_end: f64,
    ) -> EngineResult<Region> {
        let slot = self
            .existing_slot(track_id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        let updated = {
            let mut regions = slot.lock();
            if !regions.by_id.contains_key(id) {
                return Err(EngineError::NotFound(id.to_string()));
            }
            let (start, end) = normalize_bounds(new_start, new_end)?;
            let region = match regions.by_id.get_mut(id) {
                Some(region) => region,
                None => return Err(EngineError::NotFound(id.to_string())),
            };
            region.start = start;
            region.end = end;
            let updated = region.clone();
            regions
                .pending
                .push_back(RegionEventKind::Updated(updated.clone()));
            updated
        };

        log::debug!(
            "Region {} on track {} now {:.3}..{:.3}",
            id,
            track_id,
            updated.start,
            updated.end
        );
        self.flush(track_id, &slot);
        Ok(updated)
    }

    /// Remove a region
    ///
    /// Deleting an id that is absent (including one already deleted) reports
    /// `NotFound` and leaves the store untouched.
    pub fn delete_region(&self, track_id: &TrackId, id: &str) -> EngineResult<()> {
        let slot = self
            .existing_slot(track_id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        {
            let mut regions = slot.lock();
            regions
                .remove(id)
                .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
            regions
                .pending
                .push_back(RegionEventKind::Deleted(id.to_string()));
        }

        log::debug!("Region {} deleted from track {}", id, track_id);
        self.flush(track_id, &slot);
        Ok(())
    }

    /// Regions of a track in insertion order (empty for unknown tracks)
    pub fn list_regions(&self, track_id: &TrackId) -> Vec<Region> {
        match self.existing_slot(track_id) {
            Some(slot) => slot.lock().list(),
            None => Vec::new(),
        }
    }

    pub fn get_region(&self, track_id: &TrackId, id: &str) -> Option<Region> {
        let slot = self.existing_slot(track_id)?;
        let regions = slot.lock();
        regions.by_id.get(id).cloned()
    }

    /// Discard every region of a track, notifying a deletion for each
    ///
    /// Returns how many regions were removed.
    pub fn clear_track(&self, track_id: &TrackId) -> usize {
        let Some(slot) = self.existing_slot(track_id) else {
            return 0;
        };
        let removed = {
            let mut regions = slot.lock();
            let ids = std::mem::take(&mut regions.order);
            regions.by_id.clear();
            regions
                .pending
                .extend(ids.iter().cloned().map(RegionEventKind::Deleted));
            ids.len()
        };
        log::debug!("Cleared {} regions from track {}", removed, track_id);
        self.flush(track_id, &slot);
        removed
    }

    /// Store a region, generating an id when it has none or (for restored
    /// drafts) when its id is already taken
    fn insert(&self, track_id: &TrackId, mut region: Region, restored: bool) -> Region {
        let slot = self.slot(track_id);
        {
            let mut regions = slot.lock();
            if region.id.is_empty() {
                region.id = self.next_id(region.kind);
            }
            // Taken ids (a restored draft's, or a generated one that matches
            // a draft restored earlier) are replaced
            while !regions.insert(region.clone()) {
                region.id = self.next_id(region.kind);
            }
            regions
                .pending
                .push_back(RegionEventKind::Added(region.clone()));
        }
        log::debug!(
            "Region {} ({}) {} track {} at {:.3}..{:.3}",
            region.id,
            region.kind,
            if restored { "restored on" } else { "added to" },
            track_id,
            region.start,
            region.end
        );
        self.flush(track_id, &slot);
        region
    }

    /// Emit a track's pending notifications unless another emitter is active
    fn flush(&self, track_id: &TrackId, slot: &TrackState) {
        loop {
            if slot
                .emitting
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }
            {
                let _guard = EmitGuard(&slot.emitting);
                loop {
                    let next = slot.lock().pending.pop_front();
                    match next {
                        Some(kind) => self.notify(track_id, kind),
                        None => break,
                    }
                }
            }
            // A notification queued between the last pop and the flag reset
            // has no emitter yet
            if slot.lock().pending.is_empty() {
                return;
            }
        }
    }

    fn notify(&self, track_id: &TrackId, kind: RegionEventKind) {
        self.listeners.emit(&RegionEvent {
            track_id: track_id.clone(),
            kind,
        });
    }

    fn existing_slot(&self, track_id: &TrackId) -> Option<TrackSlot> {
        self.tracks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(track_id)
            .cloned()
    }

    fn slot(&self, track_id: &TrackId) -> TrackSlot {
        if let Some(slot) = self.existing_slot(track_id) {
            return slot;
        }
        let mut tracks = self.tracks.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(tracks.entry(track_id.clone()).or_default())
    }

    /// `<kind>-<unix millis>-<sequence>`, unique for the lifetime of the store
    fn next_id(&self, kind: RegionKind) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}-{}", kind.as_str(), millis, seq)
    }
}

impl std::fmt::Debug for RegionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tracks = self.tracks.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("RegionStore")
            .field("tracks", &tracks.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn track(id: &str) -> TrackId {
        TrackId::new(id)
    }

    #[test]
    fn test_add_then_list_contains_region_once() {
        let store = RegionStore::new();
        let a = track("a");
        let region = store.add_region(&a, 1.0, 2.0, RegionKind::Intro).unwrap();

        let listed = store.list_regions(&a);
        assert_eq!(listed.iter().filter(|r| r.id == region.id).count(), 1);
        assert_eq!(region.label, "Intro");
        assert_eq!(region.color, "green");
    }

    #[test]
    fn test_add_swaps_reversed_bounds() {
        let store = RegionStore::new();
        let region = store
            .add_region(&track("a"), 9.0, 3.0, RegionKind::Outro)
            .unwrap();
        assert_eq!((region.start, region.end), (3.0, 9.0));
    }

    #[test]
    fn test_list_preserves_insertion_order() {
        let store = RegionStore::new();
        let a = track("a");
        let first = store.add_region(&a, 50.0, 60.0, RegionKind::Outro).unwrap();
        let second = store.add_region(&a, 0.0, 5.0, RegionKind::Intro).unwrap();
        let third = store.add_region(&a, 20.0, 30.0, RegionKind::Loop).unwrap();

        let ids: Vec<String> = store.list_regions(&a).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![first.id, second.id, third.id]);
    }

    #[test]
    fn test_ids_are_unique() {
        let store = RegionStore::new();
        let a = track("a");
        let r1 = store.add_region(&a, 0.0, 1.0, RegionKind::Intro).unwrap();
        let r2 = store.add_region(&a, 0.0, 1.0, RegionKind::Intro).unwrap();
        assert_ne!(r1.id, r2.id);
        assert!(r1.id.starts_with("intro-"));
    }

    #[test]
    fn test_overlapping_regions_allowed() {
        let store = RegionStore::new();
        let a = track("a");
        store.add_region(&a, 0.0, 10.0, RegionKind::Intro).unwrap();
        store.add_region(&a, 5.0, 15.0, RegionKind::Loop).unwrap();
        assert_eq!(store.list_regions(&a).len(), 2);
    }

    #[test]
    fn test_update_normalizes_bounds() {
        let store = RegionStore::new();
        let a = track("a");
        let region = store.add_region(&a, 1.0, 2.0, RegionKind::Intro).unwrap();

        let updated = store.update_region(&a, &region.id, 7.0, 4.0).unwrap();
        assert!(updated.start < updated.end);
        assert_eq!((updated.start, updated.end), (4.0, 7.0));
        assert_eq!(store.get_region(&a, &region.id), Some(updated));
    }

    #[test]
    fn test_update_unknown_id_is_not_found() {
        let store = RegionStore::new();
        let a = track("a");
        assert_eq!(
            store.update_region(&a, "nope", 1.0, 2.0),
            Err(EngineError::NotFound("nope".into()))
        );
        store.add_region(&a, 1.0, 2.0, RegionKind::Intro).unwrap();
        assert!(matches!(
            store.update_region(&a, "nope", 1.0, 2.0),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_update_with_bad_bounds_leaves_region_untouched() {
        let store = RegionStore::new();
        let a = track("a");
        let region = store.add_region(&a, 1.0, 2.0, RegionKind::Intro).unwrap();
        assert!(store.update_region(&a, &region.id, -5.0, 2.0).is_err());
        assert_eq!(store.get_region(&a, &region.id), Some(region));
    }

    #[test]
    fn test_delete_then_list_excludes_id() {
        let store = RegionStore::new();
        let a = track("a");
        let region = store.add_region(&a, 1.0, 2.0, RegionKind::Intro).unwrap();

        store.delete_region(&a, &region.id).unwrap();
        assert!(store.list_regions(&a).iter().all(|r| r.id != region.id));

        // Second delete is a reported no-op
        assert_eq!(
            store.delete_region(&a, &region.id),
            Err(EngineError::NotFound(region.id.clone()))
        );
    }

    #[test]
    fn test_tracks_are_isolated() {
        let store = RegionStore::new();
        store.add_region(&track("a"), 1.0, 2.0, RegionKind::Intro).unwrap();
        assert!(store.list_regions(&track("b")).is_empty());
        assert_eq!(store.list_regions(&track("a")).len(), 1);
    }

    #[test]
    fn test_listener_sees_post_mutation_state() {
        let store = Arc::new(RegionStore::new());
        let a = track("a");
        let observed = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&observed);
        let _sub = store.subscribe(move |event| {
            sink.lock().unwrap().push(event.clone());
        });

        let region = store.add_region(&a, 1.0, 2.0, RegionKind::Intro).unwrap();
        store.update_region(&a, &region.id, 3.0, 4.0).unwrap();
        store.delete_region(&a, &region.id).unwrap();

        let events = observed.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0].kind, RegionEventKind::Added(r) if r.id == region.id));
        assert!(matches!(&events[1].kind, RegionEventKind::Updated(r) if r.start == 3.0));
        assert_eq!(events[2].kind, RegionEventKind::Deleted(region.id.clone()));
        assert!(events.iter().all(|e| e.track_id == a));
    }

    #[test]
    fn test_listener_can_read_the_store() {
        let store = Arc::new(RegionStore::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let reader = Arc::downgrade(&store);
        let sink = Arc::clone(&seen);
        let _sub = store.subscribe(move |event| {
            if let Some(store) = reader.upgrade() {
                sink.lock().unwrap().push(store.list_regions(&event.track_id));
            }
        });

        let (tx, rx) = std::sync::mpsc::channel();
        let worker = Arc::clone(&store);
        thread::spawn(move || {
            let region = worker.add_region(&track("a"), 1.0, 2.0, RegionKind::Intro);
            let _ = tx.send(region);
        });
        let region = rx
            .recv_timeout(std::time::Duration::from_secs(3))
            .expect("add_region blocked on a listener reading the store")
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].iter().filter(|r| r.id == region.id).count(), 1);
    }

    #[test]
    fn test_listener_mutations_are_notified_in_order() {
        let store = Arc::new(RegionStore::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        // Deleting every added region from inside the listener
        let writer = Arc::downgrade(&store);
        let sink = Arc::clone(&seen);
        let _sub = store.subscribe(move |event| {
            sink.lock().unwrap().push(event.kind.clone());
            if let (RegionEventKind::Added(region), Some(store)) = (&event.kind, writer.upgrade())
            {
                store.delete_region(&event.track_id, &region.id).unwrap();
            }
        });

        let region = store.add_region(&track("a"), 1.0, 2.0, RegionKind::Loop).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                RegionEventKind::Added(region.clone()),
                RegionEventKind::Deleted(region.id.clone())
            ]
        );
        assert!(store.list_regions(&track("a")).is_empty());
    }

    #[test]
    fn test_taken_id_is_never_listed_twice() {
        let mut regions = TrackRegions::default();
        let region = Region {
            id: "custom-1-0".into(),
            start: 0.0,
            end: 1.0,
            label: "Custom".into(),
            kind: RegionKind::Custom,
            color: "gray".into(),
        };
        assert!(regions.insert(region.clone()));
        assert!(!regions.insert(Region {
            start: 5.0,
            end: 6.0,
            ..region.clone()
        }));
        assert_eq!(regions.list(), vec![region]);
    }

    #[test]
    fn test_failed_operations_do_not_notify() {
        let store = RegionStore::new();
        let count = Arc::new(Mutex::new(0));
        let c = Arc::clone(&count);
        let _sub = store.subscribe(move |_| *c.lock().unwrap() += 1);

        let a = track("a");
        let _ = store.delete_region(&a, "missing");
        let _ = store.add_region(&a, -1.0, 2.0, RegionKind::Intro);
        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[test]
    fn test_insert_draft_fills_defaults_and_keeps_free_id() {
        let store = RegionStore::new();
        let a = track("a");
        let region = store
            .insert_draft(
                &a,
                RegionDraft {
                    id: Some("saved-1".into()),
                    start: 12.0,
                    end: 10.0,
                    kind: Some("outro".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(region.id, "saved-1");
        assert_eq!((region.start, region.end), (10.0, 12.0));
        assert_eq!(region.label, "Outro");

        // Same id again gets a fresh one instead of clobbering the first
        let second = store
            .insert_draft(
                &a,
                RegionDraft {
                    id: Some("saved-1".into()),
                    start: 1.0,
                    end: 2.0,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_ne!(second.id, "saved-1");
        assert_eq!(second.kind, RegionKind::Custom);
        assert_eq!(store.list_regions(&a).len(), 2);
    }

    #[test]
    fn test_insert_draft_rejects_unknown_type() {
        let store = RegionStore::new();
        let result = store.insert_draft(
            &track("a"),
            RegionDraft {
                start: 1.0,
                end: 2.0,
                kind: Some("beat".into()),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
    }

    #[test]
    fn test_clear_track() {
        let store = RegionStore::new();
        let a = track("a");
        let b = track("b");
        store.add_region(&a, 0.0, 1.0, RegionKind::Intro).unwrap();
        store.add_region(&a, 2.0, 3.0, RegionKind::Outro).unwrap();
        store.add_region(&b, 0.0, 1.0, RegionKind::Intro).unwrap();

        assert_eq!(store.clear_track(&a), 2);
        assert!(store.list_regions(&a).is_empty());
        assert_eq!(store.list_regions(&b).len(), 1);
        assert_eq!(store.clear_track(&track("unknown")), 0);
    }

    #[test]
    fn test_concurrent_mutations_on_different_tracks() {
        let store = Arc::new(RegionStore::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let id = TrackId::new(format!("track-{t}"));
                    for i in 0..50 {
                        let start = i as f64;
                        store
                            .add_region(&id, start, start + 0.5, RegionKind::Custom)
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        for t in 0..4 {
            assert_eq!(store.list_regions(&TrackId::new(format!("track-{t}"))).len(), 50);
        }
    }
}
