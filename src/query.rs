//! Time lookups over sorted sequences, and the process-wide cache of
//! per-variant views.
//!
//! Lookups are lenient at the edges: a time before the first element resolves
//! to the first element, and "next" after the last element is `None`.
//!
//! Filtered views are cached by `(beatmap identity, variant)`. Entries are
//! pure functions of immutable input, so two threads filling the same entry
//! at once only duplicate work. If an identity is reused for different
//! content (for instance a file path that was rewritten), callers must call
//! [`clear_cache`] first; stale views are not detected.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::hit_object::HitObjectKind;
use crate::timing::TimingLineKind;

/// Index of the greatest element whose key is `<= time`, or `0` when `time`
/// precedes every key. `None` only for an empty list.
///
/// `list` must be sorted by `key`.
pub fn index_at<T>(list: &[T], time: f64, key: impl Fn(&T) -> f64) -> Option<usize> {
    let last = list.len().checked_sub(1)?;
    if time < key(&list[0]) {
        return Some(0);
    }
    if time >= key(&list[last]) {
        return Some(last);
    }

    // key(list[0]) <= time < key(list[last]), so the answer is in 0..last.
    let (mut low, mut high) = (0, last - 1);
    loop {
        let mid = low + (high - low) / 2;
        if key(&list[mid]) > time {
            high = mid - 1;
        } else if key(&list[mid + 1]) <= time {
            low = mid + 1;
        } else {
            return Some(mid);
        }
    }
}

/// Index of the element after the one [`index_at`] finds.
pub fn next_index<T>(list: &[T], time: f64, key: impl Fn(&T) -> f64) -> Option<usize> {
    let current = index_at(list, time, key)?;
    (current + 1 < list.len()).then_some(current + 1)
}

/// Variant a cached view was filtered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    HitObject(HitObjectKind),
    TimingLine(TimingLineKind),
}

type ViewMap = HashMap<(String, ViewKind), Arc<[usize]>>;

fn views() -> &'static RwLock<ViewMap> {
    static VIEWS: OnceLock<RwLock<ViewMap>> = OnceLock::new();
    VIEWS.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Indices into the owning sequence of the elements of one variant, built by
/// `build` on first request.
pub(crate) fn cached_view(
    identity: &str,
    kind: ViewKind,
    build: impl FnOnce() -> Vec<usize>,
) -> Arc<[usize]> {
    let key = (identity.to_string(), kind);
    if let Some(view) = views().read().get(&key) {
        return Arc::clone(view);
    }

    // Built outside the lock; a concurrent builder produces the same content.
    let view: Arc<[usize]> = build().into();
    views().write().entry(key).or_insert(view).clone()
}

/// Drops every cached view.
pub fn clear_cache() {
    let mut views = views().write();
    tracing::debug!(entries = views.len(), "Clearing cached views");
    views.clear();
}

/// Drops the cached views of one beatmap identity.
pub fn invalidate(identity: &str) {
    views().write().retain(|(owner, _), _| owner != identity);
}
