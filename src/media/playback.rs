use std::collections::BTreeMap;
use tokio::sync::watch;
use tracing::debug;

pub const DEFAULT_AUTOPLAY_THRESHOLD: f64 = 0.5;

/// Elects at most one video to autoplay.
///
/// Hover intent wins outright. Without it, the most visible registered
/// candidate plays if its ratio is strictly above the threshold. Equal ratios
/// go to the lowest identifier. The selection is recomputed on every mutation
/// and carries no history.
pub struct PlaybackCoordinator<Id> {
    visibility: BTreeMap<Id, f64>,
    hover: Option<Id>,
    threshold: f64,
    active: watch::Sender<Option<Id>>,
}

impl<Id: Ord + Clone> PlaybackCoordinator<Id> {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_AUTOPLAY_THRESHOLD)
    }

    pub fn with_threshold(threshold: f64) -> Self {
        let (active, _) = watch::channel(None);
        Self {
            visibility: BTreeMap::new(),
            hover: None,
            threshold: clamp_ratio(threshold),
            active,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn current_playing_id(&self) -> Option<Id> {
        self.active.borrow().clone()
    }

    /// Receives every change of the active selection.
    pub fn subscribe(&self) -> watch::Receiver<Option<Id>> {
        self.active.subscribe()
    }

    pub fn candidates(&self) -> usize {
        self.visibility.len()
    }

    /// Upserts a candidate's visibility ratio. Returns whether the active
    /// selection changed.
    pub fn register(&mut self, id: Id, visibility_ratio: f64) -> bool {
        self.visibility.insert(id, clamp_ratio(visibility_ratio));
        self.reselect()
    }

    pub fn unregister(&mut self, id: &Id) -> bool {
        if self.visibility.remove(id).is_none() {
            return false;
        }
        self.reselect()
    }

    /// Sets or clears the hover override.
    pub fn hover_play(&mut self, id: Option<Id>) -> bool {
        self.hover = id;
        self.reselect()
    }

    fn select(&self) -> Option<Id> {
        if let Some(id) = &self.hover {
            return Some(id.clone());
        }

        let mut best: Option<(&Id, f64)> = None;
        for (id, &ratio) in &self.visibility {
            if best.map_or(true, |(_, top)| ratio > top) {
                best = Some((id, ratio));
            }
        }

        best.filter(|&(_, ratio)| ratio > self.threshold)
            .map(|(id, _)| id.clone())
    }

    fn reselect(&mut self) -> bool {
        let next = self.select();
        let changed = self.active.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        if changed {
            debug!(
                "Active video changed ({} candidates, hover: {})",
                self.visibility.len(),
                self.hover.is_some()
            );
        }
        changed
    }
}

impl<Id: Ord + Clone> Default for PlaybackCoordinator<Id> {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_ratio(ratio: f64) -> f64 {
    if ratio.is_nan() {
        0.0
    } else {
        ratio.clamp(0.0, 1.0)
    }
}
