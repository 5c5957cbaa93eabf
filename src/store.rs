//! store.rs: in-memory annotation repository.
//!
//! Insertion-ordered; every mutation addresses entries by id under one lock,
//! so concurrent enrichment tasks never clobber each other's entries or a
//! concurrent edit/delete. Changes are published on a broadcast channel for
//! renderers that want push updates instead of polling [`AnnotationStore::snapshot`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use metrics::gauge;
use tokio::sync::broadcast;

use crate::annotation::{Annotation, AnnotationId, EnrichmentPatch};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Inserted(Annotation),
    Updated(Annotation),
    Deleted(AnnotationId),
    Reset,
}

#[derive(Debug)]
pub struct AnnotationStore {
    inner: Mutex<Vec<Annotation>>,
    next_id: AtomicU64,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for AnnotationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            events,
        }
    }

    /// Fresh id. Never reused, not even after [`reset`](Self::reset).
    pub fn allocate_id(&self) -> AnnotationId {
        AnnotationId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn insert(&self, annotation: Annotation) {
        let mut v = self.inner.lock().expect("annotation store mutex poisoned");
        v.push(annotation.clone());
        gauge!("annotations_live").set(v.len() as f64);
        let _ = self.events.send(StoreEvent::Inserted(annotation));
    }

    /// Merge an enrichment result into the entry with `id`. Returns `false` when
    /// the id is gone or the entry already reached a terminal status.
    pub fn patch_by_id(&self, id: AnnotationId, patch: EnrichmentPatch) -> bool {
        let mut v = self.inner.lock().expect("annotation store mutex poisoned");
        let Some(entry) = v.iter_mut().find(|a| a.id == id) else {
            return false;
        };
        if !entry.apply(patch) {
            return false;
        }
        let _ = self.events.send(StoreEvent::Updated(entry.clone()));
        true
    }

    /// Replace the caption of `id`. The caption must be non-empty after trimming.
    pub fn edit_caption(&self, id: AnnotationId, caption: &str) -> bool {
        let Some(caption) = crate::annotation::normalize_caption(caption) else {
            return false;
        };
        let mut v = self.inner.lock().expect("annotation store mutex poisoned");
        let Some(entry) = v.iter_mut().find(|a| a.id == id) else {
            return false;
        };
        entry.caption = caption;
        let _ = self.events.send(StoreEvent::Updated(entry.clone()));
        true
    }

    pub fn delete_by_id(&self, id: AnnotationId) -> bool {
        let mut v = self.inner.lock().expect("annotation store mutex poisoned");
        let before = v.len();
        v.retain(|a| a.id != id);
        let removed = v.len() != before;
        if removed {
            gauge!("annotations_live").set(v.len() as f64);
            let _ = self.events.send(StoreEvent::Deleted(id));
        }
        removed
    }

    /// Drop every annotation. Returns how many were removed.
    pub fn reset(&self) -> usize {
        let mut v = self.inner.lock().expect("annotation store mutex poisoned");
        let n = v.len();
        v.clear();
        gauge!("annotations_live").set(0.0);
        let _ = self.events.send(StoreEvent::Reset);
        n
    }

    pub fn get(&self, id: AnnotationId) -> Option<Annotation> {
        let v = self.inner.lock().expect("annotation store mutex poisoned");
        v.iter().find(|a| a.id == id).cloned()
    }

    /// Read projection in insertion order.
    pub fn snapshot(&self) -> Vec<Annotation> {
        self.inner
            .lock()
            .expect("annotation store mutex poisoned")
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("annotation store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
