//! In-memory blob registry.
//!
//! Every preview and every converted result is reachable through an
//! [`ObjectRef`]. The blob stays registered exactly as long as its owning
//! reference is alive: dropping the reference revokes it.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
pub struct Blob {
    pub bytes: Arc<[u8]>,
    pub media_type: String,
}

impl Blob {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    blobs: Mutex<HashMap<u64, Blob>>,
}

impl Inner {
    fn blobs(&self) -> MutexGuard<'_, HashMap<u64, Blob>> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cheap to clone; clones share the same registry.
#[derive(Clone, Default)]
pub struct ObjectStore {
    inner: Arc<Inner>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, bytes: Arc<[u8]>, media_type: impl Into<String>) -> ObjectRef {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let blob = Blob { bytes, media_type: media_type.into() };
        self.inner.blobs().insert(id, blob);
        ObjectRef { id, store: Arc::clone(&self.inner) }
    }

    pub fn get(&self, uri: &str) -> Option<Blob> {
        let id = parse_uri(uri)?;
        self.inner.blobs().get(&id).cloned()
    }

    pub fn live_count(&self) -> usize {
        self.inner.blobs().len()
    }
}

impl fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStore").field("live", &self.live_count()).finish()
    }
}

const URI_PREFIX: &str = "blob:image-converter/";

fn parse_uri(uri: &str) -> Option<u64> {
    uri.strip_prefix(URI_PREFIX)?.parse().ok()
}

/// Owning handle to a registered blob. Not `Clone`: there is exactly one
/// owner, and the blob is revoked when it goes away.
pub struct ObjectRef {
    id: u64,
    store: Arc<Inner>,
}

impl ObjectRef {
    pub fn uri(&self) -> String {
        format!("{}{}", URI_PREFIX, self.id)
    }

    pub fn blob(&self) -> Option<Blob> {
        self.store.blobs().get(&self.id).cloned()
    }

    pub fn bytes(&self) -> Option<Arc<[u8]>> {
        self.blob().map(|b| b.bytes)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectRef").field(&self.uri()).finish()
    }
}

impl Drop for ObjectRef {
    fn drop(&mut self) {
        self.store.blobs().remove(&self.id);
    }
}
