//! Test doubles shared with downstream crates through the `test-helpers`
//! feature.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

use bitmap::Bitmap;
use texgen_core::TextureId;

use crate::backend::{TextureAllocDesc, TextureAllocError, TextureBackend};

/// Records every backend call, can fail allocations on demand, and can hold
/// allocations at a gate so tests control exactly when a generation
/// completes. Panics on use-after-destroy and double-destroy.
pub struct RecordingBackend {
    next_id: AtomicU64,
    fail_allocs: AtomicUsize,
    allocs: Mutex<Vec<TextureAllocDesc>>,
    uploads: Mutex<Vec<TextureId>>,
    destroyed: Mutex<Vec<TextureId>>,
    live: Mutex<HashSet<TextureId>>,
    gate: Gate,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            fail_allocs: AtomicUsize::new(0),
            allocs: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            destroyed: Mutex::new(Vec::new()),
            live: Mutex::new(HashSet::new()),
            gate: Gate::default(),
        }
    }

    /// The next `count` allocations report exhaustion.
    pub fn fail_next_allocs(&self, count: usize) {
        self.fail_allocs.store(count, Ordering::SeqCst);
    }

    /// Block allocations until `open_gate`; lets a test pin a generation
    /// mid-flight.
    pub fn close_gate(&self) {
        self.gate.close();
    }

    pub fn open_gate(&self) {
        self.gate.open();
    }

    pub fn alloc_count(&self) -> usize {
        self.allocs.lock().expect("alloc log poisoned").len()
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().expect("upload log poisoned").len()
    }

    pub fn destroyed_count(&self) -> usize {
        self.destroyed.lock().expect("destroy log poisoned").len()
    }

    pub fn destroyed(&self) -> Vec<TextureId> {
        self.destroyed.lock().expect("destroy log poisoned").clone()
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().expect("live set poisoned").len()
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureBackend for RecordingBackend {
    fn alloc(&self, desc: TextureAllocDesc) -> Result<TextureId, TextureAllocError> {
        self.gate.wait_open();
        let remaining = self.fail_allocs.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_allocs.store(remaining - 1, Ordering::SeqCst);
            return Err(TextureAllocError::Exhausted {
                width: desc.width,
                height: desc.height,
            });
        }
        let id = TextureId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.allocs.lock().expect("alloc log poisoned").push(desc);
        self.live.lock().expect("live set poisoned").insert(id);
        Ok(id)
    }

    fn upload(&self, texture: TextureId, bitmap: &Bitmap) {
        assert!(
            self.live
                .lock()
                .expect("live set poisoned")
                .contains(&texture),
            "upload to a texture that is not live: {texture:?}"
        );
        assert!(bitmap.width() > 0 && bitmap.height() > 0);
        self.uploads
            .lock()
            .expect("upload log poisoned")
            .push(texture);
    }

    fn destroy(&self, texture: TextureId) {
        assert!(
            self.live
                .lock()
                .expect("live set poisoned")
                .remove(&texture),
            "destroy of a texture that is not live: {texture:?}"
        );
        self.destroyed
            .lock()
            .expect("destroy log poisoned")
            .push(texture);
    }
}

#[derive(Default)]
struct Gate {
    closed: Mutex<bool>,
    changed: Condvar,
}

impl Gate {
    fn close(&self) {
        *self.closed.lock().expect("gate poisoned") = true;
    }

    fn open(&self) {
        *self.closed.lock().expect("gate poisoned") = false;
        self.changed.notify_all();
    }

    fn wait_open(&self) {
        let mut closed = self.closed.lock().expect("gate poisoned");
        while *closed {
            closed = self.changed.wait(closed).expect("gate poisoned");
        }
    }
}
