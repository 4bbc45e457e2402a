use std::sync::Arc;

use arc_swap::ArcSwapOption;

/// Single-slot publication point between a node and whatever consumes its
/// output. Publishing is one atomic swap; readers on other threads always
/// observe either the previous value or the new one, never a torn state.
#[derive(Debug)]
pub struct OutputPort<T> {
    slot: ArcSwapOption<T>,
}

impl<T> OutputPort<T> {
    pub fn new() -> Self {
        Self {
            slot: ArcSwapOption::from(None),
        }
    }

    pub fn publish(&self, value: T) {
        self.slot.store(Some(Arc::new(value)));
    }

    pub fn clear(&self) {
        self.slot.store(None);
    }

    pub fn load(&self) -> Option<Arc<T>> {
        self.slot.load_full()
    }
}

impl<T> Default for OutputPort<T> {
    fn default() -> Self {
        Self::new()
    }
}
