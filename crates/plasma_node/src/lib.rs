//! Plasma texture generator node.
//!
//! Per tick the node decides between reusing a cached texture, starting a
//! background generation, or polling one already in flight. It owns at most
//! two references at a time: the published texture and, while a replacement
//! is generating, the retiring one. A replaced texture is released only
//! after its replacement is confirmed ready, so the output port never
//! points at a texture that is being torn down.

mod params;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use node_protocol::{NodeInfo, ParamDescriptor, ParamValue, ParamWriteError, TextureRef};
use texgen_core::{CacheKey, GenerationParams, OutputPort};
use texture_cache::{AcquireError, CreateError, Readiness, TextureCache, TextureHandle};

pub use params::descriptors;

enum NodeState {
    Idle,
    Awaiting { pending: TextureHandle },
    Published { current: TextureHandle },
}

impl NodeState {
    fn label(&self) -> &'static str {
        match self {
            NodeState::Idle => "Idle",
            NodeState::Awaiting { .. } => "Awaiting",
            NodeState::Published { .. } => "Published",
        }
    }
}

pub struct PlasmaTextureNode {
    cache: Arc<TextureCache>,
    params: GenerationParams,
    params_dirty: bool,
    state: NodeState,
    retiring: Option<TextureHandle>,
    output: OutputPort<TextureRef>,
}

impl PlasmaTextureNode {
    pub fn new(cache: Arc<TextureCache>) -> Self {
        Self {
            cache,
            params: GenerationParams::default(),
            // Declared defaults count as unconsumed input, so the first
            // tick generates.
            params_dirty: true,
            state: NodeState::Idle,
            retiring: None,
            output: OutputPort::new(),
        }
    }

    pub fn info() -> NodeInfo {
        params::INFO
    }

    pub fn descriptors() -> &'static [ParamDescriptor] {
        params::descriptors()
    }

    /// Host-side parameter write. Arms the dirty flag only when the stored
    /// value actually changed; rejected writes leave the snapshot intact.
    pub fn write_param(&mut self, name: &str, value: ParamValue) -> Result<(), ParamWriteError> {
        if params::apply(&mut self.params, name, value)? {
            self.params_dirty = true;
        }
        Ok(())
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    pub fn output(&self) -> &OutputPort<TextureRef> {
        &self.output
    }

    pub fn state_label(&self) -> &'static str {
        self.state.label()
    }

    /// One evaluation tick. Never blocks: an in-flight generation is
    /// polled, not awaited, and parameter changes arriving while one is
    /// pending stay queued in the dirty flag until the next idle tick.
    pub fn run(&mut self) {
        if matches!(self.state, NodeState::Awaiting { .. }) {
            self.poll_pending();
            return;
        }

        if !self.params_dirty {
            return;
        }
        self.params_dirty = false;
        self.request(CacheKey::derive(&self.params));
    }

    /// Teardown. Blocks until every generation task has drained, then
    /// releases whatever references this node still holds. The drain comes
    /// first so no task can be writing an entry this node is about to
    /// release to destruction.
    pub fn on_remove(&mut self) {
        self.cache.wait_idle();
        match std::mem::replace(&mut self.state, NodeState::Idle) {
            NodeState::Awaiting { pending } => self.cache.release(pending),
            NodeState::Published { current } => self.cache.release(current),
            NodeState::Idle => {}
        }
        if let Some(retiring) = self.retiring.take() {
            self.cache.release(retiring);
        }
        self.output.clear();
        self.params_dirty = false;
    }

    fn poll_pending(&mut self) {
        let NodeState::Awaiting { pending } = std::mem::replace(&mut self.state, NodeState::Idle)
        else {
            unreachable!("poll_pending entered outside Awaiting");
        };
        match pending.readiness() {
            Readiness::Pending => {
                // Not ready: stay put, touch nothing, dispatch nothing.
                self.state = NodeState::Awaiting { pending };
            }
            Readiness::Ready => {
                self.publish(pending);
                // Retirement is ordered strictly after publication of the
                // replacement.
                if let Some(retiring) = self.retiring.take() {
                    self.cache.release(retiring);
                }
            }
            Readiness::Failed => {
                self.cache.release(pending);
                // The previous texture, if any, is still the live output;
                // put it back and retry from scratch on the next tick.
                self.state = match self.retiring.take() {
                    Some(current) => NodeState::Published { current },
                    None => NodeState::Idle,
                };
                self.params_dirty = true;
            }
        }
    }

    fn request(&mut self, key: CacheKey) {
        if self.cache.has(key) {
            match self.cache.acquire(key) {
                Ok(handle) => {
                    self.adopt(handle);
                    return;
                }
                Err(AcquireError::UnknownKey { .. }) => {
                    // The last holder released between the lookup and the
                    // acquire; fall through to the miss path.
                    eprintln!(
                        "[plasma_node] entry for {key:?} vanished before acquire; treating as a miss"
                    );
                }
            }
        }
        match self.cache.create(key) {
            Ok((handle, ticket)) => {
                self.cache.dispatch(ticket, self.params);
                self.begin_awaiting(handle);
            }
            Err(CreateError::AlreadyExists { .. }) => {
                // Raced a concurrent creator after the failed acquire. Give
                // up for this tick; the re-armed dirty flag converges on
                // the winner's entry next tick, keeping per-tick work
                // bounded and the last published output intact.
                eprintln!("[plasma_node] lost the creation race for {key:?}; retrying next tick");
                self.params_dirty = true;
            }
        }
    }

    /// An existing entry was acquired: publish it if it is ready, wait on
    /// it if another request is still generating it, and treat a failed
    /// one like a miss on the next tick.
    fn adopt(&mut self, handle: TextureHandle) {
        match handle.readiness() {
            Readiness::Ready => {
                let previous = std::mem::replace(&mut self.state, NodeState::Idle);
                self.publish(handle);
                if let NodeState::Published { current } = previous {
                    // Replacement is already ready, so the old texture can
                    // go immediately.
                    self.cache.release(current);
                }
            }
            Readiness::Pending => self.begin_awaiting(handle),
            Readiness::Failed => {
                self.cache.release(handle);
                self.params_dirty = true;
            }
        }
    }

    fn begin_awaiting(&mut self, pending: TextureHandle) {
        let previous = std::mem::replace(&mut self.state, NodeState::Awaiting { pending });
        if let NodeState::Published { current } = previous {
            assert!(
                self.retiring.is_none(),
                "internal invariant violated: retiring slot occupied while starting a request"
            );
            // Still the live output; keep it until the replacement is
            // confirmed ready.
            self.retiring = Some(current);
        }
    }

    fn publish(&mut self, handle: TextureHandle) {
        let payload = handle
            .payload()
            .expect("internal invariant violated: publishing an unready texture");
        self.output.publish(TextureRef {
            texture: payload.texture,
            width: payload.width,
            height: payload.height,
            hints: self.params.hints,
        });
        if trace_enabled() {
            eprintln!(
                "[plasma_node] published {}x{} texture {:?}",
                payload.width, payload.height, payload.texture
            );
        }
        self.state = NodeState::Published { current: handle };
    }
}

fn trace_enabled() -> bool {
    static TRACE: std::sync::OnceLock<bool> = std::sync::OnceLock::new();
    *TRACE.get_or_init(|| std::env::var_os("TEXGEN_NODE_TRACE").is_some())
}
