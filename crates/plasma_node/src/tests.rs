use std::sync::Arc;
use std::sync::mpsc;

use node_protocol::ParamValue;
use texgen_core::{CacheKey, SamplingHints};
use texture_cache::test_support::RecordingBackend;
use texture_cache::{TextureCache, WorkerPoolConfig};

use crate::PlasmaTextureNode;

struct Fixture {
    backend: Arc<RecordingBackend>,
    cache: Arc<TextureCache>,
}

impl Fixture {
    fn new() -> Self {
        let backend = Arc::new(RecordingBackend::new());
        let cache = Arc::new(TextureCache::new(
            Arc::clone(&backend) as _,
            WorkerPoolConfig { worker_count: 2 },
        ));
        Self { backend, cache }
    }

    fn node(&self) -> PlasmaTextureNode {
        PlasmaTextureNode::new(Arc::clone(&self.cache))
    }
}

/// Drive a size-64 configuration: every period at (1,1), offsets and color
/// offset at zero, amplitude at one.
fn configure_size_64(node: &mut PlasmaTextureNode) {
    node.write_param("size", ParamValue::OptionIndex(3))
        .expect("size write");
    for period in ["r_period", "g_period", "b_period", "a_period"] {
        node.write_param(period, ParamValue::Float2([1.0, 1.0]))
            .expect("period write");
    }
}

#[test]
fn first_tick_awaits_then_publishes_the_generated_texture() {
    let fixture = Fixture::new();
    let mut node = fixture.node();
    configure_size_64(&mut node);

    node.run();
    assert_eq!(node.state_label(), "Awaiting");
    assert!(node.output().load().is_none(), "output must not change before readiness");

    fixture.cache.wait_idle();
    node.run();
    assert_eq!(node.state_label(), "Published");
    let published = node.output().load().expect("published texture");
    assert_eq!(published.width, 64);
    assert_eq!(published.height, 64);
    assert_eq!(fixture.backend.alloc_count(), 1);

    node.on_remove();
}

#[test]
fn unchanged_ticks_after_publish_are_no_ops() {
    let fixture = Fixture::new();
    let mut node = fixture.node();
    configure_size_64(&mut node);

    node.run();
    fixture.cache.wait_idle();
    node.run();
    let published = node.output().load().expect("published texture");

    for _ in 0..4 {
        node.run();
    }
    assert_eq!(node.state_label(), "Published");
    assert_eq!(fixture.backend.alloc_count(), 1, "no further generation may start");
    assert_eq!(fixture.cache.entry_count(), 1, "no cache mutation on idle ticks");
    let after = node.output().load().expect("output still published");
    assert_eq!(*after, *published);

    node.on_remove();
}

#[test]
fn identical_params_on_a_second_node_hit_the_cache_without_dispatch() {
    let fixture = Fixture::new();
    let mut first = fixture.node();
    configure_size_64(&mut first);
    first.run();
    fixture.cache.wait_idle();
    first.run();

    let mut second = fixture.node();
    configure_size_64(&mut second);
    second.run();
    assert_eq!(second.state_label(), "Published", "ready entry publishes immediately");
    assert_eq!(fixture.backend.alloc_count(), 1, "cache hit must not dispatch");
    assert_eq!(
        second.output().load().expect("hit output").texture,
        first.output().load().expect("first output").texture,
    );

    first.on_remove();
    assert_eq!(
        fixture.backend.destroyed_count(),
        0,
        "the second node still references the texture"
    );
    second.on_remove();
    assert_eq!(fixture.backend.destroyed_count(), 1);
    assert_eq!(fixture.cache.entry_count(), 0);
}

#[test]
fn replaced_texture_stays_published_until_the_replacement_is_ready() {
    let fixture = Fixture::new();
    let mut node = fixture.node();
    configure_size_64(&mut node);
    node.run();
    fixture.cache.wait_idle();
    node.run();
    let first = node.output().load().expect("first publication");

    // Second generation parks inside the backend until the gate opens.
    fixture.backend.close_gate();
    node.write_param("size", ParamValue::OptionIndex(2))
        .expect("size write");
    node.run();
    assert_eq!(node.state_label(), "Awaiting");

    // Churn: repeated ticks while pending must not re-dispatch, must not
    // touch the output, and must not release the published texture.
    for _ in 0..4 {
        node.run();
        let still = node.output().load().expect("old output still live");
        assert_eq!(still.texture, first.texture);
        assert_eq!(fixture.backend.destroyed_count(), 0);
    }

    fixture.backend.open_gate();
    fixture.cache.wait_idle();
    node.run();
    assert_eq!(node.state_label(), "Published");
    let second = node.output().load().expect("second publication");
    assert_eq!(second.width, 32);
    assert_ne!(second.texture, first.texture);
    // Only now, with the replacement published, is the old texture gone.
    assert_eq!(fixture.backend.destroyed(), vec![first.texture]);

    node.on_remove();
}

#[test]
fn failed_generation_keeps_the_last_output_and_retries_next_tick() {
    let fixture = Fixture::new();
    let mut node = fixture.node();
    configure_size_64(&mut node);
    node.run();
    fixture.cache.wait_idle();
    node.run();
    let first = node.output().load().expect("first publication");

    fixture.backend.fail_next_allocs(1);
    node.write_param("size", ParamValue::OptionIndex(1))
        .expect("size write");
    node.run();
    assert_eq!(node.state_label(), "Awaiting");
    fixture.cache.wait_idle();

    // Observe the failure: back to the previous publication, nothing
    // destroyed, output untouched.
    node.run();
    assert_eq!(node.state_label(), "Published");
    assert_eq!(
        node.output().load().expect("old output").texture,
        first.texture
    );
    assert_eq!(fixture.backend.destroyed_count(), 0);

    // The retry is a fresh create on the next tick, and it succeeds.
    node.run();
    assert_eq!(node.state_label(), "Awaiting");
    fixture.cache.wait_idle();
    node.run();
    let second = node.output().load().expect("retried publication");
    assert_eq!(second.width, 16);
    assert_eq!(fixture.backend.destroyed(), vec![first.texture]);

    node.on_remove();
    assert_eq!(fixture.cache.entry_count(), 0);
}

#[test]
fn hint_change_republishes_without_regenerating() {
    let fixture = Fixture::new();
    let mut node = fixture.node();
    configure_size_64(&mut node);
    node.run();
    fixture.cache.wait_idle();
    node.run();
    assert!(
        !node
            .output()
            .load()
            .expect("published")
            .hints
            .contains(SamplingHints::ANISOTROPIC)
    );

    node.write_param("anisotropic_filter", ParamValue::OptionIndex(1))
        .expect("hint write");
    node.run();
    assert_eq!(node.state_label(), "Published");
    assert_eq!(fixture.backend.alloc_count(), 1, "hints never regenerate texels");
    assert!(
        node.output()
            .load()
            .expect("republished")
            .hints
            .contains(SamplingHints::ANISOTROPIC)
    );

    node.on_remove();
}

#[test]
fn unchanged_param_rewrite_does_not_rearm_generation() {
    let fixture = Fixture::new();
    let mut node = fixture.node();
    configure_size_64(&mut node);
    node.run();
    fixture.cache.wait_idle();
    node.run();

    node.write_param("size", ParamValue::OptionIndex(3))
        .expect("identical size write");
    node.run();
    assert_eq!(node.state_label(), "Published");
    assert_eq!(fixture.backend.alloc_count(), 1);
    assert_eq!(
        fixture.cache.refcount(CacheKey::derive(node.params())),
        Some(1)
    );

    node.on_remove();
}

#[test]
fn removal_drains_in_flight_work_before_releasing() {
    let fixture = Fixture::new();
    let mut node = fixture.node();
    configure_size_64(&mut node);

    fixture.backend.close_gate();
    node.run();
    assert_eq!(node.state_label(), "Awaiting");

    let (done_sender, done_receiver) = mpsc::channel();
    let backend = Arc::clone(&fixture.backend);
    let remover = std::thread::spawn(move || {
        node.on_remove();
        done_sender.send(()).expect("report removal finished");
        node
    });

    // Removal is parked on the drain barrier while the generation sits at
    // the gate.
    assert!(matches!(
        done_receiver.try_recv(),
        Err(mpsc::TryRecvError::Empty)
    ));

    backend.open_gate();
    done_receiver
        .recv()
        .expect("removal finishes once the task drains");
    let node = remover.join().expect("remover thread");

    assert_eq!(node.state_label(), "Idle");
    assert!(node.output().load().is_none());
    assert_eq!(fixture.cache.entry_count(), 0, "all references released");
    assert_eq!(fixture.backend.live_count(), 0);
    assert_eq!(fixture.backend.alloc_count(), 1, "the task ran to completion");
}

#[test]
fn removal_is_idempotent_and_safe_when_idle() {
    let fixture = Fixture::new();
    let mut node = fixture.node();
    node.on_remove();
    node.on_remove();
    assert_eq!(fixture.cache.entry_count(), 0);
}
