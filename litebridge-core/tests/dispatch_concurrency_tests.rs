// dispatch_concurrency_tests.rs
// Callbacks fired from many engine-owned threads at once
//
// Every thread the bridge attaches must be detached again, whatever the
// outcome of the callback, and threads the host attached itself must never
// be detached by the bridge.

use std::sync::{Arc, Barrier};
use std::thread;

use litebridge_core::attach::{self, AttachmentState};
use litebridge_core::testing::{FakeEngine, FakeRuntime};
use litebridge_core::{Bridge, BridgeConfig, CallbackContext, Engine, ManagedRuntime, NativeHandle};

fn shared_bridge() -> (Arc<Bridge<FakeRuntime>>, Arc<FakeEngine>) {
    let engine = Arc::new(FakeEngine::new());
    let bridge = Bridge::init(FakeRuntime::new(), engine.clone(), BridgeConfig::default()).expect("init should succeed");
    (Arc::new(bridge), engine)
}

// =============================================================================
// ATTACH / DETACH SYMMETRY
// =============================================================================

/// Test: Many engine threads logging simultaneously
/// Expected: one attach and one detach per callback, every message delivered
#[test]
fn test_concurrent_log_callbacks_detach_every_thread() {
    const NUM_THREADS: usize = 8;
    const CALLS_PER_THREAD: usize = 50;

    let (bridge, _) = shared_bridge();
    // init attaches and detaches once to resolve symbols
    let baseline = bridge.runtime().attach_count();
    let barrier = Arc::new(Barrier::new(NUM_THREADS));

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|thread_id| {
            let bridge = Arc::clone(&bridge);
            let barrier = Arc::clone(&barrier);

            thread::spawn(move || {
                barrier.wait(); // All threads start together

                for i in 0..CALLS_PER_THREAD {
                    let message = format!("t{}_{}", thread_id, i);
                    bridge.on_log(b"Sync", 2, message.as_bytes());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread should not panic");
    }

    let runtime = bridge.runtime();
    assert_eq!(runtime.calls_to("log").len(), NUM_THREADS * CALLS_PER_THREAD);
    assert_eq!(runtime.attach_count() - baseline, NUM_THREADS * CALLS_PER_THREAD);
    assert_eq!(runtime.attach_count(), runtime.detach_count());
    assert_eq!(runtime.live_local_refs(), 0, "every local ref should be deleted");
}

/// Test: Throwing handlers racing with successful ones
/// Expected: exceptions cleared on the thread that raised them, still symmetric
#[test]
fn test_concurrent_throwing_handlers_still_detach() {
    const NUM_THREADS: usize = 6;
    const CALLS_PER_THREAD: usize = 20;

    let (bridge, _) = shared_bridge();
    bridge.runtime().reply_throw("collectionChanged");
    let barrier = Arc::new(Barrier::new(NUM_THREADS));

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|thread_id| {
            let bridge = Arc::clone(&bridge);
            let barrier = Arc::clone(&barrier);

            thread::spawn(move || {
                barrier.wait();
                for i in 0..CALLS_PER_THREAD {
                    if (thread_id + i) % 2 == 0 {
                        bridge.on_collection_changed(CallbackContext(i as i64));
                    } else {
                        bridge.on_database_changed(CallbackContext(i as i64));
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread should not panic");
    }

    let runtime = bridge.runtime();
    let total = NUM_THREADS * CALLS_PER_THREAD;
    assert_eq!(runtime.calls_to("collectionChanged").len() + runtime.calls_to("databaseChanged").len(), total);
    assert_eq!(runtime.described_count(), runtime.calls_to("collectionChanged").len());
    assert_eq!(runtime.attach_count(), runtime.detach_count());
    assert!(runtime.take_thrown().is_empty(), "the bridge itself throws nothing");
}

/// Test: Outgoing socket buffers from many threads
/// Expected: every buffer freed exactly once, including when attach fails
#[test]
fn test_concurrent_socket_writes_free_each_buffer_once() {
    const NUM_THREADS: usize = 4;
    const WRITES_PER_THREAD: usize = 25;

    let (bridge, engine) = shared_bridge();
    let barrier = Arc::new(Barrier::new(NUM_THREADS));

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|thread_id| {
            let bridge = Arc::clone(&bridge);
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);

            thread::spawn(move || {
                barrier.wait();
                for i in 0..WRITES_PER_THREAD {
                    let frame = format!("frame-{}-{}", thread_id, i);
                    let slice = engine.alloc_slice(frame.as_bytes());
                    bridge.on_socket_write(CallbackContext(1), NativeHandle::from_managed(0x5000), slice);
                }
            })
        })
        .collect();

    // flip attach failure on and off while writes are in flight
    for _ in 0..10 {
        bridge.runtime().fail_attach(true);
        thread::yield_now();
        bridge.runtime().fail_attach(false);
    }

    for handle in handles {
        handle.join().expect("Thread should not panic");
    }

    assert_eq!(engine.slices_freed(), NUM_THREADS * WRITES_PER_THREAD);
    assert_eq!(engine.live_slices(), 0);
    let runtime = bridge.runtime();
    assert_eq!(runtime.attach_count(), runtime.detach_count());
}

// =============================================================================
// NESTING AND HOST THREADS
// =============================================================================

/// Test: Nested entries on one engine thread
/// Expected: attached once, detached once at the outermost exit
#[test]
fn test_nested_entries_detach_once() {
    let (bridge, _) = shared_bridge();
    let bridge_for_thread = Arc::clone(&bridge);
    let before = bridge.runtime().attach_count();

    thread::spawn(move || {
        let runtime = bridge_for_thread.runtime();
        let outer = attach::enter(runtime, "LiteBridge-repl").expect("attach");
        assert_eq!(outer.state(), AttachmentState::AttachedByBridge);
        {
            let inner = attach::enter(runtime, "LiteBridge-repl").expect("attach");
            assert_eq!(inner.state(), AttachmentState::AlreadyAttached);
            bridge_for_thread.on_database_changed(CallbackContext(9));
        }
        assert_eq!(runtime.attachment(), litebridge_core::runtime::Attachment::Attached);
        drop(outer);
        assert_eq!(runtime.attachment(), litebridge_core::runtime::Attachment::Detached);
    })
    .join()
    .expect("Thread should not panic");

    let runtime = bridge.runtime();
    assert_eq!(runtime.attach_count() - before, 1);
    assert_eq!(runtime.attach_count(), runtime.detach_count());
}

/// Test: Callbacks on threads the host attached
/// Expected: the bridge never detaches them
#[test]
fn test_host_attached_threads_are_left_alone() {
    const NUM_THREADS: usize = 4;

    let (bridge, _) = shared_bridge();
    let before_detach = bridge.runtime().detach_count();
    let barrier = Arc::new(Barrier::new(NUM_THREADS));

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|thread_id| {
            let bridge = Arc::clone(&bridge);
            let barrier = Arc::clone(&barrier);

            thread::spawn(move || {
                assert!(bridge.runtime().attach_current_thread(&format!("host-{}", thread_id)));
                barrier.wait();
                for i in 0..10 {
                    bridge.on_document_changed(CallbackContext(thread_id as i64), b"doc", i);
                }
                assert_eq!(
                    bridge.runtime().attachment(),
                    litebridge_core::runtime::Attachment::Attached
                );
                bridge.runtime().detach_current_thread();
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread should not panic");
    }

    // only the hosts' own detaches
    assert_eq!(bridge.runtime().detach_count() - before_detach, NUM_THREADS);
    let calls = bridge.runtime().calls_to("documentChanged");
    assert_eq!(calls.len(), NUM_THREADS * 10);
    assert!(calls.iter().all(|c| c.thread_name.starts_with("host-")));
}
