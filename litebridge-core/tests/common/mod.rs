// common/mod.rs
// Shared setup for the integration suites

#![allow(dead_code)]

use std::sync::Arc;

use litebridge_core::marshal;
use litebridge_core::testing::{FakeEngine, FakeRuntime, Thrown};
use litebridge_core::{Bridge, BridgeConfig, LocalRef, ManagedRuntime};

/// Untracked parent handle standing in for an open database
pub const DB: i64 = 0xdb00;

/// Bridge with handle poisoning on and the test thread attached, as a
/// managed caller's thread would be
pub fn setup_bridge() -> (Bridge<FakeRuntime>, Arc<FakeEngine>) {
    setup_bridge_with(BridgeConfig {
        poison_handles: true,
        ..BridgeConfig::default()
    })
}

pub fn setup_bridge_with(config: BridgeConfig) -> (Bridge<FakeRuntime>, Arc<FakeEngine>) {
    let engine = Arc::new(FakeEngine::new());
    let bridge = Bridge::init(FakeRuntime::new(), engine.clone(), config).expect("init should succeed");
    bridge.runtime().attach_current_thread("host");
    (bridge, engine)
}

/// Managed string argument
pub fn s(bridge: &Bridge<FakeRuntime>, text: &str) -> Option<LocalRef> {
    marshal::str_to_managed(bridge.runtime(), text).expect("string allocation")
}

/// Managed byte-array argument
pub fn b(bridge: &Bridge<FakeRuntime>, bytes: &[u8]) -> Option<LocalRef> {
    marshal::to_managed_bytes(bridge.runtime(), Some(bytes)).expect("array allocation")
}

pub fn assert_no_exception(bridge: &Bridge<FakeRuntime>) {
    let thrown = bridge.runtime().take_thrown();
    assert!(thrown.is_empty(), "unexpected exception(s): {:?}", thrown);
}

pub fn expect_exception(bridge: &Bridge<FakeRuntime>) -> Thrown {
    let mut thrown = bridge.runtime().take_thrown();
    assert_eq!(thrown.len(), 1, "expected exactly one exception, got {:?}", thrown);
    thrown.remove(0)
}
