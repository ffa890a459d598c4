use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use slotbridge_demo::Transcript;
use slotbridge_engine::{Bridge, BridgeOptions, Callable, CrossThreadPolicy, HostValue, Proxy};
use slotbridge_sdk::{NativeContext, NativeValue};

fn setup(policy: CrossThreadPolicy) -> Bridge {
    let transcript = Transcript::new();
    let bridge = Bridge::new(BridgeOptions {
        cross_thread: policy,
        ..BridgeOptions::default()
    });
    for class in slotbridge_demo::classes(&transcript) {
        bridge.register_class(class).unwrap();
    }
    bridge
}

type Seen = Arc<Mutex<Vec<(i64, ThreadId)>>>;

fn listen(bridge: &Bridge, to: &Proxy) -> Seen {
    let seen: Seen = Arc::default();
    let sink = seen.clone();
    let cback = Callable::function("cback", move |args| {
        let value = args[0].as_int().unwrap_or_default();
        sink.lock().push((value, thread::current().id()));
        Ok(HostValue::None)
    });
    bridge.connect((to, "aSignal"), &cback).unwrap();
    seen
}

#[test]
fn test_queued_emission_waits_for_host_thread() {
    let bridge = setup(CrossThreadPolicy::Queue);
    let to = bridge.construct("QpyTestObject", &[]).unwrap();
    let seen = listen(&bridge, &to);

    to.call("EmitFromThread", &[HostValue::Int(5)]).unwrap();
    assert!(seen.lock().is_empty());

    assert_eq!(bridge.process_pending(), 1);
    assert_eq!(*seen.lock(), vec![(5, thread::current().id())]);
    assert_eq!(bridge.process_pending(), 0);
}

#[test]
fn test_blocking_emission_dispatches_on_emitting_thread() {
    let bridge = setup(CrossThreadPolicy::Block);
    let to = bridge.construct("QpyTestObject", &[]).unwrap();
    let seen = listen(&bridge, &to);

    to.call("EmitFromThread", &[HostValue::Int(6)]).unwrap();
    let seen = seen.lock().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, 6);
    assert_ne!(seen[0].1, thread::current().id());
    assert_eq!(bridge.process_pending(), 0);
}

#[test]
fn test_blocking_emission_from_inside_a_subscriber_is_queued() {
    let bridge = setup(CrossThreadPolicy::Block);
    let to = bridge.construct("QpyTestObject", &[]).unwrap();
    let seen = listen(&bridge, &to);

    // the subscriber holds the host lock while joining the emitting worker
    let target = to.clone();
    let trigger = Callable::function("trigger", move |_| {
        target.call("EmitFromThread", &[HostValue::Int(5)])?;
        Ok(HostValue::None)
    });
    bridge.connect((&to, "anotherSignal"), &trigger).unwrap();

    let report = to
        .emit("anotherSignal", &[HostValue::Str("go".into())])
        .unwrap();
    assert!(report.is_clean());
    assert!(seen.lock().is_empty());

    assert_eq!(bridge.process_pending(), 1);
    assert_eq!(*seen.lock(), vec![(5, thread::current().id())]);
}

#[test]
fn test_queued_emission_of_destroyed_source_is_dropped() {
    let bridge = setup(CrossThreadPolicy::Queue);
    let to = bridge.construct("QpyTestObject", &[]).unwrap();
    let seen = listen(&bridge, &to);

    let ctx = bridge.native_context();
    let native = to.native().clone();
    thread::spawn(move || ctx.emit(&native, "aSignal(int)", &[NativeValue::Int(1)]))
        .join()
        .unwrap()
        .unwrap();

    assert!(to.destroy());
    assert_eq!(bridge.process_pending(), 0);
    assert!(seen.lock().is_empty());
}

#[test]
fn test_rebinding_the_host_thread() {
    let bridge = setup(CrossThreadPolicy::Queue);
    let to = bridge.construct("QpyTestObject", &[HostValue::Int(3)]).unwrap();
    let seen = listen(&bridge, &to);

    thread::scope(|s| {
        s.spawn(|| bridge.bind_host_thread());
    });
    to.call("EmitSignal", &[]).unwrap();
    assert!(seen.lock().is_empty());

    bridge.bind_host_thread();
    assert_eq!(bridge.process_pending(), 1);
    to.call("EmitSignal", &[]).unwrap();
    assert_eq!(seen.lock().len(), 2);
}

#[test]
fn test_native_emission_is_validated() {
    let bridge = setup(CrossThreadPolicy::Queue);
    let to = bridge.construct("QpyTestObject", &[]).unwrap();
    let ctx = bridge.native_context();
    assert!(ctx
        .emit(to.native(), "noSuchSignal(int)", &[NativeValue::Int(1)])
        .is_err());
    assert!(ctx
        .emit(to.native(), "aSignal(int)", &[NativeValue::String("x".into())])
        .is_err());
    assert!(ctx.emit(to.native(), "aSignal", &[]).is_err());
    // no subscribers: accepted and dropped
    assert!(ctx
        .emit(to.native(), "aSignal(int)", &[NativeValue::Int(1)])
        .is_ok());
}
