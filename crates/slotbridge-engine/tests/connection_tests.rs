use std::sync::Arc;

use parking_lot::Mutex;
use slotbridge_demo::Transcript;
use slotbridge_engine::{
    Bridge, BridgeError, Callable, HostError, HostMethod, HostValue, MarshalError, Proxy,
};

fn setup() -> Bridge {
    let transcript = Transcript::new();
    let bridge = Bridge::default();
    for class in slotbridge_demo::classes(&transcript) {
        bridge.register_class(class).unwrap();
    }
    bridge
}

type Log = Arc<Mutex<Vec<String>>>;

fn recorder(log: &Log, name: &str) -> Callable {
    let log = log.clone();
    let label = name.to_string();
    Callable::function(name, move |args| {
        log.lock().push(format!("{} {:?}", label, args));
        Ok(HostValue::None)
    })
}

fn new_object(bridge: &Bridge) -> Proxy {
    bridge.construct("QpyTestObject", &[]).unwrap()
}

struct Receiver {
    log: Log,
}

fn receiver_method() -> HostMethod {
    HostMethod::new("cback", |this: &Receiver, args: &[HostValue]| {
        this.log.lock().push(format!("aclass.cback {:?}", args));
        Ok(HostValue::None)
    })
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn test_subscribers_run_in_connection_order() {
    let bridge = setup();
    let log: Log = Arc::default();
    let to = new_object(&bridge);
    let aclass = Arc::new(Receiver { log: log.clone() });

    bridge.connect((&to, "aSignal(int)"), &recorder(&log, "cback1")).unwrap();
    bridge.connect((&to, "aSignal(int)"), &recorder(&log, "cback2")).unwrap();
    bridge
        .connect((&to, "aSignal(int)"), &receiver_method().bind(&aclass))
        .unwrap();

    let report = to.emit("aSignal", &[HostValue::Int(131)]).unwrap();
    assert_eq!(report.delivered, 3);
    assert!(report.is_clean());
    assert_eq!(
        *log.lock(),
        vec!["cback1 [131]", "cback2 [131]", "aclass.cback [131]"]
    );
}

#[test]
fn test_duplicate_connections_fire_once_each() {
    let bridge = setup();
    let log: Log = Arc::default();
    let to = new_object(&bridge);
    let cback = recorder(&log, "cback");

    bridge.connect((&to, "aSignal"), &cback).unwrap();
    bridge.connect((&to, "aSignal"), &cback).unwrap();
    to.emit("aSignal", &[HostValue::Int(1)]).unwrap();
    assert_eq!(log.lock().len(), 2);

    assert!(bridge.disconnect((&to, "aSignal"), &cback).unwrap());
    assert_eq!(bridge.subscriber_count((&to, "aSignal")).unwrap(), 1);
    to.emit("aSignal", &[HostValue::Int(2)]).unwrap();
    assert_eq!(log.lock().len(), 3);
}

#[test]
fn test_disconnect_all() {
    let bridge = setup();
    let log: Log = Arc::default();
    let to = new_object(&bridge);
    let cback = recorder(&log, "cback");
    let other = recorder(&log, "other");

    for _ in 0..3 {
        bridge.connect((&to, "aSignal"), &cback).unwrap();
    }
    bridge.connect((&to, "aSignal"), &other).unwrap();
    assert_eq!(bridge.disconnect_all((&to, "aSignal"), &cback).unwrap(), 3);
    to.emit("aSignal", &[HostValue::Int(5)]).unwrap();
    assert_eq!(*log.lock(), vec!["other [5]"]);
}

#[test]
fn test_disconnect_by_handle() {
    let bridge = setup();
    let log: Log = Arc::default();
    let to = new_object(&bridge);
    let cback = recorder(&log, "cback");

    let first = bridge.connect((&to, "aSignal"), &cback).unwrap();
    let second = bridge.connect((&to, "aSignal"), &cback).unwrap();
    assert_ne!(first.id(), second.id());
    assert_eq!(first.key(), second.key());

    assert!(bridge.disconnect_handle(&second));
    assert!(!bridge.disconnect_handle(&second));
    assert_eq!(bridge.subscriber_count((&to, "aSignal")).unwrap(), 1);
    assert!(bridge.disconnect_handle(&first));
    assert_eq!(bridge.connection_count(), 0);
}

// ============================================================================
// Disconnect edge cases
// ============================================================================

#[test]
fn test_disconnect_never_connected_is_noop() {
    let bridge = setup();
    let log: Log = Arc::default();
    let to = new_object(&bridge);
    let cback = recorder(&log, "cback");

    assert!(!bridge.disconnect((&to, "aSignal(int)"), &cback).unwrap());
    assert_eq!(bridge.disconnect_all((&to, "anotherSignal"), &cback).unwrap(), 0);

    bridge.connect((&to, "aSignal"), &cback).unwrap();
    assert!(!bridge.disconnect((&to, "anotherSignal"), &cback).unwrap());
    let other = new_object(&bridge);
    assert!(!bridge.disconnect((&other, "aSignal"), &cback).unwrap());
    assert_eq!(bridge.subscriber_count((&to, "aSignal")).unwrap(), 1);
}

#[test]
fn test_disconnect_takes_effect_for_later_emissions_only() {
    let bridge = setup();
    let log: Log = Arc::default();
    let to = new_object(&bridge);
    let signal = to.signal("aSignal").unwrap();

    let victim = recorder(&log, "victim");
    let killer = {
        let signal = signal.clone();
        let victim = victim.clone();
        let log = log.clone();
        Callable::function("killer", move |_| {
            log.lock().push("killer".to_string());
            signal.disconnect(&victim)?;
            Ok(HostValue::None)
        })
    };

    signal.connect(&killer).unwrap();
    signal.connect(&victim).unwrap();
    signal.emit(&[HostValue::Int(1)]).unwrap();
    signal.emit(&[HostValue::Int(2)]).unwrap();

    assert_eq!(*log.lock(), vec!["killer", "victim [1]", "killer"]);
    assert!(signal.disconnect(&killer).unwrap());
}

#[test]
fn test_self_disconnect_during_dispatch() {
    let bridge = setup();
    let log: Log = Arc::default();
    let to = new_object(&bridge);
    let signal = to.signal("aSignal").unwrap();

    let me: Arc<Mutex<Option<Callable>>> = Arc::default();
    let once = {
        let me = me.clone();
        let signal = signal.clone();
        let log = log.clone();
        Callable::function("once", move |args| {
            log.lock().push(format!("once {:?}", args));
            let this = me.lock().clone();
            if let Some(this) = this {
                signal.disconnect(&this)?;
            }
            Ok(HostValue::None)
        })
    };
    *me.lock() = Some(once.clone());

    signal.connect(&once).unwrap();
    signal.connect(&recorder(&log, "after")).unwrap();

    let report = signal.emit(&[HostValue::Int(1)]).unwrap();
    assert_eq!(report.delivered, 2);
    signal.emit(&[HostValue::Int(2)]).unwrap();

    assert_eq!(*log.lock(), vec!["once [1]", "after [1]", "after [2]"]);
    me.lock().take();
}

// ============================================================================
// Resolution errors
// ============================================================================

#[test]
fn test_ambiguous_and_unknown_signals() {
    let bridge = setup();
    let log: Log = Arc::default();
    let to = new_object(&bridge);
    let cback = recorder(&log, "cback");

    match bridge.connect((&to, "valueChanged"), &cback) {
        Err(BridgeError::AmbiguousSignal { candidates, .. }) => {
            assert_eq!(candidates.len(), 2);
        }
        other => panic!("expected ambiguity, got {:?}", other.map(|h| h.id())),
    }
    assert!(matches!(
        bridge.connect((&to, "noSuchSignal"), &cback),
        Err(BridgeError::UnknownSignal { .. })
    ));
    assert!(matches!(
        bridge.connect((&to, "aSignal(string)"), &cback),
        Err(BridgeError::UnknownSignal { .. })
    ));
    assert!(matches!(
        bridge.disconnect((&to, "noSuchSignal"), &cback),
        Err(BridgeError::UnknownSignal { .. })
    ));
    assert_eq!(bridge.connection_count(), 0);

    bridge.connect((&to, "valueChanged( string )"), &cback).unwrap();
    to.emit("valueChanged", &[HostValue::Str("x".into())]).unwrap();
    to.emit("valueChanged", &[HostValue::Int(1)]).unwrap();
    assert_eq!(*log.lock(), vec![r#"cback ["x"]"#]);
}

#[test]
fn test_emit_argument_errors() {
    let bridge = setup();
    let to = new_object(&bridge);
    assert!(matches!(
        to.emit("aSignal", &[HostValue::Str("x".into())]),
        Err(BridgeError::Marshal(MarshalError::TypeMismatch { .. }))
    ));
    assert!(matches!(
        to.emit("aSignal(int)", &[HostValue::Str("x".into())]),
        Err(BridgeError::Marshal(MarshalError::TypeMismatch { .. }))
    ));
    assert!(matches!(
        to.emit("aSignal(int)", &[]),
        Err(BridgeError::Marshal(MarshalError::ArityMismatch { expected: 1, got: 0 }))
    ));
}

#[test]
fn test_emit_overloaded_signal_argument_errors() {
    let bridge = setup();
    let to = new_object(&bridge);
    match to.emit("valueChanged", &[HostValue::Float(1.5)]) {
        Err(BridgeError::Marshal(MarshalError::TypeMismatch { expected, .. })) => {
            assert_eq!(expected, "int");
        }
        other => panic!("expected a type mismatch, got {:?}", other.map(|r| r.delivered)),
    }
    assert!(matches!(
        to.emit("valueChanged", &[]),
        Err(BridgeError::Marshal(MarshalError::ArityMismatch { expected: 1, got: 0 }))
    ));
}

#[test]
fn test_objects_from_another_bridge_are_refused() {
    let bridge = setup();
    let other = setup();
    let log: Log = Arc::default();
    let foreign = new_object(&other);

    assert!(matches!(
        bridge.connect((&foreign, "aSignal"), &recorder(&log, "cback")),
        Err(BridgeError::Marshal(MarshalError::ForeignObject))
    ));
}

// ============================================================================
// Failures during dispatch
// ============================================================================

#[test]
fn test_failing_subscriber_does_not_stop_dispatch() {
    let bridge = setup();
    let log: Log = Arc::default();
    let failures: Log = Arc::default();
    {
        let failures = failures.clone();
        bridge.set_error_hook(move |failure| {
            failures
                .lock()
                .push(format!("{} {}", failure.subscriber, failure.error));
        });
    }
    let to = new_object(&bridge);
    let broken = Callable::function("broken", |_| Err(HostError::runtime("boom")));

    bridge.connect((&to, "aSignal"), &broken).unwrap();
    bridge.connect((&to, "aSignal"), &recorder(&log, "after")).unwrap();

    let report = to.emit("aSignal", &[HostValue::Int(7)]).unwrap();
    assert_eq!(report.delivered, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].signal, "aSignal(int)");
    assert_eq!(*log.lock(), vec!["after [7]"]);
    assert_eq!(*failures.lock(), vec!["broken RuntimeError: boom"]);

    // the failing subscriber stays connected
    assert_eq!(bridge.subscriber_count((&to, "aSignal")).unwrap(), 2);

    bridge.clear_error_hook();
    to.emit("aSignal", &[HostValue::Int(8)]).unwrap();
    assert_eq!(failures.lock().len(), 1);
}

#[test]
fn test_stale_bound_method_is_removed() {
    let bridge = setup();
    let log: Log = Arc::default();
    let to = new_object(&bridge);

    let receiver = Arc::new(Receiver { log: log.clone() });
    let bound = receiver_method().bind(&receiver);
    bridge.connect((&to, "aSignal"), &bound).unwrap();
    bridge.connect((&to, "aSignal"), &recorder(&log, "cback")).unwrap();

    to.emit("aSignal", &[HostValue::Int(1)]).unwrap();
    drop(receiver);
    assert!(!bound.is_alive());

    let report = to.emit("aSignal", &[HostValue::Int(2)]).unwrap();
    assert_eq!(report.delivered, 1);
    assert!(matches!(
        report.failures[0].error,
        BridgeError::StaleSubscription { .. }
    ));
    assert_eq!(bridge.subscriber_count((&to, "aSignal")).unwrap(), 1);
    assert_eq!(
        *log.lock(),
        vec!["aclass.cback [1]", "cback [1]", "cback [2]"]
    );
}

#[test]
fn test_zero_subscribers_is_noop() {
    let bridge = setup();
    let to = new_object(&bridge);
    let report = to.emit("aSignal", &[HostValue::Int(1)]).unwrap();
    assert_eq!(report.delivered, 0);
    assert!(report.is_clean());
    to.call("EmitSignal", &[]).unwrap();
}

#[test]
fn test_bound_identity_distinguishes_receivers() {
    let bridge = setup();
    let log: Log = Arc::default();
    let to = new_object(&bridge);
    let a = Arc::new(Receiver { log: log.clone() });
    let b = Arc::new(Receiver { log: log.clone() });
    let method = receiver_method();

    bridge.connect((&to, "aSignal"), &method.bind(&a)).unwrap();
    bridge.connect((&to, "aSignal"), &method.bind(&b)).unwrap();
    assert!(bridge.disconnect((&to, "aSignal"), &method.bind(&b)).unwrap());
    assert!(!bridge.disconnect((&to, "aSignal"), &method.bind(&b)).unwrap());
    assert_eq!(bridge.subscriber_count((&to, "aSignal")).unwrap(), 1);
    // a rebinding of the same receiver and function matches
    assert!(bridge.disconnect((&to, "aSignal"), &method.bind(&a)).unwrap());
}
