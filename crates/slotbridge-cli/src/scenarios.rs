//! Built-in scenarios
//!
//! Each scenario drives a fresh bridge with the demo classes registered and
//! records what the host side observes into the transcript, next to what the
//! native objects print themselves.

use std::sync::Arc;

use slotbridge_demo::Transcript;
use slotbridge_engine::{Bridge, Callable, HostMethod, HostValue};

pub type ScenarioFn = fn(&Bridge, &Transcript) -> anyhow::Result<()>;

pub struct Scenario {
    pub name: &'static str,
    pub about: &'static str,
    pub body: ScenarioFn,
}

pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "basic",
        about: "construct, call methods, read and write properties",
        body: basic,
    },
    Scenario {
        name: "connect",
        about: "host callables and native slots on native signals",
        body: connect,
    },
    Scenario {
        name: "subclass",
        about: "host subclass overriding a virtual method",
        body: subclass,
    },
    Scenario {
        name: "marshal",
        about: "values copied across the boundary",
        body: marshal,
    },
];

pub fn find(name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.name == name)
}

fn printer(transcript: &Transcript, name: &str) -> Callable {
    let transcript = transcript.clone();
    let label = name.to_string();
    Callable::function(name, move |args| {
        let shown: Vec<String> = args.iter().map(|a| format!("{:?}", a)).collect();
        transcript.push(format!("{}({})", label, shown.join(", ")));
        Ok(HostValue::None)
    })
}

// ============================================================================
// Scenarios
// ============================================================================

fn basic(bridge: &Bridge, transcript: &Transcript) -> anyhow::Result<()> {
    let to = bridge.construct("QpyTestObject", &[HostValue::Int(3)])?;
    to.call("Print", &[])?;
    to.call("SetValue", &[HostValue::Int(4)])?;
    to.call("Print", &[])?;
    to.call("SetDefaultValue", &[])?;
    to.call("Print", &[])?;

    let same = to.call("Self", &[])?;
    transcript.push(format!("Self() is the same object: {}", same.as_proxy() == Some(&to)));

    to.set("value", 234)?;
    transcript.push(format!("value = {:?}", to.get("value")?));
    if let Err(err) = to.set("value", "not a number") {
        transcript.push(format!("rejected write: {}", err));
    }

    let text = bridge.construct("TestObject", &[HostValue::Str("hello".into())])?;
    transcript.push(format!("text = {:?}", text.get("text")?));
    text.call("method", &[HostValue::Str("called from the host".into())])?;
    Ok(())
}

struct AClass {
    transcript: Transcript,
}

fn connect(bridge: &Bridge, transcript: &Transcript) -> anyhow::Result<()> {
    let to = bridge.construct("QpyTestObject", &[])?;
    let cback1 = printer(transcript, "cback1");
    let cback2 = printer(transcript, "cback2");
    let cback = HostMethod::new("cback", |this: &AClass, args: &[HostValue]| {
        this.transcript.push(format!("aclass.cback({:?})", args[0]));
        Ok(HostValue::None)
    });
    let aclass = Arc::new(AClass {
        transcript: transcript.clone(),
    });
    let bound = cback.bind(&aclass);

    bridge.connect((&to, "aSignal"), &cback1)?;
    bridge.connect((&to, "aSignal"), &cback2)?;
    bridge.connect((&to, "aSignal"), &bound)?;
    to.emit("aSignal", &[HostValue::Int(131)])?;

    let failures = transcript.clone();
    bridge.set_error_hook(move |failure| {
        failures.push(format!("dropped {}: {}", failure.subscriber, failure.error));
    });
    bridge.disconnect((&to, "aSignal"), &cback2)?;
    drop(aclass);
    let report = to.emit("aSignal", &[HostValue::Int(132)])?;
    transcript.push(format!("delivered to {} subscribers", report.delivered));

    let changed = printer(transcript, "changed");
    bridge.connect((&to, "valueChanged(int)"), &changed)?;
    to.call("SetValue", &[HostValue::Int(7)])?;
    to.call("SetValue", &[HostValue::Int(7)])?;

    let listener = bridge.construct("QpyTestObject", &[])?;
    bridge.connect_native((&to, "anotherSignal"), &listener, "catchAnotherSignal")?;
    to.emit("anotherSignal", &[HostValue::Str("across".into())])?;
    Ok(())
}

fn subclass(bridge: &Bridge, transcript: &Transcript) -> anyhow::Result<()> {
    let derived = bridge
        .subclass("QPyDerived", "QpyTestObject")?
        .override_method("Describe", |this, _args| {
            let value = this.call_base("GetValue", &[])?;
            Ok(HostValue::Str(format!("Derived {:?}", value)))
        })
        .build()?;

    let d = derived.instantiate(&[HostValue::Int(4)])?;
    d.call("Print", &[])?;
    transcript.push(format!("base Describe: {:?}", d.call_base("Describe", &[])?));

    let got = printer(transcript, "Got");
    bridge.connect((&d, "aSignal"), &got)?;
    d.call("aSignal", &[HostValue::Int(123)])?;
    bridge.disconnect((&d, "aSignal"), &got)?;
    d.call("aSignal", &[HostValue::Int(321)])?;
    Ok(())
}

fn marshal(bridge: &Bridge, transcript: &Transcript) -> anyhow::Result<()> {
    let to = bridge.construct("QpyTestObject", &[])?;
    for (method, value) in [
        ("copyString", HostValue::Str("a string".into())),
        ("copyFloat", HostValue::Float(1.2)),
        ("copyDouble", HostValue::Float(1.3)),
        ("copyInt", HostValue::Int(42)),
    ] {
        let copy = to.call(method, std::slice::from_ref(&value))?;
        transcript.push(format!("{}({:?}) = {:?}", method, value, copy));
    }
    if let Err(err) = to.call("copyInt", &[HostValue::Int(1 << 40)]) {
        transcript.push(format!("copyInt(1 << 40) failed: {}", err));
    }

    let text = bridge.construct("TestObject", &[])?;
    let floats = HostValue::List(vec![HostValue::Float(0.5), HostValue::Float(1.25)]);
    let shorts = HostValue::List(vec![HostValue::Int(1), HostValue::Int(-2)]);
    transcript.push(format!(
        "copyFloatList = {:?}",
        text.call("copyFloatList", &[floats])?
    ));
    transcript.push(format!(
        "copyShortList = {:?}",
        text.call("copyShortList", &[shorts])?
    ));

    let created = text.call("createObject", &[])?;
    if let Some(created) = created.as_proxy() {
        transcript.push(format!(
            "createObject() -> {:?}, foreign owned: {}",
            created.get("text")?,
            created.is_foreign_owned()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(name: &str) -> Vec<String> {
        let transcript = Transcript::new();
        let bridge = Bridge::default();
        for class in slotbridge_demo::classes(&transcript) {
            bridge.register_class(class).unwrap();
        }
        (find(name).unwrap().body)(&bridge, &transcript).unwrap();
        transcript.take()
    }

    #[test]
    fn test_scenario_names_are_unique() {
        for (i, a) in SCENARIOS.iter().enumerate() {
            assert!(SCENARIOS[i + 1..].iter().all(|b| b.name != a.name));
        }
        assert!(find("missing").is_none());
    }

    #[test]
    fn test_basic() {
        let lines = run("basic");
        assert_eq!(&lines[..3], ["Value = 3", "Value = 4", "Value = 0"]);
        assert!(lines.contains(&"Self() is the same object: true".to_string()));
        assert!(lines.contains(&"value = 234".to_string()));
        assert!(lines.iter().any(|l| l.starts_with("rejected write:")));
    }

    #[test]
    fn test_connect() {
        let lines = run("connect");
        assert_eq!(
            &lines[..3],
            ["cback1(131)", "cback2(131)", "aclass.cback(131)"]
        );
        assert_eq!(lines[3], "cback1(132)");
        assert!(lines[4].starts_with("dropped cback"));
        assert_eq!(lines[5], "delivered to 1 subscribers");
        assert_eq!(lines[6], "changed(7)");
        assert_eq!(lines[7], "Caught another signal across");
        assert_eq!(lines.len(), 8);
    }

    #[test]
    fn test_subclass() {
        let lines = run("subclass");
        assert_eq!(
            lines,
            vec!["Derived 4", "base Describe: \"Value = 4\"", "Got(123)"]
        );
    }

    #[test]
    fn test_marshal() {
        let lines = run("marshal");
        assert!(lines.contains(&"copyFloat(1.2) = 1.2".to_string()));
        assert!(lines.iter().any(|l| l.starts_with("copyInt(1 << 40) failed")));
        assert!(lines.contains(&"createObject() -> \"New Object\", foreign owned: false".to_string()));
    }
}
