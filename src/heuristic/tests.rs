//! Tests for heuristic type recovery.

use super::*;
use crate::backend::PackedStore;
use parking_lot::Mutex;
use tempfile::TempDir;

fn packed() -> (TempDir, PackedStore) {
    let tmp = TempDir::new().unwrap();
    let store = PackedStore::open(tmp.path().join("packed.redb")).unwrap();
    (tmp, store)
}

fn recovered(value: Value) -> Recovery {
    let (_tmp, store) = packed();
    store.put_value("k", &value).unwrap();
    probe(&store, "k").unwrap()
}

#[test]
fn test_string() {
    assert_eq!(recovered(Value::from("hello")), Recovery::exact(Value::from("hello")));
}

#[test]
fn test_int_max_stays_int() {
    assert_eq!(
        recovered(Value::Int(i32::MAX)).value,
        Value::Int(2_147_483_647)
    );
}

#[test]
fn test_beyond_int_range_is_long() {
    assert_eq!(
        recovered(Value::Long(2_147_483_648)).value,
        Value::Long(2_147_483_648)
    );
    assert_eq!(recovered(Value::Long(i64::MIN)).value, Value::Long(i64::MIN));
}

#[test]
fn test_small_long_collides_with_int() {
    assert_eq!(recovered(Value::Long(42)).value, Value::Int(42));
}

#[test]
fn test_negative_int() {
    assert_eq!(recovered(Value::Int(-123)), Recovery::exact(Value::Int(-123)));
}

#[test]
fn test_float() {
    assert_eq!(recovered(Value::Float(3.14)), Recovery::exact(Value::Float(3.14)));
}

#[test]
fn test_double() {
    assert_eq!(
        recovered(Value::Double(3.141_592_653_589_79)),
        Recovery::exact(Value::Double(3.141_592_653_589_79))
    );
}

/// The zero/NaN branch hands back the double read, so a stored double zero
/// is reported double-typed rather than float-typed. The warning still flags
/// it, since a float zero lands in the same branch.
#[test]
fn test_double_zero_comes_back_double_typed_not_float() {
    let recovery = recovered(Value::Double(0.0));
    assert_eq!(recovery.value.type_tag(), crate::value::TypeTag::Double);
    assert_eq!(recovery.value, Value::Double(0.0));
    assert_eq!(recovery.ambiguity, Some(Ambiguity::FloatZeroOrNan));
}

#[test]
fn test_float_zero_and_nan_come_back_as_double() {
    let zero = recovered(Value::Float(0.0));
    assert_eq!(zero.value, Value::Double(0.0));
    assert_eq!(zero.ambiguity, Some(Ambiguity::FloatZeroOrNan));

    // NaN in a FIXED32 slot: the double probe misses and reads 0.0
    let nan = recovered(Value::Float(f32::NAN));
    assert_eq!(nan.value.type_tag(), crate::value::TypeTag::Double);
    assert_eq!(nan.ambiguity, Some(Ambiguity::FloatZeroOrNan));
}

#[test]
fn test_negative_zero_float_stays_float() {
    let recovery = recovered(Value::Float(-0.0));
    assert!(matches!(recovery.value, Value::Float(f) if f.to_bits() == (-0.0f32).to_bits()));
    assert_eq!(recovery.ambiguity, None);
}

#[test]
fn test_string_set() {
    assert_eq!(
        recovered(Value::set(["a", "b"])).value,
        Value::set(["b", "a"])
    );
    assert_eq!(
        recovered(Value::Set(vec![])).value,
        Value::Set(vec![])
    );
}

#[test]
fn test_bools_collide_with_ints() {
    let t = recovered(Value::Bool(true));
    assert_eq!(t, Recovery::lossy(Value::Int(1), Ambiguity::IntOrBool));
    let f = recovered(Value::Bool(false));
    assert_eq!(f, Recovery::lossy(Value::Int(0), Ambiguity::IntZero));
}

#[test]
fn test_absent_and_empty_string_read_as_zero() {
    let (_tmp, store) = packed();
    store.put_value("empty", &Value::from("")).unwrap();
    for key in ["empty", "missing"] {
        assert_eq!(
            probe(&store, key).unwrap(),
            Recovery::lossy(Value::Int(0), Ambiguity::IntZero)
        );
    }
}

#[test]
fn test_recover_reports_ambiguity_to_sink() {
    let (_tmp, store) = packed();
    store.put_value("flag", &Value::Bool(true)).unwrap();
    store.put_value("name", &Value::from("ada")).unwrap();

    let messages = Mutex::new(Vec::new());
    let sink = |msg: &str| messages.lock().push(msg.to_string());
    assert_eq!(recover(&store, "flag", &sink).unwrap(), Value::Int(1));
    assert_eq!(recover(&store, "name", &sink).unwrap(), Value::from("ada"));

    let messages = messages.lock();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("KV.LossyTypeRecovery -> key: flag"));
}

#[test]
fn test_recover_all() {
    let (_tmp, store) = packed();
    store.put_value("s", &Value::from("x")).unwrap();
    store.put_value("l", &Value::Long(1 << 33)).unwrap();
    store.put_value("d", &Value::Double(-1.5)).unwrap();

    let all = recover_all(&store, &crate::log::NoopLog).unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all["s"], Value::from("x"));
    assert_eq!(all["l"], Value::Long(1 << 33));
    assert_eq!(all["d"], Value::Double(-1.5));
}

/// Probe over fixed answers, for sequences no real store produces.
struct Scripted {
    text: &'static str,
    set: Option<Vec<String>>,
}

impl TypedProbe for Scripted {
    fn probe_string(&self, _key: &str) -> Result<String> {
        Ok(self.text.to_string())
    }

    fn probe_string_set(&self, _key: &str) -> Result<Option<Vec<String>>> {
        Ok(self.set.clone())
    }

    fn probe_float(&self, _key: &str) -> Result<f32> {
        Ok(0.0)
    }

    fn probe_double(&self, _key: &str) -> Result<f64> {
        Ok(0.0)
    }

    fn probe_int(&self, _key: &str) -> Result<i32> {
        Ok(0)
    }

    fn probe_long(&self, _key: &str) -> Result<i64> {
        Ok(0)
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(vec!["k".to_string()])
    }
}

#[test]
fn test_sentinel_without_parsable_set_is_empty_set() {
    let scripted = Scripted {
        text: "\u{1}garbage",
        set: None,
    };
    assert_eq!(probe(&scripted, "k").unwrap().value, Value::Set(vec![]));
}

#[test]
fn test_string_wins_over_set_probe() {
    let scripted = Scripted {
        text: "plain",
        set: Some(vec![]),
    };
    assert_eq!(probe(&scripted, "k").unwrap().value, Value::from("plain"));
}
