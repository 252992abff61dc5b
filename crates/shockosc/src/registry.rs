//! Latest known parameter values.
//!
//! Two maps keyed by local name: every avatar parameter (prefix
//! `/avatar/parameters/` stripped) and the subset below our namespace that
//! the group state machine uses (prefix `/avatar/parameters/ShockOsc/`
//! stripped).

use dashmap::DashMap;
use rosc::OscType;
use std::sync::Mutex;

/// A parameter value as the game sends it.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f32),
    String(String),
    Nil,
}

impl ParamValue {
    /// Strictly a boolean `true`. Numbers are not truthy.
    pub fn is_true(&self) -> bool {
        matches!(self, ParamValue::Bool(true))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            ParamValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// First argument of a message, `Nil` when there is none.
    pub fn first(args: &[OscType]) -> Self {
        args.first().map(ParamValue::from).unwrap_or(ParamValue::Nil)
    }
}

impl From<&OscType> for ParamValue {
    fn from(value: &OscType) -> Self {
        match value {
            OscType::Bool(b) => ParamValue::Bool(*b),
            OscType::Int(i) => ParamValue::Int(i64::from(*i)),
            OscType::Long(l) => ParamValue::Int(*l),
            OscType::Float(f) => ParamValue::Float(*f),
            OscType::Double(d) => ParamValue::Float(*d as f32),
            OscType::String(s) => ParamValue::String(s.clone()),
            _ => ParamValue::Nil,
        }
    }
}

impl From<&serde_json::Value> for ParamValue {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(b) => ParamValue::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => ParamValue::Int(i),
                None => n
                    .as_f64()
                    .map(|f| ParamValue::Float(f as f32))
                    .unwrap_or(ParamValue::Nil),
            },
            serde_json::Value::String(s) => ParamValue::String(s.clone()),
            _ => ParamValue::Nil,
        }
    }
}

/// Whether a write created an entry or replaced one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
}

#[derive(Debug, Default)]
pub struct ParameterRegistry {
    all: DashMap<String, ParamValue>,
    in_use: DashMap<String, ParamValue>,
    avatar_id: Mutex<Option<String>>,
}

impl ParameterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_avatar_parameter(&self, name: &str, value: ParamValue) -> Upsert {
        upsert(&self.all, name, value)
    }

    pub fn set_in_use(&self, key: &str, value: ParamValue) -> Upsert {
        upsert(&self.in_use, key, value)
    }

    pub fn avatar_parameter(&self, name: &str) -> Option<ParamValue> {
        self.all.get(name).map(|v| v.value().clone())
    }

    pub fn in_use(&self, key: &str) -> Option<ParamValue> {
        self.in_use.get(key).map(|v| v.value().clone())
    }

    pub fn avatar_parameter_count(&self) -> usize {
        self.all.len()
    }

    pub fn in_use_count(&self) -> usize {
        self.in_use.len()
    }

    /// Sorted copy of the in-use map, for display.
    pub fn in_use_snapshot(&self) -> Vec<(String, ParamValue)> {
        let mut entries: Vec<_> = self
            .in_use
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn clear(&self) {
        self.all.clear();
        self.in_use.clear();
    }

    pub fn set_avatar_id(&self, id: Option<String>) {
        if let Ok(mut guard) = self.avatar_id.lock() {
            *guard = id;
        }
    }

    pub fn avatar_id(&self) -> Option<String> {
        self.avatar_id.lock().ok().and_then(|g| g.clone())
    }
}

fn upsert(map: &DashMap<String, ParamValue>, key: &str, value: ParamValue) -> Upsert {
    match map.insert(key.to_string(), value) {
        Some(_) => Upsert::Updated,
        None => Upsert::Inserted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_true_is_strict() {
        assert!(ParamValue::Bool(true).is_true());
        assert!(!ParamValue::Bool(false).is_true());
        assert!(!ParamValue::Int(1).is_true());
        assert!(!ParamValue::Float(1.0).is_true());
    }

    #[test]
    fn as_float_only_accepts_floats() {
        assert_eq!(ParamValue::Float(0.4).as_float(), Some(0.4));
        assert_eq!(ParamValue::Int(1).as_float(), None);
    }

    #[test]
    fn first_argument_or_nil() {
        assert_eq!(ParamValue::first(&[]), ParamValue::Nil);
        assert_eq!(
            ParamValue::first(&[OscType::Float(0.5), OscType::Bool(true)]),
            ParamValue::Float(0.5)
        );
    }

    #[test]
    fn json_values_convert() {
        assert_eq!(ParamValue::from(&serde_json::json!(true)), ParamValue::Bool(true));
        assert_eq!(ParamValue::from(&serde_json::json!(3)), ParamValue::Int(3));
        assert_eq!(ParamValue::from(&serde_json::json!(0.25)), ParamValue::Float(0.25));
        assert_eq!(ParamValue::from(&serde_json::json!(null)), ParamValue::Nil);
    }

    #[test]
    fn upsert_reports_insert_then_update() {
        let registry = ParameterRegistry::new();
        assert_eq!(
            registry.set_in_use("Leg_IShock", ParamValue::Bool(false)),
            Upsert::Inserted
        );
        assert_eq!(
            registry.set_in_use("Leg_IShock", ParamValue::Bool(true)),
            Upsert::Updated
        );
        assert_eq!(registry.in_use("Leg_IShock"), Some(ParamValue::Bool(true)));
    }

    #[test]
    fn clear_empties_both_maps() {
        let registry = ParameterRegistry::new();
        registry.set_avatar_parameter("AFK", ParamValue::Bool(false));
        registry.set_in_use("Leg", ParamValue::Bool(false));
        registry.clear();
        assert_eq!(registry.avatar_parameter_count(), 0);
        assert_eq!(registry.in_use_count(), 0);
    }

    #[test]
    fn snapshot_is_sorted() {
        let registry = ParameterRegistry::new();
        registry.set_in_use("b", ParamValue::Nil);
        registry.set_in_use("a", ParamValue::Nil);
        let keys: Vec<_> = registry.in_use_snapshot().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
