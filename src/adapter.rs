//! Re-assemble bound wrapper locals into the argument lists of the real
//! target function.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{BoundArgs, CallArgs, Kwargs, Result};
use crate::function::DynFunction;
use crate::signature::bind::classify_call_values;
use crate::signature::classify::ParameterClassification;
use crate::signature::Signature;

/// Bucket assignment of each parameter name in the target function's own
/// signature. Built once at decoration time, read on every call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingTable {
    pub positional: Vec<String>,
    pub var_positional: Option<String>,
    pub keyword: Vec<String>,
    pub var_keyword: Option<String>,
}

impl RoutingTable {
    pub fn from_signature(signature: &Signature) -> Self {
        let classification = ParameterClassification::from_signature(signature);
        Self {
            positional: classification.positional().map(|p| p.name.clone()).collect(),
            var_positional: classification.var_positional.map(|p| p.name),
            keyword: classification.keyword_only.keys().cloned().collect(),
            var_keyword: classification.var_keyword.map(|p| p.name),
        }
    }

    /// Build the target's call from bound wrapper locals. Names missing from
    /// the bound set are skipped, so partial routing tables are legal.
    pub fn dispatch(&self, bound: &BoundArgs) -> CallArgs {
        let mut positional = Vec::new();
        for name in &self.positional {
            if let Some(value) = bound.get(name) {
                positional.push(value.clone());
            }
        }
        if let Some(name) = &self.var_positional {
            match bound.get(name) {
                Some(Value::Array(values)) => positional.extend(values.iter().cloned()),
                Some(value) => positional.push(value.clone()),
                None => {}
            }
        }
        CallArgs::from_parts(positional, self.keyword_map(bound))
    }

    /// Build the target's call purely by keyword: positional names are
    /// keyworded, a bound var-positional lands under its own name.
    pub fn dispatch_kwargs(&self, bound: &BoundArgs) -> CallArgs {
        let mut keyword = Kwargs::new();
        for name in &self.positional {
            if let Some(value) = bound.get(name) {
                keyword.insert(name.clone(), value.clone());
            }
        }
        if let Some(name) = &self.var_positional {
            if let Some(value) = bound.get(name) {
                keyword.insert(name.clone(), value.clone());
            }
        }
        for (name, value) in self.keyword_map(bound) {
            keyword.entry(name).or_insert(value);
        }
        CallArgs::from_parts(Vec::new(), keyword)
    }

    fn keyword_map(&self, bound: &BoundArgs) -> Kwargs {
        let mut keyword = Kwargs::new();
        for name in &self.keyword {
            if let Some(value) = bound.get(name) {
                keyword.insert(name.clone(), value.clone());
            }
        }
        if let Some(name) = &self.var_keyword {
            if let Some(Value::Object(bag)) = bound.get(name) {
                for (key, value) in bag {
                    // explicitly routed keys win over var-keyword contents
                    keyword.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
        }
        keyword
    }
}

/// Partition of bound wrapper locals across several sub-targets: each slot
/// name maps to the parameter names of one sub-target function, and the
/// run function receives one object argument per slot.
#[derive(Debug, Clone, Default)]
pub struct FanOutTable {
    pub direct: Vec<String>,
    pub slots: IndexMap<String, Vec<String>>,
}

impl FanOutTable {
    pub fn new(direct: Vec<String>, slots: IndexMap<String, Vec<String>>) -> Self {
        Self { direct, slots }
    }

    pub fn dispatch(&self, bound: &BoundArgs) -> CallArgs {
        let mut keyword = Kwargs::new();
        for name in &self.direct {
            if let Some(value) = bound.get(name) {
                keyword.insert(name.clone(), value.clone());
            }
        }
        for (slot, names) in &self.slots {
            let mut bag = serde_json::Map::new();
            for name in names {
                if let Some(value) = bound.get(name) {
                    bag.insert(name.clone(), value.clone());
                }
            }
            keyword.insert(slot.clone(), Value::Object(bag));
        }
        CallArgs::from_parts(Vec::new(), keyword)
    }
}

/// Invoke `func` with a base argument set topped up from a donor call.
///
/// Base positional and keyword values are consumed first. A parameter still
/// unfilled is taken from the donor's classified values when it is required
/// (or always, with `force`), falling back to its own default. Surplus base
/// values are dropped unless `func` declares the matching var parameter.
pub fn adapt_call(
    func: &DynFunction,
    base: &CallArgs,
    donor: Option<(&DynFunction, &CallArgs)>,
    force: bool,
) -> Result<Value> {
    let donor_values: IndexMap<String, Value> = match donor {
        Some((donor_func, donor_args)) => {
            classify_call_values(donor_func.signature(), donor_func.name(), donor_args)?.flatten()
        }
        None => IndexMap::new(),
    };

    let classification = ParameterClassification::from_signature(func.signature());
    let mut positional = Vec::new();
    let mut keyword = Kwargs::new();
    let mut used_keywords: Vec<&str> = Vec::new();
    let mut position = 0usize;

    for parameter in classification.positional() {
        if position < base.positional.len() {
            positional.push(base.positional[position].clone());
        } else if let Some(value) = base.keyword.get(&parameter.name) {
            positional.push(value.clone());
            used_keywords.push(parameter.name.as_str());
        } else if force || !parameter.has_default() {
            if let Some(value) = donor_values.get(&parameter.name) {
                positional.push(value.clone());
            }
        } else if let Some(default) = &parameter.default {
            positional.push(default.clone());
        }
        position += 1;
    }
    if classification.var_positional.is_some() && base.positional.len() > position {
        positional.extend(base.positional[position..].iter().cloned());
    }

    for parameter in classification.keyword_only.values() {
        if used_keywords.contains(&parameter.name.as_str()) {
            continue;
        }
        if let Some(value) = base.keyword.get(&parameter.name) {
            keyword.insert(parameter.name.clone(), value.clone());
            used_keywords.push(parameter.name.as_str());
        } else if force || !parameter.has_default() {
            if let Some(value) = donor_values.get(&parameter.name) {
                keyword.insert(parameter.name.clone(), value.clone());
            }
        } else if let Some(default) = &parameter.default {
            keyword.insert(parameter.name.clone(), default.clone());
        }
    }
    if classification.var_keyword.is_some() {
        for (name, value) in &base.keyword {
            if !used_keywords.contains(&name.as_str()) && !keyword.contains_key(name) {
                keyword.insert(name.clone(), value.clone());
            }
        }
    }

    func.call(&CallArgs::from_parts(positional, keyword))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::Parameter;
    use serde_json::json;

    fn table() -> RoutingTable {
        let signature = Signature::new(vec![
            Parameter::required("a"),
            Parameter::var_positional("args"),
            Parameter::keyword_only("k"),
            Parameter::var_keyword("kwargs"),
        ])
        .unwrap();
        RoutingTable::from_signature(&signature)
    }

    fn bound(entries: Vec<(&str, Value)>) -> BoundArgs {
        entries.into_iter().map(|(n, v)| (n.to_string(), v)).collect()
    }

    #[test]
    fn test_dispatch_rebuilds_positional_and_keyword() {
        let call = table().dispatch(&bound(vec![
            ("a", json!(1)),
            ("args", json!([2, 3])),
            ("k", json!(4)),
            ("kwargs", json!({"x": 5})),
        ]));
        assert_eq!(call.positional, vec![json!(1), json!(2), json!(3)]);
        assert_eq!(call.keyword.get("k"), Some(&json!(4)));
        assert_eq!(call.keyword.get("x"), Some(&json!(5)));
    }

    #[test]
    fn test_var_keyword_never_overwrites_routed_value() {
        let call = table().dispatch(&bound(vec![
            ("a", json!(1)),
            ("k", json!(4)),
            ("kwargs", json!({"k": 99, "x": 5})),
        ]));
        assert_eq!(call.keyword.get("k"), Some(&json!(4)));
        assert_eq!(call.keyword.get("x"), Some(&json!(5)));
    }

    #[test]
    fn test_dispatch_skips_unbound_names() {
        let call = table().dispatch(&bound(vec![("k", json!(4))]));
        assert!(call.positional.is_empty());
        assert_eq!(call.keyword.get("k"), Some(&json!(4)));
    }

    #[test]
    fn test_dispatch_kwargs_keywords_everything() {
        let call = table().dispatch_kwargs(&bound(vec![
            ("a", json!(1)),
            ("args", json!([2])),
            ("k", json!(4)),
        ]));
        assert!(call.positional.is_empty());
        assert_eq!(call.keyword.get("a"), Some(&json!(1)));
        assert_eq!(call.keyword.get("args"), Some(&json!([2])));
        assert_eq!(call.keyword.get("k"), Some(&json!(4)));
    }

    #[test]
    fn test_fan_out_partitions_by_slot() {
        let mut slots = IndexMap::new();
        slots.insert("first_kw".to_string(), vec!["a".to_string(), "b".to_string()]);
        slots.insert("second_kw".to_string(), vec!["b".to_string(), "c".to_string()]);
        let table = FanOutTable::new(vec!["mode".to_string()], slots);

        let call = table.dispatch(&bound(vec![
            ("a", json!(1)),
            ("b", json!(2)),
            ("c", json!(3)),
            ("mode", json!("fast")),
        ]));
        assert_eq!(call.keyword.get("mode"), Some(&json!("fast")));
        assert_eq!(call.keyword.get("first_kw"), Some(&json!({"a": 1, "b": 2})));
        assert_eq!(call.keyword.get("second_kw"), Some(&json!({"b": 2, "c": 3})));
    }
}
