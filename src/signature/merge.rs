//! Merge two parameter lists into the outward signature of a wrapper.

use crate::core::{Error, Result};
use crate::signature::classify::ParameterClassification;
use crate::signature::{Parameter, ParameterKind, Signature};

/// Combine the parameter lists of an original function and a run function
/// into one duplicate-free ordered list.
///
/// Ordering policy: positional parameters without a default (original's
/// first, then run-only additions), positional parameters with a default
/// (same order), the original's var-positional, keyword-only parameters
/// (original's first, then run-only additions), the original's var-keyword.
/// A name present in both lists is taken from the original; the run
/// function's var-positional and var-keyword never survive the merge.
///
/// Fails with a configuration error when the same name occupies different
/// buckets in the two lists, or when the combined ordering would let a
/// required parameter follow an optional one.
pub fn merge_signatures(original: &Signature, run: &Signature) -> Result<Signature> {
    let ori = ParameterClassification::from_signature(original);
    let run = ParameterClassification::from_signature(run);

    let mut merged: Vec<Parameter> = Vec::new();

    for parameter in ori.positional().filter(|p| !p.has_default()) {
        merged.push(parameter.clone());
    }
    for parameter in run.positional().filter(|p| !p.has_default()) {
        if ori.has_positional(&parameter.name) {
            continue;
        }
        reject_cross_bucket(&ori, parameter)?;
        merged.push(parameter.clone());
    }

    for parameter in ori.positional().filter(|p| p.has_default()) {
        merged.push(parameter.clone());
    }
    for parameter in run.positional().filter(|p| p.has_default()) {
        if ori.has_positional(&parameter.name) {
            continue;
        }
        reject_cross_bucket(&ori, parameter)?;
        merged.push(parameter.clone());
    }

    if let Some(parameter) = &ori.var_positional {
        merged.push(parameter.clone());
    }

    for parameter in ori.keyword_only.values() {
        merged.push(parameter.clone());
    }
    for parameter in run.keyword_only.values() {
        if ori.keyword_only.contains_key(&parameter.name) {
            continue;
        }
        reject_cross_bucket(&ori, parameter)?;
        merged.push(parameter.clone());
    }

    if let Some(parameter) = &ori.var_keyword {
        merged.push(parameter.clone());
    }

    Signature::new(merged)
}

fn reject_cross_bucket(ori: &ParameterClassification, addition: &Parameter) -> Result<()> {
    match ori.bucket_of(&addition.name) {
        None => Ok(()),
        Some(kind) if same_bucket(kind, addition.kind) => Ok(()),
        Some(kind) => Err(Error::configuration(format!(
            "parameter `{}` is {} in the run function but {} in the original",
            addition.name, addition.kind, kind
        ))),
    }
}

fn same_bucket(a: ParameterKind, b: ParameterKind) -> bool {
    a == b || (a.is_positional() && b.is_positional())
}
