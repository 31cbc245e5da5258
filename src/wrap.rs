//! Build wrapper functions whose introspectable signatures are merged from
//! the functions they impersonate.

use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

use crate::adapter::{FanOutTable, RoutingTable};
use crate::core::{BoundArgs, Error, Result};
use crate::function::{Body, DynFunction};
use crate::signature::classify::insert_parameters;
use crate::signature::merge::merge_signatures;
use crate::signature::{Parameter, ParameterKind, Signature};

#[derive(Clone, Copy)]
enum DispatchMode {
    Positional,
    KeywordOnly,
}

/// Produce a function that carries the merged signature of `original` and
/// `run` while executing `run`. The wrapper binds its own (merged)
/// signature, routes the bound values into `run`'s parameter buckets by
/// name, and returns `run`'s result unchanged.
pub fn merge_and_adapt(original: &DynFunction, run: DynFunction) -> Result<DynFunction> {
    let merged = merge_signatures(original.signature(), run.signature())?;
    let table = RoutingTable::from_signature(run.signature());
    let doc = merge_docs(&[original.doc(), run.doc()]);
    let attrs = overlay_attrs(&run, original);
    Ok(synthesize(
        original.name().to_string(),
        doc,
        attrs,
        merged,
        table,
        run,
        DispatchMode::Positional,
    ))
}

/// Like [`merge_and_adapt`], but the target is always invoked purely by
/// keyword. Useful when the run function has no var-positional parameter.
pub fn merge_and_adapt_kwargs_only(original: &DynFunction, run: DynFunction) -> Result<DynFunction> {
    let merged = merge_signatures(original.signature(), run.signature())?;
    let table = RoutingTable::from_signature(run.signature());
    let doc = merge_docs(&[original.doc(), run.doc()]);
    let attrs = overlay_attrs(&run, original);
    Ok(synthesize(
        original.name().to_string(),
        doc,
        attrs,
        merged,
        table,
        run,
        DispatchMode::KeywordOnly,
    ))
}

/// Accept the merged signature but execute the original function itself.
/// Run-only parameters are bound and then discarded at dispatch.
pub fn keep_original(original: &DynFunction, run: &DynFunction) -> Result<DynFunction> {
    let merged = merge_signatures(original.signature(), run.signature())?;
    let table = RoutingTable::from_signature(original.signature());
    Ok(synthesize(
        original.name().to_string(),
        original.doc().map(str::to_string),
        original.attrs().clone(),
        merged,
        table,
        original.clone(),
        DispatchMode::Positional,
    ))
}

/// Rebuild `original` with the default values declared by `stub`. The stub's
/// body is never executed; a stub parameter unknown to the original is a
/// configuration error, a stub parameter without a default is ignored.
pub fn reset_defaults(original: &DynFunction, stub: &DynFunction) -> Result<DynFunction> {
    for parameter in stub.signature().parameters() {
        if !original.signature().contains(&parameter.name) {
            return Err(Error::configuration(format!(
                "default override for unknown parameter `{}`",
                parameter.name
            )));
        }
    }

    let mut parameters = original.signature().parameters().to_vec();
    for parameter in &mut parameters {
        if let Some(new_default) = stub
            .signature()
            .get(&parameter.name)
            .and_then(|p| p.default.clone())
        {
            parameter.default = Some(new_default);
        }
    }
    let signature = Signature::new(parameters)?;
    let table = RoutingTable::from_signature(original.signature());
    Ok(synthesize(
        original.name().to_string(),
        original.doc().map(str::to_string),
        original.attrs().clone(),
        signature,
        table,
        original.clone(),
        DispatchMode::Positional,
    ))
}

/// Add one parameter to a function's signature, placed at the end of its
/// priority group. The added value is bound and discarded at dispatch.
pub fn add_parameter(original: &DynFunction, parameter: Parameter) -> Result<DynFunction> {
    add_parameters(original, vec![parameter])
}

/// Add several parameters to a function's signature. See [`add_parameter`].
pub fn add_parameters(original: &DynFunction, additions: Vec<Parameter>) -> Result<DynFunction> {
    let mut parameters = original.signature().parameters().to_vec();
    insert_parameters(&mut parameters, additions)?;
    let signature = Signature::new(parameters)?;
    let table = RoutingTable::from_signature(original.signature());
    Ok(synthesize(
        original.name().to_string(),
        original.doc().map(str::to_string),
        original.attrs().clone(),
        signature,
        table,
        original.clone(),
        DispatchMode::Positional,
    ))
}

/// Route bound values to several sub-target functions at once.
///
/// The run function declares one required slot parameter (name containing
/// `"kw"`) per sub-target: either one per helper, or one extra leading slot
/// for the original function. At call time every slot receives an object
/// holding the bound values matching that sub-target's own parameters; the
/// run function's remaining parameters are passed through by keyword.
///
/// Sub-targets must not declare var-positional or var-keyword parameters,
/// so the partitioning stays parameter-exact; the run function must not
/// declare variadics either.
pub fn fan_out(
    original: &DynFunction,
    helpers: &[&DynFunction],
    run: DynFunction,
) -> Result<DynFunction> {
    if run.signature().var_positional().is_some() || run.signature().var_keyword().is_some() {
        return Err(Error::configuration(format!(
            "fan-out run function `{}` must not declare variadic parameters",
            run.name()
        )));
    }

    let slot_names: Vec<String> = run
        .signature()
        .parameters()
        .iter()
        .filter(|p| !p.has_default() && p.name.contains("kw"))
        .map(|p| p.name.clone())
        .collect();

    let sub_targets: Vec<(&String, &DynFunction)> = if slot_names.len() == helpers.len() {
        slot_names.iter().zip(helpers.iter().copied()).collect()
    } else if slot_names.len() == helpers.len() + 1 {
        std::iter::once((&slot_names[0], original))
            .chain(slot_names[1..].iter().zip(helpers.iter().copied()))
            .collect()
    } else {
        return Err(Error::configuration(format!(
            "fan-out over {} sub-targets needs {} or {} required `kw` slot parameters, found {}",
            helpers.len(),
            helpers.len(),
            helpers.len() + 1,
            slot_names.len()
        )));
    };

    for (_, sub_target) in &sub_targets {
        if sub_target.signature().var_positional().is_some()
            || sub_target.signature().var_keyword().is_some()
        {
            return Err(Error::configuration(format!(
                "fan-out sub-target `{}` must not declare variadic parameters",
                sub_target.name()
            )));
        }
    }

    // first-wins buckets shared by every contributor
    let mut required: IndexMap<String, Parameter> = IndexMap::new();
    let mut defaulted: IndexMap<String, Parameter> = IndexMap::new();
    let mut keyword_only: IndexMap<String, Parameter> = IndexMap::new();
    let mut direct: Vec<String> = Vec::new();

    for parameter in run.signature().parameters() {
        if slot_names.contains(&parameter.name) {
            continue;
        }
        direct.push(parameter.name.clone());
        place_parameter(parameter, &mut required, &mut defaulted, &mut keyword_only);
    }

    let mut slots: IndexMap<String, Vec<String>> = IndexMap::new();
    for (slot, sub_target) in &sub_targets {
        let mut names = Vec::new();
        for parameter in sub_target.signature().parameters() {
            names.push(parameter.name.clone());
            place_parameter(parameter, &mut required, &mut defaulted, &mut keyword_only);
        }
        slots.insert((*slot).clone(), names);
    }

    let mut parameters: Vec<Parameter> = Vec::new();
    parameters.extend(required.into_values());
    parameters.extend(defaulted.into_values());
    parameters.extend(keyword_only.into_values());
    let signature = Signature::new(parameters)?;

    let mut docs = vec![original.doc(), run.doc()];
    docs.extend(helpers.iter().map(|h| h.doc()));
    let doc = merge_docs(&docs);
    let attrs = overlay_attrs(&run, original);
    let name = original.name().to_string();

    let fan_table = FanOutTable::new(direct, slots);
    let body: Arc<Body> = Arc::new(move |bound: &BoundArgs| run.call(&fan_table.dispatch(bound)));
    Ok(DynFunction::from_parts(name, doc, signature, body, attrs))
}

/// Place one contributed parameter into the fan-out buckets, first
/// contributor winning on shared names. Positional kinds are normalized to
/// positional-or-keyword so bucket concatenation always yields a
/// well-ordered signature.
fn place_parameter(
    parameter: &Parameter,
    required: &mut IndexMap<String, Parameter>,
    defaulted: &mut IndexMap<String, Parameter>,
    keyword_only: &mut IndexMap<String, Parameter>,
) {
    let name = parameter.name.clone();
    if parameter.kind == ParameterKind::KeywordOnly {
        if !keyword_only.contains_key(&name) && !required.contains_key(&name) {
            keyword_only.insert(name, parameter.clone());
        }
    } else if parameter.has_default() {
        if !defaulted.contains_key(&name) && !required.contains_key(&name) {
            let mut normalized = parameter.clone();
            normalized.kind = ParameterKind::PositionalOrKeyword;
            defaulted.insert(name, normalized);
        }
    } else if !required.contains_key(&name)
        && !defaulted.contains_key(&name)
        && !keyword_only.contains_key(&name)
    {
        let mut normalized = parameter.clone();
        normalized.kind = ParameterKind::PositionalOrKeyword;
        required.insert(name, normalized);
    }
}

fn synthesize(
    name: String,
    doc: Option<String>,
    attrs: IndexMap<String, Value>,
    signature: Signature,
    table: RoutingTable,
    target: DynFunction,
    mode: DispatchMode,
) -> DynFunction {
    let body: Arc<Body> = Arc::new(move |bound: &BoundArgs| {
        let call = match mode {
            DispatchMode::Positional => table.dispatch(bound),
            DispatchMode::KeywordOnly => table.dispatch_kwargs(bound),
        };
        target.call(&call)
    });
    DynFunction::from_parts(name, doc, signature, body, attrs)
}

fn merge_docs(docs: &[Option<&str>]) -> Option<String> {
    let joined = docs
        .iter()
        .filter_map(|d| *d)
        .filter(|d| !d.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

/// The run function's metadata entries overlaid with the original's; the
/// original wins on conflicts, so stacked decorations keep their earliest
/// annotations.
fn overlay_attrs(run: &DynFunction, original: &DynFunction) -> IndexMap<String, Value> {
    let mut attrs = run.attrs().clone();
    for (name, value) in original.attrs() {
        attrs.insert(name.clone(), value.clone());
    }
    attrs
}
