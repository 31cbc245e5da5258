//! Runtime function objects: a signature as plain data plus a boxed body
//! over bound argument values.

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::core::{BoundArgs, CallArgs, Error, Kwargs, Result};
use crate::signature::{Parameter, Signature};

/// Body of a dynamic function: bound locals in, result value out.
pub type Body = dyn Fn(&BoundArgs) -> Result<Value> + Send + Sync;

/// A runtime-constructed function: name, documentation, introspectable
/// signature, body, and a typed metadata side-table.
///
/// Calling binds the supplied values against the signature and hands the
/// bound locals to the body; whatever the body returns (or fails with)
/// propagates unchanged.
#[derive(Clone)]
pub struct DynFunction {
    name: String,
    doc: Option<String>,
    signature: Signature,
    body: Arc<Body>,
    attrs: IndexMap<String, Value>,
}

impl fmt::Debug for DynFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynFunction")
            .field("name", &self.name)
            .field("signature", &self.signature.to_string())
            .finish()
    }
}

impl DynFunction {
    pub fn builder(name: impl Into<String>) -> FunctionBuilder {
        FunctionBuilder::new(name)
    }

    /// Assemble a function from already-validated parts. Used by the wrap
    /// layer; prefer [`DynFunction::builder`] elsewhere.
    pub(crate) fn from_parts(
        name: String,
        doc: Option<String>,
        signature: Signature,
        body: Arc<Body>,
        attrs: IndexMap<String, Value>,
    ) -> Self {
        Self {
            name,
            doc,
            signature,
            body,
            attrs,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// The metadata side-table attached to this function
    pub fn attrs(&self) -> &IndexMap<String, Value> {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: Value) {
        self.attrs.insert(name.into(), value);
    }

    pub fn call(&self, args: &CallArgs) -> Result<Value> {
        let bound = self.signature.bind(&self.name, args)?;
        (self.body)(&bound)
    }

    pub fn call_positional(&self, values: Vec<Value>) -> Result<Value> {
        self.call(&CallArgs::positional(values))
    }

    pub fn call_kwargs(&self, keyword: Kwargs) -> Result<Value> {
        self.call(&CallArgs::from_parts(Vec::new(), keyword))
    }

    pub(crate) fn body(&self) -> Arc<Body> {
        Arc::clone(&self.body)
    }
}

/// Builder for [`DynFunction`]
pub struct FunctionBuilder {
    name: String,
    doc: Option<String>,
    parameters: Vec<Parameter>,
    attrs: IndexMap<String, Value>,
    body: Option<Arc<Body>>,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: None,
            parameters: Vec::new(),
            attrs: IndexMap::new(),
            body: None,
        }
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn param(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn params(mut self, parameters: impl IntoIterator<Item = Parameter>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    pub fn required(self, name: impl Into<String>) -> Self {
        self.param(Parameter::required(name))
    }

    pub fn optional(self, name: impl Into<String>, default: Value) -> Self {
        self.param(Parameter::optional(name, default))
    }

    pub fn positional_only(self, name: impl Into<String>) -> Self {
        self.param(Parameter::positional_only(name))
    }

    pub fn var_positional(self, name: impl Into<String>) -> Self {
        self.param(Parameter::var_positional(name))
    }

    pub fn keyword_only(self, name: impl Into<String>) -> Self {
        self.param(Parameter::keyword_only(name))
    }

    pub fn keyword_default(self, name: impl Into<String>, default: Value) -> Self {
        self.param(Parameter::keyword_only(name).with_default(default))
    }

    pub fn var_keyword(self, name: impl Into<String>) -> Self {
        self.param(Parameter::var_keyword(name))
    }

    pub fn attr(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attrs.insert(name.into(), value);
        self
    }

    pub fn body(
        mut self,
        body: impl Fn(&BoundArgs) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.body = Some(Arc::new(body));
        self
    }

    /// Validate the parameter list and produce the function. A builder
    /// without a body yields a null-returning stub.
    pub fn build(self) -> Result<DynFunction> {
        let signature = Signature::new(self.parameters)?;
        let body = self.body.unwrap_or_else(|| Arc::new(|_: &BoundArgs| Ok(Value::Null)));
        Ok(DynFunction {
            name: self.name,
            doc: self.doc,
            signature,
            body,
            attrs: self.attrs,
        })
    }
}

fn empty_function() -> DynFunction {
    DynFunction::builder("empty")
        .var_positional("args")
        .var_keyword("kwargs")
        .build()
        .expect("empty function signature is valid")
}

/// A callable with a stored argument set: calling it with no arguments
/// replays the stored ones, calling it with arguments uses those instead.
#[derive(Debug, Clone)]
pub struct Function {
    func: Arc<DynFunction>,
    args: CallArgs,
}

impl Function {
    pub fn new(func: Option<Arc<DynFunction>>, args: CallArgs, empty_ok: bool) -> Result<Self> {
        let func = match func {
            Some(func) => func,
            None if empty_ok => Arc::new(empty_function()),
            None => {
                return Err(Error::configuration(
                    "tried to create a Function with no callable",
                ))
            }
        };
        Ok(Self { func, args })
    }

    pub fn empty() -> Self {
        Self {
            func: Arc::new(empty_function()),
            args: CallArgs::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.func.name()
    }

    pub fn call(&self, args: &CallArgs) -> Result<Value> {
        if args.is_empty() {
            self.func.call(&self.args)
        } else {
            self.func.call(args)
        }
    }
}

/// A callable whose body can be swapped out and restored. Dispatches to the
/// replacement while one is installed, to the original otherwise.
pub struct ReplaceFunction {
    original: Arc<DynFunction>,
    replacement: RwLock<Option<Arc<DynFunction>>>,
}

impl ReplaceFunction {
    pub fn new(original: Arc<DynFunction>) -> Self {
        Self {
            original,
            replacement: RwLock::new(None),
        }
    }

    pub fn replace(&self, replacement: Arc<DynFunction>) {
        *self.replacement.write() = Some(replacement);
    }

    pub fn restore(&self) {
        *self.replacement.write() = None;
    }

    pub fn is_replaced(&self) -> bool {
        self.replacement.read().is_some()
    }

    pub fn original(&self) -> &DynFunction {
        &self.original
    }

    pub fn call(&self, args: &CallArgs) -> Result<Value> {
        let active = self
            .replacement
            .read()
            .as_ref()
            .map(Arc::clone)
            .unwrap_or_else(|| Arc::clone(&self.original));
        active.call(args)
    }
}
