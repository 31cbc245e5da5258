// Export modules for library usage
pub mod adapter;
pub mod check;
pub mod core;
pub mod function;
pub mod signature;
pub mod stack;
pub mod validate;
pub mod wrap;

// Re-export commonly used types
pub use crate::core::{
    errors::{Error, Result, ResultExt},
    BoundArgs, CallArgs, Kwargs,
};

pub use crate::signature::{
    bind::{classify_call_values, ClassifiedValues},
    classify::{insert_parameters, parameter_priority, ParameterClassification},
    merge::merge_signatures,
    Parameter, ParameterKind, Signature,
};

pub use crate::function::{Body, DynFunction, Function, FunctionBuilder, ReplaceFunction};

pub use crate::adapter::{adapt_call, FanOutTable, RoutingTable};

pub use crate::wrap::{
    add_parameter, add_parameters, fan_out, keep_original, merge_and_adapt,
    merge_and_adapt_kwargs_only, reset_defaults,
};

pub use crate::stack::{
    current_depth, enter_frame,
    registry::{IgnoreRegistry, IgnoreRule, ModuleRules},
    FrameGuard, IndexedFrame, InfoStyle, Stack, StackFrame, CALL, DEBUG, DECORATOR, NO_SKIP,
    SKIP_MAX, STACK, UI,
};

pub use crate::check::{BoolExpr, CheckFormula, NumberCheck, Predicate};

pub use crate::validate::{
    check_parameters, CheckOutcome, TypeCheck, TypeDict, TypeFloat, TypeInt, TypeList, TypeNumber,
    TypePath, TypeStr,
};
