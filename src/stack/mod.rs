//! Thread-local call-stack tracking and infrastructure-frame filtering.
//!
//! Instrumented code enters a frame for the duration of a scope; walking the
//! stack skips frames matched by the ignore registry so log lines and traces
//! attribute to the real application call site.
//!
//! ## Thread Safety
//!
//! - Frame stack: each thread has its own (via `thread_local!`)
//! - Ignore registry: single-thread mutation at startup/decoration time,
//!   multi-thread reads during steady state (`RwLock`)
//! - Frame guards use RAII for automatic cleanup on drop

pub mod registry;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::path::PathBuf;

use crate::core::{Error, Result};
use registry::IgnoreRegistry;

/// Walk severity that skips every matching rule
pub const SKIP_MAX: u32 = 1_000_000;
/// Call-wrapper infrastructure
pub const CALL: u32 = 50;
/// Decorator infrastructure
pub const DECORATOR: u32 = 50;
/// Debug-level helpers
pub const DEBUG: u32 = 30;
/// UI-level helpers
pub const UI: u32 = 10;
/// Walk severity that skips nothing
pub const NO_SKIP: u32 = 0;

// Thread-local call stack for the current thread
thread_local! {
    static FRAMES: RefCell<Vec<StackFrame>> = const { RefCell::new(Vec::new()) };
}

/// How much of a frame to include when formatting it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoStyle {
    None,
    FunctionOnly,
    NameFunction,
    ModuleFunction,
    PathFunction,
}

/// Snapshot of one call-stack level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackFrame {
    module: String,
    module_list: Vec<String>,
    file: Option<PathBuf>,
    line: Option<u32>,
    function: String,
    level: u32,
}

impl StackFrame {
    pub fn new(module: impl Into<String>, function: impl Into<String>) -> Self {
        let module = module.into();
        let module_list = registry::split_module(&module);
        Self {
            module,
            module_list,
            file: None,
            line: None,
            function: function.into(),
            level: DECORATOR,
        }
    }

    pub fn with_location(mut self, file: impl Into<PathBuf>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn module_list(&self) -> &[String] {
        &self.module_list
    }

    pub fn file(&self) -> Option<&PathBuf> {
        self.file.as_ref()
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    /// Format this frame for display in a log line or trace
    pub fn info(&self, style: InfoStyle) -> String {
        match style {
            InfoStyle::None => String::new(),
            InfoStyle::FunctionOnly => self.function.clone(),
            InfoStyle::NameFunction => format!(
                "{}{}:{}",
                self.module_list.last().map(String::as_str).unwrap_or(""),
                self.line_suffix(),
                self.function
            ),
            InfoStyle::ModuleFunction => {
                format!("{}{}:{}", self.module, self.line_suffix(), self.function)
            }
            InfoStyle::PathFunction => format!(
                "{}{}:{}",
                self.file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                self.line_suffix(),
                self.function
            ),
        }
    }

    fn line_suffix(&self) -> String {
        match self.line {
            Some(line) => format!(":{line}"),
            None => String::new(),
        }
    }
}

/// RAII guard that pops the entered frame when dropped
#[must_use]
pub struct FrameGuard {
    _private: (),
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        FRAMES.with(|frames| {
            frames.borrow_mut().pop();
        });
    }
}

/// Push a frame onto the current thread's call stack. The returned guard
/// pops it again on drop.
pub fn enter_frame(frame: StackFrame) -> FrameGuard {
    FRAMES.with(|frames| frames.borrow_mut().push(frame));
    FrameGuard { _private: () }
}

/// Number of frames currently entered on this thread
pub fn current_depth() -> usize {
    FRAMES.with(|frames| frames.borrow().len())
}

fn snapshot() -> Vec<StackFrame> {
    FRAMES.with(|frames| frames.borrow().clone())
}

/// A walked frame tagged with its raw distance from the top of the stack,
/// counting ignored frames
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedFrame {
    pub distance: usize,
    pub frame: StackFrame,
}

/// The stack classifier: an ignore registry plus walk primitives over the
/// current thread's frame stack.
pub struct Stack {
    registry: RwLock<IgnoreRegistry>,
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

impl Stack {
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(IgnoreRegistry::default()),
        }
    }

    /// Register a wildcard ignore rule for a module and all its submodules
    pub fn ignore_module(&self, module: &str, level: u32) -> Result<()> {
        self.registry.write().register_module(module, level)
    }

    /// Register an ignore rule for one exact source line, optionally with
    /// the line's text for later self-checking
    pub fn ignore_line(
        &self,
        module: &str,
        file: impl Into<PathBuf>,
        line: u32,
        level: u32,
        check_text: Option<String>,
    ) -> Result<()> {
        self.registry
            .write()
            .register_line(module, file.into(), line, level, check_text)
    }

    /// Whether a frame would be skipped at the given walk severity
    pub fn should_ignore(&self, frame: &StackFrame, threshold: u32) -> bool {
        self.registry.read().should_ignore(frame, threshold)
    }

    /// Total number of registered rules
    pub fn rule_count(&self) -> usize {
        self.registry.read().len()
    }

    /// Return the `depth`-th non-ignored frame from the top of the current
    /// thread's stack. Ignored frames are skipped and do not count toward
    /// `depth`.
    pub fn get_frame(&self, depth: usize, threshold: u32) -> Result<StackFrame> {
        let registry = self.registry.read();
        let frames = snapshot();
        let mut remaining = depth;
        for frame in frames.iter().rev() {
            if registry.should_ignore(frame, threshold) {
                log::trace!(
                    "skipping infrastructure frame {}",
                    frame.info(InfoStyle::ModuleFunction)
                );
                continue;
            }
            if remaining == 0 {
                return Ok(frame.clone());
            }
            remaining -= 1;
        }
        Err(Error::StackExhausted(format!(
            "no non-ignored frame at depth {depth} (walked {} frames)",
            frames.len()
        )))
    }

    /// Return the non-ignored ancestor chain, skipping the first `skip`
    /// non-ignored frames, each tagged with its raw distance from the top.
    pub fn get_frame_list(&self, skip: usize, threshold: u32) -> Vec<IndexedFrame> {
        let registry = self.registry.read();
        let frames = snapshot();
        let mut list = Vec::new();
        let mut skipped = 0usize;
        for (distance, frame) in frames.iter().rev().enumerate() {
            if registry.should_ignore(frame, threshold) {
                continue;
            }
            if skipped < skip {
                skipped += 1;
                continue;
            }
            list.push(IndexedFrame {
                distance,
                frame: frame.clone(),
            });
        }
        list
    }

    /// Re-read every registered line rule that recorded its source text and
    /// fail if any line has drifted.
    pub fn self_check(&self) -> Result<()> {
        self.registry.read().self_check()
    }
}

/// Process-wide classifier instance. Mutate (register) during startup or
/// decoration only; read from any thread afterwards.
pub static STACK: Lazy<Stack> = Lazy::new(Stack::new);

/// Capture a [`StackFrame`] for the current source location.
#[macro_export]
macro_rules! frame {
    ($function:expr) => {
        $crate::stack::StackFrame::new(module_path!(), $function).with_location(file!(), line!())
    };
    ($function:expr, $level:expr) => {
        $crate::stack::StackFrame::new(module_path!(), $function)
            .with_location(file!(), line!())
            .with_level($level)
    };
}

/// Enter a frame for the current source location; the guard pops it on drop.
#[macro_export]
macro_rules! enter_frame {
    ($function:expr) => {
        $crate::stack::enter_frame($crate::frame!($function))
    };
}

/// Register a line ignore rule keyed by the caller's own module and file.
#[macro_export]
macro_rules! register_ignore_line {
    ($stack:expr, $line:expr, $level:expr) => {
        $stack.ignore_line(module_path!(), file!(), $line, $level, None)
    };
    ($stack:expr, $line:expr, $level:expr, $text:expr) => {
        $stack.ignore_line(module_path!(), file!(), $line, $level, Some(String::from($text)))
    };
}

/// Register a wildcard ignore rule keyed by the caller's own module.
#[macro_export]
macro_rules! register_ignore_module {
    ($stack:expr, $level:expr) => {
        $stack.ignore_module(module_path!(), $level)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(module: &str, function: &str, line: u32) -> StackFrame {
        StackFrame::new(module, function).with_location(format!("{module}.rs"), line)
    }

    #[test]
    fn test_frame_guard_pops_on_drop() {
        let baseline = current_depth();
        {
            let _outer = enter_frame(frame("app.outer", "outer", 1));
            assert_eq!(current_depth(), baseline + 1);
            {
                let _inner = enter_frame(frame("app.inner", "inner", 2));
                assert_eq!(current_depth(), baseline + 2);
            }
            assert_eq!(current_depth(), baseline + 1);
        }
        assert_eq!(current_depth(), baseline);
    }

    #[test]
    fn test_get_frame_skips_ignored_frames() {
        let stack = Stack::new();
        stack.ignore_module("infra", DECORATOR).unwrap();

        let _app = enter_frame(frame("app.main", "main", 10));
        let _infra = enter_frame(frame("infra.wrapper", "wrapper", 20));
        let _top = enter_frame(frame("app.handler", "handler", 30));

        let found = stack.get_frame(1, DECORATOR).unwrap();
        assert_eq!(found.module(), "app.main");

        // a low-severity walk keeps the infrastructure frame
        let found = stack.get_frame(1, NO_SKIP).unwrap();
        assert_eq!(found.module(), "infra.wrapper");
    }

    #[test]
    fn test_get_frame_exhaustion() {
        let stack = Stack::new();
        let _only = enter_frame(frame("app.solo", "solo", 1));
        let result = stack.get_frame(50, DECORATOR);
        assert!(matches!(result, Err(Error::StackExhausted(_))));
    }

    #[test]
    fn test_get_frame_list_tags_raw_distance() {
        let stack = Stack::new();
        stack.ignore_module("infra", DECORATOR).unwrap();

        let _a = enter_frame(frame("app.a", "a", 1));
        let _b = enter_frame(frame("infra.b", "b", 2));
        let _c = enter_frame(frame("app.c", "c", 3));

        let list = stack.get_frame_list(0, DECORATOR);
        let summary: Vec<_> = list
            .iter()
            .map(|f| (f.distance, f.frame.module().to_string()))
            .collect();
        assert_eq!(
            summary,
            vec![(0, "app.c".to_string()), (2, "app.a".to_string())]
        );
    }

    #[test]
    fn test_info_styles() {
        let frame = StackFrame::new("pkg.mod", "handler").with_location("src/mod.rs", 12);
        assert_eq!(frame.info(InfoStyle::ModuleFunction), "pkg.mod:12:handler");
        assert_eq!(frame.info(InfoStyle::NameFunction), "mod:12:handler");
        assert_eq!(frame.info(InfoStyle::FunctionOnly), "handler");
        assert_eq!(frame.info(InfoStyle::PathFunction), "src/mod.rs:12:handler");
        assert_eq!(frame.info(InfoStyle::None), "");
    }
}
