use indoc::indoc;
use serde_json::json;
use sigwrap::{
    enter_frame, merge_and_adapt, register_ignore_line, register_ignore_module, CallArgs,
    DynFunction, Error, InfoStyle, Stack, StackFrame, DEBUG, DECORATOR, NO_SKIP, STACK, UI,
};
use std::fs;
use std::sync::{Arc, Mutex};

fn frame(module: &str, function: &str, line: u32) -> StackFrame {
    StackFrame::new(module, function).with_location(format!("{}.rs", module.replace('.', "/")), line)
}

#[test]
fn test_level_gated_skip() {
    let stack = Stack::new();
    stack
        .ignore_line("pkg.mod", "pkg/mod.rs", 10, 50, None)
        .unwrap();

    let candidate = frame("pkg.mod", "helper", 10);
    assert!(stack.should_ignore(&candidate, 50));
    assert!(!stack.should_ignore(&candidate, 10));
}

#[test]
fn test_wildcard_rule_propagates_to_submodules() {
    let stack = Stack::new();
    stack.ignore_module("pkg.mod", 50).unwrap();
    assert!(stack.should_ignore(&frame("pkg.mod.sub", "helper", 10), 50));
    assert!(stack.should_ignore(&frame("pkg.mod.sub", "helper", 424242), 50));
}

#[test]
fn test_reserved_module_registration_fails() {
    assert!(matches!(
        STACK.ignore_module("__main__", DECORATOR),
        Err(Error::Configuration(_))
    ));
    assert!(matches!(
        STACK.ignore_module("<unresolved>", DECORATOR),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn test_walk_attributes_to_application_frame() {
    let stack = Stack::new();
    stack.ignore_module("myapp.logging", DECORATOR).unwrap();

    // simulated call chain: main -> handler -> logging wrapper
    let _main = enter_frame(frame("myapp.main", "main", 3));
    let _handler = enter_frame(frame("myapp.handlers", "on_request", 17));
    let _wrapper = enter_frame(frame("myapp.logging.decorators", "log_call", 88));

    // the decorator-severity walk lands on the real caller
    let caller = stack.get_frame(0, DECORATOR).unwrap();
    assert_eq!(caller.info(InfoStyle::ModuleFunction), "myapp.handlers:17:on_request");

    // one level further up
    let parent = stack.get_frame(1, DECORATOR).unwrap();
    assert_eq!(parent.module(), "myapp.main");

    // a UI-severity walk refuses to skip decorator-level rules
    let caller = stack.get_frame(0, UI).unwrap();
    assert_eq!(caller.module(), "myapp.logging.decorators");
}

#[test]
fn test_frame_list_elides_ignored_frames() {
    let stack = Stack::new();
    stack.ignore_module("infra", DEBUG).unwrap();

    let _a = enter_frame(frame("app.a", "a", 1));
    let _b = enter_frame(frame("infra.b", "b", 2));
    let _c = enter_frame(frame("app.c", "c", 3));

    let skipped = stack.get_frame_list(0, DEBUG);
    assert_eq!(skipped.len(), 2);
    assert_eq!(skipped[0].frame.module(), "app.c");
    assert_eq!(skipped[0].distance, 0);
    assert_eq!(skipped[1].frame.module(), "app.a");
    assert_eq!(skipped[1].distance, 2);

    let full = stack.get_frame_list(0, NO_SKIP);
    assert_eq!(full.len(), 3);
}

#[test]
fn test_registration_macros_use_caller_module() {
    let stack = Stack::new();
    register_ignore_module!(stack, DECORATOR).unwrap();
    register_ignore_line!(stack, 10, DECORATOR).unwrap();
    assert_eq!(stack.rule_count(), 2);

    // integration tests compile as a crate named after the file
    let candidate = StackFrame::new("stack_walk_tests", "f").with_line(999);
    assert!(stack.should_ignore(&candidate, DECORATOR));
}

#[test]
fn test_self_check_accepts_unchanged_source() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("rules.rs");
    fs::write(
        &source,
        indoc! {"
            fn alpha() {}
            fn beta() {}
            fn gamma() {}
        "},
    )
    .unwrap();

    let stack = Stack::new();
    stack
        .ignore_line(
            "demo.rules",
            &source,
            2,
            DECORATOR,
            Some("fn beta() {}".to_string()),
        )
        .unwrap();
    stack.self_check().unwrap();
}

#[test]
fn test_self_check_detects_drifted_line() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("rules.rs");
    fs::write(
        &source,
        indoc! {"
            fn alpha() {}
            fn beta() {}
        "},
    )
    .unwrap();

    let stack = Stack::new();
    stack
        .ignore_line(
            "demo.rules",
            &source,
            2,
            DECORATOR,
            Some("fn beta() {}".to_string()),
        )
        .unwrap();
    stack.self_check().unwrap();

    // the file grows a new line above the registered one
    fs::write(
        &source,
        indoc! {"
            fn inserted() {}
            fn alpha() {}
            fn beta() {}
        "},
    )
    .unwrap();

    let result = stack.self_check();
    match result {
        Err(Error::StaleRule {
            line,
            expected,
            found,
            ..
        }) => {
            assert_eq!(line, 2);
            assert_eq!(expected, "fn beta() {}");
            assert_eq!(found, "fn alpha() {}");
        }
        other => panic!("expected a stale rule, got {other:?}"),
    }
}

#[test]
fn test_self_check_reports_truncated_file() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("rules.rs");
    fs::write(&source, "fn alpha() {}\nfn beta() {}\n").unwrap();

    let stack = Stack::new();
    stack
        .ignore_line(
            "demo.rules",
            &source,
            2,
            DECORATOR,
            Some("fn beta() {}".to_string()),
        )
        .unwrap();

    fs::write(&source, "fn alpha() {}\n").unwrap();
    assert!(matches!(stack.self_check(), Err(Error::StaleRule { .. })));
}

#[test]
fn test_logging_decorator_attributes_to_real_caller() {
    let stack = Arc::new(Stack::new());
    stack.ignore_module("logdeco", DECORATOR).unwrap();

    let captured: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let original = DynFunction::builder("compute").required("x").build().unwrap();
    let walker = Arc::clone(&stack);
    let sink = Arc::clone(&captured);
    let run = DynFunction::builder("compute")
        .required("x")
        .body(move |bound| {
            // the wrapper's own frame counts as infrastructure
            let _wrapper = enter_frame(
                StackFrame::new("logdeco.wrapper", "log_call").with_line(7),
            );
            let caller = walker.get_frame(0, DECORATOR)?;
            sink.lock()
                .unwrap()
                .push(caller.info(InfoStyle::ModuleFunction));
            Ok(bound["x"].clone())
        })
        .build()
        .unwrap();
    let wrapped = merge_and_adapt(&original, run).unwrap();

    let _site = enter_frame(StackFrame::new("app.main", "main").with_line(42));
    let result = wrapped
        .call(&CallArgs::positional(vec![json!(5)]))
        .unwrap();

    assert_eq!(result, json!(5));
    assert_eq!(
        *captured.lock().unwrap(),
        vec!["app.main:42:main".to_string()]
    );
}
