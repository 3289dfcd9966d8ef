//! The unit compiler toolchain.

use std::io::Write;

use memoc_core::runtime::UnitImage;
use memoc_core::{
    ArtifactKind, CompilationTask, Diagnostic, FileManager, Location, SourceUnit, Toolchain,
};

use crate::codes;
use crate::collect::Module;
use crate::file_manager::StandardFileManager;
use crate::lower;
use crate::session::Session;

/// Drop warnings.
pub const NOWARN_FLAG: &str = "-nowarn";

/// Treat warnings as errors.
pub const DENY_WARNINGS_FLAG: &str = "-Werror";

/// Compiles the unit dialect into unit images.
///
/// Every struct in a source unit becomes one [`ArtifactKind::Unit`] output
/// named `<package>.<Struct>`. Nothing is written unless the whole
/// compilation is free of errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitCompiler;

impl UnitCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Apply toolchain and file manager options. Returns `false` on any bad option.
    fn apply_options(&self, options: &[String], session: &mut Session<'_>) -> bool {
        let mut ok = true;
        let mut i = 0;

        while i < options.len() {
            let option = options[i].as_str();
            i += 1;

            match option {
                NOWARN_FLAG => session.policy_mut().suppress = true,
                DENY_WARNINGS_FLAG => session.policy_mut().deny = true,
                _ => {
                    let Some(arity) = session.file_manager().is_supported_option(option) else {
                        session.report(Diagnostic::error(
                            codes::INVALID_FLAG,
                            format!("unrecognized option `{option}`"),
                        ));
                        ok = false;
                        continue;
                    };

                    let Some(values) = options.get(i..i + arity) else {
                        session.report(Diagnostic::error(
                            codes::INVALID_FLAG,
                            format!("option `{option}` requires {arity} value(s)"),
                        ));
                        ok = false;
                        break;
                    };
                    i += arity;

                    match session.file_manager().handle_option(option, values) {
                        Ok(true) => {}
                        Ok(false) => {
                            session.report(Diagnostic::error(
                                codes::INVALID_FLAG,
                                format!("option `{option}` was not accepted"),
                            ));
                            ok = false;
                        }
                        Err(e) => {
                            session.report(Diagnostic::error(
                                codes::INVALID_FLAG,
                                format!("invalid value for `{option}`: {e}"),
                            ));
                            ok = false;
                        }
                    }
                }
            }
        }

        ok
    }

    /// Parse, check and lower one source unit.
    fn analyse(&self, unit: &SourceUnit, session: &mut Session<'_>) -> Option<Vec<UnitImage>> {
        let file = match syn::parse_file(unit.text()) {
            Ok(file) => file,
            Err(e) => {
                for error in e {
                    session.error_at(unit.uri(), error.span(), codes::SYNTAX, error.to_string());
                }
                return None;
            }
        };

        let errors_before = session.error_count();
        let module = Module::collect(&file, unit, session);
        let sigs = lower::signatures(&module, session);
        let images = lower::lower_module(&module, &sigs, session)?;

        (session.error_count() == errors_before).then_some(images)
    }

    fn emit(&self, unit: &SourceUnit, images: &[UnitImage], session: &mut Session<'_>) {
        for image in images {
            let bytes = match image.encode() {
                Ok(bytes) => bytes,
                Err(e) => {
                    session.report(
                        Diagnostic::error(codes::OUTPUT, format!("failed to encode `{}`: {e}", image.name))
                            .with_source(unit.uri()),
                    );
                    continue;
                }
            };

            let written = session
                .file_manager()
                .get_output(Location::ClassOutput, &image.name, ArtifactKind::Unit, Some(unit))
                .and_then(|mut sink| {
                    sink.write_all(&bytes)?;
                    sink.flush()
                });

            match written {
                Ok(()) => tracing::debug!("Emitted {} ({} bytes)", image.name, bytes.len()),
                Err(e) => session.report(
                    Diagnostic::error(codes::OUTPUT, format!("failed to write `{}`: {e}", image.name))
                        .with_source(unit.uri()),
                ),
            }
        }
    }
}

impl Toolchain for UnitCompiler {
    fn name(&self) -> &str {
        "unitc"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn standard_file_manager(&self) -> Box<dyn FileManager> {
        Box::new(StandardFileManager::new())
    }

    fn is_supported_option(&self, option: &str) -> Option<usize> {
        matches!(option, NOWARN_FLAG | DENY_WARNINGS_FLAG).then_some(0)
    }

    fn compile(&self, task: CompilationTask<'_>) -> bool {
        let CompilationTask {
            options,
            file_manager,
            diagnostics,
            units,
        } = task;
        let mut session = Session::new(file_manager, diagnostics);

        if !self.apply_options(options, &mut session) {
            return false;
        }

        let mut analysed = Vec::with_capacity(units.len());
        for unit in units {
            tracing::debug!("Analysing {}", unit.uri());
            if let Some(images) = self.analyse(unit, &mut session) {
                analysed.push((unit, images));
            }
        }

        if session.error_count() > 0 {
            tracing::debug!(
                "{} errors, {} warnings; nothing emitted",
                session.error_count(),
                session.warning_count()
            );
            return false;
        }

        for (unit, images) in &analysed {
            self.emit(unit, images, &mut session);
        }
        if let Err(e) = session.file_manager().flush() {
            session.report(Diagnostic::error(
                codes::OUTPUT,
                format!("failed to flush outputs: {e}"),
            ));
        }

        session.error_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use memoc_core::compile::PATH_SEPARATOR;
    use memoc_core::{
        ArtifactTable, DiagnosticCollector, Error, HostLoader, MemoryFileStore, UnitLoader,
        UnitResolver, Value,
    };

    use super::*;

    struct Outcome {
        ok: bool,
        diagnostics: DiagnosticCollector,
        artifacts: ArtifactTable,
    }

    impl Outcome {
        fn codes(&self) -> Vec<&str> {
            self.diagnostics
                .diagnostics()
                .iter()
                .map(|d| d.code.as_str())
                .collect()
        }

        fn load(self, name: &str) -> memoc_core::Result<Arc<memoc_core::UnitType>> {
            UnitLoader::new(HostLoader::new(), self.artifacts).resolve(name)
        }
    }

    fn compile_with(name: &str, source: &str, options: &[&str]) -> Outcome {
        let toolchain = UnitCompiler::new();
        let mut store = MemoryFileStore::new(toolchain.standard_file_manager());
        let mut diagnostics = DiagnosticCollector::new();
        let options: Vec<String> = options.iter().map(|o| o.to_string()).collect();
        let unit = SourceUnit::new(name, source);

        let ok = toolchain.compile(CompilationTask {
            options: &options,
            file_manager: &mut store,
            diagnostics: &mut diagnostics,
            units: std::slice::from_ref(&unit),
        });
        Outcome {
            ok,
            diagnostics,
            artifacts: store.artifacts(),
        }
    }

    fn compile(name: &str, source: &str) -> Outcome {
        compile_with(name, source, &[])
    }

    fn assert_fails_with(source: &str, code: &str) {
        let outcome = compile("demo.Counter", source);
        assert!(!outcome.ok, "expected {code} for:\n{source}");
        assert!(
            outcome.codes().contains(&code),
            "expected {code}, got:\n{}",
            outcome.diagnostics.format()
        );
        assert!(outcome.artifacts.is_empty());
    }

    const COUNTER: &str = r#"
pub struct Counter {
    count: i64,
    label: String,
}

impl Counter {
    pub fn new() -> Self {
        Self { count: 0, label: String::from("zero") }
    }

    pub fn starting_at(count: i64) -> Self {
        let label = format_label(count);
        Self { count, label }
    }
}
"#;

    #[test]
    fn test_compiles_fields_and_constructors() {
        let source = r#"
pub struct Counter {
    count: i64,
    label: String,
    ratio: f64,
    active: bool,
}

impl Counter {
    pub fn new() -> Self {
        Self { count: 0, label: "zero".to_string(), ratio: 0.5, active: true }
    }

    pub fn starting_at(count: i64) -> Self {
        let doubled = count * 2;
        let label = "n=".to_string() + &doubled.to_string();
        Self { count: doubled, label, ratio: count as f64 / 4.0, active: count > 0 && !false }
    }
}
"#;
        let outcome = compile("demo.Counter", source);
        assert!(outcome.ok, "{}", outcome.diagnostics.format());
        assert_eq!(outcome.artifacts.names(), vec!["demo.Counter"]);

        let unit = outcome.load("demo.Counter").unwrap();
        assert_eq!(unit.fields().len(), 4);

        let instance = unit.new_instance().unwrap();
        assert_eq!(instance.get("label"), Some(&Value::from("zero")));
        assert_eq!(instance.get("ratio"), Some(&Value::Float(0.5)));

        let instance = unit.construct(&[Value::Int(3)]).unwrap();
        assert_eq!(instance.get("count"), Some(&Value::Int(6)));
        assert_eq!(instance.get("label"), Some(&Value::from("n=6")));
        assert_eq!(instance.get("ratio"), Some(&Value::Float(0.75)));
        assert_eq!(instance.get("active"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_implicit_constructor() {
        let outcome = compile(
            "demo.Plain",
            "pub struct Plain { n: u32, s: String, f: f32, b: bool }",
        );
        assert!(outcome.ok);
        let instance = outcome.load("demo.Plain").unwrap().new_instance().unwrap();
        assert_eq!(instance.get("n"), Some(&Value::Int(0)));
        assert_eq!(instance.get("s"), Some(&Value::from("")));
        assert_eq!(instance.get("f"), Some(&Value::Float(0.0)));
        assert_eq!(instance.get("b"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_unit_struct() {
        let outcome = compile("Marker", "pub struct Marker;");
        assert!(outcome.ok);
        let unit = outcome.load("Marker").unwrap();
        assert!(unit.fields().is_empty());
        assert!(unit.new_instance().is_ok());
    }

    #[test]
    fn test_default_impl_is_a_constructor() {
        let source = r#"
pub struct Settings { retries: i64 }

impl Default for Settings {
    fn default() -> Self {
        Self { retries: 3 }
    }
}
"#;
        let outcome = compile("demo.Settings", source);
        assert!(outcome.ok, "{}", outcome.diagnostics.format());
        let unit = outcome.load("demo.Settings").unwrap();
        assert!(unit.constructor("default").is_some());
        assert!(unit.constructor("new").is_none());
        assert_eq!(unit.new_instance().unwrap().get("retries"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_helper_structs_are_captured() {
        let source = r#"
pub struct Line { start: Point, end: Point }

struct Point { x: i64, y: i64 }

impl Point {
    fn at(x: i64, y: i64) -> Self { Self { x, y } }
}

impl Line {
    pub fn new() -> Self {
        Self { start: Point::at(0, 0), end: Point::at(3, -4) }
    }
}
"#;
        let outcome = compile("geom.Line", source);
        assert!(outcome.ok, "{}", outcome.diagnostics.format());
        assert_eq!(outcome.artifacts.names(), vec!["geom.Line", "geom.Point"]);

        let line = outcome.load("geom.Line").unwrap().new_instance().unwrap();
        let end = line.get("end").and_then(Value::as_object).unwrap();
        assert_eq!(end.type_name(), "geom.Point");
        assert_eq!(end.get("y"), Some(&Value::Int(-4)));
    }

    #[test]
    fn test_syntax_error_is_positioned() {
        let outcome = compile("demo.Counter", "pub struct Counter {\n    count: i64\n");
        assert!(!outcome.ok);
        let diagnostic = &outcome.diagnostics.diagnostics()[0];
        assert_eq!(diagnostic.code, codes::SYNTAX);
        assert_eq!(diagnostic.source.as_deref(), Some("memo:///demo/Counter.rs"));
        assert!(diagnostic.position.is_some());
    }

    #[test]
    fn test_unknown_function_is_reported() {
        // `format_label` is not a constructor call
        assert_fails_with(COUNTER, codes::UNKNOWN_VALUE);
    }

    #[test]
    fn test_type_errors() {
        assert_fails_with("pub struct Counter { n: Missing }", codes::UNKNOWN_TYPE);
        assert_fails_with("pub struct Counter { n: i64, n: i64 }", codes::DUPLICATE_FIELD);
        assert_fails_with(
            "pub struct Counter { n: i64 } impl Counter { fn new() -> Self { Self { n: true } } }",
            codes::MISMATCHED_TYPES,
        );
        assert_fails_with(
            "pub struct Counter { n: i64 } impl Counter { fn new() -> Self { Self { n: 1 + 2.0 } } }",
            codes::MISMATCHED_TYPES,
        );
        assert_fails_with(
            "pub struct Counter { n: bool } impl Counter { fn new() -> Self { Self { n: true + false } } }",
            codes::BINARY_OP,
        );
        assert_fails_with(
            "pub struct Counter { n: i64 } impl Counter { fn new() -> Self { Self { n: -true } } }",
            codes::UNARY_OP,
        );
        assert_fails_with(
            "pub struct Counter { n: i64 } impl Counter { fn new(s: String) -> Self { Self { n: s as i64 } } }",
            codes::INVALID_CAST,
        );
        assert_fails_with(
            "pub struct Counter { n: i64 } impl Counter { fn new() -> Self { Self { n: 99999999999999999999 } } }",
            codes::LITERAL_OUT_OF_RANGE,
        );
    }

    #[test]
    fn test_struct_literal_errors() {
        assert_fails_with(
            "pub struct Counter { n: i64 } impl Counter { fn new() -> Self { Self { } } }",
            codes::MISSING_FIELDS,
        );
        assert_fails_with(
            "pub struct Counter { n: i64 } impl Counter { fn new() -> Self { Self { n: 1, n: 2 } } }",
            codes::FIELD_SPECIFIED_TWICE,
        );
        assert_fails_with(
            "pub struct Counter { n: i64 } impl Counter { fn new() -> Self { Self { n: 1, m: 2 } } }",
            codes::UNKNOWN_FIELD,
        );
        assert_fails_with(
            "pub struct Counter { n: i64 } impl Counter { fn new() -> Self { let x = 1; } }",
            codes::MISMATCHED_TYPES,
        );
    }

    #[test]
    fn test_call_errors() {
        assert_fails_with(
            "pub struct Counter { n: String } impl Counter { fn new() -> Self { Self { n: 1.len() } } }",
            codes::NO_METHOD,
        );
        assert_fails_with(
            "pub struct Counter { n: String } impl Counter { fn new() -> Self { Self { n: String::from() } } }",
            codes::WRONG_ARG_COUNT,
        );
        assert_fails_with(
            r#"pub struct Counter { n: i64 }
impl Counter {
    fn new() -> Self { Self { n: 0 } }
    fn nested() -> Self { let c = Counter::with(1); Self { n: 1 } }
}"#,
            codes::NO_METHOD,
        );
    }

    #[test]
    fn test_item_errors() {
        assert_fails_with("pub struct Counter; pub struct Counter;", codes::DUPLICATE_ITEM);
        assert_fails_with(
            "pub struct Counter; impl Counter { fn new() -> Self { Self } fn new() -> Self { Self } }",
            codes::DUPLICATE_DEFINITION,
        );
        assert_fails_with(
            "pub struct Counter; impl Default for Counter { fn make() -> Self { Self } }",
            codes::NOT_A_TRAIT_MEMBER,
        );
        assert_fails_with(
            "pub struct Counter { n: i64 } impl Counter { fn new(a: i64, a: i64) -> Self { Self { n: a } } }",
            codes::DUPLICATE_PARAM,
        );
        assert_fails_with("use geom::Point; pub struct Counter;", codes::UNRESOLVED_IMPORT);
        assert_fails_with("pub struct Other;", codes::UNIT_NAME_MISMATCH);
        assert_fails_with("pub struct Counter; fn helper() {}", codes::UNSUPPORTED);
        assert_fails_with(
            "pub struct Counter; impl Counter { fn get(&self) -> i64 { 1 } }",
            codes::UNSUPPORTED,
        );
    }

    #[test]
    fn test_unit_struct_tails() {
        for tail in ["Self {}", "Self", "Counter"] {
            let source = format!("pub struct Counter; impl Counter {{ fn new() -> Self {{ {tail} }} }}");
            let outcome = compile("demo.Counter", &source);
            assert!(outcome.ok, "{tail}: {}", outcome.diagnostics.format());
            assert!(outcome.load("demo.Counter").unwrap().new_instance().is_ok());
        }

        assert_fails_with(
            "pub struct Counter { n: i64 } impl Counter { fn new() -> Self { Self } }",
            codes::MISSING_FIELDS,
        );
    }

    /// `0 + 1 + 1 + ...` with `terms` operands.
    fn sum(terms: usize) -> String {
        let mut expr = String::from("0");
        for _ in 1..terms {
            expr.push_str(" + 1");
        }
        format!("pub struct Deep {{ n: i64 }} impl Deep {{ pub fn new() -> Self {{ Self {{ n: {expr} }} }} }}")
    }

    #[test]
    fn test_expression_nesting_limit() {
        let outcome = compile("demo.Deep", &sum(200));
        assert!(outcome.ok, "{}", outcome.diagnostics.format());
        let instance = outcome.load("demo.Deep").unwrap().new_instance().unwrap();
        assert_eq!(instance.get("n"), Some(&Value::Int(199)));

        let outcome = compile("demo.Deep", &sum(2000));
        assert!(!outcome.ok);
        assert_eq!(outcome.codes(), vec![codes::UNSUPPORTED]);
        assert!(outcome.diagnostics.format().contains("nests too deeply"));
        assert!(outcome.artifacts.is_empty());
    }

    #[test]
    fn test_private_struct_is_not_the_logical_unit() {
        let outcome = compile("demo.Counter", "struct Helper;");
        assert!(outcome.ok);
        assert_eq!(outcome.artifacts.names(), vec!["demo.Helper"]);
        assert!(matches!(
            outcome.load("demo.Counter"),
            Err(Error::TypeNotFound(_))
        ));
    }

    #[test]
    fn test_warnings() {
        let unused = "pub struct Counter { n: i64 } impl Counter { fn new(unused: i64) -> Self { Self { n: 1 } } }";

        let outcome = compile("demo.Counter", unused);
        assert!(outcome.ok);
        assert_eq!(outcome.codes(), vec![codes::UNUSED_VARIABLES]);
        assert_eq!(outcome.diagnostics.warning_count(), 1);

        let outcome = compile_with("demo.Counter", unused, &["-nowarn"]);
        assert!(outcome.ok);
        assert!(outcome.diagnostics.is_empty());

        let outcome = compile_with("demo.Counter", unused, &["-Werror"]);
        assert!(!outcome.ok);
        assert_eq!(outcome.diagnostics.error_count(), 1);
        assert!(outcome.artifacts.is_empty());
    }

    #[test]
    fn test_identical_constructors_warn() {
        let source = r#"
pub struct Counter { n: i64 }
impl Counter {
    fn from_a(a: i64) -> Self { Self { n: a } }
    fn from_b(b: i64) -> Self { Self { n: b + 1 } }
}
"#;
        let outcome = compile("demo.Counter", source);
        assert!(outcome.ok);
        assert_eq!(outcome.codes(), vec![codes::IDENTICAL_CONSTRUCTORS]);

        let unit = outcome.load("demo.Counter").unwrap();
        assert!(matches!(
            unit.construct(&[Value::Int(1)]),
            Err(Error::AmbiguousConstructor { .. })
        ));
        let instance = unit.construct_with("from_b", &[Value::Int(1)]).unwrap();
        assert_eq!(instance.get("n"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_invalid_flags() {
        let outcome = compile_with("demo.Counter", "pub struct Counter;", &["-bogus"]);
        assert!(!outcome.ok);
        assert_eq!(outcome.codes(), vec![codes::INVALID_FLAG]);

        let outcome = compile_with("demo.Counter", "pub struct Counter;", &["-cp"]);
        assert!(!outcome.ok);
        assert_eq!(outcome.codes(), vec![codes::INVALID_FLAG]);
    }

    #[test]
    fn test_negative_literals_and_overflow() {
        let source = r#"
pub struct Counter { min: i64, neg: f64 }
impl Counter {
    fn new() -> Self { Self { min: -9223372036854775808, neg: -1.5 } }
    fn overflow(n: i64) -> Self { Self { min: n * 2, neg: 0.0 } }
}
"#;
        let outcome = compile("demo.Counter", source);
        assert!(outcome.ok, "{}", outcome.diagnostics.format());
        let unit = outcome.load("demo.Counter").unwrap();

        let instance = unit.new_instance().unwrap();
        assert_eq!(instance.get("min"), Some(&Value::Int(i64::MIN)));
        assert_eq!(instance.get("neg"), Some(&Value::Float(-1.5)));

        let err = unit.construct(&[Value::Int(i64::MAX)]).unwrap_err();
        assert_eq!(err.to_string(), "execution error: attempt to multiply with overflow");
    }

    #[test]
    fn test_resolves_class_path_units() {
        let lib = tempfile::tempdir().unwrap();
        let point = compile(
            "geom.Point",
            "pub struct Point { x: i64 } impl Point { pub fn at(x: i64) -> Self { Self { x } } }",
        );
        assert!(point.ok);
        std::fs::create_dir_all(lib.path().join("geom")).unwrap();
        std::fs::write(
            lib.path().join("geom/Point.unit"),
            point.artifacts.get("geom.Point").unwrap().bytes(),
        )
        .unwrap();
        let cp = lib.path().display().to_string();

        let imported = r#"
use geom::Point;
pub struct Shape { origin: Point }
impl Shape { pub fn new() -> Self { Self { origin: Point::at(5) } } }
"#;
        let outcome = compile_with("shapes.Shape", imported, &["-cp", &cp]);
        assert!(outcome.ok, "{}", outcome.diagnostics.format());
        assert_eq!(outcome.artifacts.names(), vec!["shapes.Shape"]);

        let same_package = "pub struct Marker { at: Point }";
        let outcome = compile_with("geom.Marker", same_package, &["-cp", &cp]);
        assert!(outcome.ok, "{}", outcome.diagnostics.format());

        let qualified = "pub struct Pin { at: geom::Point }";
        let outcome = compile_with("pins.Pin", qualified, &["-classpath", &format!("/nope{PATH_SEPARATOR}{cp}")]);
        assert!(outcome.ok, "{}", outcome.diagnostics.format());

        let outcome = compile("shapes.Shape", imported);
        assert!(outcome.codes().contains(&codes::UNRESOLVED_IMPORT));
    }

    #[test]
    fn test_invalid_class_path_unit() {
        let lib = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(lib.path().join("geom")).unwrap();
        std::fs::write(lib.path().join("geom/Point.unit"), b"garbage").unwrap();
        let cp = lib.path().display().to_string();

        let outcome = compile_with("demo.Counter", "pub struct Counter { p: geom::Point }", &["-cp", &cp]);
        assert!(!outcome.ok);
        assert!(outcome.codes().contains(&codes::INVALID_UNIT_FILE));
    }
}
