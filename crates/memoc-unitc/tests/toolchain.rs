//! The unit compiler driven through the pipeline and on its own.

use std::sync::Arc;

use memoc_core::{
    CompilationDriver, CompilationTask, CompilerConfig, DiagnosticCollector, Error, HostLoader,
    SourceUnit, Toolchain, Value,
};
use memoc_unitc::{OUTPUT_DIR_FLAG, UnitCompiler, codes};

const ACCOUNT: &str = r#"
use bank::Currency;

pub struct Account {
    owner: String,
    balance: i64,
    currency: Currency,
}

impl Account {
    pub fn open(owner: String, deposit: i64) -> Self {
        let fee = if_positive(deposit);
        Self { owner, balance: deposit - fee, currency: Currency::default() }
    }
}
"#;

fn driver(config: CompilerConfig) -> CompilationDriver {
    CompilationDriver::new(Arc::new(UnitCompiler::new()), config)
}

#[test]
fn test_writes_to_output_directory_outside_pipeline() {
    let out = tempfile::tempdir().unwrap();
    let toolchain = UnitCompiler::new();
    let mut file_manager = toolchain.standard_file_manager();
    let mut diagnostics = DiagnosticCollector::new();
    let options = vec![OUTPUT_DIR_FLAG.to_string(), out.path().display().to_string()];
    let unit = SourceUnit::new("bank.Currency", r#"
pub struct Currency { code: String }
impl Default for Currency {
    fn default() -> Self { Self { code: "EUR".into() } }
}
"#);

    let ok = toolchain.compile(CompilationTask {
        options: &options,
        file_manager: file_manager.as_mut(),
        diagnostics: &mut diagnostics,
        units: std::slice::from_ref(&unit),
    });
    assert!(ok, "{}", diagnostics.format());
    assert!(out.path().join("bank/Currency.unit").is_file());

    let host = HostLoader::new();
    let currency = host.define_from_origin(out.path(), "bank.Currency").unwrap();
    assert_eq!(currency.origin(), Some(out.path()));
    assert_eq!(
        currency.new_instance().unwrap().get("code"),
        Some(&Value::from("EUR"))
    );
}

#[test]
fn test_output_without_directory_fails() {
    let toolchain = UnitCompiler::new();
    let mut file_manager = toolchain.standard_file_manager();
    let mut diagnostics = DiagnosticCollector::new();
    let unit = SourceUnit::new("Leaf", "pub struct Leaf;");

    let ok = toolchain.compile(CompilationTask {
        options: &[],
        file_manager: file_manager.as_mut(),
        diagnostics: &mut diagnostics,
        units: std::slice::from_ref(&unit),
    });
    assert!(!ok);
    assert_eq!(diagnostics.diagnostics()[0].code, codes::OUTPUT);
}

#[test]
fn test_pipeline_reports_every_error() {
    let err = driver(CompilerConfig::default())
        .compile("bank.Account", ACCOUNT, &[])
        .unwrap_err();
    let Error::CompilationFailed { diagnostics, .. } = err else {
        panic!("expected CompilationFailed");
    };
    assert!(diagnostics.contains("Diagnostic #1"));
    assert!(diagnostics.contains(codes::UNRESOLVED_IMPORT));
    assert!(diagnostics.contains(codes::UNKNOWN_VALUE));
    assert!(diagnostics.contains("memo:///bank/Account.rs:"));
}

#[test]
fn test_pipeline_against_class_path() {
    let lib = tempfile::tempdir().unwrap();
    let currency = driver(CompilerConfig::default())
        .compile(
            "bank.Currency",
            "pub struct Currency { code: String } impl Default for Currency { fn default() -> Self { Self { code: String::from(\"USD\") } } }",
            &[],
        )
        .unwrap();
    std::fs::create_dir_all(lib.path().join("bank")).unwrap();
    std::fs::write(
        lib.path().join("bank/Currency.unit"),
        currency.artifacts.get("bank.Currency").unwrap().bytes(),
    )
    .unwrap();

    let host = HostLoader::new();
    host.define_from_origin(lib.path(), "bank.Currency").unwrap();

    let source = ACCOUNT.replace("let fee = if_positive(deposit);", "let fee = 1;");
    let compiled = driver(CompilerConfig::default().class_path([lib.path().display().to_string()]))
        .compile("bank.Account", &source, &[])
        .unwrap();
    let account = compiled.load(host).unwrap();

    let instance = account
        .construct(&[Value::from("ada"), Value::Int(10)])
        .unwrap();
    assert_eq!(instance.get("balance"), Some(&Value::Int(9)));
    let currency = instance.get("currency").and_then(Value::as_object).unwrap();
    assert_eq!(currency.get("code"), Some(&Value::from("USD")));
}
