//! 多单元测试：include、import、单元身份与文件头

mod common;
use common::{run_files, ExecError};
use quill_core::compiler::module::Workspace;
use quill_core::{run, ErrorKind, RunSettings, Value};
use quill_vfs::MemoryFileSystem;

fn workspace(files: &[(&str, &str)]) -> Workspace {
    let vfs = MemoryFileSystem::with_sources(files.iter().copied());
    Workspace::new(Default::default(), Box::new(vfs)).unwrap()
}

fn int_of(files: &[(&str, &str)], entry: &str) -> i64 {
    match run_files(files, entry) {
        Ok(output) => match output.value {
            Some(Value::Int(v)) => v,
            other => panic!("expecting int, got {other:?}"),
        },
        Err(err) => panic!("{err}"),
    }
}

fn compile_kind(files: &[(&str, &str)], entry: &str) -> ErrorKind {
    match run_files(files, entry) {
        Err(ExecError::Compile(err)) => err.kind,
        other => panic!("expecting compile error, got {other:?}"),
    }
}

// ===== include =====

#[test]
fn test_include_brings_public_names() {
    let lib = "pub func Twice(int a) int { return a * 2 }\nfunc hidden() int { return 1 }\npub const LIMIT = 21";
    let main = "include \"lib.ql\"\nrun int { return Twice(LIMIT) }";
    assert_eq!(int_of(&[("lib.ql", lib), ("main.ql", main)], "main.ql"), 42);

    let private = "include \"lib.ql\"\nrun int { return hidden() }";
    assert!(matches!(
        compile_kind(&[("lib.ql", lib), ("main.ql", private)], "main.ql"),
        ErrorKind::Function { .. }
    ));
}

#[test]
fn test_pub_block_makes_rest_public() {
    let lib = "pub\nfunc A() int { return 1 }\nfunc B() int { return 2 }";
    let main = "include \"lib.ql\"\nrun int { return A() * 10 + B() }";
    assert_eq!(int_of(&[("lib.ql", lib), ("main.ql", main)], "main.ql"), 12);
}

#[test]
fn test_include_is_transitive_for_public_names() {
    let base = "pub func Base() int { return 7 }";
    let mid = "include \"base.ql\"\npub func Mid() int { return Base() + 1 }";
    let main = "include \"mid.ql\"\nrun int { return Base() * 10 + Mid() }";
    let files = [("base.ql", base), ("mid.ql", mid), ("main.ql", main)];
    assert_eq!(int_of(&files, "main.ql"), 78);
}

#[test]
fn test_include_paths_are_relative_to_unit() {
    let util = "pub func Util() int { return 5 }";
    let helper = "include \"util.ql\"\npub func Helper() int { return Util() * 2 }";
    let main = "include \"lib/helper.ql\"\nrun int { return Helper() }";
    let files = [("lib/util.ql", util), ("lib/helper.ql", helper), ("main.ql", main)];
    assert_eq!(int_of(&files, "main.ql"), 10);
}

#[test]
fn test_include_conflict_is_dup_object() {
    let lib = "pub func F(int a) int { return a }";
    let main = "include \"lib.ql\"\nfunc F(int b) int { return b }\nrun {}";
    assert_eq!(
        compile_kind(&[("lib.ql", lib), ("main.ql", main)], "main.ql"),
        ErrorKind::DupObject("F".into())
    );
    // 签名不同视为重载
    let overload = "include \"lib.ql\"\nfunc F(str s) int { return 0 }\nrun int { return F(3) }";
    assert_eq!(int_of(&[("lib.ql", lib), ("main.ql", overload)], "main.ql"), 3);
}

#[test]
fn test_missing_include_file() {
    let err = match run_files(&[("main.ql", "include \"nope.ql\"\nrun {}")], "main.ql") {
        Err(ExecError::Compile(err)) => err,
        other => panic!("expecting compile error, got {other:?}"),
    };
    assert!(matches!(err.kind, ErrorKind::IncludeFile { .. }));
    assert_eq!(err.line, 1);
}

#[test]
fn test_circular_include() {
    let a = "include \"b.ql\"\npub func A() {}";
    let b = "include \"a.ql\"\npub func B() {}";
    let main = "include \"a.ql\"\nrun {}";
    match compile_kind(&[("a.ql", a), ("b.ql", b), ("main.ql", main)], "main.ql") {
        ErrorKind::IncludeFile { reason, .. } => assert!(reason.contains("circular")),
        other => panic!("unexpected {other:?}"),
    }
}

// ===== import =====

#[test]
fn test_import_requires_qualified_access() {
    let math = "pub func Add(int a, int b) int { return a + b }\npub const TEN = 10\npub struct Pair {\n  int L\n  int R\n}";
    let main = "import \"math.ql\"\nrun int {\n  math.Pair p = math.Pair{L: 1, R: 2}\n  return math.Add(p.L, p.R) + math.TEN\n}";
    assert_eq!(int_of(&[("math.ql", math), ("main.ql", main)], "main.ql"), 13);

    let unqualified = "import \"math.ql\"\nrun int { return Add(1, 2) }";
    assert!(matches!(
        compile_kind(&[("math.ql", math), ("main.ql", unqualified)], "main.ql"),
        ErrorKind::Function { .. }
    ));
}

#[test]
fn test_import_alias() {
    let math = "pub func Add(int a, int b) int { return a + b }";
    let main = "import \"math.ql\" as m\nrun int { return m.Add(20, 22) }";
    assert_eq!(int_of(&[("math.ql", math), ("main.ql", main)], "main.ql"), 42);

    let clash = "import \"math.ql\" as m\nimport \"other.ql\" as m\nrun {}";
    let files = [("math.ql", math), ("other.ql", "pub func X() {}"), ("main.ql", clash)];
    assert_eq!(compile_kind(&files, "main.ql"), ErrorKind::UsedName("m".into()));
}

#[test]
fn test_imported_private_name_is_hidden() {
    let math = "func secret() int { return 1 }\nconst HIDDEN = 2";
    let main = "import \"math.ql\"\nrun int { return math.HIDDEN }";
    assert_eq!(
        compile_kind(&[("math.ql", math), ("main.ql", main)], "main.ql"),
        ErrorKind::UnknownIdent("math.HIDDEN".into())
    );
}

// ===== 单元身份 =====

#[test]
fn test_shared_dependency_is_compiled_once() {
    let mut ws = workspace(&[
        ("common.ql", "pub func One() int { return 1 }"),
        ("a.ql", "include \"common.ql\"\npub func A() int { return One() }"),
        ("main.ql", "include \"a.ql\"\ninclude \"common.ql\"\nrun int { return A() + One() }"),
    ]);
    let main = ws.compile_file("main.ql").unwrap();
    // stdlib + common + a + main
    assert_eq!(ws.units().len(), 4);
    let common = ws.unit_by_path("common.ql").unwrap();
    assert_eq!(ws.compile_file("./common.ql").unwrap(), common);
    let program = ws.link(main).unwrap();
    let output = run(&program, &RunSettings::default()).unwrap();
    assert_eq!(output.value, Some(Value::Int(2)));
}

#[test]
fn test_compile_source_is_idempotent() {
    let mut ws = Workspace::with_defaults().unwrap();
    let first = ws.compile_source("main.ql", "run int { return 1 }").unwrap();
    let second = ws.compile_source("main.ql", "run int { return 2 }").unwrap();
    assert_eq!(first, second);
    let program = ws.link(first).unwrap();
    assert!(std::rc::Rc::ptr_eq(&program, &ws.link(first).unwrap()));
    let output = run(&program, &RunSettings::default()).unwrap();
    assert_eq!(output.value, Some(Value::Int(1)));
}

#[test]
fn test_failed_unit_is_not_committed() {
    let mut ws = Workspace::with_defaults().unwrap();
    let err = ws.compile_source("main.ql", "run int { return missing }").unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnknownIdent("missing".into()));
    assert_eq!(ws.unit_by_path("main.ql"), None);
    let unit = ws.compile_source("main.ql", "run int { return 5 }").unwrap();
    let program = ws.link(unit).unwrap();
    let output = run(&program, &RunSettings::default()).unwrap();
    assert_eq!(output.value, Some(Value::Int(5)));
}

// ===== 文件头 =====

#[test]
fn test_header_lookup() {
    let mut ws = Workspace::with_defaults().unwrap();
    let code = "# name = demo\n# version = 1.0\n# plain comment\nrun {}";
    let unit = ws.compile_source("main.ql", code).unwrap();
    assert_eq!(ws.header(unit, "name"), Some("demo"));
    assert_eq!(ws.header(unit, "version"), Some("1.0"));
    assert_eq!(ws.header(unit, "plain"), None);
    assert!(ws.unit(unit).unwrap().header.raw().contains("plain comment"));
}

#[test]
fn test_error_location_points_into_included_unit() {
    let lib = "pub func F() int {\n  return nope\n}";
    let main = "include \"lib.ql\"\nrun {}";
    let err = match run_files(&[("lib.ql", lib), ("main.ql", main)], "main.ql") {
        Err(ExecError::Compile(err)) => err,
        other => panic!("expecting compile error, got {other:?}"),
    };
    assert_eq!(err.path, "lib.ql");
    assert_eq!(err.line, 2);
}
