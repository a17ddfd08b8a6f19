//! 编译错误测试
//!
//! 每个用例都必须在编译或链接阶段失败，并给出对应的错误类别

mod common;
use common::{compile_err, compile_error, get_int};
use quill_core::ErrorKind;

fn named(kind: fn(String) -> ErrorKind, name: &str) -> ErrorKind {
    kind(name.to_string())
}

// ===== 词法 =====

#[test]
fn test_lexical_errors() {
    assert_eq!(compile_err("run {\n  int a = 1 @ 2\n}"), ErrorKind::Letter);
    assert!(matches!(
        compile_err("run int { return 99999999999999999999 }"),
        ErrorKind::OutOfRange(_)
    ));
    assert_eq!(compile_err("run { char c = 'ab' }"), ErrorKind::Char);
    assert_eq!(compile_err("run { str s = \"\\q\" }"), ErrorKind::DoubleQuotes);
    assert_eq!(compile_err("run { str s = \"${1X}\" }"), ErrorKind::EnvName);
}

#[test]
fn test_error_position_format() {
    let err = compile_error("run {\n  int x = y\n}");
    assert_eq!(err.kind, named(ErrorKind::UnknownIdent, "y"));
    assert_eq!(err.to_string(), "main.ql:2:11: unknown identifier y");
}

// ===== 声明 =====

#[test]
fn test_duplicate_function() {
    assert!(matches!(
        compile_err("func f() {}\nfunc f() {}\nrun {}"),
        ErrorKind::FuncExists { .. }
    ));
    let overloads = "func f() int { return 1 }\nfunc f(int a) int { return a }\nrun int { return f() + f(2) }";
    assert_eq!(get_int(overloads), 3);
}

#[test]
fn test_unknown_overload() {
    assert_eq!(
        compile_err("func f(int a) {}\nrun {\n  f(\"x\")\n}"),
        ErrorKind::Function {
            name: "f".into(),
            params: "str".into()
        }
    );
}

#[test]
fn test_run_declarations() {
    assert_eq!(compile_err("run {}\nrun {}"), ErrorKind::Run);
    assert_eq!(compile_err("func f() {}"), ErrorKind::NoRun);
}

#[test]
fn test_used_names() {
    assert_eq!(
        compile_err("run {\n  int a\n  str a\n}"),
        named(ErrorKind::UsedName, "a")
    );
    assert_eq!(
        compile_err("struct P { int X }\nstruct P { int Y }\nrun {}"),
        named(ErrorKind::TypeExists, "P")
    );
    assert_eq!(
        compile_err("run {\n  Unknown u\n}"),
        named(ErrorKind::UnknownType, "Unknown")
    );
}

// ===== 可选参数 =====

#[test]
fn test_optional_parameter_rules() {
    assert_eq!(
        compile_err("func f(int a = 1, int b) {}\nrun {}"),
        ErrorKind::EndOptional
    );
    assert_eq!(
        compile_err("func f(int a = 1) {\n  optional {\n    int a = 2\n  }\n}\nrun {}"),
        named(ErrorKind::TwiceOptional, "a")
    );
    assert_eq!(
        compile_err("run {\n  optional {\n    int a = 2\n  }\n}"),
        ErrorKind::Optional
    );
    assert_eq!(
        compile_err("func f() {\n  if true {\n    optional {\n      int a = 2\n    }\n  }\n}\nrun {}"),
        ErrorKind::Optional
    );
    assert!(matches!(
        compile_err("func f(int a, int b = 1) {}\nrun {\n  f(1, c: 2)\n}"),
        ErrorKind::FuncOptional { .. }
    ));
    assert!(matches!(
        compile_err("func f(int a, int b = 1) {}\nrun {\n  f(1, b: \"x\")\n}"),
        ErrorKind::TypeOptional { .. }
    ));
}

// ===== fn 类型 =====

#[test]
fn test_fn_type_rules() {
    let prelude = "fn IntOp(int) int\n";
    assert_eq!(
        compile_err(&format!("{prelude}func v(int a...) int {{ return 1 }}\nrun {{\n  IntOp f = &v.IntOp\n}}")),
        ErrorKind::FnCall {
            name: "v".into(),
            fn_type: "IntOp".into()
        }
    );
    assert_eq!(
        compile_err(&format!("{prelude}func v(int a...) int {{ return 1 }}\nfn Vs(arr.int) int\nrun {{\n  Vs f = &v.Vs\n}}")),
        named(ErrorKind::FnVariadic, "v")
    );
    assert_eq!(
        compile_err(&format!("{prelude}run {{\n  IntOp f = &Hex.IntOp\n}}")),
        named(ErrorKind::FnBuildIn, "Hex")
    );
    assert_eq!(
        compile_err(&format!("{prelude}func o(int a, int b = 2) int {{ return a }}\nrun {{\n  IntOp f = &o.IntOp\n}}")),
        ErrorKind::FnCall {
            name: "o".into(),
            fn_type: "IntOp".into()
        }
    );
    assert_eq!(
        compile_err("fn Two(int, int) int\nfunc o(int a) int {\n  optional {\n    int b = 2\n  }\n  return a + b\n}\nrun {\n  Two f = &o.Two\n}"),
        named(ErrorKind::FnOptional, "o")
    );
    assert!(matches!(
        compile_err(&format!("{prelude}func s(int a) str {{ return \"\" }}\nrun {{\n  IntOp f = &s.IntOp\n}}")),
        ErrorKind::FnReturn { .. }
    ));
    assert_eq!(compile_err("run {\n  x = &f\n}"), ErrorKind::AddrFunc);
}

#[test]
fn test_local_function_rules() {
    assert_eq!(
        compile_err("run {\n  func inner(int a...) {}\n}"),
        named(ErrorKind::LocalVariadic, "inner")
    );
    assert_eq!(
        compile_err("run {\n  func inner() {}\n  func inner() {}\n}"),
        named(ErrorKind::LocalName, "inner")
    );
}

// ===== 结构体 =====

#[test]
fn test_struct_rules() {
    let prelude = "struct P {\n  int X\n  int Y\n}\n";
    assert_eq!(
        compile_err(&format!("{prelude}run {{\n  int a\n  int b = a.X\n}}")),
        named(ErrorKind::StructType, "int")
    );
    assert!(matches!(
        compile_err(&format!("{prelude}run {{\n  P p\n  int z = p.Z\n}}")),
        ErrorKind::Struct { .. }
    ));
    assert!(matches!(
        compile_err(&format!("{prelude}run {{\n  P p\n  p.Z = 1\n}}")),
        ErrorKind::WrongField { .. }
    ));
    assert_eq!(
        compile_err(&format!("{prelude}run {{\n  P p = P{{Z: 1}}\n}}")),
        named(ErrorKind::InitField, "Z")
    );
    assert_eq!(
        compile_err("struct Q {\n  int X\n  str X\n}\nrun {}"),
        named(ErrorKind::StructField, "X")
    );
    assert!(matches!(
        compile_err(&format!("{prelude}struct R {{\n  int X\n}}\nrun {{\n  P p\n  R r\n  p = r\n}}")),
        ErrorKind::StructAssign { .. }
    ));
    assert_eq!(
        compile_err("struct Node {\n  int V\n  Node Next\n}\nrun {}"),
        named(ErrorKind::RecursiveStruct, "Node")
    );
}

// ===== 常量 =====

#[test]
fn test_constant_rules() {
    assert_eq!(
        compile_err("const lower = 1\nrun {}"),
        named(ErrorKind::ConstName, "lower")
    );
    assert_eq!(
        compile_err("const {\n  EMPTY\n}\nrun {}"),
        named(ErrorKind::MustAssign, "EMPTY")
    );
    assert_eq!(
        compile_err("const A = 1\nconst A = 2\nrun {}"),
        named(ErrorKind::ConstDef, "A")
    );
    assert_eq!(compile_err("run int {\n  return IOTA\n}"), ErrorKind::Iota);
}

// ===== 索引 =====

#[test]
fn test_index_rules() {
    assert_eq!(
        compile_err("run {\n  int a\n  int b = a[0]\n}"),
        named(ErrorKind::SupportIndex, "int")
    );
    assert!(matches!(
        compile_err("run {\n  arr.int a\n  int b = a[\"k\"]\n}"),
        ErrorKind::TypeIndex { .. }
    ));
    assert_eq!(compile_err("run {\n  arr.int a\n  int b = a[]\n}"), ErrorKind::NoIndex);
    assert_eq!(
        compile_err("func list() arr.int {\n  arr.int a\n  return a\n}\nrun {\n  list()[0] = 1\n}"),
        ErrorKind::VarIndex
    );
}

// ===== 控制语句 =====

#[test]
fn test_control_rules() {
    assert_eq!(compile_err("run {\n  break\n}"), ErrorKind::Break);
    assert_eq!(compile_err("run {\n  continue\n}"), ErrorKind::Continue);
    assert_eq!(compile_err("run {\n  for v [1] {}\n}"), ErrorKind::ForIn);
    assert_eq!(
        compile_err("run {\n  arr.int a\n  switch a\n  case 1 {}\n}"),
        named(ErrorKind::SwitchType, "arr.int")
    );
    assert_eq!(compile_err("run {\n  switch 1\n  x = 2\n}"), ErrorKind::NotCase);
    assert_eq!(compile_err("run {\n  try {}\n  int x\n}"), ErrorKind::Catch);
    assert_eq!(compile_err("run {\n  recover\n}"), ErrorKind::Recover);
    assert_eq!(compile_err("run {\n  retry\n}"), ErrorKind::Retry);
    assert_eq!(compile_err("run {\n  go (1) {}\n}"), ErrorKind::GoParam);
    assert_eq!(compile_err("run {\n  if 1 {}\n}"), ErrorKind::BoolExp);
    assert_eq!(compile_err("run {\n  bool b = 1 && true\n}"), ErrorKind::BoolOper);
}

#[test]
fn test_break_inside_function_nested_in_loop() {
    // 局部函数体不继承外层循环
    assert_eq!(
        compile_err("run {\n  while true {\n    func inner() {\n      break\n    }\n  }\n}"),
        ErrorKind::Break
    );
}

#[test]
fn test_return_rules() {
    assert_eq!(
        compile_err("func f() int {\n  int a\n}\nrun {}"),
        named(ErrorKind::MustReturn, "f")
    );
    assert_eq!(
        compile_err("func f() {\n  return 1\n}\nrun {}"),
        named(ErrorKind::NoReturnValue, "f")
    );
    assert!(matches!(
        compile_err("run int {\n  return \"s\"\n}"),
        ErrorKind::WrongType { .. }
    ));
}

#[test]
fn test_alias_requires_same_container() {
    assert_eq!(
        compile_err("run {\n  int a\n  int b\n  a &= b\n}"),
        ErrorKind::Alias
    );
    assert_eq!(
        compile_err("run {\n  arr.int a\n  arr.str b\n  a &= b\n}"),
        ErrorKind::Alias
    );
}

#[test]
fn test_import_path_must_be_plain() {
    assert_eq!(compile_err("include \"%{x}\"\nrun {}"), ErrorKind::ImportStr);
}
