//! Statement and `match` lowering

mod harness;

use gale_compiler::ast::{BinaryOp, DictionaryPatternEntry, Expr, ExprKind, ForStmt, MatchBranch, Pattern, Stmt, StmtKind, Suite};
use gale_compiler::ir::{CallKind, Instr};
use gale_compiler::{AddressMode, CompilerOptions, Constant, DataType, VariantType};
use harness::*;

fn array() -> DataType {
    ty(VariantType::Array)
}

fn empty_array() -> Expr {
    Expr::new(ExprKind::Array(Vec::new()), array())
}

fn array_of(items: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::Array(items), array())
}

fn matching(subject: Expr, branches: Vec<MatchBranch>) -> Stmt {
    Stmt::new(StmtKind::Match { subject, branches })
}

fn when(cond: Expr, then: Vec<Stmt>) -> Stmt {
    Stmt::new(StmtKind::If {
        cond,
        then: Suite::new(then),
        otherwise: None,
    })
}

fn for_in(variable: &str, variable_ty: DataType, iterable: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::new(StmtKind::For(ForStmt {
        variable: variable.to_string(),
        variable_ty,
        iterable,
        body: Suite::new(body),
        use_conversion: false,
    }))
}

fn append(list: &str, value: Expr) -> Stmt {
    Stmt::expr(Expr::method_call(local(list, array()), "append", vec![value], DataType::nil()))
}

fn compare(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::binary(op, lhs, rhs, DataType::bool())
}

fn add_to(name: &str, value: Expr) -> Stmt {
    Stmt::expr(Expr::assign_op(Some(BinaryOp::Add), local(name, int()), value))
}

fn run(class: gale_compiler::ClassNode, name: &str, args: Vec<Value>) -> Value {
    let mut vm = Vm::new(compile(&class));
    let object = vm.instantiate(PATH);
    vm.call(&object, name, args)
}

// ============================================================================
// Match
// ============================================================================

fn classify() -> gale_compiler::ClassNode {
    let subject = arg("x", DataType::Variant);
    let body = vec![
        Stmt::var("hits", int(), Some(Expr::int(0))),
        matching(
            subject,
            vec![
                MatchBranch::new(
                    vec![Pattern::Literal(Constant::Int(1)), Pattern::Literal(Constant::Int(2))],
                    None,
                    vec![add_to("hits", Expr::int(1))],
                ),
                MatchBranch::new(vec![Pattern::Wildcard], None, vec![add_to("hits", Expr::int(10))]),
            ],
        ),
        ret(local("hits", int())),
    ];
    class().with(method("classify", vec![param("x", DataType::Variant)], body))
}

#[test]
fn test_match_runs_exactly_one_branch() {
    assert_eq!(run(classify(), "classify", vec![Value::Int(1)]), Value::Int(1));
    assert_eq!(run(classify(), "classify", vec![Value::Int(2)]), Value::Int(1));
    assert_eq!(run(classify(), "classify", vec![Value::Int(5)]), Value::Int(10));
    // same value, different kind
    assert_eq!(run(classify(), "classify", vec![Value::str("1")]), Value::Int(10));
}

#[test]
fn test_string_kinds_match_each_other() {
    let body = vec![matching(
        arg("x", DataType::Variant),
        vec![
            MatchBranch::new(
                vec![Pattern::Literal(Constant::StringName("hero".to_string()))],
                None,
                vec![ret(Expr::int(1))],
            ),
            MatchBranch::new(vec![Pattern::Wildcard], None, vec![ret(Expr::int(0))]),
        ],
    )];
    let class = class().with(method("check", vec![param("x", DataType::Variant)], body));
    assert_eq!(run(class.clone(), "check", vec![Value::str("hero")]), Value::Int(1));
    assert_eq!(run(class, "check", vec![Value::str("villain")]), Value::Int(0));
}

#[test]
fn test_match_declares_hidden_locals() {
    let script = compile(&classify());
    let function = listing(&script, PATH, "classify");
    let names: Vec<&str> = function.locals.iter().map(|(name, _)| name.as_str()).collect();
    assert!(names.contains(&"@match_value"));
    assert!(names.contains(&"@match_type"));
    assert_eq!(count(function, |i| matches!(i, Instr::TypeOf { .. })), 1);
    assert!(function.validate().is_ok());
}

#[test]
fn test_array_pattern_with_rest_and_bind() {
    let pattern = Pattern::Array(vec![
        Pattern::Literal(Constant::Int(1)),
        Pattern::Bind("second".to_string()),
        Pattern::Rest,
    ]);
    let body = vec![
        matching(
            arg("x", DataType::Variant),
            vec![MatchBranch::new(
                vec![pattern],
                None,
                vec![ret(local("second", DataType::Variant))],
            )],
        ),
        ret(Expr::int(-1)),
    ];
    let class = || class().with(method("pick", vec![param("x", DataType::Variant)], body.clone()));

    let list = |items: &[i64]| Value::array(items.iter().map(|i| Value::Int(*i)).collect());
    assert_eq!(run(class(), "pick", vec![list(&[1, 7, 9])]), Value::Int(7));
    assert_eq!(run(class(), "pick", vec![list(&[1, 7])]), Value::Int(7));
    assert_eq!(run(class(), "pick", vec![list(&[2, 7])]), Value::Int(-1));
    assert_eq!(run(class(), "pick", vec![list(&[1])]), Value::Int(-1));
    assert_eq!(run(class(), "pick", vec![Value::Int(1)]), Value::Int(-1));
}

#[test]
fn test_array_pattern_without_rest_needs_exact_length() {
    let pattern = Pattern::Array(vec![Pattern::Wildcard, Pattern::Wildcard]);
    let body = vec![
        matching(
            arg("x", DataType::Variant),
            vec![MatchBranch::new(vec![pattern], None, vec![ret(Expr::string("pair"))])],
        ),
        ret(Expr::string("other")),
    ];
    let class = || class().with(method("pick", vec![param("x", DataType::Variant)], body.clone()));

    let pair = Value::array(vec![Value::Int(0), Value::Int(0)]);
    let triple = Value::array(vec![Value::Int(0), Value::Int(0), Value::Int(0)]);
    assert_eq!(run(class(), "pick", vec![pair]), Value::str("pair"));
    assert_eq!(run(class(), "pick", vec![triple]), Value::str("other"));
}

#[test]
fn test_dictionary_pattern() {
    let pattern = Pattern::Dictionary(vec![
        DictionaryPatternEntry::Pair {
            key: Expr::string("hp"),
            value: Some(Pattern::Bind("h".to_string())),
        },
        DictionaryPatternEntry::Rest,
    ]);
    let body = vec![
        matching(
            arg("x", DataType::Variant),
            vec![MatchBranch::new(vec![pattern], None, vec![ret(local("h", DataType::Variant))])],
        ),
        ret(Expr::int(0)),
    ];
    let class = || class().with(method("hp", vec![param("x", DataType::Variant)], body.clone()));

    let stats = Value::dict(vec![(Value::str("hp"), Value::Int(5)), (Value::str("mp"), Value::Int(1))]);
    assert_eq!(run(class(), "hp", vec![stats]), Value::Int(5));
    let other = Value::dict(vec![(Value::str("mp"), Value::Int(1))]);
    assert_eq!(run(class(), "hp", vec![other]), Value::Int(0));

    let script = compile(&class());
    assert_eq!(call_kinds(listing(&script, PATH, "hp"), "has"), vec![CallKind::Dynamic]);
}

#[test]
fn test_guard_filters_branch() {
    let guard = compare(BinaryOp::Greater, local("n", DataType::Variant), Expr::int(10));
    let body = vec![matching(
        arg("x", DataType::Variant),
        vec![
            MatchBranch::new(vec![Pattern::Bind("n".to_string())], Some(guard), vec![ret(Expr::string("big"))]),
            MatchBranch::new(vec![Pattern::Wildcard], None, vec![ret(Expr::string("small"))]),
        ],
    )];
    let class = || class().with(method("size", vec![param("x", DataType::Variant)], body.clone()));

    assert_eq!(run(class(), "size", vec![Value::Int(40)]), Value::str("big"));
    assert_eq!(run(class(), "size", vec![Value::Int(4)]), Value::str("small"));
}

#[test]
fn test_expression_pattern_compares_runtime_value() {
    let body = vec![
        matching(
            arg("x", DataType::Variant),
            vec![MatchBranch::new(
                vec![Pattern::Expression(member("limit", int()))],
                None,
                vec![ret(Expr::string("hit"))],
            )],
        ),
        ret(Expr::string("miss")),
    ];
    let class = || {
        class()
            .with(field("limit", int(), Some(Expr::int(3))))
            .with(method("check", vec![param("x", DataType::Variant)], body.clone()))
    };

    assert_eq!(run(class(), "check", vec![Value::Int(3)]), Value::str("hit"));
    assert_eq!(run(class(), "check", vec![Value::Int(4)]), Value::str("miss"));
}

#[test]
fn test_misplaced_rest_is_internal_error() {
    let body = vec![matching(
        arg("x", DataType::Variant),
        vec![MatchBranch::new(vec![Pattern::Rest], None, vec![])],
    )];
    let class = class().with(method("bad", vec![param("x", DataType::Variant)], body));
    assert_eq!(compile_err(&class).kind(), gale_compiler::ErrorKind::Internal);
}

#[test]
fn test_rest_inside_container_pattern_must_come_last() {
    let array = Pattern::Array(vec![Pattern::Rest, Pattern::Literal(Constant::Int(1))]);
    let dictionary = Pattern::Dictionary(vec![
        DictionaryPatternEntry::Rest,
        DictionaryPatternEntry::Pair {
            key: Expr::string("hp"),
            value: None,
        },
    ]);
    for pattern in [array, dictionary] {
        let body = vec![matching(
            arg("x", DataType::Variant),
            vec![MatchBranch::new(vec![pattern], None, vec![])],
        )];
        let class = class().with(method("bad", vec![param("x", DataType::Variant)], body));
        let error = compile_err(&class);
        assert_eq!(error.kind(), gale_compiler::ErrorKind::Internal);
        assert!(error.to_string().contains("before the end"), "{error}");
    }
}

// ============================================================================
// Loops
// ============================================================================

fn stepping() -> gale_compiler::ClassNode {
    let range = Expr::call("range", vec![Expr::int(0), Expr::int(6), Expr::int(2)], array());
    let body = vec![
        Stmt::var("out", array(), Some(empty_array())),
        for_in("i", int(), range, vec![append("out", local("i", int()))]),
        ret(local("out", array())),
    ];
    class().with(method("steps", vec![], body))
}

fn expect_steps(value: Value) {
    assert_eq!(value.items(), vec![Value::Int(0), Value::Int(2), Value::Int(4)]);
}

#[test]
fn test_range_loop_counts_without_a_list() {
    let script = compile(&stepping());
    let steps = listing(&script, PATH, "steps");
    assert_eq!(count(steps, |i| matches!(i, Instr::ForRange { .. })), 1);
    assert!(steps
        .instructions
        .iter()
        .any(|i| matches!(i, Instr::StartFor { range: true, .. })));
    assert!(calls_named(steps, "range").is_empty());

    let mut vm = Vm::new(script);
    let object = vm.instantiate(PATH);
    expect_steps(vm.call(&object, "steps", vec![]));
}

#[test]
fn test_range_loop_optimization_can_be_disabled() {
    let options = CompilerOptions {
        range_loop_optimization: false,
        ..CompilerOptions::default()
    };
    let script = compile_with(&stepping(), options);
    let steps = listing(&script, PATH, "steps");
    assert_eq!(count(steps, |i| matches!(i, Instr::ForRange { .. })), 0);
    assert_eq!(call_kinds(steps, "range"), vec![CallKind::ScriptUtility]);

    let mut vm = Vm::new(script);
    let object = vm.instantiate(PATH);
    expect_steps(vm.call(&object, "steps", vec![]));
}

#[test]
fn test_single_argument_range_starts_at_zero() {
    let range = Expr::call("range", vec![arg("n", int())], array());
    let body = vec![
        Stmt::var("total", int(), Some(Expr::int(0))),
        for_in("i", int(), range, vec![add_to("total", local("i", int()))]),
        ret(local("total", int())),
    ];
    let class = class().with(method("sum", vec![param("n", int())], body));
    let script = compile(&class);
    let sum = listing(&script, PATH, "sum");
    assert!(sum.instructions.iter().any(|i| matches!(
        i,
        Instr::ForRange { from, step, .. }
            if from.mode == AddressMode::Constant(Constant::Int(0))
                && step.mode == AddressMode::Constant(Constant::Int(1))
    )));

    let mut vm = Vm::new(script);
    let object = vm.instantiate(PATH);
    assert_eq!(vm.call(&object, "sum", vec![Value::Int(5)]), Value::Int(10));
}

#[test]
fn test_for_over_list_with_break() {
    let items = array_of(vec![Expr::int(3), Expr::int(4), Expr::int(5), Expr::int(6)]);
    let body = vec![
        Stmt::var("out", array(), Some(empty_array())),
        for_in(
            "x",
            DataType::Variant,
            items,
            vec![
                when(compare(BinaryOp::Equal, local("x", DataType::Variant), Expr::int(5)), vec![Stmt::new(StmtKind::Break)]),
                append("out", local("x", DataType::Variant)),
            ],
        ),
        ret(local("out", array())),
    ];
    let class = class().with(method("take", vec![], body));
    let script = compile(&class);
    let take = listing(&script, PATH, "take");

    // the untyped loop variable is cleared once the loop ends
    let end = take
        .instructions
        .iter()
        .position(|i| matches!(i, Instr::EndFor { .. }))
        .unwrap();
    assert!(take.instructions[end..]
        .iter()
        .any(|i| matches!(i, Instr::Clear(address) if matches!(address.mode, AddressMode::Local(_)))));

    let mut vm = Vm::new(script);
    let object = vm.instantiate(PATH);
    assert_eq!(vm.call(&object, "take", vec![]).items(), vec![Value::Int(3), Value::Int(4)]);
}

#[test]
fn test_while_with_break_and_continue() {
    let i = || local("i", int());
    let body = vec![
        Stmt::var("i", int(), Some(Expr::int(0))),
        Stmt::var("sum", int(), Some(Expr::int(0))),
        Stmt::new(StmtKind::While {
            cond: Expr::literal(Constant::Bool(true)),
            body: Suite::new(vec![
                add_to("i", Expr::int(1)),
                when(compare(BinaryOp::Greater, i(), Expr::int(10)), vec![Stmt::new(StmtKind::Break)]),
                when(
                    compare(
                        BinaryOp::Equal,
                        Expr::binary(BinaryOp::Mod, i(), Expr::int(2), int()),
                        Expr::int(0),
                    ),
                    vec![Stmt::new(StmtKind::Continue)],
                ),
                add_to("sum", i()),
            ]),
        }),
        ret(local("sum", int())),
    ];
    let class = class().with(method("odds", vec![], body));
    let script = compile(&class);
    assert!(listing(&script, PATH, "odds").validate().is_ok());

    let mut vm = Vm::new(script);
    let object = vm.instantiate(PATH);
    assert_eq!(vm.call(&object, "odds", vec![]), Value::Int(25));
}

#[test]
fn test_uninitialized_var_resets_each_iteration() {
    let range = Expr::call("range", vec![Expr::int(3)], array());
    let body = vec![
        Stmt::var("out", array(), Some(empty_array())),
        for_in(
            "i",
            int(),
            range,
            vec![
                Stmt::var("c", int(), None),
                add_to("c", Expr::int(1)),
                append("out", local("c", int())),
            ],
        ),
        ret(local("out", array())),
    ];
    let class = class().with(method("fresh", vec![], body));
    assert_eq!(
        run(class, "fresh", vec![]).items(),
        vec![Value::Int(1), Value::Int(1), Value::Int(1)]
    );
}

// ============================================================================
// Options
// ============================================================================

fn instrumented() -> gale_compiler::ClassNode {
    let check = Stmt::new(StmtKind::Assert {
        cond: compare(BinaryOp::Greater, arg("n", int()), Expr::int(0)),
        message: Some(Expr::string("n must be positive")),
    });
    class().with(method(
        "checked",
        vec![param("n", int())],
        vec![check.at(2), Stmt::new(StmtKind::Breakpoint).at(3), ret(arg("n", int())).at(4)],
    ))
}

#[test]
fn test_debug_build_keeps_asserts_breakpoints_and_lines() {
    let script = compile(&instrumented());
    let checked = listing(&script, PATH, "checked");
    assert_eq!(count(checked, |i| matches!(i, Instr::Assert { .. })), 1);
    assert_eq!(count(checked, |i| matches!(i, Instr::Breakpoint)), 1);
    let lines: Vec<u32> = checked
        .instructions
        .iter()
        .filter_map(|i| match i {
            Instr::Line(line) => Some(*line),
            _ => None,
        })
        .collect();
    assert_eq!(lines, vec![2, 3, 4]);
}

#[test]
fn test_release_build_drops_asserts_and_breakpoints() {
    let options = CompilerOptions {
        debug_line_info: false,
        ..CompilerOptions::release()
    };
    let script = compile_with(&instrumented(), options);
    let checked = listing(&script, PATH, "checked");
    assert_eq!(count(checked, |i| matches!(i, Instr::Assert { .. } | Instr::Breakpoint | Instr::Line(_))), 0);
}
