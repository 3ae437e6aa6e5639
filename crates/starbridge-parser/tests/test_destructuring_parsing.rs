use starbridge_parser::{parse, Arg, BinOp, Clause, ExprKind, StmtKind};

#[test]
fn test_parse_tuple_unpacking() {
    let module = parse("t.star", "a, b = 1, 2\n").unwrap();
    assert_eq!(module.stmts.len(), 1);

    match &module.stmts[0].kind {
        StmtKind::Assign { target, value, op } => {
            assert!(op.is_none());
            match &target.kind {
                ExprKind::Tuple(items) => {
                    assert_eq!(items.len(), 2);
                    assert_eq!(items[0].kind, ExprKind::Ident("a".into()));
                    assert_eq!(items[1].kind, ExprKind::Ident("b".into()));
                }
                _ => panic!("Expected tuple target"),
            }
            assert!(matches!(&value.kind, ExprKind::Tuple(v) if v.len() == 2));
        }
        _ => panic!("Expected assignment"),
    }
}

#[test]
fn test_parse_nested_loop_targets() {
    let module = parse("t.star", "for i, (k, v) in items:\n    pass\n").unwrap();
    match &module.stmts[0].kind {
        StmtKind::For { vars, .. } => match &vars.kind {
            ExprKind::Tuple(items) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(&items[1].kind, ExprKind::Tuple(inner) if inner.len() == 2));
            }
            _ => panic!("Expected tuple loop variables"),
        },
        _ => panic!("Expected for loop"),
    }
}

#[test]
fn test_parse_trailing_comma_makes_tuple() {
    let module = parse("t.star", "x = 1,\n").unwrap();
    match &module.stmts[0].kind {
        StmtKind::Assign { value, .. } => {
            assert!(matches!(&value.kind, ExprKind::Tuple(v) if v.len() == 1));
        }
        _ => panic!("Expected assignment"),
    }
}

#[test]
fn test_parse_augmented_assignment() {
    let module = parse("t.star", "x[0] += 2\n").unwrap();
    match &module.stmts[0].kind {
        StmtKind::Assign { target, op, .. } => {
            assert_eq!(*op, Some(BinOp::Add));
            assert!(matches!(target.kind, ExprKind::Index { .. }));
        }
        _ => panic!("Expected assignment"),
    }
}

#[test]
fn test_augmented_tuple_rejected() {
    let err = parse("t.star", "a, b += 1\n").unwrap_err();
    assert!(err.message.contains("augmented assignment"), "{}", err.message);
}

#[test]
fn test_assign_to_call_rejected() {
    let err = parse("t.star", "f() = 1\n").unwrap_err();
    assert_eq!(err.message, "can't assign to function call");
}

#[test]
fn test_parse_comprehension_clauses() {
    let module = parse("t.star", "y = [x * 2 for x in range(10) if x % 2]\n").unwrap();
    match &module.stmts[0].kind {
        StmtKind::Assign { value, .. } => match &value.kind {
            ExprKind::ListComp { clauses, .. } => {
                assert_eq!(clauses.len(), 2);
                assert!(matches!(clauses[0], Clause::For { .. }));
                assert!(matches!(clauses[1], Clause::If(_)));
            }
            _ => panic!("Expected list comprehension"),
        },
        _ => panic!("Expected assignment"),
    }
}

#[test]
fn test_parse_load_with_alias() {
    let module = parse("t.star", "load(\"math\", \"sqrt\", p = \"pow\")\n").unwrap();
    match &module.stmts[0].kind {
        StmtKind::Load { module, bindings } => {
            assert_eq!(module, "math");
            assert_eq!(bindings.len(), 2);
            assert_eq!(bindings[0].local, "sqrt");
            assert_eq!(bindings[1].local, "p");
            assert_eq!(bindings[1].remote, "pow");
        }
        _ => panic!("Expected load"),
    }
}

#[test]
fn test_load_inside_function_rejected() {
    let err = parse("t.star", "def f():\n    load(\"m\", \"x\")\n").unwrap_err();
    assert_eq!(err.message, "load statement not at top level");
}

#[test]
fn test_break_outside_loop_rejected() {
    let err = parse("t.star", "break\n").unwrap_err();
    assert_eq!(err.message, "break not in a loop");
}

#[test]
fn test_return_at_top_level_rejected() {
    let err = parse("t.star", "return 1\n").unwrap_err();
    assert_eq!(err.message, "return statement not within a function");
}

#[test]
fn test_parse_call_arguments() {
    let module = parse("t.star", "f(1, *xs, key = 2, **kw)\n").unwrap();
    match &module.stmts[0].kind {
        StmtKind::Expr(expr) => match &expr.kind {
            ExprKind::Call { args, .. } => {
                assert_eq!(args.len(), 4);
                assert!(matches!(args[0], Arg::Positional(_)));
                assert!(matches!(args[1], Arg::Star(_)));
                assert!(matches!(&args[2], Arg::Named(n, _) if n == "key"));
                assert!(matches!(args[3], Arg::StarStar(_)));
            }
            _ => panic!("Expected call"),
        },
        _ => panic!("Expected expression statement"),
    }
}

#[test]
fn test_parse_elif_chain() {
    let source = "if a:\n    x = 1\nelif b:\n    x = 2\nelse:\n    x = 3\n";
    let module = parse("t.star", source).unwrap();
    match &module.stmts[0].kind {
        StmtKind::If { otherwise, .. } => {
            assert_eq!(otherwise.len(), 1);
            match &otherwise[0].kind {
                StmtKind::If { otherwise, .. } => assert_eq!(otherwise.len(), 1),
                _ => panic!("Expected nested if for elif"),
            }
        }
        _ => panic!("Expected if"),
    }
}

#[test]
fn test_parse_not_in_and_slices() {
    let module = parse("t.star", "r = x[1:-1] if 3 not in x else x[::2]\n").unwrap();
    match &module.stmts[0].kind {
        StmtKind::Assign { value, .. } => match &value.kind {
            ExprKind::Cond { cond, then, otherwise } => {
                assert!(matches!(cond.kind, ExprKind::Binary { op: BinOp::NotIn, .. }));
                assert!(matches!(then.kind, ExprKind::Slice { .. }));
                assert!(matches!(&otherwise.kind, ExprKind::Slice { step: Some(_), lo: None, .. }));
            }
            _ => panic!("Expected conditional"),
        },
        _ => panic!("Expected assignment"),
    }
}
