#[cfg(test)]
mod parser_tests {
    use slox as lox;

    use lox::ast::{Expr, LiteralValue, PropertyName, Stmt};
    use lox::parser::Parser;
    use lox::scanner::scan_tokens;
    use lox::token::TokenType;

    fn parse(source: &str) -> Result<Vec<Stmt>, Vec<String>> {
        let (tokens, errors) = scan_tokens(source);
        assert!(errors.is_empty(), "unexpected scan errors: {:?}", errors);

        Parser::new(tokens)
            .parse()
            .map_err(|errors| errors.iter().map(ToString::to_string).collect())
    }

    fn parse_ok(source: &str) -> Vec<Stmt> {
        match parse(source) {
            Ok(statements) => statements,
            Err(errors) => panic!("parse failed: {:?}", errors),
        }
    }

    fn parse_err(source: &str) -> Vec<String> {
        match parse(source) {
            Ok(statements) => panic!("expected errors, got {:?}", statements),
            Err(errors) => errors,
        }
    }

    fn method_name(expr: &Expr) -> Option<&str> {
        match expr {
            Expr::Call { callee, .. } => match callee.as_ref() {
                Expr::Get {
                    name: PropertyName::Ident(token),
                    ..
                } => Some(token.lexeme.as_str()),
                _ => None,
            },
            _ => None,
        }
    }

    #[test]
    fn test_factor_binds_tighter_than_term() {
        let statements = parse_ok("1 + 2 * 3;");

        let Stmt::Expression(Expr::Binary {
            left,
            operator,
            right,
        }) = &statements[0]
        else {
            panic!("expected binary expression, got {:?}", statements[0]);
        };

        assert_eq!(operator.token_type, TokenType::PLUS);
        assert!(matches!(left.as_ref(), Expr::Literal(LiteralValue::Number(n)) if *n == 1.0));
        assert!(matches!(
            right.as_ref(),
            Expr::Binary { operator, .. } if operator.token_type == TokenType::STAR
        ));
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let statements = parse_ok("a = b = 1;");

        let Stmt::Expression(Expr::Assign { name, value, .. }) = &statements[0] else {
            panic!("expected assignment");
        };

        assert_eq!(name.lexeme, "a");
        assert!(matches!(value.as_ref(), Expr::Assign { name, .. } if name.lexeme == "b"));
    }

    #[test]
    fn test_property_assignment_becomes_set() {
        let statements = parse_ok("obj.field = 1; obj[\"k\"] = 2;");

        assert!(matches!(
            &statements[0],
            Stmt::Expression(Expr::Set { name: PropertyName::Ident(t), .. }) if t.lexeme == "field"
        ));
        assert!(matches!(
            &statements[1],
            Stmt::Expression(Expr::Set {
                name: PropertyName::Computed { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let errors = parse_err("1 = 2;");

        assert_eq!(
            errors,
            vec!["[line 1 at '='] ParserError: Invalid assignment target."]
        );
    }

    #[test]
    fn test_semicolons_are_optional() {
        let statements = parse_ok("var a = 1\nprint a\na = 2");
        assert_eq!(statements.len(), 3);
    }

    #[test]
    fn test_error_at_end_of_input() {
        let errors = parse_err("print");

        assert_eq!(errors, vec!["[line 1 at end] ParserError: Expect expression."]);
    }

    #[test]
    fn test_recovery_reports_every_error() {
        let errors = parse_err("var = 1;\nprint ;\nvar ok = 3;");

        assert_eq!(
            errors,
            vec![
                "[line 1 at '='] ParserError: Expect variable name.",
                "[line 2 at ';'] ParserError: Expect expression.",
            ]
        );
    }

    #[test]
    fn test_break_outside_loop_is_a_parse_error() {
        let errors = parse_err("break;");
        assert_eq!(
            errors,
            vec!["[line 1 at 'break'] ParserError: Break must be in loop."]
        );
    }

    #[test]
    fn test_break_does_not_cross_function_boundary() {
        let errors = parse_err("while true { fun () { break; }; }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Break must be in loop."));
    }

    #[test]
    fn test_break_inside_loops_is_accepted() {
        parse_ok("while true break;");
        parse_ok("for (;;) { if true break; }");
        parse_ok("for (each [1] as x) break;");
    }

    #[test]
    fn test_c_style_for_desugars_to_while() {
        let statements = parse_ok("for (var i = 0; i < 3; i = i + 1) print i;");

        let Stmt::Block(outer) = &statements[0] else {
            panic!("expected initializer block");
        };

        assert!(matches!(&outer[0], Stmt::Var { name, .. } if name.lexeme == "i"));

        let Stmt::While { body, .. } = &outer[1] else {
            panic!("expected while loop");
        };

        let Stmt::Block(inner) = body.as_ref() else {
            panic!("expected body block with increment");
        };

        assert!(matches!(&inner[0], Stmt::Print(_)));
        assert!(matches!(&inner[1], Stmt::Expression(Expr::Assign { .. })));
    }

    #[test]
    fn test_empty_for_clauses_loop_forever() {
        let statements = parse_ok("for (;;) break;");

        assert!(matches!(
            &statements[0],
            Stmt::While {
                condition: Expr::Literal(LiteralValue::True),
                ..
            }
        ));
    }

    #[test]
    fn test_for_each_desugars_onto_iterator_protocol() {
        let statements = parse_ok("for (each items as item) print item;");

        let Stmt::Block(parts) = &statements[0] else {
            panic!("expected desugared block");
        };

        assert_eq!(parts.len(), 4);
        assert!(matches!(
            &parts[0],
            Stmt::Var { name, initializer: Some(Expr::Literal(LiteralValue::Nil)) } if name.lexeme == "item"
        ));
        assert!(matches!(&parts[1], Stmt::Var { name, .. } if name.lexeme == "_item"));

        let Stmt::Expression(reset) = &parts[2] else {
            panic!("expected iterreset call");
        };
        assert_eq!(method_name(reset), Some("iterreset"));

        let Stmt::While { condition, body } = &parts[3] else {
            panic!("expected loop");
        };
        assert_eq!(method_name(condition), Some("iterhas"));

        let Stmt::Block(step) = body.as_ref() else {
            panic!("expected loop body block");
        };
        let Stmt::Expression(Expr::Assign { name, value, .. }) = &step[0] else {
            panic!("expected loop variable assignment");
        };
        assert_eq!(name.lexeme, "item");
        assert_eq!(method_name(value), Some("iternext"));
        assert!(matches!(&step[1], Stmt::Print(_)));
    }

    #[test]
    fn test_implicit_return_rewrites_function_tail() {
        let statements = parse_ok("fun add(a, b) { var c = a; c + b; }");

        let Stmt::Expression(Expr::Function(decl)) = &statements[0] else {
            panic!("expected function literal");
        };

        let Stmt::Block(body) = &decl.body[0] else {
            panic!("expected block body");
        };
        assert!(matches!(&body[0], Stmt::Var { .. }));
        assert!(matches!(&body[1], Stmt::Return { value: Some(_), .. }));
    }

    #[test]
    fn test_implicit_return_for_expression_bodied_lambda() {
        let statements = parse_ok("var twice = fun (x) x * 2;");

        let Stmt::Var {
            initializer: Some(Expr::Function(decl)),
            ..
        } = &statements[0]
        else {
            panic!("expected lambda initializer");
        };

        assert_eq!(decl.params.len(), 1);
        assert!(matches!(&decl.body[0], Stmt::Return { value: Some(_), .. }));
    }

    #[test]
    fn test_plain_blocks_keep_their_tail() {
        let statements = parse_ok("{ 1; }");

        let Stmt::Block(body) = &statements[0] else {
            panic!("expected block");
        };
        assert!(matches!(&body[0], Stmt::Expression(_)));
    }

    #[test]
    fn test_brace_with_key_starts_object_literal() {
        let statements = parse_ok("{a: 1, \"b c\": 2, 3: nil}");

        let Stmt::Expression(Expr::Object { entries, .. }) = &statements[0] else {
            panic!("expected object literal, got {:?}", statements[0]);
        };

        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b c", "3"]);
    }

    #[test]
    fn test_class_with_superclass_and_methods() {
        let statements = parse_ok("class B < A { init(x) { this.x = x; } get() this.x }");

        let Stmt::Class {
            name,
            superclass,
            methods,
        } = &statements[0]
        else {
            panic!("expected class");
        };

        assert_eq!(name.lexeme, "B");
        assert!(matches!(superclass, Some(Expr::Variable { name, .. }) if name.lexeme == "A"));

        let names: Vec<&str> = methods
            .iter()
            .filter_map(|m| m.name.as_ref().map(|t| t.lexeme.as_str()))
            .collect();
        assert_eq!(names, vec!["init", "get"]);
    }

    #[test]
    fn test_try_catch_name_is_optional() {
        let statements = parse_ok("try throw 1; catch print 2; try {} catch e {}");

        assert!(matches!(&statements[0], Stmt::Try { catch_name: None, .. }));
        assert!(matches!(
            &statements[1],
            Stmt::Try { catch_name: Some(t), .. } if t.lexeme == "e"
        ));
    }

    #[test]
    fn test_return_without_value() {
        let statements = parse_ok("fun f() { return; }");

        let Stmt::Expression(Expr::Function(decl)) = &statements[0] else {
            panic!("expected function literal");
        };
        let Stmt::Block(body) = &decl.body[0] else {
            panic!("expected block body");
        };
        assert!(matches!(&body[0], Stmt::Return { value: None, .. }));
    }

    #[test]
    fn test_import_splices_file_as_invoked_function() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.slox");
        std::fs::write(&path, "var hidden = 1;\nreturn hidden + 1;").unwrap();

        let source = format!("var m = import \"{}\";", path.display());
        let statements = parse_ok(&source);

        let Stmt::Var {
            initializer: Some(Expr::Call {
                callee, arguments, ..
            }),
            ..
        } = &statements[0]
        else {
            panic!("expected import call");
        };

        assert!(arguments.is_empty());
        let Expr::Function(decl) = callee.as_ref() else {
            panic!("expected spliced function");
        };
        assert!(decl.params.is_empty());
        assert_eq!(decl.body.len(), 2);
    }

    #[test]
    fn test_import_of_missing_file() {
        let errors = parse_err("import \"/definitely/not/here.slox\";");

        assert_eq!(
            errors,
            vec!["[line 1 at 'import'] ParserError: No such file or directory."]
        );
    }

    #[test]
    fn test_import_errors_merge_into_outer_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.slox");
        std::fs::write(&path, "var = 3;").unwrap();

        let errors = parse_err(&format!("import \"{}\";", path.display()));
        assert_eq!(
            errors,
            vec!["[line 1 at '='] ParserError: Expect variable name."]
        );
    }

    #[test]
    fn test_deep_grouping_is_a_parse_error() {
        let source = format!("{}1{};", "(".repeat(100_000), ")".repeat(100_000));

        assert_eq!(
            parse_err(&source),
            vec!["[line 1 at '('] ParserError: Too much nesting."]
        );
    }

    #[test]
    fn test_long_operator_chain_is_a_parse_error() {
        let source = format!("1{};", " + 1".repeat(100_000));

        assert_eq!(
            parse_err(&source),
            vec!["[line 1 at '1'] ParserError: Too much nesting."]
        );
    }

    #[test]
    fn test_deep_prefix_operators_are_a_parse_error() {
        let source = format!("{}true;", "!".repeat(100_000));

        assert_eq!(
            parse_err(&source),
            vec!["[line 1 at '!'] ParserError: Too much nesting."]
        );
    }

    #[test]
    fn test_nesting_limit_resets_between_statements() {
        let nested = format!("{}1{};", "(".repeat(300), ")".repeat(300));
        let source = format!("{}\n{}\n{}", nested, nested, nested);

        assert_eq!(parse_ok(&source).len(), 3);
    }

    #[test]
    fn test_self_import_stops_at_nesting_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loop.slox");
        std::fs::write(&path, format!("import \"{}\";", path.display())).unwrap();

        let errors = parse_err(&format!("import \"{}\";", path.display()));

        assert_eq!(errors.len(), 1);
        assert!(errors[0].ends_with("ParserError: Too much nesting."), "{}", errors[0]);
    }
}
