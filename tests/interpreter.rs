mod common;

#[cfg(test)]
mod interpreter_tests {
    use std::io::Cursor;

    use slox as lox;

    use lox::repl::run_prompt;

    use super::common::{output_of, run, session};

    fn runtime_error(source: &str) -> String {
        let outcome = run(source);

        assert!(outcome.had_runtime_error, "expected a runtime error");
        assert!(!outcome.had_error);
        outcome.err.trim_end().to_string()
    }

    // ── operators ───────────────────────────────────────────────────────

    #[test]
    fn test_plus_adds_or_concatenates() {
        let lines = output_of(
            "print 1 + \"x\";
             print \"x\" + 1;
             print 1 + 2;
             print \"1\" == 1;
             print \"a\" + nil;",
        );

        assert_eq!(lines, vec!["1x", "x1", "3", "false", "anil"]);
    }

    #[test]
    fn test_arithmetic() {
        let lines = output_of(
            "print 2 ** 10;
             print 7 / 2;
             print 10 - 4 * 2;
             print (10 - 4) * 2;
             print -3 + 1;
             print 1 / 0;
             print 0.1 + 0.2;",
        );

        assert_eq!(
            lines,
            vec!["1024", "3.5", "2", "12", "-2", "Infinity", "0.30000000000000004"]
        );
    }

    #[test]
    fn test_comparison_and_equality() {
        let lines = output_of(
            "print 1 < 2;
             print 2 <= 2;
             print 3 > 4;
             print 3 >= 4;
             print nil == nil;
             print nil == false;
             print \"a\" != \"a\";",
        );

        assert_eq!(lines, vec!["true", "true", "false", "false", "true", "false", "false"]);
    }

    #[test]
    fn test_operand_type_errors() {
        assert_eq!(
            runtime_error("print 1 - \"a\";"),
            "[line 1] RuntimeError: Operands must be numbers."
        );
        assert_eq!(
            runtime_error("\nprint \"2\" < 3;"),
            "[line 2] RuntimeError: Operands must be numbers."
        );
        assert_eq!(
            runtime_error("print true + nil;"),
            "[line 1] RuntimeError: Operands must be numbers or strings."
        );
        assert_eq!(
            runtime_error("print -\"a\";"),
            "[line 1] RuntimeError: Operand must be a number."
        );
    }

    #[test]
    fn test_truthiness() {
        let lines = output_of(
            "if 0 print \"t\"; else print \"f\";
             if [] print \"t\"; else print \"f\";
             if [0] print \"t\"; else print \"f\";
             if \"\" print \"t\"; else print \"f\";
             if nil print \"t\"; else print \"f\";
             print !0;",
        );

        assert_eq!(lines, vec!["f", "f", "t", "t", "f", "true"]);
    }

    #[test]
    fn test_logical_operators_yield_operands() {
        let lines = output_of(
            "print nil or \"default\";
             print 1 and 2;
             print false and missing();",
        );

        assert_eq!(lines, vec!["default", "2", "false"]);
    }

    // ── variables and scope ─────────────────────────────────────────────

    #[test]
    fn test_undefined_variable() {
        assert_eq!(
            runtime_error("print missing;"),
            "[line 1] RuntimeError: Undefined variable 'missing'."
        );
        assert_eq!(
            runtime_error("missing = 1;"),
            "[line 1] RuntimeError: Undefined variable 'missing'."
        );
    }

    #[test]
    fn test_shadowing_never_mutates_outer() {
        let lines = output_of(
            "var x = 1;
             {
               var x = 2;
               {
                 var x = 3;
                 print x;
               }
               x = 20;
               print x;
             }
             print x;",
        );

        assert_eq!(lines, vec!["3", "20", "1"]);
    }

    #[test]
    fn test_assignment_reaches_enclosing_binding() {
        let lines = output_of(
            "var total = 0;
             for (var i = 1; i <= 4; i = i + 1) total = total + i;
             print total;",
        );

        assert_eq!(lines, vec!["10"]);
    }

    // ── functions and closures ──────────────────────────────────────────

    #[test]
    fn test_recursion() {
        let lines = output_of(
            "fun fib(n) { if n < 2 return n; return fib(n - 1) + fib(n - 2); }
             print fib(15);",
        );

        assert_eq!(lines, vec!["610"]);
    }

    #[test]
    fn test_counter_closure_keeps_state() {
        let lines = output_of(
            "fun make() {
               var count = 0;
               fun inc() { count = count + 1; return count; }
               return inc;
             }
             var a = make();
             var b = make();
             a(); a();
             print a();
             print b();",
        );

        assert_eq!(lines, vec!["3", "1"]);
    }

    #[test]
    fn test_closures_capture_per_iteration_block_variable() {
        let lines = output_of(
            "var fns = [];
             for (var i = 0; i < 3; i = i + 1) {
               var j = i;
               fns.append(fun () j);
             }
             print fns.get(0)();
             print fns.get(1)();
             print fns.get(2)();",
        );

        assert_eq!(lines, vec!["0", "1", "2"]);
    }

    #[test]
    fn test_c_style_loop_variable_is_shared() {
        let lines = output_of(
            "var fns = [];
             for (var i = 0; i < 3; i = i + 1) fns.append(fun () i);
             print fns.get(0)();
             print fns.get(2)();",
        );

        assert_eq!(lines, vec!["3", "3"]);
    }

    #[test]
    fn test_implicit_return() {
        let lines = output_of(
            "var square = fun (x) x * x;
             fun describe(n) { var s = \"n=\"; s + n; }
             print square(4);
             print describe(2);",
        );

        assert_eq!(lines, vec!["16", "n=2"]);
    }

    #[test]
    fn test_function_without_return_yields_nil() {
        assert_eq!(output_of("fun f() { print \"side\"; } print f();"), vec!["side", "nil"]);
    }

    #[test]
    fn test_arity_mismatch_skips_body() {
        let outcome = run("fun f(a) { print \"ran\"; }\nf(1, 2);");

        assert!(outcome.had_runtime_error);
        assert_eq!(outcome.out, "");
        assert_eq!(
            outcome.err.trim_end(),
            "[line 2] RuntimeError: Expected 1 arguments but got 2."
        );
    }

    #[test]
    fn test_calling_non_callable() {
        assert_eq!(
            runtime_error("nil();"),
            "[line 1] RuntimeError: Can only call functions and classes."
        );
        assert_eq!(
            runtime_error("\"text\"(1);"),
            "[line 1] RuntimeError: Can only call functions and classes."
        );
    }

    #[test]
    fn test_callables_print_their_names() {
        let lines = output_of(
            "fun named() nil
             print named;
             print fun () nil;
             print clock;",
        );

        assert_eq!(lines, vec!["<fn named>", "<anonymous fn>", "<native fn clock>"]);
    }

    #[test]
    fn test_runtime_error_stops_the_program() {
        let outcome = run("print 1;\nprint nil + nil;\nprint 3;");

        assert_eq!(outcome.lines(), vec!["1"]);
        assert!(outcome.had_runtime_error);
    }

    // ── control flow ────────────────────────────────────────────────────

    #[test]
    fn test_break_leaves_innermost_loop() {
        let lines = output_of(
            "var i = 0;
             while true {
               i = i + 1;
               var j = 0;
               while true { j = j + 1; if j == 2 break; }
               if i == 3 break;
             }
             print i;",
        );

        assert_eq!(lines, vec!["3"]);
    }

    #[test]
    fn test_return_from_inside_loop() {
        let lines = output_of(
            "fun find(limit) {
               for (var i = 0; ; i = i + 1) if i * i > limit return i;
             }
             print find(50);",
        );

        assert_eq!(lines, vec!["8"]);
    }

    #[test]
    fn test_top_level_return_is_the_program_result() {
        let outcome = run("var a = 2;\nreturn a * 21;\nprint \"unreachable\";");

        assert_eq!(outcome.returned.as_deref(), Some("42"));
        assert_eq!(outcome.out, "");
    }

    // ── try / catch / throw ─────────────────────────────────────────────

    #[test]
    fn test_thrown_value_is_caught() {
        let lines = output_of(
            "try { throw \"boom\"; } catch e { print e; }
             print \"after\";",
        );

        assert_eq!(lines, vec!["boom", "after"]);
    }

    #[test]
    fn test_thrown_payload_is_arbitrary() {
        let lines = output_of(
            "try throw {code: 7} catch e print e.code;
             try throw [1, 2] catch e print e.length();
             try throw 1 catch print \"anonymous\";",
        );

        assert_eq!(lines, vec!["7", "2", "anonymous"]);
    }

    #[test]
    fn test_throw_unwinds_through_calls() {
        let lines = output_of(
            "fun inner() { throw \"deep\"; print \"no\"; }
             fun outer() { inner(); print \"no\"; }
             try outer(); catch e print \"caught \" + e;",
        );

        assert_eq!(lines, vec!["caught deep"]);
    }

    #[test]
    fn test_rethrow_reaches_outer_handler() {
        let lines = output_of(
            "try {
               try throw 1; catch e throw e + 1;
             } catch e print e;",
        );

        assert_eq!(lines, vec!["2"]);
    }

    #[test]
    fn test_runtime_error_is_not_catchable() {
        let outcome = run("try { nil(); } catch e { print \"caught\"; }\nprint \"after\";");

        assert!(outcome.had_runtime_error);
        assert_eq!(outcome.out, "");
        assert_eq!(
            outcome.err.trim_end(),
            "[line 1] RuntimeError: Can only call functions and classes."
        );
    }

    #[test]
    fn test_return_passes_through_try() {
        let lines = output_of(
            "fun f() { try { return 1; } catch e { return 2; } return 3; }
             print f();",
        );

        assert_eq!(lines, vec!["1"]);
    }

    #[test]
    fn test_uncaught_throw_is_reported() {
        assert_eq!(
            runtime_error("\n\nthrow \"oops\";"),
            "[line 3] RuntimeError: Uncaught exception: oops"
        );
    }

    // ── prelude ─────────────────────────────────────────────────────────

    #[test]
    fn test_clock_is_milliseconds() {
        let outcome = run("return clock();");
        let millis: f64 = outcome
            .returned
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap();

        assert!(millis > 1.6e12);
    }

    #[test]
    fn test_chr_and_range() {
        let lines = output_of(
            "print chr(65) + chr(98);
             print range(1, 4);
             print range(3, 1).length();",
        );

        assert_eq!(lines, vec!["Ab", "[1, 2, 3, 4]", "0"]);
    }

    #[test]
    fn test_raw_field_helpers() {
        let lines = output_of(
            "var o = {a: 1};
             print has(o, \"a\");
             print has(o, \"b\");
             set(o, \"b\", 2);
             print get(o, \"b\");
             print get(o, \"c\");",
        );

        assert_eq!(lines, vec!["true", "false", "2", "nil"]);
    }

    #[test]
    fn test_eval_runs_in_globals() {
        let lines = output_of(
            "print eval(\"return 1 + 1;\");
             eval(\"var made = 5;\");
             print made;
             print eval(\"1;\");",
        );

        assert_eq!(lines, vec!["2", "5", "nil"]);
    }

    #[test]
    fn test_eval_static_errors_become_runtime_errors() {
        let message = runtime_error("eval(\"print this;\");");

        assert!(message.contains("RuntimeError"));
        assert!(message.contains("Can't use 'this' outside of a class."));
    }

    #[test]
    fn test_exit_stops_the_program() {
        let outcome = run("print 1;\nexit(3);\nprint 2;");

        assert_eq!(outcome.lines(), vec!["1"]);
        assert_eq!(outcome.exit_code, Some(3));
        assert!(!outcome.had_runtime_error);
    }

    #[test]
    fn test_exit_is_not_catchable() {
        let outcome = run("try exit(4); catch print \"caught\";");

        assert_eq!(outcome.out, "");
        assert_eq!(outcome.exit_code, Some(4));
    }

    #[test]
    fn test_command_literal_captures_stdout() {
        let lines = output_of("var out = `echo hello`;\nprint out + \"!\";");

        assert_eq!(lines, vec!["hello", "!"]);
    }

    #[test]
    fn test_import_returns_module_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("math.slox");
        std::fs::write(
            &path,
            "fun double(x) x * 2;\nvar private = 10;\nreturn {double: double, base: private};",
        )
        .unwrap();

        let source = format!(
            "var m = import \"{}\";\nprint m.double(m.base);",
            path.display()
        );

        assert_eq!(output_of(&source), vec!["20"]);
    }

    #[test]
    fn test_import_scope_is_private() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("side.slox");
        std::fs::write(&path, "var secret = 1;\nprint \"loaded\";").unwrap();

        let outcome = run(&format!(
            "import \"{}\";\nprint secret;",
            path.display()
        ));

        assert_eq!(outcome.lines(), vec!["loaded"]);
        assert!(outcome.err.contains("Undefined variable 'secret'."));
    }

    // ── session and REPL ────────────────────────────────────────────────

    #[test]
    fn test_static_errors_set_had_error() {
        let outcome = run("print (1;\nvar = 2;");

        assert!(outcome.had_error);
        assert!(!outcome.had_runtime_error);
        assert_eq!(outcome.err.lines().count(), 2);
    }

    #[test]
    fn test_scan_errors_stop_before_parsing() {
        let outcome = run("print 1; $ print (;");

        assert!(outcome.had_error);
        assert_eq!(
            outcome.err.trim_end(),
            "[line 1] ScannerError: Unexpected character '$'."
        );
        assert_eq!(outcome.out, "");
    }

    #[test]
    fn test_session_keeps_globals_between_runs() {
        let (mut session, out, _err) = session();

        session.run("var greeting = \"hi\";");
        session.run("fun greet(name) greeting + \" \" + name;");
        session.run("print greet(\"there\");");

        assert_eq!(out.contents(), "hi there\n");
    }

    #[test]
    fn test_repl_echoes_and_recovers() {
        let (mut session, out, err) = session();
        let input = Cursor::new("var a = 2\n.a * 3\nreturn a\nnil()\n.a\n.exit\nprint 99\n");
        let mut prompt: Vec<u8> = Vec::new();

        let code = run_prompt(&mut session, input, &mut prompt).unwrap();

        assert_eq!(code, None);
        assert_eq!(String::from_utf8(prompt).unwrap(), "> > > 2\n> > > ");
        assert_eq!(out.contents(), "6\n2\n");
        assert_eq!(
            err.contents(),
            "[line 1] RuntimeError: Can only call functions and classes.\n"
        );
        assert!(!session.had_runtime_error());
    }

    #[test]
    fn test_repl_stops_on_exit() {
        let (mut session, out, _err) = session();
        let mut prompt: Vec<u8> = Vec::new();

        let code = run_prompt(&mut session, Cursor::new("exit(4)\nprint 1\n"), &mut prompt).unwrap();

        assert_eq!(code, Some(4));
        assert_eq!(out.contents(), "");
    }

    #[test]
    fn test_repl_ends_at_eof() {
        let (mut session, _out, _err) = session();
        let mut prompt: Vec<u8> = Vec::new();

        let code = run_prompt(&mut session, Cursor::new(""), &mut prompt).unwrap();

        assert_eq!(code, None);
        assert_eq!(String::from_utf8(prompt).unwrap(), "> \n");
    }

    // ── limits ──────────────────────────────────────────────────────────

    #[test]
    fn test_runaway_recursion_is_a_runtime_error() {
        assert_eq!(
            runtime_error("fun f(n) { return f(n + 1); } f(0);"),
            "[line 1] RuntimeError: Stack overflow."
        );
    }

    #[test]
    fn test_runaway_default_fallback_is_a_runtime_error() {
        assert_eq!(
            runtime_error("class Loop { _default(name, value) this[name] }\nLoop().x;"),
            "[line 1] RuntimeError: Stack overflow."
        );
    }

    #[test]
    fn test_session_recovers_after_stack_overflow() {
        let (mut session, out, err) = session();

        session.run("fun down(n) { if n == 0 return 0; return 1 + down(n - 1); }");
        session.run("down(-1);");
        assert!(session.had_runtime_error());
        assert_eq!(err.contents(), "[line 1] RuntimeError: Stack overflow.\n");

        session.reset_errors();
        session.run("print down(1000);");

        assert!(!session.had_runtime_error());
        assert_eq!(out.contents(), "1000\n");
    }

    #[test]
    fn test_repl_survives_stack_overflow() {
        let (mut session, out, _err) = session();
        let input = Cursor::new("fun f() f()\nf()\nprint \"still here\"\n");
        let mut prompt: Vec<u8> = Vec::new();

        let code = run_prompt(&mut session, input, &mut prompt).unwrap();

        assert_eq!(code, None);
        assert_eq!(out.contents(), "still here\n");
    }

    #[test]
    fn test_deeply_nested_expression_evaluates() {
        let source = format!("print {}1{};", "(".repeat(400), ")".repeat(400));

        assert_eq!(output_of(&source), vec!["1"]);
    }

    #[test]
    fn test_chr_rejects_codes_outside_u32() {
        assert_eq!(
            runtime_error("print chr(4294967361);"),
            "[line 1] RuntimeError: Invalid character code 4294967361."
        );
        assert_eq!(
            runtime_error("print chr(55296);"),
            "[line 1] RuntimeError: Invalid character code 55296."
        );
    }
}
