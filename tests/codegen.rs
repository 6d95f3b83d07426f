use vexpr::ast::{BinaryOperator, Expr, LiteralValue, UnaryOperator, MAX_DEPTH};
use vexpr::codegen::{method, MethodMode};
use vexpr::{parse, CodeGenerator, CompileError, CompileOutput, FunctionDef};

fn compile_with(generator: &CodeGenerator, src: &str) -> Result<CompileOutput, CompileError> {
    generator.compile(&parse(src).unwrap())
}

fn code(src: &str) -> String {
    compile_with(&CodeGenerator::default(), src).unwrap().code
}

fn datum_generator() -> CodeGenerator {
    CodeGenerator::builder()
        .whitelist(["datum", "event"])
        .fieldvar("datum")
        .build()
}

// ==============================================================================
// Literals and operators

#[test]
fn test_literals_are_emitted_verbatim() {
    assert_eq!(code("3"), "3");
    assert_eq!(code("0x1F"), "0x1F");
    assert_eq!(code("3.14e2"), "3.14e2");
    assert_eq!(code(r"'ab\tc'"), r"'ab\tc'");
    assert_eq!(code("/a+/g"), "/a+/g");
    assert_eq!(code("null"), "null");
}

#[test]
fn test_empty_regex_gets_a_canonical_form() {
    let expr = Expr::literal(
        LiteralValue::Regex {
            pattern: String::new(),
            flags: "g".into(),
        },
        "//g",
    );
    let out = CodeGenerator::default().compile(&expr).unwrap();
    assert_eq!(out.code, "/(?:)/g");
}

#[test]
fn test_operators_are_parenthesized() {
    assert_eq!(code("1 + 2 * 3"), "(1+(2*3))");
    assert_eq!(code("(1 + 2) * 3"), "((1+2)*3)");
    assert_eq!(code("-1"), "(-1)");
    assert_eq!(code("!true || false && null"), "((!true)||(false&&null))");
    assert_eq!(code("1 ? 2 : 3"), "(1?2:3)");
    assert_eq!(code("1 >>> 2 !== 3"), "((1>>>2)!==3)");
}

#[test]
fn test_word_operators_keep_spaces() {
    assert_eq!(
        code("'a' in obj"),
        "('a' in global[\"obj\"])"
    );
    assert_eq!(
        code("a instanceof b"),
        "(global[\"a\"] instanceof global[\"b\"])"
    );
}

#[test]
fn test_arrays_and_objects() {
    assert_eq!(code("[1,,2]"), "[1,,2]");
    assert_eq!(code("[]"), "[]");
    assert_eq!(code("{a: x, 'b': 2}"), "{a:global[\"x\"],'b':2}");
    // keys are names, never constants or globals
    assert_eq!(code("{PI: 1}"), "{PI:1}");
}

#[test]
fn test_raw_code_is_emitted_verbatim() {
    let expr = Expr::binary(
        BinaryOperator::Add,
        Expr::raw("helper()"),
        Expr::identifier("x"),
    );
    let out = CodeGenerator::default().compile(&expr).unwrap();
    assert_eq!(out.code, "(helper()+global[\"x\"])");
    assert_eq!(out.globals, vec!["x"]);
}

// ==============================================================================
// Identifier resolution

#[test]
fn test_free_identifier_is_global_once() {
    let out = compile_with(&CodeGenerator::default(), "x + x").unwrap();
    assert_eq!(out.code, "(global[\"x\"]+global[\"x\"])");
    assert_eq!(out.globals, vec!["x"]);
    assert!(out.fields.is_empty());
}

#[test]
fn test_globals_are_in_first_seen_order() {
    let out = compile_with(&CodeGenerator::default(), "b + a * b + c").unwrap();
    assert_eq!(out.globals, vec!["b", "a", "c"]);
}

#[test]
fn test_whitelisted_identifier_is_verbatim() {
    let out = compile_with(&datum_generator(), "datum").unwrap();
    assert_eq!(out.code, "datum");
    assert!(out.globals.is_empty());
}

#[test]
fn test_blacklisted_identifier_fails() {
    let generator = CodeGenerator::builder().blacklist(["eval"]).build();
    let err = compile_with(&generator, "eval").unwrap_err();
    assert_eq!(
        err,
        CompileError::IllegalIdentifier {
            name: "eval".into()
        }
    );
    assert_eq!(err.to_string(), "Illegal identifier: eval");
    // nested inside other expressions too
    assert!(compile_with(&generator, "[1, eval + 2]").is_err());
}

#[test]
fn test_blacklist_wins_over_whitelist_and_constants() {
    let generator = CodeGenerator::builder()
        .whitelist(["a"])
        .blacklist(["a", "PI"])
        .build();
    assert!(compile_with(&generator, "a").is_err());
    assert!(compile_with(&generator, "PI").is_err());
}

#[test]
fn test_constants() {
    assert_eq!(code("PI"), "Math.PI");
    assert_eq!(code("MAX_VALUE"), "Number.MAX_VALUE");
    assert_eq!(code("NaN"), "NaN");
}

#[test]
fn test_member_names_are_not_resolved() {
    let out = compile_with(&CodeGenerator::default(), "a.PI.b").unwrap();
    assert_eq!(out.code, "global[\"a\"].PI.b");
    assert_eq!(out.globals, vec!["a"]);
}

#[test]
fn test_computed_member_properties_are_resolved() {
    let out = compile_with(&CodeGenerator::default(), "a[b]").unwrap();
    assert_eq!(out.code, "global[\"a\"][global[\"b\"]]");
    assert_eq!(out.globals, vec!["a", "b"]);
}

#[test]
fn test_custom_global_accessor() {
    let generator = CodeGenerator::builder()
        .global_accessor(|id| format!("_.{}", id))
        .build();
    let out = compile_with(&generator, "x + y").unwrap();
    assert_eq!(out.code, "(_.x+_.y)");
    assert_eq!(out.globals, vec!["x", "y"]);
}

#[test]
fn test_named_global_var() {
    let generator = CodeGenerator::builder()
        .globalvar(vexpr::GlobalVar::Named("this.context".into()))
        .build();
    assert_eq!(
        compile_with(&generator, "x").unwrap().code,
        "this.context[\"x\"]"
    );
}

// ==============================================================================
// Field tracking

#[test]
fn test_fields_are_recorded_once() {
    let out = compile_with(&datum_generator(), "datum.value > datum['value']").unwrap();
    assert_eq!(out.code, "(datum.value>datum['value'])");
    assert_eq!(out.fields, vec!["value"]);
    assert!(out.globals.is_empty());
}

#[test]
fn test_only_direct_field_reads_are_recorded() {
    let out = compile_with(&datum_generator(), "datum.a.b + event.c + datum[\"d e\"]").unwrap();
    assert_eq!(out.fields, vec!["a", "d e"]);
}

#[test]
fn test_non_whitelisted_fieldvar_is_not_tracked() {
    let generator = CodeGenerator::builder().fieldvar("datum").build();
    let out = compile_with(&generator, "datum.value").unwrap();
    assert_eq!(out.code, "global[\"datum\"].value");
    assert!(out.fields.is_empty());
    assert_eq!(out.globals, vec!["datum"]);
}

// ==============================================================================
// Calls

#[test]
fn test_renamed_functions() {
    assert_eq!(code("abs(-x)"), "Math.abs((-global[\"x\"]))");
    assert_eq!(code("max(1, 2, 3)"), "Math.max(1,2,3)");
    assert_eq!(code("now()"), "Date.now()");
    assert_eq!(code("datetime(2020, 1)"), "new Date(2020,1)");
    assert_eq!(code("isNaN(1)"), "Number.isNaN(1)");
}

#[test]
fn test_method_functions() {
    assert_eq!(code("upper(s)"), "String(global[\"s\"]).toUpperCase()");
    assert_eq!(code("year(d)"), "(new Date(global[\"d\"])).getFullYear()");
    assert_eq!(code("utcday(0)"), "(new Date(0)).getUTCDay()");
    assert_eq!(code("length(a)"), "global[\"a\"].length");
    assert_eq!(code("slice(a, 1, 2)"), "global[\"a\"].slice(1,2)");
    assert_eq!(code("indexof(a, 'x')"), "global[\"a\"].indexOf('x')");
    assert_eq!(code("replace(s, /a/g, 'b')"), "String(global[\"s\"]).replace(/a/g,'b')");
    assert_eq!(code("test(/ab/, s)"), "RegExp(/ab/).test(global[\"s\"])");
}

#[test]
fn test_custom_generators() {
    assert_eq!(code("if(x, 1, 2)"), "(global[\"x\"]?1:2)");
    assert_eq!(
        code("clamp(v, 0, 1)"),
        "Math.max(0, Math.min(1,global[\"v\"]))"
    );
    assert_eq!(code("reverse(a)"), "(global[\"a\"]).slice().reverse()");
}

#[test]
fn test_arity_errors() {
    let generator = CodeGenerator::default();

    let err = compile_with(&generator, "clamp(1, 2)").unwrap_err();
    assert!(matches!(err, CompileError::Arity { .. }));
    assert_eq!(err.to_string(), "Missing arguments to clamp function.");

    let err = compile_with(&generator, "if(a, b, c, d)").unwrap_err();
    assert_eq!(err.to_string(), "Too many arguments to if function.");

    assert!(matches!(
        compile_with(&generator, "upper()"),
        Err(CompileError::Arity { .. })
    ));
    assert!(matches!(
        compile_with(&generator, "reverse()"),
        Err(CompileError::Arity { .. })
    ));
}

#[test]
fn test_unrecognized_function() {
    let err = compile_with(&CodeGenerator::default(), "foo(1)").unwrap_err();
    assert_eq!(err, CompileError::UnrecognizedFunction { name: "foo".into() });
    assert_eq!(err.to_string(), "Unrecognized function: foo");
}

#[test]
fn test_blacklisted_name_as_callee_is_a_function_lookup() {
    let generator = CodeGenerator::builder().blacklist(["eval"]).build();
    assert_eq!(
        compile_with(&generator, "eval()").unwrap_err(),
        CompileError::UnrecognizedFunction {
            name: "eval".into()
        }
    );
}

#[test]
fn test_member_callee_is_illegal() {
    let generator = CodeGenerator::builder().blacklist(["eval"]).build();
    let err = compile_with(&generator, "a.eval()").unwrap_err();
    assert_eq!(
        err,
        CompileError::IllegalCallee {
            kind: "MemberExpression".into()
        }
    );
    assert_eq!(err.to_string(), "Illegal callee type: MemberExpression");
}

#[test]
fn test_user_functions() {
    let generator = CodeGenerator::builder()
        .function("twice", FunctionDef::rename("helpers.twice"))
        .function(
            "pipe",
            FunctionDef::generator(|codegen, args| {
                Ok(format!("[{}]", codegen.visit_all(args)?.join("|")))
            }),
        )
        .function("first", method("shift", None, MethodMode::NoArgs))
        .build();

    assert_eq!(compile_with(&generator, "twice(1)").unwrap().code, "helpers.twice(1)");
    assert_eq!(compile_with(&generator, "pipe(1, x)").unwrap().code, "[1|global[\"x\"]]");
    assert_eq!(compile_with(&generator, "first(a)").unwrap().code, "global[\"a\"].shift()");
    // defaults are still present
    assert_eq!(compile_with(&generator, "abs(1)").unwrap().code, "Math.abs(1)");
}

#[test]
fn test_no_defaults() {
    let generator = CodeGenerator::builder()
        .no_defaults()
        .constant("TAU", "(2*Math.PI)")
        .build();
    assert!(matches!(
        compile_with(&generator, "abs(1)"),
        Err(CompileError::UnrecognizedFunction { .. })
    ));
    assert_eq!(compile_with(&generator, "PI").unwrap().code, "global[\"PI\"]");
    assert_eq!(compile_with(&generator, "TAU").unwrap().code, "(2*Math.PI)");
}

// ==============================================================================
// Reuse

#[test]
fn test_compilation_is_idempotent() {
    let generator = datum_generator();
    let ast = parse("datum.a + x * datum.b - if(y, datum.a, z)").unwrap();

    let first = generator.compile(&ast).unwrap();
    let second = generator.compile(&ast).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.globals, vec!["x", "y", "z"]);
    assert_eq!(first.fields, vec!["a", "b"]);
}

#[test]
fn test_accumulators_do_not_leak_between_calls() {
    let generator = CodeGenerator::default();
    assert_eq!(compile_with(&generator, "a").unwrap().globals, vec!["a"]);
    assert_eq!(compile_with(&generator, "b").unwrap().globals, vec!["b"]);
    assert!(compile_with(&generator, "1").unwrap().globals.is_empty());
}

#[test]
fn test_generator_is_shared_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<CodeGenerator>();

    let generator = datum_generator();
    std::thread::scope(|scope| {
        let handles: Vec<_> = ["datum.a + x", "datum.b * y"]
            .into_iter()
            .map(|src| {
                let generator = &generator;
                scope.spawn(move || compile_with(generator, src).unwrap())
            })
            .collect();
        let outputs: Vec<CompileOutput> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(outputs[0].fields, vec!["a"]);
        assert_eq!(outputs[1].fields, vec!["b"]);
        assert_eq!(outputs[1].globals, vec!["y"]);
    });
}

#[test]
fn test_trees_deeper_than_the_limit_are_refused() {
    let deep = (0..MAX_DEPTH).fold(Expr::identifier("x"), |e, _| {
        Expr::unary(UnaryOperator::Minus, e)
    });
    assert_eq!(deep.height(), MAX_DEPTH + 1);
    assert_eq!(
        CodeGenerator::default().compile(&deep),
        Err(CompileError::TooDeep {
            height: MAX_DEPTH + 1,
            limit: MAX_DEPTH
        })
    );

    let deepest_parsed = parse(&("- ".repeat(MAX_DEPTH - 1) + "x")).unwrap();
    assert_eq!(deepest_parsed.height(), MAX_DEPTH);
    let out = CodeGenerator::default().compile(&deepest_parsed).unwrap();
    assert_eq!(out.globals, vec!["x"]);
}
