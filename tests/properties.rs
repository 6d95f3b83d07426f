use proptest::prelude::*;
use vexpr::{parse, parse_selector, CodeGenerator};

/// Identifier-ish names that are neither keywords nor built-in constants
fn arb_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,4}".prop_map(|s| format!("v_{}", s))
}

fn arb_literal() -> impl Strategy<Value = String> {
    prop_oneof![
        (0u32..100000).prop_map(|n| n.to_string()),
        (0u32..1000, 0u32..1000).prop_map(|(a, b)| format!("{}.{}", a, b)),
        (1u32..0xffff).prop_map(|n| format!("0x{:X}", n)),
        "[a-z ]{0,8}".prop_map(|s| format!("'{}'", s)),
        Just("true".to_string()),
        Just("null".to_string()),
    ]
}

/// Syntactically valid source text
fn arb_source() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![arb_name(), arb_literal()];
    leaf.prop_recursive(4, 32, 3, |inner| {
        prop_oneof![
            (
                inner.clone(),
                prop::sample::select(vec![
                    "+", "-", "*", "/", "%", "<", ">=", "===", "!=", "&&", "||", "&", "|", "^",
                    "<<", ">>>"
                ]),
                inner.clone()
            )
                .prop_map(|(l, op, r)| format!("{} {} {}", l, op, r)),
            (prop::sample::select(vec!["-", "!", "~", "+"]), inner.clone())
                .prop_map(|(op, e)| format!("{}({})", op, e)),
            inner.clone().prop_map(|e| format!("({})", e)),
            (inner.clone(), inner.clone(), inner.clone())
                .prop_map(|(t, c, a)| format!("{} ? {} : {}", t, c, a)),
            (arb_name(), arb_name()).prop_map(|(o, p)| format!("{}.{}", o, p)),
            (arb_name(), inner.clone()).prop_map(|(o, p)| format!("{}[{}]", o, p)),
            prop::collection::vec(inner.clone(), 0..3)
                .prop_map(|args| format!("max({})", args.join(", "))),
            prop::collection::vec(inner, 0..3).prop_map(|xs| format!("[{}]", xs.join(", "))),
        ]
    })
}

proptest! {
    #[test]
    fn test_parse_terminates_on_arbitrary_input(src in "\\PC{0,40}") {
        // any result is fine as long as it returns
        let _ = parse(&src);
    }

    #[test]
    fn test_parse_terminates_on_operator_soup(src in "[a-c0-9 ()\\[\\]{}.,:?!+\\-*/%<>=&|^~'\"]{0,30}") {
        let _ = parse(&src);
    }

    #[test]
    fn test_selector_terminates_on_arbitrary_input(src in "[a-z@:!\\[\\]{}>, 0-9]{0,30}") {
        let _ = parse_selector(&src, None, None);
    }

    #[test]
    fn test_generated_sources_parse(src in arb_source()) {
        prop_assert!(parse(&src).is_ok(), "failed to parse `{}`", src);
    }

    #[test]
    fn test_compile_is_idempotent(src in arb_source()) {
        let generator = CodeGenerator::default();
        let ast = parse(&src).unwrap();
        let first = generator.compile(&ast).unwrap();
        let second = generator.compile(&ast).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn test_compiled_code_reparses(src in arb_source()) {
        // the output of the default generator is itself a valid expression
        // once the global accessor is whitelisted
        let generator = CodeGenerator::builder().global_accessor(|id| format!("g.{}", id)).build();
        let out = generator.compile(&parse(&src).unwrap()).unwrap();
        prop_assert!(parse(&out.code).is_ok(), "`{}` compiled to `{}`", src, out.code);
    }

    #[test]
    fn test_globals_are_unique(src in arb_source()) {
        let out = CodeGenerator::default().compile(&parse(&src).unwrap()).unwrap();
        let mut seen = std::collections::HashSet::new();
        for g in &out.globals {
            prop_assert!(seen.insert(g.clone()), "duplicate global {}", g);
        }
    }
}
