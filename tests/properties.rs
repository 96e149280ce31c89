//! Property-based tests for the translator and interpreter using `proptest`.

use project_tac::ir::{decode_number, encode_number, Number};
use project_tac::lexer::KEYWORDS;
use project_tac::{compile, run, Error, Program, RuntimeFault, VmOptions, VM};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// Statement sequences over the two pre-declared variables `a` and `b`.
fn arb_statements() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        (0i64..100).prop_map(|n| format!("a = a + {n};")),
        Just("print(a);".to_string()),
        Just("b = not b;".to_string()),
        Just("print(a * 2 - 1 > 7 or b);".to_string()),
        // any printable text but a quote, plus raw newlines and tabs
        "[ !#-~\\n\\t]{0,8}".prop_map(|text| format!("print(\"{text}\" + a);")),
    ];
    leaf.prop_recursive(4, 48, 4, |inner| {
        let body = prop::collection::vec(inner, 0..4).prop_map(|stmts| stmts.join(" "));
        prop_oneof![
            (body.clone(), body.clone())
                .prop_map(|(t, e)| format!("if (a > 3) {{ {t} }} else {{ {e} }}")),
            body.clone().prop_map(|t| format!("if (b) {{ {t} }}")),
            (body, any::<bool>()).prop_map(|(t, exit)| {
                let tail = if exit { "break;" } else { "a = a + 1;" };
                format!("while (a < 50) {{ if (b) {{ continue; }} {t} {tail} }}")
            }),
        ]
    })
}

fn arb_program() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_statements(), 1..6)
        .prop_map(|stmts| format!("let a = 0; let b = true; {}", stmts.join(" ")))
}

fn arb_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,6}".prop_filter("not a keyword", |name| !KEYWORDS.contains(&name.as_str()))
}

fn assert_jumps_resolved(program: &Program) -> Result<(), TestCaseError> {
    for (i, quad) in program.iter().enumerate() {
        if quad.op.is_jump() {
            let target = quad.target();
            prop_assert!(target.is_some(), "line {} unresolved: {}", i + 1, quad);
            let target = target.unwrap_or_default();
            prop_assert!((1..=program.len() + 1).contains(&target), "line {} out of range", i + 1);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn translated_jumps_are_always_resolved(src in arb_program()) {
        let translation = compile(&src).map_err(|e| TestCaseError::fail(format!("{e}\n{src}")))?;
        assert_jumps_resolved(&translation.program)?;
    }

    #[test]
    fn translated_programs_never_hit_unknown_operands(src in arb_program()) {
        let program = compile(&src).map_err(|e| TestCaseError::fail(e.to_string()))?.program;
        let mut vm = VM::new(Vec::new(), VmOptions { max_steps: Some(5_000) });
        match vm.run(&program) {
            Ok(()) => {}
            Err(Error::Runtime { kind: RuntimeFault::StepLimitExceeded(_), .. }) => {}
            Err(other) => prop_assert!(false, "unexpected fault {other} in\n{src}"),
        }
    }

    #[test]
    fn declarations_get_increasing_addresses(
        names in prop::collection::hash_set(arb_name(), 1..20)
    ) {
        let names: Vec<String> = names.into_iter().collect();
        let src: String = names.iter().map(|n| format!("let {n} = 1; ")).collect();
        let translation = compile(&src).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let declared: Vec<(&str, u32)> = translation.symbols.iter().collect();
        prop_assert_eq!(declared.len(), names.len());
        for (i, (name, addr)) in declared.iter().enumerate() {
            prop_assert_eq!(*name, names[i].as_str());
            prop_assert_eq!(*addr, 400 + i as u32);
        }
    }

    #[test]
    fn break_outside_a_loop_always_fails(prefix in prop::collection::vec(arb_statements(), 0..3), use_break in any::<bool>()) {
        let exit = if use_break { "break;" } else { "continue;" };
        // a prefix may itself contain loops; the exit sits after all of them
        let src = format!("let a = 0; let b = false; {} {exit}", prefix.join(" "));
        match compile(&src) {
            Err(Error::Syntax { message, .. }) => prop_assert!(message.contains("outside loop")),
            other => prop_assert!(false, "unexpected {other:?}"),
        }
    }

    #[test]
    fn small_integers_round_trip(n in 0i64..400) {
        let token = encode_number(&n.to_string()).expect("encodes");
        prop_assert_eq!(decode_number(&token), Some(Number::Int(n)));
    }

    #[test]
    fn fractions_round_trip(v in -1.0e6f64..1.0e6) {
        prop_assume!(v.fract() != 0.0);
        let token = encode_number(&v.to_string()).expect("encodes");
        prop_assert_eq!(decode_number(&token), Some(Number::Float(v)));
    }

    #[test]
    fn arithmetic_matches_rust(
        a in -1000i64..1000,
        b in -1000i64..1000,
        op in prop::sample::select(vec!['+', '-', '*', '<', '>']),
    ) {
        let src = format!("let x = {a}; let y = {b}; print(x {op} y);");
        let expected = match op {
            '+' => a + b,
            '-' => a - b,
            '*' => a * b,
            '<' => (a < b) as i64,
            _ => (a > b) as i64,
        };
        let mut out = Vec::new();
        run(&src, &mut out).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(String::from_utf8(out).unwrap_or_default(), format!("{expected}\n"));
    }

    #[test]
    fn listing_reloads_identically(src in arb_program()) {
        let program = compile(&src).map_err(|e| TestCaseError::fail(e.to_string()))?.program;
        let reloaded: Program = program.to_string().parse().map_err(|e: Error| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(reloaded, program);
    }
}
