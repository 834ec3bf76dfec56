//! JSON fixture suites run end to end through the IR decoder and suite runner.

use eyg::suite::{self, CaseFailure};
use eyg::{ir, Extrinsics, MachineConfig, Value};

const CORE_SUITE: &str = r#"[
  {
    "name": "integer literal",
    "source": {"0": "i", "v": 5},
    "value": {"integer": 5}
  },
  {
    "name": "let and add",
    "source": {"0": "l", "l": "x", "v": {"0": "i", "v": 2},
               "t": {"0": "a", "f": {"0": "a", "f": {"0": "b", "l": "int_add"}, "a": {"0": "v", "l": "x"}},
                     "a": {"0": "v", "l": "x"}}},
    "value": {"integer": 4}
  },
  {
    "name": "log then answer",
    "source": {"0": "l", "l": "_", "v": {"0": "a", "f": {"0": "p", "l": "Log"}, "a": {"0": "s", "v": "hi"}},
               "t": {"0": "i", "v": 42}},
    "effects": [{"label": "Log", "lift": {"string": "hi"}, "reply": {"record": {}}}],
    "value": {"integer": 42}
  },
  {
    "name": "handled alert",
    "source": {"0": "a",
               "f": {"0": "a", "f": {"0": "h", "l": "Alert"},
                     "a": {"0": "f", "l": "v", "b": {"0": "f", "l": "_r", "b": {"0": "v", "l": "v"}}}},
               "a": {"0": "f", "l": "_", "b": {"0": "a", "f": {"0": "p", "l": "Alert"}, "a": {"0": "s", "v": "boom"}}}},
    "value": {"string": "boom"}
  },
  {
    "name": "divide by zero",
    "source": {"0": "a", "f": {"0": "a", "f": {"0": "b", "l": "int_divide"}, "a": {"0": "i", "v": 1}},
               "a": {"0": "i", "v": 0}},
    "value": {"tagged": {"label": "Error", "value": {"record": {}}}}
  },
  {
    "name": "tagged record",
    "source": {"0": "a", "f": {"0": "t", "l": "Ok"},
               "a": {"0": "a", "f": {"0": "a", "f": {"0": "e", "l": "a"}, "a": {"0": "i", "v": 1}}, "a": {"0": "u"}}},
    "value": {"tagged": {"label": "Ok", "value": {"record": {"a": {"integer": 1}}}}}
  },
  {
    "name": "list literal",
    "source": {"0": "a", "f": {"0": "a", "f": {"0": "c"}, "a": {"0": "s", "v": "a"}}, "a": {"0": "ta"}},
    "value": {"list": [{"string": "a"}]}
  },
  {
    "name": "binary literal",
    "source": {"0": "x", "v": {"/": {"bytes": "AQI"}}},
    "value": {"binary": {"/": {"bytes": "AQI"}}}
  },
  {
    "name": "undefined variable",
    "source": {"0": "v", "l": "foo"},
    "break": {"UndefinedVariable": "foo"}
  },
  {
    "name": "vacant",
    "source": {"0": "z"},
    "break": {"NotImplemented": ""}
  },
  {
    "name": "unknown builtin",
    "source": {"0": "b", "l": "int_power"},
    "break": {"UndefinedBuiltin": "int_power"}
  },
  {
    "name": "unanswered effect",
    "source": {"0": "a", "f": {"0": "p", "l": "Ask"}, "a": {"0": "u"}},
    "break": {"UnhandledEffect": "Ask"}
  }
]"#;

#[test]
fn core_suite_passes() {
    let cases = suite::load(CORE_SUITE).expect("suite parses");
    let report = suite::run_suite(&cases, &MachineConfig::default());

    assert!(report.is_success(), "failures: {:?}", report.failed);
    assert_eq!(report.total(), 12);
}

#[test]
fn effects_are_checked_in_order() {
    let source = r#"[{
      "name": "two logs",
      "source": {"0": "l", "l": "_", "v": {"0": "a", "f": {"0": "p", "l": "Log"}, "a": {"0": "s", "v": "a"}},
                 "t": {"0": "a", "f": {"0": "p", "l": "Log"}, "a": {"0": "s", "v": "b"}}},
      "effects": [
        {"label": "Log", "lift": {"string": "b"}, "reply": {"record": {}}},
        {"label": "Log", "lift": {"string": "a"}, "reply": {"record": {}}}
      ],
      "value": {"record": {}}
    }]"#;
    let cases = suite::load(source).expect("suite parses");

    match suite::run_case(&cases[0], &MachineConfig::default()) {
        Err(CaseFailure::LiftMismatch { label, expected, actual }) => {
            assert_eq!(label, "Log");
            assert_eq!(expected, Value::string("b"));
            assert_eq!(actual, Value::string("a"));
        }
        other => panic!("expected a lift mismatch, got {:?}", other),
    }
}

#[test]
fn missing_effect_is_reported() {
    let source = r#"[{
      "name": "no effect",
      "source": {"0": "i", "v": 1},
      "effects": [{"label": "Log", "lift": {"string": "a"}, "reply": {"record": {}}}],
      "value": {"integer": 1}
    }]"#;
    let cases = suite::load(source).expect("suite parses");
    let report = suite::run_suite(&cases, &MachineConfig::default());

    assert_eq!(report.passed, 0);
    assert!(matches!(
        &report.failed[0].1,
        CaseFailure::MissingEffect { expected, .. } if expected == "Log"
    ));
}

#[test]
fn decoded_program_runs_with_console_extrinsics() {
    let expr = ir::parse(
        r#"{"0": "l", "l": "_", "v": {"0": "a", "f": {"0": "p", "l": "Log"}, "a": {"0": "s", "v": "from a fixture"}},
            "t": {"0": "a", "f": {"0": "g", "l": "n"},
                  "a": {"0": "a", "f": {"0": "a", "f": {"0": "e", "l": "n"}, "a": {"0": "i", "v": 9}}, "a": {"0": "u"}}}}"#,
    )
    .expect("program decodes");

    assert_eq!(eyg::run(expr, &mut Extrinsics::console()), Ok(Value::Int(9)));
}

/// `let x = 1 in let x = 1 in ... x`, nested through `t`.
fn let_chain(depth: usize) -> String {
    let mut text = r#"{"0":"l","l":"x","v":{"0":"i","v":1},"t":"#.repeat(depth);
    text.push_str(r#"{"0":"v","l":"x"}"#);
    text.push_str(&"}".repeat(depth));
    text
}

/// `let x = (let x = ... 7 ... in x) in x`, nested through `v`.
fn nested_values(depth: usize) -> String {
    let mut text = r#"{"0":"l","l":"x","v":"#.repeat(depth);
    text.push_str(r#"{"0":"i","v":7}"#);
    text.push_str(&r#","t":{"0":"v","l":"x"}}"#.repeat(depth));
    text
}

#[test]
fn deep_let_chains_parse_and_run() {
    let expr = ir::parse(&let_chain(5_000)).expect("deep chain decodes");
    assert_eq!(eyg::run(expr, &mut Extrinsics::new()), Ok(Value::Int(1)));

    let expr = ir::parse(&nested_values(5_000)).expect("deep values decode");
    assert_eq!(eyg::run(expr, &mut Extrinsics::new()), Ok(Value::Int(7)));
}

#[test]
fn deep_programs_are_dropped_without_running() {
    let expr = ir::parse(&let_chain(200_000)).expect("deep chain decodes");
    drop(expr);
}
