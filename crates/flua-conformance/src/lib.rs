#![forbid(unsafe_code)]

pub mod corpus;

use std::fmt::Write as _;

use sha2::{Digest, Sha256};

use flua_dispatch::expr::Operand;
use flua_dispatch::length;
use flua_meta::{counting_len_handlers, operation_handlers, BuilderMode};
use flua_oracle::{render, structural_eq};
use flua_value::{MetaOp, ReturnValues, Value};

use crate::corpus::{execute_case, load_corpus, value_from_json, DISPATCH_VOCABULARY_CASES};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessReport {
    pub suite: &'static str,
    pub case_count: usize,
    pub corpus_fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteReport {
    pub suite: &'static str,
    pub case_count: usize,
    pub pass_count: usize,
    pub failures: Vec<String>,
}

impl SuiteReport {
    #[must_use]
    fn new(suite: &'static str) -> Self {
        Self {
            suite,
            case_count: 0,
            pass_count: 0,
            failures: Vec::new(),
        }
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.case_count == self.pass_count && self.failures.is_empty()
    }
}

fn record_check(report: &mut SuiteReport, ok: bool, failure: String) {
    report.case_count += 1;
    if ok {
        report.pass_count += 1;
    } else {
        report.failures.push(failure);
    }
}

/// Grade one dispatched tree against its expected literal. A mismatch
/// is recorded with both sides rendered, so the report alone is enough
/// to diagnose the shape that dispatch actually built.
fn record_comparison(report: &mut SuiteReport, case_id: &str, actual: &Value, expected: &Value) {
    let ok = structural_eq(actual, expected);
    record_check(
        report,
        ok,
        format!(
            "{case_id}: dispatch produced {} but expected {}",
            render(actual),
            render(expected)
        ),
    );
}

/// A named symbolic leaf: the single-element sequence `[name]` with the
/// flat full-vocabulary handler table attached.
#[must_use]
pub fn flat_leaf(name: &str) -> Value {
    Value::sequence_with_handlers(
        vec![Value::string(name)],
        operation_handlers(BuilderMode::Flat),
    )
}

/// A named symbolic leaf whose operation results stay dispatchable.
#[must_use]
pub fn propagating_leaf(name: &str) -> Value {
    Value::sequence_with_handlers(
        vec![Value::string(name)],
        operation_handlers(BuilderMode::Propagating),
    )
}

/// The multi-return length fixture: a leaf whose only handler answers
/// the length operation with `results`, in order.
#[must_use]
pub fn counting_length_fixture(results: Vec<Value>) -> Value {
    Value::sequence_with_handlers(
        vec![Value::string("l")],
        counting_len_handlers(results),
    )
}

/// Hex sha-256 of the embedded corpus, recorded in reports so a run can
/// be tied to the exact fixture set that produced it.
#[must_use]
pub fn corpus_fingerprint() -> String {
    let digest = Sha256::digest(DISPATCH_VOCABULARY_CASES.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(&mut out, "{byte:02x}");
    }
    out
}

pub fn run_smoke() -> Result<HarnessReport, String> {
    let corpus = load_corpus()?;
    Ok(HarnessReport {
        suite: "smoke",
        case_count: corpus.cases.len(),
        corpus_fingerprint: corpus_fingerprint(),
    })
}

fn seq(items: Vec<Value>) -> Value {
    Value::sequence(items)
}

fn leaf_literal(name: &str) -> Value {
    seq(vec![Value::string(name)])
}

/// Mixed arithmetic over flat leaves: the host grammar's precedence and
/// left-associativity decide the tree shape, the oracle grades it.
pub fn run_expression_shape_suite() -> SuiteReport {
    let mut report = SuiteReport::new("expression_shapes");

    let a = flat_leaf("a");
    let b = flat_leaf("b");
    let c = flat_leaf("c");
    let operand = |value: &Value| Operand::new(value.clone());

    let mixed = (operand(&a) + operand(&b) * operand(&c) - operand(&a)).into_value();
    match mixed {
        Ok(got) => {
            let want = seq(vec![
                Value::string("sub"),
                seq(vec![
                    Value::string("add"),
                    leaf_literal("a"),
                    seq(vec![
                        Value::string("mul"),
                        leaf_literal("b"),
                        leaf_literal("c"),
                    ]),
                ]),
                leaf_literal("a"),
            ]);
            record_comparison(&mut report, "a_plus_b_mul_c_minus_a", &got, &want);
        }
        Err(err) => record_check(
            &mut report,
            false,
            format!("a_plus_b_mul_c_minus_a: dispatch failed: {err}"),
        ),
    }

    let division = (operand(&c) / operand(&a)).into_value();
    match division {
        Ok(got) => {
            let want = seq(vec![
                Value::string("div"),
                leaf_literal("c"),
                leaf_literal("a"),
            ]);
            record_comparison(&mut report, "c_div_a", &got, &want);
        }
        Err(err) => record_check(&mut report, false, format!("c_div_a: dispatch failed: {err}")),
    }

    let squared = (operand(&a) * operand(&a)).into_value();
    match squared {
        Ok(got) => {
            let want = seq(vec![
                Value::string("mul"),
                leaf_literal("a"),
                leaf_literal("a"),
            ]);
            record_comparison(&mut report, "a_mul_a", &got, &want);
        }
        Err(err) => record_check(&mut report, false, format!("a_mul_a: dispatch failed: {err}")),
    }

    report
}

/// A length handler producing three results: the single-value context
/// must keep only the first and report a result count of exactly one.
pub fn run_length_adjustment_suite() -> SuiteReport {
    let mut report = SuiteReport::new("length_adjustment");

    let fixture = counting_length_fixture(vec![
        Value::Integer(1),
        Value::Integer(2),
        Value::Integer(3),
    ]);

    match length(&fixture) {
        Ok(full) => {
            record_check(
                &mut report,
                full.count() == 3,
                format!("len_handler_result_count: produced {} results, not 3", full.count()),
            );

            let single: ReturnValues = full.adjusted(1);
            record_check(
                &mut report,
                single.count() == 1,
                format!(
                    "single_context_count: adjusted reading reports {} results, not 1",
                    single.count()
                ),
            );
            record_comparison(
                &mut report,
                "single_context_value",
                &single.first(),
                &Value::Integer(1),
            );
        }
        Err(err) => record_check(
            &mut report,
            false,
            format!("len_handler_dispatch: dispatch failed: {err}"),
        ),
    }

    let via_expression = Operand::new(fixture).len().into_value();
    match via_expression {
        Ok(got) => record_comparison(&mut report, "expression_reading", &got, &Value::Integer(1)),
        Err(err) => record_check(
            &mut report,
            false,
            format!("expression_reading: dispatch failed: {err}"),
        ),
    }

    report
}

/// Every vocabulary operation applied once through the propagating
/// builder, each graded against its literal expected node from the
/// embedded corpus.
pub fn run_vocabulary_suite() -> Result<SuiteReport, String> {
    let corpus = load_corpus()?;
    let mut report = SuiteReport::new("dispatch_vocabulary");

    for op in MetaOp::ALL {
        record_check(
            &mut report,
            corpus
                .cases
                .iter()
                .any(|case| case.form.operation() == Some(op)),
            format!("operation {} not exercised by corpus", op.tag()),
        );
    }

    for case in &corpus.cases {
        match execute_case(&case.form) {
            Ok(got) => {
                let want = value_from_json(&case.expected);
                record_comparison(&mut report, &case.id, &got, &want);
            }
            Err(err) => record_check(
                &mut report,
                false,
                format!("{}: dispatch failed: {err}", case.id),
            ),
        }
    }

    Ok(report)
}

/// Chained operations through the propagating builder must keep
/// composing: depth-three chains build correctly nested trees.
pub fn run_propagation_chain_suite() -> SuiteReport {
    let mut report = SuiteReport::new("propagation_chains");

    let a = propagating_leaf("a");
    let b = propagating_leaf("b");
    let operand = |value: &Value| Operand::new(value.clone());

    let chained = ((operand(&a) % operand(&b)) << operand(&a)).into_value();
    match chained.map(|value| Operand::new(value).len().into_value()) {
        Ok(Ok(got)) => {
            let want = seq(vec![
                Value::string("len"),
                seq(vec![
                    Value::string("shl"),
                    seq(vec![
                        Value::string("mod"),
                        leaf_literal("a"),
                        leaf_literal("b"),
                    ]),
                    leaf_literal("a"),
                ]),
            ]);
            record_comparison(&mut report, "mod_shl_len_chain", &got, &want);
        }
        Ok(Err(err)) | Err(err) => record_check(
            &mut report,
            false,
            format!("mod_shl_len_chain: dispatch failed: {err}"),
        ),
    }

    let negated = (-(!(operand(&a) & operand(&b)))).into_value();
    match negated {
        Ok(got) => {
            let want = seq(vec![
                Value::string("unm"),
                seq(vec![
                    Value::string("bnot"),
                    seq(vec![
                        Value::string("band"),
                        leaf_literal("a"),
                        leaf_literal("b"),
                    ]),
                ]),
            ]);
            record_comparison(&mut report, "band_bnot_unm_chain", &got, &want);
        }
        Err(err) => record_check(
            &mut report,
            false,
            format!("band_bnot_unm_chain: dispatch failed: {err}"),
        ),
    }

    report
}

pub fn run_all_core_suites() -> Result<Vec<SuiteReport>, String> {
    Ok(vec![
        run_expression_shape_suite(),
        run_length_adjustment_suite(),
        run_vocabulary_suite()?,
        run_propagation_chain_suite(),
    ])
}
