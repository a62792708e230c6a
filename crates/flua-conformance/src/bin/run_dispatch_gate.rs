#![forbid(unsafe_code)]

use flua_conformance::{corpus_fingerprint, run_all_core_suites, SuiteReport};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct SuiteSummary {
    suite: String,
    case_count: usize,
    pass_count: usize,
    failures: Vec<String>,
}

#[derive(Debug, Serialize)]
struct GateSummary {
    status: &'static str,
    corpus_fingerprint: String,
    suites: Vec<SuiteSummary>,
}

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("run_dispatch_gate failed: {err}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<bool, String> {
    let mut args = std::env::args().skip(1);
    if let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                println!("Usage: cargo run -p flua-conformance --bin run_dispatch_gate");
                return Ok(true);
            }
            unknown => return Err(format!("unknown argument: {unknown}")),
        }
    }

    let suites = run_all_core_suites()?;
    let passed = suites.iter().all(SuiteReport::all_passed);

    let summary = GateSummary {
        status: if passed { "pass" } else { "fail" },
        corpus_fingerprint: corpus_fingerprint(),
        suites: suites
            .into_iter()
            .map(|report| SuiteSummary {
                suite: report.suite.to_string(),
                case_count: report.case_count,
                pass_count: report.pass_count,
                failures: report.failures,
            })
            .collect(),
    };

    let rendered = serde_json::to_string_pretty(&summary)
        .map_err(|err| format!("failed serializing gate summary: {err}"))?;
    println!("{rendered}");

    Ok(passed)
}
