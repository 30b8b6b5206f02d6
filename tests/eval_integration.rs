//! Evaluation harness end to end: JSONL in, summary and report out

mod common;

use std::fs;
use std::sync::Arc;

use common::{handbook, memory, role_of, Role};
use groundqa::agent::MultiAgentWorkflow;
use groundqa::backends::ScriptedGenerator;
use groundqa::eval::{load_cases, EvalRunner};
use groundqa::rag::{QaWorkflow, RetrievalSelector};
use groundqa::types::Generation;
use tempfile::TempDir;

const CASES: &str = r#"# planner behaviour
{"id": 1, "question": "What does the planner agent do?", "expect_contains": ["planner", "steps"]}

{"id": "refund", "question": "What is the refund policy?", "expect_abstain": true, "notes": "not in corpus"}
{"id": "fruit", "question": "What does the planner agent eat?", "expect_contains": ["bananas"]}
"#;

fn runner() -> EvalRunner {
    let generator = Arc::new(ScriptedGenerator::from_fn(|messages| {
        Ok(Generation::text(match role_of(messages) {
            Role::Planner => r#"{"steps":["Retrieve docs","Answer"]}"#,
            Role::Critic => "PASS",
            Role::Rewrite => "refund policy",
            Role::Answer => "The planner agent splits a question into retrieval steps [plan:0].",
        }))
    }));
    let qa = Arc::new(QaWorkflow::new(RetrievalSelector::new(handbook()), generator.clone()));
    EvalRunner::new(Arc::new(MultiAgentWorkflow::new(qa, generator, memory())))
}

#[tokio::test]
async fn test_eval_run_reports_each_case() {
    let dir = TempDir::new().unwrap();
    let cases_path = dir.path().join("cases.jsonl");
    fs::write(&cases_path, CASES).unwrap();

    let cases = load_cases(&cases_path).unwrap();
    assert_eq!(cases.len(), 3);
    assert_eq!(cases[0].id, "1");
    assert_eq!(cases[0].user_id, "u_eval");

    let mut seen = Vec::new();
    let summary = runner()
        .run_all(&cases, |case, result| seen.push((case.id.clone(), result.passed)))
        .await
        .unwrap();

    assert_eq!(
        seen,
        vec![
            ("1".to_string(), true),
            ("refund".to_string(), true),
            ("fruit".to_string(), false)
        ]
    );
    assert_eq!(summary.passed(), 2);
    assert_eq!(summary.total(), 3);
    assert_eq!(summary.exit_code(), 1);

    let refund = &summary.results[1];
    assert!(refund.abstained);
    assert_eq!(refund.retrieved, 0);

    let fruit = &summary.results[2];
    assert_eq!(fruit.fail_reasons, vec!["missing_expected_terms:['bananas']"]);
    assert!(fruit.grounding_score.unwrap() > 0.12);

    let report_path = dir.path().join("out/report.json");
    summary.write_report(&report_path).unwrap();
    let report: serde_json::Value = serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report.as_array().unwrap().len(), 3);
    assert_eq!(report[2]["case_id"], "fruit");
}

#[tokio::test]
async fn test_missing_case_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    assert!(load_cases(dir.path().join("absent.jsonl")).is_err());
}
