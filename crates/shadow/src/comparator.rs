//! Phase-by-phase comparison of two pipeline outputs. Both sides emit the
//! same top-level keys ({"triage", "analysis", "approval"}); each phase is
//! normalized to pretty-printed JSON before comparing so key order and
//! whitespace never produce false divergence.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ShadowError;

/// Top-level output of a shadow-run comparison.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub phases: Vec<PhaseComparison>,
    pub all_match: bool,
    pub summary: String,
}

/// Comparison record for a single pipeline phase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseComparison {
    pub phase: String,
    pub native_output: String,
    pub python_output: String,
    #[serde(rename = "match")]
    pub matches: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub diff_lines: String,
}

const PHASES: [&str; 3] = ["triage", "analysis", "approval"];

/// Compares native and Python pipeline outputs phase by phase.
pub fn compare(native_json: &str, python_json: &str) -> Result<ComparisonResult, ShadowError> {
    let native: Value = serde_json::from_str(native_json)
        .map_err(|err| ShadowError::Parse { side: "native", message: err.to_string() })?;
    let python: Value = serde_json::from_str(python_json)
        .map_err(|err| ShadowError::Parse { side: "python", message: err.to_string() })?;

    let mut phases = Vec::with_capacity(PHASES.len());
    let mut all_match = true;

    for phase in PHASES {
        let native_val = pretty_phase(&native, phase);
        let python_val = pretty_phase(&python, phase);

        let matches = native_val == python_val;
        if !matches {
            all_match = false;
        }

        let diff_lines =
            if matches { String::new() } else { simple_diff(&native_val, &python_val) };
        phases.push(PhaseComparison {
            phase: phase.to_string(),
            native_output: native_val,
            python_output: python_val,
            matches,
            diff_lines,
        });
    }

    let summary = if all_match {
        "all phases match".to_string()
    } else {
        let divergent: Vec<&str> = phases
            .iter()
            .filter(|comparison| !comparison.matches)
            .map(|comparison| comparison.phase.as_str())
            .collect();
        format!("divergence in: {}", divergent.join(", "))
    };

    Ok(ComparisonResult { phases, all_match, summary })
}

fn pretty_phase(output: &Value, phase: &str) -> String {
    let value = output.get(phase).unwrap_or(&Value::Null);
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

/// Basic line-by-line diff indicator.
fn simple_diff(native: &str, python: &str) -> String {
    let native_lines: Vec<&str> = native.lines().collect();
    let python_lines: Vec<&str> = python.lines().collect();
    let mut diffs = Vec::new();

    for i in 0..native_lines.len().max(python_lines.len()) {
        let native_line = native_lines.get(i).copied().unwrap_or("");
        let python_line = python_lines.get(i).copied().unwrap_or("");
        if native_line != python_line {
            diffs.push(format!(
                "line {}:\n  native: {}\n  python: {}",
                i + 1,
                native_line,
                python_line
            ));
        }
    }
    diffs.join("\n")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::compare;
    use crate::ShadowError;

    fn output(approval_status: &str) -> String {
        json!({
            "triage": {"category": "data_transfer", "confidence": 0.85},
            "analysis": {"recommended_actions": [{"action_type": "create_budget_alert"}]},
            "approval": {"status": approval_status, "details": "auto-approved; max risk=low"},
        })
        .to_string()
    }

    #[test]
    fn identical_outputs_match_on_all_phases() {
        let result = compare(&output("auto_approved"), &output("auto_approved"))
            .expect("comparison should succeed");

        assert!(result.all_match);
        assert_eq!(result.summary, "all phases match");
        assert_eq!(result.phases.len(), 3);
        assert!(result.phases.iter().all(|phase| phase.matches));
        assert!(result.phases.iter().all(|phase| phase.diff_lines.is_empty()));
    }

    #[test]
    fn divergent_phase_is_named_with_diff_lines() {
        let result = compare(&output("auto_approved"), &output("pending"))
            .expect("comparison should succeed");

        assert!(!result.all_match);
        assert_eq!(result.summary, "divergence in: approval");

        let approval =
            result.phases.iter().find(|phase| phase.phase == "approval").expect("approval");
        assert!(!approval.matches);
        assert!(approval.diff_lines.contains("native:"));
        assert!(approval.diff_lines.contains("python:"));

        let triage = result.phases.iter().find(|phase| phase.phase == "triage").expect("triage");
        assert!(triage.matches);
    }

    #[test]
    fn key_order_does_not_cause_false_divergence() {
        let left = r#"{"triage": {"a": 1, "b": 2}, "analysis": null, "approval": null}"#;
        let right = r#"{"approval": null, "analysis": null, "triage": {"b": 2, "a": 1}}"#;

        let result = compare(left, right).expect("comparison should succeed");
        assert!(result.all_match);
    }

    #[test]
    fn missing_phase_compares_as_null() {
        let left = r#"{"triage": {"category": "unknown"}}"#;
        let right = r#"{"triage": {"category": "unknown"}}"#;

        let result = compare(left, right).expect("comparison should succeed");
        assert!(result.all_match);
        let analysis =
            result.phases.iter().find(|phase| phase.phase == "analysis").expect("analysis");
        assert_eq!(analysis.native_output, "null");
    }

    #[test]
    fn unparseable_output_names_the_side() {
        let error = compare("not json", &output("pending")).expect_err("must fail");
        assert!(matches!(error, ShadowError::Parse { side: "native", .. }));

        let error = compare(&output("pending"), "not json").expect_err("must fail");
        assert!(matches!(error, ShadowError::Parse { side: "python", .. }));
    }
}
