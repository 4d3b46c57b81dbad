//! The scoring boundary: `score(features) -> (pw, uncertainty)`.
//!
//! The pipeline only sees the [`Scorer`] trait, so the fitted model can run
//! as a subprocess ([`SubprocessScorer`]), behind an RPC, or in-process.
//! Implementations must be safe to call concurrently.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::scratch::ScratchFile;
use crate::FeatureRecord;

// ---

/// Input handed to the scoring function.
///
/// Serialized with a `mode` tag. Unknown optional fields are explicit
/// `null`s so the model can apply its own imputation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScoreQuery {
    // ---
    /// Full feature record including a ZWD observation.
    Observation { features: FeatureRecord },

    /// Spatial surface query: geometry and season only, no ZWD.
    #[serde(rename_all = "camelCase")]
    Coordinates {
        latitude: f64,
        longitude: f64,
        epoch_utc: i64,
        month: u32,
        day_of_year: u32,
        hour: u32,
    },
}

/// Raw scorer answer. Validated by the caller before use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub pw_mm: f64,
    pub uncertainty_mm: f64,
}

#[derive(thiserror::Error, Debug)]
pub enum ScoreError {
    // ---
    #[error("no scoring function is configured")]
    Unavailable,

    #[error("scorer could not be started: {0}")]
    Spawn(std::io::Error),

    #[error("scorer timed out after {0:?}")]
    Timeout(Duration),

    #[error("scorer exited with {status}: {stderr}")]
    Exited { status: String, stderr: String },

    #[error("scorer returned malformed output: {0}")]
    Malformed(String),

    #[error("scorer declined to answer: {0}")]
    Declined(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, query: &ScoreQuery) -> Result<Score, ScoreError>;
}

/// A scorer that is never available. Every estimate takes the fallback path.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableScorer;

#[async_trait]
impl Scorer for UnavailableScorer {
    async fn score(&self, _query: &ScoreQuery) -> Result<Score, ScoreError> {
        Err(ScoreError::Unavailable)
    }
}

/// JSON printed by the external predictor on stdout.
#[derive(Debug, Deserialize)]
struct PredictorOutput {
    predicted_pw: Option<f64>,
    uncertainty: Option<f64>,
    method: Option<String>,
    error: Option<String>,
}

/// Runs an external predictor per query.
///
/// The query is written as JSON to a request-scoped scratch file whose path
/// is passed as the last argument. The predictor prints
/// `{"predicted_pw": .., "uncertainty": .., "method": ..}` on stdout. The
/// child is killed if it outlives `timeout`.
#[derive(Debug, Clone)]
pub struct SubprocessScorer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    scratch_dir: PathBuf,
}

impl SubprocessScorer {
    // ---
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration, scratch_dir: &Path) -> Self {
        SubprocessScorer {
            program: program.into(),
            args,
            timeout,
            scratch_dir: scratch_dir.to_path_buf(),
        }
    }

    /// Build from a command line already split into program and arguments.
    pub fn from_command(command: &[String], timeout: Duration, scratch_dir: &Path) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program.clone(), args.to_vec(), timeout, scratch_dir))
    }
}

#[async_trait]
impl Scorer for SubprocessScorer {
    async fn score(&self, query: &ScoreQuery) -> Result<Score, ScoreError> {
        // ---
        let input = serde_json::to_vec(query).map_err(|e| ScoreError::Malformed(e.to_string()))?;
        let input = ScratchFile::write(&self.scratch_dir, "score-input", ".json", &input)
            .await
            .map_err(ScoreError::Spawn)?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(input.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| ScoreError::Timeout(self.timeout))?
            .map_err(ScoreError::Spawn)?;

        if !output.status.success() {
            return Err(ScoreError::Exited {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse predictor stdout. Leading log noise before the JSON object is skipped.
fn parse_output(stdout: &str) -> Result<Score, ScoreError> {
    // ---
    let json = stdout
        .find('{')
        .map(|start| &stdout[start..])
        .ok_or_else(|| ScoreError::Malformed("no JSON object on stdout".to_string()))?;

    let out: PredictorOutput =
        serde_json::from_str(json.trim()).map_err(|e| ScoreError::Malformed(e.to_string()))?;

    if let Some(error) = out.error {
        return Err(ScoreError::Declined(error));
    }

    // The predictor labels its own degraded answers; those are not model output.
    if let Some(method) = out.method.as_deref() {
        let method = method.to_ascii_lowercase();
        if method.contains("fallback") || method.contains("approximate") {
            return Err(ScoreError::Declined(format!("predictor answered with method '{method}'")));
        }
    }

    match (out.predicted_pw, out.uncertainty) {
        (Some(pw_mm), Some(uncertainty_mm)) => Ok(Score { pw_mm, uncertainty_mm }),
        _ => Err(ScoreError::Malformed(
            "missing predicted_pw or uncertainty".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_parse_output_pretty_json_after_noise() {
        // ---
        let stdout = "Engineering features from raw data...\n{\n  \"predicted_pw\": 14.2,\n  \"uncertainty\": 0.05,\n  \"method\": \"spatial_interpolation\"\n}\n";
        let score = parse_output(stdout).unwrap();
        assert_eq!(score, Score { pw_mm: 14.2, uncertainty_mm: 0.05 });
    }

    #[test]
    fn test_parse_output_rejects_self_reported_fallback() {
        // ---
        let stdout = r#"{"predicted_pw": 2.4, "uncertainty": 0.1, "method": "fallback_calculation"}"#;
        assert!(matches!(parse_output(stdout), Err(ScoreError::Declined(_))));

        let stdout = r#"{"predicted_pw": 2.4, "uncertainty": 0.2, "method": "error_fallback", "error": "boom"}"#;
        assert!(matches!(parse_output(stdout), Err(ScoreError::Declined(_))));
    }

    #[test]
    fn test_parse_output_malformed() {
        // ---
        assert!(matches!(parse_output(""), Err(ScoreError::Malformed(_))));
        assert!(matches!(parse_output("{not json"), Err(ScoreError::Malformed(_))));
        assert!(matches!(
            parse_output(r#"{"predicted_pw": 3.0}"#),
            Err(ScoreError::Malformed(_))
        ));
    }

    #[test]
    fn test_query_serialization_marks_missing_fields() {
        // ---
        let record = FeatureRecord::new("ALGO", 1_700_000_000, 12.5).unwrap();
        let json = serde_json::to_value(ScoreQuery::Observation { features: record }).unwrap();

        assert_eq!(json["mode"], "observation");
        assert_eq!(json["features"]["zwdMillimeters"], 12.5);
        assert!(json["features"]["humidityPct"].is_null());

        let json = serde_json::to_value(ScoreQuery::Coordinates {
            latitude: 34.05,
            longitude: -118.24,
            epoch_utc: 1_700_000_000,
            month: 11,
            day_of_year: 318,
            hour: 22,
        })
        .unwrap();
        assert_eq!(json["mode"], "coordinates");
        assert_eq!(json["dayOfYear"], 318);
        assert!(json.get("zwdMillimeters").is_none());
    }

    #[tokio::test]
    async fn test_unavailable_scorer() {
        // ---
        let query = ScoreQuery::Coordinates {
            latitude: 0.0,
            longitude: 0.0,
            epoch_utc: 0,
            month: 1,
            day_of_year: 1,
            hour: 0,
        };
        assert!(matches!(UnavailableScorer.score(&query).await, Err(ScoreError::Unavailable)));
    }

    #[cfg(unix)]
    mod subprocess {
        // ---
        use super::*;

        fn query() -> ScoreQuery {
            ScoreQuery::Coordinates {
                latitude: 34.05,
                longitude: -118.24,
                epoch_utc: 1_700_000_000,
                month: 11,
                day_of_year: 318,
                hour: 22,
            }
        }

        fn sh(script: &str, timeout: Duration) -> SubprocessScorer {
            // The input path is appended after the script, so it lands in $0.
            SubprocessScorer::new(
                "sh",
                vec!["-c".to_string(), script.to_string()],
                timeout,
                &std::env::temp_dir(),
            )
        }

        #[tokio::test]
        async fn test_subprocess_reads_input_and_answers() {
            // ---
            let scorer = sh(
                r#"grep -q '"mode":"coordinates"' "$0" && echo '{"predicted_pw": 21.5, "uncertainty": 1.25, "method": "spatial_interpolation"}'"#,
                Duration::from_secs(5),
            );

            let score = scorer.score(&query()).await.unwrap();
            assert_eq!(score, Score { pw_mm: 21.5, uncertainty_mm: 1.25 });
        }

        #[tokio::test]
        async fn test_subprocess_timeout() {
            // ---
            let scorer = sh("sleep 5", Duration::from_millis(100));
            let err = scorer.score(&query()).await.unwrap_err();
            assert!(matches!(err, ScoreError::Timeout(_)));
        }

        #[tokio::test]
        async fn test_subprocess_nonzero_exit() {
            // ---
            let scorer = sh("echo model missing >&2; exit 3", Duration::from_secs(5));
            let err = scorer.score(&query()).await.unwrap_err();
            assert!(matches!(err, ScoreError::Exited { ref stderr, .. } if stderr == "model missing"));
        }

        #[tokio::test]
        async fn test_missing_program() {
            // ---
            let scorer = SubprocessScorer::new(
                "/nonexistent/predictor",
                vec![],
                Duration::from_secs(1),
                &std::env::temp_dir(),
            );
            let err = scorer.score(&query()).await.unwrap_err();
            assert!(matches!(err, ScoreError::Spawn(_)));
        }
    }
}
