//! Invokes the legacy Python CLI and captures its `--json-output`.

use std::path::PathBuf;

use tokio::process::Command;

use crate::ShadowError;

pub struct PythonRunner {
    pub python_path: String,
    pub fixtures_dir: PathBuf,
}

impl PythonRunner {
    pub fn new(python_path: impl Into<String>, fixtures_dir: impl Into<PathBuf>) -> Self {
        Self { python_path: python_path.into(), fixtures_dir: fixtures_dir.into() }
    }

    pub async fn run(&self, service: &str, delta: f64) -> Result<String, ShadowError> {
        let fixtures = self.fixtures_dir.display().to_string();
        let delta_arg = format!("{delta:.0}");
        let args = [
            "-m",
            "finops_desk.cli",
            "--fixtures",
            &fixtures,
            "--service",
            service,
            "--delta",
            &delta_arg,
            "--json-output",
        ];

        let output = Command::new(&self.python_path)
            .args(args)
            .output()
            .await
            .map_err(|err| ShadowError::Python(format!("spawn {}: {err}", self.python_path)))?;

        if !output.status.success() {
            return Err(ShadowError::Python(format!(
                "exited with {} (stderr: {})",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|err| ShadowError::Python(format!("non-utf8 output: {err}")))
    }
}
