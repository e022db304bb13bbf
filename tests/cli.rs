use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const VCF: &str = "##fileformat=VCFv4.2\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
10\t94781859\trs4244285\tG\tA\t.\tPASS\tGENE=CYP2C19;STAR=*2\n";

const OVERRIDES: &[&str] = &[
    "PORT",
    "ANALYSIS_SERVICE_URL",
    "VCF_VALIDATOR_URL",
    "ANALYSIS_TIMEOUT_MS",
    "ANALYSIS_RETRIES",
    "VALIDATOR_TIMEOUT_MS",
    "LOG_STORE_PATH",
    "STATIC_PAYLOAD_PATH",
    "UPLOAD_DIR",
];

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(root.join("patient.vcf"), VCF).unwrap();

    let config_path = config_dir.join("pharmaguard.toml");
    fs::write(
        &config_path,
        format!(
            r#"[upload]
dir = "{root}/uploads"

[storage]
log_path = "{root}/data/analysis_logs.json"
static_payload_path = "{root}/data/sample_response.json"
"#,
            root = root.display()
        ),
    )
    .unwrap();

    (tmp, config_path)
}

fn run(config: &Path, args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pharmaguard"));
    cmd.arg("--config").arg(config).args(args);
    for var in OVERRIDES {
        cmd.env_remove(var);
    }
    cmd.output().unwrap()
}

fn stdout_json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_logs_list_empty_history() {
    let (_tmp, config) = setup_test_env();
    let logs = stdout_json(&run(&config, &["logs", "list"]));
    assert_eq!(logs, serde_json::json!([]));
}

#[test]
fn test_analyze_without_engine_prints_degraded_report() {
    let (tmp, config) = setup_test_env();
    let vcf = tmp.path().join("patient.vcf");

    let report = stdout_json(&run(
        &config,
        &["analyze", vcf.to_str().unwrap(), "--drugs", "CLOPIDOGREL,WARFARIN"],
    ));
    assert_eq!(report["status"], "degraded");
    assert_eq!(report["results"].as_array().unwrap().len(), 2);
    assert!(vcf.exists(), "source file must be left in place");

    let logs = stdout_json(&run(&config, &["logs", "list", "--limit", "1"]));
    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["drug"], "WARFARIN");

    let uploads = fs::read_dir(tmp.path().join("uploads")).unwrap().count();
    assert_eq!(uploads, 0);
}

#[test]
fn test_analyze_rejects_wrong_extension() {
    let (tmp, config) = setup_test_env();
    let txt = tmp.path().join("patient.txt");
    fs::write(&txt, VCF).unwrap();

    let output = run(&config, &["analyze", txt.to_str().unwrap(), "--drugs", "WARFARIN"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("VCF_VALIDATION_ERROR"));
}

#[test]
fn test_logs_clear() {
    let (tmp, config) = setup_test_env();
    let vcf = tmp.path().join("patient.vcf");
    let output = run(&config, &["analyze", vcf.to_str().unwrap(), "--drugs", "CODEINE"]);
    assert!(output.status.success());

    let output = run(&config, &["logs", "clear"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Cleared"));

    let logs = stdout_json(&run(&config, &["logs", "list"]));
    assert_eq!(logs, serde_json::json!([]));
}
