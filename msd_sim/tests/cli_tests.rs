use std::process::{Command, Output};

fn msd_sim(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_msd-sim"))
        .args([
            "--dcult",
            "3",
            "--dm",
            "7",
            "--psucc-cult",
            "0.5",
            "--t-cult",
            "8",
            "--psucc-growing",
            "0.8",
            "--seed",
            "1",
        ])
        .args(args)
        .output()
        .expect("run msd-sim")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is a single JSON document")
}

#[test]
fn test_json_sweep_output_is_pure_json() {
    let output = msd_sim(&["-n", "100", "--sweep-nm", "1,2", "--json"]);
    let value = stdout_json(&output);

    assert_eq!(value["base_seed"], 1);
    assert_eq!(value["results"].as_array().map(Vec::len), Some(2));
}

#[test]
fn test_json_output_survives_verbose_logging() {
    let output = msd_sim(&["-n", "20", "--json", "--verbose"]);
    let value = stdout_json(&output);

    assert_eq!(value["results"][0]["summary"]["idle_count"], 40);
    assert!(!output.stderr.is_empty());
}

#[test]
fn test_json_samples_report_seed() {
    let output = msd_sim(&["-n", "30", "--all", "--json"]);
    let value = stdout_json(&output);

    assert_eq!(value["kind"], "samples");
    assert_eq!(value["seed"], 1);
    assert_eq!(value["idle_times"].as_array().map(Vec::len), Some(60));
}

#[test]
fn test_invalid_config_exits_with_failure() {
    let output = Command::new(env!("CARGO_BIN_EXE_msd-sim"))
        .args(["--dcult", "3", "--dm", "7", "--psucc-cult", "0.5", "--t-cult", "8"])
        .output()
        .expect("run msd-sim");

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}
