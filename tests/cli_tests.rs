use assert_cmd::prelude::*;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn normal_generation_writes_a_capture_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    let mut cmd = Command::cargo_bin("flowsmith")?;
    cmd.arg("normal")
        .arg("-n")
        .arg("3")
        .arg("-i")
        .arg("0")
        .arg("-p")
        .arg("ICMP")
        .arg("-s")
        .arg("0")
        .arg("-o")
        .arg(dir.path());
    let output = cmd.assert().success();

    // one JSON feature line per synthesized flow
    let stdout = String::from_utf8(output.get_output().stdout.clone())?;
    let lines: Vec<_> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    for line in lines {
        let summary: serde_json::Value = serde_json::from_str(line)?;
        assert_eq!(summary["protocol"], "ICMP");
        assert_eq!(summary["packet_count"], 2);
    }

    // 3 flows of 2 packets stay below the default threshold, so exactly one
    // forced flush happens at the end
    let captures: Vec<_> = std::fs::read_dir(dir.path())?
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(captures.len(), 1);
    assert!(captures[0]
        .file_name()
        .unwrap()
        .to_string_lossy()
        .ends_with(".pcap"));
    Ok(())
}

#[test]
fn no_save_suppresses_capture_files() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    let mut cmd = Command::cargo_bin("flowsmith")?;
    cmd.arg("flood-scan")
        .arg("-n")
        .arg("5")
        .arg("-i")
        .arg("0")
        .arg("-o")
        .arg(dir.path())
        .arg("--no-save");
    cmd.assert().success();

    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}
