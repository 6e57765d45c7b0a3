use std::process::Command;

fn run_scenario(name: &str, extra: &[&str]) -> (bool, String) {
    let path = format!("{}/scenarios/{}", env!("CARGO_MANIFEST_DIR"), name);
    let resp = Command::new(env!("CARGO_BIN_EXE_leaksim"))
        .args(["--config", path.as_str()])
        .args(extra)
        .output()
        .expect("failed to run leaksim");

    let output = String::from_utf8(resp.stdout).unwrap();
    (resp.status.success(), output)
}

/// The rows of `asn`'s table in the snapshot labelled `label`.
fn table_rows(output: &str, label: &str, asn: u32) -> Vec<String> {
    let header = format!("=== ROUTING TABLES '{}'", label);
    let snapshot = output
        .split_once(&header)
        .and_then(|(_, rest)| rest.split_once('\n'))
        .map(|(_, rest)| rest)
        .unwrap_or_else(|| panic!("missing snapshot {}", label));
    let snapshot = snapshot.split("===").next().unwrap();
    let table = format!("AS{} routing table", asn);

    snapshot
        .split_once(&table)
        .map(|(_, rest)| rest)
        .unwrap_or_else(|| panic!("missing table for AS{}", asn))
        .lines()
        .skip(1)
        .take_while(|l| l.starts_with("  "))
        .map(|l| l.trim().to_string())
        .collect()
}

#[test]
fn interas_leak_replaces_learned_route() {
    let (ok, output) = run_scenario("interas_leak.toml", &["--strict"]);

    assert!(ok, "{}", output);

    let before = table_rows(&output, "converged", 65002);
    let leaked = before
        .iter()
        .find(|r| r.starts_with("10.1.0.0/16"))
        .expect("10.1.0.0/16 missing before leak");
    assert!(leaked.contains("AS65001"), "{}", leaked);
    assert!(leaked.contains("learned"), "{}", leaked);
    assert!(leaked.ends_with("[65001]"), "{}", leaked);

    let after = table_rows(&output, "after leak", 65002);
    let leaked = after
        .iter()
        .find(|r| r.starts_with("10.1.0.0/16"))
        .expect("10.1.0.0/16 missing after leak");
    assert!(leaked.contains("installed"), "{}", leaked);
    assert!(leaked.ends_with("[65002]"), "{}", leaked);

    let a = table_rows(&output, "converged", 65001);
    assert!(a.iter().any(|r| r.starts_with("10.2.0.0/16") && r.ends_with("[65002]")));

    assert!(output.contains("route leak of 10.1.0.0/16 at AS65002"));
    assert!(output.contains("verdict: observed"));
}

#[test]
fn failover_uses_backup_static_route() {
    let (ok, output) = run_scenario("failover.toml", &["--strict"]);

    assert!(ok, "{}", output);

    let primary = table_rows(&output, "primary", 65010);
    assert!(primary
        .iter()
        .any(|r| r.starts_with("192.168.0.0/24") && r.contains("AS65020")));

    let backup = table_rows(&output, "backup", 65010);
    assert!(backup
        .iter()
        .any(|r| r.starts_with("192.168.0.0/24") && r.contains("AS65030")));
    assert!(output.contains("link failure AS65010 <-> AS65020"));
}

#[test]
fn stop_override_drops_late_events() {
    let (ok, output) = run_scenario("interas_leak.toml", &["--stop", "5"]);

    assert!(ok, "{}", output);
    assert!(output.contains("'converged'"));
    assert!(!output.contains("'after leak'"));
    assert!(!output.contains("=== FAULTS ==="));
}

#[test]
fn lookup_prints_selected_routes() {
    let (ok, output) = run_scenario(
        "interas_leak.toml",
        &["--lookup", "65002=10.1.0.0/16", "--lookup", "AS65001=10.9.0.0/16"],
    );

    assert!(ok, "{}", output);

    let lookups = output
        .split_once("=== LOOKUPS ===")
        .map(|(_, rest)| rest)
        .expect("missing lookups");
    assert!(lookups.contains("AS65002 10.1.0.0/16: 10.1.0.0/16 via AS65002 path [65002]"));
    assert!(lookups.contains("AS65001 10.9.0.0/16: Route error: No route to 10.9.0.0/16"));
    assert!(output.contains("=== SPEAKERS ==="));
}

#[test]
fn lookup_rejects_malformed_argument() {
    let (ok, _) = run_scenario("interas_leak.toml", &["--lookup", "65002"]);

    assert!(!ok);
}

#[test]
fn missing_scenario_fails() {
    let (ok, _) = run_scenario("does_not_exist.toml", &[]);

    assert!(!ok);
}
