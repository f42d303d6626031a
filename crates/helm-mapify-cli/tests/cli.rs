use std::path::Path;

use assert_cmd::Command;
use clap::Parser;
use color_eyre::eyre;
use helm_mapify_cli::{Cli, Color, Command as CliCommand, OutputFormat};
use indoc::indoc;
use predicates::prelude::*;

const VALUES: &str = indoc! {r"
    env:
      - name: DB_HOST
        value: localhost
"};

const DEPLOYMENT: &str = indoc! {r"
    apiVersion: apps/v1
    kind: Deployment
    metadata:
      name: app
    spec:
      template:
        spec:
          containers:
            - name: app
              env:
                {{- toYaml .Values.env | nindent 12 }}
"};

const CRD: &str = indoc! {r"
    apiVersion: apiextensions.k8s.io/v1
    kind: CustomResourceDefinition
    spec:
      group: example.com
      names:
        kind: Widget
        plural: widgets
      versions:
        - name: v1
          storage: true
          schema:
            openAPIV3Schema:
              type: object
"};

fn write_chart(dir: &Path) -> eyre::Result<()> {
    std::fs::create_dir_all(dir.join("templates"))?;
    std::fs::write(dir.join("Chart.yaml"), "apiVersion: v2\nname: app\n")?;
    std::fs::write(dir.join("values.yaml"), VALUES)?;
    std::fs::write(dir.join("templates/deployment.yaml"), DEPLOYMENT)?;
    Ok(())
}

fn helm_mapify(config_dir: &Path) -> eyre::Result<Command> {
    let mut cmd = Command::cargo_bin("helm-mapify")?;
    cmd.env_remove("RUST_LOG")
        .env_remove("HELM_MAPIFY_CONFIG_DIR")
        .arg("--color")
        .arg("never")
        .arg("--config-dir")
        .arg(config_dir);
    Ok(cmd)
}

#[test]
fn cli_parses_defaults() -> eyre::Result<()> {
    let cli = Cli::try_parse_from(["helm-mapify", "convert"]).map_err(|e| eyre::eyre!(e))?;
    assert_eq!(cli.global.color, Color::Auto);
    let CliCommand::Convert(args) = cli.command else {
        eyre::bail!("expected convert");
    };
    assert_eq!(args.chart.chart_dir, Path::new("."));
    assert_eq!(args.chart.output, OutputFormat::Text);
    assert_eq!(args.backup_suffix, ".bak");
    assert!(!args.dry_run);
    assert!(!args.recursive);
    assert!(!args.no_embedded);
    assert!(!args.expand_archived);
    assert!(!args.no_archived);

    let cli = Cli::try_parse_from(["helm-mapify", "convert", "--no-embedded"])
        .map_err(|e| eyre::eyre!(e))?;
    let CliCommand::Convert(args) = cli.command else {
        eyre::bail!("expected convert");
    };
    assert!(args.no_embedded);
    assert!(!args.no_archived);
    Ok(())
}

#[test]
fn rules_add_requires_a_key() {
    assert!(Cli::try_parse_from(["helm-mapify", "rules", "add", "env"]).is_err());
}

#[test]
fn detect_prints_json_report() -> eyre::Result<()> {
    let dir = tempfile::tempdir()?;
    let chart = dir.path().join("app");
    write_chart(&chart)?;

    let out = helm_mapify(&dir.path().join("config"))?
        .arg("detect")
        .arg(&chart)
        .arg("--output")
        .arg("json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: serde_json::Value = serde_json::from_slice(&out)?;
    assert_eq!(report["chart"], "app");
    assert_eq!(report["candidates"][0]["values_path"], "env");
    assert_eq!(report["candidates"][0]["merge_key"], "name");
    assert_eq!(std::fs::read_to_string(chart.join("values.yaml"))?, VALUES);
    Ok(())
}

#[test]
fn convert_writes_backups() -> eyre::Result<()> {
    let dir = tempfile::tempdir()?;
    let chart = dir.path().join("app");
    write_chart(&chart)?;

    helm_mapify(&dir.path().join("config"))?
        .arg("convert")
        .arg(&chart)
        .arg("--backup-suffix")
        .arg(".orig")
        .assert()
        .success()
        .stdout(predicate::str::contains("env  key=name"));

    assert_eq!(
        std::fs::read_to_string(chart.join("values.yaml"))?,
        "env:\n  DB_HOST:\n    value: localhost\n"
    );
    assert_eq!(std::fs::read_to_string(chart.join("values.yaml.orig"))?, VALUES);
    assert!(chart.join("templates/_helm-mapify.tpl").is_file());
    Ok(())
}

#[test]
fn dry_run_leaves_the_chart_untouched() -> eyre::Result<()> {
    let dir = tempfile::tempdir()?;
    let chart = dir.path().join("app");
    write_chart(&chart)?;

    helm_mapify(&dir.path().join("config"))?
        .arg("convert")
        .arg("--dry-run")
        .arg(&chart)
        .assert()
        .success()
        .stdout(predicate::str::contains("would write:"));

    assert_eq!(std::fs::read_to_string(chart.join("values.yaml"))?, VALUES);
    assert!(!chart.join("values.yaml.bak").exists());
    Ok(())
}

#[test]
fn missing_chart_directory_fails() -> eyre::Result<()> {
    let dir = tempfile::tempdir()?;
    helm_mapify(&dir.path().join("config"))?
        .arg("detect")
        .arg(dir.path().join("nowhere"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
    Ok(())
}

#[test]
fn rules_are_stored_and_listed() -> eyre::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("config");

    for _ in 0..2 {
        helm_mapify(&config)?
            .args(["rules", "add", "*.extraEnv", "--key", "name"])
            .assert()
            .success();
    }
    helm_mapify(&config)?
        .args(["rules", "list"])
        .assert()
        .success()
        .stdout(predicate::eq("*.extraEnv[]  key=name\n"));
    Ok(())
}

#[test]
fn stored_rules_drive_conversion() -> eyre::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("config");
    let chart = dir.path().join("app");
    write_chart(&chart)?;
    std::fs::write(
        chart.join("values.yaml"),
        "tolerations:\n  - key: gpu\n    operator: Exists\n",
    )?;
    std::fs::write(
        chart.join("templates/deployment.yaml"),
        indoc! {r"
            apiVersion: apps/v1
            kind: Deployment
            spec:
              template:
                spec:
                  tolerations:
                    {{- toYaml .Values.tolerations | nindent 8 }}
        "},
    )?;

    helm_mapify(&config)?
        .args(["rules", "add", "tolerations", "--key", "key"])
        .assert()
        .success();
    helm_mapify(&config)?
        .arg("convert")
        .arg(&chart)
        .assert()
        .success();

    assert_eq!(
        std::fs::read_to_string(chart.join("values.yaml"))?,
        "tolerations:\n  gpu:\n    operator: Exists\n"
    );
    Ok(())
}

#[test]
fn schemas_are_loaded_and_listed() -> eyre::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("config");
    let crd = dir.path().join("widget.yaml");
    std::fs::write(&crd, CRD)?;

    helm_mapify(&config)?
        .args(["schema", "load"])
        .arg(&crd)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("stored "));
    assert!(config.join("schemas/example.com_widgets_v1.yaml").is_file());

    helm_mapify(&config)?
        .args(["schema", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("example.com/v1"));

    helm_mapify(&config)?
        .args(["schema", "load"])
        .arg(dir.path().join("missing.yaml"))
        .assert()
        .failure();
    Ok(())
}
