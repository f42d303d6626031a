use color_eyre::eyre;
use flate2::Compression;
use flate2::write::GzEncoder;
use helm_mapify_chart::archive::{self, is_archive};
use helm_mapify_chart::{Chart, ChartError, LinkKind, LinkOptions, SubchartLink, collect_links};
use indoc::indoc;
use test_util::prelude::*;
use vfs::VfsPath;

fn tgz(files: &[(&str, &str)]) -> eyre::Result<Vec<u8>> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, data.as_bytes())?;
    }
    Ok(builder.into_inner()?.finish()?)
}

fn parent_chart(root: &VfsPath) -> eyre::Result<Chart> {
    write(
        &root.join("app/Chart.yaml")?,
        indoc! {r"
            apiVersion: v2
            name: app
            version: 1.0.0
            dependencies:
              - name: worker
                repository: file://charts/worker
                alias: jobs
              - name: common
                repository: file://../common
              - name: gone
                repository: file://../gone
              - name: redis
                repository: https://charts.example.com
                alias: cache
        "},
    )?;
    write(&root.join("app/charts/worker/Chart.yaml")?, "name: worker\n")?;
    write(&root.join("app/charts/metrics/Chart.yaml")?, "name: metrics\n")?;
    write(&root.join("common/Chart.yaml")?, "name: common\n")?;
    write(
        &root.join("app/charts/redis-1.0.0.tgz")?,
        tgz(&[
            ("redis/Chart.yaml", "name: redis\nversion: 1.0.0\n"),
            ("redis/values.yaml", "env: []\n"),
        ])?,
    )?;
    Ok(Chart::load(&root.join("app")?)?)
}

fn summary(links: &[SubchartLink]) -> Vec<(String, String, Vec<LinkKind>)> {
    links
        .iter()
        .map(|l| (l.name.clone(), l.prefix.clone(), l.kinds.clone()))
        .collect()
}

#[test]
fn links_are_deduplicated_by_path() -> eyre::Result<()> {
    Builder::default().build();
    let root = memory_root();
    let chart = parent_chart(&root)?;
    let links = collect_links(&chart, LinkOptions::default())?;
    sim_assert_eq!(
        summary(&links),
        vec![
            ("metrics".to_string(), "metrics".to_string(), vec![LinkKind::Embedded]),
            (
                "worker".to_string(),
                "jobs".to_string(),
                vec![LinkKind::Embedded, LinkKind::Relative]
            ),
            ("common".to_string(), "common".to_string(), vec![LinkKind::Relative]),
            ("redis".to_string(), "cache".to_string(), vec![LinkKind::Archived]),
        ]
    );
    assert!(links[1].resolved_via_both());
    assert_that!(links[2].path.as_str(), eq("/common"));
    Ok(())
}

#[test]
fn link_kinds_can_be_disabled() -> eyre::Result<()> {
    Builder::default().build();
    let root = memory_root();
    let chart = parent_chart(&root)?;
    let options = LinkOptions {
        embedded: false,
        linked: true,
        archived: false,
    };
    let names: Vec<String> = collect_links(&chart, options)?
        .into_iter()
        .map(|l| l.name)
        .collect();
    assert_that!(names, elements_are![eq("worker"), eq("common")]);
    Ok(())
}

#[test]
fn archives_expand_next_to_their_backup() -> eyre::Result<()> {
    Builder::default().build();
    let root = memory_root();
    let chart = parent_chart(&root)?;
    let archive_path = chart.dir.join("charts/redis-1.0.0.tgz")?;
    assert!(is_archive(&archive_path));

    let expanded = archive::expand(&archive_path, ".bak")?;
    assert_that!(expanded.as_str(), eq("/app/charts/redis"));
    assert!(expanded.join("values.yaml")?.is_file()?);
    assert!(!archive_path.exists()?);
    assert!(chart.dir.join("charts/redis-1.0.0.tgz.bak")?.is_file()?);

    let links = collect_links(&chart, LinkOptions::default())?;
    let redis: Vec<&SubchartLink> = links.iter().filter(|l| l.name == "redis").collect();
    assert_that!(redis, len(eq(1)));
    assert_that!(redis[0].kinds, elements_are![eq(&LinkKind::Embedded)]);
    assert_that!(redis[0].prefix, eq("cache"));
    Ok(())
}

#[test]
fn expanding_onto_an_existing_directory_fails() -> eyre::Result<()> {
    Builder::default().build();
    let root = memory_root();
    let chart = parent_chart(&root)?;
    write(&chart.dir.join("charts/redis/Chart.yaml")?, "name: redis\n")?;
    let archive_path = chart.dir.join("charts/redis-1.0.0.tgz")?;
    let err = archive::expand(&archive_path, ".bak");
    assert!(matches!(err, Err(ChartError::ExpandTargetExists { .. })));
    assert!(archive_path.is_file()?);
    Ok(())
}

#[test]
fn archive_without_chart_is_rejected() -> eyre::Result<()> {
    Builder::default().build();
    let root = memory_root();
    let path = write(
        &root.join("charts/junk.tgz")?,
        tgz(&[("readme.txt", "hello")])?,
    )?;
    let err = archive::probe(&path);
    assert!(matches!(err, Err(ChartError::NoChartYamlInArchive { .. })));
    Ok(())
}

#[test]
fn template_listing() -> eyre::Result<()> {
    Builder::default().build();
    let root = memory_root();
    write(&root.join("Chart.yaml")?, "name: app\n")?;
    for file in [
        "templates/deployment.yaml",
        "templates/_helpers.tpl",
        "templates/_partial.yaml",
        "templates/NOTES.txt",
        "templates/tests/test-connection.yaml",
    ] {
        write(&root.join(file)?, "")?;
    }
    let chart = Chart::load(&root)?;
    let rel = |paths: Vec<VfsPath>| -> Vec<String> {
        paths.iter().map(|p| chart.relative(p)).collect()
    };
    assert_that!(
        rel(chart.template_sources()?),
        elements_are![
            eq("templates/_helpers.tpl"),
            eq("templates/_partial.yaml"),
            eq("templates/deployment.yaml"),
            eq("templates/tests/test-connection.yaml"),
        ]
    );
    assert_that!(
        rel(chart.manifest_templates()?),
        elements_are![
            eq("templates/deployment.yaml"),
            eq("templates/tests/test-connection.yaml"),
        ]
    );
    Ok(())
}

#[test]
fn missing_chart_yaml_is_an_error() {
    Builder::default().build();
    let root = memory_root();
    assert!(matches!(
        Chart::load(&root),
        Err(ChartError::MissingChartYaml { .. })
    ));
}
