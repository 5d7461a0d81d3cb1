//! Integration tests for loading, frequency derivation, and the report runner.

use approx::assert_relative_eq;
use cellfreq::pipeline::report::{COMPARISON_FILE, FREQUENCY_FILE, PLOT_FILE};
use cellfreq::prelude::*;
use cellfreq::store::Table;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

const HEADER: &str = "project,subject,condition,age,sex,treatment,response,sample,sample_type,time_from_treatment_start,b_cell,cd8_t_cell,cd4_t_cell,nk_cell,monocyte";

fn write_csv(rows: &[String]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    for row in rows {
        writeln!(file, "{}", row).unwrap();
    }
    file.flush().unwrap();
    file
}

#[allow(clippy::too_many_arguments)]
fn row(
    subject: &str,
    condition: &str,
    treatment: &str,
    response: &str,
    sample: &str,
    sample_type: &str,
    time: i64,
    counts: [u64; 5],
) -> String {
    let sex = if subject.len() % 2 == 0 { "F" } else { "M" };
    format!(
        "prj1,{},{},55,{},{},{},{},{},{},{},{},{},{},{}",
        subject,
        condition,
        sex,
        treatment,
        response,
        sample,
        sample_type,
        time,
        counts[0],
        counts[1],
        counts[2],
        counts[3],
        counts[4]
    )
}

/// Melanoma PBMC samples on miraclib where responders carry more b cells.
fn trial_rows() -> Vec<String> {
    let mut rows = Vec::new();
    for i in 0..6 {
        let b = 200 + 10 * i;
        rows.push(row(
            &format!("sbj{}", i),
            "melanoma",
            "miraclib",
            "yes",
            &format!("y{}", i),
            "PBMC",
            0,
            [b, 150, 300, 100, 250],
        ));
    }
    for i in 0..6 {
        let b = 50 + 10 * i;
        rows.push(row(
            &format!("sbj{}", 10 + i),
            "melanoma",
            "miraclib",
            "no",
            &format!("n{}", i),
            "PBMC",
            0,
            [b, 150, 300, 100, 250],
        ));
    }
    // Outside the cohort
    rows.push(row("sbj90", "carcinoma", "miraclib", "no", "x1", "PBMC", 0, [1, 1, 1, 1, 1]));
    rows.push(row("sbj91", "melanoma", "phauximab", "yes", "x2", "PBMC", 0, [1, 1, 1, 1, 1]));
    rows.push(row("sbj0", "melanoma", "miraclib", "yes", "x3", "WB", 0, [1, 1, 1, 1, 1]));
    rows
}

fn open_loaded(path: &Path) -> Store {
    let mut store = Store::open_in_memory().unwrap();
    create_schema(&store).unwrap();
    load_file(&mut store, path).unwrap();
    store
}

#[test]
fn test_percentages_and_cohort_average() {
    let csv = write_csv(&[
        row("sbj1", "melanoma", "miraclib", "yes", "s1", "PBMC", 0, [80, 20, 0, 0, 0]),
        row("sbj2", "melanoma", "miraclib", "yes", "s2", "PBMC", 0, [40, 60, 0, 0, 0]),
    ]);
    let mut store = open_loaded(csv.path());
    build_frequency_summary(&mut store, ZeroTotalPolicy::Null).unwrap();

    let rows = read_frequency_summary(&store).unwrap();
    assert_eq!(rows.len(), 10);
    let pct = |sample: &str, population: &str| {
        rows.iter()
            .find(|r| r.sample == sample && r.population == population)
            .and_then(|r| r.percentage)
            .unwrap()
    };
    assert_relative_eq!(pct("s1", "b_cell"), 80.0);
    assert_relative_eq!(pct("s1", "cd8_t_cell"), 20.0);
    assert_relative_eq!(pct("s2", "b_cell"), 40.0);
    assert_relative_eq!(pct("s2", "cd8_t_cell"), 60.0);
    assert!(rows.iter().all(|r| r.total_count == 100));

    let averages = CohortFilter::default().response_averages(&store).unwrap();
    let b_cell = averages.iter().find(|a| a.population == "b_cell").unwrap();
    assert_eq!(b_cell.response, "yes");
    assert_relative_eq!(b_cell.avg_percentage, 60.0);
}

#[test]
fn test_reload_is_idempotent() {
    let csv = write_csv(&trial_rows());
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("trial.db");

    let mut store = Store::open(&db).unwrap();
    create_schema(&store).unwrap();
    let first = load_file(&mut store, csv.path()).unwrap();
    let counts_after_first = store.row_count(Table::CellCounts).unwrap();
    store.close().unwrap();

    let mut store = Store::open(&db).unwrap();
    create_schema(&store).unwrap();
    let second = load_file(&mut store, csv.path()).unwrap();

    assert_eq!(first.records, 15);
    // sbj0 appears twice in the file
    assert_eq!(first.subjects_inserted, 14);
    assert_eq!(first.samples_inserted, 15);
    assert_eq!(first.counts_inserted, 75);
    assert_eq!(second.subjects_inserted, 0);
    assert_eq!(second.samples_inserted, 0);
    assert_eq!(second.counts_inserted, 0);
    assert_eq!(store.row_count(Table::CellCounts).unwrap(), counts_after_first);
}

#[test]
fn test_cohort_excludes_non_matching() {
    let csv = write_csv(&trial_rows());
    let mut store = open_loaded(csv.path());
    build_frequency_summary(&mut store, ZeroTotalPolicy::Null).unwrap();

    let filter = CohortFilter::default();
    let members = filter.members(&store).unwrap();
    assert_eq!(members.len(), 12);
    assert!(members.iter().all(|m| !m.sample.starts_with('x')));

    let points = filter.plot_points(&store).unwrap();
    assert_eq!(points.len(), 12 * CellType::ALL.len());
    assert!(points.iter().all(|p| !p.sample.starts_with('x')));

    let summary = filter.summary(&store).unwrap();
    let per_response: Vec<(&str, u64)> = summary
        .subjects_per_response
        .iter()
        .map(|g| (g.group.as_str(), g.count))
        .collect();
    assert_eq!(per_response, vec![("no", 6), ("yes", 6)]);
}

#[test]
fn test_zero_total_sample() {
    let csv = write_csv(&[
        row("sbj1", "melanoma", "miraclib", "yes", "s1", "PBMC", 0, [0, 0, 0, 0, 0]),
        row("sbj2", "melanoma", "miraclib", "no", "s2", "PBMC", 0, [10, 30, 20, 20, 20]),
    ]);
    let mut store = open_loaded(csv.path());

    let build = build_frequency_summary(&mut store, ZeroTotalPolicy::Null).unwrap();
    assert_eq!(build.zero_total_samples, vec!["s1".to_string()]);

    let rows = read_frequency_summary(&store).unwrap();
    assert_eq!(rows.len(), 10);
    assert!(rows
        .iter()
        .filter(|r| r.sample == "s1")
        .all(|r| r.percentage.is_none()));

    let points = CohortFilter::default().plot_points(&store).unwrap();
    assert!(points.iter().all(|p| p.sample == "s2"));

    let strict = rebuild_frequency_summary(&mut store, ZeroTotalPolicy::Error);
    assert!(matches!(strict, Err(FreqError::ZeroTotal(_))));
    // The failed rebuild leaves the previous table in place
    assert_eq!(read_frequency_summary(&store).unwrap().len(), 10);
}

#[test]
fn test_full_report() {
    let csv = write_csv(&trial_rows());
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("trial.db");
    let out = dir.path().join("report");

    let report = Pipeline::new()
        .database(&db)
        .input(csv.path())
        .run()
        .unwrap();

    let load = report.load.as_ref().unwrap();
    assert_eq!(load.records, 15);
    assert_eq!(report.frequencies.len(), 15 * CellType::ALL.len());

    let order: Vec<&str> = report
        .comparison
        .results
        .iter()
        .map(|r| r.population.as_str())
        .collect();
    let expected: Vec<&str> = CellType::ALL.iter().map(|c| c.name()).collect();
    assert_eq!(order, expected);

    // Responders have more b cells in every sample
    let b_cell = report.comparison.get("b_cell").unwrap();
    assert_eq!(b_cell.n_yes, 6);
    assert_eq!(b_cell.n_no, 6);
    assert!(b_cell.median_yes > b_cell.median_no);
    assert_relative_eq!(b_cell.adjusted_p, (b_cell.p_value * 5.0).min(1.0), epsilon = 1e-12);
    assert!(b_cell.significant);

    for r in &report.comparison.results {
        assert!(r.adjusted_p >= r.p_value);
        assert!(r.adjusted_p <= 1.0);
    }

    report.write_dir(&out).unwrap();
    assert!(out.join(FREQUENCY_FILE).exists());
    assert!(out.join(COMPARISON_FILE).exists());
    let svg = std::fs::read_to_string(out.join(PLOT_FILE)).unwrap();
    assert!(svg.contains("<svg"));

    let comparison_tsv = std::fs::read_to_string(out.join(COMPARISON_FILE)).unwrap();
    assert_eq!(comparison_tsv.lines().count(), 1 + CellType::ALL.len());
    assert!(comparison_tsv.lines().nth(1).unwrap().starts_with("b_cell\t"));
}

#[test]
fn test_report_from_yaml_config() {
    let csv = write_csv(&trial_rows());
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("trial.db");

    let config = ReportConfig {
        database: db.clone(),
        input: Some(csv.path().to_path_buf()),
        ..Default::default()
    };
    let config_path = dir.path().join("report.yaml");
    std::fs::write(&config_path, config.to_yaml().unwrap()).unwrap();

    let loaded = ReportConfig::from_file(&config_path).unwrap();
    assert_eq!(loaded, config);

    let first = Pipeline::from_config(&loaded).run().unwrap();
    // Second run reloads the same file into the same database
    let second = Pipeline::from_config(&loaded).run().unwrap();

    assert_eq!(second.load.as_ref().unwrap().counts_inserted, 0);
    assert_eq!(first.frequencies, second.frequencies);
    assert_eq!(first.comparison.len(), second.comparison.len());
}

#[test]
fn test_clear_removes_tables() {
    let csv = write_csv(&trial_rows());
    let mut store = open_loaded(csv.path());
    build_frequency_summary(&mut store, ZeroTotalPolicy::Null).unwrap();

    clear(&store).unwrap();

    assert!(!store.table_exists(Table::Subjects).unwrap());
    assert!(!store.table_exists(Table::FrequencySummary).unwrap());
    assert!(matches!(
        read_frequency_summary(&store),
        Err(FreqError::MissingTable(_))
    ));
}
