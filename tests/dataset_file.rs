//! Record files through the whole pipeline

mod common;

use std::io::Write;

use common::{assert_close_f64, create_cpu_client};
use ordstat::dataset::{Dataset, DatasetSource, Scale};
use ordstat::pipeline::{Pipeline, PipelineConfig};
use ordstat::report::Summary;
use ordstat::runtime::cpu::CpuRuntime;

const RECORDS: &str = "\
CRANWELL 2011 1 1 0000 0.9
CRANWELL 2011 1 1 0100 6.3
CRANWELL 2011 1 1 0200 1.6
CRANWELL 2011 1 1 0300 2.2
CRANWELL 2011 1 1 0400 4.5
CRANWELL 2011 1 1 0500 1.8
CRANWELL 2011 1 1 0600 10.0
CRANWELL 2011 1 1 0700 0.1
CRANWELL 2011 1 1 0800 0.4
CRANWELL 2011 1 1 0900 0.7
";

fn write_records(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_file_dataset_is_scaled() {
    let file = write_records(RECORDS);
    let dataset = DatasetSource::File(file.path().to_path_buf())
        .load(Scale::DEFAULT)
        .unwrap();
    assert!(dataset.is_scaled());
    assert_eq!(dataset.values(), &[9, 63, 16, 22, 45, 18, 100, 1, 4, 7]);
}

#[test]
fn test_file_summary_in_original_units() {
    let file = write_records(RECORDS);
    let dataset = Dataset::from_file(file.path(), Scale::DEFAULT).unwrap();

    let client = create_cpu_client();
    let config = PipelineConfig::default().with_group_size(5);
    let result = Pipeline::<CpuRuntime>::new(&client, config)
        .unwrap()
        .run(&dataset)
        .unwrap();
    let summary = Summary::from_result(&result, config.scale);

    assert_close_f64(summary.min, 0.1, 0.0, 1e-12, "min");
    assert_close_f64(summary.max, 10.0, 0.0, 1e-12, "max");
    assert_close_f64(summary.mean, 2.85, 0.0, 1e-12, "mean");
    assert_close_f64(summary.median, 1.8, 0.0, 1e-12, "median");
    assert_close_f64(summary.q1, 0.7, 0.0, 1e-12, "q1");
    assert_close_f64(summary.q3, 4.5, 0.0, 1e-12, "q3");
    assert_close_f64(summary.std_dev, 3.0, 0.0, 1e-12, "std_dev");

    let text = summary.to_string();
    assert!(text.contains("Data executed: 10"));
    assert!(text.contains("Mean/Avg: 2.85"));
}

#[test]
fn test_truncated_file_keeps_leading_records() {
    let text = format!("{RECORDS}CRANWELL 2011 1 1");
    let file = write_records(&text);
    let dataset = Dataset::from_file(file.path(), Scale::DEFAULT).unwrap();
    assert_eq!(dataset.len(), 10);
}

#[test]
fn test_missing_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.txt");
    let err = Dataset::from_file(&path, Scale::DEFAULT).unwrap_err();
    assert!(err.to_string().contains("absent.txt"));
    assert!(err.code().is_none());
}
