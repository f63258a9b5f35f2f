// The @parameter_file form: line 1 = working folder, line 2 = fmt
// folder, remaining lines one argument each.

use std::fs;

#[path = "../src/args.rs"]
mod args;

#[test]
fn parameter_file_expands_to_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let par = dir.path().join("run.par");

    fs::write(
        &par,
        "out_folder\nfmt_folder\n-N=12\n-stat=value\n-time=us\ndata.bin\n",
    )
    .unwrap();

    let raw = vec![format!("@{}", par.display())];
    let params = args::build_params(&raw).unwrap();

    assert_eq!(params.working_folder.to_str(), Some("out_folder"));
    assert_eq!(params.fmt_folder.to_str(), Some("fmt_folder"));
    assert_eq!(params.fmt_id_bits, 12);
    assert!(params.value_statistics_enabled);
    assert!(!params.message_statistics_enabled);
    assert_eq!(params.time_unit, 'u');
    assert_eq!(params.data_file_name.as_deref().unwrap().to_str(), Some("data.bin"));
}

#[test]
fn missing_parameter_file_is_an_error() {
    let raw = vec!["@does_not_exist.par".to_owned()];
    assert!(args::build_params(&raw).is_err());
}
