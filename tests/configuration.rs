#[path = "common/mod.rs"]
mod common;
use std::path::Path;

use basecaller::config::ConfigFile;
use basecaller::{CallerConfig, ConfigError, ConsensusEngine, ConsensusError, RegionError};
use common::{single_reference, stack};
use test_case::test_case;

const PIPELINE_CONFIG: &str = r#"{
    "base_caller": {
        "region": "Den1:100-200",
        "minbq": 20,
        "maxd": 5000,
        "mind": 5,
        "minth": 0.9,
        "biasth": 40,
        "bias": 3
    }
}"#;

#[test]
fn config_file_overrides_defaults_and_flags_override_file() {
    let file = ConfigFile::from_json(PIPELINE_CONFIG, "pipeline.json").expect("config parses");
    let config = CallerConfig::builder()
        .apply_section(&file.base_caller)
        .expect("section applies")
        .min_depth(7)
        .build()
        .expect("valid configuration");

    let region = config.region().expect("region set by file");
    assert_eq!(region.reference, "Den1");
    assert_eq!((region.start, region.stop), (Some(100), Some(200)));
    assert_eq!(config.min_base_quality(), 20);
    assert_eq!(config.max_depth(), 5000);
    assert_eq!(config.min_depth(), 7);
    assert_eq!(config.min_consensus_fraction(), 0.9);
    assert_eq!(config.bias_quality_threshold(), 40);
    assert_eq!(config.bias_factor(), 3);
    assert_eq!(config.min_mapping_quality(), 0);
}

#[test]
fn unknown_keys_in_section_are_rejected() {
    let err = ConfigFile::from_json(r#"{"base_caller": {"minbqq": 3}}"#, "typo.json").unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn other_pipeline_sections_are_ignored() {
    let text = r#"{"trim_reads": {"q": 20}, "base_caller": {"mind": 3}}"#;
    let file = ConfigFile::from_json(text, "pipeline.json").expect("config parses");
    assert_eq!(file.base_caller.mind, Some(3));
}

#[test]
fn missing_config_file_is_reported_with_its_path() {
    let err = ConfigFile::load(Path::new("/nonexistent/basecaller.json")).unwrap_err();
    match err {
        ConfigError::Io { path, .. } => assert!(path.contains("basecaller.json")),
        other => panic!("expected I/O error, got {other:?}"),
    }
}

#[test_case(CallerConfig::builder().min_depth(11).max_depth(10) ; "floor above cap")]
#[test_case(CallerConfig::builder().max_depth(0).min_depth(0) ; "zero cap")]
#[test_case(CallerConfig::builder().bias_factor(0) ; "zero bias")]
#[test_case(CallerConfig::builder().min_consensus_fraction(0.0) ; "zero fraction")]
#[test_case(CallerConfig::builder().min_consensus_fraction(1.5) ; "fraction above one")]
#[test_case(CallerConfig::builder().min_consensus_fraction(f64::NAN) ; "nan fraction")]
fn invalid_configuration_fails_fast(builder: basecaller::CallerConfigBuilder) {
    let err = ConsensusEngine::from_builder(builder).unwrap_err();
    assert!(matches!(err, ConsensusError::InvalidConfiguration(_)));
}

#[test_case("ref:0-5", RegionError::NonPositiveBound("ref:0-5".to_string()) ; "zero start")]
#[test_case("ref:9-3", RegionError::StartAfterStop { start: 9, stop: 3 } ; "reversed")]
#[test_case("chrZ:1-3", RegionError::UnknownReference("chrZ".to_string()) ; "unknown reference")]
#[test_case("ref:40-50", RegionError::StartBeyondReference { reference: "ref".to_string(), start: 40, length: 30 } ; "past the end")]
fn invalid_region_produces_no_output(region: &str, expected: RegionError) {
    let spec = region.parse::<basecaller::RegionSpec>().and_then(|spec| {
        let source = single_reference("ref", 30, Vec::new());
        basecaller::RegionSpec::resolve(&spec, &source).map(|_| spec)
    });
    match spec {
        Err(err) => assert_eq!(err, expected),
        Ok(spec) => panic!("{spec:?} should not resolve"),
    }

    if let Ok(spec) = region.parse::<basecaller::RegionSpec>() {
        let config = CallerConfig::builder()
            .region(Some(spec))
            .build()
            .expect("valid configuration");
        let mut source = single_reference("ref", 30, stack("a", "ref", 0, b'A', 30, 10));
        let err = ConsensusEngine::new(config).run(&mut source).unwrap_err();
        assert!(matches!(err, ConsensusError::InvalidRegion(_)));
        assert!(err.partial_run().is_none());
    }
}
