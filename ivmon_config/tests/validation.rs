use ivmon_config::{load_secrets_file, load_secrets_json, load_toml, Config};
use rstest::rstest;
use std::io::Write;

#[test]
fn empty_document_yields_working_defaults() {
    let cfg = load_toml("").unwrap();
    cfg.validate().unwrap();
    assert_eq!(cfg.prescription.max_volume_ml, 1500);
    assert_eq!(cfg.detection.drop_debounce_ms, 80);
    assert_eq!(cfg.detection.bubble_window_ms, 400);
    assert_eq!(cfg.detection.no_flow_timeout_s, 30);
    assert_eq!(cfg.network.recheck_s, 60);
    assert_eq!(cfg.thresholds.low_volume_ml, 200.0);
    assert!(!cfg.notify.mark_sent_when_offline);
}

#[test]
fn overrides_are_applied() {
    let cfg = load_toml(
        r#"
        [prescription]
        max_volume_ml = 1000

        [detection]
        no_flow_timeout_s = 45

        [notify]
        mark_sent_when_offline = true

        [logging]
        file = "ivmon.log"
        level = "debug"
        "#,
    )
    .unwrap();
    cfg.validate().unwrap();
    assert_eq!(cfg.prescription.max_volume_ml, 1000);
    assert_eq!(cfg.detection.no_flow_timeout_s, 45);
    assert!(cfg.notify.mark_sent_when_offline);
    assert_eq!(cfg.logging.file.as_deref(), Some("ivmon.log"));
}

#[test]
fn unknown_fields_are_tolerated() {
    // Unknown keys are tolerated so a newer config works on an older build.
    let cfg = load_toml("[detection]\nfuture_knob = 1\n").unwrap();
    cfg.validate().unwrap();
}

#[rstest]
#[case("[prescription]\nmin_volume_ml = 0\n", "min_volume_ml")]
#[case("[prescription]\nmax_volume_ml = 0\n", "max_volume_ml")]
#[case("[prescription]\ndefault_drip_factor = 0\n", "default_drip_factor")]
#[case("[detection]\nbubble_window_ms = 0\n", "bubble_window_ms")]
#[case("[detection]\nno_flow_timeout_s = 0\n", "no_flow_timeout_s")]
#[case("[thresholds]\nwarning_volume_ml = 100.0\n", "warning_volume_ml")]
#[case("[network]\nprobe_timeout_ms = 0\n", "probe_timeout_ms")]
#[case("[timing]\ntick_ms = 0\n", "tick_ms")]
#[case("[timing]\ntick_ms = 5000\n", "tick_ms")]
fn invalid_values_fail_validation(#[case] toml: &str, #[case] field: &str) {
    let cfg = load_toml(toml).unwrap();
    let err = cfg.validate().unwrap_err();
    assert!(
        err.to_string().contains(field),
        "error {err} should mention {field}"
    );
}

#[test]
fn probe_bound_must_stay_below_no_flow_latency() {
    let cfg = load_toml("[network]\nprobe_timeout_ms = 30000\n").unwrap();
    assert!(cfg.validate().is_err());
}

#[test]
fn secrets_parse_from_json() {
    let s = load_secrets_json(
        r#"{
            "wifi_ssid": "ward-7",
            "wifi_password": "pw",
            "sms_username": "clinic",
            "sms_api_key": "key",
            "sms_recipients": ["+441234567890"]
        }"#,
    )
    .unwrap();
    assert_eq!(s.wifi_ssid, "ward-7");
    assert_eq!(s.sms_recipients.len(), 1);
}

#[test]
fn secrets_load_from_file_with_partial_fields() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    write!(f, r#"{{"wifi_ssid": "ward-7"}}"#).unwrap();
    let s = load_secrets_file(f.path()).unwrap();
    assert_eq!(s.wifi_ssid, "ward-7");
    assert!(s.sms_recipients.is_empty());
}

#[test]
fn missing_secrets_file_is_an_error() {
    assert!(load_secrets_file(std::path::Path::new("/nonexistent/secrets.json")).is_err());
}

#[test]
fn default_config_is_valid() {
    Config::default().validate().unwrap();
}
