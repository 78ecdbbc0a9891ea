mod common;

use {
    common::CaptureWriter,
    nlog::{ColorPolicy, Compression, Configurator, NLogConfig, SinkKind},
    regex::Regex,
    std::fs,
};

fn console_config() -> NLogConfig {
    NLogConfig {
        output_console: true,
        output_file: false,
        ..NLogConfig::default()
    }
}

#[test]
fn lines_follow_timestamp_level_caller_message_layout() {
    let console = CaptureWriter::new();
    let log = Configurator::new(console_config())
        .console_writer(console.clone())
        .color(ColorPolicy::Disabled)
        .build();

    log.with_default(|| tracing::info!(port = 8080, "ready"));

    let lines = console.lines();
    assert_eq!(lines.len(), 2, "{lines:?}");
    assert!(lines[0].contains("logging configured"));

    let pattern = Regex::new(r"^\d{2}:\d{2}:\d{2}\.\d{3} \|INF\| +tests/configure\.rs:\d+ > ready port=8080$").unwrap();
    assert!(pattern.is_match(&lines[1]), "unexpected line: {:?}", lines[1]);

    // The caller column is right aligned to a fixed width.
    let caller_end = lines[1].find(" > ").unwrap();
    let level_end = lines[1].find("|INF| ").unwrap() + "|INF| ".len();
    assert_eq!(caller_end - level_end, nlog::CALLER_WIDTH);
}

#[test]
fn every_level_gets_its_tag() {
    let console = CaptureWriter::new();
    let log = Configurator::new(console_config())
        .console_writer(console.clone())
        .color(ColorPolicy::Disabled)
        .caller(false)
        .build();

    log.with_default(|| {
        tracing::trace!("t");
        tracing::debug!("d");
        tracing::info!("i");
        tracing::warn!("w");
        tracing::error!("e");
    });

    let tags: Vec<String> = console
        .lines()
        .iter()
        .skip(1)
        .map(|line| line.split(' ').nth(1).unwrap().to_string())
        .collect();
    assert_eq!(tags, vec!["|TRC|", "|DBG|", "|INF|", "|WRN|", "|ERR|"]);
}

#[test]
fn startup_record_lists_configuration_for_file_only_logger() {
    let tmp = tempfile::tempdir().unwrap();
    let config = NLogConfig {
        output_console: false,
        output_file: true,
        log_path: tmp.path().join("svc"),
        log_file: "svc.log".to_string(),
        max_size: 5,
        max_backups: 4,
        max_age: 30,
    };
    let log = Configurator::new(config.clone()).color(ColorPolicy::Disabled).build();
    assert_eq!(log.sinks(), &[SinkKind::File]);

    let contents = fs::read_to_string(config.file_path()).unwrap();
    for field in [
        "file_logging=true".to_string(),
        "console_logging=false".to_string(),
        format!("log_path={}", config.log_path.display()),
        "log_file=svc.log".to_string(),
        "max_size_mb=5".to_string(),
        "max_backups=4".to_string(),
        "max_age_days=30".to_string(),
    ] {
        assert!(contents.contains(&field), "missing {field} in {contents}");
    }
}

#[test]
fn file_is_rolled_and_old_backups_pruned() {
    let tmp = tempfile::tempdir().unwrap();
    let config = NLogConfig {
        output_console: false,
        output_file: true,
        log_path: tmp.path().to_path_buf(),
        log_file: "app.log".to_string(),
        max_size: 1,
        max_backups: 1,
        max_age: 0,
    };
    let log = Configurator::new(config.clone())
        .color(ColorPolicy::Disabled)
        .compression(Compression::Gzip)
        .build();

    let payload = "x".repeat(200);
    log.with_default(|| {
        for i in 0..12_000 {
            tracing::info!(i, payload = %payload, "filling");
        }
    });

    let active = fs::metadata(config.file_path()).unwrap().len();
    assert!(active <= 1024 * 1024, "active file is {active} bytes");

    // Maintenance runs in the background; give it a moment to settle.
    let backup = Regex::new(r"^app-\d{4}-\d{2}-\d{2}T\d{2}-\d{2}-\d{2}\.\d{3}\.log(\.gz)?$").unwrap();
    let mut backups = Vec::new();
    for _ in 0..100 {
        backups = fs::read_dir(tmp.path())
            .unwrap()
            .flatten()
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| backup.is_match(name))
            .collect();
        if backups.len() == 1 && backups[0].ends_with(".gz") {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(50));
    }
    assert_eq!(backups.len(), 1, "{backups:?}");
    assert!(backups[0].ends_with(".log.gz"), "{backups:?}");
}

#[test]
fn disabled_outputs_are_not_an_error() {
    let log = Configurator::new(NLogConfig {
        output_console: false,
        output_file: false,
        ..NLogConfig::default()
    })
    .build();

    assert!(log.sinks().is_empty());
    log.with_default(|| tracing::error!("goes nowhere"));
}

#[test]
fn scoped_default_guard_routes_records() {
    let console = CaptureWriter::new();
    let log = Configurator::new(console_config())
        .console_writer(console.clone())
        .color(ColorPolicy::Disabled)
        .build();

    {
        let _guard = log.set_default();
        tracing::warn!("inside guard");
    }
    tracing::warn!("outside guard");

    let out = console.contents();
    assert!(out.contains("inside guard"));
    assert!(!out.contains("outside guard"));
}
