use nlog::{Compression, Configurator, NLogConfig, TimeZone};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let log = Configurator::new(NLogConfig {
        output_console: true,
        output_file: true,
        log_path: "./logs".into(),
        log_file: "rolling.log".to_string(),
        max_size: 1,
        max_backups: 3,
        max_age: 7,
    })
    .time_zone(TimeZone::Local)
    .compression(Compression::Gzip)
    .build();

    log.with_default(|| {
        let payload = "x".repeat(512);
        for i in 0..10_000 {
            tracing::info!(i, payload = %payload, "filling the log file");
        }
    });

    Ok(())
}
