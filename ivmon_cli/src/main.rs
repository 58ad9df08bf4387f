mod cli;
mod sim;

use clap::Parser;
use cli::{Cli, Commands, FILE_GUARD};
use eyre::{eyre, Result, WrapErr};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();

    let cfg = load_config(&args.config)?;
    cfg.validate()
        .wrap_err_with(|| format!("invalid config {}", args.config.display()))?;
    init_logging(&args, &cfg.logging)?;

    // Secrets stay out of the config file; drivers pick them up from here.
    let _secrets = match &args.secrets {
        Some(path) => Some(ivmon_config::load_secrets_file(path)?),
        None => None,
    };

    match args.cmd {
        Commands::CheckConfig => {
            println!("config OK: {}", args.config.display());
            println!(
                "  prescription: volume {}..={} mL, duration {}..={} min, drip default {} gtt/mL",
                cfg.prescription.min_volume_ml,
                cfg.prescription.max_volume_ml,
                cfg.prescription.min_duration_min,
                cfg.prescription.max_duration_min,
                cfg.prescription.default_drip_factor,
            );
            println!(
                "  detection: drop debounce {} ms, bubble window {} ms, no-flow {} s",
                cfg.detection.drop_debounce_ms,
                cfg.detection.bubble_window_ms,
                cfg.detection.no_flow_timeout_s,
            );
            println!(
                "  network: recheck {} s, probe bound {} ms",
                cfg.network.recheck_s, cfg.network.probe_timeout_ms,
            );
            Ok(())
        }
        Commands::Simulate {
            volume_ml,
            duration_min,
            drip_factor,
            drop_interval_ms,
            offline,
            bubble_at_ms,
            stall_after_ms,
            max_sim_s,
        } => {
            let stop = Arc::new(AtomicBool::new(false));
            {
                let stop = Arc::clone(&stop);
                ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
                    .wrap_err("failed to install Ctrl-C handler")?;
            }
            let plan = sim::SimPlan {
                volume_ml,
                duration_min,
                drip_factor,
                drop_interval_ms,
                offline,
                bubble_at_ms,
                stall_after_ms,
                max_sim_ms: max_sim_s.saturating_mul(1000),
            };
            let report = sim::run(&cfg, &plan, stop)?;
            print_report(&report, args.json);
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> Result<ivmon_config::Config> {
    if !path.exists() {
        return Ok(ivmon_config::Config::default());
    }
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
    ivmon_config::load_toml(&text)
        .map_err(|e| eyre!("failed to parse config {}: {e}", path.display()))
}

fn print_report(report: &sim::SimReport, json: bool) {
    if json {
        let value = serde_json::json!({
            "final_state": format!("{:?}", report.final_state),
            "first_alarm": report.first_alarm.map(|a| format!("{a:?}")),
            "final_alarm": report.final_alarm.map(|a| format!("{a:?}")),
            "delivered_ml": report.delivered_ml,
            "percent": report.percent,
            "sim_ms": report.sim_ms,
            "messages": report.messages,
        });
        println!("{value}");
        return;
    }
    println!("final state:  {:?}", report.final_state);
    if let Some(alarm) = report.first_alarm {
        println!("first alarm:  {alarm:?}");
    }
    if let Some(alarm) = report.final_alarm {
        println!("final alarm:  {alarm:?}");
    }
    println!(
        "delivered:    {:.1} mL ({:.0}%)",
        report.delivered_ml, report.percent
    );
    println!("sim time:     {:.1} s", report.sim_ms as f64 / 1000.0);
    if report.messages.is_empty() {
        println!("messages:     none");
    } else {
        println!("messages:");
        for m in &report.messages {
            println!("  - {m}");
        }
    }
}

fn init_logging(args: &Cli, logging: &ivmon_config::Logging) -> Result<()> {
    let level = args
        .log_level
        .as_deref()
        .or(logging.level.as_deref())
        .unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err("invalid log level")?;

    if let Some(file) = &logging.file {
        let path = Path::new(file);
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        let name = path
            .file_name()
            .ok_or_else(|| eyre!("logging.file has no file name: {file}"))?;
        let dir = dir.unwrap_or_else(|| Path::new("."));
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_writer(writer)
            .with_ansi(false)
            .init();
    } else if args.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}
