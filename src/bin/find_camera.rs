//! Camera survey tool
//!
//! Probes every camera index with the strict policy and prints which devices
//! deliver real picture content.

use std::process::ExitCode;

use pinch_cam::camera::probe::{ProbeReport, ProbeStatus, Prober};
use pinch_cam::camera::NokhwaBackend;
use pinch_cam::config::{AppConfig, ProbeConfig, ProbePolicy};

const TIPS: &[&str] = &[
    "Close OBS Studio if it's open (it may have exclusive camera access)",
    "Close the phone camera PC client and reopen it",
    "Make sure the phone camera is set up as a virtual camera in its settings",
];

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let defaults = AppConfig {
        probe: ProbeConfig::survey(),
        ..AppConfig::default()
    };
    let mut config = match AppConfig::from_args_or(defaults) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    config.probe.policy = ProbePolicy::Strict;

    println!("Detecting available cameras...");
    println!("{}", "=".repeat(50));

    let mut backend = NokhwaBackend::new();
    let report = Prober::new(config.probe).survey(&mut backend);
    print_report(&report);

    if report.selection.is_some() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_report(report: &ProbeReport) {
    for result in &report.results {
        println!("\nCamera index {}:", result.index);
        for (i, sample) in result.samples.iter().enumerate() {
            println!(
                "  Frame {}: std={:.1}, RGB=({},{},{})",
                i + 1,
                sample.variation,
                sample.mean_rgb[0] as u32,
                sample.mean_rgb[1] as u32,
                sample.mean_rgb[2] as u32
            );
        }
        match (result.status, result.mean_variation) {
            (ProbeStatus::Working, Some(mean)) => {
                println!("  [OK] WORKING - has video content (variation {:.1})", mean)
            }
            (ProbeStatus::Warn, Some(mean)) => println!(
                "  [WARN] Opens but shows solid color, likely the wrong camera (variation {:.1})",
                mean
            ),
            (status, _) => println!("  [{}]", status),
        }
    }

    println!("\n{}", "=".repeat(50));
    println!("\nSummary:");
    match report.selection {
        Some(selection) => {
            println!("[SUCCESS] Working cameras found: {:?}", report.working());
            println!("Use camera index {} (variation {:.1})", selection.index, selection.mean_variation);
        }
        None => {
            println!("[FAIL] No working cameras found");
            println!("\nTips:");
            for (i, tip) in TIPS.iter().enumerate() {
                println!("{}. {}", i + 1, tip);
            }
        }
    }
}
