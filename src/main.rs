use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use tabled::{Table, Tabled};

use glucors::alerts::ThresholdAlertPlanner;
use glucors::config::AppConfig;
use glucors::import::CsvImporter;
use glucors::jobs::InMemoryJobQueue;
use glucors::logging::{init_logging, LogConfig, LogLevel};
use glucors::scheduler::ReminderScheduler;
use glucors::tir::TirCalculator;
use glucors::trend::TrendCalculator;

/// Glucors - Glucose Analytics CLI
///
/// Analyzes glucose reading history for trend, prediction, and
/// time-in-range statistics, and previews reminder schedules.
#[derive(Parser)]
#[command(name = "glucors")]
#[command(version = "0.1.0")]
#[command(about = "Glucose analytics and reminder scheduling CLI", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit a trend to a reading file and show slope and prediction
    Trend {
        /// Readings CSV (timestamp,value[,comment])
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Compute time-in-range percentages for a reading file
    Tir {
        /// Readings CSV (timestamp,value[,comment])
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Preview the next fire time of each configured reminder
    Schedule,

    /// Show the threshold alerts the current trend would schedule
    Alerts {
        /// Readings CSV (timestamp,value[,comment])
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[derive(Tabled)]
struct TirRow {
    #[tabled(rename = "Band")]
    band: &'static str,
    #[tabled(rename = "Time %")]
    percent: String,
}

#[derive(Tabled)]
struct ScheduleRow {
    #[tabled(rename = "Reminder")]
    message: String,
    #[tabled(rename = "Rule")]
    rule: String,
    #[tabled(rename = "Next fire")]
    next_fire: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LogLevel::Warn,
        1 => LogLevel::Info,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };
    let _ = init_logging(&LogConfig {
        level,
        ..LogConfig::default()
    });

    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)?,
        None => AppConfig::load_or_default(),
    };

    match cli.command {
        Commands::Trend { file } => show_trend(&file),
        Commands::Tir { file } => show_tir(&file, &config),
        Commands::Schedule => show_schedule(&config),
        Commands::Alerts { file } => show_alerts(&file, &config),
    }
}

fn show_trend(file: &PathBuf) -> Result<()> {
    let readings = CsvImporter::import_file(file)?;
    println!("{} readings imported", readings.len());

    let Some(trend) = TrendCalculator::compute(&readings) else {
        println!("{}", "Not enough recent data to fit a trend".yellow());
        return Ok(());
    };

    let slope_str = format!("{:+.2} mmol/L/h", trend.slope_per_hour);
    let slope_colored = if trend.slope_per_hour > 0.5 {
        slope_str.red()
    } else if trend.slope_per_hour < -0.5 {
        slope_str.blue()
    } else {
        slope_str.green()
    };

    println!("Slope:          {}", slope_colored);
    println!(
        "Rate of change: {:+.2} mmol/L/h (last two readings)",
        trend.rate_of_change_per_hour
    );
    if let Some(p) = trend.prediction {
        println!(
            "Prediction:     {:.1} mmol/L at {}",
            p.value,
            p.at.format("%Y-%m-%d %H:%M")
        );
    }
    if let Some(ema) = trend.ema.last() {
        println!("Smoothed:       {:.1} mmol/L", ema);
    }
    Ok(())
}

fn show_tir(file: &PathBuf, config: &AppConfig) -> Result<()> {
    let readings = CsvImporter::import_file(file)?;
    let result = TirCalculator::compute(&readings, &config.thresholds);

    let rows = vec![
        TirRow {
            band: "Very low",
            percent: format!("{:.1}", result.very_low),
        },
        TirRow {
            band: "Low",
            percent: format!("{:.1}", result.low),
        },
        TirRow {
            band: "In range",
            percent: format!("{:.1}", result.in_range),
        },
        TirRow {
            band: "High",
            percent: format!("{:.1}", result.high),
        },
        TirRow {
            band: "Very high",
            percent: format!("{:.1}", result.very_high),
        },
    ];
    println!("{}", Table::new(rows));
    println!(
        "Below range: {:.1}%   Above range: {:.1}%",
        result.below_range(),
        result.above_range()
    );
    Ok(())
}

fn show_schedule(config: &AppConfig) -> Result<()> {
    if config.reminders.is_empty() {
        println!("No reminders configured");
        return Ok(());
    }

    let now = Utc::now();
    let mut rows = Vec::new();
    for setting in &config.reminders {
        let rule = match &setting.rule {
            glucors::models::ReminderRule::Daily { time } => format!("daily at {}", time),
            glucors::models::ReminderRule::Interval {
                every_minutes,
                window_start,
                window_end,
            } => format!("every {} min, {}-{}", every_minutes, window_start, window_end),
        };

        let next_fire = if !setting.enabled {
            "disabled".dimmed().to_string()
        } else {
            match ReminderScheduler::next_fire(setting, now) {
                Ok(next) => match next.fire_at() {
                    Some(t) => t.format("%Y-%m-%d %H:%M").to_string(),
                    None => "unschedulable".yellow().to_string(),
                },
                Err(e) => format!("{}", e).red().to_string(),
            }
        };

        rows.push(ScheduleRow {
            message: setting.message.clone(),
            rule,
            next_fire,
        });
    }
    println!("{}", Table::new(rows));
    Ok(())
}

fn show_alerts(file: &PathBuf, config: &AppConfig) -> Result<()> {
    let readings = CsvImporter::import_file(file)?;
    let now = Utc::now();
    let trend = TrendCalculator::compute(&readings);

    let mut queue = InMemoryJobQueue::new();
    ThresholdAlertPlanner::plan(trend.as_ref(), &config.alerts, now, &mut queue);

    let pending = queue.all_pending();
    if pending.is_empty() {
        println!("{}", "No threshold alerts for the current trend".green());
        return Ok(());
    }

    for job in pending {
        println!(
            "{}  {}  {}",
            job.fire_at.format("%H:%M").to_string().bold(),
            job.key.cyan(),
            job.payload.message()
        );
    }
    Ok(())
}
