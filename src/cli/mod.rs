//! perfkit CLI Module
//!
//! Command-line interface for inspecting settings and exercising the
//! cache, batch processor and profiler on synthetic work.

use clap::{Parser, Subcommand};
use colored::*;
use std::convert::Infallible;
use std::path::{Path, PathBuf};

use crate::batch::{shared, FnOperation};
use crate::config::OptimizationSettings;
use crate::context::OptimizationContext;

// ─── Output ────────────────────────────────────────────────────────────────────

const RULE_WIDTH: usize = 56;

fn faint(s: &str) -> ColoredString { s.truecolor(110, 110, 110) }
fn good(s: &str) -> ColoredString  { s.truecolor(100, 210, 120) }
fn alert(s: &str) -> ColoredString { s.truecolor(230, 180, 80) }

fn heading(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", faint(&"─".repeat(RULE_WIDTH)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<22} {}", faint(key), val.white());
}

/// Run one bench phase, printing its label and the summary `run` returns
fn phase(label: &str, run: impl FnOnce() -> anyhow::Result<String>) -> anyhow::Result<()> {
    print!("  {} {}... ", faint("›"), label);
    let detail = run()?;
    println!("{} {}", good("done"), faint(&detail));
    Ok(())
}

fn indented(block: &str) {
    for line in block.lines() {
        println!("  {}", line);
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "perfkit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Caching, batching and profiling toolkit")]
#[command(long_about = None)]
pub struct Cli {
    /// JSON settings file; PERFKIT_* environment variables are used when absent
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show process memory usage and the effective settings
    Info,

    /// Print the effective settings
    Settings {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Run a synthetic cache, batch and profiling workload
    Bench {
        /// Number of distinct cache keys
        #[arg(short, long, default_value = "1000")]
        entries: usize,

        /// Size of each cached value in bytes
        #[arg(short, long, default_value = "1024")]
        value_bytes: usize,

        /// Cache budget in KiB (defaults to the configured budget)
        #[arg(short, long)]
        budget_kb: Option<u64>,
    },
}

/// Settings from `--config` when given, otherwise from the environment
pub fn load_settings(config: Option<&Path>) -> anyhow::Result<OptimizationSettings> {
    let settings = match config {
        Some(path) => OptimizationSettings::from_json_file(path)?,
        None => OptimizationSettings::from_env(),
    };
    settings.validate()?;
    Ok(settings)
}

// ─── Info ──────────────────────────────────────────────────────────────────────

pub fn cmd_info(settings: OptimizationSettings) -> anyhow::Result<()> {
    let ctx = OptimizationContext::new(settings)?;

    println!();
    println!("  {} {}", "perfkit".white().bold(), faint(&format!("v{}", env!("CARGO_PKG_VERSION"))));

    heading("Process memory");
    match ctx.memory().usage() {
        Some(usage) => {
            kv("Resident", &format!("{:.1} MB", usage.rss_mb));
            kv("Virtual", &format!("{:.1} MB", usage.vms_mb));
            kv("Share of system", &format!("{:.2}%", usage.percent));
            if ctx.memory().exceeds_warning() {
                println!("  {} above {:.0} MB warning threshold", alert("!"), ctx.memory().warning_mb());
            }
        }
        None => kv("Resident", "unavailable"),
    }

    print_settings(ctx.settings());
    println!();
    Ok(())
}

// ─── Settings ──────────────────────────────────────────────────────────────────

pub fn cmd_settings(settings: OptimizationSettings, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", settings.to_json_pretty()?);
    } else {
        print_settings(&settings);
        println!();
    }
    Ok(())
}

fn print_settings(settings: &OptimizationSettings) {
    heading("Cache");
    kv("Enabled", &settings.cache.enabled.to_string());
    kv("Budget", &format!("{:.2} MB", settings.cache.max_size_mb()));
    kv("TTL", &format!("{} s", settings.cache.ttl_seconds));
    kv("Oversize policy", &format!("{:?}", settings.cache.oversize_policy));

    heading("Batch");
    kv("Batch size", &settings.batch.batch_size.to_string());
    kv("Deferred", &settings.batch.defer_execution.to_string());

    heading("Profiler");
    kv("Slow threshold", &format!("{} ms", settings.profiler.slow_threshold_ms));
    kv(
        "Max results",
        &settings
            .profiler
            .max_results
            .map_or_else(|| "unbounded".to_string(), |n| n.to_string()),
    );
    kv("Memory warning", &format!("{} MB", settings.memory_warning_mb));
}

// ─── Bench ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Counter {
    value: u64,
}

const BENCH_TARGETS: usize = 4;

pub fn cmd_bench(
    mut settings: OptimizationSettings,
    entries: usize,
    value_bytes: usize,
    budget_kb: Option<u64>,
) -> anyhow::Result<()> {
    if let Some(kb) = budget_kb {
        settings.cache.max_size_bytes = kb.saturating_mul(1024);
    }
    let ctx = OptimizationContext::new(settings)?;
    let cache = ctx.cache::<Vec<u8>>("bench")?;

    heading("Bench");

    phase("Filling cache", || {
        ctx.profile("cache_fill", || {
            for i in 0..entries {
                cache.get_or_insert_with(&format!("key_{i}"), || vec![(i % 251) as u8; value_bytes]);
            }
        });
        Ok(format!("{} entries, {:.2} MB", cache.len(), cache.stats().size_mb()))
    })?;

    phase("Re-reading", || {
        let hits = ctx.profile("cache_reread", || {
            (0..entries)
                .filter(|i| cache.get(&format!("key_{i}")).is_some())
                .count()
        });
        Ok(format!("{hits}/{entries} hits"))
    })?;

    phase("Batching", || {
        let targets: Vec<_> = (0..BENCH_TARGETS).map(|_| shared(Counter::default())).collect();
        let mut processor = ctx.batch_processor::<Counter, FnOperation<Counter, Infallible>>();
        let executed = ctx.profile("batch", || -> anyhow::Result<u64> {
            for i in 0..entries {
                let op = FnOperation::new("increment", |c: &mut Counter| {
                    c.value += 1;
                    Ok(())
                });
                processor.add(&targets[i % BENCH_TARGETS], op)?;
            }
            processor.execute()?;
            Ok(processor.executed_total())
        })?;
        let total: u64 = targets.iter().map(|t| t.lock().value).sum();
        Ok(format!("{executed} operations over {BENCH_TARGETS} targets, total {total}"))
    })?;

    heading("Results");
    indented(&cache.report());
    println!();
    indented(&ctx.profiler().report());
    println!();

    Ok(())
}
