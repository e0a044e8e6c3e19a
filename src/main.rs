//! `linpower`, apply power management settings through sysfs.
//!
//! Every configuration command exits successfully, however many writes
//! failed. Failures are in the log.
use anyhow::Context;
use clap::{Parser, Subcommand};
use linpower::{
    config::{Config, CONFIG_PATH},
    report::Category,
    sysfs::{ControlWriter, DryRunWriter, SysfsWriter},
    system::cpu::{CpuId, Cpus},
    tune::Tuner,
    verify,
};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "linpower")]
#[command(version)]
#[command(about = "One-shot power management tuning for embedded Linux")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Where sysfs is mounted, overriding the configuration
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Log what would be written, without writing anything
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the full pass: governor, frequency, then peripherals (default)
    Apply {
        /// Governor to set before the frequency
        #[arg(long)]
        governor: Option<String>,

        /// Frequency in kHz, one of `scaling_available_frequencies`
        #[arg(long)]
        frequency: Option<String>,

        /// Only these categories, ie `cpu,usb,wifi`
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,

        /// Use the fixed peripheral table instead of enumerating devices
        #[arg(long)]
        fixed: bool,
    },

    /// Set the scaling governor of every CPU
    Governor {
        /// ie `powersave`, `ondemand`, `conservative`
        name: String,
    },

    /// Switch every CPU to `userspace` and set a fixed frequency
    Frequency {
        /// Frequency in kHz
        khz: String,
    },

    /// Only apply the peripheral rules
    Peripherals {
        /// Use the fixed peripheral table instead of enumerating devices
        #[arg(long)]
        fixed: bool,
    },

    /// List CPUs with their current governor and frequency
    Cpus,

    /// Show the frequencies each CPU accepts
    Frequencies,

    /// Read back what a pass would have written
    Verify,

    /// Print the effective configuration
    Config,

    /// How to measure the effect
    Tips,
}

fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if std::env::var("LINPOWER_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .init();
    }
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = Config::load(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    Ok(match config {
        Some(c) => {
            info!("Config loaded from {}", path.display());
            c
        }
        None => Config::default(),
    })
}

fn print_tips() {
    println!("Monitoring power consumption:");
    println!("- Measure with: sudo powertop, or an external power monitor");
    println!("- Check CPU freq: cat /sys/devices/system/cpu/cpu*/cpufreq/scaling_cur_freq");
    println!(
        "- Reset governor: echo 'ondemand' | sudo tee /sys/devices/system/cpu/cpu*/cpufreq/scaling_governor"
    );
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let mut config = load_config(&cli.config).unwrap_or_else(|e| {
        warn!("{e:#}, using defaults");
        Config::default()
    });
    if let Some(root) = cli.root {
        config.sysfs_root = root;
    }
    let mut writer: Box<dyn ControlWriter> = if cli.dry_run {
        Box::new(DryRunWriter)
    } else {
        Box::new(SysfsWriter)
    };

    let command = cli.command.unwrap_or(Command::Apply {
        governor: None,
        frequency: None,
        only: Vec::new(),
        fixed: false,
    });
    match command {
        Command::Apply {
            governor,
            frequency,
            only,
            fixed,
        } => {
            if let Some(governor) = governor {
                config.governor = governor;
            }
            if let Some(frequency) = frequency {
                config.frequency = frequency;
            }
            if !only.is_empty() {
                config.categories = only;
            }
            config.discover &= !fixed;
            Tuner::from_config(&config).run(&mut *writer);
            println!();
            print_tips();
        }
        Command::Governor { name } => {
            Cpus::new(&config.sysfs())
                .set_governor(&mut *writer, &name)
                .log_summary();
        }
        Command::Frequency { khz } => {
            Cpus::new(&config.sysfs())
                .set_frequency(&mut *writer, &khz)
                .log_summary();
        }
        Command::Peripherals { fixed } => {
            config.discover &= !fixed;
            config.peripherals().apply_all(&mut *writer).log_summary();
        }
        Command::Cpus => {
            let cpus = Cpus::new(&config.sysfs());
            for cpu in cpus.ids() {
                let governor = cpus.governor(&cpu).unwrap_or_else(|_| "-".into());
                let freq = cpus
                    .current_frequency(&cpu)
                    .map_or_else(|_| "-".into(), |f| f.to_string());
                println!("{cpu}: governor {governor}, {freq} kHz");
            }
        }
        Command::Frequencies => {
            let cpus = Cpus::new(&config.sysfs());
            cpus.probe_available_frequencies(&mut *writer).log_summary();
            for cpu in cpus.ids() {
                show_frequencies(&cpus, &cpu);
            }
        }
        Command::Verify => {
            let tuner = Tuner::from_config(&config);
            let categories = tuner.categories();
            let mut checks = Vec::new();
            // The frequency step leaves every core on `userspace`.
            if categories.contains(Category::FREQUENCY) {
                checks.extend(verify::governor(tuner.cpus(), "userspace"));
                checks.extend(verify::frequency(tuner.cpus(), &config.frequency));
            } else if categories.contains(Category::GOVERNOR) {
                checks.extend(verify::governor(tuner.cpus(), &config.governor));
            }
            checks.extend(verify::rules(tuner.rules().rules()));
            let matched = checks.iter().filter(|c| c.is_match()).count();
            info!("{matched} of {} attributes match", checks.len());
        }
        Command::Config => match toml::to_string_pretty(&config) {
            Ok(s) => print!("{s}"),
            Err(e) => error!("Failed to serialize configuration: {e}"),
        },
        Command::Tips => print_tips(),
    }
}

fn show_frequencies(cpus: &Cpus, cpu: &CpuId) {
    match cpus.available_frequencies(cpu) {
        Ok(f) => {
            let f: Vec<String> = f.iter().map(u64::to_string).collect();
            println!("{cpu}: {}", f.join(" "));
        }
        Err(e) => warn!("{cpu}: no available frequencies: {e}"),
    }
    if let Ok(governors) = cpus.available_governors(cpu) {
        println!("{cpu}: governors {}", governors.join(" "));
    }
}
