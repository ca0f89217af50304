use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use usb_role_switch::cable::CableNotifier;
use usb_role_switch::config::{self, UsbRoleConfig};
use usb_role_switch::gpio::cdev::CdevProvider;
use usb_role_switch::gpio::sim::SimulatedGpio;
use usb_role_switch::gpio::{GpioProvider, LineManager};
use usb_role_switch::role::{Role, RoleSwitchClass, UsbRoleController};

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// usb-role-switch command line arguments
#[derive(Parser, Debug)]
#[command(name = "usb-role-switch")]
#[command(version, about = "USB role switch controller for hub / Type-C boards", long_about = None)]
struct CliArgs {
    /// Config file path (default: $USB_ROLE_CONFIG or /etc/usb-role-switch/config.toml)
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Board compatible string (overrides config variant)
    #[arg(long, value_name = "COMPATIBLE")]
    compatible: Option<String>,

    /// Use simulated GPIO lines instead of /dev/gpiochipX
    #[arg(long)]
    simulate: bool,

    /// Role to apply after initialization (none, host, device)
    #[arg(short = 'r', long, value_name = "ROLE")]
    role: Option<Role>,

    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    init_logging(args.log_level, args.verbose);

    tracing::info!("Starting usb-role-switch v{}", env!("CARGO_PKG_VERSION"));

    let config_path = args.config.unwrap_or_else(config::default_config_path);
    tracing::info!("Config file: {}", config_path.display());
    let mut config = UsbRoleConfig::load(&config_path)?;
    if let Some(compatible) = &args.compatible {
        config.variant = compatible.parse()?;
    }

    let provider: Arc<dyn GpioProvider> = if args.simulate {
        tracing::warn!("Using simulated GPIO lines");
        Arc::new(SimulatedGpio::with_lines(config.lines()))
    } else {
        Arc::new(CdevProvider::new())
    };
    let lines = LineManager::new(provider);
    let notifier = Arc::new(CableNotifier::new(config.name.clone()));
    let class = RoleSwitchClass::new();

    let controller = UsbRoleController::initialize(&config, &lines, notifier.clone(), &class)?;

    let mut events = notifier.subscribe();
    let cable_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    tracing::info!("Cable {} attached={}", event.cable, event.attached)
                }
                Err(RecvError::Lagged(n)) => tracing::warn!("Missed {} cable events", n),
                Err(RecvError::Closed) => break,
            }
        }
    });

    if let Some(role) = args.role {
        class.set_role_from_userspace(&config.name, role)?;
    }

    tracing::info!("Reading role commands from stdin (none, host, device, get, status)");
    let mut commands = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = commands.next_line() => match line? {
                Some(line) => handle_command(&class, &controller, &config.name, line.trim()),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    controller.teardown();
    cable_task.abort();
    tracing::info!("usb-role-switch stopped");

    Ok(())
}

/// Handle one manual control command
fn handle_command(
    class: &RoleSwitchClass,
    controller: &UsbRoleController,
    name: &str,
    command: &str,
) {
    match command {
        "" => {}
        "get" => println!("{}", controller.get_role()),
        "status" => match serde_json::to_string_pretty(&controller.status()) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::warn!("Failed to serialize status: {}", e),
        },
        other => match other.parse::<Role>() {
            Ok(role) => {
                if let Err(e) = class.set_role_from_userspace(name, role) {
                    tracing::error!("Failed to set role {}: {}", role, e);
                }
            }
            Err(e) => tracing::warn!("{}", e),
        },
    }
}

fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "usb_role_switch=error",
        LogLevel::Warn => "usb_role_switch=warn",
        LogLevel::Info => "usb_role_switch=info",
        LogLevel::Verbose => "usb_role_switch=debug,usb_role_switch::gpio=info",
        LogLevel::Debug => "usb_role_switch=debug",
        LogLevel::Trace => "usb_role_switch=trace",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}
