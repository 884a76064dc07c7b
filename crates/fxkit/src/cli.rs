use crate::commands;
use crate::commands::CommandContext;
use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use fxkit_core::context::Platform;
use fxkit_core::settings::DEFAULT_ENV;
use std::path::PathBuf;

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text format
    Text,
    /// JSON structured format
    Json,
}

/// Log format options
#[derive(Debug, Clone, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    Text,
    /// JSON structured format
    Json,
}

/// Log level options
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    /// Error messages only
    Error,
    /// Warning and error messages
    Warn,
    /// Informational messages and above
    Info,
    /// Debug messages and above
    Debug,
    /// All messages including trace
    Trace,
}

impl LogLevel {
    fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Calling platform
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum PlatformOption {
    /// Interactive command line
    Cli,
    /// Visual Studio host (never locks)
    Vs,
    /// Editor extension
    Vscode,
    /// Help rendering (never locks)
    CliHelp,
}

impl From<PlatformOption> for Platform {
    fn from(platform: PlatformOption) -> Self {
        match platform {
            PlatformOption::Cli => Platform::Cli,
            PlatformOption::Vs => Platform::Vs,
            PlatformOption::Vscode => Platform::Vscode,
            PlatformOption::CliHelp => Platform::CliHelp,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version,
    about = "Plugin lifecycle orchestrator",
    long_about = "Plugin lifecycle orchestrator\n\nScaffolds, provisions, deploys and publishes an app through its active resource plugins.",
    color = clap::ColorChoice::Auto
)]
pub struct Cli {
    /// Log format (text or json, defaults to text, can be set via FXKIT_LOG_FORMAT env var)
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Log level
    #[arg(long, global = true, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Project folder (defaults to the current directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub project_path: Option<PathBuf>,

    /// Target environment
    #[arg(long, global = true, default_value = DEFAULT_ENV)]
    pub env: String,

    /// Run without taking the project lock
    #[arg(long, global = true)]
    pub ignore_lock: bool,

    /// Calling platform
    #[arg(long, global = true, value_enum, default_value = "cli")]
    pub platform: PlatformOption,

    #[command(subcommand)]
    pub command: Commands,
}

/// fxkit subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a new project
    New {
        /// Application name; the project folder is created under --project-path
        name: String,
        /// App module to declare (e.g. tab, bot), can be repeated
        #[arg(long = "module", value_name = "NAME")]
        modules: Vec<String>,
    },
    /// Activate a resource plugin and everything it depends on
    AddResource {
        /// Resource plugin id
        resource: String,
        /// Module that the resource will host
        #[arg(long)]
        module: Option<String>,
    },
    /// List available resource plugins and whether they are active
    Resources {
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        output_format: OutputFormat,
    },
    /// Generate project code through the active plugins
    Scaffold,
    /// Create the cloud resources of the active plugins
    Provision,
    /// Deploy code to provisioned resources
    Deploy,
    /// Publish the app
    Publish,
}

impl Cli {
    pub async fn dispatch(self) -> Result<()> {
        let log_format = match self.log_format {
            Some(LogFormat::Text) => Some("text"),
            Some(LogFormat::Json) => Some("json"),
            None => None,
        };

        let log_level = self.log_level.as_str();
        if std::env::var_os(fxkit_core::logging::LOG_ENV).is_none()
            && std::env::var_os("RUST_LOG").is_none()
        {
            std::env::set_var(
                "RUST_LOG",
                format!("fxkit={},fxkit_core={}", log_level, log_level),
            );
        }
        fxkit_core::logging::init(log_format)?;
        tracing::debug!("CLI initialized with log level: {}", log_level);

        let project_path = match self.project_path {
            Some(path) => path,
            None => std::env::current_dir()?,
        };
        let context = CommandContext {
            project_path,
            env: self.env,
            ignore_lock: self.ignore_lock,
            platform: self.platform.into(),
        };

        match self.command {
            Commands::New { name, modules } => commands::new::execute_new(&context, &name, &modules),
            Commands::AddResource { resource, module } => {
                commands::add_resource::execute_add_resource(&context, resource, module).await
            }
            Commands::Resources { output_format } => {
                commands::resources::execute_resources(&context, output_format)
            }
            Commands::Scaffold => commands::lifecycle::execute_scaffold(&context).await,
            Commands::Provision => commands::lifecycle::execute_provision(&context).await,
            Commands::Deploy => commands::lifecycle::execute_deploy(&context).await,
            Commands::Publish => commands::lifecycle::execute_publish(&context).await,
        }
    }
}
