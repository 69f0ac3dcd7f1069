//! comfy-bridge CLI - run and inspect workflows on a ComfyUI-compatible
//! service.
//!
//! Reuses the same core service (comfy-bridge-core) that backs the
//! agent tool layer.

mod commands;

use clap::{ArgGroup, Parser, Subcommand};

use commands::run::RunArgs;
use commands::GlobalOptions;

/// comfy-bridge CLI - remote generative workflow runner
#[derive(Parser)]
#[command(
    name = "comfy-bridge",
    version,
    about = "comfy-bridge CLI - run and track ComfyUI workflows"
)]
pub struct Cli {
    /// Path to the workflow registry JSON file
    #[arg(long, global = true, env = "COMFY_WORKFLOWS_FILE")]
    registry: Option<String>,

    /// Base URL of the remote service (e.g. http://127.0.0.1:8188)
    #[arg(long, global = true, env = "COMFY_BASE_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show whether the integration is enabled and how it authenticates
    Capabilities,

    /// Check that the remote service is reachable
    Verify,

    /// Manage named workflows in the registry
    Workflows {
        #[command(subcommand)]
        action: WorkflowsAction,
    },

    /// Submit a workflow, optionally waiting for it to finish
    #[command(group(ArgGroup::new("source").required(true).args(["name", "file"])))]
    Run {
        /// Registered workflow name
        #[arg(long)]
        name: Option<String>,
        /// Inline workflow JSON file
        #[arg(long)]
        file: Option<String>,
        /// Workflow format: api or workflow (detected when omitted)
        #[arg(long)]
        format: Option<String>,
        /// Input overrides as a JSON object (e.g. '{"6.inputs.text":"a cat"}')
        #[arg(long)]
        inputs: Option<String>,
        /// Return as soon as the run is queued
        #[arg(long)]
        no_wait: bool,
        /// Maximum time to wait for completion, in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Caller-chosen run id
        #[arg(long)]
        prompt_id: Option<String>,
        /// Extra submission data as a JSON object
        #[arg(long)]
        extra_data: Option<String>,
    },

    /// Show the status and artifacts of a run
    Status {
        /// Run ID (prompt_id)
        run_id: String,
    },

    /// Inspect or invoke the agent-facing tools
    Tools {
        #[command(subcommand)]
        action: Option<ToolsAction>,
    },
}

#[derive(Subcommand)]
enum WorkflowsAction {
    /// List registered workflows
    List {
        /// Include full workflow definitions
        #[arg(long)]
        include_workflow: bool,
    },
    /// Show one workflow
    Get {
        /// Workflow name
        name: String,
    },
    /// Add or replace a workflow
    Upsert {
        /// Workflow name
        #[arg(long)]
        name: String,
        /// Path to the workflow JSON file
        #[arg(long)]
        file: String,
        /// Workflow format: api or workflow (detected when omitted)
        #[arg(long)]
        format: Option<String>,
        /// Human-readable description
        #[arg(long)]
        description: Option<String>,
        /// Default inputs as a JSON object
        #[arg(long)]
        defaults: Option<String>,
    },
    /// Remove a workflow
    Delete {
        /// Workflow name
        name: String,
    },
}

#[derive(Subcommand)]
enum ToolsAction {
    /// Print tool definitions (default)
    List,
    /// Invoke a tool by name
    Call {
        /// Tool name (e.g. comfy_list_workflows)
        name: String,
        /// Tool arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

#[tokio::main]
async fn main() {
    // Must run before parsing so clap's env fallbacks see .env values.
    commands::load_dotenv();

    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "comfy_bridge_core=warn,comfy_bridge=info".into()),
        )
        .init();

    let opts = GlobalOptions {
        registry: cli.registry,
        base_url: cli.base_url,
    };

    let result = if let Some(command) = cli.command {
        match command {
            Commands::Capabilities => commands::capabilities::show(&opts),

            Commands::Verify => commands::capabilities::verify(&opts).await,

            Commands::Workflows { action } => match action {
                WorkflowsAction::List { include_workflow } => {
                    commands::workflows::list(&opts, include_workflow).await
                }
                WorkflowsAction::Get { name } => commands::workflows::get(&opts, &name).await,
                WorkflowsAction::Upsert {
                    name,
                    file,
                    format,
                    description,
                    defaults,
                } => {
                    commands::workflows::upsert(
                        &opts,
                        &name,
                        &file,
                        format.as_deref(),
                        description,
                        defaults.as_deref(),
                    )
                    .await
                }
                WorkflowsAction::Delete { name } => {
                    commands::workflows::delete(&opts, &name).await
                }
            },

            Commands::Run {
                name,
                file,
                format,
                inputs,
                no_wait,
                timeout_ms,
                prompt_id,
                extra_data,
            } => {
                commands::run::run(
                    &opts,
                    RunArgs {
                        name,
                        file,
                        format,
                        inputs,
                        no_wait,
                        timeout_ms,
                        prompt_id,
                        extra_data,
                    },
                )
                .await
            }

            Commands::Status { run_id } => commands::status::show(&opts, &run_id).await,

            Commands::Tools { action } => match action.unwrap_or(ToolsAction::List) {
                ToolsAction::List => commands::tools::list(&opts),
                ToolsAction::Call { name, args } => {
                    commands::tools::call(&opts, &name, &args).await
                }
            },
        }
    } else {
        // No subcommand - show help
        use clap::CommandFactory;
        Cli::command().print_help().ok();
        println!();
        Ok(())
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
