//! `macae`: command-line front end for the MACAE task service.

mod config;

use clap::{Parser, Subcommand};
use config::MacaeConfig;
use macae_core::{HumanClarification, HumanFeedback, InputTask};
use macae_memory::MemoryProvider;
use macae_orchestrator::{AgentFactory, OrchestrationRegistry, ServiceError, TaskService};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "macae", about = "MACAE: Multi-Agent Custom Automation Engine")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "macae.toml")]
    config: PathBuf,

    /// User id (overrides config and MACAE_USER_ID)
    #[arg(short, long)]
    user: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a task and create its plan
    Submit {
        description: String,
        #[arg(short, long)]
        session: Option<String>,
    },
    /// List plans with their steps
    Plans {
        #[arg(short, long)]
        session: Option<String>,
    },
    /// List the steps of a plan
    Steps { plan_id: String },
    /// Approve or reject one step, or every open step when --step is omitted
    Approve {
        #[arg(short, long)]
        session: String,
        #[arg(short, long)]
        plan: String,
        #[arg(long)]
        step: Option<String>,
        /// Reject instead of approve
        #[arg(long)]
        reject: bool,
        #[arg(long)]
        feedback: Option<String>,
        #[arg(long)]
        updated_action: Option<String>,
    },
    /// Record feedback on a step without deciding it
    Feedback {
        #[arg(short, long)]
        session: String,
        #[arg(short, long)]
        plan: String,
        #[arg(long)]
        step: Option<String>,
        text: String,
    },
    /// Answer a plan's clarification request
    Clarify {
        #[arg(short, long)]
        session: String,
        #[arg(short, long)]
        plan: String,
        text: String,
    },
    /// Show agent messages of a session, or every stored document
    Messages {
        #[arg(short, long)]
        session: Option<String>,
    },
    /// Delete every stored document and reset caches
    Reset,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a service result; errors go to stdout as JSON and fail the process.
fn report<T: Serialize>(result: Result<T, ServiceError>) -> anyhow::Result<()> {
    match result {
        Ok(value) => print_json(&value),
        Err(e) => {
            print_json(&e)?;
            Err(e.into())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    let config = MacaeConfig::load(&cli.config).await?;
    let user = cli
        .user
        .or(config.default_user.clone())
        .ok_or_else(|| anyhow::anyhow!("no user: pass --user or set MACAE_USER_ID"))?;

    let registry = Arc::new(OrchestrationRegistry::new());
    let factory = Arc::new(AgentFactory::new(registry));
    let memory = Arc::new(MemoryProvider::new(config.memory.clone()));
    let service = TaskService::new(
        factory,
        memory,
        Arc::new(config.security.content_safety()),
    )
    .with_sanitizer(config.security.sanitizer())
    .with_client_config(config.client.clone());

    info!(
        user_id = %user,
        local_storage = config.memory.use_local_storage,
        client = config.client.is_configured(),
        "MACAE ready"
    );

    match cli.command {
        Commands::Submit {
            description,
            session,
        } => {
            let mut task = InputTask::new(description);
            if let Some(session) = session {
                task = task.with_session(session);
            }
            report(service.submit_task(&user, task).await)
        }
        Commands::Plans { session } => report(service.get_plans(&user, session.as_deref()).await),
        Commands::Steps { plan_id } => report(service.get_steps(&user, &plan_id).await),
        Commands::Approve {
            session,
            plan,
            step,
            reject,
            feedback,
            updated_action,
        } => {
            let mut decision = match step {
                Some(step) => HumanFeedback::for_step(session, plan, step, !reject),
                None => HumanFeedback::for_all_steps(session, plan, !reject),
            };
            if let Some(text) = feedback {
                decision = decision.with_feedback(text);
            }
            if let Some(action) = updated_action {
                decision = decision.with_updated_action(action);
            }
            report(service.approve_step_or_steps(&user, decision).await)
        }
        Commands::Feedback {
            session,
            plan,
            step,
            text,
        } => {
            let feedback = match step {
                Some(step) => HumanFeedback::for_step(session, plan, step, false),
                None => HumanFeedback::for_all_steps(session, plan, false),
            }
            .with_feedback(text);
            report(service.human_feedback(&user, feedback).await)
        }
        Commands::Clarify {
            session,
            plan,
            text,
        } => report(
            service
                .human_clarification(
                    &user,
                    HumanClarification {
                        plan_id: plan,
                        session_id: session,
                        human_clarification: text,
                    },
                )
                .await,
        ),
        Commands::Messages { session } => match session {
            Some(session) => report(service.get_agent_messages(&user, &session).await),
            None => report(service.get_all_messages(&user).await),
        },
        Commands::Reset => report(service.delete_all_messages(&user).await),
    }
}
