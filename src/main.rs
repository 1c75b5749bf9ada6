use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use wizard::backend::FileBackend;
use wizard::config::Config;
use wizard::engine::{DraftSave, TransitionOutcome, WorkflowEngine};
use wizard::steps::{StepRegistry, Validator};
use wizard::workflow::{StepName, WorkflowData, WorkflowId};
use wizard::{wlog, Error, Result};

/// Wizard - guided multi-step asset creation workflows
#[derive(Parser, Debug)]
#[command(name = "wizard")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    WIZARD_DEBUG=1     Enable debug logging (alternative to --debug)")]
pub struct Cli {
    /// Enable debug logging (writes to ~/.wizard/wizard.log)
    #[arg(short = 'd', long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List the steps of the asset creation workflow
    Steps,

    /// List stored workflows
    List,

    /// Start a new workflow
    Start {
        /// Initial data as a JSON object
        #[arg(long)]
        data: Option<String>,
    },

    /// Show a workflow's state and progress
    Show { workflow_id: String },

    /// Merge fields into a step
    Update {
        workflow_id: String,
        step: StepName,
        /// Fields as a JSON object
        data: String,
    },

    /// Move to the next step
    Next { workflow_id: String },

    /// Move to the previous step
    Prev { workflow_id: String },

    /// Jump to a step
    Goto { workflow_id: String, step: StepName },

    /// Validate the current step
    Validate { workflow_id: String },

    /// Save the current data as a draft
    Save { workflow_id: String },

    /// Finish the workflow and create the asset
    Complete { workflow_id: String },

    /// Abandon the workflow
    Cancel { workflow_id: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    wizard::log::init_with_debug(cli.debug);
    if cli.debug {
        wlog!("Wizard starting (debug mode enabled)");
    } else {
        wlog!("Wizard starting");
    }

    let rt = tokio::runtime::Runtime::new()?;
    let output = rt.block_on(run(cli.command))?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(command: Command) -> Result<Value> {
    let config = Config::load()?;
    config.ensure_dirs()?;

    let registry = Arc::new(StepRegistry::asset_creation());
    let validator = Validator::new(registry.clone())?.with_asset_rules();
    let backend = Arc::new(FileBackend::new(config.store_path()?, validator.clone()));

    // One-shot process: nothing would outlive the command to autosave.
    let mut engine_config = config.engine_config();
    engine_config.autosave.enabled = false;
    let engine = WorkflowEngine::builder(backend.clone(), validator)
        .with_config(engine_config)
        .build();

    match command {
        Command::Steps => Ok(serde_json::to_value(registry.steps())?),
        Command::List => {
            let store = backend.load().await?;
            let mut workflows: Vec<_> = store.workflows.values().collect();
            workflows.sort_by_key(|stored| stored.state.created_at);
            Ok(Value::Array(
                workflows
                    .into_iter()
                    .map(|stored| {
                        json!({
                            "id": stored.state.id,
                            "status": stored.state.status,
                            "current_step": stored.state.current_step,
                            "updated_at": stored.state.updated_at,
                            "entity_id": stored.entity_id,
                        })
                    })
                    .collect(),
            ))
        }
        Command::Start { data } => {
            let initial = data.as_deref().map(parse_data).transpose()?;
            engine.start(initial).await?;
            describe(&engine).await
        }
        Command::Show { workflow_id } => {
            open(&engine, &backend, &workflow_id).await?;
            describe(&engine).await
        }
        Command::Update {
            workflow_id,
            step,
            data,
        } => {
            open(&engine, &backend, &workflow_id).await?;
            let validation = engine.update_step(step, parse_data(&data)?).await?;
            Ok(json!({ "step": step, "validation": validation }))
        }
        Command::Next { workflow_id } => {
            open(&engine, &backend, &workflow_id).await?;
            let outcome = engine.next_step().await?;
            Ok(transition_json(&outcome))
        }
        Command::Prev { workflow_id } => {
            open(&engine, &backend, &workflow_id).await?;
            let outcome = engine.previous_step().await?;
            Ok(transition_json(&outcome))
        }
        Command::Goto { workflow_id, step } => {
            open(&engine, &backend, &workflow_id).await?;
            let outcome = engine.navigate_to_step(step).await?;
            Ok(transition_json(&outcome))
        }
        Command::Validate { workflow_id } => {
            open(&engine, &backend, &workflow_id).await?;
            Ok(serde_json::to_value(engine.validate_current().await?)?)
        }
        Command::Save { workflow_id } => {
            open(&engine, &backend, &workflow_id).await?;
            match engine.save_workflow_draft().await? {
                DraftSave::Saved { at } => Ok(json!({ "saved_at": at })),
                DraftSave::Skipped => Ok(json!({ "skipped": true })),
            }
        }
        Command::Complete { workflow_id } => {
            let id = open(&engine, &backend, &workflow_id).await?;
            let entity_id = engine.complete_workflow().await?;
            Ok(json!({ "workflow_id": id, "entity_id": entity_id }))
        }
        Command::Cancel { workflow_id } => {
            let id = open(&engine, &backend, &workflow_id).await?;
            engine.cancel_workflow().await?;
            Ok(json!({ "workflow_id": id, "status": "cancelled" }))
        }
    }
}

fn parse_data(text: &str) -> Result<WorkflowData> {
    WorkflowData::from_value(serde_json::from_str(text)?)
}

/// Resume the workflow named by a full id or a unique prefix.
async fn open(engine: &WorkflowEngine, backend: &FileBackend, id: &str) -> Result<WorkflowId> {
    let workflow_id = parse_workflow_id(id, backend).await?;
    engine.resume(workflow_id).await?;
    Ok(workflow_id)
}

async fn parse_workflow_id(id: &str, backend: &FileBackend) -> Result<WorkflowId> {
    if let Ok(workflow_id) = id.parse::<WorkflowId>() {
        return Ok(workflow_id);
    }

    let store = backend.load().await?;
    let matches: Vec<_> = store
        .workflows
        .keys()
        .filter(|workflow_id| workflow_id.to_string().starts_with(id))
        .collect();

    match matches.as_slice() {
        [] => Err(Error::WorkflowNotFound(id.to_string())),
        [only] => Ok(**only),
        _ => Err(Error::Validation(format!(
            "Ambiguous workflow ID '{}' matches {} workflows",
            id,
            matches.len()
        ))),
    }
}

async fn describe(engine: &WorkflowEngine) -> Result<Value> {
    let state = engine.current().await.ok_or(Error::NoActiveWorkflow)?;
    Ok(json!({
        "workflow": state,
        "progress": engine.progress().await,
        "validation": engine.validate_current().await?,
        "can_navigate_next": engine.can_navigate_next().await,
        "can_navigate_previous": engine.can_navigate_previous().await,
    }))
}

fn transition_json(outcome: &TransitionOutcome) -> Value {
    match outcome {
        TransitionOutcome::Moved {
            from,
            to,
            validation,
        } => json!({ "moved": true, "from": from, "to": to, "validation": validation }),
        TransitionOutcome::Blocked { validation } => {
            json!({ "moved": false, "reason": "blocked", "validation": validation })
        }
        TransitionOutcome::Busy => json!({ "moved": false, "reason": "busy" }),
        TransitionOutcome::AtBoundary => json!({ "moved": false, "reason": "at_boundary" }),
    }
}
