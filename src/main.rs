//! Helmsman CLI - board gating, sprints, and dependency scheduling.

use std::env;
use std::path::{Path, PathBuf};
use std::process;

use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use helmsman::cli::{
    ChecklistCommands, Cli, ColumnCommands, Commands, ConfigCommands, DepCommands, ItemCommands,
    PhaseCommands, ProjectCommands, ScheduleCommands, SprintCommands, SystemCommands, WbsCommands,
};
use helmsman::commands::{
    self, Ack, Listing, Output, board, hierarchy, schedule as sched, sprint,
};
use helmsman::config::{
    self, ConfigOverrides, OutputFormat, ResolvedConfig, resolve_config, session_config_path,
    system_config_path,
};
use helmsman::models::{RolloverAction, RolloverDecision, shift_date};
use helmsman::storage::{NewPhase, NewWorkItem, Storage, get_storage_dir};
use helmsman::{Error, Result};

/// Environment variable holding the tracing filter directive.
const LOG_ENV: &str = "HM_LOG";

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let workspace = match resolve_workspace(cli.workspace) {
        Ok(path) => path,
        Err(e) => fail(&e, cli.human_readable),
    };

    let overrides = if cli.human_readable {
        ConfigOverrides::new().with_output_format(OutputFormat::Human)
    } else {
        ConfigOverrides::new()
    };
    let settings = match load_settings(&workspace, &overrides) {
        Ok(settings) => settings,
        Err(e) => fail(&e, cli.human_readable),
    };
    let human = settings.output_format() == OutputFormat::Human;

    if let Err(e) = run_command(cli.command, &workspace, &settings, human) {
        tracing::debug!(error = %e, kind = ?e.kind(), "command failed");
        fail(&e, human);
    }
}

/// Install the stderr subscriber. `--verbose` wins over `HM_LOG`.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn fail(e: &Error, human: bool) -> ! {
    if human {
        eprintln!("Error: {}", e);
    } else {
        eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
    }
    process::exit(1);
}

/// Explicit workspace (flag or `HM_WORKSPACE`) must exist; otherwise the current directory.
fn resolve_workspace(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) if !path.exists() => Err(Error::InvalidInput(format!(
            "Specified workspace does not exist: {}",
            path.display()
        ))),
        Some(path) => Ok(path),
        None => Ok(env::current_dir()?),
    }
}

fn load_settings(workspace: &Path, overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    let storage_root = get_storage_dir(workspace)?;
    let session = storage_root.exists().then_some(storage_root.as_path());
    resolve_config(system_config_path().as_deref(), session, overrides)
}

fn open(workspace: &Path, settings: &ResolvedConfig) -> Result<Storage> {
    let storage = Storage::open(workspace)?;
    storage.set_busy_timeout(settings.busy_timeout())?;
    Ok(storage)
}

/// Print output in JSON or human-readable format.
fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}

fn run_command(
    command: Commands,
    workspace: &Path,
    settings: &ResolvedConfig,
    human: bool,
) -> Result<()> {
    match command {
        Commands::System { command } => match command {
            SystemCommands::Init => output(&commands::system_init(workspace)?, human),
            SystemCommands::Info => output(&commands::system_info(workspace)?, human),
        },

        Commands::Config { command } => match command {
            ConfigCommands::List => output(settings, human),
            ConfigCommands::Set { key, value, system } => {
                let path = if system {
                    system_config_path().ok_or_else(|| {
                        Error::Other("Could not determine config directory".to_string())
                    })?
                } else {
                    let storage = Storage::open(workspace)?;
                    session_config_path(storage.root())
                };
                let mut file = config::read_config(&path)?;
                file.set(&key, &value).map_err(Error::InvalidInput)?;
                config::write_config(&path, &file)?;
                output(
                    &Ack::new(format!("Set {} = {} in {}", key, value, path.display())),
                    human,
                );
            }
        },

        Commands::Project { command } => {
            let mut storage = open(workspace, settings)?;
            match command {
                ProjectCommands::Create {
                    name,
                    methodology,
                    done_status,
                    default_start,
                } => {
                    let done = done_status.as_deref().unwrap_or(settings.done_status());
                    let project =
                        storage.create_project(&name, methodology, Some(done), default_start)?;
                    output(&project, human);
                }
                ProjectCommands::List => output(&Listing::from(storage.list_projects()?), human),
                ProjectCommands::Show { id } => output(&storage.get_project(id)?, human),
            }
        }

        Commands::Column { command } => {
            let mut storage = open(workspace, settings)?;
            match command {
                ColumnCommands::Add {
                    project,
                    name,
                    col_type,
                    board,
                    wip,
                } => output(
                    &storage.create_column(project, &name, col_type, &board, wip)?,
                    human,
                ),
                ColumnCommands::List { project, board } => output(
                    &Listing::from(storage.list_columns(project, board.as_deref())?),
                    human,
                ),
                ColumnCommands::Wip { project, id, limit } => {
                    output(&storage.set_wip_limit(project, id, limit)?, human)
                }
                ColumnCommands::Delete { project, id } => {
                    storage.delete_column(project, id)?;
                    output(&Ack::new(format!("Deleted column {}", id)), human);
                }
            }
        }

        Commands::Item { command } => {
            let mut storage = open(workspace, settings)?;
            run_item(&mut storage, command, human)?;
        }

        Commands::Checklist { command } => {
            let mut storage = open(workspace, settings)?;
            match command {
                ChecklistCommands::Add {
                    project,
                    item,
                    label,
                    kind,
                } => output(&storage.add_checklist_item(project, item, kind, &label)?, human),
                ChecklistCommands::Check {
                    project,
                    id,
                    uncheck,
                } => output(&storage.set_checklist_checked(project, id, !uncheck)?, human),
                ChecklistCommands::List { project, item } => {
                    output(&Listing::from(storage.list_checklist(project, item)?), human)
                }
            }
        }

        Commands::Sprint { command } => {
            let mut storage = open(workspace, settings)?;
            run_sprint(&mut storage, command, settings, human)?;
        }

        Commands::Phase { command } => {
            let mut storage = open(workspace, settings)?;
            match command {
                PhaseCommands::Add {
                    project,
                    name,
                    start,
                    end,
                    gate,
                    color,
                } => {
                    let new = NewPhase {
                        is_gate: gate,
                        color,
                        ..NewPhase::new(name, start, end)
                    };
                    output(&storage.create_phase(project, new)?, human);
                }
                PhaseCommands::Update {
                    project,
                    id,
                    name,
                    progress,
                    color,
                } => {
                    let mut phase = storage.get_phase(project, id)?;
                    if let Some(name) = name {
                        phase.name = name;
                    }
                    if let Some(progress) = progress {
                        phase.progress = progress;
                    }
                    if color.is_some() {
                        phase.color = color;
                    }
                    output(&storage.update_phase(&phase)?, human);
                }
                PhaseCommands::List { project } => {
                    output(&Listing::from(storage.list_phases(project)?), human)
                }
            }
        }

        Commands::Dep { command } => {
            let mut storage = open(workspace, settings)?;
            match command {
                DepCommands::Add {
                    project,
                    predecessor,
                    successor,
                    kind,
                    dep_type,
                    lag,
                } => output(
                    &sched::add_dependency(
                        &mut storage,
                        project,
                        kind,
                        predecessor,
                        successor,
                        dep_type,
                        lag,
                    )?,
                    human,
                ),
                DepCommands::Remove {
                    project,
                    predecessor,
                    successor,
                    kind,
                } => output(
                    &sched::remove_dependency(&mut storage, project, kind, predecessor, successor)?,
                    human,
                ),
                DepCommands::List { project, kind } => output(
                    &Listing::from(storage.list_dependencies(project, kind)?),
                    human,
                ),
            }
        }

        Commands::Schedule { command } => {
            let mut storage = open(workspace, settings)?;
            match command {
                ScheduleCommands::Recalc { project } => {
                    output(&sched::recalculate_schedule(&mut storage, project)?, human)
                }
                ScheduleCommands::Baseline { project } => {
                    output(&sched::save_baseline(&mut storage, project)?, human)
                }
                ScheduleCommands::Variance { project } => {
                    output(&sched::schedule_variance(&storage, project)?, human)
                }
                ScheduleCommands::SetDates {
                    project,
                    id,
                    kind,
                    start,
                    end,
                } => output(
                    &sched::set_dates(&mut storage, project, kind, id, start, end)?,
                    human,
                ),
            }
        }

        Commands::Wbs { command } => {
            let mut storage = open(workspace, settings)?;
            match command {
                WbsCommands::Show { project } => {
                    output(&hierarchy::outline(&storage, project)?, human)
                }
                WbsCommands::Indent { project, number } => {
                    output(&hierarchy::indent(&mut storage, project, number)?, human)
                }
                WbsCommands::Outdent { project, number } => {
                    output(&hierarchy::outdent(&mut storage, project, number)?, human)
                }
                WbsCommands::Reparent {
                    project,
                    number,
                    parent,
                } => output(
                    &hierarchy::reparent(&mut storage, project, number, parent)?,
                    human,
                ),
            }
        }

        Commands::Log { project, item } => {
            let storage = open(workspace, settings)?;
            storage.get_project(project)?;
            output(&Listing::from(storage.list_activity(project, item)?), human);
        }
    }
    Ok(())
}

fn run_item(storage: &mut Storage, command: ItemCommands, human: bool) -> Result<()> {
    match command {
        ItemCommands::Add {
            project,
            title,
            description,
            status,
            column,
            sprint,
            phase,
            points,
            duration,
            start,
            end,
            milestone,
            parent,
        } => {
            let new = NewWorkItem {
                description,
                status,
                column_id: column,
                sprint_id: sprint,
                phase_id: phase,
                story_points: points,
                duration,
                start_date: start,
                end_date: end,
                is_milestone: milestone,
                parent,
                ..NewWorkItem::titled(title)
            };
            output(&storage.create_work_item(project, new)?, human);
        }
        ItemCommands::Show { project, number } => {
            output(&storage.get_work_item(project, number)?, human)
        }
        ItemCommands::List { project, all } => {
            storage.get_project(project)?;
            output(&Listing::from(storage.list_work_items(project, all)?), human);
        }
        ItemCommands::Update {
            project,
            number,
            title,
            description,
            status,
            points,
            duration,
            business_value,
            time_criticality,
            risk_reduction,
            job_size,
        } => {
            let mut item = storage.get_work_item(project, number)?;
            if let Some(title) = title {
                item.title = title;
            }
            if description.is_some() {
                item.description = description;
            }
            if let Some(status) = status {
                item.status = status;
            }
            if points.is_some() {
                item.story_points = points;
            }
            if duration.is_some() {
                item.duration = duration;
            }
            if let Some(v) = business_value {
                item.wsjf.business_value = v;
            }
            if let Some(v) = time_criticality {
                item.wsjf.time_criticality = v;
            }
            if let Some(v) = risk_reduction {
                item.wsjf.risk_reduction = v;
            }
            if let Some(v) = job_size {
                item.wsjf.job_size = v;
            }
            output(&storage.update_work_item(&item)?, human);
        }
        ItemCommands::Move {
            project,
            number,
            column,
            position,
        } => {
            let position = position.unwrap_or(i64::MAX);
            output(
                &board::attempt_move(storage, project, number, column, position)?,
                human,
            );
        }
        ItemCommands::Archive { project, number } => {
            output(&storage.archive_work_item(project, number)?, human)
        }
    }
    Ok(())
}

fn run_sprint(
    storage: &mut Storage,
    command: SprintCommands,
    settings: &ResolvedConfig,
    human: bool,
) -> Result<()> {
    match command {
        SprintCommands::Create {
            project,
            name,
            goal,
            phase,
        } => output(
            &sprint::create_sprint(storage, project, name.as_deref(), goal.as_deref(), phase)?,
            human,
        ),
        SprintCommands::Start {
            project,
            id,
            start,
            end,
        } => {
            let start = start.unwrap_or_else(|| Utc::now().date_naive());
            let end = match end {
                Some(end) => end,
                None => {
                    let days = i64::from(settings.sprint_length_days());
                    shift_date(start, days).ok_or_else(|| {
                        Error::InvalidInput(format!(
                            "A {}-day sprint from {} is out of range",
                            days, start
                        ))
                    })?
                }
            };
            output(&sprint::start_sprint(storage, project, id, start, end)?, human);
        }
        SprintCommands::Close { project, id } => {
            output(&sprint::close_sprint(storage, project, id)?, human)
        }
        SprintCommands::Snapshot { project, id } => {
            output(&sprint::record_snapshot(storage, project, id)?, human)
        }
        SprintCommands::Rollover {
            project,
            id,
            next,
            backlog,
        } => {
            let decisions: Vec<RolloverDecision> = next
                .into_iter()
                .map(|work_item| RolloverDecision {
                    work_item,
                    action: RolloverAction::NextSprint,
                })
                .chain(backlog.into_iter().map(|work_item| RolloverDecision {
                    work_item,
                    action: RolloverAction::Backlog,
                }))
                .collect();
            output(&sprint::rollover(storage, project, id, &decisions)?, human);
        }
        SprintCommands::Burndown { project, id } => {
            output(&sprint::burndown(storage, project, id)?, human)
        }
        SprintCommands::List { project } => {
            storage.get_project(project)?;
            output(&Listing::from(storage.list_sprints(project)?), human);
        }
    }
    Ok(())
}
