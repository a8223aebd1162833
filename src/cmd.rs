//! Command implementations for the CLI interface.
//!
//! Handlers resolve user-typed identifiers against the loaded state, call the
//! workspace stores, and print the outcome. Errors go to stderr and end the
//! process with a non-zero status.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate, NaiveTime};
use clap::Subcommand;
use clap_complete::{generate, Shell};

use crate::client::{Client, ClientDraft, ClientPatch};
use crate::config::Config;
use crate::dates::{end_after, format_time, parse_time, require_date};
use crate::db::{Database, Record};
use crate::display::*;
use crate::error::{Error, Result};
use crate::fields::*;
use crate::gateway::FileUpload;
use crate::meeting::{Meeting, MeetingDraft, MeetingPatch, TimeSlot};
use crate::project::{format_file_size, Phase, PhaseDraft, PhasePatch, Project, ProjectDraft, ProjectPatch};
use crate::schedule::{shift_weeks, week_window, WeekSchedule, WeeklyStats};
use crate::stats::{execute_now, upcoming_meetings, DashboardStats, EXECUTE_NOW_LIMIT};
use crate::task::{Task, TaskDraft, TaskPatch};
use crate::workspace::Workspace;

#[derive(Subcommand)]
pub enum Commands {
    /// Manage clients.
    Client {
        #[command(subcommand)]
        action: ClientAction,
    },

    /// Manage projects.
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Manage the phases of a project.
    Phase {
        #[command(subcommand)]
        action: PhaseAction,
    },

    /// Manage tasks and their status history.
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },

    /// Schedule and track meetings.
    Meeting {
        #[command(subcommand)]
        action: MeetingAction,
    },

    /// Files attached to a project.
    File {
        #[command(subcommand)]
        action: FileAction,
    },

    /// Suggested phase and task breakdowns.
    Plan {
        #[command(subcommand)]
        action: PlanAction,
    },

    /// Show the Monday-Sunday week containing a date.
    Week {
        /// Any date in the week: YYYY-MM-DD, "today", "next monday", "in 3d".
        #[arg(long)]
        date: Option<String>,
        /// Move forward (positive) or back (negative) this many weeks.
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        shift: i32,
    },

    /// Headline figures, tasks to execute now and upcoming meetings.
    Dashboard,

    /// List records whose parent no longer exists.
    Orphans,

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ClientAction {
    /// Add a client.
    Add {
        name: String,
        #[arg(long, default_value = "")]
        company: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, value_enum, default_value_t = ClientStatus::Lead)]
        status: ClientStatus,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// List clients, newest first.
    List {
        /// Case-insensitive match on name or company.
        #[arg(long)]
        search: Option<String>,
    },
    /// Update fields on a client.
    Update {
        /// Client id, id prefix or name.
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long, value_enum)]
        status: Option<ClientStatus>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Delete a client. Its projects are kept; see `spm orphans`.
    Rm { id: String },
}

#[derive(Subcommand)]
pub enum ProjectAction {
    /// Add a project for a client.
    Add {
        name: String,
        /// Client id, id prefix or name.
        #[arg(long)]
        client: String,
        #[arg(long, default_value = "")]
        desc: String,
        #[arg(long, default_value_t = 0.0)]
        value: f64,
        /// Start date, defaults to today.
        #[arg(long)]
        start: Option<String>,
        /// Due date.
        #[arg(long)]
        due: String,
        /// Attach this file once the project exists.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// List projects, newest first.
    List {
        #[arg(long)]
        search: Option<String>,
    },
    /// Show a project with its phases, tasks, meetings and files.
    View { id: String },
    /// Update fields on a project.
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        desc: Option<String>,
        #[arg(long)]
        value: Option<f64>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        due: Option<String>,
        #[arg(long, value_enum)]
        status: Option<ProjectStatus>,
        /// Mark a phase of this project as the current one.
        #[arg(long, conflicts_with = "clear_phase")]
        phase: Option<String>,
        #[arg(long)]
        clear_phase: bool,
    },
    /// Delete a project with its phases, tasks, meetings and files.
    Rm { id: String },
}

#[derive(Subcommand)]
pub enum PhaseAction {
    /// Add a phase to a project.
    Add {
        /// Project id, id prefix or name.
        project: String,
        name: String,
        /// Defaults to after the existing phases.
        #[arg(long)]
        order: Option<i32>,
        #[arg(long, value_enum, default_value_t = PhaseStatus::NotStarted)]
        status: PhaseStatus,
    },
    /// Update fields on a phase.
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        order: Option<i32>,
        #[arg(long, value_enum)]
        status: Option<PhaseStatus>,
    },
    /// Delete a phase and its tasks.
    Rm { id: String },
}

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a task to a phase.
    Add {
        title: String,
        /// Project id, id prefix or name.
        #[arg(long)]
        project: String,
        /// Phase id, id prefix or name within the project.
        #[arg(long)]
        phase: String,
        #[arg(long, default_value = "")]
        desc: String,
        /// Start date, defaults to today.
        #[arg(long)]
        date: Option<String>,
        /// Start time (HH:MM).
        #[arg(long, default_value = "09:00")]
        start: String,
        /// End date, defaults to the start date.
        #[arg(long)]
        end_date: Option<String>,
        /// End time (HH:MM), defaults to start plus the estimate.
        #[arg(long)]
        end: Option<String>,
        #[arg(long, default_value_t = 1.0)]
        hours: f64,
        #[arg(long, value_enum, default_value_t = TaskPriority::Medium)]
        priority: TaskPriority,
    },
    /// List tasks, newest first.
    List {
        #[arg(long)]
        project: Option<String>,
        #[arg(long, value_enum)]
        status: Option<TaskStatus>,
        /// Only tasks past their end date and not completed.
        #[arg(long)]
        delayed: bool,
    },
    /// Move a task to a new status, recording an observation.
    Status {
        id: String,
        #[arg(value_enum)]
        status: TaskStatus,
        /// What happened; a placeholder is recorded when omitted.
        #[arg(long)]
        note: Option<String>,
    },
    /// Update fields on a task.
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        desc: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end_date: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        hours: Option<f64>,
        #[arg(long, value_enum)]
        priority: Option<TaskPriority>,
    },
    /// Show the status history of a task, newest first.
    History { id: String },
    /// Delete a task.
    Rm { id: String },
}

#[derive(Subcommand)]
pub enum MeetingAction {
    /// Schedule a meeting for a project.
    Add {
        title: String,
        #[arg(long)]
        project: String,
        #[arg(long)]
        date: String,
        /// HH:MM
        #[arg(long)]
        start: String,
        /// HH:MM
        #[arg(long)]
        end: String,
        #[arg(long, default_value = "")]
        agenda: String,
        #[arg(long, default_value = "")]
        notes: String,
        /// Schedule even if it overlaps another meeting.
        #[arg(long)]
        force: bool,
    },
    /// List meetings by date.
    List {
        /// Case-insensitive match on title or agenda.
        #[arg(long)]
        search: Option<String>,
        /// Only scheduled meetings from today on.
        #[arg(long)]
        upcoming: bool,
    },
    /// Mark a meeting as held.
    Held {
        id: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Cancel a meeting.
    Cancel { id: String },
    /// Update fields on a meeting.
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        agenda: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Delete a meeting.
    Rm { id: String },
}

#[derive(Subcommand)]
pub enum FileAction {
    /// List the files of a project, newest first.
    List { project: String },
    /// Attach a local file to a project.
    Upload {
        project: String,
        path: PathBuf,
        /// Stored name, defaults to the file name.
        #[arg(long)]
        name: Option<String>,
        /// MIME type, guessed from the extension when omitted.
        #[arg(long)]
        mime: Option<String>,
    },
    /// Write a stored file to disk.
    Download {
        project: String,
        file: String,
        /// Destination, defaults to the stored name in the current directory.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Remove a file from a project.
    Rm { project: String, file: String },
}

#[derive(Subcommand)]
pub enum PlanAction {
    /// Ask the plan service for phases and tasks.
    Suggest {
        project: String,
        /// Create the suggested phases and tasks.
        #[arg(long)]
        apply: bool,
    },
}

/// Everything a handler needs.
pub struct Context {
    pub ws: Workspace,
    pub config: Config,
    pub today: NaiveDate,
}

impl Context {
    pub fn new(ws: Workspace, config: Config) -> Self {
        Context {
            ws,
            config,
            today: Local::now().date_naive(),
        }
    }
}

fn die(msg: impl std::fmt::Display) -> ! {
    eprintln!("{msg}");
    std::process::exit(1);
}

fn or_die<T>(result: Result<T>) -> T {
    result.unwrap_or_else(|e| die(e))
}

fn client_name(c: &Client) -> &str {
    &c.name
}

fn project_name(p: &Project) -> &str {
    &p.name
}

fn phase_name(p: &Phase) -> &str {
    &p.name
}

fn task_title(t: &Task) -> &str {
    &t.title
}

fn meeting_title(m: &Meeting) -> &str {
    &m.title
}

/// Pick one record by exact id, then unique id prefix, then exact name
/// (case-insensitive).
fn pick<R: Record>(candidates: &[&R], input: &str, name_of: fn(&R) -> &str) -> Result<String> {
    let input = input.trim();
    if let Some(r) = candidates.iter().find(|r| r.id() == input) {
        return Ok(r.id().to_string());
    }
    let mut matches: Vec<&&R> = candidates.iter().filter(|r| r.id().starts_with(input)).collect();
    if matches.is_empty() {
        matches = candidates
            .iter()
            .filter(|r| name_of(r).eq_ignore_ascii_case(input))
            .collect();
    }
    match matches.as_slice() {
        [one] => Ok(one.id().to_string()),
        [] => Err(Error::not_found(R::KIND, input)),
        many => Err(Error::InvalidInput(format!(
            "'{input}' matches {} {} records; use a longer id",
            many.len(),
            R::KIND
        ))),
    }
}

fn resolve<R: Record>(db: &Database, input: &str, name_of: fn(&R) -> &str) -> String {
    let all: Vec<&R> = db.all::<R>().iter().collect();
    or_die(pick(&all, input, name_of))
}

fn resolve_phase(db: &Database, project_id: &str, input: &str) -> String {
    or_die(pick(&db.phases_for_project(project_id), input, phase_name))
}

fn date_arg(input: &str, today: NaiveDate) -> NaiveDate {
    or_die(require_date(input, today))
}

fn opt_date(input: Option<String>, today: NaiveDate) -> Option<NaiveDate> {
    input.map(|s| date_arg(&s, today))
}

fn opt_time(input: Option<String>) -> Option<NaiveTime> {
    input.map(|s| or_die(parse_time(&s)))
}

/// Longest estimate accepted on the command line.
pub const MAX_ESTIMATED_HOURS: f64 = 10_000.0;

fn check_hours(hours: f64) -> Result<f64> {
    if hours.is_finite() && (0.0..=MAX_ESTIMATED_HOURS).contains(&hours) {
        Ok(hours)
    } else {
        Err(Error::InvalidInput(format!(
            "estimated hours must be between 0 and {MAX_ESTIMATED_HOURS}, got {hours}"
        )))
    }
}

/// End of a new task. Without `--end` it is the start plus the estimate,
/// carried onto the next day past midnight unless `--end-date` was given.
fn task_end(
    start_date: NaiveDate,
    start_time: NaiveTime,
    end_date: Option<NaiveDate>,
    end_time: Option<NaiveTime>,
    hours: f64,
) -> Result<(NaiveDate, NaiveTime)> {
    let end = match (end_date, end_time) {
        (date, Some(time)) => (date.unwrap_or(start_date), time),
        (Some(date), None) => (date, end_after(start_date, start_time, hours)?.1),
        (None, None) => end_after(start_date, start_time, hours)?,
    };
    if end < (start_date, start_time) {
        return Err(Error::InvalidInput(format!(
            "task ends at {} {}, before it starts",
            end.0,
            format_time(end.1)
        )));
    }
    Ok(end)
}

fn check_slot(slot: &TimeSlot) -> Result<()> {
    if slot.is_ordered() {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "meeting must end after it starts ({}-{})",
            format_time(slot.start),
            format_time(slot.end)
        )))
    }
}

/// Guess a MIME type from a file extension.
pub fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "txt" | "md" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "zip" => "application/zip",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}

async fn read_upload(path: &Path, name: Option<String>, mime: Option<String>) -> FileUpload {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => die(format!("Failed to read {}: {e}", path.display())),
    };
    let name = name
        .or_else(|| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "upload".to_string());
    FileUpload {
        name,
        mime_type: mime.unwrap_or_else(|| guess_mime(path).to_string()),
        bytes,
    }
}

pub async fn run(ctx: &mut Context, command: Commands) {
    match command {
        Commands::Client { action } => cmd_client(ctx, action).await,
        Commands::Project { action } => cmd_project(ctx, action).await,
        Commands::Phase { action } => cmd_phase(ctx, action).await,
        Commands::Task { action } => cmd_task(ctx, action).await,
        Commands::Meeting { action } => cmd_meeting(ctx, action).await,
        Commands::File { action } => cmd_file(ctx, action).await,
        Commands::Plan { action } => cmd_plan(ctx, action).await,
        Commands::Week { date, shift } => cmd_week(ctx, date, shift),
        Commands::Dashboard => cmd_dashboard(ctx),
        Commands::Orphans => print_orphans(&ctx.ws.state().orphans()),
        Commands::Completions { shell } => cmd_completions(shell),
    }
}

pub async fn cmd_client(ctx: &mut Context, action: ClientAction) {
    match action {
        ClientAction::Add { name, company, email, phone, status, notes } => {
            if name.trim().is_empty() {
                die("Client name cannot be empty.");
            }
            let draft = ClientDraft { name, company, email, phone, status, observations: notes };
            let Some(client) = ctx.ws.clients().create(draft).await else {
                die("Failed to add client.");
            };
            println!("Added client {} ({})", client.name, client.id);
        }
        ClientAction::List { search } => {
            let clients = ctx.ws.clients().list(search.as_deref());
            if clients.is_empty() {
                println!("No clients found.");
            } else {
                print_clients(&clients);
            }
        }
        ClientAction::Update { id, name, company, email, phone, status, notes } => {
            let id = resolve::<Client>(ctx.ws.state(), &id, client_name);
            let patch = ClientPatch { name, company, email, phone, status, observations: notes };
            if ctx.ws.clients().update(&id, patch).await.is_none() {
                die(format!("Failed to update client {id}."));
            }
            println!("Updated client {id}");
        }
        ClientAction::Rm { id } => {
            let id = resolve::<Client>(ctx.ws.state(), &id, client_name);
            let owned = ctx.ws.state().projects.iter().filter(|p| p.client_id == id).count();
            if !ctx.ws.clients().delete(&id).await {
                die(format!("Failed to delete client {id}."));
            }
            println!("Deleted client {id}");
            if owned > 0 {
                println!("{owned} project(s) still reference it; see `spm orphans`.");
            }
        }
    }
}

pub async fn cmd_project(ctx: &mut Context, action: ProjectAction) {
    let today = ctx.today;
    match action {
        ProjectAction::Add { name, client, desc, value, start, due, file } => {
            let client_id = resolve::<Client>(ctx.ws.state(), &client, client_name);
            let start_date = opt_date(start, today).unwrap_or(today);
            let due_date = date_arg(&due, today);
            if due_date < start_date {
                die("Due date is before the start date.");
            }
            let draft = ProjectDraft { client_id, name, description: desc, value, start_date, due_date };

            match file {
                Some(path) => {
                    let upload = read_upload(&path, None, None).await;
                    let Some((project, stored)) = ctx.ws.projects().create_with_file(draft, upload).await else {
                        die("Failed to add project.");
                    };
                    println!("Added project {} ({})", project.name, project.id);
                    match stored {
                        Some(f) => println!("Attached {} ({})", f.name, f.id),
                        None => eprintln!("Project created, but attaching {} failed.", path.display()),
                    }
                }
                None => {
                    let Some(project) = ctx.ws.projects().create(draft).await else {
                        die("Failed to add project.");
                    };
                    println!("Added project {} ({})", project.name, project.id);
                }
            }
        }
        ProjectAction::List { search } => {
            let projects: Vec<Project> = ctx.ws.projects().list(search.as_deref()).into_iter().cloned().collect();
            if projects.is_empty() {
                println!("No projects found.");
            } else {
                let rows: Vec<&Project> = projects.iter().collect();
                print_projects(&rows, ctx.ws.state());
            }
        }
        ProjectAction::View { id } => {
            let db = ctx.ws.state();
            let id = resolve::<Project>(db, &id, project_name);
            if let Some(project) = db.get::<Project>(&id) {
                print_project_detail(project, db, today);
            }
        }
        ProjectAction::Update { id, name, desc, value, start, due, status, phase, clear_phase } => {
            let db = ctx.ws.state();
            let id = resolve::<Project>(db, &id, project_name);
            let current_phase_id = match (phase, clear_phase) {
                (Some(p), _) => Some(Some(resolve_phase(db, &id, &p))),
                (None, true) => Some(None),
                (None, false) => None,
            };
            let patch = ProjectPatch {
                name,
                description: desc,
                value,
                start_date: opt_date(start, today),
                due_date: opt_date(due, today),
                status,
                current_phase_id,
            };
            if ctx.ws.projects().update(&id, patch).await.is_none() {
                die(format!("Failed to update project {id}."));
            }
            println!("Updated project {id}");
        }
        ProjectAction::Rm { id } => {
            let id = resolve::<Project>(ctx.ws.state(), &id, project_name);
            if !ctx.ws.projects().delete(&id).await {
                die(format!("Failed to delete project {id}."));
            }
            println!("Deleted project {id} with its phases, tasks, meetings and files");
        }
    }
}

pub async fn cmd_phase(ctx: &mut Context, action: PhaseAction) {
    match action {
        PhaseAction::Add { project, name, order, status } => {
            let db = ctx.ws.state();
            let project_id = resolve::<Project>(db, &project, project_name);
            let order = order.unwrap_or_else(|| db.next_phase_order(&project_id));
            let draft = PhaseDraft { project_id, name, order, status };
            let Some(phase) = ctx.ws.phases().create(draft).await else {
                die("Failed to add phase.");
            };
            println!("Added phase {}. {} ({})", phase.order, phase.name, phase.id);
        }
        PhaseAction::Update { id, name, order, status } => {
            let id = resolve::<Phase>(ctx.ws.state(), &id, phase_name);
            if ctx.ws.phases().update(&id, PhasePatch { name, order, status }).await.is_none() {
                die(format!("Failed to update phase {id}."));
            }
            println!("Updated phase {id}");
        }
        PhaseAction::Rm { id } => {
            let id = resolve::<Phase>(ctx.ws.state(), &id, phase_name);
            let tasks = ctx.ws.state().tasks_for_phase(&id).len();
            if !ctx.ws.phases().delete(&id).await {
                die(format!("Failed to delete phase {id}."));
            }
            println!("Deleted phase {id} and {tasks} task(s)");
        }
    }
}

pub async fn cmd_task(ctx: &mut Context, action: TaskAction) {
    let today = ctx.today;
    match action {
        TaskAction::Add { title, project, phase, desc, date, start, end_date, end, hours, priority } => {
            let hours = or_die(check_hours(hours));
            let db = ctx.ws.state();
            let project_id = resolve::<Project>(db, &project, project_name);
            let phase_id = resolve_phase(db, &project_id, &phase);
            let start_date = opt_date(date, today).unwrap_or(today);
            let start_time = or_die(parse_time(&start));
            let (end_date, end_time) =
                or_die(task_end(start_date, start_time, opt_date(end_date, today), opt_time(end), hours));
            let draft = TaskDraft {
                project_id,
                phase_id,
                title,
                description: desc,
                start_date,
                start_time,
                end_date,
                end_time,
                estimated_hours: hours,
                priority,
            };
            let Some(task) = ctx.ws.tasks().create(draft).await else {
                die("Failed to add task.");
            };
            println!("Added task {} ({})", task.title, task.id);
        }
        TaskAction::List { project, status, delayed } => {
            let project_id = project.map(|p| resolve::<Project>(ctx.ws.state(), &p, project_name));
            let tasks: Vec<&Task> = ctx
                .ws
                .tasks()
                .list(project_id.as_deref())
                .into_iter()
                .filter(|t| status.map_or(true, |s| t.status == s))
                .filter(|t| !delayed || t.is_delayed(today))
                .collect();
            if tasks.is_empty() {
                println!("No tasks found.");
            } else {
                print_tasks(&tasks, today);
            }
        }
        TaskAction::Status { id, status, note } => {
            let id = resolve::<Task>(ctx.ws.state(), &id, task_title);
            let Some(before) = ctx.ws.state().get::<Task>(&id).map(|t| t.status) else {
                die(Error::not_found(Task::KIND, &id));
            };
            let Some(task) = ctx.ws.tasks().change_status(&id, status, note.as_deref()).await else {
                die(format!("Failed to change status of task {id}."));
            };
            if before == task.status {
                println!("Task {} is already {}; nothing recorded", task.title, task.status);
            } else {
                println!("Task {}: {before} -> {}", task.title, task.status);
            }
        }
        TaskAction::Update { id, title, desc, date, start, end_date, end, hours, priority } => {
            let id = resolve::<Task>(ctx.ws.state(), &id, task_title);
            let patch = TaskPatch {
                title,
                description: desc,
                start_date: opt_date(date, today),
                start_time: opt_time(start),
                end_date: opt_date(end_date, today),
                end_time: opt_time(end),
                estimated_hours: hours.map(|h| or_die(check_hours(h))),
                priority,
                ..Default::default()
            };
            if ctx.ws.tasks().update(&id, patch).await.is_none() {
                die(format!("Failed to update task {id}."));
            }
            println!("Updated task {id}");
        }
        TaskAction::History { id } => {
            let db = ctx.ws.state();
            let id = resolve::<Task>(db, &id, task_title);
            if let Some(task) = db.get::<Task>(&id) {
                print_history(task);
            }
        }
        TaskAction::Rm { id } => {
            let id = resolve::<Task>(ctx.ws.state(), &id, task_title);
            if !ctx.ws.tasks().delete(&id).await {
                die(format!("Failed to delete task {id}."));
            }
            println!("Deleted task {id}");
        }
    }
}

fn print_conflicts(conflicts: &[&Meeting]) {
    for m in conflicts {
        eprintln!(
            "  overlaps {} {} {}-{} ({})",
            m.title,
            m.date,
            format_time(m.start_time),
            format_time(m.end_time),
            short_id(&m.id)
        );
    }
}

pub async fn cmd_meeting(ctx: &mut Context, action: MeetingAction) {
    let today = ctx.today;
    match action {
        MeetingAction::Add { title, project, date, start, end, agenda, notes, force } => {
            let project_id = resolve::<Project>(ctx.ws.state(), &project, project_name);
            let draft = MeetingDraft {
                project_id,
                client_id: String::new(),
                title,
                agenda,
                date: date_arg(&date, today),
                start_time: or_die(parse_time(&start)),
                end_time: or_die(parse_time(&end)),
                observations: notes,
            };
            or_die(check_slot(&draft.slot()));
            let conflicts = ctx.ws.meetings().conflicts_for(&draft.slot(), None);
            if !conflicts.is_empty() {
                eprintln!("Schedule conflict:");
                print_conflicts(&conflicts);
                if !force {
                    die("Use --force to schedule anyway.");
                }
            }
            let Some(meeting) = ctx.ws.meetings().create(draft).await else {
                die("Failed to add meeting.");
            };
            println!("Scheduled meeting {} ({})", meeting.title, meeting.id);
        }
        MeetingAction::List { search, upcoming } => {
            let meetings: Vec<&Meeting> = if upcoming {
                upcoming_meetings(ctx.ws.state(), today)
                    .into_iter()
                    .filter(|m| search.as_deref().map_or(true, |n| m.matches(n)))
                    .collect()
            } else {
                ctx.ws.meetings().list(search.as_deref())
            };
            if meetings.is_empty() {
                println!("No meetings found.");
            } else {
                print_meetings(&meetings);
            }
        }
        MeetingAction::Held { id, notes } => {
            let id = resolve::<Meeting>(ctx.ws.state(), &id, meeting_title);
            if ctx.ws.meetings().mark_held(&id, notes).await.is_none() {
                die(format!("Failed to update meeting {id}."));
            }
            println!("Meeting {id} marked as held");
        }
        MeetingAction::Cancel { id } => {
            let id = resolve::<Meeting>(ctx.ws.state(), &id, meeting_title);
            if ctx.ws.meetings().cancel(&id).await.is_none() {
                die(format!("Failed to cancel meeting {id}."));
            }
            println!("Meeting {id} cancelled");
        }
        MeetingAction::Update { id, title, agenda, date, start, end, notes } => {
            let db = ctx.ws.state();
            let id = resolve::<Meeting>(db, &id, meeting_title);
            let patch = MeetingPatch {
                title,
                agenda,
                date: opt_date(date, today),
                start_time: opt_time(start),
                end_time: opt_time(end),
                observations: notes,
                ..Default::default()
            };
            let slot = db.get::<Meeting>(&id).map(|current| patch.slot_for(current));
            if let Some(slot) = slot {
                or_die(check_slot(&slot));
                let conflicts = ctx.ws.meetings().conflicts_for(&slot, Some(&id));
                if !conflicts.is_empty() {
                    eprintln!("Warning: the new time overlaps other meetings:");
                    print_conflicts(&conflicts);
                }
            }
            if ctx.ws.meetings().update(&id, patch).await.is_none() {
                die(format!("Failed to update meeting {id}."));
            }
            println!("Updated meeting {id}");
        }
        MeetingAction::Rm { id } => {
            let id = resolve::<Meeting>(ctx.ws.state(), &id, meeting_title);
            if !ctx.ws.meetings().delete(&id).await {
                die(format!("Failed to delete meeting {id}."));
            }
            println!("Deleted meeting {id}");
        }
    }
}

fn resolve_file(db: &Database, project_id: &str, input: &str) -> String {
    let Some(project) = db.get::<Project>(project_id) else {
        die(Error::not_found(Project::KIND, project_id));
    };
    let input = input.trim();
    let matches: Vec<&str> = project
        .files
        .iter()
        .filter(|f| f.id == input || f.id.starts_with(input) || f.name == input)
        .map(|f| f.id.as_str())
        .collect();
    match matches.as_slice() {
        [one] => one.to_string(),
        [] => die(Error::not_found("file", input)),
        _ => die(format!("'{input}' matches {} files; use a longer id", matches.len())),
    }
}

pub async fn cmd_file(ctx: &mut Context, action: FileAction) {
    match action {
        FileAction::List { project } => {
            let project_id = resolve::<Project>(ctx.ws.state(), &project, project_name);
            let files = ctx.ws.projects().refresh_files(&project_id).await;
            if files.is_empty() {
                println!("No files attached.");
            } else {
                print_files(&files);
            }
        }
        FileAction::Upload { project, path, name, mime } => {
            let project_id = resolve::<Project>(ctx.ws.state(), &project, project_name);
            let upload = read_upload(&path, name, mime).await;
            let Some(file) = ctx.ws.projects().upload_file(&project_id, upload).await else {
                die(format!("Failed to upload {}.", path.display()));
            };
            println!("Uploaded {} ({}, {})", file.name, format_file_size(file.size), file.id);
        }
        FileAction::Download { project, file, output } => {
            let db = ctx.ws.state();
            let project_id = resolve::<Project>(db, &project, project_name);
            let file_id = resolve_file(db, &project_id, &file);
            let Some((meta, bytes)) = ctx.ws.projects().download_file(&project_id, &file_id).await else {
                die("Download failed.");
            };
            let output = output.unwrap_or_else(|| PathBuf::from(&meta.name));
            if let Err(e) = tokio::fs::write(&output, &bytes).await {
                die(format!("Failed to write {}: {e}", output.display()));
            }
            println!("Saved {} to {}", meta.name, output.display());
        }
        FileAction::Rm { project, file } => {
            let db = ctx.ws.state();
            let project_id = resolve::<Project>(db, &project, project_name);
            let file_id = resolve_file(db, &project_id, &file);
            if !ctx.ws.projects().delete_file(&project_id, &file_id).await {
                die(format!("Failed to delete file {file_id}."));
            }
            println!("Deleted file {file_id}");
        }
    }
}

pub async fn cmd_plan(ctx: &mut Context, action: PlanAction) {
    match action {
        PlanAction::Suggest { project, apply } => {
            if ctx.config.plan.endpoint.is_none() {
                die("No plan service configured; set [plan] endpoint in config.toml.");
            }
            let project_id = resolve::<Project>(ctx.ws.state(), &project, project_name);
            let Some(plan) = ctx.ws.suggest_plan(&project_id).await else {
                die("No plan suggestion available.");
            };
            for (idx, phase) in plan.phases.iter().enumerate() {
                println!("{}. {}", idx + 1, phase.name);
                for task in &phase.tasks {
                    let hours = task.estimated_hours.map(format_hours).unwrap_or_else(|| "-".into());
                    println!("   - {} ({hours})", task.title);
                }
            }
            if apply {
                let Some(outcome) = ctx.ws.apply_plan(&project_id, &plan).await else {
                    die("Failed to apply plan.");
                };
                println!("\nCreated {} phase(s) and {} task(s)", outcome.phases, outcome.tasks);
            }
        }
    }
}

pub fn cmd_week(ctx: &Context, date: Option<String>, shift: i32) {
    let anchor = opt_date(date, ctx.today).unwrap_or(ctx.today);
    let Some(anchor) = shift_weeks(anchor, shift.into()) else {
        die("That week is outside the supported calendar range.");
    };
    let db = ctx.ws.state();
    let week = WeekSchedule::build(anchor, &db.tasks, &db.meetings, ctx.config.grid());
    let stats = WeeklyStats::compute(
        &week_window(anchor),
        &db.tasks,
        &db.meetings,
        ctx.today,
        ctx.config.calendar.weekly_capacity_hours,
    );
    print_week(&week, &stats);
}

pub fn cmd_dashboard(ctx: &Context) {
    let db = ctx.ws.state();
    let stats = DashboardStats::compute(db, ctx.today);
    print_dashboard(
        &stats,
        &execute_now(db, EXECUTE_NOW_LIMIT),
        &upcoming_meetings(db, ctx.today),
        ctx.today,
    );
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    use crate::cli::Cli;
    use clap::CommandFactory;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}
