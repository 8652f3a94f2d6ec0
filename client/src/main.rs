// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use anyhow::bail;
use chrono::{DateTime, Utc};
use clap::{ArgAction, Parser, Subcommand};
use std::sync::Arc;
use taskboard_client::board::{BoardView, Clock, DueStatus, SystemClock, due_status};
use taskboard_client::config::ClientConfig;
use taskboard_client::guard::{AdminGuard, AuthGuard, navigate_guarded};
use taskboard_client::navigator::{
    HistoryNavigator, LOGIN_PATH, Navigator, is_login_location, post_login_destination,
};
use taskboard_client::{ApiClient, ClientError};
use taskboard_common::{
    CreateTaskPayload, CreateUserPayload, Task, TaskState, TaskTransition, UpdateProfilePayload,
    UpdateTaskPayload, UpdateUserPayload, parse_timestamp,
};

#[derive(Parser, Debug)]
#[command(name = "taskboard", version, about = "Manage your task board from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and remember the access token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the stored access token
    Logout,
    /// Show the signed-in account
    Whoami,
    /// Update the signed-in account
    Profile {
        #[arg(long)]
        avatar_url: String,
    },
    /// Show tasks grouped by state, soonest due first
    Board {
        /// Also show archived tasks
        #[arg(long)]
        archived: bool,
    },
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// RFC 3339 timestamp or YYYY-MM-DD
        #[arg(long, value_parser = parse_due)]
        due: Option<DateTime<Utc>>,
        #[arg(long)]
        reward: Option<String>,
    },
    Show {
        id: i64,
    },
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_parser = parse_due)]
        due: Option<DateTime<Utc>>,
        #[arg(long)]
        reward: Option<String>,
    },
    Start {
        id: i64,
    },
    Complete {
        id: i64,
    },
    Archive {
        id: i64,
    },
    Reopen {
        id: i64,
    },
    /// Print the ticket of a task
    Print {
        id: i64,
    },
    /// User and database maintenance
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Subcommand, Debug)]
enum AdminCommand {
    Users,
    AddUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        admin: bool,
    },
    SetActive {
        id: i64,
        #[arg(action = ArgAction::Set)]
        active: bool,
    },
    SetAdmin {
        id: i64,
        #[arg(action = ArgAction::Set)]
        admin: bool,
    },
    /// Permanently delete every archived task
    PurgeArchived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Public,
    User,
    Admin,
}

impl Command {
    /// The view a command stands for, and who may open it.
    fn route(&self) -> (String, Access) {
        match self {
            Command::Login { .. } => (LOGIN_PATH.to_string(), Access::Public),
            Command::Logout => ("/".to_string(), Access::Public),
            Command::Whoami | Command::Profile { .. } => ("/profile".to_string(), Access::User),
            Command::Board { archived: false } => ("/tasks".to_string(), Access::User),
            Command::Board { archived: true } => {
                ("/tasks?archived=true".to_string(), Access::User)
            }
            Command::Create { .. } => ("/tasks/new".to_string(), Access::User),
            Command::Edit { id, .. } => (format!("/tasks/{id}/edit"), Access::User),
            Command::Print { id } => (format!("/tasks/{id}/print"), Access::User),
            Command::Show { id }
            | Command::Start { id }
            | Command::Complete { id }
            | Command::Archive { id }
            | Command::Reopen { id } => (format!("/tasks/{id}/details"), Access::User),
            Command::Admin(AdminCommand::PurgeArchived) => {
                ("/admin/maintenance".to_string(), Access::Admin)
            }
            Command::Admin(_) => ("/admin/users".to_string(), Access::Admin),
        }
    }
}

fn parse_due(raw: &str) -> Result<DateTime<Utc>, String> {
    parse_timestamp(raw).ok_or_else(|| format!("'{raw}' is not a date (use RFC 3339 or YYYY-MM-DD)"))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = ClientConfig::from_env();
    let navigator = Arc::new(HistoryNavigator::default());
    let api = ApiClient::from_config(&config, navigator.clone())?;

    let (route, access) = cli.command.route();
    let allowed = match access {
        Access::Public => {
            navigator.navigate(&route);
            true
        }
        Access::User => {
            let guard = AuthGuard::new(api.session().clone());
            navigate_guarded(&guard, navigator.as_ref(), &route)
        }
        Access::Admin => {
            let guard = AdminGuard::new(api.session().clone());
            navigate_guarded(&guard, navigator.as_ref(), &route)
        }
    };
    if !allowed {
        bail!(redirect_message(&navigator.current_location()));
    }

    match execute(&api, cli.command).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_unauthorized() => {
            bail!("{}\n{}", e, redirect_message(&navigator.current_location()))
        }
        Err(e) => Err(e.into()),
    }
}

fn redirect_message(location: &str) -> String {
    if is_login_location(location) {
        format!(
            "Not signed in. Run `taskboard login` first, then continue with {}.",
            post_login_destination(location)
        )
    } else {
        "Administrator rights are required for this command.".to_string()
    }
}

async fn execute(api: &ApiClient, command: Command) -> Result<(), ClientError> {
    match command {
        Command::Login { email, password } => {
            let claims = api.login(&email, &password).await?;
            let role = if claims.has_admin_role() { " (admin)" } else { "" };
            println!("Signed in as {}{}.", claims.email, role);
        }
        Command::Logout => {
            api.logout()?;
            println!("Signed out.");
        }
        Command::Whoami => {
            let user = api.me().await?;
            let mut roles = Vec::new();
            if user.is_superadmin {
                roles.push("superadmin");
            }
            if user.is_admin {
                roles.push("admin");
            }
            println!("#{} {}", user.id, user.email);
            if !roles.is_empty() {
                println!("Roles:  {}", roles.join(", "));
            }
            if let Some(avatar) = user.avatar_url {
                println!("Avatar: {avatar}");
            }
        }
        Command::Profile { avatar_url } => {
            let user = api
                .update_profile(&UpdateProfilePayload {
                    avatar_url: Some(avatar_url),
                })
                .await?;
            println!(
                "Avatar of {} set to {}.",
                user.email,
                user.avatar_url.as_deref().unwrap_or("nothing")
            );
        }
        Command::Board { archived } => {
            let view = api.load_board(archived).await?;
            print!("{}", render_board(&view, &SystemClock));
        }
        Command::Create {
            title,
            description,
            due,
            reward,
        } => {
            let task = api
                .create_task(&CreateTaskPayload {
                    title,
                    description,
                    due_date: due,
                    reward,
                })
                .await?;
            println!("Created {}", render_task_line(&task, &SystemClock));
        }
        Command::Show { id } => {
            let task = api.get_task(id).await?;
            println!("{}", render_task_line(&task, &SystemClock));
            if !task.description.is_empty() {
                println!("\n{}", task.description);
            }
        }
        Command::Edit {
            id,
            title,
            description,
            due,
            reward,
        } => {
            let task = api
                .update_task(
                    id,
                    &UpdateTaskPayload {
                        title,
                        description,
                        due_date: due,
                        reward,
                    },
                )
                .await?;
            println!("Updated {}", render_task_line(&task, &SystemClock));
        }
        Command::Start { id } => transition(api, id, TaskTransition::Start).await?,
        Command::Complete { id } => transition(api, id, TaskTransition::Complete).await?,
        Command::Archive { id } => transition(api, id, TaskTransition::Archive).await?,
        Command::Reopen { id } => transition(api, id, TaskTransition::Reopen).await?,
        Command::Print { id } => print!("{}", api.print_task(id).await?),
        Command::Admin(admin) => execute_admin(api, admin).await?,
    }
    Ok(())
}

async fn transition(api: &ApiClient, id: i64, transition: TaskTransition) -> Result<(), ClientError> {
    let task = api.transition_task(id, transition).await?;
    println!("Task #{} is now {}.", task.id, state_label(task.state));
    Ok(())
}

async fn execute_admin(api: &ApiClient, command: AdminCommand) -> Result<(), ClientError> {
    match command {
        AdminCommand::Users => {
            for user in api.list_users().await? {
                let status = if user.is_active { "active" } else { "disabled" };
                let role = if user.is_superadmin {
                    "superadmin"
                } else if user.is_admin {
                    "admin"
                } else {
                    "user"
                };
                println!("{:>4}  {:<32} {:<10} {}", user.id, user.email, role, status);
            }
        }
        AdminCommand::AddUser {
            email,
            password,
            admin,
        } => {
            let user = api
                .create_user(&CreateUserPayload {
                    email,
                    password,
                    is_admin: admin,
                })
                .await?;
            println!("Created user #{} {}.", user.id, user.email);
        }
        AdminCommand::SetActive { id, active } => {
            let user = api
                .update_user(
                    id,
                    &UpdateUserPayload {
                        is_active: Some(active),
                        is_admin: None,
                    },
                )
                .await?;
            println!("User #{} is now {}.", user.id, if user.is_active { "active" } else { "disabled" });
        }
        AdminCommand::SetAdmin { id, admin } => {
            let user = api
                .update_user(
                    id,
                    &UpdateUserPayload {
                        is_active: None,
                        is_admin: Some(admin),
                    },
                )
                .await?;
            println!("User #{} admin: {}.", user.id, user.is_admin);
        }
        AdminCommand::PurgeArchived => {
            let report = api.purge_archived_tasks().await?;
            println!("Purged {} archived tasks.", report.purged);
        }
    }
    Ok(())
}

fn state_label(state: TaskState) -> &'static str {
    match state {
        TaskState::Todo => "to do",
        TaskState::InProgress => "in progress",
        TaskState::Done => "done",
        TaskState::Archived => "archived",
    }
}

fn render_task_line(task: &Task, clock: &dyn Clock) -> String {
    let mut line = format!("#{} {}", task.id, task.title);
    if let Some(due) = task.due_date {
        line.push_str(&format!("  due {}", due.format("%Y-%m-%d %H:%M")));
        match due_status(task, clock) {
            DueStatus::Overdue => line.push_str(" [OVERDUE]"),
            DueStatus::DueSoon => line.push_str(" [due soon]"),
            DueStatus::Normal => {}
        }
    }
    if let Some(reward) = task.reward.as_deref().filter(|r| !r.is_empty()) {
        line.push_str(&format!("  reward: {reward}"));
    }
    line
}

fn render_board(view: &BoardView, clock: &dyn Clock) -> String {
    if !view.has_any_tasks() {
        return "No tasks yet.\n".to_string();
    }

    let mut states = vec![TaskState::Todo, TaskState::InProgress, TaskState::Done];
    if view.include_archived {
        states.push(TaskState::Archived);
    }

    let mut out = String::new();
    for state in states {
        let bucket = view.board.bucket(state);
        out.push_str(&format!("{} ({})\n", state_label(state), bucket.len()));
        for task in bucket {
            out.push_str(&format!("  {}\n", render_task_line(task, clock)));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use taskboard_client::board::FixedClock;

    fn task(id: i64, state: TaskState, due: Option<&str>) -> Task {
        Task {
            id,
            owner_id: 1,
            title: format!("Task {id}"),
            description: String::new(),
            state,
            due_date: due.and_then(parse_timestamp),
            created_at: Utc.with_ymd_and_hms(2023, 12, 1, 0, 0, 0).unwrap(),
            reward: None,
            started_at: None,
            completed_at: None,
        }
    }

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2023, 12, 20, 12, 0, 0).unwrap())
    }

    #[test]
    fn test_cli_parses_commands() {
        let cli = Cli::try_parse_from(["taskboard", "board", "--archived"]).unwrap();
        assert_eq!(
            cli.command.route(),
            ("/tasks?archived=true".to_string(), Access::User)
        );

        let cli = Cli::try_parse_from([
            "taskboard",
            "profile",
            "--avatar-url",
            "https://example.com/ada.png",
        ])
        .unwrap();
        assert!(matches!(
            &cli.command,
            Command::Profile { avatar_url } if avatar_url == "https://example.com/ada.png"
        ));
        assert_eq!(cli.command.route(), ("/profile".to_string(), Access::User));
        assert!(Cli::try_parse_from(["taskboard", "profile"]).is_err());

        let cli = Cli::try_parse_from(["taskboard", "show", "5"]).unwrap();
        assert_eq!(cli.command.route(), ("/tasks/5/details".to_string(), Access::User));

        let cli = Cli::try_parse_from(["taskboard", "admin", "set-active", "4", "false"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Admin(AdminCommand::SetActive { id: 4, active: false })
        ));
        assert_eq!(cli.command.route().1, Access::Admin);

        assert!(Cli::try_parse_from(["taskboard", "create", "--title", "x", "--due", "soon"]).is_err());
    }

    #[test]
    fn test_render_empty_board() {
        let view = BoardView::new(vec![task(1, TaskState::Archived, None)], false);
        assert_eq!(render_board(&view, &clock()), "No tasks yet.\n");
    }

    #[test]
    fn test_render_board_marks_due_dates() {
        let view = BoardView::new(
            vec![
                task(1, TaskState::Todo, None),
                task(2, TaskState::Todo, Some("2023-12-20T18:00:00Z")),
                task(3, TaskState::InProgress, Some("2023-12-19")),
                task(4, TaskState::Archived, None),
            ],
            false,
        );
        let rendered = render_board(&view, &clock());

        assert_eq!(
            rendered,
            "to do (2)\n  #2 Task 2  due 2023-12-20 18:00 [due soon]\n  #1 Task 1\n\
             in progress (1)\n  #3 Task 3  due 2023-12-19 00:00 [OVERDUE]\n\
             done (0)\n"
        );
    }

    #[test]
    fn test_redirect_message() {
        assert!(redirect_message("/login?returnUrl=/tasks").contains("continue with /tasks"));
        assert!(redirect_message("/").contains("Administrator rights"));
    }
}
