use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use classroom_dashboard::api::{ClassroomClient, ClassroomSource, HttpTransport, OAuthClient, RetryPolicy};
use classroom_dashboard::dashboard::{dashboard_for, DashboardView};
use classroom_dashboard::{
    export, AssignmentStore, Config, Policy, Role, SessionContext, SessionStore, Sources,
    TeacherStudentLink, YamlAssignmentStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "classroom-dashboard", version, about = "Google Classroom progress dashboards")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the Google consent URL
    AuthUrl {
        #[arg(long, default_value = "classroom-dashboard")]
        state: String,
    },
    /// Exchange an authorization code and start a session
    Login {
        #[arg(long)]
        code: String,
        #[arg(long, default_value = "student")]
        role: Role,
    },
    /// Replace the session's access token using a refresh token
    Refresh {
        #[arg(long)]
        refresh_token: String,
    },
    /// Clear the stored session
    Logout,
    /// Show the signed-in user and role
    Whoami,
    /// Load the dashboard of the session's role as JSON
    Dashboard {
        /// Switch the session to this role first
        #[arg(long)]
        role: Option<Role>,
    },
    /// Assign a student to a teacher
    Assign {
        #[arg(long)]
        teacher: String,
        #[arg(long)]
        student: String,
        #[arg(long)]
        course: String,
        #[arg(long, default_value = "")]
        commission: String,
    },
    /// Remove every assignment between a teacher and a student
    Unassign {
        #[arg(long)]
        teacher: String,
        #[arg(long)]
        student: String,
    },
    /// Grade a submission, optionally returning it to the student
    Grade {
        #[arg(long)]
        course: String,
        #[arg(long)]
        work: String,
        #[arg(long)]
        submission: String,
        #[arg(long)]
        assigned: Option<f64>,
        #[arg(long)]
        draft: Option<f64>,
        #[arg(long = "return")]
        return_submission: bool,
    },
    /// Write the dashboard's table to CSV (assignments for students, commissions for teachers)
    Export {
        #[arg(long)]
        out: PathBuf,
    },
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn oauth_client(config: &Config) -> Result<OAuthClient> {
    let client = OAuthClient::new(
        config.client_id()?,
        config.client_secret.clone().unwrap_or_default(),
        config.redirect_uri.clone(),
        config.request_timeout,
    )?;
    Ok(client)
}

fn classroom_client(config: &Config) -> Result<ClassroomClient> {
    let transport = HttpTransport::new(config.api_base.clone(), config.request_timeout)
        .context("Failed to build Classroom HTTP client")?;
    Ok(ClassroomClient::new(
        Arc::new(transport),
        config.page_size,
        RetryPolicy::new(config.max_retries, Duration::from_millis(500)),
    ))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn load_dashboard(
    config: &Config,
    session: &SessionContext,
    store: &dyn AssignmentStore,
) -> Result<DashboardView> {
    let dashboard = dashboard_for(session, Policy::from_config(config))?;
    let classroom = classroom_client(config)?;
    let sources = Sources {
        classroom: &classroom,
        store,
    };

    let result = dashboard.load(session, sources, Utc::now()).await;
    match (result.data, result.error) {
        (Some(view), _) => Ok(view),
        (None, error) => anyhow::bail!(
            "Failed to load dashboard: {}",
            error.unwrap_or_else(|| "unknown error".to_string())
        ),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;
    init_tracing(&config.log_level);

    let sessions = SessionStore::new(config.session_file.clone());
    let store = YamlAssignmentStore::new(config.assignments_file.clone());

    match cli.command {
        Command::AuthUrl { state } => {
            let url = oauth_client(&config)?.authorization_url(&state)?;
            println!("{}", url);
        }
        Command::Login { code, role } => {
            config.client_secret()?;
            let oauth = oauth_client(&config)?;
            let tokens = oauth.exchange_code(&code).await?;
            let user = oauth.user_info(&tokens.access_token).await?;

            sessions.save(&SessionContext::new(tokens.access_token, role))?;
            tracing::info!(email = %user.email, role = %role, "logged in");
            if let Some(refresh_token) = tokens.refresh_token {
                eprintln!("Refresh token (keep it private): {}", refresh_token);
            }
            print_json(&user)?;
        }
        Command::Refresh { refresh_token } => {
            config.client_secret()?;
            let mut session = sessions.load()?;
            let role = session.role().unwrap_or(Role::Student);
            let tokens = oauth_client(&config)?.refresh(&refresh_token).await?;
            session.init(tokens.access_token, role);
            sessions.save(&session)?;
            tracing::info!(role = %role, "access token refreshed");
        }
        Command::Logout => {
            sessions.clear()?;
            tracing::info!("logged out");
        }
        Command::Whoami => {
            let session = sessions.load()?;
            let token = session.token()?;
            let user = oauth_client(&config)?.user_info(token).await?;
            print_json(&serde_json::json!({
                "user": user,
                "role": session.role(),
            }))?;
        }
        Command::Dashboard { role } => {
            let mut session = sessions.load()?;
            if let Some(role) = role {
                session.set_role(role);
                sessions.save(&session)?;
            }
            let dashboard = dashboard_for(&session, Policy::from_config(&config))?;
            let classroom = classroom_client(&config)?;
            let sources = Sources {
                classroom: &classroom,
                store: &store,
            };
            let result = dashboard.load(&session, sources, Utc::now()).await;
            print_json(&result)?;
        }
        Command::Assign {
            teacher,
            student,
            course,
            commission,
        } => {
            let link = TeacherStudentLink::new(teacher, student, course, commission);
            store.assign(link.clone()).await?;
            print_json(&link)?;
        }
        Command::Unassign { teacher, student } => {
            let removed = store.unassign(&teacher, &student).await?;
            if !removed {
                tracing::warn!(teacher_id = %teacher, student_id = %student, "no assignment to remove");
            }
            print_json(&serde_json::json!({ "removed": removed }))?;
        }
        Command::Grade {
            course,
            work,
            submission,
            assigned,
            draft,
            return_submission,
        } => {
            let session = sessions.load()?;
            let token = session.token()?;
            let classroom = classroom_client(&config)?;
            let current = classroom
                .list_submissions(token, &course, &work, None)
                .await?
                .into_iter()
                .find(|s| s.id == submission)
                .with_context(|| format!("Submission {} not found in {}/{}", submission, course, work))?;

            let updated = classroom.patch_grade(token, &current, assigned, draft).await?;
            if return_submission {
                classroom.return_submission(token, &updated).await?;
            }
            print_json(&updated)?;
        }
        Command::Export { out } => {
            let session = sessions.load()?;
            let path = match load_dashboard(&config, &session, &store).await? {
                DashboardView::Student(dashboard) => {
                    export::export_assignments_csv(&dashboard.all_assignments, &out)?
                }
                DashboardView::Teacher(dashboard) => {
                    export::export_commissions_csv(&dashboard.commissions, &out)?
                }
                DashboardView::Coordinator(_) => {
                    anyhow::bail!("The coordinator dashboard has no table to export")
                }
            };
            println!("Exported to {}", path.display());
        }
    }

    Ok(())
}
