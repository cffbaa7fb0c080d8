use std::sync::Arc;

use clap::Parser;

use daily_briefer::briefing::{run_briefing, BriefingDeps, BriefingOptions};
use daily_briefer::classify::Classifier;
use daily_briefer::cli::{Cli, Command};
use daily_briefer::config::AppConfig;
use daily_briefer::error::Error;
use daily_briefer::forward::{process_todo_batch, TodoOptions};
use daily_briefer::labeler::{run_labeling, LabelingOptions};
use daily_briefer::llm::create_generator;
use daily_briefer::sources::auth::{
    Credential, TokenStore, SCOPE_CALENDAR_READONLY, SCOPE_DRIVE_READONLY, SCOPE_GMAIL_MODIFY,
    SCOPE_GMAIL_SEND,
};
use daily_briefer::sources::calendar::GoogleCalendarClient;
use daily_briefer::sources::drive::DriveClient;
use daily_briefer::sources::gmail::GmailClient;
use daily_briefer::sources::todoist::TodoistClient;
use daily_briefer::sources::TaskSource;

#[tokio::main]
async fn main() {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only the report/document.
    let default_filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let exit_code = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nInterrupted");
            130
        }
        result = run(&cli, &config) => match result {
            Ok(()) => 0,
            Err(e) => {
                report_error(&e, cli.verbose);
                1
            }
        },
    };
    std::process::exit(exit_code);
}

fn report_error(error: &Error, verbose: bool) {
    eprintln!("Error: {error}");
    if verbose {
        eprintln!("{error:#?}");
    } else {
        eprintln!();
        eprintln!("Troubleshooting:");
        eprintln!("  - Check your API credentials (.env, token files)");
        eprintln!("  - Verify network connectivity");
        eprintln!("  - Re-run with --verbose for details");
    }
}

async fn run(cli: &Cli, config: &AppConfig) -> Result<(), Error> {
    match &cli.command {
        Command::Brief {
            date,
            days,
            max_emails,
        } => brief(cli, config, *date, *days, *max_emails).await,
        Command::Label {
            days,
            max_emails,
            dry_run,
        } => label(cli, config, *days, *max_emails, *dry_run).await,
        Command::Todos {
            days_back,
            max_emails,
            dry_run,
        } => todos(cli, config, *days_back, *max_emails, *dry_run).await,
    }
}

fn http_client(config: &AppConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .unwrap_or_default()
}

async fn google_credential(
    config: &AppConfig,
    http: &reqwest::Client,
    scopes: &[&str],
) -> Result<Credential, Error> {
    config.check_token_file()?;
    let store = TokenStore::new(
        config.google_token_path.clone(),
        scopes.iter().map(|s| s.to_string()).collect(),
    );
    Ok(store.authenticate(http).await?)
}

async fn brief(
    cli: &Cli,
    config: &AppConfig,
    date: Option<chrono::NaiveDate>,
    days: u32,
    max_emails: u32,
) -> Result<(), Error> {
    let target_date = date.unwrap_or_else(|| chrono::Local::now().date_naive());

    // Fail fast on configuration before any network activity.
    let llm_config = config.llm_config()?;
    let generator = create_generator(&llm_config)?;

    if !cli.quiet {
        eprintln!("Daily Briefer");
        eprintln!("  Date:  {}", target_date.format("%A, %B %d, %Y"));
        eprintln!("  Model: {}", llm_config.model);
        eprintln!();
    }

    let http = http_client(config);
    let credential = google_credential(
        config,
        &http,
        &[SCOPE_GMAIL_MODIFY, SCOPE_CALENDAR_READONLY, SCOPE_DRIVE_READONLY],
    )
    .await?;

    let deps = BriefingDeps {
        email: Arc::new(GmailClient::new(http.clone(), credential.clone())),
        calendar: Arc::new(GoogleCalendarClient::new(http.clone(), credential.clone())),
        tasks: config
            .todoist_api_key
            .clone()
            .map(|key| Arc::new(TodoistClient::new(http.clone(), key)) as Arc<dyn TaskSource>),
        documents: Arc::new(DriveClient::new(http, credential)),
        generator,
    };

    let outcome = run_briefing(
        deps,
        Arc::new(Classifier::new()),
        BriefingOptions {
            target_date,
            days_back: days,
            max_emails,
            stage_timeout: config.stage_timeout,
        },
    )
    .await?;

    if outcome.is_degraded() && !cli.quiet {
        eprintln!(
            "Note: briefing is degraded ({} source failure(s), {} stage failure(s))",
            outcome.source_failures.len(),
            outcome.stage_failures.len()
        );
    }
    println!("{}", outcome.document);
    Ok(())
}

async fn label(
    cli: &Cli,
    config: &AppConfig,
    days: u32,
    max_emails: u32,
    dry_run: bool,
) -> Result<(), Error> {
    if !cli.quiet {
        eprintln!("Email Labeler");
        eprintln!("  Window:     last {days} days");
        eprintln!("  Max emails: {max_emails}");
        if dry_run {
            eprintln!("  DRY RUN: no labels will be applied");
        }
        eprintln!();
    }

    let http = http_client(config);
    let credential = google_credential(config, &http, &[SCOPE_GMAIL_MODIFY]).await?;
    let gmail = GmailClient::new(http, credential);

    let report = run_labeling(
        &gmail,
        &Classifier::new(),
        &LabelingOptions {
            days_back: days,
            max_emails,
            dry_run,
        },
    )
    .await?;

    println!("{}", report.render());
    Ok(())
}

async fn todos(
    cli: &Cli,
    config: &AppConfig,
    days_back: u32,
    max_emails: u32,
    dry_run: bool,
) -> Result<(), Error> {
    // Missing forward address aborts before any network activity.
    let forward_address = config.forward_address()?.to_string();

    if !cli.quiet {
        eprintln!("Todo Processor");
        eprintln!("  Forward to: {forward_address}");
        eprintln!("  Window:     last {days_back} days");
        eprintln!("  Max emails: {max_emails}");
        if dry_run {
            eprintln!("  DRY RUN: nothing will be forwarded or archived");
        }
        eprintln!();
    }

    let http = http_client(config);
    let credential =
        google_credential(config, &http, &[SCOPE_GMAIL_MODIFY, SCOPE_GMAIL_SEND]).await?;
    let gmail = GmailClient::new(http, credential);

    let report = process_todo_batch(
        &gmail,
        &forward_address,
        &TodoOptions {
            days_back,
            max_emails,
            dry_run,
        },
    )
    .await?;

    println!("{}", report.render());
    Ok(())
}
