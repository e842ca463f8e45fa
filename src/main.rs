use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use holigo::cli::{self, Command};
use holigo::config::AppConfig;
use holigo::identity::{AnonymousIdentity, CustomTokenIdentity, IdentityProvider};
use holigo::llm::{LlmProvider, create_provider};
use holigo::session::{JourneySession, SessionDeps};
use holigo::sync::{DocumentStore, LibSqlDocumentStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;

    // Logs go to a file when a log dir is set; stdout belongs to the REPL.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _log_guard = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "holigo.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
            None
        }
    };

    eprintln!("✈️  HoliGo v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   App: {}", config.app_id);
    eprintln!("   Store: {}", config.db_path.display());

    // ── Document store ──────────────────────────────────────────────
    let documents = LibSqlDocumentStore::new_local(&config.db_path)
        .await
        .with_context(|| format!("failed to open {}", config.db_path.display()))?;

    // ── Identity ────────────────────────────────────────────────────
    let identity: Arc<dyn IdentityProvider> = match (&config.auth_token, &config.device_id) {
        (Some(token), _) => Arc::new(CustomTokenIdentity::new(token.clone())),
        (None, Some(device_id)) => Arc::new(AnonymousIdentity::with_device_id(device_id)),
        (None, None) => {
            let device_id = documents
                .device_id()
                .await
                .context("failed to load device id")?;
            Arc::new(AnonymousIdentity::with_device_id(device_id))
        }
    };
    let remote: Arc<dyn DocumentStore> = Arc::new(documents);
    eprintln!("   Identity: {}", identity.name());

    // ── Content generation ──────────────────────────────────────────
    let llm: Option<Arc<dyn LlmProvider>> = match &config.llm {
        Some(llm_config) => {
            eprintln!("   Model: {}", llm_config.model);
            Some(create_provider(llm_config)?)
        }
        None => {
            eprintln!("   Model: none (GEMINI_API_KEY not set; summary/discover disabled)");
            None
        }
    };
    eprintln!("   Type 'help' for commands.\n");

    let session = JourneySession::new(SessionDeps {
        identity,
        remote,
        llm,
        app_id: config.app_id.clone(),
        simulation: config.simulation.clone(),
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprint!("> ");
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Error reading stdin: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            eprint!("> ");
            continue;
        }

        match Command::parse(&line) {
            Ok(Command::Quit) => break,
            Ok(command) => run(&session, command).await,
            Err(e) => println!("{e}"),
        }
        eprint!("> ");
    }

    session.sign_out().await;
    Ok(())
}

async fn run(session: &JourneySession, command: Command) {
    use holigo::journey::JourneyState;

    let report = |result: Result<JourneyState, holigo::error::JourneyError>| match result {
        Ok(_) => println!("ok"),
        Err(e) => println!("{e}"),
    };

    match command {
        Command::SignIn => match session.sign_in().await {
            Ok(user) => println!("signed in as {user}"),
            Err(e) => println!("{e}"),
        },
        Command::SignOut => {
            session.sign_out().await;
            println!("signed out");
        }
        Command::Country(id) => report(session.select_country(&id)),
        Command::Region(region) => report(session.select_region(&region)),
        Command::Date(date) => report(session.set_departure_date(&date)),
        Command::Confirm => match session.confirm_trip() {
            Ok(()) => println!("trip confirmed"),
            Err(e) => println!("{e}"),
        },
        Command::Skill(id) => report(session.toggle_skill(&id)),
        Command::Cert(name) => report(session.toggle_certificate(&name)),
        Command::Career(text) => report(session.set_career_details(&text)),
        Command::Summary => {
            println!("writing summary...");
            match session.generate_summary().await {
                Ok(true) => println!("{}", session.state().user_profile.ai_bio),
                Ok(false) => println!("summary generation failed; try again"),
                Err(e) => println!("{e}"),
            }
        }
        Command::Discover(kind) => {
            println!("searching {}...", kind.collection_key());
            match session.discover(kind).await {
                Ok(found) => print!("{}", cli::render_candidates(kind, &found)),
                Err(e) => println!("{e}"),
            }
        }
        Command::Visa => match session.apply_visa() {
            Ok(true) => println!("visa application submitted"),
            Ok(false) => println!("visa application already {}", session.visa_status().phase),
            Err(e) => println!("{e}"),
        },
        Command::Book(kind, id) => match session.book(kind, id).await {
            Ok(true) => println!("booking requested"),
            Ok(false) => println!("another booking is {}", session.booking_status().phase),
            Err(e) => println!("{e}"),
        },
        Command::Offers => match session.navigate(holigo::session::View::Jobs) {
            Ok(()) => print!("{}", cli::render_offers()),
            Err(e) => println!("{e}"),
        },
        Command::Accept(id) => report(session.accept_offer(id)),
        Command::Dismiss => report(session.dismiss_success()),
        Command::Go(view) => match session.navigate(view) {
            Ok(()) => println!("now on {view}"),
            Err(e) => println!("{e}"),
        },
        Command::Status => print!(
            "{}",
            cli::render_status(
                session.view(),
                &session.state(),
                &session.accessible(),
                session.visa_status(),
                session.booking_status(),
            )
        ),
        Command::Help => println!("{}", cli::HELP),
        Command::Quit => {}
    }
}
