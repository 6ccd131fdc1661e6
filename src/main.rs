use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};
use ratatui::DefaultTerminal;
use tracing::{debug, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use rdesk::backend::{Backend, HttpBackend};
use rdesk::config::{ConfigFile, DeskConfig, ensure_parent};
use rdesk::controller::Controller;
use rdesk::domain::DeskError;
use rdesk::export;
use rdesk::forms::DistributorForm;
use rdesk::import::{self, ImportMapping};
use rdesk::model::{Model, Status};
use rdesk::record::RecordKind;
use rdesk::session::Session;
use rdesk::tasks;
use rdesk::ui::DashboardUI;
use rdesk::view::{ColumnSource, RecordTable};

#[derive(Parser, Debug)]
#[command(version, about = "Terminal dashboard for retailer and distributor records")]
struct Cli {
    /// YAML config file (default ~/.rdesk/config.yml)
    #[arg(short, long)]
    config: Option<String>,

    /// Backend base url, overrides the config file
    #[arg(long)]
    base_url: Option<String>,

    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Browse, search and delete records (default)
    Dashboard {
        #[arg(short, long, value_enum)]
        kind: Option<RecordKind>,
    },
    /// Bulk upload a spreadsheet
    Import {
        file: PathBuf,
        #[arg(short, long, value_enum)]
        kind: Option<RecordKind>,
        /// Shop photos sent along with the records
        #[arg(long, num_args = 1..)]
        photos: Vec<PathBuf>,
        /// Parse and print the records without uploading
        #[arg(long)]
        dry_run: bool,
    },
    /// Write all records to a workbook
    Export {
        file: PathBuf,
        #[arg(short, long, value_enum)]
        kind: Option<RecordKind>,
    },
    /// Create a single distributor
    AddDistributor {
        #[arg(long)]
        name: String,
        #[arg(long)]
        mobile: String,
        #[arg(long)]
        address: String,
        #[arg(long)]
        target_area: String,
        #[arg(long)]
        pincode: String,
    },
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
}

fn main() -> ExitCode {
    match run() {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn init_logging(config: &DeskConfig) -> Result<(), DeskError> {
    ensure_parent(&config.log_file)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)?;
    let filter = EnvFilter::try_from_env("RDESK_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn load_config(cli: &Cli) -> Result<DeskConfig, DeskError> {
    let mut config = DeskConfig::from_file(ConfigFile::load(cli.config.as_deref())?)?;
    if let Some(url) = &cli.base_url {
        config.backend.base_url = url.clone();
    }
    if let Some(path) = &cli.log_file {
        config = config.with_log_file(path.clone());
    }
    Ok(config)
}

fn run() -> Result<(), DeskError> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(&config)?;
    debug!("Configuration: {config:?}");

    let mut session = Session::load(config.session_file.clone())?;
    match cli.command.unwrap_or(Command::Dashboard { kind: None }) {
        Command::Dashboard { kind } => {
            let config = match kind {
                Some(kind) => config.with_kind(kind),
                None => config,
            };
            dashboard(&config, session)
        }
        Command::Login { email, password } => {
            if session.login(&email, &password)? {
                println!("Logged in as {email}");
                Ok(())
            } else {
                Err(DeskError::Validation(
                    "Please enter valid credentials".to_string(),
                ))
            }
        }
        Command::Logout => {
            session.logout()?;
            println!("Logged out");
            Ok(())
        }
        Command::Import {
            file,
            kind,
            photos,
            dry_run,
        } => {
            session.require()?;
            let mapping = ImportMapping::for_kind(kind.unwrap_or(config.kind));
            let records = import::load(&file, &mapping)?;
            if dry_run {
                for record in &records {
                    println!("{}", record.to_json());
                }
                println!("{} records parsed, nothing uploaded", records.len());
                return Ok(());
            }
            let backend = HttpBackend::new(&config.backend)?;
            let outcome = import::submit(&backend, records, photos)?;
            if outcome.accepted() {
                println!("{}", outcome.message().unwrap_or("Upload successful"));
                Ok(())
            } else {
                Err(DeskError::LoadingFailed(
                    outcome
                        .message()
                        .unwrap_or("upload was not confirmed")
                        .to_string(),
                ))
            }
        }
        Command::Export { file, kind } => {
            session.require()?;
            let backend = HttpBackend::new(&config.backend)?;
            let mut table = RecordTable::new(kind.unwrap_or(config.kind), ColumnSource::Declared);
            table.fetch(&backend)?;
            let summary = export::export_workbook(
                table.records(),
                &table.columns(),
                &file,
                &config.backend.base_url,
            )?;
            println!(
                "Exported {} records to {} ({} valid / {} invalid map links)",
                summary.total,
                file.display(),
                summary.valid,
                summary.invalid
            );
            Ok(())
        }
        Command::AddDistributor {
            name,
            mobile,
            address,
            target_area,
            pincode,
        } => {
            session.require()?;
            let form = DistributorForm {
                distributor_name: name,
                mobile,
                address,
                target_area,
                pincode,
            };
            let errors = form.validate();
            if !errors.is_empty() {
                let message = errors
                    .iter()
                    .map(|(field, error)| format!("{field}: {error}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(DeskError::Validation(message));
            }
            let backend = HttpBackend::new(&config.backend)?;
            backend.create(RecordKind::Distributor, &form.to_record())?;
            println!("Distributor added successfully!");
            Ok(())
        }
    }
}

fn dashboard(config: &DeskConfig, session: Session) -> Result<(), DeskError> {
    info!("Starting rdesk dashboard for {:?}", config.kind);
    let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new(&config.backend)?);
    let (worker, receiver) = tasks::channel(backend);
    let mut model = Model::init(config, session, worker)?;
    let controller = Controller::new(config.event_poll_time, receiver);
    let ui = DashboardUI::new();

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &mut model, &controller, &ui);
    ratatui::restore();
    info!("Exiting rdesk");
    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    model: &mut Model,
    controller: &Controller,
    ui: &DashboardUI,
) -> Result<(), DeskError> {
    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(model)?;
        model.update(message)?;
    }
    Ok(())
}
