use clap::{Arg, ArgAction, ArgMatches, Command}; // Command-line argument parsing
use log::{error, info};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use credstore::auth::hasher::calibrate;
use credstore::auth::user_interface::run_menu;
use credstore::config::{DEFAULT_CONFIG_FILE, MAX_CALIBRATION_TARGET_MS};
use credstore::store::migrate_flat_file;
use credstore::utils::io::TerminalConsole;
use credstore::utils::logging::initialize_logging;
use credstore::{Authenticator, Backend, Settings, SqliteStore};

type CliResult = Result<(), Box<dyn Error>>;

// Define the command-line interface using clap
fn cli() -> Command {
    Command::new("credstore")
        .about("Register and verify hashed credentials")
        .arg(
            Arg::new("config")
                .long("config")
                .help("Settings file (JSON). Defaults to ./credstore.json when present")
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("backend")
                .long("backend")
                .help("Credential backing: file or sqlite")
                .value_name("BACKEND")
                .global(true),
        )
        .arg(
            Arg::new("store")
                .long("store")
                .help("Path of the credential file or database")
                .value_name("PATH")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("rounds")
                .long("rounds")
                .help("Fixed PBKDF2 rounds instead of calibrating at startup")
                .value_name("N")
                .value_parser(clap::value_parser!(u32))
                .global(true),
        )
        .arg(
            Arg::new("unify-login-errors")
                .long("unify-login-errors")
                .help("Report unknown usernames and wrong passwords with one message")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(Command::new("interactive").about("Register / login / exit menu (default)"))
        .subcommand(
            Command::new("migrate")
                .about("Copy a flat credential file into a SQLite database")
                .arg(
                    Arg::new("from")
                        .long("from")
                        .help("Flat file to read [default: users.txt]")
                        .value_name("FILE")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("to")
                        .long("to")
                        .help("Database to write (defaults to the configured store)")
                        .value_name("DB")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("calibrate")
                .about("Measure the PBKDF2 rounds that fit the target hash time")
                .arg(
                    Arg::new("target-ms")
                        .long("target-ms")
                        .help("Target time for one hash in milliseconds")
                        .value_name("MS")
                        .value_parser(
                            clap::value_parser!(u64).range(1..=MAX_CALIBRATION_TARGET_MS),
                        ),
                )
                .arg(
                    Arg::new("write")
                        .long("write")
                        .help("Store the measured rounds in the settings file")
                        .action(ArgAction::SetTrue),
                ),
        )
}

fn load_settings(matches: &ArgMatches) -> Result<Settings, Box<dyn Error>> {
    let mut settings = Settings::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;

    if let Some(backend) = matches.get_one::<String>("backend") {
        settings.backend = backend.parse::<Backend>()?;
    }
    if let Some(path) = matches.get_one::<PathBuf>("store") {
        settings.store_path = Some(path.clone());
    }
    if let Some(rounds) = matches.get_one::<u32>("rounds") {
        settings.hash_rounds = Some(*rounds);
    }
    if matches.get_flag("unify-login-errors") {
        settings.unify_login_errors = true;
    }

    settings.validate()?;
    Ok(settings)
}

fn run_interactive(settings: &Settings) -> CliResult {
    let store = settings.open_store()?;
    info!(
        "Opened {} store at {}",
        settings.backend,
        settings.store_path().display()
    );

    let auth = Authenticator::new(store.as_ref(), settings.hasher())
        .with_policy(settings.login_policy())
        .with_default_role(settings.default_role.clone());

    run_menu(&mut TerminalConsole, &auth)?;
    Ok(())
}

fn migrate_source(matches: &ArgMatches) -> PathBuf {
    matches
        .get_one::<PathBuf>("from")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(Backend::File.default_path()))
}

fn run_migrate(settings: &Settings, matches: &ArgMatches) -> CliResult {
    let source = migrate_source(matches);
    let target_path = match matches.get_one::<PathBuf>("to") {
        Some(path) => path.clone(),
        None if settings.backend == Backend::Sqlite => settings.store_path(),
        None => PathBuf::from(Backend::Sqlite.default_path()),
    };

    let target = SqliteStore::open(&target_path)?;
    let report = migrate_flat_file(&source, &target)?;
    println!(
        "Migrated {} users from {} into {} ({} already present)",
        report.migrated,
        source.display(),
        target_path.display(),
        report.already_present
    );
    Ok(())
}

fn run_calibrate(settings: &Settings, matches: &ArgMatches, config: Option<&Path>) -> CliResult {
    let target_ms = matches
        .get_one::<u64>("target-ms")
        .copied()
        .unwrap_or(settings.calibration_target_ms);
    let rounds = calibrate(Duration::from_millis(target_ms));
    println!("{} rounds take about {} ms on this machine", rounds, target_ms);

    if matches.get_flag("write") {
        let path = config.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
        let updated = Settings {
            hash_rounds: Some(rounds),
            ..settings.clone()
        };
        updated.save(path)?;
        println!("Saved hash_rounds to {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    let matches = cli().get_matches();

    let settings = match load_settings(&matches) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = initialize_logging(settings.log_file.as_deref(), &settings.log_level) {
        eprintln!("Warning: logging is unavailable: {}", e);
    }

    let config = matches.get_one::<PathBuf>("config").map(PathBuf::as_path);
    let result = match matches.subcommand() {
        Some(("migrate", sub_matches)) => run_migrate(&settings, sub_matches),
        Some(("calibrate", sub_matches)) => run_calibrate(&settings, sub_matches, config),
        _ => run_interactive(&settings),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
