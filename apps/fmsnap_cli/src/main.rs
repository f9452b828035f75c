use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use fmsnap_adapters::configuration;
use fmsnap_adapters::telemetry;
use fmsnap_adapters::{
    IcloudAccountService, KeyringCredentialStore, SnapshotWriter, TerminalPrompt,
};
use fmsnap_core::config::Settings;
use fmsnap_core::entities::{AttributeValue, AuthOutcome};
use fmsnap_core::use_cases::challenge::{ChallengeOptions, ChallengeUseCase};
use fmsnap_core::use_cases::credentials::{CredentialRequest, CredentialResolver};
use fmsnap_core::use_cases::export::{ExportUseCase, ExportedDevice};
use fmsnap_core::use_cases::login::LoginUseCase;
use fmsnap_core::Error;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "fmsnap", author, version, about = "Snapshot registered devices from an iCloud account", long_about = None)]
struct Cli {
    /// Apple ID (email address)
    #[arg(short, long)]
    username: String,

    /// Password; falls back to the keyring, then an interactive prompt
    #[arg(short, long)]
    password: Option<String>,

    /// Save the accepted password to the keyring
    #[arg(short, long, default_value = "false")]
    save: bool,

    /// Disable all interactive prompting
    #[arg(short = 'n', long, default_value = "false")]
    non_interactive: bool,

    /// Write each device record to a per-device snapshot file
    #[arg(short, long, default_value = "false")]
    outputfile: bool,

    /// Index of the trusted device to receive the verification code
    #[arg(long)]
    device: Option<usize>,

    /// Verification code, for a challenge already sent to a device
    #[arg(long)]
    code: Option<String>,

    /// Directory for snapshot files (defaults to the configured
    /// directory, then the current directory)
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let settings = match configuration::get_configuration() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let _guard = telemetry::init_subscriber("fmsnap_cli", &settings.log_level);

    if let Err(e) = run(cli, settings).await {
        error!(?e, "run failed");
        eprintln!("Error: {}", e);
        std::process::exit(exit_code(&e));
    }
}

/// Usage and selection mistakes exit like an argument-parse failure;
/// everything else is a runtime error.
fn exit_code(error: &Error) -> i32 {
    match error {
        Error::Usage(_) | Error::Selection { .. } => 2,
        _ => 1,
    }
}

async fn run(cli: Cli, settings: Settings) -> Result<(), Error> {
    let service = Arc::new(IcloudAccountService::new(&settings.service)?);
    let credential_store = Arc::new(KeyringCredentialStore::new());
    let prompt = Arc::new(TerminalPrompt::new());

    let interactive = !cli.non_interactive;

    let credentials = CredentialResolver::new(credential_store.clone(), prompt.clone())
        .resolve(&CredentialRequest {
            username: cli.username.clone(),
            password: cli.password.clone(),
            interactive,
        })
        .await?;

    let outcome = LoginUseCase::new(service.clone(), credential_store)
        .save_password(cli.save)
        .execute(&credentials)
        .await?;

    let session = match outcome {
        AuthOutcome::Authenticated(session) => session,
        AuthOutcome::ChallengeRequired { session, devices } => {
            println!("Two-step verification required.");
            let options = ChallengeOptions {
                interactive,
                device_index: cli.device,
                code: cli.code.clone(),
            };
            ChallengeUseCase::new(service.clone(), prompt)
                .execute(session, devices, &options)
                .await?
        }
        // The login use case surfaces rejection as an error.
        AuthOutcome::InvalidCredentials { username } => {
            return Err(Error::InvalidCredentials { username });
        }
    };

    let output_dir = cli
        .output_dir
        .or(settings.snapshot.output_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    let snapshot_store = Arc::new(SnapshotWriter::new(output_dir));

    let exported = ExportUseCase::new(service, snapshot_store)
        .execute(&session, cli.outputfile)
        .await?;

    if exported.is_empty() {
        println!("No devices registered for {}.", session.username);
    }
    for device in &exported {
        print_device(device);
    }

    Ok(())
}

fn print_device(device: &ExportedDevice) {
    let record = &device.record;
    let name = record.name().unwrap_or("(unnamed device)");
    match record.attributes.get("deviceStatus") {
        Some(AttributeValue::Text(status)) => println!("{} [{}] ({})", name, status, record.id),
        _ => println!("{} ({})", name, record.id),
    }
    if let Some(path) = &device.snapshot {
        println!("  saved to {}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use clap::error::ErrorKind;
    use clap::CommandFactory;
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_cli_asserts() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_username_is_required() {
        let err = Cli::try_parse_from(["fmsnap"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_help_is_not_an_error_exit() {
        let err = Cli::try_parse_from(["fmsnap", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_full_invocation_parses() {
        let cli = Cli::try_parse_from([
            "fmsnap",
            "--username",
            "user@example.com",
            "--save",
            "--non-interactive",
            "--outputfile",
            "--device",
            "1",
            "--code",
            "123456",
            "--output-dir",
            "/tmp/snapshots",
        ])
        .unwrap();

        assert_eq!(cli.username, "user@example.com");
        assert!(cli.save);
        assert!(cli.non_interactive);
        assert!(cli.outputfile);
        assert_eq!(cli.device, Some(1));
        assert_eq!(cli.code.as_deref(), Some("123456"));
        assert_eq!(cli.output_dir, Some(PathBuf::from("/tmp/snapshots")));
    }

    #[rstest]
    #[case::usage(Error::usage("bad flags"), 2)]
    #[case::selection(Error::Selection { index: 9, available: 2 }, 2)]
    #[case::invalid_credentials(Error::InvalidCredentials { username: "user".to_string() }, 1)]
    #[case::verification(Error::Verification, 1)]
    #[case::network(Error::Network("timeout".to_string()), 1)]
    fn test_exit_codes(#[case] error: Error, #[case] expected: i32) {
        assert_eq!(exit_code(&error), expected);
    }
}
