use clap::{Arg, ArgAction, ArgMatches, Command};
use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use account_core::auth::password::DEFAULT_HASH_ITERATIONS;
use account_core::auth::Shell;
use account_core::utils::logging::initialize_logging;
use account_core::utils::time::format_timestamp;
use account_core::{
    AuthService, InMemoryUserStore, JsonFileUserStore, LogMailer, Mailer, PasswordHasher,
    ServiceConfig, SmtpMailer, TokenService, UserStore, USERS_FILE,
};

fn cli() -> Command {
    Command::new("account-core")
        .about("Credential and session core of an account service")
        .subcommand_required(true)
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .global(true)
                .help("Append logs to this file instead of stderr"),
        )
        .subcommand(
            Command::new("shell")
                .about("Interactive session against a user store")
                .arg(
                    Arg::new("users")
                        .long("users")
                        .default_value(USERS_FILE)
                        .help("JSON file holding registered users"),
                )
                .arg(
                    Arg::new("memory")
                        .long("memory")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("users")
                        .help("Keep users in memory only"),
                ),
        )
        .subcommand(
            Command::new("hash-password")
                .about("Print the digest of a password read from the terminal")
                .arg(
                    Arg::new("iterations")
                        .long("iterations")
                        .value_parser(clap::value_parser!(u32))
                        .help("PBKDF2 iteration count"),
                ),
        )
        .subcommand(
            Command::new("issue-token")
                .about("Sign a token for a username")
                .arg(Arg::new("username").required(true))
                .arg(
                    Arg::new("verification")
                        .long("verification")
                        .action(ArgAction::SetTrue)
                        .help("Issue an email verification token instead of an access token"),
                ),
        )
        .subcommand(
            Command::new("inspect-token")
                .about("Check a token's signature and expiry and print its claims")
                .arg(Arg::new("token").required(true)),
        )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let matches = cli().get_matches();

    let log_file = matches.get_one::<String>("log-file").map(Path::new);
    initialize_logging(log_file)?;

    match matches.subcommand() {
        Some(("shell", sub_matches)) => run_shell(sub_matches).await?,
        Some(("hash-password", sub_matches)) => hash_password(sub_matches)?,
        Some(("issue-token", sub_matches)) => issue_token(sub_matches)?,
        Some(("inspect-token", sub_matches)) => inspect_token(sub_matches)?,
        _ => unreachable!("a subcommand is required"),
    }

    Ok(())
}

async fn run_shell(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let config = ServiceConfig::from_env()?;

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(creds) => Arc::new(SmtpMailer::new(creds, &config.sender_name)?),
        None => {
            log::warn!("SMTP is not configured, outgoing mail is only logged");
            Arc::new(LogMailer)
        }
    };

    if matches.get_flag("memory") {
        shell_with(&config, Arc::new(InMemoryUserStore::new()), mailer).await
    } else {
        // Always present through its default value
        let path = matches
            .get_one::<String>("users")
            .map(String::as_str)
            .unwrap_or(USERS_FILE);
        let store = JsonFileUserStore::open(path)?;
        log::info!("Using user store at {}", store.path().display());
        shell_with(&config, Arc::new(store), mailer).await
    }
}

async fn shell_with<S: UserStore>(
    config: &ServiceConfig,
    users: Arc<S>,
    mailer: Arc<dyn Mailer>,
) -> Result<(), Box<dyn Error>> {
    let service = AuthService::new(config, users, mailer);
    Shell::new(service).run().await?;
    Ok(())
}

fn hash_password(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let iterations = matches
        .get_one::<u32>("iterations")
        .copied()
        .unwrap_or(DEFAULT_HASH_ITERATIONS);

    let password = rpassword::prompt_password("Password: ")?;
    let hasher = PasswordHasher::new(iterations);
    println!("{}", hasher.hash(&password)?);
    Ok(())
}

fn issue_token(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let config = ServiceConfig::from_env()?;
    let tokens = TokenService::new(&config.tokens);

    let username = matches
        .get_one::<String>("username")
        .ok_or("username is required")?;
    let token = if matches.get_flag("verification") {
        tokens.issue_verification(username)?
    } else {
        tokens.issue_access(username)?
    };

    println!("{}", token);
    Ok(())
}

fn inspect_token(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let config = ServiceConfig::from_env()?;
    let tokens = TokenService::new(&config.tokens);

    let token = matches
        .get_one::<String>("token")
        .ok_or("token is required")?;
    let claims = tokens.verify(token)?;

    println!("{}", serde_json::to_string_pretty(&claims)?);
    println!(
        "{} token for {}, issued {}, expires {}",
        if claims.is_verification() { "Verification" } else { "Access" },
        claims.username,
        format_timestamp(claims.iat),
        format_timestamp(claims.exp)
    );
    Ok(())
}
