mod clipboard;
mod prompt;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use otpbar::config::{self, Config};
use otpbar::otpauth::{self, UNKNOWN_SERVICE_NAME};
use otpbar::{Credential, CredentialStore, FileKeyValueStore, base32, otp};
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

use crate::clipboard::copy_to_clipboard;
use crate::prompt::{confirm, prompt_line, prompt_secret};

#[derive(Parser, Debug)]
#[command(name = "otpbar", version, about = "TOTP authenticator for multiple accounts")]
struct Cli {
    /// Data directory (default: platform data dir + /otpbar)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add an account from an otpauth:// URL
    ///
    /// Примеры:
    ///   otpbar add 'otpauth://totp/GitHub:alice?secret=JBSWY3DPEHPK3PXP&issuer=GitHub'
    ///   otpbar add --base-password
    Add {
        /// Provisioning URL (prompted if omitted)
        url: Option<String>,
        /// Prompt for a static prefix copied before the code
        #[arg(long)]
        base_password: bool,
    },

    /// Add an account from its parameters
    AddManual {
        #[arg(long)]
        name: String,
        /// Base32 secret
        #[arg(long)]
        secret: String,
        #[arg(long, default_value = "")]
        issuer: String,
        #[arg(long, default_value = "SHA1")]
        algorithm: String,
        #[arg(long, default_value_t = 6)]
        digits: u32,
        #[arg(long, default_value_t = 30)]
        period: u64,
        #[arg(long)]
        base_password: bool,
    },

    /// List accounts with their current codes
    Ls,

    /// Print the current code (selected account by default)
    Show { account: Option<String> },

    /// Copy the current code, prefixed with the base password if enabled
    Clip { account: Option<String> },

    /// Make an account the selected one
    Select { account: String },

    /// Delete an account
    Rm {
        account: String,
        /// Do not ask for confirmation
        #[arg(long, short)]
        yes: bool,
    },

    /// Change an account's parameters
    Edit {
        account: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        issuer: Option<String>,
        #[arg(long)]
        algorithm: Option<String>,
        #[arg(long)]
        digits: Option<u32>,
        #[arg(long)]
        period: Option<u64>,
        /// Prompt for a new base password and enable it
        #[arg(long, conflicts_with = "no_base_password")]
        base_password: bool,
        /// Stop prefixing the base password
        #[arg(long)]
        no_base_password: bool,
    },

    /// Refresh all codes every tick until interrupted
    Watch,

    /// Validate an otpauth:// URL the way the settings screen does
    Check { url: String },

    /// Print the effective configuration
    Config {
        /// Write it to config.json (creates the file with defaults)
        #[arg(long)]
        write: bool,
    },
}

type Store = CredentialStore<FileKeyValueStore>;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let root = match cli.root {
        Some(root) => root,
        None => config::data_root()?,
    };
    let cfg = Config::load(&root)?;
    init_logging(&cfg);

    let mut store = open_store(&root)?;

    match cli.command {
        Commands::Add { url, base_password } => cmd_add(&mut store, url, base_password)?,
        Commands::AddManual {
            name,
            secret,
            issuer,
            algorithm,
            digits,
            period,
            base_password,
        } => {
            let credential = Credential::new(name, issuer, secret)
                .with_algorithm(algorithm.to_uppercase())
                .with_digits(digits)
                .with_period(period);
            save_new(&mut store, credential, base_password)?
        }
        Commands::Ls => cmd_ls(&store, &cfg)?,
        Commands::Show { account } => cmd_show(&store, account.as_deref())?,
        Commands::Clip { account } => cmd_clip(&store, account.as_deref())?,
        Commands::Select { account } => {
            let id = resolve(&store, Some(account.as_str()))?.id;
            store.select(id)?;
            println!("Selected {}", store.selected().map(|c| c.display_name()).unwrap_or_default());
        }
        Commands::Rm { account, yes } => cmd_rm(&mut store, &account, yes)?,
        Commands::Edit {
            account,
            name,
            issuer,
            algorithm,
            digits,
            period,
            base_password,
            no_base_password,
        } => {
            let mut credential = resolve(&store, Some(account.as_str()))?.clone();
            if let Some(name) = name {
                credential.name = name;
            }
            if let Some(issuer) = issuer {
                credential.issuer = issuer;
            }
            if let Some(algorithm) = algorithm {
                credential.algorithm = algorithm.to_uppercase();
            }
            if let Some(digits) = digits {
                credential.digits = digits;
            }
            if let Some(period) = period {
                credential.period = period;
            }
            if base_password {
                credential.base_password = prompt_secret("Base password: ")?;
                credential.use_base_password = true;
            }
            if no_base_password {
                credential.use_base_password = false;
            }
            let label = credential.display_name();
            store.update(credential)?;
            println!("Updated {label}");
        }
        Commands::Watch => cmd_watch(&store, &cfg)?,
        Commands::Check { url } => cmd_check(&url),
        Commands::Config { write } => cmd_config(&root, &cfg, write)?,
    }

    Ok(())
}

/// OTPBAR_LOG важнее log_level из config.json
fn init_logging(cfg: &Config) {
    let filter = EnvFilter::try_from_env("OTPBAR_LOG")
        .or_else(|_| EnvFilter::try_new(&cfg.log_level))
        .unwrap_or_else(|_| EnvFilter::new(config::DEFAULT_LOG_LEVEL));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(root: &std::path::Path) -> anyhow::Result<Store> {
    let kv = FileKeyValueStore::new(config::state_dir(root));
    CredentialStore::load(kv)
        .with_context(|| format!("cannot load credentials from {}", root.display()))
}

/// Аккаунт по имени/id, либо выбранный, если запрос не задан
fn resolve<'a>(store: &'a Store, query: Option<&str>) -> anyhow::Result<&'a Credential> {
    match query {
        Some(q) => store
            .find(q)
            .ok_or_else(|| anyhow!("No account matching '{q}'")),
        None => store
            .selected()
            .ok_or_else(|| anyhow!("No account selected, run `otpbar select <account>`")),
    }
}

fn save_new(store: &mut Store, mut credential: Credential, base_password: bool) -> anyhow::Result<()> {
    if base_password {
        credential.base_password = prompt_secret("Base password: ")?;
        credential.use_base_password = true;
    }
    let label = credential.display_name();
    store.add(credential)?;
    println!("Added {label}");
    Ok(())
}

fn cmd_add(store: &mut Store, url: Option<String>, base_password: bool) -> anyhow::Result<()> {
    let raw = match url {
        Some(url) => url,
        None => prompt_line("otpauth:// URL: ")?,
    };
    let raw = raw.trim();
    if raw.is_empty() {
        bail!("Please enter an otpauth:// URL");
    }

    let Some(mut credential) = otpauth::parse(raw) else {
        bail!("Invalid otpauth URL format. Please check the URL and try again.");
    };
    if credential.name.is_empty() {
        credential.name = UNKNOWN_SERVICE_NAME.to_string();
    }

    save_new(store, credential, base_password)
}

fn cmd_ls(store: &Store, cfg: &Config) -> anyhow::Result<()> {
    let now = OffsetDateTime::now_utc();
    let selected = store.selected_id();

    for (credential, result) in store.codes_at(now) {
        let marker = if Some(credential.id) == selected { "*" } else { " " };
        let short_id = credential.id.simple().to_string();
        let short_id = &short_id[..8];
        match result {
            Ok(generated) => println!(
                "{marker} {short_id}  {:<10} {:>3}s  {}",
                generated.code,
                generated.seconds_remaining,
                credential.display_name()
            ),
            Err(e) => {
                tracing::warn!(account = %credential.display_name(), error = %e, "cannot generate code");
                println!(
                    "{marker} {short_id}  {:<10}       {}",
                    cfg.placeholder,
                    credential.display_name()
                )
            }
        }
    }
    Ok(())
}

fn cmd_show(store: &Store, account: Option<&str>) -> anyhow::Result<()> {
    let credential = resolve(store, account)?;
    let generated = otp::generate(credential, OffsetDateTime::now_utc())
        .with_context(|| format!("cannot generate code for {}", credential.display_name()))?;
    println!("{}", generated.code);
    eprintln!("{}s remaining", generated.seconds_remaining);
    Ok(())
}

fn cmd_clip(store: &Store, account: Option<&str>) -> anyhow::Result<()> {
    let credential = resolve(store, account)?;
    let generated = otp::generate(credential, OffsetDateTime::now_utc())
        .with_context(|| format!("cannot generate code for {}", credential.display_name()))?;

    copy_to_clipboard(&credential.copy_payload(&generated.code))?;
    if credential.use_base_password {
        println!("Password copied to clipboard.");
    } else {
        println!("OTP code copied to clipboard.");
    }
    Ok(())
}

fn cmd_rm(store: &mut Store, account: &str, yes: bool) -> anyhow::Result<()> {
    let credential = resolve(store, Some(account))?;
    let (id, label) = (credential.id, credential.display_name());

    if !yes && !confirm(&format!("Delete {label}?"))? {
        println!("Aborted.");
        return Ok(());
    }

    store.delete(id)?;
    println!("Deleted {label}");
    Ok(())
}

/// Таймер обновления: раз в refresh_interval_secs пересчитываем все коды
fn cmd_watch(store: &Store, cfg: &Config) -> anyhow::Result<()> {
    let interval = Duration::from_secs(cfg.refresh_interval_secs.max(1));
    loop {
        let now = OffsetDateTime::now_utc();
        let stamp = now.format(&time::format_description::well_known::Rfc3339)?;
        println!("-- {stamp}");
        for (credential, result) in store.codes_at(now) {
            match result {
                Ok(generated) => {
                    let bar = otp::progress(now, generated.period)
                        .map(|fraction| countdown_bar(fraction, WATCH_BAR_WIDTH))
                        .unwrap_or_default();
                    println!(
                        "{:<10} {:>3}s {}  {}",
                        generated.code,
                        generated.seconds_remaining,
                        bar,
                        credential.display_name()
                    )
                }
                Err(_) => println!(
                    "{:<10}      {}  {}",
                    cfg.placeholder,
                    " ".repeat(WATCH_BAR_WIDTH + 2),
                    credential.display_name()
                ),
            }
        }
        std::thread::sleep(interval);
    }
}

const WATCH_BAR_WIDTH: usize = 10;

/// Remaining time of the window as `[####      ]`, draining as it elapses.
fn countdown_bar(elapsed: f64, width: usize) -> String {
    let elapsed = elapsed.clamp(0.0, 1.0);
    let filled = width - ((elapsed * width as f64).floor() as usize).min(width);
    format!("[{}{}]", "#".repeat(filled), " ".repeat(width - filled))
}

fn cmd_check(url: &str) {
    if otpauth::is_valid_otpauth_url(url) {
        println!("valid: {}", otpauth::service_name(url));
    } else {
        println!("invalid: expected otpauth://totp/<label>?secret=<base32>");
    }

    match otpauth::extract_secret(url) {
        Some(secret) => match base32::decode(&secret) {
            Ok(key) if key.is_empty() => println!("secret: empty"),
            Ok(key) => println!("secret: {} bytes", key.len()),
            Err(e) => println!("secret: {e}"),
        },
        None => println!("secret: missing"),
    }

    if let Some(parsed) = otpauth::parse_with_diagnostics(url) {
        for warning in parsed.warnings {
            println!("warning: {warning:?}");
        }
    }
}

fn cmd_config(root: &std::path::Path, cfg: &Config, write: bool) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(cfg)?);
    if write {
        let path = cfg.save(root)?;
        eprintln!("Written to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_bar_drains_over_the_window() {
        assert_eq!(countdown_bar(0.0, 10), "[##########]");
        assert_eq!(countdown_bar(0.5, 10), "[#####     ]");
        assert_eq!(countdown_bar(29.0 / 30.0, 10), "[#         ]");
        assert_eq!(countdown_bar(1.5, 4), "[    ]");
    }

    #[test]
    fn countdown_bar_follows_totp_progress() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_010).unwrap();
        // 1_700_000_010 % 30 == 0: a fresh window
        assert_eq!(countdown_bar(otp::progress(now, 30).unwrap(), 6), "[######]");
        let later = now + time::Duration::seconds(15);
        assert_eq!(countdown_bar(otp::progress(later, 30).unwrap(), 6), "[###   ]");
    }
}
