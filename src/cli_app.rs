//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};

use certpull::core::artifact::ApiKey;
use certpull::core::config::{Config, Settings, default_hook_path};
use certpull::core::errors::CpError;
use certpull::core::signals::InterruptLatch;
use certpull::fetch::HttpFetcher;
use certpull::hook::SystemRunner;
use certpull::logger::{JsonlWriter, LogEntry};
use certpull::run::{Pipeline, RunOutcome, RunReport, format_report};

/// certpull: install a TLS certificate and key only when they change.
#[derive(Debug, Parser)]
#[command(
    name = "certpull",
    author,
    version,
    about = "Fetch a TLS certificate and key from a certificate server and install them when they change",
    long_about = None,
    after_help = "Exit status: 0 = updated, 1 = error, 2 = no update needed.\n\
                  Every option can also be set in the config file or as CERTPULL_<OPTION> in the environment."
)]
pub struct Cli {
    /// Certificate server address; https:// is assumed when no scheme is given.
    #[arg(short = 's', long, value_name = "ADDRESS")]
    server: Option<String>,
    /// API path in front of `download/` (default /certwarden/api/v1).
    #[arg(long, value_name = "PATH")]
    api_prefix: Option<String>,
    /// Certificate name on the server.
    #[arg(short = 'n', long)]
    name: Option<String>,
    /// API key for the certificate download.
    #[arg(short = 'c', long, value_name = "KEY")]
    cert_api_key: Option<String>,
    /// API key for the private key download.
    #[arg(short = 'k', long, value_name = "KEY")]
    key_api_key: Option<String>,
    /// Where the certificate is installed.
    #[arg(short = 'C', long, value_name = "PATH")]
    cert_path: Option<PathBuf>,
    /// Where the private key is installed.
    #[arg(short = 'K', long, value_name = "PATH")]
    key_path: Option<PathBuf>,
    /// Owner of installed files (name or uid). Defaults to the current user.
    #[arg(short = 'u', long, value_name = "USER")]
    owner: Option<String>,
    /// Group of installed files (name or gid). Defaults to the current group.
    #[arg(short = 'g', long, value_name = "GROUP")]
    group: Option<String>,
    /// Octal permission bits of installed files (default 0600).
    #[arg(short = 'm', long, value_name = "MODE")]
    mode: Option<String>,
    /// Executable run with the certificate and key paths after an update.
    #[arg(short = 'p', long, value_name = "PATH", conflicts_with = "no_hook")]
    hook: Option<PathBuf>,
    /// Never run a post-install hook.
    #[arg(long)]
    no_hook: bool,
    /// Override config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Append JSONL activity records to this file.
    #[arg(long, value_name = "PATH")]
    activity_log: Option<PathBuf>,
    /// Abort a download after this many seconds (default: wait indefinitely).
    #[arg(long, value_name = "SECONDS")]
    timeout_secs: Option<u64>,
    /// Print the run report as JSON on stdout.
    #[arg(long)]
    json: bool,
    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
    /// Print shell completions and exit.
    #[arg(long, value_name = "SHELL", value_enum)]
    completions: Option<CompletionShell>,
}

impl Cli {
    /// Command-line layer of the configuration.
    fn to_config(&self) -> Config {
        Config {
            server: self.server.clone(),
            api_prefix: self.api_prefix.clone(),
            name: self.name.clone(),
            cert_api_key: self.cert_api_key.clone().map(ApiKey::new),
            key_api_key: self.key_api_key.clone().map(ApiKey::new),
            cert_path: self.cert_path.clone(),
            key_path: self.key_path.clone(),
            owner: self.owner.clone(),
            group: self.group.clone(),
            mode: self.mode.clone(),
            hook: self.hook.clone(),
            disable_hook: self.no_hook,
            activity_log: self.activity_log.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

/// Run the CLI and return the process exit code.
pub fn run(cli: &Cli) -> i32 {
    if cli.no_color || std::env::var_os("NO_COLOR").is_some() || !io::stderr().is_terminal() {
        control::set_override(false);
    }

    if let Some(shell) = cli.completions {
        let mut command = Cli::command();
        let binary_name = command.get_name().to_string();
        generate(shell, &mut command, binary_name, &mut io::stdout());
        return 0;
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(mut config) => {
            config.overlay(cli.to_config());
            config
        }
        Err(err) => return fail_early(cli, cli.activity_log.clone(), &err),
    };
    let activity_log = config.activity_log.clone();
    let settings = match config.resolve(default_hook_path().as_deref()) {
        Ok(settings) => settings,
        Err(err) => return fail_early(cli, activity_log, &err),
    };
    if cli.verbose {
        describe_settings(&settings);
    }

    let fetcher = match HttpFetcher::new(settings.timeout) {
        Ok(fetcher) => fetcher,
        Err(err) => return fail_early(cli, activity_log, &err),
    };

    let mut log = JsonlWriter::from_option(activity_log);
    let report = Pipeline::new(&settings, &fetcher, &SystemRunner)
        .with_interrupt(InterruptLatch::install())
        .run(&mut log);

    emit_report(cli, &report);
    report.exit_code
}

/// Report a failure that happened before the pipeline started.
fn fail_early(cli: &Cli, activity_log: Option<PathBuf>, err: &CpError) -> i32 {
    JsonlWriter::from_option(activity_log).write_entry(&LogEntry::from_error(err));
    let mut report = RunReport::new(cli.name.as_deref().unwrap_or_default());
    report.fail(err);
    emit_report(cli, &report);
    err.exit_code()
}

fn describe_settings(settings: &Settings) {
    eprintln!("certpull: certificate {}", settings.certificate.url);
    eprintln!("certpull: private key {}", settings.private_key.url);
    eprintln!(
        "certpull: install as {}:{} mode {:04o}",
        settings.ownership.uid, settings.ownership.gid, settings.ownership.mode
    );
    match &settings.hook {
        Some(hook) => eprintln!("certpull: hook {}", hook.display()),
        None => eprintln!("certpull: no hook"),
    }
}

fn emit_report(cli: &Cli, report: &RunReport) {
    if let Some(err) = &report.error {
        eprintln!("certpull: {}", err.message.red());
    }

    if cli.json {
        match serde_json::to_string_pretty(report) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("certpull: failed to serialize report: {e}"),
        }
        return;
    }
    if cli.quiet || (report.outcome == RunOutcome::Failed && !cli.verbose) {
        return;
    }

    let text = format_report(report);
    let mut stdout = io::stdout().lock();
    if cli.verbose {
        let _ = stdout.write_all(text.as_bytes());
        return;
    }
    if let Some(last) = text.lines().last() {
        let line = match report.outcome {
            RunOutcome::Updated => last.green(),
            RunOutcome::NoChange => last.dimmed(),
            RunOutcome::Failed => last.red(),
        };
        let _ = writeln!(stdout, "{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn short_flags_map_to_config_fields() {
        let cli = Cli::try_parse_from([
            "certpull", "-s", "certs.example.com", "-n", "www", "-c", "ck", "-k", "kk", "-C",
            "/etc/ssl/www.crt", "-K", "/etc/ssl/www.key", "-u", "0", "-g", "0", "-m", "0640",
            "-p", "/bin/true",
        ])
        .expect("parse");
        let config = cli.to_config();
        assert_eq!(config.server.as_deref(), Some("certs.example.com"));
        assert_eq!(config.name.as_deref(), Some("www"));
        assert_eq!(config.cert_api_key.as_ref().map(ApiKey::expose), Some("ck"));
        assert_eq!(config.key_api_key.as_ref().map(ApiKey::expose), Some("kk"));
        assert_eq!(config.cert_path, Some(PathBuf::from("/etc/ssl/www.crt")));
        assert_eq!(config.key_path, Some(PathBuf::from("/etc/ssl/www.key")));
        assert_eq!(config.mode.as_deref(), Some("0640"));
        assert_eq!(config.hook, Some(PathBuf::from("/bin/true")));
        assert!(!config.disable_hook);
    }

    #[test]
    fn hook_and_no_hook_conflict() {
        assert!(Cli::try_parse_from(["certpull", "--hook", "/bin/true", "--no-hook"]).is_err());
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["certpull", "-v", "-q"]).is_err());
    }

    #[test]
    fn completions_flag_accepts_shell_names() {
        let cli = Cli::try_parse_from(["certpull", "--completions", "bash"]).expect("parse");
        assert_eq!(cli.completions, Some(CompletionShell::Bash));
    }
}
