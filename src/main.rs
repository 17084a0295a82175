//! Skillpack - Main entry point.
//!
//! Browses and downloads skill bundles from configured providers.
//!
//! Usage: skills <COMMAND> [ARGS] [OPTIONS]
//!
//! Commands:
//!   list                 List skills
//!   search <QUERY>       Search skills by name or description
//!   info <NAME>          Show one skill's catalog entry
//!   fetch <NAME>         Download a skill and list its files
//!   clear-cache          Drop cached manifests
//!
//! Options:
//!   --provider, -p NAME  Provider name or owner/repo (default: configured default)
//!   --no-cache           Ignore cached manifests when listing
//!   --version, -v        Show version

use std::env;
use std::process::ExitCode;

use skillpack::config::Config;
use skillpack::provider::{ListOptions, Provider, SkillInfo};
use skillpack::registry::{self, ProviderRegistry};
use skillpack::{SkillError, VERSION, logging};

/// A parsed command line.
#[derive(Debug, Default)]
struct Args {
    command: Option<String>,
    operand: Option<String>,
    provider: Option<String>,
    no_cache: bool,
    version: bool,
}

impl Args {
    fn parse(raw: impl IntoIterator<Item = String>) -> Result<Self, String> {
        let mut args = Self::default();
        let mut iter = raw.into_iter();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--version" | "-v" => args.version = true,
                "--no-cache" => args.no_cache = true,
                "--provider" | "-p" => {
                    let name = iter
                        .next()
                        .ok_or_else(|| format!("{} requires a provider name", arg))?;
                    args.provider = Some(name);
                }
                flag if flag.starts_with('-') => return Err(format!("unknown option '{}'", flag)),
                _ if args.command.is_none() => args.command = Some(arg),
                _ if args.operand.is_none() => args.operand = Some(arg),
                _ => return Err(format!("unexpected argument '{}'", arg)),
            }
        }

        Ok(args)
    }

    fn operand(&self, what: &str) -> Result<&str, String> {
        self.operand
            .as_deref()
            .ok_or_else(|| format!("missing {}", what))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::parse(env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            print_usage();
            return ExitCode::from(2);
        }
    };

    if args.version {
        println!("skillpack v{}", VERSION);
        return ExitCode::SUCCESS;
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Keep the guard alive until exit so buffered log lines are flushed.
    let _log_guard = match logging::init(&config.log) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("warning: logging disabled: {}", e);
            None
        }
    };

    match run(&args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Usage(message)) => {
            eprintln!("error: {}", message);
            print_usage();
            ExitCode::from(2)
        }
        Err(CliError::Skill(e)) => {
            eprintln!("error: {}", e);
            if let Some(hint) = e.hint() {
                eprintln!("hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

enum CliError {
    Usage(String),
    Skill(SkillError),
}

impl From<SkillError> for CliError {
    fn from(e: SkillError) -> Self {
        Self::Skill(e)
    }
}

impl From<String> for CliError {
    fn from(message: String) -> Self {
        Self::Usage(message)
    }
}

async fn run(args: &Args, config: Config) -> Result<(), CliError> {
    if registry::install(ProviderRegistry::from_config(config)?).is_err() {
        tracing::debug!("[CLI] Registry already installed");
    }
    let provider = args.provider.as_deref();

    match args.command.as_deref() {
        Some("list") => {
            let options = if args.no_cache {
                ListOptions::refresh()
            } else {
                ListOptions::default()
            };
            for p in registry::get_providers(provider)? {
                let listing = p.list_with(options).await?;
                println!("{} ({} skills)", p.display_name(), listing.skills.len());
                print_skills(&listing.skills);
                if listing.skipped > 0 {
                    println!("  ({} malformed entries skipped)", listing.skipped);
                }
            }
        }
        Some("search") => {
            let query = args.operand("search query")?;
            for p in registry::get_providers(provider)? {
                let found = p.search(query).await?;
                if !found.is_empty() {
                    println!("{}", p.display_name());
                    print_skills(&found);
                }
            }
        }
        Some("info") => {
            let name = args.operand("skill name")?;
            let p = registry::get_provider(provider)?;
            match p.info(name).await? {
                Some(skill) => print_info(p.as_ref(), &skill),
                None => {
                    return Err(SkillError::SkillNotFound {
                        skill: name.to_string(),
                        provider: p.name().to_string(),
                    }
                    .into());
                }
            }
        }
        Some("fetch") => {
            let name = args.operand("skill name")?;
            let p = registry::get_provider(provider)?;
            let files = p.fetch(name).await?;
            println!("{} files in '{}' from {}", files.len(), name, p.display_name());
            for file in &files {
                println!("  {:>8}  {}", file.content.len(), file.path);
            }
        }
        Some("clear-cache") => {
            for p in registry::get_providers(provider)? {
                p.clear_cache();
                println!("Cleared cache for {}", p.display_name());
            }
            registry::clear_provider_cache();
        }
        Some(other) => return Err(format!("unknown command '{}'", other).into()),
        None => return Err("no command given".to_string().into()),
    }

    Ok(())
}

fn print_skills(skills: &[SkillInfo]) {
    for skill in skills {
        println!("  {:<24} {:<10} {}", skill.name, skill.version, skill.description);
    }
}

fn print_info(provider: &dyn Provider, skill: &SkillInfo) {
    println!("{}", skill.name);
    println!("  Version:     {}", skill.version);
    println!("  Description: {}", skill.description);
    println!("  Provider:    {}", provider.display_name());
    if let Some(repo) = &skill.repo {
        println!("  Repository:  {}", repo);
    }
}

fn print_usage() {
    eprintln!("Usage: skills <list|search QUERY|info NAME|fetch NAME|clear-cache> [--provider NAME] [--no-cache]");
    eprintln!("       skills --version");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Args, String> {
        Args::parse(line.split_whitespace().map(String::from))
    }

    #[test]
    fn test_parse_command_and_flags() {
        let args = parse("fetch pdf --provider acme/skills").unwrap();
        assert_eq!(args.command.as_deref(), Some("fetch"));
        assert_eq!(args.operand.as_deref(), Some("pdf"));
        assert_eq!(args.provider.as_deref(), Some("acme/skills"));
        assert!(!args.no_cache);

        let args = parse("list -p team --no-cache").unwrap();
        assert!(args.no_cache);
        assert_eq!(args.provider.as_deref(), Some("team"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("list --provider").is_err());
        assert!(parse("list --bogus").is_err());
        assert!(parse("info a b").is_err());
        assert!(parse("info").unwrap().operand("skill name").is_err());
    }
}
