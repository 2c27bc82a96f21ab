use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use lw_core::{Config, LocalStateError};
use serde_json::json;

mod cli;
mod commands;

use cli::LwCli;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = LwCli::parse();
    init_tracing(cli.trace, cli.verbose);

    let config = build_config(&cli).map_err(|err| eyre!("{err:?}"))?;
    let code = match commands::execute(&config, &cli.command) {
        Ok(outcome) => {
            if cli.json {
                let payload = json!({ "status": "ok", "message": outcome.message, "details": outcome.details });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else if !outcome.message.is_empty() {
                println!("{}", outcome.message);
            }
            0
        }
        Err(err) => {
            let state = err.downcast_ref::<LocalStateError>();
            let code = if state.is_some_and(LocalStateError::is_not_found) {
                1
            } else {
                2
            };
            if cli.json {
                let payload = json!({
                    "status": "error",
                    "code": state.map(LocalStateError::code),
                    "message": format!("{err:#}"),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                eprintln!("lw: {err:#}");
            }
            code
        }
    };

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn build_config(cli: &LwCli) -> anyhow::Result<Config> {
    let mut config = Config::from_env()?;
    if let Some(root) = &cli.root {
        config.workspace_root.clone_from(root);
    }
    if let Some(user) = &cli.user {
        config.user_id.clone_from(user);
    }
    if let Some(rules_location) = &cli.rules_location {
        config.rules_location.clone_from(rules_location);
    }
    if let Some(design_repos) = &cli.design_repos {
        config.design_repos = Some(design_repos.clone());
    }
    Ok(config)
}

fn init_tracing(trace: bool, verbose: u8) {
    let level = if trace {
        "trace"
    } else {
        match verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = format!("lw={level},lw_core={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
