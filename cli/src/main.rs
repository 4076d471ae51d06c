use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use log::{LevelFilter, debug};
use mentora_core::config::{APP_NAME, get_default_config_file};
use mentora_core::{
    AuthSession, Conversation, DirectoryDownloads, FileSessionStore, MentoraClient, MentoraConfig,
};
use std::process::ExitCode;
use std::sync::Arc;

mod app;
mod cli;
mod logging;
mod output;

use crate::cli::Args;
use crate::logging::log_error;
use crate::output::{print_usage_instructions, print_user};

/// Layers the config file, the environment and the command line, in that order
fn load_config(args: &Args) -> Result<MentoraConfig> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => get_default_config_file(APP_NAME)?,
    };
    let from_file = MentoraConfig::load_from_file(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    let from_flags = MentoraConfig {
        api_url: args.api_url.clone(),
        download_dir: args.download_dir.clone(),
        ..Default::default()
    };

    Ok(from_file
        .merge(&MentoraConfig::from_env())
        .merge(&from_flags))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables before clap reads MENTORA_API_URL
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = load_config(&args)?;

    let log_level = if args.verbose {
        LevelFilter::Debug
    } else {
        logging::parse_level(config.log_level.as_deref())
    };
    logging::init(log_level);
    debug!("Using backend at {}", config.api_url());

    let client = MentoraClient::new(config.clone()).context("Failed to initialize client")?;

    if args.health {
        return Ok(if client.health_check().await {
            println!("{} {}", "✓".green().bold(), config.api_url());
            ExitCode::SUCCESS
        } else {
            println!("{} {} no responde", "✗".red().bold(), config.api_url());
            ExitCode::FAILURE
        });
    }

    let store = Arc::new(FileSessionStore::new(config.session_file()?));
    let session = AuthSession::new(client, store);

    if args.logout {
        session.logout().await.context("Failed to clear session")?;
        println!("Sesión cerrada.");
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(email) = &args.login {
        if let Err(e) = app::run_login(&session, email, args.ask_password).await {
            debug!("{:#}", e);
            return Ok(ExitCode::FAILURE);
        }
    } else {
        let wants_session =
            args.whoami || args.interactive || args.prompt.is_some() || args.upload.is_some();
        if wants_session && session.restore().await.is_none() {
            println!(
                "{}",
                "No hay una sesión iniciada. Usa --login <correo> para ingresar.".yellow()
            );
            return Ok(ExitCode::FAILURE);
        }
    }

    if args.whoami {
        if let Some(user) = session.current_user() {
            print_user(&user);
        }
    }

    let downloads = Arc::new(DirectoryDownloads::new(config.download_dir()));
    let mut conversation = Conversation::new(session.clone(), downloads);

    let outcome = if let Some(path) = &args.upload {
        app::run_bulk_upload(&mut conversation, path).await
    } else if args.interactive {
        let integrity = session.spawn_integrity_check(config.revalidate_interval());
        let result = app::run_interactive_chat(&mut conversation, args.category).await;
        integrity.abort();
        result
    } else if let Some(prompt) = &args.prompt {
        app::run_single_query(&mut conversation, prompt, args.category).await
    } else {
        if args.login.is_none() && !args.whoami {
            print_usage_instructions();
        }
        Ok(())
    };

    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            log_error(&format!("{:#}", e));
            Ok(ExitCode::FAILURE)
        }
    }
}
