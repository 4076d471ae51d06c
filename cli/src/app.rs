use anyhow::{Context, Result, anyhow};
use colored::*;
use dialoguer::{Password, Select};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use mentora_core::{
    AuthSession, Conversation, MentoraError, RequestCategory, SendRejection, Turn, load_spreadsheet,
};
use std::future::Future;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use crate::output::{
    print_categories, print_instructions, print_interactive_help, print_message, print_user,
    print_welcome,
};

pub type Chat = Conversation;

fn spinner(message: &str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner} {msg}")
            .context("Invalid spinner template")?,
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    Ok(spinner)
}

/// Validates the email with the identity service and stores the session
pub async fn run_login(session: &AuthSession, email: &str, ask_password: bool) -> Result<()> {
    let password = if ask_password {
        Some(
            Password::new()
                .with_prompt("Contraseña")
                .interact()
                .context("Failed to read password")?,
        )
    } else {
        None
    };

    let spinner = spinner("Validando docente...")?;
    let result = session.login(email, password.as_deref()).await;
    spinner.finish_and_clear();

    match result {
        Ok(user) => {
            info!("Signed in as {}", user.email);
            print_user(&user);
            Ok(())
        }
        Err(e) => {
            println!("{} {}", "✗".red().bold(), e.friendly_message());
            Err(anyhow!(e).context("Sign-in failed"))
        }
    }
}

/// Sends one query and prints the assistant turn
pub async fn run_single_query(
    conversation: &mut Chat,
    prompt: &str,
    category: Option<RequestCategory>,
) -> Result<()> {
    // One-shot queries without -c go to the general endpoint
    let category = category
        .or(conversation.active_category())
        .unwrap_or(RequestCategory::Default);
    info!("Running single query ({})", category.key());

    let turn = dispatch_query(conversation, prompt, Some(category))
        .await
        .inspect_err(report_error)?;
    if let Some(message) = conversation.last_message() {
        print_message(message);
    }
    turn_result(turn)
}

/// Uploads a spreadsheet through the bulk-management endpoint
pub async fn run_bulk_upload(conversation: &mut Chat, path: &Path) -> Result<()> {
    let turn = dispatch_upload(conversation, path)
        .await
        .inspect_err(report_error)?;
    if let Some(message) = conversation.last_message() {
        print_message(message);
    }
    turn_result(turn)
}

/// Runs the interactive chat loop until /salir, EOF or the session ends
pub async fn run_interactive_chat(
    conversation: &mut Chat,
    initial: Option<RequestCategory>,
) -> Result<()> {
    if let Some(user) = conversation.session().current_user() {
        print_welcome(&user);
    }
    if let Some(message) = conversation.last_message() {
        print_message(message);
    }
    if let Some(category) = initial {
        print_instructions(category);
        conversation.select_category(category);
    }
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if !conversation.session().is_authenticated() {
            println!(
                "{}",
                "Tu sesión ha finalizado. Inicia sesión nuevamente con --login.".red()
            );
            break;
        }

        let prompt = conversation
            .active_category()
            .map(|c| format!("Tú [{}]", c.key()))
            .unwrap_or_else(|| "Tú".to_string());
        print!("{}: ", prompt.green().bold());
        io::stdout().flush().context("Failed to flush stdout")?;

        let line = match next_input(&mut lines, tokio::signal::ctrl_c()).await? {
            Input::Line(line) => line,
            Input::Eof => {
                println!();
                break;
            }
            Input::Interrupted => {
                println!();
                println!("Hasta pronto.");
                break;
            }
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            println!("Hasta pronto.");
            break;
        }

        if let Some(command) = input.strip_prefix('/') {
            let (name, rest) = command
                .split_once(char::is_whitespace)
                .map(|(name, rest)| (name, rest.trim()))
                .unwrap_or((command, ""));
            match name {
                "salir" => {
                    println!("Hasta pronto.");
                    break;
                }
                "ayuda" => print_interactive_help(),
                "categorias" => print_categories(conversation.active_category()),
                "categoria" => {
                    if let Some(category) = choose_category(rest)? {
                        print_instructions(category);
                        conversation.select_category(category);
                    }
                }
                "ejemplo" => match conversation.active_category().and_then(|c| c.sample_prompt()) {
                    Some(sample) => {
                        println!("{} {}", "→".dimmed(), sample.dimmed());
                        interactive_query(conversation, sample).await;
                    }
                    None => println!("{}", "No hay una consulta de ejemplo para este tipo.".yellow()),
                },
                "subir" => {
                    if rest.is_empty() {
                        println!("{}", "Uso: /subir <archivo.xlsx>".yellow());
                    } else {
                        interactive_upload(conversation, Path::new(rest)).await;
                    }
                }
                "historial" => {
                    for message in conversation.messages() {
                        print_message(message);
                    }
                }
                other => println!(
                    "{} /{}. Escribe /ayuda para ver los comandos.",
                    "Comando desconocido:".yellow(),
                    other
                ),
            }
            println!();
            continue;
        }

        interactive_query(conversation, input).await;
        println!();
    }

    Ok(())
}

/// What the prompt produced
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Line(String),
    Eof,
    Interrupted,
}

/// Wait for the next line, or for `interrupt` to fire. Once a request has
/// listened for Ctrl-C the default SIGINT exit no longer applies, so the
/// prompt has to listen too.
async fn next_input<R, F>(lines: &mut Lines<R>, interrupt: F) -> Result<Input>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = io::Result<()>>,
{
    tokio::select! {
        line = lines.next_line() => Ok(match line.context("Failed to read input")? {
            Some(line) => Input::Line(line),
            None => Input::Eof,
        }),
        Ok(()) = interrupt => Ok(Input::Interrupted),
    }
}

async fn interactive_query(conversation: &mut Chat, text: &str) {
    match dispatch_query(conversation, text, None).await {
        Ok(_) => {
            if let Some(message) = conversation.last_message() {
                print_message(message);
            }
        }
        Err(e) => report_error(&e),
    }
}

async fn interactive_upload(conversation: &mut Chat, path: &Path) {
    match dispatch_upload(conversation, path).await {
        Ok(_) => {
            if let Some(message) = conversation.last_message() {
                print_message(message);
            }
        }
        Err(e) => report_error(&e),
    }
}

/// Print a refused or failed action the way the chat would phrase it
pub fn report_error(e: &anyhow::Error) {
    if let Some(invalid) = e.downcast_ref::<MentoraError>().filter(|e| e.is_validation()) {
        println!("{} {}", "✗".red().bold(), invalid.friendly_message());
        return;
    }
    match e.downcast_ref::<SendRejection>() {
        Some(SendRejection::NoCategory) => println!(
            "{}",
            "Selecciona primero un tipo de consulta con /categoria.".yellow()
        ),
        Some(SendRejection::NeedsFile(_)) => println!(
            "{}",
            "La gestión masiva trabaja con archivos: usa /subir <archivo.xlsx>.".yellow()
        ),
        Some(rejection) => println!("{}", rejection.to_string().yellow()),
        None => {
            error!("{:#}", e);
            println!("{} {}", "✗".red().bold(), e);
        }
    }
}

/// Runs a text request, abandoning it if the user presses Ctrl-C
async fn dispatch_query(
    conversation: &mut Chat,
    text: &str,
    category: Option<RequestCategory>,
) -> Result<Turn> {
    let client = conversation.session().client().clone();
    let pending = conversation.begin_send(text, category)?;
    debug!("Query generation {} dispatched", pending.generation());

    let spinner = spinner("Procesando tu solicitud...")?;
    let outcome = tokio::select! {
        result = client.send_query(pending.usuario(), pending.subject(), pending.category()) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    spinner.finish_and_clear();

    Ok(match outcome {
        Some(result) => conversation.complete(pending, result),
        None => {
            conversation.cancel_pending();
            Turn::Stale
        }
    })
}

async fn dispatch_upload(conversation: &mut Chat, path: &Path) -> Result<Turn> {
    let sheet = load_spreadsheet(path).await?;

    let client = conversation.session().client().clone();
    let pending = conversation.begin_bulk_upload(&sheet.file_base64, &sheet.filename)?;
    if let Some(message) = conversation.last_message() {
        print_message(message);
    }

    let spinner = spinner("Procesando archivo...")?;
    let outcome = tokio::select! {
        result = client.upload_bulk(pending.usuario(), &sheet.filename, &sheet.file_base64) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    spinner.finish_and_clear();

    Ok(match outcome {
        Some(result) => conversation.complete_bulk(pending, result),
        None => {
            conversation.cancel_pending();
            Turn::Stale
        }
    })
}

fn choose_category(name: &str) -> Result<Option<RequestCategory>> {
    if !name.is_empty() {
        return match name.parse::<RequestCategory>() {
            Ok(category) => Ok(Some(category)),
            Err(e) => {
                println!("{}", e.yellow());
                Ok(None)
            }
        };
    }

    let labels: Vec<&str> = RequestCategory::ALL.iter().map(|c| c.label()).collect();
    let index = match Select::new()
        .with_prompt("Tipo de consulta")
        .items(&labels)
        .default(0)
        .interact_opt()
    {
        Ok(index) => index,
        // Ctrl-C in the picker just closes it
        Err(dialoguer::Error::IO(e)) if e.kind() == io::ErrorKind::Interrupted => None,
        Err(e) => return Err(e).context("Failed to read selection"),
    };
    Ok(index.map(|i| RequestCategory::ALL[i]))
}

fn turn_result(turn: Turn) -> Result<()> {
    match turn {
        Turn::Answered => Ok(()),
        Turn::Failed(e) => {
            warn!("Request failed: {}", e);
            Err(anyhow!(e))
        }
        Turn::Stale => Err(anyhow!(MentoraError::Transport(
            "solicitud cancelada".to_string()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::pending;

    #[tokio::test]
    async fn test_next_input_reads_lines_then_eof() {
        let mut lines = BufReader::new(&b"/ayuda\nPlanifica la clase 1\n"[..]).lines();

        let first = next_input(&mut lines, pending()).await.unwrap();
        assert_eq!(first, Input::Line("/ayuda".to_string()));
        let second = next_input(&mut lines, pending()).await.unwrap();
        assert_eq!(second, Input::Line("Planifica la clase 1".to_string()));
        assert_eq!(next_input(&mut lines, pending()).await.unwrap(), Input::Eof);
    }

    #[tokio::test]
    async fn test_ctrl_c_at_the_prompt_ends_the_wait() {
        // Writer stays open so the read never completes
        let (_writer, reader) = tokio::io::duplex(64);
        let mut lines = BufReader::new(reader).lines();

        let input = next_input(&mut lines, async { Ok(()) }).await.unwrap();
        assert_eq!(input, Input::Interrupted);
    }

    #[tokio::test]
    async fn test_failed_signal_listener_keeps_reading() {
        let mut lines = BufReader::new(&b"hola mundo\n"[..]).lines();
        let broken = async { Err(io::Error::other("no signal handler")) };

        let input = next_input(&mut lines, broken).await.unwrap();
        assert_eq!(input, Input::Line("hola mundo".to_string()));
    }
}
