use chrono::Local;
use colored::*;
use mentora_core::{Message, RequestCategory, Role, User};
use pulldown_cmark::{Event as MdEvent, HeadingLevel, Options, Parser as MdParser, Tag};

/// Print one transcript turn with a role prefix
pub fn print_message(message: &Message) {
    let time = message.timestamp.with_timezone(&Local).format("%H:%M");
    match message.role {
        Role::User => println!(
            "{} {}: {}",
            time.to_string().dimmed(),
            "Tú".green().bold(),
            message.content
        ),
        Role::Assistant => {
            let tag = message
                .request_type
                .map(|c| format!(" [{}]", c.label()))
                .unwrap_or_default();
            println!(
                "{} {}{}: {}",
                time.to_string().dimmed(),
                "Mentora".blue().bold(),
                tag.dimmed(),
                render_markdown(&message.content).trim_end()
            );
            if let Some(attachment) = &message.attachment {
                println!(
                    "    {} {} ({})",
                    "📄".yellow(),
                    attachment.file_name.underline(),
                    human_size(attachment.len()).dimmed()
                );
            }
        }
    }
}

/// Show the hints for a freshly selected category
pub fn print_instructions(category: RequestCategory) {
    println!("{}", render_markdown(category.instructions()).trim_end());
    println!();
}

pub fn print_categories(active: Option<RequestCategory>) {
    println!("{}", "Tipos de consulta:".cyan().bold());
    for category in RequestCategory::ALL {
        let marker = if Some(category) == active { "●" } else { "○" };
        println!(
            "  {} {:<14} {}",
            marker.red(),
            category.key(),
            category.label().dimmed()
        );
    }
}

pub fn print_user(user: &User) {
    println!(
        "{} {} <{}>{}",
        "Sesión:".cyan().bold(),
        user.display_name,
        user.email,
        if user.is_teacher { " · docente" } else { "" }
    );
}

pub fn print_welcome(user: &User) {
    println!(
        "{}",
        format!("¡Bienvenid@, {}!", user.first_name()).yellow().bold()
    );
    println!("Selecciona una opción para comenzar con /categoria, o escribe /ayuda.");
    println!();
}

pub fn print_interactive_help() {
    println!("{}", "Comandos:".cyan().bold());
    println!("  /categoria [nombre]  Cambia el tipo de consulta (sin nombre abre un selector)");
    println!("  /categorias          Lista los tipos de consulta");
    println!("  /ejemplo             Envía la consulta de ejemplo del tipo activo");
    println!("  /subir <archivo>     Sube una hoja de cálculo para gestión masiva");
    println!("  /historial           Muestra la conversación completa");
    println!("  /ayuda               Muestra esta ayuda");
    println!("  /salir               Termina la sesión de chat");
    println!();
}

/// Show usage instructions when no prompt or action is provided
pub fn print_usage_instructions() {
    println!("{}", "Usage:".yellow().bold());
    println!("  {}", "mentora --login docente@colegio.edu".green().bold());
    println!("    Sign in against the identity validator");
    println!();
    println!("  {}", "mentora \"your query\" -c planificador".green().bold());
    println!("    Send a single query to the given category");
    println!();
    println!("  {}", "mentora --upload docentes.xlsx".green().bold());
    println!("    Upload a spreadsheet for bulk management");
    println!();
    println!("  {}", "mentora -i".green().bold());
    println!("    Start an interactive chat session");
    println!();
    println!("{}", "Options:".cyan());
    println!("  --api-url <URL>       Backend base URL (or MENTORA_API_URL)");
    println!("  --download-dir <DIR>  Where returned files are saved");
    println!("  --health              Check the backend health endpoint");
    println!("  --help                Show this help message");
    println!();
}

pub fn human_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let bytes_f = bytes as f64;
    if bytes_f < KB {
        format!("{} B", bytes)
    } else if bytes_f < KB * KB {
        format!("{:.1} KB", bytes_f / KB)
    } else {
        format!("{:.1} MB", bytes_f / (KB * KB))
    }
}

/// Render markdown for the terminal
pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = MdParser::new_ext(markdown, options);

    let mut in_code_block = false;
    let mut in_strong = false;
    let mut in_emphasis = false;
    let mut list_depth = 0usize;
    let mut output = String::new();

    // Table state tracking
    let mut in_table_cell = false;
    let mut current_row: Vec<String> = Vec::new();
    let mut table_rows: Vec<Vec<String>> = Vec::new();

    for event in parser {
        match event {
            MdEvent::Start(Tag::Table(_)) => {
                table_rows.clear();
                output.push('\n');
            }
            MdEvent::End(Tag::Table(_)) => {
                output.push_str(&render_table(&table_rows));
            }
            MdEvent::Start(Tag::TableRow) | MdEvent::Start(Tag::TableHead) => {
                current_row.clear();
            }
            MdEvent::End(Tag::TableRow) | MdEvent::End(Tag::TableHead) => {
                if !current_row.is_empty() {
                    table_rows.push(current_row.clone());
                }
            }
            MdEvent::Start(Tag::TableCell) => {
                in_table_cell = true;
                current_row.push(String::new());
            }
            MdEvent::End(Tag::TableCell) => {
                in_table_cell = false;
            }
            MdEvent::Start(Tag::Heading(level, ..)) => match level {
                HeadingLevel::H1 => output.push_str(&format!("\n{} ", "##".bright_cyan().bold())),
                HeadingLevel::H2 => output.push_str(&format!("\n{} ", "#".bright_cyan().bold())),
                _ => output.push('\n'),
            },
            MdEvent::End(Tag::Heading(..)) => output.push('\n'),
            MdEvent::Start(Tag::Paragraph) => {
                if !output.is_empty() && !output.ends_with('\n') {
                    output.push('\n');
                }
            }
            MdEvent::End(Tag::Paragraph) => {
                if list_depth == 0 {
                    output.push('\n');
                }
            }
            MdEvent::Start(Tag::CodeBlock(_)) => {
                in_code_block = true;
                output.push('\n');
            }
            MdEvent::End(Tag::CodeBlock(_)) => {
                in_code_block = false;
                output.push('\n');
            }
            MdEvent::Start(Tag::List(_)) => {
                list_depth += 1;
                if !output.ends_with('\n') {
                    output.push('\n');
                }
            }
            MdEvent::End(Tag::List(_)) => {
                list_depth = list_depth.saturating_sub(1);
            }
            MdEvent::Start(Tag::Item) => {
                output.push_str(&"  ".repeat(list_depth.saturating_sub(1)));
                output.push_str(&format!("{}  ", "•".yellow()));
            }
            MdEvent::End(Tag::Item) => {
                if !output.ends_with('\n') {
                    output.push('\n');
                }
            }
            MdEvent::Start(Tag::Strong) => in_strong = true,
            MdEvent::End(Tag::Strong) => in_strong = false,
            MdEvent::Start(Tag::Emphasis) => in_emphasis = true,
            MdEvent::End(Tag::Emphasis) => in_emphasis = false,
            MdEvent::Code(ref code) => {
                if in_table_cell {
                    if let Some(cell) = current_row.last_mut() {
                        cell.push_str(code);
                    }
                } else {
                    output.push_str(&code.on_bright_black().white().to_string());
                }
            }
            MdEvent::Text(ref text) => {
                if in_table_cell {
                    if let Some(cell) = current_row.last_mut() {
                        cell.push_str(text);
                    }
                } else if in_code_block {
                    output.push_str(&text.dimmed().to_string());
                } else if in_strong {
                    output.push_str(&text.bold().to_string());
                } else if in_emphasis {
                    output.push_str(&text.italic().to_string());
                } else {
                    output.push_str(text);
                }
            }
            MdEvent::SoftBreak => {
                if !in_table_cell {
                    output.push(' ');
                }
            }
            MdEvent::HardBreak => {
                if !in_table_cell {
                    output.push('\n');
                }
            }
            _ => {}
        }
    }

    output.trim_start_matches('\n').to_string()
}

fn render_table(rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    if rows.is_empty() {
        return out;
    }

    let col_count = rows.iter().map(|row| row.len()).max().unwrap_or(0);
    let mut col_widths = vec![0; col_count];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            col_widths[i] = col_widths[i].max(cell.chars().count());
        }
    }

    for (i, row) in rows.iter().enumerate() {
        for (j, cell) in row.iter().enumerate() {
            let padding = col_widths[j].saturating_sub(cell.chars().count());
            if i == 0 {
                out.push_str(&format!("{}{} ", cell.bold(), " ".repeat(padding)));
            } else {
                out.push_str(&format!("{}{} ", cell, " ".repeat(padding)));
            }
        }
        out.push('\n');

        // Separator under the header
        if i == 0 {
            let line: Vec<String> = col_widths.iter().map(|w| "─".repeat(*w)).collect();
            out.push_str(&line.join(" ").dimmed().to_string());
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(markdown: &str) -> String {
        colored::control::set_override(false);
        render_markdown(markdown)
    }

    #[test]
    fn test_instructions_render_as_bullets() {
        let rendered = plain(RequestCategory::Planificador.instructions());
        assert!(rendered.starts_with("Planificador de Clases"));
        assert!(rendered.contains("•  Grado o nivel"));
        assert!(!rendered.contains("**"));
    }

    #[test]
    fn test_table_columns_are_aligned() {
        let rendered = plain("| Grado | Avance |\n|---|---|\n| 12th | 80% |\n| 3rd | 100% |");
        let lines: Vec<&str> = rendered.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines[0].trim_end(), "Grado Avance");
        assert!(lines[1].starts_with("─────"));
        assert_eq!(lines[2].trim_end(), "12th  80%");
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(3 * 1024 * 1024), "3.0 MB");
    }
}
