use clap::Parser;
use mentora_core::RequestCategory;
use std::path::PathBuf;

/// Terminal client for the Mentora AI teacher assistant
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The query to send
    #[arg(index = 1)] // Positional argument
    pub prompt: Option<String>,

    /// Request category: planificador, recursos, adecuacion, seguimiento or default
    #[arg(short, long)]
    pub category: Option<RequestCategory>,

    /// Enter interactive chat mode
    #[arg(short, long, default_value_t = false)]
    pub interactive: bool,

    /// Sign in with the given institutional email
    #[arg(long, value_name = "EMAIL")]
    pub login: Option<String>,

    /// Prompt for a password when signing in
    #[arg(long, default_value_t = false, requires = "login")]
    pub ask_password: bool,

    /// Sign out and forget the stored session
    #[arg(long, default_value_t = false)]
    pub logout: bool,

    /// Show the signed-in user
    #[arg(long, default_value_t = false)]
    pub whoami: bool,

    /// Upload a spreadsheet (.xlsx/.xls) for bulk management
    #[arg(short, long, value_name = "FILE")]
    pub upload: Option<PathBuf>,

    /// Check whether the backend is reachable
    #[arg(long, default_value_t = false)]
    pub health: bool,

    /// Backend base URL
    #[arg(long, env = "MENTORA_API_URL")]
    pub api_url: Option<String>,

    /// Directory where returned files are saved
    #[arg(long)]
    pub download_dir: Option<PathBuf>,

    /// Path to an alternative config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_category_is_parsed_from_key_or_label() {
        let args = Args::parse_from(["mentora", "Planifica la clase 1", "-c", "planificador"]);
        assert_eq!(args.category, Some(RequestCategory::Planificador));
        assert_eq!(args.prompt.as_deref(), Some("Planifica la clase 1"));

        let args = Args::parse_from(["mentora", "-i", "--category", "Adecuación"]);
        assert!(args.interactive);
        assert_eq!(args.category, Some(RequestCategory::Adecuacion));

        assert!(Args::try_parse_from(["mentora", "-c", "integrador"]).is_err());
    }

    #[test]
    fn test_ask_password_requires_login() {
        assert!(Args::try_parse_from(["mentora", "--ask-password"]).is_err());
        let args =
            Args::try_parse_from(["mentora", "--login", "ana@colegio.edu", "--ask-password"])
                .unwrap();
        assert_eq!(args.login.as_deref(), Some("ana@colegio.edu"));
    }
}
