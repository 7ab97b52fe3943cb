//! CLI command handlers.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use devops_resolver::{CommandEngine, Session};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::output;

const EXIT_WORDS: &[&str] = &["exit", "salir", "terminar", "quit"];
const HELP_WORDS: &[&str] = &["help", "ayuda", "?"];

fn is_exit(line: &str) -> bool {
    EXIT_WORDS.contains(&line.trim().to_lowercase().as_str())
}

fn is_help(line: &str) -> bool {
    HELP_WORDS.contains(&line.trim().to_lowercase().as_str())
}

/// Read lines from stdin and resolve each until an exit word or EOF.
pub async fn run_repl(engine: Arc<CommandEngine>, mut session: Session, json: bool) -> Result<()> {
    output::print_banner(engine.backend().name());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if is_exit(&line) {
            break;
        }
        if is_help(&line) {
            output::print_help();
            continue;
        }

        let rendered = engine.resolve_and_respond(&mut session, &line).await;
        output::print_output(&rendered, json);
    }

    tracing::debug!("REPL finished");
    Ok(())
}

/// Resolve a single request and print the result.
///
/// Returns whether the output was an error, for the exit status.
pub async fn run_ask(
    engine: Arc<CommandEngine>,
    mut session: Session,
    text: &str,
    json: bool,
) -> Result<bool> {
    let rendered = engine.resolve_and_respond(&mut session, text).await;
    output::print_output(&rendered, json);
    Ok(rendered.is_error())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_words() {
        assert!(is_exit("salir"));
        assert!(is_exit("  TERMINAR "));
        assert!(is_exit("exit"));
        assert!(!is_exit("salir de aquí"));
    }

    #[test]
    fn test_help_words() {
        assert!(is_help("Ayuda"));
        assert!(!is_help("!items"));
    }
}
