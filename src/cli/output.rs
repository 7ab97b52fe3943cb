//! Output formatting for CLI commands.

use devops_resolver::query::Command;
use devops_resolver::RenderedOutput;
use serde_json::json;

/// Print a rendered output, or a JSON envelope around it.
pub fn print_output(output: &RenderedOutput, json: bool) {
    if json {
        let envelope = json!({
            "output": output.as_str(),
            "is_error": output.is_error(),
        });
        match serde_json::to_string_pretty(&envelope) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("Failed to encode output: {e}"),
        }
    } else if !output.is_empty() {
        println!("{output}");
    }
}

/// Print the shorthand vocabulary.
pub fn print_help() {
    println!("Comandos:");
    for command in Command::ALL {
        println!("  {}", command.usage());
    }
    println!();
    println!("Cualquier otro texto se interpreta como consulta libre, p. ej.");
    println!("  bugs activos creados en abril de 2025");
    println!("  pull requests cerrados el mes pasado");
    println!("Salir: exit, salir, terminar");
}

pub fn print_banner(backend: &str) {
    println!(
        "{} {} (backend: {backend}). Escribe 'ayuda' para ver los comandos.",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
}
