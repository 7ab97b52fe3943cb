//! Intent classifier.
//!
//! Classifies a raw input line as a shorthand command, a bare id lookup, or
//! free text. Rules are tried in order and the first one that applies wins.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use super::types::*;
use crate::error::ResolveError;
use crate::temporal::DateResolver;

// ============================================================================
// Rule table
// ============================================================================

/// One classification rule: a predicate and the intent it builds.
struct Rule {
    name: &'static str,
    applies: fn(&str) -> bool,
    build: fn(&str) -> Result<Intent, ResolveError>,
}

const RULES: &[Rule] = &[
    Rule {
        name: "shorthand",
        applies: is_shorthand,
        build: parse_shorthand,
    },
    Rule {
        name: "bare_id",
        applies: is_bare_id_lookup,
        build: parse_bare_id,
    },
];

// ============================================================================
// Intent Classifier
// ============================================================================

/// Classifies raw input lines into intents.
pub struct IntentClassifier {
    rules: &'static [Rule],
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier {
    pub fn new() -> Self {
        Self { rules: RULES }
    }

    /// Classify a line. Anything no rule claims is free text.
    pub fn classify(&self, text: &str) -> Result<Intent, ResolveError> {
        let text = text.trim();
        for rule in self.rules {
            if (rule.applies)(text) {
                tracing::debug!(rule = rule.name, "Classification rule matched");
                return (rule.build)(text);
            }
        }
        Ok(Intent::FreeText {
            text: text.to_string(),
        })
    }
}

// ============================================================================
// Shorthand
// ============================================================================

fn is_shorthand(text: &str) -> bool {
    let mut words = text.split_whitespace();
    let Some(first) = words.next() else {
        return false;
    };
    match Command::from_token(first) {
        // The bang-less `debug` alias only counts on its own.
        Some(_) if !first.starts_with('!') => words.next().is_none(),
        Some(_) => true,
        None => false,
    }
}

fn parse_shorthand(text: &str) -> Result<Intent, ResolveError> {
    let first = text.split_whitespace().next().unwrap_or_default();
    let command = Command::from_token(first)
        .ok_or_else(|| ResolveError::malformed(first, "unknown command"))?;

    let rest = &text[first.len()..];
    let mut args = tokenize(rest).map_err(|reason| ResolveError::malformed(command.name(), reason))?;

    if command == Command::Query && !args.is_empty() {
        args = vec![args.join(" ")];
    }

    command.arity().check(args.len()).map_err(|reason| {
        ResolveError::malformed(command.name(), format!("{reason}; usage: {}", command.usage()))
    })?;

    let shorthand = ShorthandCommand::new(command, args);
    match command {
        Command::Item => Ok(Intent::IdLookup {
            kind: EntityKind::WorkItem,
            id: shorthand.id_arg(0)?,
        }),
        Command::UpdateItem | Command::CloneItem => {
            shorthand.id_arg(0)?;
            Ok(Intent::Shorthand(shorthand))
        }
        Command::CreateItem if shorthand.arg(0).trim().is_empty() => Err(ResolveError::malformed(
            command.name(),
            "title must not be empty",
        )),
        _ => Ok(Intent::Shorthand(shorthand)),
    }
}

/// Split arguments on whitespace, keeping double-quoted runs together.
///
/// Quotes are stripped. `""` yields an empty argument.
pub fn tokenize(input: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut in_quote = false;

    for ch in input.chars() {
        match ch {
            '"' | '“' | '”' => {
                in_quote = !in_quote;
                in_token = true;
            }
            c if c.is_whitespace() && !in_quote => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if in_quote {
        return Err("unterminated quote".to_string());
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

// ============================================================================
// Bare id
// ============================================================================

const ACTION_VERBS: &[&str] = &[
    "create", "crear", "crea", "creame", "update", "actualizar", "actualiza", "actualizame",
    "clone", "clonar", "clona", "delete", "borrar", "borra", "eliminar", "elimina", "list",
    "listar", "lista", "listame",
];

const COLLECTION_WORDS: &[&str] = &[
    "repositorios", "repositories", "repos", "pipelines", "pipes", "builds", "bugs", "tareas",
    "tasks", "items", "workitems", "historias", "stories", "epicas", "épicas", "epics",
    "features", "prs", "pullrequests", "requests",
];

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+").expect("Invalid regex"));

/// Lowercased word with surrounding punctuation removed.
fn normalize(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase()
}

/// Digits of a bare id token such as `21101`, `#21101` or `21101.`.
fn id_digits(word: &str) -> Option<&str> {
    let digits = word
        .trim_start_matches(['(', '['])
        .trim_start_matches('#')
        .trim_end_matches(|c: char| c.is_ascii_punctuation());
    (!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())).then_some(digits)
}

/// Byte span of a date phrase that is more than a lone number, valid or not.
fn date_phrase_span(text: &str) -> Option<(usize, usize)> {
    // Spans do not depend on the reference date.
    let (start, end) = DateResolver::with_reference_date(NaiveDate::default()).phrase_span(text)?;
    text[start..end]
        .bytes()
        .any(|b| !b.is_ascii_digit())
        .then_some((start, end))
}

/// First bare id token, skipping numbers inside date phrases.
fn first_bare_id(text: &str) -> Option<&str> {
    let span = date_phrase_span(text);
    WORD.find_iter(text)
        .filter(|m| span.map_or(true, |(s, e)| m.end() <= s || m.start() >= e))
        .find_map(|m| id_digits(m.as_str()))
}

fn is_bare_id_lookup(text: &str) -> bool {
    if first_bare_id(text).is_none() {
        return false;
    }
    let words: Vec<String> = text.split_whitespace().map(normalize).collect();
    let has_verb = words.iter().any(|w| ACTION_VERBS.contains(&w.as_str()));
    let has_collection = words.iter().any(|w| COLLECTION_WORDS.contains(&w.as_str()));
    !has_verb && !has_collection
}

fn parse_bare_id(text: &str) -> Result<Intent, ResolveError> {
    let digits = first_bare_id(text).unwrap_or_default();
    let id = digits
        .parse::<i64>()
        .map_err(|_| ResolveError::UnparsableId(digits.to_string()))?;

    let lower = text.to_lowercase();
    let is_pr = lower.contains("pull request")
        || text
            .split_whitespace()
            .map(normalize)
            .any(|w| w == "pr" || w == "pullrequest");

    let kind = if is_pr {
        EntityKind::PullRequest
    } else {
        EntityKind::WorkItem
    };
    Ok(Intent::IdLookup { kind, id })
}

// ============================================================================
// Tests
// ============================================================================
