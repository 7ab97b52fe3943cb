//! Filter builder: turns free text plus a resolved date phrase into a
//! [`FilterSpec`].

use std::sync::LazyLock;

use regex::Regex;

use super::types::{EntityHint, FilterSpec, Resource};
use crate::temporal::DateMatch;

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+").expect("Invalid regex"));

/// Two-word phrases, matched before single words.
const PHRASES: &[(&str, Keyword)] = &[
    ("pull requests", Keyword::Resource(Resource::PullRequests)),
    ("pull request", Keyword::Resource(Resource::PullRequests)),
    ("work items", Keyword::Resource(Resource::WorkItems)),
    ("work item", Keyword::Resource(Resource::WorkItems)),
    ("user story", Keyword::Hint(EntityHint::UserStory)),
    ("user stories", Keyword::Hint(EntityHint::UserStory)),
];

#[derive(Debug, Clone, Copy)]
enum Keyword {
    Resource(Resource),
    Hint(EntityHint),
    Stopword,
}

const STOPWORDS: &[&str] = &[
    "a", "al", "con", "de", "del", "el", "en", "la", "las", "lo", "los", "me", "mi", "mis", "o",
    "para", "por", "que", "qué", "sobre", "su", "sus", "un", "una", "unos", "unas", "y", "dame",
    "muestra", "muestrame", "muéstrame", "mostrar", "ver", "todos", "todas", "cuales", "cuáles",
    "hay", "the", "an", "of", "in", "on", "for", "with", "and", "or", "show", "my", "all", "get",
    "list", "lista", "listar", "what", "which", "are",
];

fn keyword(word: &str) -> Option<Keyword> {
    let kw = match word {
        "pr" | "prs" | "pullrequests" | "pullrequest" => Keyword::Resource(Resource::PullRequests),
        "pipeline" | "pipelines" | "pipes" | "build" | "builds" => {
            Keyword::Resource(Resource::Pipelines)
        }
        "repo" | "repos" | "repositorio" | "repositorios" | "repository" | "repositories" => {
            Keyword::Resource(Resource::Repositories)
        }
        "item" | "items" | "workitem" | "workitems" | "elementos" => {
            Keyword::Resource(Resource::WorkItems)
        }

        "epic" | "epics" | "epica" | "epicas" | "épica" | "épicas" => {
            Keyword::Hint(EntityHint::Epic)
        }
        "historia" | "historias" | "story" | "stories" => Keyword::Hint(EntityHint::UserStory),
        "tarea" | "tareas" | "task" | "tasks" => Keyword::Hint(EntityHint::Task),
        "bug" | "bugs" => Keyword::Hint(EntityHint::Bug),
        "feature" | "features" | "funcionalidad" | "funcionalidades" => {
            Keyword::Hint(EntityHint::Feature)
        }

        "active" | "activo" | "activos" | "activa" | "activas" | "abierto" | "abiertos"
        | "abierta" | "abiertas" | "open" => Keyword::Hint(EntityHint::Active),
        "closed" | "done" | "cerrado" | "cerrados" | "cerrada" | "cerradas" | "completado"
        | "completados" | "completada" | "completadas" => Keyword::Hint(EntityHint::Closed),
        "new" | "nuevo" | "nuevos" | "nueva" | "nuevas" => Keyword::Hint(EntityHint::New),

        "created" | "creado" | "creados" | "creada" | "creadas" => {
            Keyword::Hint(EntityHint::Created)
        }

        w if STOPWORDS.contains(&w) => Keyword::Stopword,
        _ => return None,
    };
    Some(kw)
}

/// Priority among resource keywords, lower wins.
fn resource_rank(resource: Resource) -> u8 {
    match resource {
        Resource::PullRequests => 0,
        Resource::Pipelines => 1,
        Resource::Repositories => 2,
        Resource::WorkItems => 3,
    }
}

struct Word<'a> {
    start: usize,
    end: usize,
    raw: &'a str,
    norm: String,
}

/// Builds filter specs from free text.
#[derive(Debug, Clone, Default)]
pub struct FilterBuilder;

impl FilterBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build a filter from `text`. Words inside `date` are not re-read.
    pub fn build(&self, text: &str, date: Option<&DateMatch>) -> FilterSpec {
        let words: Vec<Word<'_>> = WORD
            .find_iter(text)
            .filter(|m| date.map_or(true, |d| !d.overlaps(m.start(), m.end())))
            .map(|m| Word {
                start: m.start(),
                end: m.end(),
                raw: m.as_str(),
                norm: m
                    .as_str()
                    .trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase(),
            })
            .collect();

        let mut resource: Option<Resource> = None;
        let mut hint: Option<EntityHint> = None;
        let mut raw_terms = Vec::new();

        let mut i = 0;
        while i < words.len() {
            let pair = words.get(i + 1).and_then(|next| {
                // Only adjacent words separated by plain whitespace form a phrase.
                let gap = &text[words[i].end..next.start];
                gap.chars().all(char::is_whitespace).then(|| {
                    let joined = format!("{} {}", words[i].norm, next.norm);
                    PHRASES
                        .iter()
                        .find(|(phrase, _)| *phrase == joined)
                        .map(|(_, kw)| *kw)
                })?
            });

            let (kw, consumed) = match pair {
                Some(kw) => (Some(kw), 2),
                None => (keyword(&words[i].norm), 1),
            };

            match kw {
                Some(Keyword::Resource(r)) => {
                    if resource.map_or(true, |cur| resource_rank(r) < resource_rank(cur)) {
                        resource = Some(r);
                    }
                }
                Some(Keyword::Hint(h)) => {
                    if hint.map_or(true, |cur| h.rank() < cur.rank()) {
                        hint = Some(h);
                    }
                }
                Some(Keyword::Stopword) => {}
                None => {
                    let term = words[i].raw.trim_matches(|c: char| c.is_ascii_punctuation() || "¿¡".contains(c));
                    if !term.is_empty() {
                        raw_terms.push(term.to_string());
                    }
                }
            }
            i += consumed;
        }

        let spec = FilterSpec {
            resource: resource.unwrap_or_default(),
            entity_hint: hint,
            date_range: date.map(|d| d.range),
            raw_terms,
        };
        tracing::debug!(
            resource = spec.resource.as_str(),
            hint = spec.entity_hint.map(|h| h.as_str()),
            terms = spec.raw_terms.len(),
            "Built filter"
        );
        spec
    }
}
