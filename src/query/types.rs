//! Types for command and query resolution.

use serde::{Deserialize, Serialize};

use crate::error::ResolveError;
use crate::temporal::DateRange;

// ============================================================================
// Intent
// ============================================================================

/// What the operator asked for. Every input line maps to exactly one variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "intent")]
pub enum Intent {
    /// A recognized bang command with validated arguments.
    Shorthand(ShorthandCommand),
    /// A single entity addressed by its numeric id.
    IdLookup { kind: EntityKind, id: i64 },
    /// Anything else, handed to the filter builder.
    FreeText { text: String },
}

impl Intent {
    /// Get a human-readable name for this intent.
    pub fn display_name(&self) -> String {
        match self {
            Self::Shorthand(cmd) => format!("Shorthand: {}", cmd.command.name()),
            Self::IdLookup { kind, id } => format!("Lookup: {} {}", kind.as_str(), id),
            Self::FreeText { .. } => "Free text".to_string(),
        }
    }

    /// Whether this is the session debug toggle.
    pub fn is_debug_toggle(&self) -> bool {
        matches!(self, Self::Shorthand(cmd) if cmd.command == Command::Debug)
    }
}

/// The kinds of entity a bare id can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    WorkItem,
    PullRequest,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkItem => "work item",
            Self::PullRequest => "pull request",
        }
    }
}

// ============================================================================
// Shorthand commands
// ============================================================================

/// How many arguments a shorthand command takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Any trailing text, used as a filter.
    Trailing,
    AtLeast(usize),
    Exact(usize),
}

impl Arity {
    /// Check an argument count, describing the mismatch on failure.
    pub fn check(&self, got: usize) -> Result<(), String> {
        match *self {
            Self::Trailing => Ok(()),
            Self::AtLeast(n) if got >= n => Ok(()),
            Self::AtLeast(n) => Err(format!("expected at least {n} argument(s), got {got}")),
            Self::Exact(n) if got == n => Ok(()),
            Self::Exact(n) => Err(format!("expected {n} argument(s), got {got}")),
        }
    }
}

/// The shorthand vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Repos,
    Items,
    Pipelines,
    Prs,
    Query,
    Item,
    CreateItem,
    UpdateItem,
    CloneItem,
    Me,
    Debug,
}

impl Command {
    pub const ALL: [Command; 11] = [
        Self::Repos,
        Self::Items,
        Self::Pipelines,
        Self::Prs,
        Self::Query,
        Self::Item,
        Self::CreateItem,
        Self::UpdateItem,
        Self::CloneItem,
        Self::Me,
        Self::Debug,
    ];

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Repos => "repos",
            Self::Items => "items",
            Self::Pipelines => "pipelines",
            Self::Prs => "prs",
            Self::Query => "query",
            Self::Item => "item",
            Self::CreateItem => "create_item",
            Self::UpdateItem => "update_item",
            Self::CloneItem => "clone_item",
            Self::Me => "me",
            Self::Debug => "debug",
        }
    }

    /// Tokens that invoke this command, compared case-insensitively.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Repos => &["!repos", "!repositories", "!repositorios"],
            Self::Items => &["!items", "!workitems"],
            Self::Pipelines => &["!pipes", "!pipelines"],
            Self::Prs => &["!prs", "!pullrequests"],
            Self::Query => &["!query", "!consulta"],
            Self::Item => &["!item", "!workitem"],
            Self::CreateItem => &["!create_item", "!crear"],
            Self::UpdateItem => &["!update_item", "!actualizar"],
            Self::CloneItem => &["!clone_item", "!clonar"],
            Self::Me => &["!me", "!yo"],
            Self::Debug => &["!debug", "debug"],
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            Self::Repos | Self::Items | Self::Pipelines | Self::Prs => Arity::Trailing,
            Self::Query => Arity::AtLeast(1),
            Self::Item => Arity::Exact(1),
            Self::CreateItem | Self::CloneItem => Arity::Exact(2),
            Self::UpdateItem => Arity::Exact(3),
            Self::Me | Self::Debug => Arity::Exact(0),
        }
    }

    /// Usage line shown in help and error messages.
    pub fn usage(&self) -> &'static str {
        match self {
            Self::Repos => "!repos [filtro]",
            Self::Items => "!items [filtro]",
            Self::Pipelines => "!pipelines [filtro]",
            Self::Prs => "!prs [filtro]",
            Self::Query => "!query <texto>",
            Self::Item => "!item <id>",
            Self::CreateItem => "!create_item \"<título>\" <tipo>",
            Self::UpdateItem => "!update_item <id> <campo> \"<valor>\"",
            Self::CloneItem => "!clone_item <id> \"<nuevo título>\"",
            Self::Me => "!me",
            Self::Debug => "debug",
        }
    }

    /// Look up a command by one of its alias tokens.
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|cmd| cmd.aliases().contains(&token.as_str()))
    }

    /// The collection a listing command targets.
    pub fn resource(&self) -> Option<Resource> {
        match self {
            Self::Repos => Some(Resource::Repositories),
            Self::Items => Some(Resource::WorkItems),
            Self::Pipelines => Some(Resource::Pipelines),
            Self::Prs => Some(Resource::PullRequests),
            _ => None,
        }
    }
}

/// A bang command and its tokenized arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShorthandCommand {
    pub command: Command,
    pub args: Vec<String>,
}

impl ShorthandCommand {
    pub fn new(command: Command, args: Vec<String>) -> Self {
        Self { command, args }
    }

    /// Argument at `index`, or an empty string if absent.
    pub fn arg(&self, index: usize) -> &str {
        self.args.get(index).map(String::as_str).unwrap_or_default()
    }

    /// Parse the argument at `index` as an entity id.
    pub fn id_arg(&self, index: usize) -> Result<i64, ResolveError> {
        parse_id(self.command.name(), self.arg(index))
    }

    /// Arguments joined back into one line.
    pub fn joined_args(&self) -> String {
        self.args.join(" ")
    }
}

/// Parse an all-digits id. Non-digits are malformed, overflow is unparsable.
pub(crate) fn parse_id(command: &str, raw: &str) -> Result<i64, ResolveError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ResolveError::malformed(
            command,
            format!("'{raw}' is not a numeric id"),
        ));
    }
    raw.parse::<i64>()
        .map_err(|_| ResolveError::UnparsableId(raw.to_string()))
}

// ============================================================================
// Filters
// ============================================================================

/// The collection a query targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    #[default]
    WorkItems,
    Repositories,
    Pipelines,
    PullRequests,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkItems => "work items",
            Self::Repositories => "repositories",
            Self::Pipelines => "pipelines",
            Self::PullRequests => "pull requests",
        }
    }
}

/// A single type, status or creation hint recognized in free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityHint {
    Epic,
    UserStory,
    Task,
    Bug,
    Feature,
    Active,
    Closed,
    New,
    Created,
}

impl EntityHint {
    /// Value as the backend spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Epic => "Epic",
            Self::UserStory => "User Story",
            Self::Task => "Task",
            Self::Bug => "Bug",
            Self::Feature => "Feature",
            Self::Active => "Active",
            Self::Closed => "Closed",
            Self::New => "New",
            Self::Created => "Created",
        }
    }

    /// Lower rank wins when several hints appear.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Epic | Self::UserStory | Self::Task | Self::Bug | Self::Feature => 0,
            Self::Active | Self::Closed | Self::New => 1,
            Self::Created => 2,
        }
    }

    pub fn is_work_item_type(&self) -> bool {
        self.rank() == 0
    }

    pub fn is_state(&self) -> bool {
        self.rank() == 1
    }
}

/// Structured filter assembled from free text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub resource: Resource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_hint: Option<EntityHint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_terms: Vec<String>,
}

impl FilterSpec {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            ..Default::default()
        }
    }

    pub fn with_hint(mut self, hint: EntityHint) -> Self {
        self.entity_hint = Some(hint);
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.raw_terms.push(term.into());
        self
    }

    /// Work item type to filter on, if the hint names one.
    pub fn work_item_type(&self) -> Option<&'static str> {
        self.entity_hint
            .filter(EntityHint::is_work_item_type)
            .map(|h| h.as_str())
    }

    /// State to filter on, if the hint names one.
    pub fn state(&self) -> Option<&'static str> {
        self.entity_hint.filter(EntityHint::is_state).map(|h| h.as_str())
    }

    /// Whether nothing narrows the query.
    pub fn is_unfiltered(&self) -> bool {
        self.entity_hint.is_none() && self.date_range.is_none() && self.raw_terms.is_empty()
    }
}
