//! Command resolution engine.
//!
//! One pass per input line:
//!
//! ```text
//! Idle -> Classifying -> DispatchingShorthand | DispatchingIdLookup | ExtractingFilters
//!      -> InvokingBackend -> Formatting -> Idle
//! ```
//!
//! The `debug` command toggles [`Session::debug`] and returns straight to
//! `Idle`. Every failure is rendered, so [`CommandEngine::resolve_and_respond`]
//! always yields a [`RenderedOutput`].

use std::borrow::Cow;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::backend::DevOpsBackend;
use crate::config::{Config, InvalidDatePolicy};
use crate::error::{AssistError, ResolveError};
use crate::query::{
    Command, EntityKind, FilterBuilder, FilterSpec, Intent, IntentClassifier, Resource,
    ShorthandCommand,
};
use crate::render::{Payload, RenderedOutput, ResponseFormatter};
use crate::temporal::DateResolver;

// ============================================================================
// Session
// ============================================================================

/// State carried between lines for one operator.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Echo the intent and filter before each output.
    pub debug: bool,
    /// Date relative phrases resolve against. Defaults to today.
    pub reference_date: Option<NaiveDate>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the date relative phrases resolve against.
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    /// Flip debug mode and return the new state.
    pub fn toggle_debug(&mut self) -> bool {
        self.debug = !self.debug;
        self.debug
    }

    pub fn today(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| Local::now().date_naive())
    }
}

/// Where a line is in its resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Classifying,
    DispatchingShorthand,
    DispatchingIdLookup,
    ExtractingFilters,
    InvokingBackend,
    Formatting,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Classifying => "classifying",
            Self::DispatchingShorthand => "dispatching_shorthand",
            Self::DispatchingIdLookup => "dispatching_id_lookup",
            Self::ExtractingFilters => "extracting_filters",
            Self::InvokingBackend => "invoking_backend",
            Self::Formatting => "formatting",
        }
    }
}

fn enter(stage: Stage) {
    tracing::debug!(stage = stage.as_str(), "Stage");
}

fn debug_line(label: &str, value: &impl Serialize) -> String {
    let json = serde_json::to_string(value).unwrap_or_else(|e| format!("<{e}>"));
    format!("[debug] {label}: {json}")
}

// ============================================================================
// Engine
// ============================================================================

/// Resolves input lines against a backend and renders the result.
pub struct CommandEngine {
    backend: Arc<dyn DevOpsBackend>,
    classifier: IntentClassifier,
    filters: FilterBuilder,
    formatter: ResponseFormatter,
    invalid_date: InvalidDatePolicy,
}

impl CommandEngine {
    /// Engine with default rendering and the `reject` date policy.
    pub fn new(backend: Arc<dyn DevOpsBackend>) -> Self {
        Self {
            backend,
            classifier: IntentClassifier::new(),
            filters: FilterBuilder::new(),
            formatter: ResponseFormatter::default(),
            invalid_date: InvalidDatePolicy::default(),
        }
    }

    pub fn from_config(backend: Arc<dyn DevOpsBackend>, config: &Config) -> Self {
        Self {
            formatter: ResponseFormatter::from_config(&config.render),
            invalid_date: config.query.invalid_date,
            ..Self::new(backend)
        }
    }

    pub fn with_invalid_date_policy(mut self, policy: InvalidDatePolicy) -> Self {
        self.invalid_date = policy;
        self
    }

    pub fn backend(&self) -> &Arc<dyn DevOpsBackend> {
        &self.backend
    }

    /// Resolve one input line. Never fails: errors come back rendered.
    pub async fn resolve_and_respond(&self, session: &mut Session, raw: &str) -> RenderedOutput {
        let line = raw.trim();
        if line.is_empty() {
            return RenderedOutput::new("");
        }

        enter(Stage::Classifying);
        let intent = match self.classifier.classify(line) {
            Ok(intent) => intent,
            Err(err) => return self.finish(session, Err(err.into()), Vec::new()),
        };

        if intent.is_debug_toggle() {
            let on = session.toggle_debug();
            tracing::info!(debug = on, "Debug mode toggled");
            enter(Stage::Idle);
            return RenderedOutput::new(format!("Debug mode {}", if on { "on" } else { "off" }));
        }

        let mut trace = Vec::new();
        if session.debug {
            trace.push(debug_line("intent", &intent));
        }
        let result = self.dispatch(session, &intent, &mut trace).await;
        self.finish(session, result, trace)
    }

    /// List `resource` narrowed by free text, as the listing shorthands do.
    pub async fn list(&self, session: &Session, resource: Resource, text: &str) -> RenderedOutput {
        let mut trace = Vec::new();
        let result = match self.extract(session, text, Some(resource), &mut trace) {
            Ok(filter) => self.list_resource(&filter).await,
            Err(err) => Err(err),
        };
        self.finish(session, result, trace)
    }

    /// Run a caller-written WIQL query. Only the date phrase in `text`
    /// narrows the result.
    pub async fn query_work_items(
        &self,
        session: &Session,
        wiql: &str,
        text: &str,
    ) -> RenderedOutput {
        let mut trace = Vec::new();
        let result = match self.extract(session, text, Some(Resource::WorkItems), &mut trace) {
            Ok(filter) => {
                enter(Stage::InvokingBackend);
                tracing::info!(backend = self.backend.name(), "Running custom WIQL");
                self.backend
                    .query_work_items(wiql, &filter)
                    .await
                    .map_err(Into::into)
            }
            Err(err) => Err(err),
        };
        self.finish(session, result, trace)
    }

    /// Render a result obtained outside the resolution path.
    pub fn render_result(
        &self,
        session: &Session,
        result: Result<Payload, AssistError>,
    ) -> RenderedOutput {
        self.finish(session, result, Vec::new())
    }

    fn finish(
        &self,
        session: &Session,
        result: Result<Payload, AssistError>,
        trace: Vec<String>,
    ) -> RenderedOutput {
        enter(Stage::Formatting);
        let payload = result.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Command failed");
            Payload::error(err)
        });
        let output = self.formatter.render(&payload, session.debug);
        enter(Stage::Idle);
        if session.debug {
            output.with_preamble(&trace)
        } else {
            output
        }
    }

    async fn dispatch(
        &self,
        session: &Session,
        intent: &Intent,
        trace: &mut Vec<String>,
    ) -> Result<Payload, AssistError> {
        match intent {
            Intent::Shorthand(cmd) => {
                enter(Stage::DispatchingShorthand);
                self.shorthand(session, cmd, trace).await
            }
            Intent::IdLookup { kind, id } => {
                enter(Stage::DispatchingIdLookup);
                enter(Stage::InvokingBackend);
                tracing::info!(backend = self.backend.name(), kind = kind.as_str(), id, "Looking up entity");
                let payload = match kind {
                    EntityKind::WorkItem => self.backend.get_work_item(*id).await?,
                    EntityKind::PullRequest => self.backend.get_pull_request(*id).await?,
                };
                Ok(payload)
            }
            Intent::FreeText { text } => {
                let filter = self.extract(session, text, None, trace)?;
                self.list_resource(&filter).await
            }
        }
    }

    async fn shorthand(
        &self,
        session: &Session,
        cmd: &ShorthandCommand,
        trace: &mut Vec<String>,
    ) -> Result<Payload, AssistError> {
        let backend = &self.backend;
        let payload = match cmd.command {
            Command::Repos | Command::Items | Command::Pipelines | Command::Prs => {
                let filter =
                    self.extract(session, &cmd.joined_args(), cmd.command.resource(), trace)?;
                return self.list_resource(&filter).await;
            }
            Command::Query => {
                let filter = self.extract(session, cmd.arg(0), None, trace)?;
                return self.list_resource(&filter).await;
            }
            Command::Item => {
                enter(Stage::InvokingBackend);
                backend.get_work_item(cmd.id_arg(0)?).await?
            }
            Command::CreateItem => {
                enter(Stage::InvokingBackend);
                tracing::info!(backend = backend.name(), work_item_type = cmd.arg(1), "Creating work item");
                backend.create_work_item(cmd.arg(0), cmd.arg(1)).await?
            }
            Command::UpdateItem => {
                let id = cmd.id_arg(0)?;
                enter(Stage::InvokingBackend);
                tracing::info!(backend = backend.name(), id, field = cmd.arg(1), "Updating work item");
                backend.update_work_item(id, cmd.arg(1), cmd.arg(2)).await?
            }
            Command::CloneItem => {
                let id = cmd.id_arg(0)?;
                enter(Stage::InvokingBackend);
                tracing::info!(backend = backend.name(), id, "Cloning work item");
                backend.clone_work_item(id, cmd.arg(1)).await?
            }
            Command::Me => {
                enter(Stage::InvokingBackend);
                backend.current_user().await?
            }
            Command::Debug => {
                return Err(ResolveError::malformed("debug", "handled before dispatch").into())
            }
        };
        Ok(payload)
    }

    /// Resolve dates and keywords in `text` into a filter.
    fn extract(
        &self,
        session: &Session,
        text: &str,
        resource: Option<Resource>,
        trace: &mut Vec<String>,
    ) -> Result<FilterSpec, AssistError> {
        enter(Stage::ExtractingFilters);
        let resolver = DateResolver::with_reference_date(session.today());
        let (date, text) = match resolver.find(text) {
            Ok(found) => (found, Cow::Borrowed(text)),
            // The rejected phrase is dropped so its words do not become terms.
            Err(ResolveError::DateParse { expression, reason })
                if self.invalid_date == InvalidDatePolicy::Ignore =>
            {
                tracing::warn!(%expression, %reason, "Ignoring invalid date expression");
                let stripped = match resolver.phrase_span(text) {
                    Some((start, end)) => format!("{} {}", &text[..start], &text[end..]),
                    None => text.replacen(expression.as_str(), " ", 1),
                };
                (None, Cow::Owned(stripped))
            }
            Err(err) => return Err(err.into()),
        };
        let mut filter = self.filters.build(&text, date.as_ref());
        if let Some(resource) = resource {
            filter.resource = resource;
        }
        if session.debug {
            trace.push(debug_line("filter", &filter));
        }
        Ok(filter)
    }

    async fn list_resource(&self, filter: &FilterSpec) -> Result<Payload, AssistError> {
        enter(Stage::InvokingBackend);
        tracing::info!(
            backend = self.backend.name(),
            resource = filter.resource.as_str(),
            "Listing"
        );
        let payload = match filter.resource {
            Resource::WorkItems => self.backend.list_work_items(filter).await?,
            Resource::Repositories => self.backend.list_repositories(filter).await?,
            Resource::Pipelines => self.backend.list_pipelines(filter).await?,
            Resource::PullRequests => self.backend.list_pull_requests(filter).await?,
        };
        Ok(payload)
    }
}
