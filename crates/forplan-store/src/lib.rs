// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use forplan_app::{
    DuplicateRequest, ListScope, PlanMacro, PlanMacroId, SubscriptionId, format_plan_date,
    parse_plan_date,
};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAction {
    Find,
    FindArchived,
    FindUnarchived,
    Retrieve(PlanMacroId),
    Duplicate(DuplicateRequest),
}

impl StoreAction {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Find => "find",
            Self::FindArchived => "find_archived",
            Self::FindUnarchived => "find_unarchived",
            Self::Retrieve(_) => "retrieve",
            Self::Duplicate(_) => "duplicate",
        }
    }

    pub const fn list_scope(&self) -> Option<ListScope> {
        match self {
            Self::Find => Some(ListScope::All),
            Self::FindArchived => Some(ListScope::Archived),
            Self::FindUnarchived => Some(ListScope::Unarchived),
            Self::Retrieve(_) | Self::Duplicate(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Retrieve(PlanMacro),
    RetrieveFailed { message: String },
    PlanMacroDuplicated(DuplicateOutcome),
    ListRefreshed { scope: ListScope, plans: Vec<PlanMacro> },
    ListRefreshFailed { scope: ListScope, message: String },
}

/// Result of one duplicate dispatch. A missing status means the backend
/// returned a plain success body without an embedded status field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateOutcome {
    pub status: Option<u16>,
    pub new_plan_id: Option<PlanMacroId>,
    pub message: Option<String>,
}

impl DuplicateOutcome {
    pub const fn is_success(&self) -> bool {
        matches!(self.status, None | Some(200))
    }

    pub fn failure(status: u16, message: String) -> Self {
        Self {
            status: Some(status),
            new_plan_id: None,
            message: Some(message),
        }
    }
}

/// The injection seam for the views: dispatch actions, subscribe to the
/// events they produce. Implemented by `HttpPlanStore` and by the scripted
/// store in forplan-testkit.
pub trait PlanStore {
    fn dispatch(&mut self, action: StoreAction) -> Result<()>;
    fn subscribe(&mut self) -> Subscription;
}

#[derive(Debug, Default)]
struct BusInner {
    next_id: i64,
    subscribers: Vec<(SubscriptionId, Sender<StoreEvent>)>,
}

/// Fan-out channel between the store and its views. Every subscriber holds
/// an explicit handle; dropping the handle detaches it from the bus.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> MutexGuard<'_, BusInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = channel();
        let mut inner = self.locked();
        inner.next_id += 1;
        let id = SubscriptionId::new(inner.next_id);
        inner.subscribers.push((id, tx));
        Subscription {
            id,
            receiver: rx,
            bus: self.clone(),
        }
    }

    pub fn publish(&self, event: StoreEvent) {
        let mut inner = self.locked();
        inner
            .subscribers
            .retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.locked().subscribers.len()
    }

    fn detach(&self, id: SubscriptionId) {
        let mut inner = self.locked();
        inner.subscribers.retain(|(other, _)| *other != id);
    }
}

/// Handle for one event subscription. Detaches itself on drop, so a view's
/// teardown is just dropping the handle it acquired on mount.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    receiver: Receiver<StoreEvent>,
    bus: EventBus,
}

impl Subscription {
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn try_next(&self) -> Option<StoreEvent> {
        self.receiver.try_recv().ok()
    }

    pub fn next_timeout(&self, timeout: Duration) -> Option<StoreEvent> {
        self.receiver.recv_timeout(timeout).ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.detach(self.id);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PlanMacroPayload {
    id: i64,
    name: String,
    begin: String,
    end: String,
    description: Option<String>,
    documented: bool,
    archived: bool,
}

impl PlanMacroPayload {
    fn from_model(plan: &PlanMacro) -> Self {
        Self {
            id: plan.id.get(),
            name: plan.name.clone(),
            begin: format_plan_date(plan.begin),
            end: format_plan_date(plan.end),
            description: Some(plan.description.clone()),
            documented: plan.documented,
            archived: plan.archived,
        }
    }

    fn into_model(self) -> Result<PlanMacro> {
        Ok(PlanMacro {
            id: PlanMacroId::new(self.id),
            name: self.name,
            begin: parse_plan_date(&self.begin)?,
            end: parse_plan_date(&self.end)?,
            description: self.description.unwrap_or_default(),
            documented: self.documented,
            archived: self.archived,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    list: Vec<PlanMacroPayload>,
}

#[derive(Debug, Deserialize)]
struct RetrieveResponse {
    data: PlanMacroPayload,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DuplicateBody {
    #[serde(rename = "macro")]
    plan: PlanMacroPayload,
    keep_plan_level: bool,
    keep_plan_content: bool,
    keep_doc_section: bool,
    keep_doc_content: bool,
}

#[derive(Debug, Deserialize)]
struct DuplicateResponse {
    data: Option<DuplicatedPlanPayload>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DuplicatedPlanPayload {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Blocking REST client for the planning backend.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("service.base_url must not be empty");
        }
        url::Url::parse(&base_url)
            .with_context(|| format!("invalid service.base_url {base_url:?}"))?;

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn list_plans(&self, scope: ListScope) -> Result<Vec<PlanMacro>> {
        let url = match scope {
            ListScope::All => format!("{}/api/planmacro", self.base_url),
            ListScope::Archived => format!("{}/api/planmacro/archived", self.base_url),
            ListScope::Unarchived => format!("{}/api/planmacro/unarchived", self.base_url),
        };
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        let parsed: ListResponse = response.json().context("decode plan list")?;
        parsed
            .list
            .into_iter()
            .map(PlanMacroPayload::into_model)
            .collect()
    }

    pub fn retrieve_plan(&self, id: PlanMacroId) -> Result<PlanMacro> {
        let response = self
            .http
            .get(format!("{}/api/planmacro/{}", self.base_url, id.get()))
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        let parsed: RetrieveResponse = response.json().context("decode plan")?;
        parsed.data.into_model()
    }

    /// Issues the duplicate request. HTTP-level failures are folded into the
    /// outcome so the caller can publish exactly one duplicated event per
    /// dispatch; only transport errors short-circuit, and the store maps
    /// those to a status-0 outcome (no HTTP status reached us).
    pub fn duplicate_plan(&self, request: &DuplicateRequest) -> Result<DuplicateOutcome> {
        let body = DuplicateBody {
            plan: PlanMacroPayload::from_model(&request.plan),
            keep_plan_level: request.options.keep_plan_level,
            keep_plan_content: request.options.keep_plan_content,
            keep_doc_section: request.options.keep_doc_section,
            keep_doc_content: request.options.keep_doc_content,
        };
        let response = self
            .http
            .post(format!("{}/api/planmacro/duplicate", self.base_url))
            .json(&body)
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Ok(DuplicateOutcome::failure(
                status.as_u16(),
                error_message(status, &body),
            ));
        }

        let parsed: DuplicateResponse = response.json().context("decode duplicate response")?;
        Ok(DuplicateOutcome {
            status: None,
            new_plan_id: parsed.data.map(|data| PlanMacroId::new(data.id)),
            message: parsed.message,
        })
    }
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach planning service at {base_url}: {error}; check [service].base_url and that the backend is up"
    )
}

fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body)
        && let Some(message) = parsed.message
    {
        return message;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("planning service returned {status}")
    } else {
        trimmed.to_owned()
    }
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    anyhow!("{}", error_message(status, body))
}

/// The real store: performs the REST call behind each action on a worker
/// thread and publishes the matching event to every live subscriber.
#[derive(Debug, Clone)]
pub struct HttpPlanStore {
    client: Client,
    bus: EventBus,
}

impl HttpPlanStore {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            bus: EventBus::new(),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    fn run_action(client: &Client, action: StoreAction) -> StoreEvent {
        match action {
            StoreAction::Find | StoreAction::FindArchived | StoreAction::FindUnarchived => {
                let scope = action
                    .list_scope()
                    .unwrap_or(ListScope::All);
                match client.list_plans(scope) {
                    Ok(plans) => StoreEvent::ListRefreshed { scope, plans },
                    Err(error) => StoreEvent::ListRefreshFailed {
                        scope,
                        message: format!("{error:#}"),
                    },
                }
            }
            StoreAction::Retrieve(id) => match client.retrieve_plan(id) {
                Ok(plan) => StoreEvent::Retrieve(plan),
                Err(error) => StoreEvent::RetrieveFailed {
                    message: format!("{error:#}"),
                },
            },
            StoreAction::Duplicate(request) => {
                let outcome = match client.duplicate_plan(&request) {
                    Ok(outcome) => outcome,
                    Err(error) => DuplicateOutcome::failure(0, format!("{error:#}")),
                };
                StoreEvent::PlanMacroDuplicated(outcome)
            }
        }
    }
}

impl PlanStore for HttpPlanStore {
    fn dispatch(&mut self, action: StoreAction) -> Result<()> {
        let client = self.client.clone();
        let bus = self.bus.clone();
        thread::spawn(move || {
            let event = Self::run_action(&client, action);
            bus.publish(event);
        });
        Ok(())
    }

    fn subscribe(&mut self) -> Subscription {
        self.bus.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        DuplicateOutcome, EventBus, PlanMacroPayload, StoreAction, StoreEvent, error_message,
    };
    use anyhow::Result;
    use forplan_app::{ListScope, PlanMacro, PlanMacroId};
    use reqwest::StatusCode;
    use time::{Date, Month};

    fn sample_plan() -> Result<PlanMacro> {
        Ok(PlanMacro {
            id: PlanMacroId::new(42),
            name: "Plan A".to_owned(),
            begin: Date::from_calendar_date(2020, Month::January, 1)?,
            end: Date::from_calendar_date(2020, Month::December, 31)?,
            description: String::new(),
            documented: false,
            archived: false,
        })
    }

    #[test]
    fn outcome_success_rules_follow_status() {
        let success = DuplicateOutcome {
            status: None,
            new_plan_id: Some(PlanMacroId::new(99)),
            message: None,
        };
        assert!(success.is_success());

        let explicit = DuplicateOutcome {
            status: Some(200),
            new_plan_id: Some(PlanMacroId::new(99)),
            message: None,
        };
        assert!(explicit.is_success());

        assert!(!DuplicateOutcome::failure(500, "boom".to_owned()).is_success());
        assert!(!DuplicateOutcome::failure(0, "unreachable".to_owned()).is_success());
    }

    #[test]
    fn action_list_scopes() {
        assert_eq!(StoreAction::Find.list_scope(), Some(ListScope::All));
        assert_eq!(
            StoreAction::FindArchived.list_scope(),
            Some(ListScope::Archived)
        );
        assert_eq!(
            StoreAction::FindUnarchived.list_scope(),
            Some(ListScope::Unarchived)
        );
        assert_eq!(
            StoreAction::Retrieve(PlanMacroId::new(1)).list_scope(),
            None
        );
    }

    #[test]
    fn payload_round_trips_through_wire_dates() -> Result<()> {
        let plan = sample_plan()?;
        let payload = PlanMacroPayload::from_model(&plan);
        assert_eq!(payload.begin, "01/01/2020");
        assert_eq!(payload.end, "31/12/2020");
        assert_eq!(payload.into_model()?, plan);
        Ok(())
    }

    #[test]
    fn malformed_wire_date_is_rejected() {
        let payload = PlanMacroPayload {
            id: 1,
            name: "Plan".to_owned(),
            begin: "2020-01-01".to_owned(),
            end: "31/12/2020".to_owned(),
            description: None,
            documented: false,
            archived: false,
        };
        assert!(payload.into_model().is_err());
    }

    #[test]
    fn error_message_prefers_backend_message_field() {
        let message = error_message(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"message":"plan is locked"}"#,
        );
        assert_eq!(message, "plan is locked");

        let fallback = error_message(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert!(fallback.contains("500"));
    }

    #[test]
    fn bus_delivers_to_every_subscriber() -> Result<()> {
        let bus = EventBus::new();
        let first = bus.subscribe();
        let second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(StoreEvent::Retrieve(sample_plan()?));

        for subscription in [&first, &second] {
            match subscription.try_next() {
                Some(StoreEvent::Retrieve(plan)) => assert_eq!(plan.name, "Plan A"),
                other => panic!("expected retrieve event, got {other:?}"),
            }
        }
        assert!(first.try_next().is_none());
        Ok(())
    }

    #[test]
    fn dropping_a_subscription_detaches_it() {
        let bus = EventBus::new();
        let kept = bus.subscribe();
        {
            let _dropped = bus.subscribe();
            assert_eq!(bus.subscriber_count(), 2);
        }
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish(StoreEvent::RetrieveFailed {
            message: "gone".to_owned(),
        });
        assert!(matches!(
            kept.try_next(),
            Some(StoreEvent::RetrieveFailed { .. })
        ));
    }

    #[test]
    fn subscription_ids_are_unique() {
        let bus = EventBus::new();
        let first = bus.subscribe();
        let second = bus.subscribe();
        assert_ne!(first.id(), second.id());
    }
}
