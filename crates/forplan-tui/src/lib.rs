// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use forplan_app::{
    AppCommand, AppState, DuplicatePlanInput, DuplicateRequest, DuplicationOptions,
    FieldDescriptor, FieldKind, FieldName, ListScope, PlanMacro, PlanMacroId, SessionContext,
    TabKind, duplicate_plan_fields, format_plan_date, parse_plan_date,
};
use forplan_store::{DuplicateOutcome, PlanStore, StoreAction, StoreEvent, Subscription};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Borders, Clear, Paragraph, Tabs};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use time::Date;

/// One bar-chart row: an achieved value next to the expected target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorRow {
    pub label: &'static str,
    pub achieved: u64,
    pub expected: u64,
}

impl IndicatorRow {
    fn bars(&self, stacked: bool) -> [Bar<'static>; 2] {
        // Stacked mode draws the expected bar as the remainder above the
        // achieved segment instead of the full target.
        let expected = if stacked {
            self.expected.saturating_sub(self.achieved)
        } else {
            self.expected
        };
        [
            Bar::default().value(self.achieved),
            Bar::default()
                .value(expected)
                .style(Style::default().fg(Color::DarkGray)),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartOptions {
    pub axis_title: &'static str,
    pub value_max: u64,
    pub stacked: bool,
    pub legend: bool,
}

/// Dashboard widget summarizing indicator performance. The dataset is a
/// fixed sample until the reporting backend exposes real aggregates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorWidget {
    options: ChartOptions,
    data: Vec<IndicatorRow>,
    collapsed: bool,
}

impl Default for IndicatorWidget {
    fn default() -> Self {
        Self::mount()
    }
}

impl IndicatorWidget {
    pub fn mount() -> Self {
        Self {
            options: ChartOptions {
                axis_title: "expected vs achieved",
                value_max: 15,
                stacked: true,
                legend: false,
            },
            data: vec![
                IndicatorRow {
                    label: "4 courses in 2015",
                    achieved: 10,
                    expected: 15,
                },
                IndicatorRow {
                    label: "6 courses in 2016",
                    achieved: 10,
                    expected: 20,
                },
                IndicatorRow {
                    label: "4 courses in 2017",
                    achieved: 5,
                    expected: 15,
                },
            ],
            collapsed: false,
        }
    }

    pub fn collapsed(&self) -> bool {
        self.collapsed
    }

    pub fn toggle(&mut self) {
        self.collapsed = !self.collapsed;
    }

    pub fn rows(&self) -> &[IndicatorRow] {
        &self.data
    }

    pub fn options(&self) -> &ChartOptions {
        &self.options
    }

    pub fn render(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut block = Block::default()
            .title("indicator performance")
            .borders(Borders::ALL);
        if self.collapsed {
            let body = Paragraph::new("collapsed; press enter to expand").block(block);
            frame.render_widget(body, area);
            return;
        }

        block = block.title_bottom(self.options.axis_title);
        if self.options.legend {
            block = block.title_bottom("achieved / expected");
        }

        let mut chart = BarChart::default()
            .block(block)
            .bar_width(9)
            .bar_gap(1)
            .group_gap(3)
            .max(self.options.value_max)
            .bar_style(Style::default().fg(Color::Cyan))
            .value_style(Style::default().fg(Color::Black).bg(Color::Cyan));
        for row in &self.data {
            chart = chart.data(
                BarGroup::default()
                    .label(row.label.into())
                    .bars(&row.bars(self.options.stacked)),
            );
        }
        frame.render_widget(chart, area);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Plans,
    PlanDetails(PlanMacroId),
    DuplicatePlan(PlanMacroId),
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Self::Home => "/home".to_owned(),
            Self::Plans => "/plan".to_owned(),
            Self::PlanDetails(id) => format!("/plan/{}/details/", id.get()),
            Self::DuplicatePlan(id) => format!("/plan/{}/duplicate", id.get()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Router {
    entries: Vec<Route>,
}

impl Default for Router {
    fn default() -> Self {
        Self {
            entries: vec![Route::Home],
        }
    }
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Route {
        *self.entries.last().unwrap_or(&Route::Home)
    }

    pub fn push(&mut self, route: Route) {
        self.entries.push(route);
    }

    /// Swaps the current entry without growing the history, so a guard
    /// redirect leaves no back-entry to the rejected route.
    pub fn replace(&mut self, route: Route) {
        self.entries.pop();
        self.entries.push(route);
    }

    pub fn history(&self) -> &[Route] {
        &self.entries
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabEntry {
    pub path: String,
    pub label: String,
}

/// Dynamic tab strip for opened work views, keyed by route path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabPanel {
    tabs: Vec<TabEntry>,
}

impl TabPanel {
    pub fn add_tab(&mut self, path: &str, label: &str) {
        if self.tabs.iter().any(|tab| tab.path == path) {
            return;
        }
        self.tabs.push(TabEntry {
            path: path.to_owned(),
            label: label.to_owned(),
        });
    }

    pub fn remove_tab_by_path(&mut self, path: &str) {
        self.tabs.retain(|tab| tab.path != path);
    }

    pub fn tabs(&self) -> &[TabEntry] {
        &self.tabs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
}

impl Alert {
    pub fn display(&self) -> String {
        match self.kind {
            AlertKind::Success => self.message.clone(),
            AlertKind::Error => format!("error: {}", self.message),
        }
    }
}

/// Queue of user-facing notifications; the shell drains it into the status
/// line once per frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alerts {
    entries: Vec<Alert>,
}

impl Alerts {
    pub fn add_success(&mut self, message: impl Into<String>) {
        self.entries.push(Alert {
            kind: AlertKind::Success,
            message: message.into(),
        });
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.entries.push(Alert {
            kind: AlertKind::Error,
            message: message.into(),
        });
    }

    pub fn entries(&self) -> &[Alert] {
        &self.entries
    }

    pub fn take(&mut self) -> Vec<Alert> {
        std::mem::take(&mut self.entries)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
    RegisterTab { path: String, label: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewPhase {
    Loading,
    Ready,
    LoadFailed(String),
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckboxKind {
    KeepLevels,
    KeepLevelContent,
    KeepSectionContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormRow {
    Field(usize),
    Checkbox(CheckboxKind),
    Submit,
}

/// The duplicate-plan form. Mounts behind a permission guard, loads the
/// source plan through the store, and dispatches one duplicate action per
/// submit. Dropping the subscription handle on unmount detaches the view
/// from the store bus.
#[derive(Debug)]
pub struct DuplicatePlanView {
    path: String,
    requested_id: Option<PlanMacroId>,
    model: Option<PlanMacro>,
    fields: Vec<FieldDescriptor>,
    keep_levels: bool,
    keep_level_content: bool,
    keep_level_content_enabled: bool,
    keep_section_content: bool,
    phase: ViewPhase,
    cursor: usize,
    subscription: Option<Subscription>,
}

impl DuplicatePlanView {
    pub fn mount<S: PlanStore>(
        session: &SessionContext,
        plan_id: Option<PlanMacroId>,
        store: &mut S,
        router: &mut Router,
        internal_tx: &Sender<InternalEvent>,
    ) -> Result<Option<Self>> {
        if !session.can_manage_plan_macros() {
            router.replace(Route::Home);
            return Ok(None);
        }

        let subscription = store.subscribe();
        let path = plan_id.map_or_else(
            || "/plan/duplicate".to_owned(),
            |id| Route::DuplicatePlan(id).path(),
        );
        let mut view = Self {
            path,
            requested_id: plan_id,
            model: None,
            fields: duplicate_plan_fields(None),
            keep_levels: true,
            keep_level_content: false,
            keep_level_content_enabled: true,
            keep_section_content: false,
            phase: ViewPhase::Ready,
            cursor: 0,
            subscription: Some(subscription),
        };
        view.update_loading_state();

        if let Some(id) = plan_id {
            // Tab registration goes through the internal channel so it lands
            // after the render pass that mounted the view.
            let _ = internal_tx.send(InternalEvent::RegisterTab {
                path: view.path.clone(),
                label: "duplicate plan".to_owned(),
            });
            store.dispatch(StoreAction::Retrieve(id))?;
        }
        Ok(Some(view))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn model(&self) -> Option<&PlanMacro> {
        self.model.as_ref()
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, ViewPhase::Loading)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.phase, ViewPhase::Ready)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.phase, ViewPhase::Closed)
    }

    pub fn load_failure(&self) -> Option<&str> {
        match &self.phase {
            ViewPhase::LoadFailed(message) => Some(message),
            _ => None,
        }
    }

    pub fn keep_levels(&self) -> bool {
        self.keep_levels
    }

    pub fn keep_level_content(&self) -> bool {
        self.keep_level_content
    }

    pub fn keep_level_content_enabled(&self) -> bool {
        self.keep_level_content_enabled
    }

    pub fn keep_section_content(&self) -> bool {
        self.keep_section_content
    }

    /// Unchecking the parent also unchecks and disables the content
    /// checkbox; re-checking re-enables it but leaves it unchecked.
    pub fn set_keep_levels(&mut self, checked: bool) {
        self.keep_levels = checked;
        self.keep_level_content_enabled = checked;
        if !checked {
            self.keep_level_content = false;
        }
    }

    pub fn set_keep_levels_content(&mut self, checked: bool) {
        if self.keep_level_content_enabled {
            self.keep_level_content = checked;
        }
    }

    pub fn set_keep_section_content(&mut self, checked: bool) {
        self.keep_section_content = checked;
    }

    pub fn field_value(&self, name: FieldName) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }

    pub fn set_field_value(&mut self, name: FieldName, value: &str) {
        for field in &mut self.fields {
            if field.name == name {
                field.value = value.to_owned();
            }
        }
    }

    /// Date edits write through the same authoritative value string the
    /// text path uses; the form re-renders from it.
    pub fn set_date_field(&mut self, name: FieldName, date: Date) {
        let formatted = format_plan_date(date);
        for field in &mut self.fields {
            if field.name == name && field.kind == FieldKind::Date {
                field.value = formatted.clone();
            }
        }
    }

    pub fn retry_load<S: PlanStore>(&mut self, store: &mut S) -> Result<()> {
        let Some(id) = self.requested_id else {
            return Ok(());
        };
        if matches!(self.phase, ViewPhase::LoadFailed(_)) {
            self.phase = ViewPhase::Loading;
            store.dispatch(StoreAction::Retrieve(id))?;
        }
        Ok(())
    }

    pub fn submit<S: PlanStore>(&mut self, store: &mut S, alerts: &mut Alerts) -> Result<()> {
        if !matches!(self.phase, ViewPhase::Ready) {
            return Ok(());
        }

        let parsed = DuplicatePlanInput::from_fields(&self.fields).and_then(|input| {
            input.validate()?;
            Ok(input)
        });
        let input = match parsed {
            Ok(input) => input,
            Err(error) => {
                alerts.add_error(format!("{error:#}"));
                return Ok(());
            }
        };

        let Some(mut plan) = self.model.clone() else {
            alerts.add_error("no plan loaded to duplicate");
            return Ok(());
        };
        if let Some(id) = self.requested_id {
            plan.id = id;
        }
        input.apply_to(&mut plan);
        let documented = plan.documented;
        self.model = Some(plan.clone());
        self.phase = ViewPhase::Loading;

        store.dispatch(StoreAction::Duplicate(DuplicateRequest {
            plan,
            options: DuplicationOptions::for_plan(
                documented,
                self.keep_levels,
                self.keep_level_content,
                self.keep_section_content,
            ),
        }))
    }

    pub fn unmount(&mut self) {
        self.subscription = None;
    }

    pub fn poll_store_events<S: PlanStore>(
        &mut self,
        store: &mut S,
        router: &mut Router,
        tabs: &mut TabPanel,
        alerts: &mut Alerts,
    ) -> Result<()> {
        loop {
            let event = match &self.subscription {
                Some(subscription) => subscription.try_next(),
                None => None,
            };
            let Some(event) = event else {
                break;
            };
            self.on_store_event(event, store, router, tabs, alerts)?;
        }
        Ok(())
    }

    fn on_store_event<S: PlanStore>(
        &mut self,
        event: StoreEvent,
        store: &mut S,
        router: &mut Router,
        tabs: &mut TabPanel,
        alerts: &mut Alerts,
    ) -> Result<()> {
        match event {
            StoreEvent::Retrieve(plan) => {
                if self.requested_id.is_none_or(|id| id == plan.id) {
                    self.model = Some(plan);
                    self.fields = duplicate_plan_fields(self.model.as_ref());
                    self.update_loading_state();
                }
            }
            StoreEvent::RetrieveFailed { message } => {
                if self.model.is_none() {
                    self.phase = ViewPhase::LoadFailed(message);
                }
            }
            StoreEvent::PlanMacroDuplicated(outcome) => {
                self.on_duplicated(outcome, store, router, tabs, alerts)?;
            }
            StoreEvent::ListRefreshed { .. } | StoreEvent::ListRefreshFailed { .. } => {}
        }
        Ok(())
    }

    fn on_duplicated<S: PlanStore>(
        &mut self,
        outcome: DuplicateOutcome,
        store: &mut S,
        router: &mut Router,
        tabs: &mut TabPanel,
        alerts: &mut Alerts,
    ) -> Result<()> {
        if outcome.is_success() {
            alerts.add_success("plan duplicated");
            tabs.remove_tab_by_path(&self.path);
            match outcome.new_plan_id {
                Some(id) => router.push(Route::PlanDetails(id)),
                None => router.push(Route::Plans),
            }
            store.dispatch(StoreAction::Find)?;
            store.dispatch(StoreAction::FindArchived)?;
            store.dispatch(StoreAction::FindUnarchived)?;
            self.phase = ViewPhase::Closed;
        } else {
            let message = outcome
                .message
                .unwrap_or_else(|| "duplicate failed".to_owned());
            alerts.add_error(message);
            self.phase = ViewPhase::Ready;
        }
        Ok(())
    }

    fn update_loading_state(&mut self) {
        if matches!(self.phase, ViewPhase::Closed) {
            return;
        }
        let loading = self.requested_id.is_some() && self.model.is_none();
        self.phase = if loading {
            ViewPhase::Loading
        } else {
            ViewPhase::Ready
        };
        let rows = self.rows().len();
        if self.cursor >= rows {
            self.cursor = rows - 1;
        }
    }

    fn rows(&self) -> Vec<FormRow> {
        let mut rows: Vec<FormRow> = (0..self.fields.len()).map(FormRow::Field).collect();
        rows.push(FormRow::Checkbox(CheckboxKind::KeepLevels));
        rows.push(FormRow::Checkbox(CheckboxKind::KeepLevelContent));
        if self.model.as_ref().is_some_and(|plan| plan.documented) {
            rows.push(FormRow::Checkbox(CheckboxKind::KeepSectionContent));
        }
        rows.push(FormRow::Submit);
        rows
    }

    fn checkbox_state(&self, kind: CheckboxKind) -> (bool, bool, &'static str) {
        match kind {
            CheckboxKind::KeepLevels => (self.keep_levels, true, "keep goal levels"),
            CheckboxKind::KeepLevelContent => (
                self.keep_level_content,
                self.keep_level_content_enabled,
                "keep level content",
            ),
            CheckboxKind::KeepSectionContent => {
                (self.keep_section_content, true, "keep document content")
            }
        }
    }

    fn toggle_checkbox(&mut self, kind: CheckboxKind) {
        match kind {
            CheckboxKind::KeepLevels => self.set_keep_levels(!self.keep_levels),
            CheckboxKind::KeepLevelContent => {
                self.set_keep_levels_content(!self.keep_level_content);
            }
            CheckboxKind::KeepSectionContent => {
                self.keep_section_content = !self.keep_section_content;
            }
        }
    }

    fn shift_date(&mut self, index: usize, forward: bool) {
        let Ok(date) = parse_plan_date(&self.fields[index].value) else {
            return;
        };
        let shifted = if forward {
            date.next_day()
        } else {
            date.previous_day()
        };
        if let Some(shifted) = shifted {
            self.fields[index].value = format_plan_date(shifted);
        }
    }

    pub fn handle_key<S: PlanStore>(
        &mut self,
        key: KeyEvent,
        store: &mut S,
        alerts: &mut Alerts,
    ) -> Result<()> {
        if matches!(self.phase, ViewPhase::LoadFailed(_)) {
            if key.code == KeyCode::Char('r') {
                self.retry_load(store)?;
            }
            return Ok(());
        }
        if !matches!(self.phase, ViewPhase::Ready) {
            return Ok(());
        }

        let rows = self.rows();
        match key.code {
            KeyCode::Down | KeyCode::Tab => self.cursor = (self.cursor + 1) % rows.len(),
            KeyCode::Up | KeyCode::BackTab => {
                self.cursor = self.cursor.checked_sub(1).unwrap_or(rows.len() - 1);
            }
            KeyCode::Enter => match rows[self.cursor] {
                FormRow::Field(_) => self.cursor = (self.cursor + 1) % rows.len(),
                FormRow::Checkbox(kind) => self.toggle_checkbox(kind),
                FormRow::Submit => self.submit(store, alerts)?,
            },
            KeyCode::Backspace => {
                if let FormRow::Field(index) = rows[self.cursor] {
                    self.fields[index].value.pop();
                }
            }
            KeyCode::Char(c) => match rows[self.cursor] {
                FormRow::Checkbox(kind) if c == ' ' => self.toggle_checkbox(kind),
                FormRow::Field(index) => {
                    if self.fields[index].kind == FieldKind::Date && (c == '+' || c == '-') {
                        self.shift_date(index, c == '+');
                    } else {
                        self.fields[index].value.push(c);
                    }
                }
                _ => {}
            },
            _ => {}
        }
        Ok(())
    }

    pub fn render_text(&self) -> String {
        match &self.phase {
            ViewPhase::Loading => "loading...".to_owned(),
            ViewPhase::LoadFailed(message) => {
                format!("load failed: {message}\n\nr: retry  esc: close")
            }
            ViewPhase::Closed => String::new(),
            ViewPhase::Ready => self.render_form_text(),
        }
    }

    fn render_form_text(&self) -> String {
        let mut lines = Vec::new();
        if let Some(plan) = &self.model {
            lines.push(format!("duplicating: {}", plan.name));
            lines.push(String::new());
        }
        for (index, row) in self.rows().iter().enumerate() {
            let marker = if index == self.cursor { "> " } else { "  " };
            let line = match row {
                FormRow::Field(field_index) => {
                    let field = &self.fields[*field_index];
                    format!("{marker}{}: {}", field.label, field.value)
                }
                FormRow::Checkbox(kind) => {
                    let (checked, enabled, label) = self.checkbox_state(*kind);
                    let mark = if checked { "x" } else { " " };
                    if enabled {
                        format!("{marker}[{mark}] {label}")
                    } else {
                        format!("{marker}[{mark}] {label} (unavailable)")
                    }
                }
                FormRow::Submit => format!("{marker}[ duplicate ]"),
            };
            lines.push(line);
        }
        lines.join("\n")
    }
}

#[derive(Debug, Default)]
struct ShellData {
    plans: Vec<PlanMacro>,
    plan_cursor: usize,
    indicator: IndicatorWidget,
    duplicate: Option<DuplicatePlanView>,
    status_token: u64,
}

pub fn run_app<S: PlanStore>(
    state: &mut AppState,
    session: &SessionContext,
    store: &mut S,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut shell = ShellData::default();
    let mut router = Router::new();
    let mut tabs = TabPanel::default();
    let mut alerts = Alerts::default();
    let (internal_tx, internal_rx) = mpsc::channel();
    let shell_subscription = store.subscribe();

    store.dispatch(StoreAction::Find)?;

    let mut result = Ok(());
    loop {
        process_internal_events(state, &mut shell, &mut tabs, &internal_rx);
        pump_shell_events(&mut shell, &shell_subscription, &mut alerts);
        if let Some(view) = shell.duplicate.as_mut() {
            view.poll_store_events(store, &mut router, &mut tabs, &mut alerts)?;
            if view.is_closed() {
                view.unmount();
                shell.duplicate = None;
            }
        }
        for alert in alerts.take() {
            emit_status(state, &mut shell, &internal_tx, alert.display());
        }

        if let Err(error) = terminal.draw(|frame| render(frame, state, &shell, &tabs)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    let quit = handle_key_event(
                        state,
                        session,
                        store,
                        &mut shell,
                        &mut router,
                        &mut tabs,
                        &mut alerts,
                        &internal_tx,
                        key,
                    )?;
                    if quit {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events(
    state: &mut AppState,
    shell: &mut ShellData,
    tabs: &mut TabPanel,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == shell.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::RegisterTab { path, label } => tabs.add_tab(&path, &label),
        }
    }
}

fn pump_shell_events(shell: &mut ShellData, subscription: &Subscription, alerts: &mut Alerts) {
    while let Some(event) = subscription.try_next() {
        match event {
            StoreEvent::ListRefreshed {
                scope: ListScope::All,
                plans,
            } => {
                shell.plans = plans;
                if shell.plan_cursor >= shell.plans.len() {
                    shell.plan_cursor = shell.plans.len().saturating_sub(1);
                }
            }
            StoreEvent::ListRefreshFailed {
                scope: ListScope::All,
                message,
            } => alerts.add_error(message),
            _ => {}
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    shell: &mut ShellData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    shell.status_token = shell.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, shell.status_token);
}

#[allow(clippy::too_many_arguments)]
fn handle_key_event<S: PlanStore>(
    state: &mut AppState,
    session: &SessionContext,
    store: &mut S,
    shell: &mut ShellData,
    router: &mut Router,
    tabs: &mut TabPanel,
    alerts: &mut Alerts,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> Result<bool> {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Ok(true);
    }

    if let Some(view) = shell.duplicate.as_mut() {
        if key.code == KeyCode::Esc {
            tabs.remove_tab_by_path(view.path());
            router.replace(Route::Plans);
            view.unmount();
            shell.duplicate = None;
            return Ok(false);
        }
        view.handle_key(key, store, alerts)?;
        return Ok(false);
    }

    match key.code {
        KeyCode::Char('q') => return Ok(true),
        KeyCode::Tab | KeyCode::Right => {
            state.dispatch(AppCommand::NextTab);
        }
        KeyCode::BackTab | KeyCode::Left => {
            state.dispatch(AppCommand::PrevTab);
        }
        KeyCode::Enter | KeyCode::Char(' ') if state.active_tab == TabKind::Dashboard => {
            shell.indicator.toggle();
        }
        KeyCode::Down | KeyCode::Char('j') if state.active_tab == TabKind::Plans => {
            if !shell.plans.is_empty() {
                shell.plan_cursor = (shell.plan_cursor + 1).min(shell.plans.len() - 1);
            }
        }
        KeyCode::Up | KeyCode::Char('k') if state.active_tab == TabKind::Plans => {
            shell.plan_cursor = shell.plan_cursor.saturating_sub(1);
        }
        KeyCode::Char('R') if state.active_tab == TabKind::Plans => {
            store.dispatch(StoreAction::Find)?;
        }
        KeyCode::Enter | KeyCode::Char('d') if state.active_tab == TabKind::Plans => {
            let Some(plan) = shell.plans.get(shell.plan_cursor) else {
                return Ok(false);
            };
            let id = plan.id;
            router.push(Route::DuplicatePlan(id));
            match DuplicatePlanView::mount(session, Some(id), store, router, internal_tx)? {
                Some(view) => shell.duplicate = Some(view),
                None => emit_status(
                    state,
                    shell,
                    internal_tx,
                    "plan management permission required",
                ),
            }
        }
        _ => {}
    }
    Ok(false)
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, shell: &ShellData, tabs: &TabPanel) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.area());

    if shell.duplicate.is_none() {
        let selected = TabKind::ALL
            .iter()
            .position(|tab| *tab == state.active_tab)
            .unwrap_or(0);
        let tab_titles = TabKind::ALL
            .iter()
            .map(|tab| tab.label().to_owned())
            .collect::<Vec<String>>();

        let header = Tabs::new(tab_titles)
            .block(Block::default().title("forplan").borders(Borders::ALL))
            .style(Style::default().fg(Color::White))
            .highlight_style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
            .select(selected);
        frame.render_widget(header, layout[0]);
    } else {
        let breadcrumb = Paragraph::new(render_breadcrumb_text(state, tabs))
            .block(Block::default().title("forplan").borders(Borders::ALL));
        frame.render_widget(breadcrumb, layout[0]);
    }

    match state.active_tab {
        TabKind::Dashboard => shell.indicator.render(frame, layout[1]),
        TabKind::Plans => {
            let body = Paragraph::new(render_plans_text(shell))
                .block(Block::default().borders(Borders::ALL).title("plans"));
            frame.render_widget(body, layout[1]);
        }
    }

    let status_widget = Paragraph::new(status_text(state))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout[2]);

    if let Some(view) = &shell.duplicate {
        let area = centered_rect(70, 60, frame.area());
        frame.render_widget(Clear, area);
        let overlay = Paragraph::new(view.render_text()).block(
            Block::default()
                .title("duplicate plan")
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Cyan)),
        );
        frame.render_widget(overlay, area);
    }
}

fn render_breadcrumb_text(state: &AppState, tabs: &TabPanel) -> String {
    let mut parts = vec![state.active_tab.label().to_owned()];
    parts.extend(tabs.tabs().iter().map(|tab| tab.label.clone()));
    parts.join(" > ")
}

fn render_plans_text(shell: &ShellData) -> String {
    if shell.plans.is_empty() {
        return "no plans loaded; press R to refresh".to_owned();
    }
    shell
        .plans
        .iter()
        .enumerate()
        .map(|(index, plan)| {
            let marker = if index == shell.plan_cursor { "> " } else { "  " };
            let archived = if plan.archived { "  [archived]" } else { "" };
            format!(
                "{marker}{}  {} .. {}{archived}",
                plan.name,
                format_plan_date(plan.begin),
                format_plan_date(plan.end)
            )
        })
        .collect::<Vec<String>>()
        .join("\n")
}

fn status_text(state: &AppState) -> String {
    state.status_line.clone().unwrap_or_else(|| {
        "tab: switch  enter: duplicate selected plan  ctrl-q: quit".to_owned()
    })
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
