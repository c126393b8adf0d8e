//! MockPage - a deterministic simulated page.
//!
//! A small DOM tree with just enough behavior to exercise every widget
//! protocol without a browser:
//!
//! - a CSS subset for lookups: `tag`, `#id`, `.class`, `[attr]`,
//!   `[attr='v']`, `:not(.class)`, the descendant combinator and `,` groups
//! - search-select widgets ([`ComboboxSim`]) with result latency, delayed
//!   commits, swallowed clicks and the usual overlay markup
//! - type-ahead inputs ([`AutocompleteSim`]) with a delayed suggestion list
//! - scheduled page changes, injected staleness and scripted `evaluate`
//! - a call journal for assertions
//!
//! Time is read from `tokio::time`, and simulated state advances lazily on
//! each driver call, so tests run unchanged under a paused clock.

use crate::driver::{DomEvent, ElementRef, Key, PageDriver, SelectOption};
use crate::locator::{Locator, LocatorStrategy};
use crate::normalize::normalize;
use crate::preview::{PreviewDeck, ReviewPanel};
use crate::result::{DriverError, DriverResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Journal entries whose method changes page state
const MUTATING: &[&str] = &[
    "scroll_into_view",
    "focus",
    "click",
    "pointer_click",
    "clear",
    "send_keys",
    "press_key",
    "set_value",
    "dispatch",
    "select_index",
    "force_selection",
    "blur_active",
    "navigate",
];

/// Label of the message row shown while a search is in flight
pub const SEARCHING_LABEL: &str = "Buscando…";
/// Label of the message row shown when nothing matches
pub const NO_RESULTS_LABEL: &str = "Sin resultados";

/// A simulated search-select widget
#[derive(Debug, Clone)]
pub struct ComboboxSim {
    /// Id of the hidden holder `<select>`
    pub id: String,
    /// Rows the remote search can return
    pub options: Vec<SelectOption>,
    /// Rendered text before anything is committed
    pub placeholder: String,
    /// Delay between the last query change and rows rendering
    pub result_latency: Duration,
    /// Delay between a commit and the rendered text updating
    pub commit_delay: Duration,
    /// Number of row clicks to swallow
    pub ignore_clicks: u32,
    /// Swallow the confirm key
    pub ignore_enter: bool,
    /// Holder starts disabled
    pub disabled: bool,
}

impl ComboboxSim {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            options: Vec::new(),
            placeholder: "Seleccione".to_string(),
            result_latency: Duration::ZERO,
            commit_delay: Duration::ZERO,
            ignore_clicks: 0,
            ignore_enter: false,
            disabled: false,
        }
    }

    /// Rows with values `1..=n`
    #[must_use]
    pub fn with_options(mut self, texts: &[&str]) -> Self {
        self.options = texts
            .iter()
            .enumerate()
            .map(|(i, t)| SelectOption::new(*t, (i + 1).to_string()))
            .collect();
        self
    }

    #[must_use]
    pub fn with_option(mut self, text: &str, value: &str) -> Self {
        self.options.push(SelectOption::new(text, value));
        self
    }

    #[must_use]
    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    #[must_use]
    pub const fn with_result_latency_ms(mut self, ms: u64) -> Self {
        self.result_latency = Duration::from_millis(ms);
        self
    }

    #[must_use]
    pub const fn with_commit_delay_ms(mut self, ms: u64) -> Self {
        self.commit_delay = Duration::from_millis(ms);
        self
    }

    #[must_use]
    pub const fn ignoring_clicks(mut self, clicks: u32) -> Self {
        self.ignore_clicks = clicks;
        self
    }

    #[must_use]
    pub const fn ignoring_enter(mut self) -> Self {
        self.ignore_enter = true;
        self
    }

    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

/// A simulated type-ahead input
#[derive(Debug, Clone)]
pub struct AutocompleteSim {
    /// Id of the text input
    pub id: String,
    /// Suggestions offered for matching input
    pub suggestions: Vec<String>,
    /// Delay between typing and the list rendering
    pub latency: Duration,
}

impl AutocompleteSim {
    #[must_use]
    pub fn new(id: impl Into<String>, suggestions: &[&str]) -> Self {
        Self {
            id: id.into(),
            suggestions: suggestions.iter().map(ToString::to_string).collect(),
            latency: Duration::ZERO,
        }
    }

    #[must_use]
    pub const fn with_latency_ms(mut self, ms: u64) -> Self {
        self.latency = Duration::from_millis(ms);
        self
    }
}

/// A change applied to the page at a later time
#[derive(Debug, Clone)]
pub enum PageChange {
    /// Replace a select's options; its value becomes the first option's
    Options {
        id: String,
        options: Vec<SelectOption>,
    },
    Enabled {
        id: String,
        enabled: bool,
    },
    Displayed {
        id: String,
        displayed: bool,
    },
    Value {
        id: String,
        value: String,
    },
    Url(String),
}

/// Simulated page implementing [`PageDriver`]
#[derive(Debug)]
pub struct MockPage {
    state: Mutex<PageState>,
}

impl Default for MockPage {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPage {
    /// Empty page: `<html><body></body></html>` at `about:blank`
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PageState::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -------------------------------------------------------------------
    // Building the page
    // -------------------------------------------------------------------

    /// Add an element under `parent` (or `<body>`)
    pub fn add_element(
        &self,
        parent: Option<&ElementRef>,
        tag: &str,
        id: Option<&str>,
        classes: &[&str],
    ) -> ElementRef {
        let mut st = self.lock();
        let parent = parent
            .and_then(|p| st.resolve(p).ok())
            .unwrap_or(st.body);
        handle(st.create(parent, tag, id, classes))
    }

    /// Add a text input
    pub fn add_input(&self, id: &str) -> ElementRef {
        self.add_element(None, "input", Some(id), &[])
    }

    /// Add a text input inside `parent`
    pub fn add_input_in(&self, parent: &ElementRef, id: &str) -> ElementRef {
        self.add_element(Some(parent), "input", Some(id), &[])
    }

    /// Add a native select with `(text, value)` options
    pub fn add_select(&self, id: &str, options: &[(&str, &str)]) -> ElementRef {
        let mut st = self.lock();
        let body = st.body;
        let select = st.create(body, "select", Some(id), &[]);
        let opts = options
            .iter()
            .map(|(t, v)| SelectOption::new(*t, *v))
            .collect::<Vec<_>>();
        st.replace_options(select, &opts);
        handle(select)
    }

    /// Add a search-select widget; returns the hidden holder
    pub fn add_combobox(&self, sim: ComboboxSim) -> ElementRef {
        let mut st = self.lock();
        handle(st.add_combobox(sim))
    }

    /// Add a type-ahead input; returns the input
    pub fn add_autocomplete(&self, sim: AutocompleteSim) -> ElementRef {
        let mut st = self.lock();
        let body = st.body;
        let input = st.create(body, "input", Some(sim.id.as_str()), &["ui-autocomplete-input"]);
        st.autocompletes.insert(
            sim.id.clone(),
            AutoState {
                sim,
                input,
                typed_at: None,
                list: None,
                rows: Vec::new(),
                highlighted: None,
            },
        );
        handle(input)
    }

    // -------------------------------------------------------------------
    // Mutating the page from a test
    // -------------------------------------------------------------------

    /// Apply a change immediately
    pub fn apply(&self, change: PageChange) {
        self.lock().apply(change);
    }

    /// Apply a change once `after_ms` have elapsed
    pub fn schedule(&self, after_ms: u64, change: PageChange) {
        let at = Instant::now() + Duration::from_millis(after_ms);
        self.lock().scheduled.push((at, change));
    }

    pub fn set_displayed(&self, id: &str, displayed: bool) {
        self.apply(PageChange::Displayed {
            id: id.to_string(),
            displayed,
        });
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) {
        self.apply(PageChange::Enabled {
            id: id.to_string(),
            enabled,
        });
    }

    pub fn set_value(&self, id: &str, value: &str) {
        self.apply(PageChange::Value {
            id: id.to_string(),
            value: value.to_string(),
        });
    }

    pub fn set_url(&self, url: &str) {
        self.apply(PageChange::Url(url.to_string()));
    }

    /// Make direct value writes on `id` fail, as an input mask would
    pub fn reject_direct_writes(&self, id: &str) {
        let mut st = self.lock();
        if let Some(idx) = st.by_id(id) {
            st.nodes[idx].rejects_direct_write = true;
        }
    }

    /// Detach the element with `id`; existing handles go stale
    pub fn remove(&self, id: &str) {
        let mut st = self.lock();
        if let Some(idx) = st.by_id(id) {
            st.detach(idx);
        }
    }

    /// Fail the next `times` element interactions with a stale reference
    pub fn inject_stale(&self, times: u32) {
        self.inject_stale_after(0, times);
    }

    /// Let `skip` interactions through, then fail the next `times`
    pub fn inject_stale_after(&self, skip: u32, times: u32) {
        let mut st = self.lock();
        st.stale_skip = skip;
        st.stale_budget = times;
    }

    /// Answer `evaluate` calls whose script contains `fragment`
    pub fn on_script(&self, fragment: &str, result: serde_json::Value) {
        self.lock().scripts.push((fragment.to_string(), result));
    }

    /// Page without a selection framework: `force_selection` reports false
    pub fn without_framework_hook(&self) {
        self.lock().framework_hook = false;
    }

    /// Make every review panel render fail
    pub fn fail_panel(&self) {
        self.lock().panel_fails = true;
    }

    // -------------------------------------------------------------------
    // Inspecting the page
    // -------------------------------------------------------------------

    /// Handle of the element with `id`
    #[must_use]
    pub fn element(&self, id: &str) -> Option<ElementRef> {
        self.lock().by_id(id).map(handle)
    }

    /// `.value` of the element with `id`
    #[must_use]
    pub fn value_of(&self, id: &str) -> Option<String> {
        let mut st = self.lock();
        st.tick();
        st.by_id(id).map(|i| st.nodes[i].value.clone())
    }

    /// Rendered selection text of a search-select widget
    #[must_use]
    pub fn rendered_text(&self, combo_id: &str) -> Option<String> {
        let mut st = self.lock();
        st.tick();
        st.combos
            .get(combo_id)
            .map(|c| st.nodes[c.rendered].text.clone())
    }

    /// Current search query of an open search-select widget
    #[must_use]
    pub fn query_of(&self, combo_id: &str) -> Option<String> {
        let st = self.lock();
        st.combos
            .get(combo_id)
            .and_then(|c| c.open.as_ref())
            .map(|o| o.query.clone())
    }

    #[must_use]
    pub fn is_open(&self, combo_id: &str) -> bool {
        let st = self.lock();
        st.combos
            .get(combo_id)
            .is_some_and(|c| c.open.is_some())
    }

    /// Call history, oldest first
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Whether any recorded call starts with `method`
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.lock()
            .calls
            .iter()
            .any(|c| call_method(c) == method)
    }

    /// Recorded calls that change page state
    #[must_use]
    pub fn mutations(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|c| MUTATING.contains(&call_method(c)))
            .cloned()
            .collect()
    }

    pub fn clear_history(&self) {
        self.lock().calls.clear();
    }

    /// Decks rendered through the review panel, oldest first
    #[must_use]
    pub fn rendered_decks(&self) -> Vec<PreviewDeck> {
        self.lock().decks.clone()
    }
}

fn call_method(entry: &str) -> &str {
    entry.split_once(':').map_or(entry, |(m, _)| m)
}

fn handle(idx: usize) -> ElementRef {
    ElementRef::new(format!("e{idx}"))
}

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    attrs: BTreeMap<String, String>,
    classes: Vec<String>,
    text: String,
    value: String,
    children: Vec<usize>,
    parent: Option<usize>,
    displayed: bool,
    enabled: bool,
    attached: bool,
    rejects_direct_write: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Row {
    text: String,
    value: String,
    message: bool,
}

impl Row {
    fn message(text: &str) -> Self {
        Self {
            text: text.to_string(),
            value: String::new(),
            message: true,
        }
    }
}

#[derive(Debug)]
struct OpenDropdown {
    container: usize,
    search: usize,
    results: usize,
    query: String,
    query_at: Instant,
    rows: Vec<Row>,
    row_nodes: Vec<usize>,
    highlighted: Option<usize>,
}

#[derive(Debug)]
struct PendingCommit {
    option: SelectOption,
    ready_at: Instant,
}

#[derive(Debug)]
struct ComboState {
    sim: ComboboxSim,
    holder: usize,
    container: usize,
    rendered: usize,
    open: Option<OpenDropdown>,
    pending: Option<PendingCommit>,
    clicks_to_ignore: u32,
}

#[derive(Debug)]
struct AutoState {
    sim: AutocompleteSim,
    input: usize,
    typed_at: Option<Instant>,
    list: Option<usize>,
    rows: Vec<usize>,
    highlighted: Option<usize>,
}

#[derive(Debug)]
struct PageState {
    nodes: Vec<Node>,
    body: usize,
    active: Option<usize>,
    url: String,
    calls: Vec<String>,
    stale_skip: u32,
    stale_budget: u32,
    combos: BTreeMap<String, ComboState>,
    autocompletes: BTreeMap<String, AutoState>,
    scheduled: Vec<(Instant, PageChange)>,
    scripts: Vec<(String, serde_json::Value)>,
    framework_hook: bool,
    decks: Vec<PreviewDeck>,
    panel_fails: bool,
}

impl PageState {
    fn new() -> Self {
        let html = Node {
            tag: "html".to_string(),
            attrs: BTreeMap::new(),
            classes: Vec::new(),
            text: String::new(),
            value: String::new(),
            children: Vec::new(),
            parent: None,
            displayed: true,
            enabled: true,
            attached: true,
            rejects_direct_write: false,
        };
        let mut st = Self {
            nodes: vec![html],
            body: 0,
            active: None,
            url: "about:blank".to_string(),
            calls: Vec::new(),
            stale_skip: 0,
            stale_budget: 0,
            combos: BTreeMap::new(),
            autocompletes: BTreeMap::new(),
            scheduled: Vec::new(),
            scripts: Vec::new(),
            framework_hook: true,
            decks: Vec::new(),
            panel_fails: false,
        };
        st.body = st.create(0, "body", None, &[]);
        st
    }

    // ----- tree -----

    fn create(&mut self, parent: usize, tag: &str, id: Option<&str>, classes: &[&str]) -> usize {
        let idx = self.nodes.len();
        let mut attrs = BTreeMap::new();
        if let Some(id) = id {
            attrs.insert("id".to_string(), id.to_string());
        }
        let attached = self.nodes[parent].attached;
        self.nodes.push(Node {
            tag: tag.to_ascii_lowercase(),
            attrs,
            classes: classes.iter().map(ToString::to_string).collect(),
            text: String::new(),
            value: String::new(),
            children: Vec::new(),
            parent: Some(parent),
            displayed: true,
            enabled: true,
            attached,
            rejects_direct_write: false,
        });
        self.nodes[parent].children.push(idx);
        idx
    }

    fn detach(&mut self, idx: usize) {
        if let Some(parent) = self.nodes[idx].parent.take() {
            self.nodes[parent].children.retain(|c| *c != idx);
        }
        for n in self.subtree(idx) {
            self.nodes[n].attached = false;
            if self.active == Some(n) {
                self.active = None;
            }
        }
    }

    /// Preorder traversal starting at `root` (inclusive)
    fn subtree(&self, root: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.nodes[n].children.iter().rev());
        }
        out
    }

    fn resolve(&self, el: &ElementRef) -> DriverResult<usize> {
        el.handle()
            .strip_prefix('e')
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|n| self.nodes.get(*n).is_some_and(|node| node.attached))
            .ok_or_else(|| DriverError::StaleElement {
                handle: el.handle().to_string(),
            })
    }

    fn by_id(&self, id: &str) -> Option<usize> {
        self.subtree(0)
            .into_iter()
            .find(|n| self.nodes[*n].attrs.get("id").is_some_and(|v| v == id))
    }

    fn is_ancestor(&self, ancestor: usize, mut idx: usize) -> bool {
        loop {
            if idx == ancestor {
                return true;
            }
            match self.nodes[idx].parent {
                Some(p) => idx = p,
                None => return false,
            }
        }
    }

    fn displayed(&self, idx: usize) -> bool {
        let mut cur = Some(idx);
        while let Some(n) = cur {
            if !self.nodes[n].displayed {
                return false;
            }
            cur = self.nodes[n].parent;
        }
        true
    }

    fn text_of(&self, idx: usize) -> String {
        self.subtree(idx)
            .into_iter()
            .map(|n| self.nodes[n].text.as_str())
            .collect::<String>()
            .trim()
            .to_string()
    }

    fn describe(&self, idx: usize) -> String {
        let node = &self.nodes[idx];
        match node.attrs.get("id") {
            Some(id) => format!("#{id}"),
            None => {
                let mut s = node.tag.clone();
                if let Some(first) = node.classes.first() {
                    s.push('.');
                    s.push_str(first);
                }
                s
            }
        }
    }

    fn record(&mut self, method: &str, target: Option<usize>, arg: Option<&str>) {
        let mut entry = method.to_string();
        if let Some(t) = target {
            entry.push(':');
            entry.push_str(&self.describe(t));
        }
        if let Some(a) = arg {
            entry.push(if target.is_some() { '=' } else { ':' });
            entry.push_str(a);
        }
        self.calls.push(entry);
    }

    fn query(&self, locator: &Locator, scope: Option<usize>) -> DriverResult<Vec<usize>> {
        let candidates: Vec<usize> = match scope {
            Some(root) => self.subtree(root).into_iter().skip(1).collect(),
            None => self.subtree(0),
        };
        match locator.strategy {
            LocatorStrategy::Id => Ok(candidates
                .into_iter()
                .filter(|n| self.nodes[*n].attrs.get("id") == Some(&locator.value))
                .collect()),
            LocatorStrategy::Name => Ok(candidates
                .into_iter()
                .filter(|n| self.nodes[*n].attrs.get("name") == Some(&locator.value))
                .collect()),
            LocatorStrategy::Css => {
                let selector =
                    css::Selector::parse(&locator.value).map_err(|message| {
                        DriverError::InvalidLocator {
                            locator: locator.to_string(),
                            message,
                        }
                    })?;
                Ok(candidates
                    .into_iter()
                    .filter(|n| selector.matches(&self.nodes, *n))
                    .collect())
            }
            LocatorStrategy::XPath => Err(DriverError::Unsupported {
                operation: "xpath lookup".to_string(),
            }),
        }
    }

    fn replace_options(&mut self, select: usize, options: &[SelectOption]) {
        let old: Vec<usize> = self.nodes[select]
            .children
            .iter()
            .copied()
            .filter(|c| self.nodes[*c].tag == "option")
            .collect();
        for o in old {
            self.detach(o);
        }
        for opt in options {
            let o = self.create(select, "option", None, &[]);
            self.nodes[o].text.clone_from(&opt.text);
            self.nodes[o]
                .attrs
                .insert("value".to_string(), opt.value.clone());
        }
        self.nodes[select].value = options.first().map(|o| o.value.clone()).unwrap_or_default();
    }

    fn options_of(&self, select: usize) -> Vec<SelectOption> {
        self.nodes[select]
            .children
            .iter()
            .filter(|c| self.nodes[**c].tag == "option")
            .map(|c| {
                let node = &self.nodes[*c];
                SelectOption::new(
                    node.text.clone(),
                    node.attrs.get("value").cloned().unwrap_or_default(),
                )
            })
            .collect()
    }

    fn apply(&mut self, change: PageChange) {
        match change {
            PageChange::Options { id, options } => {
                if let Some(idx) = self.by_id(&id) {
                    self.replace_options(idx, &options);
                }
            }
            PageChange::Enabled { id, enabled } => {
                if let Some(idx) = self.by_id(&id) {
                    self.nodes[idx].enabled = enabled;
                }
            }
            PageChange::Displayed { id, displayed } => {
                if let Some(idx) = self.by_id(&id) {
                    self.nodes[idx].displayed = displayed;
                }
            }
            PageChange::Value { id, value } => {
                if let Some(idx) = self.by_id(&id) {
                    self.nodes[idx].value = value;
                }
            }
            PageChange::Url(url) => self.url = url,
        }
    }

    fn take_stale(&mut self, el: &ElementRef) -> DriverResult<()> {
        if self.stale_budget == 0 {
            return Ok(());
        }
        if self.stale_skip > 0 {
            self.stale_skip -= 1;
            return Ok(());
        }
        self.stale_budget -= 1;
        Err(DriverError::StaleElement {
            handle: el.handle().to_string(),
        })
    }

    fn interactable(&self, idx: usize) -> DriverResult<()> {
        if !self.displayed(idx) {
            return Err(DriverError::not_interactable(format!(
                "{} is not displayed",
                self.describe(idx)
            )));
        }
        if !self.nodes[idx].enabled {
            return Err(DriverError::not_interactable(format!(
                "{} is disabled",
                self.describe(idx)
            )));
        }
        Ok(())
    }

    // ----- time -----

    fn tick(&mut self) {
        let now = Instant::now();
        let due: Vec<PageChange> = {
            let (due, rest): (Vec<_>, Vec<_>) =
                std::mem::take(&mut self.scheduled).into_iter().partition(|(at, _)| *at <= now);
            self.scheduled = rest;
            due.into_iter().map(|(_, c)| c).collect()
        };
        for change in due {
            self.apply(change);
        }
        let ids: Vec<String> = self.combos.keys().cloned().collect();
        for id in ids {
            if let Some(mut combo) = self.combos.remove(&id) {
                self.tick_combo(&mut combo, now);
                self.combos.insert(id, combo);
            }
        }
        let ids: Vec<String> = self.autocompletes.keys().cloned().collect();
        for id in ids {
            if let Some(mut auto) = self.autocompletes.remove(&id) {
                self.tick_autocomplete(&mut auto, now);
                self.autocompletes.insert(id, auto);
            }
        }
    }

    // ----- search-select -----

    fn add_combobox(&mut self, sim: ComboboxSim) -> usize {
        let body = self.body;
        let holder = self.create(
            body,
            "select",
            Some(sim.id.as_str()),
            &["select2-hidden-accessible"],
        );
        self.nodes[holder].displayed = false;
        self.nodes[holder].enabled = !sim.disabled;
        self.replace_options(holder, &[SelectOption::new(sim.placeholder.clone(), "")]);
        let container = self.create(body, "span", None, &["select2", "select2-container"]);
        let wrap = self.create(container, "span", None, &["selection"]);
        let selection = self.create(
            wrap,
            "span",
            None,
            &["select2-selection", "select2-selection--single"],
        );
        self.nodes[selection]
            .attrs
            .insert("role".to_string(), "combobox".to_string());
        let rendered_id = format!("select2-{}-container", sim.id);
        let rendered = self.create(
            selection,
            "span",
            Some(rendered_id.as_str()),
            &["select2-selection__rendered"],
        );
        self.nodes[rendered].text.clone_from(&sim.placeholder);
        let clicks_to_ignore = sim.ignore_clicks;
        self.combos.insert(
            sim.id.clone(),
            ComboState {
                sim,
                holder,
                container,
                rendered,
                open: None,
                pending: None,
                clicks_to_ignore,
            },
        );
        holder
    }

    fn tick_combo(&mut self, combo: &mut ComboState, now: Instant) {
        if combo.pending.as_ref().is_some_and(|p| now >= p.ready_at) {
            if let Some(p) = combo.pending.take() {
                self.apply_commit(combo, &p.option);
            }
        }
        let Some(open) = combo.open.as_mut() else {
            return;
        };
        let rows = if now < open.query_at + combo.sim.result_latency {
            vec![Row::message(SEARCHING_LABEL)]
        } else {
            let q = normalize(&open.query);
            let hits: Vec<Row> = combo
                .sim
                .options
                .iter()
                .filter(|o| q.is_empty() || normalize(&o.text).contains(&q))
                .map(|o| Row {
                    text: o.text.clone(),
                    value: o.value.clone(),
                    message: false,
                })
                .collect();
            if hits.is_empty() {
                vec![Row::message(NO_RESULTS_LABEL)]
            } else {
                hits
            }
        };
        if rows == open.rows {
            return;
        }
        let old = std::mem::take(&mut open.row_nodes);
        let results = open.results;
        for n in old {
            self.detach(n);
        }
        let mut nodes = Vec::with_capacity(rows.len());
        let highlighted = rows.iter().position(|r| !r.message);
        for (i, row) in rows.iter().enumerate() {
            let mut classes = vec!["select2-results__option"];
            if row.message {
                classes.push("select2-results__message");
            }
            if Some(i) == highlighted {
                classes.push("select2-results__option--highlighted");
            }
            let li = self.create(results, "li", None, &classes);
            self.nodes[li].text.clone_from(&row.text);
            self.nodes[li]
                .attrs
                .insert("role".to_string(), "option".to_string());
            if !row.message {
                self.nodes[li]
                    .attrs
                    .insert("data-select2-id".to_string(), row.value.clone());
            }
            nodes.push(li);
        }
        open.rows = rows;
        open.row_nodes = nodes;
        open.highlighted = highlighted;
    }

    fn apply_commit(&mut self, combo: &ComboState, option: &SelectOption) {
        let holder = combo.holder;
        let mut options = self.options_of(holder);
        if !options.iter().any(|o| o.value == option.value) {
            options.push(option.clone());
        }
        self.replace_options(holder, &options);
        self.nodes[holder].value.clone_from(&option.value);
        self.nodes[combo.rendered].text.clone_from(&option.text);
    }

    fn open_combo(&mut self, combo: &mut ComboState, now: Instant) {
        let body = self.body;
        let container = self.create(
            body,
            "span",
            None,
            &["select2-container", "select2-container--open"],
        );
        let dropdown = self.create(container, "span", None, &["select2-dropdown"]);
        let search_wrap = self.create(dropdown, "span", None, &["select2-search"]);
        let search = self.create(search_wrap, "input", None, &["select2-search__field"]);
        let results_wrap = self.create(dropdown, "span", None, &["select2-results"]);
        let results_id = format!("select2-{}-results", combo.sim.id);
        let results = self.create(
            results_wrap,
            "ul",
            Some(results_id.as_str()),
            &["select2-results__options"],
        );
        self.active = Some(search);
        combo.open = Some(OpenDropdown {
            container,
            search,
            results,
            query: String::new(),
            query_at: now,
            rows: Vec::new(),
            row_nodes: Vec::new(),
            highlighted: None,
        });
        self.tick_combo(combo, now);
    }

    fn close_combo(&mut self, combo: &mut ComboState) {
        if let Some(open) = combo.open.take() {
            self.detach(open.container);
        }
    }

    fn commit_row(&mut self, combo: &mut ComboState, row: Row, now: Instant) {
        combo.pending = Some(PendingCommit {
            option: SelectOption::new(row.text, row.value),
            ready_at: now + combo.sim.commit_delay,
        });
        self.close_combo(combo);
        self.tick_combo(combo, now);
    }

    /// Combo whose visual control contains `idx`
    fn combo_for_control(&self, idx: usize) -> Option<String> {
        self.combos
            .iter()
            .find(|(_, c)| self.is_ancestor(c.container, idx))
            .map(|(id, _)| id.clone())
    }

    /// Combo whose open search box is `idx`
    fn combo_for_search(&self, idx: usize) -> Option<String> {
        self.combos
            .iter()
            .find(|(_, c)| c.open.as_ref().is_some_and(|o| o.search == idx))
            .map(|(id, _)| id.clone())
    }

    /// Combo and row index for a result row node
    fn combo_for_row(&self, idx: usize) -> Option<(String, usize)> {
        self.combos.iter().find_map(|(id, c)| {
            c.open
                .as_ref()
                .and_then(|o| o.row_nodes.iter().position(|n| *n == idx))
                .map(|pos| (id.clone(), pos))
        })
    }

    fn with_combo(&mut self, id: &str, f: impl FnOnce(&mut Self, &mut ComboState)) {
        if let Some(mut combo) = self.combos.remove(id) {
            f(self, &mut combo);
            self.combos.insert(id.to_string(), combo);
        }
    }

    fn close_all_combos(&mut self) {
        let ids: Vec<String> = self.combos.keys().cloned().collect();
        for id in ids {
            self.with_combo(&id, |st, c| st.close_combo(c));
        }
    }

    // ----- type-ahead -----

    fn tick_autocomplete(&mut self, auto: &mut AutoState, now: Instant) {
        let Some(typed_at) = auto.typed_at else {
            return;
        };
        if now < typed_at + auto.sim.latency {
            return;
        }
        auto.typed_at = None;
        let typed = normalize(&self.nodes[auto.input].value);
        let hits: Vec<String> = auto
            .sim
            .suggestions
            .iter()
            .filter(|s| !typed.is_empty() && normalize(s).contains(&typed))
            .cloned()
            .collect();
        if hits.is_empty() {
            return;
        }
        let body = self.body;
        let list = self.create(body, "ul", None, &["ui-autocomplete", "ui-menu"]);
        self.nodes[list]
            .attrs
            .insert("role".to_string(), "listbox".to_string());
        auto.rows = hits
            .iter()
            .map(|text| {
                let li = self.create(list, "li", None, &["ui-menu-item"]);
                self.nodes[li].text.clone_from(text);
                li
            })
            .collect();
        auto.list = Some(list);
        auto.highlighted = None;
    }

    fn drop_list(&mut self, auto: &mut AutoState) {
        if let Some(list) = auto.list.take() {
            self.detach(list);
        }
        auto.rows.clear();
        auto.highlighted = None;
    }

    fn choose_suggestion(&mut self, auto: &mut AutoState, row: usize) {
        let text = self.nodes[row].text.clone();
        self.nodes[auto.input].value = text;
        self.drop_list(auto);
    }

    fn auto_for_input(&self, idx: usize) -> Option<String> {
        self.autocompletes
            .iter()
            .find(|(_, a)| a.input == idx)
            .map(|(id, _)| id.clone())
    }

    fn auto_for_row(&self, idx: usize) -> Option<String> {
        self.autocompletes
            .iter()
            .find(|(_, a)| a.rows.contains(&idx))
            .map(|(id, _)| id.clone())
    }

    fn with_auto(&mut self, id: &str, f: impl FnOnce(&mut Self, &mut AutoState)) {
        if let Some(mut auto) = self.autocompletes.remove(id) {
            f(self, &mut auto);
            self.autocompletes.insert(id.to_string(), auto);
        }
    }

    // ----- behavior -----

    fn on_click(&mut self, idx: usize) {
        let now = Instant::now();
        if let Some((id, pos)) = self.combo_for_row(idx) {
            self.with_combo(&id, |st, c| {
                let Some(row) = c.open.as_ref().and_then(|o| o.rows.get(pos)).cloned() else {
                    return;
                };
                if row.message {
                    return;
                }
                if c.clicks_to_ignore > 0 {
                    c.clicks_to_ignore -= 1;
                    return;
                }
                st.commit_row(c, row, now);
            });
            return;
        }
        if let Some(id) = self.combo_for_control(idx) {
            let was_open = self.combos.get(&id).is_some_and(|c| c.open.is_some());
            self.close_all_combos();
            if !was_open {
                self.with_combo(&id, |st, c| {
                    if st.nodes[c.holder].enabled {
                        st.open_combo(c, now);
                    }
                });
            }
            return;
        }
        if let Some(id) = self.auto_for_row(idx) {
            self.with_auto(&id, |st, a| st.choose_suggestion(a, idx));
            return;
        }
        if self.nodes[idx].tag == "input" {
            self.active = Some(idx);
        }
    }

    fn on_text(&mut self, idx: usize, text: &str, replace: bool) {
        let now = Instant::now();
        if replace {
            self.nodes[idx].value = text.to_string();
        } else {
            self.nodes[idx].value.push_str(text);
        }
        if let Some(id) = self.combo_for_search(idx) {
            let value = self.nodes[idx].value.clone();
            self.with_combo(&id, |st, c| {
                if let Some(open) = c.open.as_mut() {
                    open.query = value;
                    open.query_at = now;
                }
                st.tick_combo(c, now);
            });
        } else if let Some(id) = self.auto_for_input(idx) {
            self.with_auto(&id, |st, a| {
                st.drop_list(a);
                a.typed_at = (!st.nodes[idx].value.is_empty()).then_some(now);
            });
        }
    }

    fn on_key(&mut self, idx: usize, key: Key) {
        let now = Instant::now();
        if let Some(id) = self.combo_for_search(idx) {
            self.with_combo(&id, |st, c| match key {
                Key::Escape => st.close_combo(c),
                Key::Enter => {
                    if c.sim.ignore_enter {
                        return;
                    }
                    let row = c
                        .open
                        .as_ref()
                        .and_then(|o| o.highlighted.and_then(|h| o.rows.get(h)))
                        .filter(|r| !r.message)
                        .cloned();
                    if let Some(row) = row {
                        st.commit_row(c, row, now);
                    }
                }
                Key::ArrowDown => {
                    if let Some(open) = c.open.as_mut() {
                        let real: Vec<usize> = open
                            .rows
                            .iter()
                            .enumerate()
                            .filter(|(_, r)| !r.message)
                            .map(|(i, _)| i)
                            .collect();
                        open.highlighted = match open.highlighted {
                            Some(h) => real.iter().copied().find(|i| *i > h).or(Some(h)),
                            None => real.first().copied(),
                        };
                    }
                }
                Key::Tab => st.close_combo(c),
            });
            return;
        }
        if let Some(id) = self.auto_for_input(idx) {
            self.with_auto(&id, |st, a| match key {
                Key::ArrowDown => {
                    if !a.rows.is_empty() {
                        a.highlighted = Some(a.highlighted.map_or(0, |h| (h + 1).min(a.rows.len() - 1)));
                    }
                }
                Key::Enter => {
                    if let Some(row) = a.highlighted.and_then(|h| a.rows.get(h)).copied() {
                        st.choose_suggestion(a, row);
                    }
                }
                Key::Escape | Key::Tab => st.drop_list(a),
            });
        }
        if key == Key::Tab && self.active == Some(idx) {
            self.active = None;
        }
    }

    fn force(&mut self, holder: usize, value: &str, text: &str) -> bool {
        if !self.framework_hook {
            return false;
        }
        let Some(id) = self
            .combos
            .iter()
            .find(|(_, c)| c.holder == holder)
            .map(|(id, _)| id.clone())
        else {
            return false;
        };
        let option = SelectOption::new(text, value);
        self.with_combo(&id, |st, c| {
            st.replace_options(c.holder, std::slice::from_ref(&option));
            st.nodes[c.rendered].text = option.text.clone();
            c.pending = None;
            st.close_combo(c);
        });
        true
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn find(&self, locator: &Locator) -> DriverResult<Option<ElementRef>> {
        let mut st = self.lock();
        st.tick();
        let arg = locator.to_string();
        st.record("find", None, Some(&arg));
        Ok(st.query(locator, None)?.first().copied().map(handle))
    }

    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<ElementRef>> {
        let mut st = self.lock();
        st.tick();
        let arg = locator.to_string();
        st.record("find_all", None, Some(&arg));
        Ok(st.query(locator, None)?.into_iter().map(handle).collect())
    }

    async fn find_within(
        &self,
        root: &ElementRef,
        locator: &Locator,
    ) -> DriverResult<Option<ElementRef>> {
        let mut st = self.lock();
        st.tick();
        let root = st.resolve(root)?;
        Ok(st.query(locator, Some(root))?.first().copied().map(handle))
    }

    async fn adjacent(
        &self,
        element: &ElementRef,
        class_fragment: &str,
    ) -> DriverResult<Option<ElementRef>> {
        let mut st = self.lock();
        st.tick();
        let idx = st.resolve(element)?;
        let Some(parent) = st.nodes[idx].parent else {
            return Ok(None);
        };
        let siblings = &st.nodes[parent].children;
        let found = siblings
            .iter()
            .skip_while(|c| **c != idx)
            .skip(1)
            .find(|c| {
                st.nodes[**c]
                    .classes
                    .join(" ")
                    .contains(class_fragment)
            })
            .copied();
        Ok(found.map(handle))
    }

    async fn text(&self, element: &ElementRef) -> DriverResult<String> {
        let mut st = self.lock();
        st.tick();
        let idx = st.resolve(element)?;
        Ok(st.text_of(idx))
    }

    async fn attribute(&self, element: &ElementRef, name: &str) -> DriverResult<Option<String>> {
        let mut st = self.lock();
        st.tick();
        let idx = st.resolve(element)?;
        let node = &st.nodes[idx];
        Ok(match name {
            "class" => Some(node.classes.join(" ")),
            "value" => Some(node.value.clone()),
            _ => node.attrs.get(name).cloned(),
        })
    }

    async fn value(&self, element: &ElementRef) -> DriverResult<String> {
        let mut st = self.lock();
        st.tick();
        let idx = st.resolve(element)?;
        Ok(st.nodes[idx].value.clone())
    }

    async fn is_displayed(&self, element: &ElementRef) -> DriverResult<bool> {
        let mut st = self.lock();
        st.tick();
        let idx = st.resolve(element)?;
        Ok(st.displayed(idx))
    }

    async fn is_enabled(&self, element: &ElementRef) -> DriverResult<bool> {
        let mut st = self.lock();
        st.tick();
        let idx = st.resolve(element)?;
        Ok(st.nodes[idx].enabled)
    }

    async fn is_focused(&self, element: &ElementRef) -> DriverResult<bool> {
        let mut st = self.lock();
        st.tick();
        let idx = st.resolve(element)?;
        Ok(st.active == Some(idx))
    }

    async fn scroll_into_view(&self, element: &ElementRef) -> DriverResult<()> {
        let mut st = self.lock();
        st.tick();
        let idx = st.resolve(element)?;
        st.record("scroll_into_view", Some(idx), None);
        Ok(())
    }

    async fn focus(&self, element: &ElementRef) -> DriverResult<()> {
        let mut st = self.lock();
        st.tick();
        let idx = st.resolve(element)?;
        st.record("focus", Some(idx), None);
        st.active = Some(idx);
        Ok(())
    }

    async fn click(&self, element: &ElementRef) -> DriverResult<()> {
        let mut st = self.lock();
        st.tick();
        st.take_stale(element)?;
        let idx = st.resolve(element)?;
        st.interactable(idx)?;
        st.record("click", Some(idx), None);
        st.on_click(idx);
        Ok(())
    }

    async fn pointer_click(&self, element: &ElementRef) -> DriverResult<()> {
        let mut st = self.lock();
        st.tick();
        st.take_stale(element)?;
        let idx = st.resolve(element)?;
        st.interactable(idx)?;
        st.record("pointer_click", Some(idx), None);
        st.on_click(idx);
        Ok(())
    }

    async fn clear(&self, element: &ElementRef) -> DriverResult<()> {
        let mut st = self.lock();
        st.tick();
        st.take_stale(element)?;
        let idx = st.resolve(element)?;
        st.interactable(idx)?;
        st.record("clear", Some(idx), None);
        st.on_text(idx, "", true);
        Ok(())
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> DriverResult<()> {
        let mut st = self.lock();
        st.tick();
        st.take_stale(element)?;
        let idx = st.resolve(element)?;
        st.interactable(idx)?;
        st.record("send_keys", Some(idx), Some(text));
        st.active = Some(idx);
        st.on_text(idx, text, false);
        Ok(())
    }

    async fn press_key(&self, element: &ElementRef, key: Key) -> DriverResult<()> {
        let mut st = self.lock();
        st.tick();
        st.take_stale(element)?;
        let idx = st.resolve(element)?;
        st.record("press_key", Some(idx), Some(key.dom_key()));
        st.on_key(idx, key);
        Ok(())
    }

    async fn set_value(
        &self,
        element: &ElementRef,
        value: &str,
        events: &[DomEvent],
    ) -> DriverResult<()> {
        let mut st = self.lock();
        st.tick();
        st.take_stale(element)?;
        let idx = st.resolve(element)?;
        st.record("set_value", Some(idx), Some(value));
        if st.nodes[idx].rejects_direct_write {
            return Err(DriverError::script("value rejected by input mask"));
        }
        if events.contains(&DomEvent::Input) {
            st.on_text(idx, value, true);
        } else {
            st.nodes[idx].value = value.to_string();
        }
        if events.contains(&DomEvent::Blur) && st.active == Some(idx) {
            st.active = None;
        }
        Ok(())
    }

    async fn dispatch(&self, element: &ElementRef, event: DomEvent) -> DriverResult<()> {
        let mut st = self.lock();
        st.tick();
        let idx = st.resolve(element)?;
        st.record("dispatch", Some(idx), Some(event.name()));
        match event {
            DomEvent::Blur => {
                if st.active == Some(idx) {
                    st.active = None;
                }
            }
            DomEvent::Input => {
                let value = st.nodes[idx].value.clone();
                st.on_text(idx, &value, true);
            }
            DomEvent::Change | DomEvent::KeyUp(_) => {}
        }
        Ok(())
    }

    async fn options(&self, element: &ElementRef) -> DriverResult<Vec<SelectOption>> {
        let mut st = self.lock();
        st.tick();
        let idx = st.resolve(element)?;
        Ok(st.options_of(idx))
    }

    async fn select_index(&self, element: &ElementRef, index: usize) -> DriverResult<()> {
        let mut st = self.lock();
        st.tick();
        let idx = st.resolve(element)?;
        if !st.nodes[idx].enabled {
            return Err(DriverError::not_interactable(format!(
                "{} is disabled",
                st.describe(idx)
            )));
        }
        let options = st.options_of(idx);
        let Some(option) = options.get(index) else {
            return Err(DriverError::not_interactable(format!(
                "option index {index} out of range"
            )));
        };
        let arg = index.to_string();
        st.record("select_index", Some(idx), Some(&arg));
        st.nodes[idx].value.clone_from(&option.value);
        Ok(())
    }

    async fn force_selection(
        &self,
        holder: &ElementRef,
        value: &str,
        text: &str,
    ) -> DriverResult<bool> {
        let mut st = self.lock();
        st.tick();
        let idx = st.resolve(holder)?;
        st.record("force_selection", Some(idx), Some(value));
        Ok(st.force(idx, value, text))
    }

    async fn blur_active(&self) -> DriverResult<()> {
        let mut st = self.lock();
        st.tick();
        st.record("blur_active", None, None);
        st.active = None;
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        let mut st = self.lock();
        st.tick();
        Ok(st.url.clone())
    }

    async fn navigate(&self, url: &str) -> DriverResult<()> {
        let mut st = self.lock();
        st.record("navigate", None, Some(url));
        st.url = url.to_string();
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> DriverResult<serde_json::Value> {
        let mut st = self.lock();
        st.tick();
        st.record("evaluate", None, None);
        Ok(st
            .scripts
            .iter()
            .find(|(fragment, _)| script.contains(fragment.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl ReviewPanel for MockPage {
    async fn render(&self, deck: &PreviewDeck) -> DriverResult<()> {
        let mut st = self.lock();
        st.record("render_panel", None, deck.current().map(|p| p.title.as_str()));
        if st.panel_fails {
            return Err(DriverError::script("review panel unavailable"));
        }
        st.decks.push(deck.clone());
        Ok(())
    }
}

mod css {
    //! Selector subset used by the simulated page.

    use super::Node;

    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    struct Compound {
        tag: Option<String>,
        id: Option<String>,
        classes: Vec<String>,
        attrs: Vec<(String, Option<String>)>,
        not_classes: Vec<String>,
    }

    impl Compound {
        fn matches(&self, node: &Node) -> bool {
            if let Some(tag) = &self.tag {
                if tag != "*" && !tag.eq_ignore_ascii_case(&node.tag) {
                    return false;
                }
            }
            if let Some(id) = &self.id {
                if node.attrs.get("id") != Some(id) {
                    return false;
                }
            }
            if !self.classes.iter().all(|c| node.classes.contains(c)) {
                return false;
            }
            if self.not_classes.iter().any(|c| node.classes.contains(c)) {
                return false;
            }
            self.attrs.iter().all(|(name, want)| {
                let have = match name.as_str() {
                    "class" => Some(node.classes.join(" ")),
                    "value" => Some(node.value.clone()),
                    _ => node.attrs.get(name).cloned(),
                };
                match (have, want) {
                    (Some(h), Some(w)) => &h == w,
                    (Some(_), None) => true,
                    (None, _) => false,
                }
            })
        }
    }

    /// Comma-separated groups of descendant chains
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(super) struct Selector {
        groups: Vec<Vec<Compound>>,
    }

    impl Selector {
        pub(super) fn parse(input: &str) -> Result<Self, String> {
            let mut groups = Vec::new();
            for group in split_top(input, |c| c == ',') {
                let chain = split_top(&group, char::is_whitespace)
                    .iter()
                    .filter(|p| !p.is_empty())
                    .map(|p| parse_compound(p))
                    .collect::<Result<Vec<_>, _>>()?;
                if chain.is_empty() {
                    return Err(format!("empty selector group in '{input}'"));
                }
                groups.push(chain);
            }
            Ok(Self { groups })
        }

        pub(super) fn matches(&self, nodes: &[Node], idx: usize) -> bool {
            self.groups.iter().any(|chain| chain_matches(chain, nodes, idx))
        }
    }

    fn chain_matches(chain: &[Compound], nodes: &[Node], idx: usize) -> bool {
        let Some((last, rest)) = chain.split_last() else {
            return false;
        };
        if !last.matches(&nodes[idx]) {
            return false;
        }
        let mut cursor = nodes[idx].parent;
        for compound in rest.iter().rev() {
            loop {
                match cursor {
                    Some(n) if compound.matches(&nodes[n]) => {
                        cursor = nodes[n].parent;
                        break;
                    }
                    Some(n) => cursor = nodes[n].parent,
                    None => return false,
                }
            }
        }
        true
    }

    /// Split on `sep` outside brackets, parentheses and quotes
    fn split_top(input: &str, sep: impl Fn(char) -> bool) -> Vec<String> {
        let mut parts = Vec::new();
        let mut cur = String::new();
        let mut depth = 0_i32;
        let mut quote: Option<char> = None;
        for c in input.chars() {
            match quote {
                Some(q) => {
                    if c == q {
                        quote = None;
                    }
                    cur.push(c);
                    continue;
                }
                None if c == '\'' || c == '"' => {
                    quote = Some(c);
                    cur.push(c);
                    continue;
                }
                None => {}
            }
            match c {
                '[' | '(' => depth += 1,
                ']' | ')' => depth -= 1,
                _ => {}
            }
            if depth == 0 && sep(c) {
                parts.push(std::mem::take(&mut cur));
            } else {
                cur.push(c);
            }
        }
        parts.push(cur);
        parts.into_iter().map(|p| p.trim().to_string()).collect()
    }

    fn is_ident(c: char) -> bool {
        c.is_alphanumeric() || c == '-' || c == '_'
    }

    fn read_ident(chars: &[char], i: &mut usize) -> String {
        let mut out = String::new();
        while *i < chars.len() {
            let c = chars[*i];
            if c == '\\' && *i + 1 < chars.len() {
                out.push(chars[*i + 1]);
                *i += 2;
            } else if is_ident(c) {
                out.push(c);
                *i += 1;
            } else {
                break;
            }
        }
        out
    }

    fn parse_compound(input: &str) -> Result<Compound, String> {
        let chars: Vec<char> = input.chars().collect();
        let mut i = 0;
        let mut out = Compound::default();
        if chars.first() == Some(&'*') {
            out.tag = Some("*".to_string());
            i = 1;
        } else if chars.first().is_some_and(|c| is_ident(*c)) {
            out.tag = Some(read_ident(&chars, &mut i));
        }
        while i < chars.len() {
            match chars[i] {
                '#' => {
                    i += 1;
                    out.id = Some(read_ident(&chars, &mut i));
                }
                '.' => {
                    i += 1;
                    out.classes.push(read_ident(&chars, &mut i));
                }
                '[' => {
                    let end = chars[i..]
                        .iter()
                        .position(|c| *c == ']')
                        .ok_or_else(|| format!("unclosed attribute in '{input}'"))?;
                    let body: String = chars[i + 1..i + end].iter().collect();
                    i += end + 1;
                    out.attrs.push(match body.split_once('=') {
                        Some((name, value)) => (
                            name.trim().to_string(),
                            Some(value.trim().trim_matches(|c| c == '\'' || c == '"').to_string()),
                        ),
                        None => (body.trim().to_string(), None),
                    });
                }
                ':' => {
                    let rest: String = chars[i..].iter().collect();
                    let inner = rest
                        .strip_prefix(":not(.")
                        .and_then(|r| r.split_once(')'))
                        .ok_or_else(|| format!("unsupported pseudo-class in '{input}'"))?
                        .0
                        .to_string();
                    i += ":not(.".len() + inner.chars().count() + 1;
                    out.not_classes.push(inner);
                }
                other => return Err(format!("unexpected '{other}' in '{input}'")),
            }
        }
        Ok(out)
    }

}
