//! In-memory page backend.
//!
//! [`MemoryPage`] is a scripted page model implementing [`Session`]: a tree
//! of frames holding form controls, plus triggers that fire side effects
//! (script errors, console output, navigation, DOM changes, disconnects) when
//! a control receives a matching value or click. It backs the engine's tests
//! and lets callers dry-run a fuzzing plan without a browser.
//!
//! Elements are located by ID ([`Locator::Id`]); [`Locator::Name`] and
//! `#id` CSS selectors also resolve.
//!
//! # Example
//!
//! ```
//! use page_fuzzer::session::memory::{Effect, MemoryElement, MemoryFrame, MemoryPage};
//!
//! let page = MemoryPage::new(
//!     "https://shop.test/signup",
//!     MemoryFrame::root()
//!         .element(MemoryElement::text_input("email"))
//!         .frame(MemoryFrame::new("iframe-1").element(MemoryElement::dropdown("country", ["de", "fr"]))),
//! )
//! .on_value("email", "<script>", Effect::script_error("Unexpected token '<'"));
//! ```

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::error::{Error, Result};
use crate::identifiers::{FrameId, SessionId};

use super::{
    Action, ConsoleEntry, DiscoveredElement, JsErrorEntry, Locator, LogLevel, RevealMethod,
    Session,
};

// ============================================================================
// Constants
// ============================================================================

/// Eight-byte PNG signature returned as the screenshot.
const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

// ============================================================================
// MemoryElement
// ============================================================================

/// A form control in a [`MemoryFrame`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryElement {
    id: String,
    tag: String,
    input_type: Option<String>,
    name: Option<String>,
    placeholder: Option<String>,
    label: Option<String>,
    content_editable: bool,
    visible: bool,
    disabled: bool,
    behind_trigger: bool,
    value: String,
    options: Vec<String>,
}

impl MemoryElement {
    fn new(id: impl Into<String>, tag: &str, input_type: Option<&str>) -> Self {
        Self {
            id: id.into(),
            tag: tag.to_string(),
            input_type: input_type.map(str::to_string),
            name: None,
            placeholder: None,
            label: None,
            content_editable: false,
            visible: true,
            disabled: false,
            behind_trigger: false,
            value: String::new(),
            options: Vec::new(),
        }
    }

    /// `<input type="text">`.
    #[must_use]
    pub fn text_input(id: impl Into<String>) -> Self {
        Self::new(id, "input", Some("text"))
    }

    /// `<input>` of the given type.
    #[must_use]
    pub fn input(id: impl Into<String>, input_type: &str) -> Self {
        Self::new(id, "input", Some(input_type))
    }

    /// `<textarea>`.
    #[must_use]
    pub fn textarea(id: impl Into<String>) -> Self {
        Self::new(id, "textarea", None)
    }

    /// `<div contenteditable>`.
    #[must_use]
    pub fn editable(id: impl Into<String>) -> Self {
        Self {
            content_editable: true,
            ..Self::new(id, "div", None)
        }
    }

    /// `<select>` with the given option values.
    #[must_use]
    pub fn dropdown(
        id: impl Into<String>,
        options: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            options: options.into_iter().map(Into::into).collect(),
            ..Self::new(id, "select", None)
        }
    }

    /// `<button>`.
    #[must_use]
    pub fn button(id: impl Into<String>) -> Self {
        Self::new(id, "button", None)
    }

    /// `<a href>`.
    #[must_use]
    pub fn link(id: impl Into<String>) -> Self {
        Self::new(id, "a", None)
    }

    /// Sets the `name` attribute.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the `placeholder` attribute.
    #[must_use]
    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    /// Sets the label text.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Not rendered until revealed.
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Hidden, and revealed by a toggle in its form field.
    #[must_use]
    pub fn behind_trigger(mut self) -> Self {
        self.visible = false;
        self.behind_trigger = true;
        self
    }

    /// Disabled control.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    fn describe(&self) -> DiscoveredElement {
        DiscoveredElement {
            locator: Locator::Id(self.id.clone()),
            tag: self.tag.clone(),
            input_type: self.input_type.clone(),
            id: Some(self.id.clone()),
            name: self.name.clone(),
            placeholder: self.placeholder.clone(),
            label: self.label.clone(),
            content_editable: self.content_editable,
            visible: self.visible,
        }
    }

    fn matches(&self, locator: &Locator) -> bool {
        match locator {
            Locator::Id(id) => self.id == *id,
            Locator::Name(name) => self.name.as_deref() == Some(name.as_str()),
            Locator::Css(css) => css.strip_prefix('#') == Some(self.id.as_str()),
            Locator::XPath(_) => false,
        }
    }

    /// Markup without the current value, as `outerHTML` would show it.
    fn markup(&self) -> String {
        let mut attrs = format!(" id=\"{}\"", self.id);
        if let Some(kind) = &self.input_type {
            attrs.push_str(&format!(" type=\"{kind}\""));
        }
        if let Some(name) = &self.name {
            attrs.push_str(&format!(" name=\"{name}\""));
        }
        if self.content_editable {
            attrs.push_str(" contenteditable=\"true\"");
        }
        if self.disabled {
            attrs.push_str(" disabled");
        }
        if !self.visible {
            attrs.push_str(" hidden");
        }

        match self.tag.as_str() {
            "input" => format!("<input{attrs}>"),
            "select" => {
                let options: String = self
                    .options
                    .iter()
                    .map(|o| format!("<option>{o}</option>"))
                    .collect();
                format!("<select{attrs}>{options}</select>")
            }
            tag => format!("<{tag}{attrs}></{tag}>"),
        }
    }
}

// ============================================================================
// MemoryFrame
// ============================================================================

/// A document: elements, nested frames and extra markup.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryFrame {
    id: FrameId,
    elements: Vec<MemoryElement>,
    frames: Vec<MemoryFrame>,
    accessible: bool,
    markup: Vec<String>,
}

impl MemoryFrame {
    /// An iframe with the given identifier.
    #[must_use]
    pub fn new(id: impl Into<FrameId>) -> Self {
        Self {
            id: id.into(),
            elements: Vec::new(),
            frames: Vec::new(),
            accessible: true,
            markup: Vec::new(),
        }
    }

    /// The top document.
    #[must_use]
    pub fn root() -> Self {
        Self::new("root")
    }

    /// Adds an element.
    #[must_use]
    pub fn element(mut self, element: MemoryElement) -> Self {
        self.elements.push(element);
        self
    }

    /// Adds a child frame.
    #[must_use]
    pub fn frame(mut self, frame: MemoryFrame) -> Self {
        self.frames.push(frame);
        self
    }

    /// Adds static markup.
    #[must_use]
    pub fn markup(mut self, markup: impl Into<String>) -> Self {
        self.markup.push(markup.into());
        self
    }

    /// Cross-origin: listed by its parent but cannot be entered.
    #[must_use]
    pub fn inaccessible(mut self) -> Self {
        self.accessible = false;
        self
    }

    fn child(&self, id: &FrameId) -> Option<&MemoryFrame> {
        self.frames.iter().find(|f| f.id == *id)
    }

    fn child_mut(&mut self, id: &FrameId) -> Option<&mut MemoryFrame> {
        self.frames.iter_mut().find(|f| f.id == *id)
    }

    fn element_mut(&mut self, id: &str) -> Option<&mut MemoryElement> {
        self.elements.iter_mut().find(|e| e.id == id)
    }

    fn render(&self) -> String {
        let mut out = String::from("<html><head></head><body>\n");
        for element in &self.elements {
            out.push_str(&element.markup());
            out.push('\n');
        }
        for frame in &self.frames {
            out.push_str(&format!("<iframe id=\"{}\"></iframe>\n", frame.id));
        }
        for extra in &self.markup {
            out.push_str(extra);
            out.push('\n');
        }
        out.push_str("</body></html>");
        out
    }
}

// ============================================================================
// Triggers
// ============================================================================

/// Side effect fired by a trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Uncaught script error.
    ScriptError(String),
    /// Console message.
    Console(LogLevel, String),
    /// Top-level navigation.
    Navigate(String),
    /// Markup appended to the element's document.
    AppendMarkup(String),
    /// Element removed from its document.
    RemoveElement(String),
    /// Child frame removed from the element's document.
    RemoveFrame(FrameId),
    /// Hidden element becomes visible.
    Show(String),
    /// Session becomes unusable.
    Disconnect,
}

impl Effect {
    /// Uncaught script error.
    #[must_use]
    pub fn script_error(message: impl Into<String>) -> Self {
        Self::ScriptError(message.into())
    }

    /// Console message.
    #[must_use]
    pub fn console(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Console(level, message.into())
    }

    /// Top-level navigation.
    #[must_use]
    pub fn navigate(url: impl Into<String>) -> Self {
        Self::Navigate(url.into())
    }

    /// Markup appended to the element's document.
    #[must_use]
    pub fn append_markup(markup: impl Into<String>) -> Self {
        Self::AppendMarkup(markup.into())
    }
}

#[derive(Debug, Clone)]
enum When {
    ValueContains(String),
    Click,
}

#[derive(Debug, Clone)]
struct Trigger {
    element: String,
    when: When,
    effect: Effect,
}

impl Trigger {
    fn fires(&self, element: &str, action: &Action) -> bool {
        if self.element != element {
            return false;
        }
        match (&self.when, action) {
            (When::Click, Action::Click) => true,
            (When::ValueContains(needle), Action::SetValue(v) | Action::SelectOption(v)) => {
                v.contains(needle.as_str())
            }
            _ => false,
        }
    }
}

/// Kind of injected element failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Locator matches nothing.
    NotFound,
    /// Element detached between lookup and use.
    Stale,
    /// Element present but not interactable.
    NotInteractable,
}

// ============================================================================
// MemoryPage
// ============================================================================

/// Scripted in-memory [`Session`].
#[derive(Debug)]
pub struct MemoryPage {
    id: SessionId,
    url: String,
    root: MemoryFrame,
    current: Vec<FrameId>,
    console: Vec<ConsoleEntry>,
    errors: Vec<JsErrorEntry>,
    triggers: Vec<Trigger>,
    failures: FxHashMap<String, (u32, FailureKind)>,
    attempts: FxHashMap<String, u32>,
    capture_failures: u32,
    captures_before_failure: u32,
    connected: bool,
}

impl MemoryPage {
    /// Creates a page at `url` with the given top document.
    #[must_use]
    pub fn new(url: impl Into<String>, root: MemoryFrame) -> Self {
        Self {
            id: SessionId::next(),
            url: url.into(),
            root,
            current: Vec::new(),
            console: Vec::new(),
            errors: Vec::new(),
            triggers: Vec::new(),
            failures: FxHashMap::default(),
            attempts: FxHashMap::default(),
            capture_failures: 0,
            captures_before_failure: 0,
            connected: true,
        }
    }

    /// Fires `effect` whenever `element` receives a value containing `needle`.
    #[must_use]
    pub fn on_value(
        mut self,
        element: impl Into<String>,
        needle: impl Into<String>,
        effect: Effect,
    ) -> Self {
        self.triggers.push(Trigger {
            element: element.into(),
            when: When::ValueContains(needle.into()),
            effect,
        });
        self
    }

    /// Fires `effect` whenever `element` is clicked.
    #[must_use]
    pub fn on_click(mut self, element: impl Into<String>, effect: Effect) -> Self {
        self.triggers.push(Trigger {
            element: element.into(),
            when: When::Click,
            effect,
        });
        self
    }

    /// Makes the next `times` element operations on `element` fail with `kind`.
    pub fn fail_interactions(&mut self, element: impl Into<String>, times: u32, kind: FailureKind) {
        self.failures.insert(element.into(), (times, kind));
    }

    /// Makes the next document capture fail.
    pub fn fail_next_capture(&mut self) {
        self.capture_failures += 1;
    }

    /// Lets `successes` document captures through, then fails the next one.
    pub fn fail_capture_after(&mut self, successes: u32) {
        self.captures_before_failure = successes;
        self.capture_failures += 1;
    }

    /// Drops the session: every later call fails with `ConnectionClosed`.
    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    /// Appends a console entry as page activity would.
    pub fn push_console(&mut self, level: LogLevel, message: impl Into<String>) {
        self.console.push(ConsoleEntry::now(level, message));
    }

    /// Appends a script error as page activity would.
    pub fn push_js_error(&mut self, message: impl Into<String>) {
        self.errors.push(JsErrorEntry::now(message));
    }

    /// Element operations attempted against a locator value.
    #[must_use]
    pub fn apply_attempts(&self, locator_value: &str) -> u32 {
        self.attempts.get(locator_value).copied().unwrap_or_default()
    }

    /// Current frame context as a path from the top document.
    #[must_use]
    pub fn current_frame_path(&self) -> &[FrameId] {
        &self.current
    }

    /// Current value of an element anywhere in the page.
    #[must_use]
    pub fn value_of(&self, element: &str) -> Option<&str> {
        fn search<'a>(frame: &'a MemoryFrame, element: &str) -> Option<&'a str> {
            frame
                .elements
                .iter()
                .find(|e| e.id == element)
                .map(|e| e.value.as_str())
                .or_else(|| frame.frames.iter().find_map(|f| search(f, element)))
        }
        search(&self.root, element)
    }

    /// Top-level URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(Error::ConnectionClosed)
        }
    }

    fn frame(&self) -> Result<&MemoryFrame> {
        let mut frame = &self.root;
        for id in &self.current {
            frame = frame
                .child(id)
                .ok_or_else(|| Error::frame_not_found(id.clone()))?;
        }
        Ok(frame)
    }

    fn frame_mut(&mut self) -> Result<&mut MemoryFrame> {
        let mut frame = &mut self.root;
        for id in &self.current {
            frame = frame
                .child_mut(id)
                .ok_or_else(|| Error::frame_not_found(id.clone()))?;
        }
        Ok(frame)
    }

    /// Counts the attempt, applies injected failures and resolves the element.
    fn resolve(&mut self, locator: &Locator) -> Result<&mut MemoryElement> {
        self.ensure_connected()?;
        *self.attempts.entry(locator.value().to_string()).or_default() += 1;

        if let Some((remaining, kind)) = self.failures.get_mut(locator.value())
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(match kind {
                FailureKind::NotFound => Error::element_not_found(locator),
                FailureKind::Stale => Error::stale_element(locator),
                FailureKind::NotInteractable => {
                    Error::not_interactable(locator, "obscured by another element")
                }
            });
        }

        self.frame_mut()?
            .elements
            .iter_mut()
            .find(|e| e.matches(locator))
            .ok_or_else(|| Error::element_not_found(locator))
    }

    fn fire(&mut self, effect: Effect) -> Result<()> {
        trace!(session_id = %self.id, ?effect, "Trigger fired");
        match effect {
            Effect::ScriptError(message) => self.push_js_error(message),
            Effect::Console(level, message) => self.push_console(level, message),
            Effect::Navigate(url) => self.url = url,
            Effect::AppendMarkup(markup) => self.frame_mut()?.markup.push(markup),
            Effect::RemoveElement(id) => self.frame_mut()?.elements.retain(|e| e.id != id),
            Effect::RemoveFrame(id) => self.frame_mut()?.frames.retain(|f| f.id != id),
            Effect::Show(id) => {
                if let Some(element) = self.frame_mut()?.element_mut(&id) {
                    element.visible = true;
                }
            }
            Effect::Disconnect => self.connected = false,
        }
        Ok(())
    }
}

// ============================================================================
// Session Implementation
// ============================================================================

#[async_trait]
impl Session for MemoryPage {
    fn id(&self) -> SessionId {
        self.id
    }

    async fn switch_to_root(&mut self) -> Result<()> {
        self.current.clear();
        Ok(())
    }

    async fn switch_to_child_frame(&mut self, frame: &FrameId) -> Result<()> {
        self.ensure_connected()?;
        let child = self
            .frame()?
            .child(frame)
            .ok_or_else(|| Error::frame_not_found(frame.clone()))?;

        if !child.accessible {
            return Err(Error::frame_inaccessible(frame.clone(), "cross-origin frame"));
        }

        self.current.push(frame.clone());
        Ok(())
    }

    async fn child_frames(&mut self) -> Result<Vec<FrameId>> {
        self.ensure_connected()?;
        Ok(self.frame()?.frames.iter().map(|f| f.id.clone()).collect())
    }

    async fn discover(&mut self) -> Result<Vec<DiscoveredElement>> {
        self.ensure_connected()?;
        Ok(self
            .frame()?
            .elements
            .iter()
            .map(MemoryElement::describe)
            .collect())
    }

    async fn apply(&mut self, locator: &Locator, action: &Action) -> Result<()> {
        let element = self.resolve(locator)?;

        if !element.visible {
            return Err(Error::not_interactable(locator, "element is not visible"));
        }
        if element.disabled {
            return Err(Error::not_interactable(locator, "element is disabled"));
        }

        match action {
            Action::SetValue(value) => element.value = value.clone(),
            Action::SelectOption(value) => {
                if element.tag != "select" {
                    return Err(Error::script_error("element is not a select"));
                }
                if !element.options.contains(value) {
                    return Err(Error::script_error(format!("no option {value:?}")));
                }
                element.value = value.clone();
            }
            Action::Click => {}
        }

        let element_id = element.id.clone();
        let effects: Vec<Effect> = self
            .triggers
            .iter()
            .filter(|t| t.fires(&element_id, action))
            .map(|t| t.effect.clone())
            .collect();

        for effect in effects {
            self.fire(effect)?;
        }
        Ok(())
    }

    async fn dropdown_options(&mut self, locator: &Locator) -> Result<Vec<String>> {
        let element = self.resolve(locator)?;
        if element.tag != "select" {
            return Err(Error::script_error("element is not a select"));
        }
        Ok(element.options.clone())
    }

    async fn reveal(&mut self, locator: &Locator) -> Result<RevealMethod> {
        let element = self.resolve(locator)?;
        if element.visible {
            return Ok(RevealMethod::AlreadyVisible);
        }

        element.visible = true;
        Ok(if element.behind_trigger {
            RevealMethod::Trigger
        } else {
            RevealMethod::Style
        })
    }

    async fn current_url(&mut self) -> Result<String> {
        self.ensure_connected()?;
        Ok(self.url.clone())
    }

    async fn page_source(&mut self) -> Result<String> {
        self.ensure_connected()?;
        if self.capture_failures > 0 {
            if self.captures_before_failure > 0 {
                self.captures_before_failure -= 1;
            } else {
                self.capture_failures -= 1;
                return Err(Error::script_error("document is unavailable"));
            }
        }
        Ok(self.frame()?.render())
    }

    async fn console_entries(&mut self, from: usize) -> Result<Vec<ConsoleEntry>> {
        self.ensure_connected()?;
        Ok(self.console.get(from..).map(<[_]>::to_vec).unwrap_or_default())
    }

    async fn js_errors(&mut self, from: usize) -> Result<Vec<JsErrorEntry>> {
        self.ensure_connected()?;
        Ok(self.errors.get(from..).map(<[_]>::to_vec).unwrap_or_default())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>> {
        self.ensure_connected()?;
        Ok(PNG_SIGNATURE.to_vec())
    }
}

// ============================================================================
// Tests
// ============================================================================
