//! Frame-aware element inventory.
//!
//! [`InventoryBuilder::build`] walks the top document and every reachable
//! iframe breadth-first and flattens the candidate controls into
//! [`ElementRecord`]s. Each record is a description (locator + frame path),
//! never a live handle.
//!
//! # Traversal Order
//!
//! ```text
//! queue: []            → discover top document, queue its child frames
//! queue: [a], [b]      → discover a, queue [a, a1]
//! queue: [b], [a, a1]  → discover b
//! queue: [a, a1]       → discover a1
//! ```
//!
//! Within a document, records follow document order.
//!
//! # Failure Handling
//!
//! | Failure | Effect |
//! |---------|--------|
//! | Frame cannot be entered | Subtree skipped, inventory marked partial |
//! | Discovery fails inside a frame | Frame skipped, inventory marked partial |
//! | Frame deeper than the depth limit | Subtree skipped, inventory marked partial |
//! | Session unusable | Build aborts with the error |

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::session::{Action, DiscoveredElement, Locator, Session};

use super::frames::{FrameNavigator, FramePath};

// ============================================================================
// Constants
// ============================================================================

/// Frames nested deeper than this are not visited; they are reported as
/// skipped.
pub const MAX_FRAME_DEPTH: usize = 8;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// ElementRole
// ============================================================================

/// What kind of control an element is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementRole {
    /// Single-line text-like `<input>`.
    TextInput,
    /// `<textarea>`.
    TextArea,
    /// Editable non-form element.
    ContentEditable,
    /// `<select>`.
    Dropdown,
    /// `<button>` or button-like `<input>`.
    Button,
    /// `<a href>`.
    Link,
    /// Checkbox or radio.
    Toggle,
}

impl ElementRole {
    /// Classifies a discovered element; `None` for controls that take no input.
    #[must_use]
    pub fn classify(element: &DiscoveredElement) -> Option<Self> {
        if element.content_editable {
            return Some(Self::ContentEditable);
        }

        match element.tag.as_str() {
            "textarea" => Some(Self::TextArea),
            "select" => Some(Self::Dropdown),
            "button" => Some(Self::Button),
            "a" => Some(Self::Link),
            "input" => match element.input_type.as_deref().unwrap_or("text") {
                "hidden" | "file" | "image" | "range" | "color" => None,
                "submit" | "button" | "reset" => Some(Self::Button),
                "checkbox" | "radio" => Some(Self::Toggle),
                _ => Some(Self::TextInput),
            },
            _ => None,
        }
    }

    /// Accepts typed payloads.
    #[inline]
    #[must_use]
    pub fn is_text_entry(self) -> bool {
        matches!(self, Self::TextInput | Self::TextArea | Self::ContentEditable)
    }

    /// Acted on by clicking.
    #[inline]
    #[must_use]
    pub fn is_clickable(self) -> bool {
        matches!(self, Self::Button | Self::Link | Self::Toggle)
    }

    /// The action that applies `payload` to an element of this role.
    #[must_use]
    pub fn action_for(self, payload: &str) -> Action {
        match self {
            Self::TextInput | Self::TextArea | Self::ContentEditable => {
                Action::SetValue(payload.to_string())
            }
            Self::Dropdown => Action::SelectOption(payload.to_string()),
            Self::Button | Self::Link | Self::Toggle => Action::Click,
        }
    }

    /// Short lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TextInput => "text-input",
            Self::TextArea => "text-area",
            Self::ContentEditable => "content-editable",
            Self::Dropdown => "dropdown",
            Self::Button => "button",
            Self::Link => "link",
            Self::Toggle => "toggle",
        }
    }
}

impl fmt::Display for ElementRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ElementRecord
// ============================================================================

/// Description of one candidate element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementRecord {
    /// Locator within the owning document.
    pub locator: Locator,
    /// Frames from the top document to the owning document.
    pub frame_path: FramePath,
    /// Control kind.
    pub role: ElementRole,
    /// Best-effort human-readable name.
    pub display_name: Option<String>,
    /// Rendered at discovery time.
    pub visible: bool,
}

impl ElementRecord {
    /// Display name, or the locator when none is known.
    #[must_use]
    pub fn label(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| self.locator.to_string())
    }
}

// ============================================================================
// Inventory
// ============================================================================

/// Result of one inventory build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    generation: u64,
    elements: Vec<ElementRecord>,
    partial: bool,
    skipped_frames: Vec<FramePath>,
}

impl Inventory {
    /// Build counter; records from different generations must not be mixed.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Records in traversal order.
    #[inline]
    #[must_use]
    pub fn elements(&self) -> &[ElementRecord] {
        &self.elements
    }

    /// Number of records.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns `true` if nothing was found.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Returns `true` if some frame subtree could not be inspected.
    #[inline]
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// Frames that were skipped.
    #[inline]
    #[must_use]
    pub fn skipped_frames(&self) -> &[FramePath] {
        &self.skipped_frames
    }

    /// Records of one role.
    pub fn by_role(&self, role: ElementRole) -> impl Iterator<Item = &ElementRecord> {
        self.elements.iter().filter(move |e| e.role == role)
    }

    /// Numbered lines for a manual selection prompt.
    ///
    /// ```text
    /// [0] Email (text-input) frame=[]
    /// [1] country (dropdown) frame=[iframe-1] hidden
    /// ```
    #[must_use]
    pub fn describe(&self) -> Vec<String> {
        self.elements
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let mut line = format!("[{i}] {} ({}) frame={}", e.label(), e.role, e.frame_path);
                if !e.visible {
                    line.push_str(" hidden");
                }
                line
            })
            .collect()
    }

    /// Records at the given indices; out-of-range indices are ignored.
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Vec<ElementRecord> {
        indices
            .iter()
            .filter_map(|&i| self.elements.get(i).cloned())
            .collect()
    }
}

// ============================================================================
// InventoryBuilder
// ============================================================================

/// Builds inventories by breadth-first frame traversal.
#[derive(Debug, Clone)]
pub struct InventoryBuilder {
    max_depth: usize,
}

impl Default for InventoryBuilder {
    fn default() -> Self {
        Self {
            max_depth: MAX_FRAME_DEPTH,
        }
    }
}

impl InventoryBuilder {
    /// Creates a builder with the default depth limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum frame nesting depth.
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Walks the page and returns its inventory.
    ///
    /// The session is back at the top document when this returns.
    ///
    /// # Errors
    ///
    /// Returns the error only if the session itself becomes unusable;
    /// everything else degrades to a partial inventory.
    pub async fn build<S>(&self, nav: &mut FrameNavigator, session: &mut S) -> Result<Inventory>
    where
        S: Session + ?Sized,
    {
        let result = self.walk(nav, session).await;
        nav.reset_to_root(session).await;
        result
    }

    async fn walk<S>(&self, nav: &mut FrameNavigator, session: &mut S) -> Result<Inventory>
    where
        S: Session + ?Sized,
    {
        let mut inventory = Inventory {
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            elements: Vec::new(),
            partial: false,
            skipped_frames: Vec::new(),
        };
        let mut seen: FxHashSet<(Locator, FramePath)> = FxHashSet::default();
        let mut queue = VecDeque::from([FramePath::root()]);

        while let Some(path) = queue.pop_front() {
            if let Err(e) = nav.enter(session, &path).await {
                if e.is_session_fatal() {
                    return Err(e);
                }
                warn!(frame_path = %path, error = %e, "Skipping frame");
                inventory.skip(path);
                continue;
            }

            let discovered = match session.discover().await {
                Ok(discovered) => discovered,
                Err(e) if e.is_session_fatal() => return Err(e),
                Err(e) => {
                    warn!(frame_path = %path, error = %e, "Discovery failed");
                    inventory.skip(path);
                    continue;
                }
            };

            let before = inventory.elements.len();
            for element in discovered {
                let Some(role) = ElementRole::classify(&element) else {
                    continue;
                };
                if !seen.insert((element.locator.clone(), path.clone())) {
                    continue;
                }
                inventory.elements.push(ElementRecord {
                    display_name: element.display_name(),
                    locator: element.locator,
                    frame_path: path.clone(),
                    role,
                    visible: element.visible,
                });
            }
            debug!(
                frame_path = %path,
                found = inventory.elements.len() - before,
                "Frame inspected"
            );

            match session.child_frames().await {
                Ok(children) if path.depth() >= self.max_depth => {
                    for child in children {
                        let child = path.child(child);
                        warn!(frame_path = %child, max_depth = self.max_depth, "Frame too deep");
                        inventory.skip(child);
                    }
                }
                Ok(children) => queue.extend(children.into_iter().map(|f| path.child(f))),
                Err(e) if e.is_session_fatal() => return Err(e),
                Err(e) => {
                    warn!(frame_path = %path, error = %e, "Child frames unavailable");
                    inventory.partial = true;
                }
            }
        }

        info!(
            generation = inventory.generation,
            elements = inventory.elements.len(),
            partial = inventory.partial,
            "Inventory built"
        );
        Ok(inventory)
    }
}

impl Inventory {
    fn skip(&mut self, path: FramePath) {
        self.partial = true;
        self.skipped_frames.push(path);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::identifiers::FrameId;
    use crate::session::{MemoryElement, MemoryFrame, MemoryPage};

    fn discovered(tag: &str, input_type: Option<&str>) -> DiscoveredElement {
        DiscoveredElement {
            locator: Locator::id("x"),
            tag: tag.into(),
            input_type: input_type.map(Into::into),
            id: None,
            name: None,
            placeholder: None,
            label: None,
            content_editable: false,
            visible: true,
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            ElementRole::classify(&discovered("input", Some("email"))),
            Some(ElementRole::TextInput)
        );
        assert_eq!(
            ElementRole::classify(&discovered("input", Some("submit"))),
            Some(ElementRole::Button)
        );
        assert_eq!(ElementRole::classify(&discovered("input", Some("hidden"))), None);
        assert_eq!(
            ElementRole::classify(&discovered("select", None)),
            Some(ElementRole::Dropdown)
        );
        assert_eq!(ElementRole::classify(&discovered("div", None)), None);
    }

    #[test]
    fn test_action_for_role() {
        assert_eq!(
            ElementRole::TextArea.action_for("p"),
            Action::SetValue("p".into())
        );
        assert_eq!(
            ElementRole::Dropdown.action_for("de"),
            Action::SelectOption("de".into())
        );
        assert_eq!(ElementRole::Link.action_for("ignored"), Action::Click);
    }

    #[tokio::test]
    async fn test_breadth_first_order() {
        let mut page = MemoryPage::new(
            "https://example.test/",
            MemoryFrame::root()
                .element(MemoryElement::text_input("top"))
                .frame(
                    MemoryFrame::new("a")
                        .element(MemoryElement::text_input("in-a"))
                        .frame(MemoryFrame::new("a1").element(MemoryElement::text_input("in-a1"))),
                )
                .frame(MemoryFrame::new("b").element(MemoryElement::text_input("in-b"))),
        );

        let inventory = InventoryBuilder::new()
            .build(&mut FrameNavigator::new(), &mut page)
            .await
            .unwrap();

        let order: Vec<_> = inventory
            .elements()
            .iter()
            .map(|e| e.locator.value().to_string())
            .collect();
        assert_eq!(order, ["top", "in-a", "in-b", "in-a1"]);
        assert!(!inventory.is_partial());
        assert!(page.current_frame_path().is_empty());
    }

    #[tokio::test]
    async fn test_inaccessible_frame_marks_partial() {
        let mut page = MemoryPage::new(
            "https://example.test/",
            MemoryFrame::root()
                .element(MemoryElement::text_input("q"))
                .frame(MemoryFrame::new("ads").inaccessible()),
        );

        let inventory = InventoryBuilder::new()
            .build(&mut FrameNavigator::new(), &mut page)
            .await
            .unwrap();

        assert_eq!(inventory.len(), 1);
        assert!(inventory.is_partial());
        assert_eq!(inventory.skipped_frames()[0].to_string(), "[ads]");
    }

    #[tokio::test]
    async fn test_duplicates_keep_first() {
        let mut page = MemoryPage::new(
            "https://example.test/",
            MemoryFrame::root()
                .element(MemoryElement::text_input("q").with_label("first"))
                .element(MemoryElement::text_input("q").with_label("second")),
        );

        let inventory = InventoryBuilder::new()
            .build(&mut FrameNavigator::new(), &mut page)
            .await
            .unwrap();

        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory.elements()[0].display_name.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let mut page = MemoryPage::new(
            "https://example.test/",
            MemoryFrame::root().frame(
                MemoryFrame::new("a")
                    .frame(MemoryFrame::new("b").element(MemoryElement::text_input("deep"))),
            ),
        );

        let inventory = InventoryBuilder::new()
            .with_max_depth(1)
            .build(&mut FrameNavigator::new(), &mut page)
            .await
            .unwrap();

        assert!(inventory.is_empty());
        assert!(inventory.is_partial());
        assert_eq!(
            inventory.skipped_frames(),
            &[FramePath::root()
                .child(FrameId::new("a"))
                .child(FrameId::new("b"))]
        );
    }

    #[tokio::test]
    async fn test_depth_limit_without_deeper_frames_is_complete() {
        let mut page = MemoryPage::new(
            "https://example.test/",
            MemoryFrame::root().frame(MemoryFrame::new("a").element(MemoryElement::text_input("q"))),
        );

        let inventory = InventoryBuilder::new()
            .with_max_depth(1)
            .build(&mut FrameNavigator::new(), &mut page)
            .await
            .unwrap();

        assert_eq!(inventory.len(), 1);
        assert!(!inventory.is_partial());
    }

    #[tokio::test]
    async fn test_describe_and_select() {
        let mut page = MemoryPage::new(
            "https://example.test/",
            MemoryFrame::root()
                .element(MemoryElement::text_input("email").with_label("Email"))
                .element(MemoryElement::button("go").hidden()),
        );

        let inventory = InventoryBuilder::new()
            .build(&mut FrameNavigator::new(), &mut page)
            .await
            .unwrap();

        assert_eq!(
            inventory.describe(),
            vec![
                "[0] Email (text-input) frame=[]".to_string(),
                "[1] go (button) frame=[] hidden".to_string(),
            ]
        );
        let picked = inventory.select(&[1, 7]);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].role, ElementRole::Button);
    }

    #[tokio::test]
    async fn test_disconnected_session_aborts_build() {
        let mut page = MemoryPage::new("https://example.test/", MemoryFrame::root());
        page.disconnect();

        let err = InventoryBuilder::new()
            .build(&mut FrameNavigator::new(), &mut page)
            .await
            .unwrap_err();
        assert!(err.is_session_fatal());
    }
}
