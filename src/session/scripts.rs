//! Page scripts evaluated by the DevTools backend.
//!
//! Every builder returns a self-contained expression suitable for
//! `Runtime.evaluate` with `returnByValue` and `awaitPromise`. Element
//! operations resolve to `{status, reason?, ...}` objects:
//!
//! | Status | Meaning |
//! |--------|---------|
//! | `ok` | Operation applied |
//! | `missing` | Locator matched nothing |
//! | `detached` | Element is no longer connected to the document |
//! | `hidden` | Element is not rendered |
//! | `disabled` | Element is disabled |
//! | `invalid` | Operation does not apply to this element |
//! | `no-option` | Requested option does not exist |

// ============================================================================
// Imports
// ============================================================================

use super::{Action, Locator};

// ============================================================================
// Shared Helpers
// ============================================================================

/// Element lookup and visibility helpers shared by element scripts.
const PRELUDE: &str = r#"
const find = (strategy, value) => {
  switch (strategy) {
    case 'css': return document.querySelector(value);
    case 'id': return document.getElementById(value);
    case 'name': return document.getElementsByName(value)[0] || null;
    case 'xpath':
      return document.evaluate(value, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
  }
  return null;
};
const visible = (el) => {
  if (el.hidden) return false;
  const style = getComputedStyle(el);
  if (style.display === 'none' || style.visibility === 'hidden') return false;
  if (parseFloat(style.opacity || '1') === 0) return false;
  const rect = el.getBoundingClientRect();
  return rect.width > 0 || rect.height > 0;
};
"#;

/// Candidate collection for the current document.
const DISCOVER_BODY: &str = r#"
const xpathOf = (el) => {
  const parts = [];
  for (let node = el; node && node.nodeType === 1; node = node.parentNode) {
    let index = 1;
    for (let sib = node.previousElementSibling; sib; sib = sib.previousElementSibling) {
      if (sib.nodeName === node.nodeName) index++;
    }
    parts.unshift(node.nodeName.toLowerCase() + '[' + index + ']');
  }
  return '/' + parts.join('/');
};
const labelOf = (el) => {
  if (el.labels && el.labels.length) {
    const text = el.labels[0].innerText.trim();
    if (text) return text;
  }
  const aria = el.getAttribute('aria-label');
  if (aria) return aria;
  if (el.tagName === 'BUTTON' || el.tagName === 'A') {
    const text = (el.innerText || '').trim().slice(0, 80);
    if (text) return text;
  }
  if (el.tagName === 'INPUT' && (el.type === 'submit' || el.type === 'button') && el.value) {
    return el.value;
  }
  return null;
};
const nodes = document.querySelectorAll(
  "input, textarea, select, button, a[href], [contenteditable]:not([contenteditable='false'])"
);
return Array.from(nodes)
  .filter((el) => !(el.tagName === 'INPUT' && (el.getAttribute('type') || '').toLowerCase() === 'hidden'))
  .map((el) => ({
    locator: { strategy: 'xpath', value: xpathOf(el) },
    tag: el.tagName.toLowerCase(),
    inputType: el.tagName === 'INPUT' ? (el.getAttribute('type') || 'text').toLowerCase() : null,
    id: el.id || null,
    name: el.getAttribute('name'),
    placeholder: el.getAttribute('placeholder'),
    label: labelOf(el),
    contentEditable: el.isContentEditable && el.tagName !== 'INPUT' && el.tagName !== 'TEXTAREA',
    visible: visible(el),
  }));
"#;

/// Applies `action` to the element at `(strategy, value)`.
const APPLY_BODY: &str = r#"
const el = find(strategy, value);
if (!el) return { status: 'missing' };
if (!el.isConnected) return { status: 'detached' };
if (!visible(el)) return { status: 'hidden', reason: 'element is not visible' };
if (el.disabled) return { status: 'disabled', reason: 'element is disabled' };

const fire = (type) => el.dispatchEvent(new Event(type, { bubbles: true }));
const press = (key, code) => {
  for (const type of ['keydown', 'keypress', 'keyup']) {
    el.dispatchEvent(new KeyboardEvent(type, { key, code: key, keyCode: code, which: code, bubbles: true }));
  }
};
const assign = (text) => {
  const setter = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(el), 'value');
  if (setter && setter.set) setter.set.call(el, text); else el.value = text;
};

el.scrollIntoView({ block: 'center', inline: 'center' });

switch (action.kind) {
  case 'setValue':
    el.focus();
    if (el.isContentEditable && !('value' in el)) {
      el.textContent = '';
      el.textContent = action.value;
    } else {
      assign('');
      fire('input');
      assign(action.value);
    }
    fire('input');
    fire('change');
    press('Tab', 9);
    press('Enter', 13);
    return { status: 'ok' };
  case 'selectOption': {
    if (el.tagName !== 'SELECT') return { status: 'invalid', reason: 'element is not a select' };
    const option = Array.from(el.options).find((o) => o.value === action.value || o.text === action.value);
    if (!option) return { status: 'no-option', reason: 'no option ' + JSON.stringify(action.value) };
    el.value = option.value;
    fire('input');
    fire('change');
    return { status: 'ok' };
  }
  case 'click':
    el.click();
    return { status: 'ok' };
}
return { status: 'invalid', reason: 'unknown action ' + action.kind };
"#;

/// Makes a hidden element visible: container trigger first, styles second.
const REVEAL_BODY: &str = r#"
const el = find(strategy, value);
if (!el) return { status: 'missing' };
if (!el.isConnected) return { status: 'detached' };
if (visible(el)) return { status: 'ok', method: 'already-visible' };

const container = el.closest('.mat-form-field, .form-group, .input-container, .input-item, form');
if (container) {
  const trigger = Array.from(
    container.querySelectorAll("mat-icon, button, a, [role='button'], .search-icon")
  ).find((t) => t !== el && visible(t));
  if (trigger) {
    trigger.click();
    await new Promise((resolve) => setTimeout(resolve, 100));
    if (visible(el)) return { status: 'ok', method: 'trigger' };
  }
}

el.style.display = 'block';
el.style.visibility = 'visible';
el.style.opacity = '1';
el.removeAttribute('hidden');
if (visible(el)) return { status: 'ok', method: 'style' };
return { status: 'hidden', reason: 'element stays hidden after style reveal' };
"#;

/// Lists the option values of a `<select>`.
const OPTIONS_BODY: &str = r#"
const el = find(strategy, value);
if (!el) return { status: 'missing' };
if (!el.isConnected) return { status: 'detached' };
if (el.tagName !== 'SELECT') return { status: 'invalid', reason: 'element is not a select' };
return { status: 'ok', options: Array.from(el.options).map((o) => o.value || o.text) };
"#;

// ============================================================================
// Log Hook
// ============================================================================

/// In-page console and error recorder, installed once per document.
pub(crate) const HOOK: &str = r#"
(() => {
  if (window.__pageFuzzerHook) return;
  const hook = (window.__pageFuzzerHook = { console: [], errors: [] });
  const text = (arg) => {
    if (typeof arg === 'string') return arg;
    try {
      const json = JSON.stringify(arg);
      return json === undefined ? String(arg) : json;
    } catch (_) {
      return String(arg);
    }
  };
  const levels = { debug: 'debug', log: 'log', info: 'info', warn: 'warning', error: 'error' };
  for (const [method, level] of Object.entries(levels)) {
    const original = console[method];
    console[method] = function (...args) {
      hook.console.push({ level, message: args.map(text).join(' '), timestamp: Date.now() });
      return original.apply(this, args);
    };
  }
  window.addEventListener('error', (event) => {
    hook.errors.push({
      message: event.message || String(event.error || 'error'),
      source: event.filename || null,
      line: event.lineno || null,
      timestamp: Date.now(),
    });
  });
  window.addEventListener('unhandledrejection', (event) => {
    hook.errors.push({
      message: 'Unhandled rejection: ' + text(event.reason),
      source: null,
      line: null,
      timestamp: Date.now(),
    });
  });
})()
"#;

/// Takes everything the hook has recorded in this document.
pub(crate) const DRAIN_HOOK: &str = r#"
(() => {
  const hook = window.__pageFuzzerHook;
  if (!hook) return { console: [], errors: [] };
  return { console: hook.console.splice(0), errors: hook.errors.splice(0) };
})()
"#;

// ============================================================================
// Page State
// ============================================================================

/// Top-level URL as seen from the current document.
pub(crate) const CURRENT_URL: &str = "location.href";

/// Outer HTML of the current document.
pub(crate) const PAGE_SOURCE: &str =
    "document.documentElement ? document.documentElement.outerHTML : ''";

// ============================================================================
// Builders
// ============================================================================

/// Collects candidate elements of the current document.
pub(crate) fn discover() -> String {
    format!("(() => {{{}{}}})()", PRELUDE, DISCOVER_BODY)
}

/// Applies an action to one element.
pub(crate) fn apply(locator: &Locator, action: &Action) -> String {
    let action = serde_json::to_string(action).unwrap_or_else(|_| "null".to_string());
    element_script(APPLY_BODY, locator, &action)
}

/// Reveals one hidden element.
pub(crate) fn reveal(locator: &Locator) -> String {
    element_script(REVEAL_BODY, locator, "null")
}

/// Lists dropdown options of one element.
pub(crate) fn options(locator: &Locator) -> String {
    element_script(OPTIONS_BODY, locator, "null")
}

fn element_script(body: &str, locator: &Locator, action: &str) -> String {
    format!(
        "(async (strategy, value, action) => {{{}{}}})({}, {}, {})",
        PRELUDE,
        body,
        json_string(locator.strategy()),
        json_string(locator.value()),
        action
    )
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Escapes a string for safe use in JavaScript.
pub(crate) fn json_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_string_escapes_quotes() {
        assert_eq!(json_string(r#"a"b"#), r#""a\"b""#);
        assert_eq!(json_string("' OR 1=1 --"), r#""' OR 1=1 --""#);
    }

    #[test]
    fn test_apply_embeds_locator_and_action() {
        let script = apply(
            &Locator::xpath("/html[1]/body[1]/input[1]"),
            &Action::SetValue("<script>alert('XSS')</script>".into()),
        );

        assert!(script.starts_with("(async (strategy, value, action) => {"));
        assert!(script.ends_with(
            r#"("xpath", "/html[1]/body[1]/input[1]", {"kind":"setValue","value":"<script>alert('XSS')</script>"})"#
        ));
    }

    #[test]
    fn test_click_action_has_no_value() {
        let script = apply(&Locator::id("go"), &Action::Click);
        assert!(script.ends_with(r#"("id", "go", {"kind":"click"})"#));
    }

    #[test]
    fn test_reveal_and_options_pass_null_action() {
        assert!(reveal(&Locator::name("q")).ends_with(r#"("name", "q", null)"#));
        assert!(options(&Locator::css("select")).ends_with(r#"("css", "select", null)"#));
    }

    #[test]
    fn test_discover_is_an_iife() {
        let script = discover();
        assert!(script.starts_with("(() => {"));
        assert!(script.ends_with("})()"));
        assert!(script.contains("xpathOf"));
    }
}
