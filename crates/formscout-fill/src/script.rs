//! In-page fill and submit scripts.

use serde_json::json;

use formscout_protocols::BrowserError;

use crate::plan::SelectorCandidate;
use crate::response::FillValue;

pub(crate) const FILL_SCRIPT_TAG: &str = "/* formscout:fill */";

const RUNTIME: &str = r#"
  const locate = (family, key) => {
    switch (family) {
      case 'id': return document.getElementById(key);
      case 'name': return document.getElementsByName(key)[0] || null;
      case 'aria_label': return document.querySelector('[aria-label="' + CSS.escape(key) + '"]');
      case 'placeholder': return document.querySelector('[placeholder="' + CSS.escape(key) + '"]');
      case 'css_path': return document.querySelector(key);
      case 'label': {
        const label = Array.from(document.querySelectorAll('label, legend'))
          .find(l => l.innerText.trim() === key);
        if (!label) return null;
        if (label.htmlFor) return document.getElementById(label.htmlFor);
        return label.querySelector('input, select, textarea')
          || (label.closest('fieldset') && label.closest('fieldset').querySelector('input, select, textarea'));
      }
      default: return null;
    }
  };
  const visible = (el) => {
    const style = window.getComputedStyle(el);
    const rect = el.getBoundingClientRect();
    return style.display !== 'none' && style.visibility !== 'hidden' && rect.width > 0 && rect.height > 0;
  };
  const fire = (el) => {
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
  };
  const optionText = (el) => {
    const label = el.id && document.querySelector('label[for="' + CSS.escape(el.id) + '"]');
    return ((label && label.innerText) || (el.closest('label') && el.closest('label').innerText) || el.value || '').trim();
  };
  const group = (el) => el.name ? Array.from(document.getElementsByName(el.name)) : [el];
  const pick = (el, wanted) => {
    const lower = wanted.map(w => String(w).toLowerCase());
    if (el.tagName === 'SELECT') {
      const option = Array.from(el.options).find(o => lower.includes(o.text.trim().toLowerCase()));
      if (!option) return false;
      el.value = option.value;
      fire(el);
      return true;
    }
    let hit = false;
    for (const input of group(el)) {
      if (lower.includes(optionText(input).toLowerCase()) && !input.checked) {
        input.click();
        hit = true;
      } else if (lower.includes(optionText(input).toLowerCase())) {
        hit = true;
      }
    }
    return hit;
  };
"#;

const FILL: &str = r#"
  const el = locate(spec.family, spec.key);
  if (!el) return { ok: false, reason: 'not_found' };
  if (!visible(el) && el.type !== 'radio' && el.type !== 'checkbox') return { ok: false, reason: 'not_visible' };
  el.scrollIntoView({ block: 'center' });
  const value = spec.value;
  switch (value.type) {
    case 'text':
    case 'number':
      el.focus();
      el.value = String(value.value);
      fire(el);
      return { ok: true };
    case 'choice':
      return pick(el, [value.value]) ? { ok: true } : { ok: false, reason: 'option_missing' };
    case 'choices':
      return pick(el, value.value) ? { ok: true } : { ok: false, reason: 'option_missing' };
    case 'toggle':
      if (el.checked !== value.value) el.click();
      return { ok: true };
    default:
      return { ok: false, reason: 'unsupported_value' };
  }
"#;

const SUBMIT: &str = r#"
  const button = spec.selector ? document.querySelector(spec.selector) : null;
  if (button) {
    if (!visible(button)) return { ok: false, reason: 'not_visible' };
    button.click();
    return { ok: true };
  }
  const form = spec.form ? document.querySelector(spec.form) : document.forms[0];
  if (!form || typeof form.requestSubmit !== 'function') return { ok: false, reason: 'not_found' };
  form.requestSubmit();
  return { ok: true };
"#;

fn wrap(spec: serde_json::Value, body: &str) -> String {
    format!(
        "{}\n(() => {{ const spec = {};{}{}}})()",
        FILL_SCRIPT_TAG, spec, RUNTIME, body
    )
}

pub(crate) fn fill_script(candidate: &SelectorCandidate, value: &FillValue) -> String {
    wrap(
        json!({
            "family": candidate.family.as_str(),
            "key": candidate.key,
            "value": value,
        }),
        FILL,
    )
}

pub(crate) fn submit_script(submit_selector: Option<&str>, form_selector: Option<&str>) -> String {
    wrap(json!({ "selector": submit_selector, "form": form_selector }), SUBMIT)
}

/// Interpret the `{ok, reason}` object a fill or submit script returns.
pub(crate) fn parse_result(value: &serde_json::Value) -> Result<(), BrowserError> {
    if value.get("ok").and_then(|v| v.as_bool()) == Some(true) {
        return Ok(());
    }
    let reason = value
        .get("reason")
        .and_then(|v| v.as_str())
        .unwrap_or("unexpected script result");
    match reason {
        "not_visible" => Err(BrowserError::NotVisible(reason.to_string())),
        _ => Err(BrowserError::ElementInteraction(reason.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selectors::SelectorFamily;

    #[test]
    fn test_fill_script_embeds_spec_as_json() {
        let candidate = SelectorCandidate {
            family: SelectorFamily::Label,
            key: "Your \"nick\" name".to_string(),
        };
        let script = fill_script(&candidate, &FillValue::Text("Alex".to_string()));
        assert!(script.starts_with(FILL_SCRIPT_TAG));
        assert!(script.contains(r#""family":"label""#));
        assert!(script.contains(r#"Your \"nick\" name"#));
        assert!(script.contains(r#""value":{"type":"text","value":"Alex"}"#));
    }

    #[test]
    fn test_submit_script() {
        let script = submit_script(Some("#send"), None);
        assert!(script.contains(r##""selector":"#send""##));
        assert!(script.contains(r#""form":null"#));
    }

    #[test]
    fn test_parse_result() {
        assert!(parse_result(&json!({"ok": true})).is_ok());
        assert!(matches!(
            parse_result(&json!({"ok": false, "reason": "not_visible"})),
            Err(BrowserError::NotVisible(_))
        ));
        assert!(matches!(
            parse_result(&json!({"ok": false, "reason": "not_found"})),
            Err(BrowserError::ElementInteraction(_))
        ));
        assert!(matches!(
            parse_result(&json!("weird")),
            Err(BrowserError::ElementInteraction(_))
        ));
    }
}
