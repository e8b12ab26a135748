//! Page analysis scripts.
//!
//! Each script is a self-invoking expression evaluated in the page that
//! returns a JSON object deserializable into [`PageStructure`]. Scripts
//! start with [`ANALYZE_SCRIPT_TAG`] so drivers and logs can tell them
//! apart from fill actions.
//!
//! [`PageStructure`]: formscout_protocols::PageStructure

use formscout_protocols::{ANALYZE_SCRIPT_TAG, AnalysisStrategy};

const HELPERS: &str = r#"
  const cssPath = (el) => {
    if (el.id) return '#' + CSS.escape(el.id);
    const parts = [];
    let node = el;
    while (node && node.nodeType === 1 && parts.length < 5) {
      let part = node.tagName.toLowerCase();
      if (node.id) { parts.unshift('#' + CSS.escape(node.id)); break; }
      const parent = node.parentElement;
      if (parent) {
        const same = Array.from(parent.children).filter(c => c.tagName === node.tagName);
        if (same.length > 1) part += ':nth-of-type(' + (same.indexOf(node) + 1) + ')';
      }
      parts.unshift(part);
      node = parent;
    }
    return parts.join(' > ');
  };
  const visible = (el) => {
    const style = window.getComputedStyle(el);
    const rect = el.getBoundingClientRect();
    return style.display !== 'none' && style.visibility !== 'hidden' && rect.width > 0 && rect.height > 0;
  };
  const labelFor = (el) => {
    if (el.id) {
      const label = document.querySelector('label[for="' + CSS.escape(el.id) + '"]');
      if (label) return label.innerText.trim();
    }
    const wrapping = el.closest('label');
    if (wrapping) return wrapping.innerText.trim();
    const fieldset = el.closest('fieldset');
    const legend = fieldset && fieldset.querySelector('legend');
    return legend ? legend.innerText.trim() : null;
  };
  const FIELD_SELECTOR = 'input:not([type=hidden]):not([type=submit]):not([type=button]), select, textarea';
  const describeField = (el) => ({
    tag: el.tagName.toLowerCase(),
    inputType: (el.getAttribute('type') || '').toLowerCase(),
    name: el.getAttribute('name'),
    id: el.id || null,
    label: labelFor(el),
    placeholder: el.getAttribute('placeholder'),
    ariaLabel: el.getAttribute('aria-label'),
    cssPath: cssPath(el),
    required: el.required || el.getAttribute('aria-required') === 'true',
    visible: visible(el),
    options: el.tagName === 'SELECT'
      ? Array.from(el.options).map(o => o.text.trim()).filter(t => t.length > 0)
      : (el.type === 'radio' || el.type === 'checkbox') && el.name
        ? Array.from(document.getElementsByName(el.name)).map(o => (labelFor(o) || o.value || '').trim())
        : []
  });
  const formRoots = () => {
    const forms = Array.from(document.forms);
    if (forms.length > 0) return forms;
    const loose = document.querySelectorAll(FIELD_SELECTOR);
    return loose.length > 0 ? [document.body] : [];
  };
  const describeForm = (form, withFields) => {
    const submit = form.querySelector('button[type=submit], input[type=submit], button:not([type])');
    const seen = new Set();
    const fields = withFields
      ? Array.from(form.querySelectorAll(FIELD_SELECTOR)).filter(el => {
          if ((el.type === 'radio' || el.type === 'checkbox') && el.name) {
            if (seen.has(el.name)) return false;
            seen.add(el.name);
          }
          return true;
        }).map(describeField)
      : [];
    return {
      selector: form === document.body ? 'body' : cssPath(form),
      action: form.getAttribute ? form.getAttribute('action') : null,
      method: form.getAttribute ? form.getAttribute('method') : null,
      fields,
      submitSelector: submit ? cssPath(submit) : null
    };
  };
  const markers = () => {
    const found = new Set();
    const generator = document.querySelector('meta[name=generator]');
    if (generator && generator.content) found.add(generator.content.toLowerCase());
    const needles = ['typeform', 'surveymonkey', 'freebirdform', 'qualtrics', 'jotform', 'office-form', 'wufoo', 'formstack'];
    const html = document.documentElement.outerHTML.slice(0, 200000).toLowerCase();
    for (const needle of needles) if (html.includes(needle)) found.add(needle);
    return Array.from(found);
  };
  const scriptSources = () => Array.from(document.scripts).map(s => s.src).filter(s => s.length > 0).slice(0, 50);
  const hasCaptcha = () => !!document.querySelector('.g-recaptcha, .h-captcha, iframe[src*="recaptcha"], iframe[src*="hcaptcha"], [data-sitekey]');
  const multiStep = () => !!document.querySelector('[class*="progress"], [class*="step"], [data-step], button[name*="next" i]');
  const fieldCount = () => document.querySelectorAll(FIELD_SELECTOR).length;
"#;

const COMPREHENSIVE: &str = r#"
  return {
    url: location.href,
    title: document.title,
    forms: formRoots().map(f => describeForm(f, true)),
    scriptSources: scriptSources(),
    markers: markers(),
    hasCaptcha: hasCaptcha(),
    multiStep: multiStep(),
    iframeCount: document.querySelectorAll('iframe').length
  };
"#;

const FORM_FOCUSED: &str = r#"
  return {
    url: location.href,
    title: document.title,
    forms: formRoots().map(f => describeForm(f, true))
  };
"#;

const PATTERN_DETECTION: &str = r#"
  return {
    url: location.href,
    title: document.title,
    forms: formRoots().map(f => describeForm(f, false)),
    scriptSources: scriptSources(),
    markers: markers(),
    fieldCountHint: fieldCount()
  };
"#;

const QUICK: &str = r#"
  return {
    url: location.href,
    title: document.title,
    forms: formRoots().map(f => describeForm(f, false)),
    iframeCount: document.querySelectorAll('iframe').length,
    fieldCountHint: fieldCount()
  };
"#;

/// The script that implements `strategy`.
pub fn analysis_script(strategy: AnalysisStrategy) -> String {
    let body = match strategy {
        AnalysisStrategy::Comprehensive => COMPREHENSIVE,
        AnalysisStrategy::FormFocused => FORM_FOCUSED,
        AnalysisStrategy::PatternDetection => PATTERN_DETECTION,
        AnalysisStrategy::Quick => QUICK,
    };
    format!("{}\n(() => {{{}{}}})()", ANALYZE_SCRIPT_TAG, HELPERS, body)
}
