use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::OrchestratorError;
use crate::name_parts::extract_name_parts_with_prefix;

/// `(template_type, part, reminder_type, stage)`. `part` is always
/// `"subject"` or `"body"`.
pub type TemplateKey = (String, String, Option<String>, Option<String>);

/// Holds the static subject/body table and resolves a key through the
/// fallback hierarchy described in the resolver's design notes.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    templates: HashMap<TemplateKey, String>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self { templates: HashMap::new() }
    }

    pub fn insert(
        &mut self,
        template_type: impl Into<String>,
        part: impl Into<String>,
        reminder_type: Option<String>,
        stage: Option<String>,
        body: impl Into<String>,
    ) {
        self.templates.insert((template_type.into(), part.into(), reminder_type, stage), body.into());
    }

    /// Resolves a template body, falling back through progressively
    /// more generic keys:
    /// `(type,part,reminder,stage) -> (type,part,None,stage) ->
    /// (type,part,reminder,None) -> (type,part,None,None)`.
    ///
    /// If `stage` looks like a reminder token (`reminder...`) and no
    /// `reminder_type` was given, it is reinterpreted as one.
    pub fn resolve(
        &self,
        template_type: &str,
        part: &str,
        reminder_type: Option<&str>,
        stage: Option<&str>,
    ) -> Result<&str, OrchestratorError> {
        let (reminder_type, stage) = match (reminder_type, stage) {
            (None, Some(s)) if s.starts_with("reminder") => (Some(s), None),
            other => other,
        };

        let candidates: [TemplateKey; 4] = [
            (template_type.to_string(), part.to_string(), reminder_type.map(str::to_string), stage.map(str::to_string)),
            (template_type.to_string(), part.to_string(), None, stage.map(str::to_string)),
            (template_type.to_string(), part.to_string(), reminder_type.map(str::to_string), None),
            (template_type.to_string(), part.to_string(), None, None),
        ];

        for key in &candidates {
            if let Some(body) = self.templates.get(key) {
                return Ok(body.as_str());
            }
        }

        Err(OrchestratorError::template(format!(
            "no template found for type={template_type}, part={part}, reminder_type={reminder_type:?}, stage={stage:?}"
        )))
    }

    /// Loads every entry named in [`TEMPLATE_FILE_MANIFEST`] from
    /// `dir`, skipping entries whose file is absent so a deployment
    /// only has to ship the templates it actually uses.
    pub fn load_from_dir(dir: &Path) -> Result<Self, OrchestratorError> {
        let mut store = Self::new();
        for (template_type, part, reminder_type, stage, filename) in TEMPLATE_FILE_MANIFEST {
            let path = dir.join(filename);
            if !path.exists() {
                continue;
            }
            let body = std::fs::read_to_string(&path)
                .map_err(|err| OrchestratorError::template(format!("failed to read template {filename}: {err}")))?;
            store.insert(*template_type, *part, reminder_type.map(str::to_string), stage.map(str::to_string), body);
        }
        Ok(store)
    }
}

/// `(template_type, part, reminder_type, stage, filename)`, mirroring
/// the original implementation's `template_files` dictionary.
const TEMPLATE_FILE_MANIFEST: &[(&str, &str, Option<&str>, Option<&str>, &str)] = &[
    ("campaign", "subject", None, Some("initial"), "campaign_default_subject.txt"),
    ("campaign", "body", None, Some("initial"), "campaign_default_body.txt"),
    ("reminder", "subject", Some("reminder1"), None, "reminder_default_subject.txt"),
    ("reminder", "body", Some("reminder1"), None, "reminder_default_body.txt"),
    ("reminder", "subject", Some("reminder2"), None, "reminder2_default_subject.txt"),
    ("reminder", "body", Some("reminder2"), None, "reminder2_default_body.txt"),
    ("reminder", "subject", None, None, "reminder_default_subject.txt"),
    ("reminder", "body", None, None, "reminder_default_body.txt"),
    ("forms", "subject", None, Some("initial"), "forms_main_subject.txt"),
    ("forms", "body", None, Some("initial"), "forms_main_body.txt"),
    ("forms", "subject", Some("reminder1"), None, "forms_reminder1_subject.txt"),
    ("forms", "body", Some("reminder1"), None, "forms_reminder1_body.txt"),
    ("forms", "subject", Some("reminder2"), None, "forms_reminder2_subject.txt"),
    ("forms", "body", Some("reminder2"), None, "forms_reminder2_body.txt"),
    ("forms", "subject", Some("reminder3"), None, "forms_reminder3_subject.txt"),
    ("forms", "body", Some("reminder3"), None, "forms_reminder3_body.txt"),
    ("payments", "subject", None, Some("initial"), "payments_main_subject.txt"),
    ("payments", "body", None, Some("initial"), "payments_main_body.txt"),
    ("payments", "subject", Some("reminder1"), None, "payments_reminder1_subject.txt"),
    ("payments", "body", Some("reminder1"), None, "payments_reminder1_body.txt"),
    ("payments", "subject", Some("reminder2"), None, "payments_reminder2_subject.txt"),
    ("payments", "body", Some("reminder2"), None, "payments_reminder2_body.txt"),
    ("payments", "subject", Some("reminder3"), None, "payments_reminder3_subject.txt"),
    ("payments", "body", Some("reminder3"), None, "payments_reminder3_body.txt"),
    ("payments", "subject", Some("reminder4"), None, "payments_reminder4_subject.txt"),
    ("payments", "body", Some("reminder4"), None, "payments_reminder4_body.txt"),
    ("payments", "subject", Some("reminder5"), None, "payments_reminder5_subject.txt"),
    ("payments", "body", Some("reminder5"), None, "payments_reminder5_body.txt"),
    ("payments", "subject", Some("reminder6"), None, "payments_reminder6_subject.txt"),
    ("payments", "body", Some("reminder6"), None, "payments_reminder6_body.txt"),
    ("sepa", "subject", None, Some("initial"), "payment_sepa_subject.txt"),
    ("sepa", "body", None, Some("initial"), "payment_sepa_body.txt"),
    ("sepa", "subject", Some("reminder1"), None, "payment_sepa_reminder1_subject.txt"),
    ("sepa", "body", Some("reminder1"), None, "payment_sepa_reminder1_body.txt"),
    ("sepa", "subject", Some("reminder2"), None, "payment_sepa_reminder2_subject.txt"),
    ("sepa", "body", Some("reminder2"), None, "payment_sepa_reminder2_body.txt"),
    ("sepa", "subject", Some("reminder3"), None, "payment_sepa_reminder3_subject.txt"),
    ("sepa", "body", Some("reminder3"), None, "payment_sepa_reminder3_body.txt"),
    // reminders 4..6 reuse the payments copy, same as the original.
    ("sepa", "subject", Some("reminder4"), None, "payments_reminder4_subject.txt"),
    ("sepa", "body", Some("reminder4"), None, "payments_reminder4_body.txt"),
    ("sepa", "subject", Some("reminder5"), None, "payments_reminder5_subject.txt"),
    ("sepa", "body", Some("reminder5"), None, "payments_reminder5_body.txt"),
    ("sepa", "subject", Some("reminder6"), None, "payments_reminder6_subject.txt"),
    ("sepa", "body", Some("reminder6"), None, "payments_reminder6_body.txt"),
    ("rh", "subject", None, Some("initial"), "payment_rh_subject.txt"),
    ("rh", "body", None, Some("initial"), "payment_rh_body.txt"),
    ("rh", "subject", Some("reminder1"), None, "payment_rh_reminder1_subject.txt"),
    ("rh", "body", Some("reminder1"), None, "payment_rh_reminder1_body.txt"),
    ("rh", "subject", Some("reminder2"), None, "payment_rh_reminder2_subject.txt"),
    ("rh", "body", Some("reminder2"), None, "payment_rh_reminder2_body.txt"),
    ("rh", "subject", Some("reminder3"), None, "payment_rh_reminder3_subject.txt"),
    ("rh", "body", Some("reminder3"), None, "payment_rh_reminder3_body.txt"),
    ("rh", "subject", Some("reminder4"), None, "payments_reminder4_subject.txt"),
    ("rh", "body", Some("reminder4"), None, "payments_reminder4_body.txt"),
    ("rh", "subject", Some("reminder5"), None, "payments_reminder5_subject.txt"),
    ("rh", "body", Some("reminder5"), None, "payments_reminder5_body.txt"),
    ("rh", "subject", Some("reminder6"), None, "payments_reminder6_subject.txt"),
    ("rh", "body", Some("reminder6"), None, "payments_reminder6_body.txt"),
];

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{\s*(.*?)\s*\}\}").expect("valid regex"));

/// Substitution context for strict rendering. `name`/`prefix` are
/// derived from the contact; every other entry must be supplied by
/// the caller per the template's requirements.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    values: HashMap<String, String>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self { values: HashMap::new() }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn set_opt(&mut self, key: impl Into<String>, value: Option<impl Into<String>>) {
        if let Some(v) = value {
            self.values.insert(key.into(), v.into());
        }
    }

    /// Derives `{prefix, last_name, greeting_name, name}` from a
    /// contact's display name and optional stored prefix.
    pub fn with_name_parts(mut self, full_name: &str, stored_prefix: Option<&str>) -> Self {
        let (detected_prefix, last_name) = extract_name_parts_with_prefix(full_name);

        let prefix = match stored_prefix {
            Some(p) if !p.trim().is_empty() => Some(punctuate_prefix(p)),
            _ => detected_prefix,
        };

        let greeting_name = match &prefix {
            Some(_) => last_name.clone(),
            None => capitalize_words(full_name),
        };
        let prefix = prefix.unwrap_or_default();

        self.set("prefix", prefix);
        self.set("last_name", last_name);
        self.set("greeting_name", greeting_name);
        self.set("name", full_name.to_string());
        self
    }

    /// Normalizes the `payment_link <-> payments_link` and
    /// `forms_link <-> form_link` aliases before rendering, so a
    /// template using either spelling always resolves.
    fn normalize_aliases(&mut self) {
        if let Some(v) = self.values.get("payment_link").cloned() {
            self.values.entry("payments_link".to_string()).or_insert(v);
        }
        if let Some(v) = self.values.get("payments_link").cloned() {
            self.values.entry("payment_link".to_string()).or_insert(v);
        }
        if let Some(v) = self.values.get("forms_link").cloned() {
            self.values.entry("form_link".to_string()).or_insert(v);
        }
        if let Some(v) = self.values.get("form_link").cloned() {
            self.values.entry("forms_link".to_string()).or_insert(v);
        }
    }
}

fn punctuate_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim();
    if trimmed.len() <= 3 && !trimmed.ends_with('.') {
        format!("{trimmed}.")
    } else {
        trimmed.to_string()
    }
}

fn capitalize_words(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strictly substitutes every `{{key}}` placeholder in `template`,
/// rendered through `handlebars` in strict mode (used here purely as
/// the moustache-substitution engine, flat variables only — no
/// `{{#each}}`/`{{#if}}` block helpers). Fails if any referenced key is
/// missing or empty before ever calling into handlebars, and fails
/// again if any placeholder survives substitution (defends against the
/// unlikely case of a value that itself looks like a placeholder).
pub fn render_template_strict(template: &str, context: &TemplateContext) -> Result<String, OrchestratorError> {
    if template.trim().is_empty() {
        return Err(OrchestratorError::template("template must be a non-empty string"));
    }

    let mut context = context.clone();
    context.normalize_aliases();

    let required_vars: Vec<String> = PLACEHOLDER
        .captures_iter(template)
        .map(|c| c[1].to_string())
        .collect();

    let missing: Vec<&String> = required_vars
        .iter()
        .filter(|var| context.values.get(*var).map(|v| v.trim().is_empty()).unwrap_or(true))
        .collect();

    if !missing.is_empty() {
        let missing_list = missing.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ");
        return Err(OrchestratorError::template(format!("missing required template variable(s): {missing_list}")));
    }

    let mut engine = handlebars::Handlebars::new();
    engine.set_strict_mode(true);
    // Bodies are plain text (spec), not HTML — substituted values (names,
    // links containing `&`) must come through unescaped.
    engine.register_escape_fn(handlebars::no_escape);
    let rendered = engine.render_template(template, &context.values)?;

    if rendered.trim().is_empty() {
        return Err(OrchestratorError::template("rendered template is empty"));
    }

    if PLACEHOLDER.is_match(&rendered) {
        return Err(OrchestratorError::template("failed to substitute all template variables"));
    }

    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_exact_match_first() {
        let mut store = TemplateStore::new();
        store.insert("payments", "subject", Some("reminder1".to_string()), None, "Reminder 1 subject");
        store.insert("payments", "subject", None, None, "Generic subject");

        let resolved = store.resolve("payments", "subject", Some("reminder1"), None).unwrap();
        assert_eq!(resolved, "Reminder 1 subject");
    }

    #[test]
    fn falls_back_to_generic_when_no_exact_match() {
        let mut store = TemplateStore::new();
        store.insert("payments", "subject", None, None, "Generic subject");

        let resolved = store.resolve("payments", "subject", Some("reminder9"), None).unwrap();
        assert_eq!(resolved, "Generic subject");
    }

    #[test]
    fn missing_key_is_an_error() {
        let store = TemplateStore::new();
        assert!(store.resolve("payments", "subject", None, None).is_err());
    }

    #[test]
    fn reminder_like_stage_is_reinterpreted_as_reminder_type() {
        let mut store = TemplateStore::new();
        store.insert("reminder", "body", Some("reminder2".to_string()), None, "Body for reminder2");

        let resolved = store.resolve("reminder", "body", None, Some("reminder2")).unwrap();
        assert_eq!(resolved, "Body for reminder2");
    }

    #[test]
    fn renders_with_substituted_variables() {
        let mut ctx = TemplateContext::new();
        ctx.set("greeting_name", "Ayman");
        ctx.set("event_name", "Annual Gala");

        let result = render_template_strict("Dear {{greeting_name}}, welcome to {{event_name}}.", &ctx).unwrap();
        assert_eq!(result, "Dear Ayman, welcome to Annual Gala.");
    }

    #[test]
    fn missing_variable_fails_render() {
        let ctx = TemplateContext::new();
        assert!(render_template_strict("Dear {{greeting_name}}", &ctx).is_err());
    }

    #[test]
    fn empty_variable_value_fails_render() {
        let mut ctx = TemplateContext::new();
        ctx.set("greeting_name", "");
        assert!(render_template_strict("Dear {{greeting_name}}", &ctx).is_err());
    }

    #[test]
    fn payment_link_alias_is_normalized() {
        let mut ctx = TemplateContext::new();
        ctx.set("payment_link", "https://pay.example.com/abc");
        let result = render_template_strict("Pay here: {{payments_link}}", &ctx).unwrap();
        assert_eq!(result, "Pay here: https://pay.example.com/abc");
    }

    #[test]
    fn forms_link_alias_is_normalized() {
        let mut ctx = TemplateContext::new();
        ctx.set("form_link", "https://forms.example.com/abc");
        let result = render_template_strict("Fill in: {{forms_link}}", &ctx).unwrap();
        assert_eq!(result, "Fill in: https://forms.example.com/abc");
    }

    #[test]
    fn name_parts_use_stored_prefix_when_present() {
        let ctx = TemplateContext::new().with_name_parts("Hatem Ayman", Some("Dr"));
        assert_eq!(ctx.values.get("prefix").unwrap(), "Dr.");
        assert_eq!(ctx.values.get("greeting_name").unwrap(), "Ayman");
    }

    #[test]
    fn name_parts_detect_honorific_when_no_stored_prefix() {
        let ctx = TemplateContext::new().with_name_parts("Mr. John Smith", None);
        assert_eq!(ctx.values.get("prefix").unwrap(), "Mr.");
        assert_eq!(ctx.values.get("greeting_name").unwrap(), "Smith");
    }

    #[test]
    fn name_parts_capitalize_full_name_when_no_prefix_at_all() {
        let ctx = TemplateContext::new().with_name_parts("hatem ayman", None);
        assert_eq!(ctx.values.get("greeting_name").unwrap(), "Hatem Ayman");
    }
}
