//! Form sessions
//!
//! A session is the editing state of one entity (or of a new one) in one
//! editor. It is keyed by the entity id: binding a different key throws
//! away every edit and starts over from the new defaults.

mod rules;

pub use rules::{FieldOptions, Matches, MaxLength, Required, ValidationRule};

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value as Json};
use tracing::{Level, event};

use crate::core::{ClientError, FieldErrors, Result};

pub type FormValues = BTreeMap<String, Json>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FormKey {
    /// Editing an entity that does not exist yet.
    New,
    Existing(String),
}

impl FormKey {
    pub fn from_id(id: Option<&str>) -> Self {
        match id {
            Some(id) => FormKey::Existing(id.to_string()),
            None => FormKey::New,
        }
    }
}

/// Per-field rules of one form.
#[derive(Default)]
pub struct FormOptions {
    fields: BTreeMap<String, FieldOptions>,
}

impl FormOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, options: FieldOptions) -> Self {
        self.fields.insert(name.to_string(), options);
        self
    }
}

struct FormState {
    key: FormKey,
    defaults: FormValues,
    values: FormValues,
    touched: BTreeSet<String>,
    dirty: bool,
    errors: FieldErrors,
}

impl FormState {
    fn new(key: FormKey, defaults: FormValues) -> Self {
        Self {
            key,
            values: defaults.clone(),
            defaults,
            touched: BTreeSet::new(),
            dirty: false,
            errors: FieldErrors::new(),
        }
    }

    fn recompute_dirty(&mut self) {
        self.dirty = differs(&self.values, &self.defaults);
    }

    fn validate(&mut self, options: &FormOptions) {
        self.errors = options
            .fields
            .iter()
            .filter_map(|(name, field)| {
                let value = self.values.get(name).unwrap_or(&Json::Null);
                field.check(value).map(|message| (name.clone(), message))
            })
            .collect();
    }
}

/// Missing fields compare equal to `null`.
fn differs(values: &FormValues, defaults: &FormValues) -> bool {
    values
        .keys()
        .chain(defaults.keys())
        .any(|name| {
            values.get(name).unwrap_or(&Json::Null) != defaults.get(name).unwrap_or(&Json::Null)
        })
}

/// Shared handle to one editing session.
#[derive(Clone)]
pub struct FormSession {
    state: Arc<Mutex<FormState>>,
    options: Arc<FormOptions>,
}

impl FormSession {
    pub fn bind(key: FormKey, defaults: FormValues, options: FormOptions) -> Self {
        let mut state = FormState::new(key, defaults);
        state.validate(&options);
        Self {
            state: Arc::new(Mutex::new(state)),
            options: Arc::new(options),
        }
    }

    fn state(&self) -> MutexGuard<'_, FormState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Switches to `key`. Returns false, changing nothing, when the key is
    /// the current one.
    pub fn rebind(&self, key: FormKey, defaults: FormValues) -> bool {
        let mut state = self.state();
        if state.key == key {
            return false;
        }
        event!(Level::DEBUG, from = ?state.key, to = ?key, "form rebound");
        *state = FormState::new(key, defaults);
        state.validate(&self.options);
        true
    }

    /// Applies defaults that arrived after binding, unless the session has
    /// moved on to another key meanwhile. Touched fields keep their edits.
    pub fn load_defaults(&self, key: &FormKey, defaults: FormValues) -> bool {
        let mut state = self.state();
        if &state.key != key {
            event!(Level::DEBUG, stale = ?key, current = ?state.key, "ignoring stale form defaults");
            return false;
        }
        for (name, value) in &defaults {
            if !state.touched.contains(name) {
                state.values.insert(name.clone(), value.clone());
            }
        }
        state.defaults = defaults;
        state.recompute_dirty();
        state.validate(&self.options);
        true
    }

    /// Records an edit. Validation reruns only while the form is still
    /// pristine and not known to be valid; once editing started, errors
    /// are refreshed by `submit`.
    pub fn set_value(&self, field: &str, value: impl Into<Json>) {
        let value = match self.options.fields.get(field) {
            Some(options) => options.normalize(value.into()),
            None => value.into(),
        };
        let mut state = self.state();
        let revalidate = !state.dirty && !state.errors.is_empty();
        state.values.insert(field.to_string(), value);
        state.touched.insert(field.to_string());
        state.recompute_dirty();
        if revalidate {
            state.validate(&self.options);
        }
    }

    pub fn key(&self) -> FormKey {
        self.state().key.clone()
    }

    pub fn value(&self, field: &str) -> Option<Json> {
        self.state().values.get(field).cloned()
    }

    pub fn values(&self) -> FormValues {
        self.state().values.clone()
    }

    /// Current values deserialized into `T`.
    pub fn values_as<T: DeserializeOwned>(&self) -> Result<T> {
        let map: Map<String, Json> = self.values().into_iter().collect();
        Ok(serde_json::from_value(Json::Object(map))?)
    }

    pub fn is_valid(&self) -> bool {
        self.state().errors.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.state().dirty
    }

    pub fn is_touched(&self, field: &str) -> bool {
        self.state().touched.contains(field)
    }

    pub fn errors(&self) -> FieldErrors {
        self.state().errors.clone()
    }

    /// Back to the defaults of the current key.
    pub fn reset(&self) {
        let mut state = self.state();
        state.values = state.defaults.clone();
        state.touched.clear();
        state.dirty = false;
        state.validate(&self.options);
    }

    /// Validates, then hands the values to `handler`.
    ///
    /// Invalid values fail with [`ClientError::Validation`] and never reach
    /// the handler. After a successful handler the form resets, unless it
    /// was rebound to another key while the handler ran.
    pub async fn submit<F, Fut, T>(&self, handler: F) -> Result<T>
    where
        F: FnOnce(FormValues) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let (key, values) = {
            let mut state = self.state();
            state.validate(&self.options);
            if !state.errors.is_empty() {
                return Err(ClientError::Validation {
                    errors: state.errors.clone(),
                });
            }
            (state.key.clone(), state.values.clone())
        };

        let output = handler(values).await?;

        let unchanged = self.state().key == key;
        if unchanged {
            self.reset();
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn role_options() -> FormOptions {
        FormOptions::new()
            .field("name", FieldOptions::new().required().max_length(40))
            .field("description", FieldOptions::new().required())
    }

    fn defaults(name: &str) -> FormValues {
        FormValues::from([
            ("name".to_string(), json!(name)),
            ("description".to_string(), json!("desc")),
        ])
    }

    #[test]
    fn test_rebind_discards_edits() {
        let form = FormSession::bind(
            FormKey::Existing("A".into()),
            defaults("President"),
            role_options(),
        );
        form.set_value("name", "Edited");
        assert!(form.is_dirty());

        assert!(form.rebind(FormKey::Existing("B".into()), defaults("Treasurer")));
        assert_eq!(form.values(), defaults("Treasurer"));
        assert!(!form.is_dirty());
        assert!(!form.is_touched("name"));
    }

    #[test]
    fn test_rebind_same_key_is_noop() {
        let form = FormSession::bind(FormKey::New, defaults("President"), role_options());
        form.set_value("name", "Edited");
        assert!(!form.rebind(FormKey::New, defaults("Other")));
        assert_eq!(form.value("name"), Some(json!("Edited")));
    }

    #[test]
    fn test_stale_defaults_ignored() {
        let form = FormSession::bind(FormKey::Existing("A".into()), FormValues::new(), role_options());
        form.rebind(FormKey::Existing("B".into()), FormValues::new());

        assert!(!form.load_defaults(&FormKey::Existing("A".into()), defaults("Stale")));
        assert_eq!(form.value("name"), None);

        assert!(form.load_defaults(&FormKey::Existing("B".into()), defaults("Fresh")));
        assert_eq!(form.value("name"), Some(json!("Fresh")));
        assert!(form.is_valid());
    }

    #[test]
    fn test_late_defaults_keep_touched_fields() {
        let form = FormSession::bind(FormKey::New, FormValues::new(), role_options());
        form.set_value("name", "Mine");
        form.load_defaults(&FormKey::New, defaults("Theirs"));
        assert_eq!(form.value("name"), Some(json!("Mine")));
        assert_eq!(form.value("description"), Some(json!("desc")));
    }

    #[tokio::test]
    async fn test_pristine_form_validates_until_dirty() {
        let form = FormSession::bind(FormKey::New, FormValues::new(), role_options());
        assert!(!form.is_valid());
        assert!(form.errors().contains_key("name"));

        form.set_value("name", "President");
        assert!(form.is_dirty());
        assert!(!form.errors().contains_key("name"));
        assert!(form.errors().contains_key("description"));

        form.set_value("description", "Leads the club");
        assert!(!form.is_valid());

        let submitted = form
            .submit(|values| async move { Ok(values["description"].clone()) })
            .await
            .unwrap();
        assert_eq!(submitted, json!("Leads the club"));
    }

    #[tokio::test]
    async fn test_known_valid_form_checks_edits_on_submit() {
        let form = FormSession::bind(FormKey::Existing("r1".into()), defaults("President"), role_options());
        assert!(form.is_valid());

        form.set_value("name", "x".repeat(41));
        assert!(form.is_valid());

        let err = form.submit(|_| async { Ok(()) }).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation { .. }));
        assert_eq!(
            form.errors().get("name").map(String::as_str),
            Some("Must be at most 40 characters")
        );
        assert!(!form.is_valid());
    }

    #[test]
    fn test_empty_as_null_field() {
        let options = FormOptions::new().field("bio", FieldOptions::new().empty_as_null());
        let form = FormSession::bind(
            FormKey::Existing("u1".into()),
            FormValues::from([("bio".to_string(), json!(null))]),
            options,
        );
        form.set_value("bio", "");
        assert_eq!(form.value("bio"), Some(json!(null)));
        assert!(!form.is_dirty());
    }

    #[tokio::test]
    async fn test_submit_invalid_skips_handler() {
        let form = FormSession::bind(FormKey::New, FormValues::new(), role_options());
        let mut called = false;
        let err = form
            .submit(|_| {
                called = true;
                async { Ok(()) }
            })
            .await
            .unwrap_err();

        assert!(!called);
        let ClientError::Validation { errors } = err else {
            panic!("expected a validation error");
        };
        assert_eq!(errors.len(), 2);
    }

    #[tokio::test]
    async fn test_submit_resets_on_success() {
        let form = FormSession::bind(FormKey::Existing("r1".into()), defaults("President"), role_options());
        form.set_value("name", "Chair");

        let submitted = form
            .submit(|values| async move { Ok(values["name"].clone()) })
            .await
            .unwrap();

        assert_eq!(submitted, json!("Chair"));
        assert_eq!(form.value("name"), Some(json!("President")));
        assert!(!form.is_dirty());
    }

    #[tokio::test]
    async fn test_submit_handler_error_keeps_edits() {
        let form = FormSession::bind(FormKey::New, defaults("President"), role_options());
        form.set_value("name", "Chair");

        let result: Result<()> = form
            .submit(|_| async { Err(ClientError::Transport("down".into())) })
            .await;

        assert!(result.is_err());
        assert_eq!(form.value("name"), Some(json!("Chair")));
    }

    #[test]
    fn test_values_as() {
        #[derive(serde::Deserialize)]
        struct Role {
            name: String,
        }
        let form = FormSession::bind(FormKey::New, defaults("President"), role_options());
        let role: Role = form.values_as().unwrap();
        assert_eq!(role.name, "President");
    }
}
