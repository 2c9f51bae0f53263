//! Editable control configuration forms.
//!
//! A [`ConfigForm`] is loaded from the backend's flat config object for a
//! mode and submitted back as multipart fields. Field names on the form and
//! keys in the config object are not always the same (`root` is loaded, but
//! the backend expects `root_dir` back), so every [`FieldSpec`] carries both.

use std::{collections::BTreeMap, fmt::Display, sync::Arc, time::Duration};

use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use lerobot_gui_client::{
    GuiClient,
    endpoints::{Endpoint, Method},
    models::Mode,
};

use crate::{
    Error, Result,
    dispatch::Outcome,
    notify::{Notifier, Severity},
    region::Region,
};

mod directory;
pub mod presets;

pub use directory::{DirectoryIndicator, DirectoryWatch, WarnWhen};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Checkbox,
    Select,
    /// Comma separated list.
    Tags,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl FieldValue {
    /// Coerces a backend config value.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Number(n) => n.as_f64().map_or(FieldValue::Null, FieldValue::Number),
            Value::String(s) => FieldValue::Text(s.clone()),
            Value::Array(items) => FieldValue::Text(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            Value::Object(_) => FieldValue::Text(value.to_string()),
        }
    }

    /// Value as it goes into a submitted form body.
    pub fn to_form_value(&self) -> String {
        match self {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Null => String::new(),
        }
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Null => write!(f, "-"),
            other => write!(f, "{}", other.to_form_value()),
        }
    }
}

/// Where a select field gets its choices from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionsSource {
    RobotConfigPaths,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    /// Submitted field name.
    pub name: String,
    /// Key in the backend config object.
    pub source_key: String,
    pub kind: FieldKind,
    pub default: FieldValue,
    pub options: Option<OptionsSource>,
}

impl FieldSpec {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        let default = match kind {
            FieldKind::Checkbox => FieldValue::Bool(false),
            FieldKind::Number => FieldValue::Null,
            FieldKind::Text | FieldKind::Select | FieldKind::Tags => {
                FieldValue::Text(String::new())
            }
        };

        Self {
            name: name.to_string(),
            source_key: name.to_string(),
            kind,
            default,
            options: None,
        }
    }

    pub fn loaded_from(mut self, source_key: &str) -> Self {
        self.source_key = source_key.to_string();
        self
    }

    pub fn with_default(mut self, default: FieldValue) -> Self {
        self.default = default;
        self
    }

    pub fn with_options(mut self, source: OptionsSource) -> Self {
        self.options = Some(source);
        self
    }

    /// Parses user input for this field.
    pub fn parse(&self, raw: &str) -> Result<FieldValue> {
        let raw = raw.trim();
        match self.kind {
            FieldKind::Checkbox => match raw {
                "true" | "on" | "1" | "yes" => Ok(FieldValue::Bool(true)),
                "false" | "off" | "0" | "no" | "" => Ok(FieldValue::Bool(false)),
                other => Err(Error::Form(format!(
                    "{}: expected true or false, got {other:?}",
                    self.name
                ))),
            },
            FieldKind::Number if raw.is_empty() => Ok(FieldValue::Null),
            FieldKind::Number => raw.parse::<f64>().map(FieldValue::Number).map_err(|_| {
                Error::Form(format!("{}: expected a number, got {raw:?}", self.name))
            }),
            FieldKind::Text | FieldKind::Select | FieldKind::Tags => {
                Ok(FieldValue::Text(raw.to_string()))
            }
        }
    }
}

/// Which config a form edits and where it is sent.
#[derive(Debug, Clone, PartialEq)]
pub struct FormSchema {
    pub mode: Mode,
    /// Used in user notifications, e.g. "Record".
    pub label: String,
    pub action: String,
    pub method: Method,
    pub fields: Vec<FieldSpec>,
    pub directory_check: Option<DirectoryCheck>,
}

impl FormSchema {
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn load_endpoint(&self) -> Endpoint {
        Endpoint::ControlConfig(self.mode)
    }
}

/// Field whose value is checked for existence on the backend host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryCheck {
    pub field: String,
    pub warn_when: WarnWhen,
}

#[derive(Debug, Clone)]
pub struct ConfigForm {
    schema: FormSchema,
    values: Vec<FieldValue>,
    options: BTreeMap<String, Vec<String>>,
}

impl ConfigForm {
    pub fn new(schema: FormSchema) -> Self {
        let values = schema.fields.iter().map(|f| f.default.clone()).collect();
        Self {
            schema,
            values,
            options: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn fields(&self) -> impl Iterator<Item = (&FieldSpec, &FieldValue)> {
        self.schema.fields.iter().zip(self.values.iter())
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.position(name).map(|i| &self.values[i])
    }

    pub fn set(&mut self, name: &str, value: FieldValue) -> Result<()> {
        let index = self
            .position(name)
            .ok_or_else(|| Error::Form(format!("Unknown field: {name}")))?;
        self.values[index] = value;
        Ok(())
    }

    /// Sets a field from user input, parsed according to its kind.
    pub fn set_input(&mut self, name: &str, raw: &str) -> Result<()> {
        let spec = self
            .schema
            .field(name)
            .ok_or_else(|| Error::Form(format!("Unknown field: {name}")))?;
        let value = spec.parse(raw)?;
        self.set(name, value)
    }

    /// Like [`set_input`](Self::set_input). An edit of the schema's directory
    /// field is also sent to `watch`; the returned handle finishes once that
    /// check is done.
    pub fn edit(
        &mut self,
        name: &str,
        raw: &str,
        watch: Option<&DirectoryWatch>,
    ) -> Result<Option<JoinHandle<()>>> {
        self.set_input(name, raw)?;
        let checked = self
            .schema
            .directory_check
            .as_ref()
            .is_some_and(|check| check.field == name);

        Ok(match watch {
            Some(watch) if checked => self.directory_value().map(|value| watch.input(&value)),
            _ => None,
        })
    }

    /// Current value of the field checked on the backend host.
    pub fn directory_value(&self) -> Option<String> {
        let check = self.schema.directory_check.as_ref()?;
        self.get(&check.field).map(FieldValue::to_form_value)
    }

    pub fn reset(&mut self) {
        for (value, spec) in self.values.iter_mut().zip(&self.schema.fields) {
            *value = spec.default.clone();
        }
    }

    /// Assigns every field whose source key is present in `config`. Returns
    /// how many fields were assigned.
    pub fn assign(&mut self, config: &Map<String, Value>) -> usize {
        let mut assigned = 0;
        for (spec, value) in self.schema.fields.iter().zip(self.values.iter_mut()) {
            if let Some(source) = config.get(&spec.source_key) {
                *value = FieldValue::from_json(source);
                assigned += 1;
            }
        }
        assigned
    }

    pub fn options(&self, name: &str) -> Option<&[String]> {
        self.options.get(name).map(Vec::as_slice)
    }

    pub fn set_options(&mut self, name: &str, options: Vec<String>) {
        self.options.insert(name.to_string(), options);
    }

    /// Every field as `(name, value)` in schema order.
    pub fn to_fields(&self) -> Vec<(String, String)> {
        self.fields()
            .map(|(spec, value)| (spec.name.clone(), value.to_form_value()))
            .collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.schema.fields.iter().position(|f| f.name == name)
    }
}

impl Display for ConfigForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "[{}] {} {}", self.schema.mode, self.schema.method, self.schema.action)?;
        for (spec, value) in self.fields() {
            writeln!(f, "{} = {}", spec.name, value)?;
        }
        Ok(())
    }
}

/// Moves form state between the backend and a [`ConfigForm`].
#[derive(Clone)]
pub struct FormSynchronizer {
    client: GuiClient,
    notifier: Arc<dyn Notifier>,
}

impl FormSynchronizer {
    pub fn new(client: GuiClient, notifier: Arc<dyn Notifier>) -> Self {
        Self { client, notifier }
    }

    pub async fn try_load(&self, form: &mut ConfigForm) -> Result<usize> {
        let config = self.client.control_config(form.schema.mode).await?;
        let assigned = form.assign(&config);
        debug!(mode = %form.schema.mode, assigned, "Loaded control config");
        Ok(assigned)
    }

    /// Loads the backend config into the form. A failed fetch is logged and
    /// leaves the form as it was.
    pub async fn load(&self, form: &mut ConfigForm) -> bool {
        match self.try_load(form).await {
            Ok(_) => true,
            Err(err) => {
                error!(mode = %form.schema.mode, err = ?err, "Error fetching control configuration");
                false
            }
        }
    }

    /// Watch for the schema's directory field, reporting into `indicator`.
    /// `None` when the form has no such field.
    pub fn directory_watch(
        &self,
        schema: &FormSchema,
        debounce: Duration,
        indicator: &Region<DirectoryIndicator>,
    ) -> Option<DirectoryWatch> {
        let check = schema.directory_check.as_ref()?;
        Some(DirectoryWatch::new(
            self.client.clone(),
            check.warn_when,
            debounce,
            indicator,
        ))
    }

    /// Checks the directory field's current value, as the form shows it right
    /// after a load.
    pub async fn check_directory(&self, form: &ConfigForm, watch: &DirectoryWatch) {
        let Some(value) = form.directory_value() else {
            return;
        };
        if let Err(err) = watch.input(&value).await {
            warn!(mode = %form.schema.mode, err = ?err, "Directory check task failed");
        }
    }

    /// Fills option lists of select fields.
    pub async fn load_options(&self, form: &mut ConfigForm) {
        let selects: Vec<(String, OptionsSource)> = form
            .schema
            .fields
            .iter()
            .filter_map(|field| field.options.map(|source| (field.name.clone(), source)))
            .collect();

        for (name, source) in selects {
            let options = match source {
                OptionsSource::RobotConfigPaths => self.client.config_paths().await,
            };
            match options {
                Ok(options) => form.set_options(&name, options),
                Err(err) => warn!(field = %name, err = ?err, "Error fetching field options"),
            }
        }
    }

    /// Sends every field to the form's action and alerts the user with the
    /// result.
    pub async fn submit(&self, form: &ConfigForm) -> Outcome {
        let schema = &form.schema;
        let result = self
            .client
            .submit_form(schema.method, &schema.action, form.to_fields())
            .await;

        let outcome = match result {
            Ok(response) if response.status().is_success() => Outcome::Completed { status: None },
            Ok(response) => Outcome::Rejected(response.status()),
            Err(err) => Outcome::Failed(err.to_string()),
        };

        if outcome.is_success() {
            info!(mode = %schema.mode, action = %schema.action, "Configuration updated");
            self.notifier.alert(
                Severity::Info,
                &format!("{} configuration updated successfully", schema.label),
            );
        } else {
            warn!(mode = %schema.mode, action = %schema.action, %outcome, "Configuration update failed");
            self.notifier.alert(
                Severity::Error,
                &format!("Error updating {} configuration!", schema.label),
            );
        }

        outcome
    }
}
