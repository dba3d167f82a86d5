//! The `io` namespace handed to actions.
//!
//! Every method yields an [`IoPromise`] for one component kind. Awaiting a
//! promise renders it and resolves the typed return; `io.group` batches
//! several promises into a single render.

use crate::client::IoClient;
use crate::component::{IoComponent, StateChangeHook};
use crate::error::IoError;
use crate::method::MethodName;
use crate::promise::{ExclusiveIoPromise, IoGroupItems, IoGroupPromise, IoPromise, ValueMapper};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;

/// One choice offered by the select components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectOption {
    pub label: String,
    pub value: Value,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: Value) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// Return of the file upload component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUpload {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Coordinator-side query handler for the search component.
pub type SearchHandler =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<Vec<Value>, String>> + Send + Sync>;

/// Configuration for [`Io::search`].
#[derive(Clone)]
pub struct SearchOptions {
    initial_results: Vec<Value>,
    on_search: SearchHandler,
}

impl SearchOptions {
    pub fn new<F, Fut>(on_search: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Value>, String>> + Send + 'static,
    {
        Self {
            initial_results: Vec::new(),
            on_search: Arc::new(move |query| Box::pin(on_search(query))),
        }
    }

    /// Results shown before the operator has typed anything.
    pub fn with_initial_results(mut self, results: Vec<Value>) -> Self {
        self.initial_results = results;
        self
    }
}

/// Root of the namespace. One instance per transaction.
pub struct Io {
    pub input: Input,
    pub select: Select,
    pub display: Display,
    pub experimental: Experimental,
    client: Arc<IoClient>,
}

impl Io {
    pub(crate) fn new(client: Arc<IoClient>) -> Self {
        Self {
            input: Input {
                client: client.clone(),
            },
            select: Select {
                client: client.clone(),
            },
            display: Display {
                client: client.clone(),
            },
            experimental: Experimental {
                input: ExperimentalInput {
                    client: client.clone(),
                },
                client: client.clone(),
            },
            client,
        }
    }

    /// Batch an ordered tuple of promises into one render. Fails without
    /// any socket traffic when a member is exclusive.
    pub fn group<G: IoGroupItems>(&self, items: G) -> Result<IoGroupPromise<G::Output>, IoError>
    where
        G::Output: Send + 'static,
    {
        let (parts, mapper) = items.into_group_parts()?;
        if parts.iter().any(|part| part.exclusive) {
            return Err(IoError::GroupContainsExclusive);
        }
        let members = parts.into_iter().map(|part| part.member).collect();
        Ok(IoGroupPromise {
            client: self.client.clone(),
            members,
            mapper,
            validator: None,
        })
    }

    /// Full-screen confirmation. Exclusive: cannot join a group.
    pub fn confirm(&self, label: impl Into<String>) -> ExclusiveIoPromise<bool> {
        make(
            &self.client,
            MethodName::Confirm,
            label,
            Value::Null,
            None,
            bool_mapper(),
        )
        .exclusive()
    }

    /// Incremental search. The handler recomputes results for every query
    /// the operator types; the chosen result is the return value.
    pub fn search(&self, label: impl Into<String>, options: SearchOptions) -> IoPromise<Value> {
        let handler = options.on_search.clone();
        let hook: StateChangeHook = Arc::new(move |state| {
            let handler = handler.clone();
            Box::pin(async move {
                let query = state.as_str().unwrap_or_default().to_string();
                let results = handler(query).await?;
                Ok(json!({ "results": results }))
            })
        });
        make(
            &self.client,
            MethodName::Search,
            label,
            json!({ "results": options.initial_results }),
            Some(hook),
            value_mapper(),
        )
    }
}

pub struct Input {
    client: Arc<IoClient>,
}

impl Input {
    pub fn text(&self, label: impl Into<String>) -> IoPromise<String> {
        make(
            &self.client,
            MethodName::InputText,
            label,
            Value::Null,
            None,
            string_mapper(),
        )
    }

    pub fn boolean(&self, label: impl Into<String>) -> IoPromise<bool> {
        make(
            &self.client,
            MethodName::InputBoolean,
            label,
            Value::Null,
            None,
            bool_mapper(),
        )
    }

    pub fn number(&self, label: impl Into<String>) -> IoPromise<f64> {
        make(
            &self.client,
            MethodName::InputNumber,
            label,
            Value::Null,
            None,
            number_mapper(),
        )
    }

    pub fn email(&self, label: impl Into<String>) -> IoPromise<String> {
        make(
            &self.client,
            MethodName::InputEmailAddress,
            label,
            Value::Null,
            None,
            string_mapper(),
        )
    }

    pub fn rich_text(&self, label: impl Into<String>) -> IoPromise<String> {
        make(
            &self.client,
            MethodName::InputRichText,
            label,
            Value::Null,
            None,
            string_mapper(),
        )
    }
}

pub struct Select {
    client: Arc<IoClient>,
}

impl Select {
    pub fn single(
        &self,
        label: impl Into<String>,
        options: Vec<SelectOption>,
    ) -> IoPromise<SelectOption> {
        make(
            &self.client,
            MethodName::SelectSingle,
            label,
            json!({ "options": options }),
            None,
            typed_mapper::<SelectOption>(),
        )
    }

    pub fn multiple(
        &self,
        label: impl Into<String>,
        options: Vec<SelectOption>,
    ) -> IoPromise<Vec<SelectOption>> {
        make(
            &self.client,
            MethodName::SelectMultiple,
            label,
            json!({ "options": options }),
            None,
            typed_mapper::<Vec<SelectOption>>(),
        )
    }

    pub fn table(&self, label: impl Into<String>, data: Vec<Value>) -> IoPromise<Vec<Value>> {
        make(
            &self.client,
            MethodName::SelectTable,
            label,
            json!({ "data": data }),
            None,
            rows_mapper(),
        )
    }
}

pub struct Display {
    client: Arc<IoClient>,
}

impl Display {
    pub fn heading(&self, label: impl Into<String>) -> IoPromise<()> {
        make(
            &self.client,
            MethodName::DisplayHeading,
            label,
            Value::Null,
            None,
            unit_mapper(),
        )
    }

    pub fn markdown(&self, label: impl Into<String>) -> IoPromise<()> {
        make(
            &self.client,
            MethodName::DisplayMarkdown,
            label,
            Value::Null,
            None,
            unit_mapper(),
        )
    }

    pub fn link(&self, label: impl Into<String>, href: impl Into<String>) -> IoPromise<()> {
        let href: String = href.into();
        make(
            &self.client,
            MethodName::DisplayLink,
            label,
            json!({ "href": href }),
            None,
            unit_mapper(),
        )
    }

    pub fn object(&self, label: impl Into<String>, data: Value) -> IoPromise<()> {
        make(
            &self.client,
            MethodName::DisplayObject,
            label,
            json!({ "data": data }),
            None,
            unit_mapper(),
        )
    }

    pub fn table(&self, label: impl Into<String>, data: Vec<Value>) -> IoPromise<()> {
        make(
            &self.client,
            MethodName::DisplayTable,
            label,
            json!({ "data": data }),
            None,
            unit_mapper(),
        )
    }
}

pub struct Experimental {
    pub input: ExperimentalInput,
    client: Arc<IoClient>,
}

impl Experimental {
    pub fn spreadsheet(&self, label: impl Into<String>, columns: Value) -> IoPromise<Vec<Value>> {
        make(
            &self.client,
            MethodName::InputSpreadsheet,
            label,
            json!({ "columns": columns }),
            None,
            rows_mapper(),
        )
    }

    pub fn date(&self, label: impl Into<String>) -> IoPromise<NaiveDate> {
        make(
            &self.client,
            MethodName::InputDate,
            label,
            Value::Null,
            None,
            Arc::new(|raw| {
                let text = raw
                    .as_str()
                    .ok_or_else(|| IoError::BadReturn(format!("expected a date string, got {raw}")))?;
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .map_err(|e| IoError::BadReturn(e.to_string()))
            }),
        )
    }

    pub fn time(&self, label: impl Into<String>) -> IoPromise<NaiveTime> {
        make(
            &self.client,
            MethodName::InputTime,
            label,
            Value::Null,
            None,
            Arc::new(|raw| {
                let text = raw
                    .as_str()
                    .ok_or_else(|| IoError::BadReturn(format!("expected a time string, got {raw}")))?;
                NaiveTime::parse_from_str(text, "%H:%M:%S")
                    .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
                    .map_err(|e| IoError::BadReturn(e.to_string()))
            }),
        )
    }

    pub fn datetime(&self, label: impl Into<String>) -> IoPromise<NaiveDateTime> {
        make(
            &self.client,
            MethodName::InputDatetime,
            label,
            Value::Null,
            None,
            Arc::new(|raw| {
                let text = raw.as_str().ok_or_else(|| {
                    IoError::BadReturn(format!("expected a datetime string, got {raw}"))
                })?;
                match chrono::DateTime::parse_from_rfc3339(text) {
                    Ok(parsed) => Ok(parsed.naive_utc()),
                    Err(_) => NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
                        .map_err(|e| IoError::BadReturn(e.to_string())),
                }
            }),
        )
    }
}

pub struct ExperimentalInput {
    client: Arc<IoClient>,
}

impl ExperimentalInput {
    pub fn file(&self, label: impl Into<String>) -> IoPromise<FileUpload> {
        make(
            &self.client,
            MethodName::UploadFile,
            label,
            Value::Null,
            None,
            typed_mapper::<FileUpload>(),
        )
    }
}

fn make<T: Send + 'static>(
    client: &Arc<IoClient>,
    method: MethodName,
    label: impl Into<String>,
    props: Value,
    hook: Option<StateChangeHook>,
    mapper: ValueMapper<T>,
) -> IoPromise<T> {
    let component = IoComponent::new(method, label, props, hook);
    IoPromise::new(client.clone(), component, mapper)
}

fn string_mapper() -> ValueMapper<String> {
    Arc::new(|raw| match raw {
        Value::String(s) => Ok(s),
        other => Err(IoError::BadReturn(format!("expected a string, got {other}"))),
    })
}

fn number_mapper() -> ValueMapper<f64> {
    Arc::new(|raw| {
        raw.as_f64()
            .ok_or_else(|| IoError::BadReturn(format!("expected a number, got {raw}")))
    })
}

fn bool_mapper() -> ValueMapper<bool> {
    Arc::new(|raw| {
        raw.as_bool()
            .ok_or_else(|| IoError::BadReturn(format!("expected a boolean, got {raw}")))
    })
}

fn unit_mapper() -> ValueMapper<()> {
    Arc::new(|_raw| Ok(()))
}

fn value_mapper() -> ValueMapper<Value> {
    Arc::new(Ok)
}

fn rows_mapper() -> ValueMapper<Vec<Value>> {
    Arc::new(|raw| match raw {
        Value::Array(rows) => Ok(rows),
        other => Err(IoError::BadReturn(format!("expected an array, got {other}"))),
    })
}

fn typed_mapper<T: serde::de::DeserializeOwned + Send + 'static>() -> ValueMapper<T> {
    Arc::new(|raw| serde_json::from_value(raw).map_err(|e| IoError::BadReturn(e.to_string())))
}
