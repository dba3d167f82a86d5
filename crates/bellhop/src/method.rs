//! The component method catalogue.
//!
//! The set of method names is closed and shared with the coordinator. Each
//! method carries three pure validators (props, state, returns) that map a
//! wire value to its canonical form or reject it; validators are idempotent
//! and may run many times across re-renders of one batch.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MethodName {
    InputText,
    InputBoolean,
    InputNumber,
    InputEmailAddress,
    InputRichText,
    Search,
    Confirm,
    SelectSingle,
    SelectMultiple,
    SelectTable,
    DisplayHeading,
    DisplayMarkdown,
    DisplayLink,
    DisplayObject,
    DisplayTable,
    InputSpreadsheet,
    InputDate,
    InputTime,
    InputDatetime,
    UploadFile,
}

impl MethodName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputText => "INPUT_TEXT",
            Self::InputBoolean => "INPUT_BOOLEAN",
            Self::InputNumber => "INPUT_NUMBER",
            Self::InputEmailAddress => "INPUT_EMAIL_ADDRESS",
            Self::InputRichText => "INPUT_RICH_TEXT",
            Self::Search => "SEARCH",
            Self::Confirm => "CONFIRM",
            Self::SelectSingle => "SELECT_SINGLE",
            Self::SelectMultiple => "SELECT_MULTIPLE",
            Self::SelectTable => "SELECT_TABLE",
            Self::DisplayHeading => "DISPLAY_HEADING",
            Self::DisplayMarkdown => "DISPLAY_MARKDOWN",
            Self::DisplayLink => "DISPLAY_LINK",
            Self::DisplayObject => "DISPLAY_OBJECT",
            Self::DisplayTable => "DISPLAY_TABLE",
            Self::InputSpreadsheet => "INPUT_SPREADSHEET",
            Self::InputDate => "INPUT_DATE",
            Self::InputTime => "INPUT_TIME",
            Self::InputDatetime => "INPUT_DATETIME",
            Self::UploadFile => "UPLOAD_FILE",
        }
    }
}

impl std::fmt::Display for MethodName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `value -> canonical value | message`.
pub type Validator = fn(Value) -> Result<Value, String>;

/// Schema triple plus grouping constraint for one method.
#[derive(Clone, Copy)]
pub struct MethodDef {
    pub name: MethodName,
    /// Exclusive methods render full-screen and can never join a group.
    pub exclusive: bool,
    pub props: Validator,
    pub state: Validator,
    pub returns: Validator,
}

/// Look up the schema triple for a method.
pub fn lookup(name: MethodName) -> MethodDef {
    use validators::*;
    let (exclusive, props, state, returns): (bool, Validator, Validator, Validator) = match name {
        MethodName::InputText => (false, object_or_null, any, string),
        MethodName::InputBoolean => (false, object_or_null, any, boolean),
        MethodName::InputNumber => (false, object_or_null, any, number),
        MethodName::InputEmailAddress => (false, object_or_null, any, email),
        MethodName::InputRichText => (false, object_or_null, any, string),
        MethodName::Search => (false, object_or_null, string_or_null, any),
        MethodName::Confirm => (true, object_or_null, any, boolean),
        MethodName::SelectSingle => (false, object_or_null, any, object),
        MethodName::SelectMultiple => (false, object_or_null, any, array),
        MethodName::SelectTable => (false, object_or_null, any, array),
        MethodName::DisplayHeading => (false, object_or_null, any, null),
        MethodName::DisplayMarkdown => (false, object_or_null, any, null),
        MethodName::DisplayLink => (false, object_or_null, any, null),
        MethodName::DisplayObject => (false, object_or_null, any, null),
        MethodName::DisplayTable => (false, object_or_null, any, null),
        MethodName::InputSpreadsheet => (false, object_or_null, any, array),
        MethodName::InputDate => (false, object_or_null, any, date_string),
        MethodName::InputTime => (false, object_or_null, any, time_string),
        MethodName::InputDatetime => (false, object_or_null, any, datetime_string),
        MethodName::UploadFile => (false, object_or_null, any, object),
    };
    MethodDef {
        name,
        exclusive,
        props,
        state,
        returns,
    }
}

mod validators {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
    use serde_json::Value;

    pub fn any(v: Value) -> Result<Value, String> {
        Ok(v)
    }

    pub fn object_or_null(v: Value) -> Result<Value, String> {
        match v {
            Value::Object(_) | Value::Null => Ok(v),
            other => Err(format!("expected an object, got {other}")),
        }
    }

    pub fn object(v: Value) -> Result<Value, String> {
        match v {
            Value::Object(_) => Ok(v),
            other => Err(format!("expected an object, got {other}")),
        }
    }

    pub fn array(v: Value) -> Result<Value, String> {
        match v {
            Value::Array(_) => Ok(v),
            other => Err(format!("expected an array, got {other}")),
        }
    }

    pub fn string(v: Value) -> Result<Value, String> {
        match v {
            Value::String(_) => Ok(v),
            other => Err(format!("expected a string, got {other}")),
        }
    }

    pub fn string_or_null(v: Value) -> Result<Value, String> {
        match v {
            Value::String(_) | Value::Null => Ok(v),
            other => Err(format!("expected a string, got {other}")),
        }
    }

    pub fn number(v: Value) -> Result<Value, String> {
        match v {
            Value::Number(_) => Ok(v),
            other => Err(format!("expected a number, got {other}")),
        }
    }

    pub fn boolean(v: Value) -> Result<Value, String> {
        match v {
            Value::Bool(_) => Ok(v),
            other => Err(format!("expected a boolean, got {other}")),
        }
    }

    pub fn null(v: Value) -> Result<Value, String> {
        match v {
            Value::Null => Ok(v),
            other => Err(format!("expected null, got {other}")),
        }
    }

    pub fn email(v: Value) -> Result<Value, String> {
        match &v {
            Value::String(s) if s.contains('@') && !s.starts_with('@') && !s.ends_with('@') => {
                Ok(v)
            }
            other => Err(format!("expected an email address, got {other}")),
        }
    }

    pub fn date_string(v: Value) -> Result<Value, String> {
        match &v {
            Value::String(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(|_| v.clone())
                .map_err(|e| format!("expected a YYYY-MM-DD date: {e}")),
            other => Err(format!("expected a date string, got {other}")),
        }
    }

    pub fn time_string(v: Value) -> Result<Value, String> {
        match &v {
            Value::String(s) => NaiveTime::parse_from_str(s, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .map(|_| v.clone())
                .map_err(|e| format!("expected an HH:MM[:SS] time: {e}")),
            other => Err(format!("expected a time string, got {other}")),
        }
    }

    pub fn datetime_string(v: Value) -> Result<Value, String> {
        match &v {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|_| ())
                .or_else(|_| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").map(|_| ())
                })
                .map(|_| v.clone())
                .map_err(|e| format!("expected an RFC 3339 datetime: {e}")),
            other => Err(format!("expected a datetime string, got {other}")),
        }
    }
}
