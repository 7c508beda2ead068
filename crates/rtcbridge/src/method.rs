use rtcbridge_channel::ChannelError;
use rtcbridge_render::RenderError;
use serde::Serialize;
use serde_json::{Map, Value};

/// Structured failure returned to the host for a method call.
///
/// `code` follows the host plugin's per-method naming; `kind` is the
/// underlying error category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct MethodError {
    pub code: String,
    pub kind: &'static str,
    pub message: String,
}

impl MethodError {
    pub fn new(code: impl Into<String>, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn not_implemented(method: &str) -> Self {
        Self::new("notImplemented", "NotImplemented", format!("unknown method `{method}`"))
    }

    pub(crate) fn invalid_arguments(method: &str, message: impl Into<String>) -> Self {
        Self::new(failure_code(method), "InvalidArguments", message)
    }

    pub(crate) fn channel(method: &str, err: ChannelError) -> Self {
        Self::new(failure_code(method), err.kind(), format!("{method}() {err}"))
    }

    pub(crate) fn render(method: &str, err: RenderError) -> Self {
        Self::new(failure_code(method), err.kind(), format!("{method}() {err}"))
    }
}

/// Error code reported for a failing method.
pub(crate) fn failure_code(method: &str) -> String {
    match method {
        "videoRendererDispose" => "VideoRendererDisposeFailed".to_string(),
        other => format!("{other}Failed"),
    }
}

static NULL: Value = Value::Null;

/// Typed access to a method's argument map.
pub(crate) struct Args<'a> {
    method: &'a str,
    map: Option<&'a Map<String, Value>>,
}

impl<'a> Args<'a> {
    pub(crate) fn new(method: &'a str, value: &'a Value) -> Result<Self, MethodError> {
        match value {
            Value::Null => Ok(Self { method, map: None }),
            Value::Object(map) => Ok(Self {
                method,
                map: Some(map),
            }),
            _ => Err(MethodError::invalid_arguments(
                method,
                "arguments must be a map",
            )),
        }
    }

    /// The raw value, `Null` when absent.
    pub(crate) fn value(&self, key: &str) -> &'a Value {
        self.map
            .and_then(|map| map.get(key))
            .unwrap_or(&NULL)
    }

    pub(crate) fn str(&self, key: &str) -> Result<&'a str, MethodError> {
        self.value(key).as_str().ok_or_else(|| self.missing(key, "a string"))
    }

    pub(crate) fn opt_str(&self, key: &str) -> Option<&'a str> {
        self.value(key).as_str()
    }

    /// Integers may arrive as numbers or numeric strings.
    pub(crate) fn i64(&self, key: &str) -> Result<i64, MethodError> {
        let value = self.value(key);
        value
            .as_i64()
            .or_else(|| value.as_str().and_then(|text| text.parse().ok()))
            .ok_or_else(|| self.missing(key, "an integer"))
    }

    fn missing(&self, key: &str, expected: &str) -> MethodError {
        MethodError::invalid_arguments(self.method, format!("`{key}` must be {expected}"))
    }
}
