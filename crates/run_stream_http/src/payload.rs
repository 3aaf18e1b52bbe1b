use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// One multipart field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File {
        bytes: Vec<u8>,
        file_name: Option<String>,
        mime: Option<String>,
    },
}

/// Ordered multipart form fields. Kept as plain data so a request can be
/// rebuilt for every retry attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormBody {
    fields: Vec<(String, FormValue)>,
}

impl FormBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields
            .push((name.into(), FormValue::Text(value.into())));
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
        file_name: Option<String>,
        mime: Option<String>,
    ) -> Self {
        self.fields.push((
            name.into(),
            FormValue::File {
                bytes: bytes.into(),
                file_name,
                mime,
            },
        ));
        self
    }

    pub fn fields(&self) -> &[(String, FormValue)] {
        &self.fields
    }

    /// First text value stored under `name`.
    pub fn text_value(&self, name: &str) -> Option<&str> {
        self.fields.iter().find_map(|(key, value)| match value {
            FormValue::Text(text) if key == name => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for FormBody
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |form, (key, value)| form.text(key, value))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Map<String, Value>),
    Form(FormBody),
}

impl RequestBody {
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json(_))
    }
}

/// A run stream request: where to post, caller headers and the body.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub url: String,
    /// Caller headers; these win over every default.
    pub headers: BTreeMap<String, String>,
    pub body: RequestBody,
}

impl StreamRequest {
    pub fn json(url: impl Into<String>, body: Map<String, Value>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            body: RequestBody::Json(body),
        }
    }

    pub fn form(url: impl Into<String>, body: FormBody) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            body: RequestBody::Form(body),
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }
}

/// Form submission that starts an agent or team run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunRequest {
    pub message: String,
    pub session_id: Option<String>,
    /// Additional form fields, appended after the standard ones.
    pub extra_fields: BTreeMap<String, String>,
}

impl RunRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_fields.insert(key.into(), value.into());
        self
    }

    /// Fields: `message`, `stream=true`, `session_id` when non-blank, then extras.
    pub fn to_form(&self) -> FormBody {
        let mut form = FormBody::new()
            .text("message", self.message.as_str())
            .text("stream", "true");
        if let Some(session_id) = self
            .session_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            form = form.text("session_id", session_id);
        }
        for (key, value) in &self.extra_fields {
            form = form.text(key.as_str(), value.as_str());
        }
        form
    }

    pub fn into_stream_request(self, url: impl Into<String>) -> StreamRequest {
        StreamRequest::form(url, self.to_form())
    }
}
