use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::CommandError;

/// POST field carrying the name of the server-side function to invoke.
pub const PARAM_REQUEST: &str = "sijax_rq";
/// POST field carrying the JSON-encoded argument list.
pub const PARAM_ARGS: &str = "sijax_args";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Alert,
    Html,
    Attr,
    Css,
    Script,
    Remove,
    Call,
}

impl CommandKind {
    pub const ALL: [CommandKind; 7] = [
        CommandKind::Alert,
        CommandKind::Html,
        CommandKind::Attr,
        CommandKind::Css,
        CommandKind::Script,
        CommandKind::Remove,
        CommandKind::Call,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alert => "alert",
            Self::Html => "html",
            Self::Attr => "attr",
            Self::Css => "css",
            Self::Script => "script",
            Self::Remove => "remove",
            Self::Call => "call",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

/// How `html` and `attr` commands combine new content with what is already there.
///
/// Anything other than `replace` or `append`, including a missing field,
/// `null` or a non-string value, behaves as `prepend`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetType {
    Replace,
    Append,
    #[default]
    Prepend,
}

impl<'de> Deserialize<'de> for SetType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(name) if name == "replace" => Self::Replace,
            Value::String(name) if name == "append" => Self::Append,
            _ => Self::Prepend,
        })
    }
}

/// Accepts any JSON scalar where text is expected, rendered as `render_scalar` does.
fn scalar_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Value::deserialize(deserializer).map(|value| render_scalar(&value))
}

/// One declarative UI mutation pushed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Alert {
        #[serde(deserialize_with = "scalar_text")]
        alert: String,
    },
    Html {
        selector: String,
        #[serde(rename = "setType", default)]
        set_type: SetType,
        #[serde(deserialize_with = "scalar_text")]
        html: String,
    },
    Attr {
        selector: String,
        key: String,
        #[serde(default)]
        value: Value,
        #[serde(rename = "setType", default)]
        set_type: SetType,
    },
    Css {
        selector: String,
        key: String,
        #[serde(default)]
        value: Value,
    },
    Script {
        script: String,
    },
    Remove {
        remove: String,
    },
    Call {
        call: String,
        #[serde(default)]
        params: Vec<Value>,
    },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Alert { .. } => CommandKind::Alert,
            Self::Html { .. } => CommandKind::Html,
            Self::Attr { .. } => CommandKind::Attr,
            Self::Css { .. } => CommandKind::Css,
            Self::Script { .. } => CommandKind::Script,
            Self::Remove { .. } => CommandKind::Remove,
            Self::Call { .. } => CommandKind::Call,
        }
    }

    /// Decodes one raw wire entry, telling unknown types apart from bad fields.
    pub fn from_value(value: Value) -> Result<Self, CommandError> {
        let command_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(CommandError::MissingType)?
            .to_owned();
        if CommandKind::from_name(&command_type).is_none() {
            return Err(CommandError::UnknownCommandType { command_type });
        }
        serde_json::from_value(value).map_err(|source| CommandError::Malformed {
            command_type,
            source,
        })
    }
}

/// Renders a JSON scalar the way string concatenation in a page would.
pub fn render_scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum BatchEntry {
    Command(Command),
    Raw(Value),
}

impl BatchEntry {
    fn decode(&self) -> Result<Command, CommandError> {
        match self {
            Self::Command(command) => Ok(command.clone()),
            Self::Raw(value) => Command::from_value(value.clone()),
        }
    }
}

/// Ordered commands processed as a unit.
///
/// Entries stay raw until dispatch so a single unknown entry does not
/// poison the rest of the batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandBatch {
    entries: Vec<BatchEntry>,
}

impl CommandBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> String {
        Value::Array(self.to_values()).to_string()
    }

    pub fn to_values(&self) -> Vec<Value> {
        self.entries
            .iter()
            .map(|entry| match entry {
                BatchEntry::Raw(value) => value.clone(),
                BatchEntry::Command(command) => command_to_value(command),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<Command, CommandError>> + '_ {
        self.entries.iter().map(BatchEntry::decode)
    }

    pub fn push(&mut self, command: Command) -> &mut Self {
        self.entries.push(BatchEntry::Command(command));
        self
    }

    pub fn push_raw(&mut self, value: Value) -> &mut Self {
        self.entries.push(BatchEntry::Raw(value));
        self
    }

    pub fn extend(&mut self, other: CommandBatch) -> &mut Self {
        self.entries.extend(other.entries);
        self
    }

    pub fn clear(&mut self) -> &mut Self {
        self.entries.clear();
        self
    }

    pub fn alert(&mut self, message: impl Into<String>) -> &mut Self {
        self.push(Command::Alert {
            alert: message.into(),
        })
    }

    pub fn html(&mut self, selector: impl Into<String>, html: impl Into<String>) -> &mut Self {
        self.html_with(selector, html, SetType::Replace)
    }

    pub fn html_append(
        &mut self,
        selector: impl Into<String>,
        html: impl Into<String>,
    ) -> &mut Self {
        self.html_with(selector, html, SetType::Append)
    }

    pub fn html_prepend(
        &mut self,
        selector: impl Into<String>,
        html: impl Into<String>,
    ) -> &mut Self {
        self.html_with(selector, html, SetType::Prepend)
    }

    fn html_with(
        &mut self,
        selector: impl Into<String>,
        html: impl Into<String>,
        set_type: SetType,
    ) -> &mut Self {
        self.push(Command::Html {
            selector: selector.into(),
            set_type,
            html: html.into(),
        })
    }

    pub fn script(&mut self, script: impl Into<String>) -> &mut Self {
        self.push(Command::Script {
            script: script.into(),
        })
    }

    pub fn css(
        &mut self,
        selector: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.push(Command::Css {
            selector: selector.into(),
            key: key.into(),
            value: value.into(),
        })
    }

    pub fn attr(
        &mut self,
        selector: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.attr_with(selector, key, value, SetType::Replace)
    }

    pub fn attr_append(
        &mut self,
        selector: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.attr_with(selector, key, value, SetType::Append)
    }

    pub fn attr_prepend(
        &mut self,
        selector: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.attr_with(selector, key, value, SetType::Prepend)
    }

    fn attr_with(
        &mut self,
        selector: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Value>,
        set_type: SetType,
    ) -> &mut Self {
        self.push(Command::Attr {
            selector: selector.into(),
            key: key.into(),
            value: value.into(),
            set_type,
        })
    }

    pub fn remove(&mut self, selector: impl Into<String>) -> &mut Self {
        self.push(Command::Remove {
            remove: selector.into(),
        })
    }

    /// Navigates the page by way of a `script` command.
    pub fn redirect(&mut self, uri: &str) -> &mut Self {
        let target = Value::String(uri.to_owned());
        self.script(format!("window.location = {target};"))
    }

    pub fn call(&mut self, function: impl Into<String>, params: Vec<Value>) -> &mut Self {
        self.push(Command::Call {
            call: function.into(),
            params,
        })
    }
}

fn command_to_value(command: &Command) -> Value {
    use serde_json::json;

    match command {
        Command::Alert { alert } => json!({ "type": "alert", "alert": alert }),
        Command::Html {
            selector,
            set_type,
            html,
        } => json!({
            "type": "html",
            "selector": selector,
            "setType": set_type,
            "html": html,
        }),
        Command::Attr {
            selector,
            key,
            value,
            set_type,
        } => json!({
            "type": "attr",
            "selector": selector,
            "key": key,
            "value": value,
            "setType": set_type,
        }),
        Command::Css {
            selector,
            key,
            value,
        } => json!({ "type": "css", "selector": selector, "key": key, "value": value }),
        Command::Script { script } => json!({ "type": "script", "script": script }),
        Command::Remove { remove } => json!({ "type": "remove", "remove": remove }),
        Command::Call { call, params } => json!({ "type": "call", "call": call, "params": params }),
    }
}

impl From<Vec<Value>> for CommandBatch {
    fn from(values: Vec<Value>) -> Self {
        Self {
            entries: values.into_iter().map(BatchEntry::Raw).collect(),
        }
    }
}

impl FromIterator<Command> for CommandBatch {
    fn from_iter<I: IntoIterator<Item = Command>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(BatchEntry::Command).collect(),
        }
    }
}

impl Serialize for CommandBatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_values().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CommandBatch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Value>::deserialize(deserializer).map(Self::from)
    }
}

/// Arguments of one call to a server-side function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPayload {
    pub function: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl RequestPayload {
    pub fn new(function: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            function: function.into(),
            args,
        }
    }

    pub fn encoded_args(&self) -> String {
        Value::Array(self.args.clone()).to_string()
    }

    /// The POST body fields, in the order the server reads them.
    pub fn form_fields(&self) -> [(&'static str, String); 2] {
        [
            (PARAM_REQUEST, self.function.clone()),
            (PARAM_ARGS, self.encoded_args()),
        ]
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
