use thiserror::Error;

/// Failure to turn one raw batch entry into a [`crate::protocol::Command`].
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command entry has no string `type` field")]
    MissingType,
    #[error("unknown command type `{command_type}`")]
    UnknownCommandType { command_type: String },
    #[error("malformed `{command_type}` command: {source}")]
    Malformed {
        command_type: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CommandError {
    pub fn command_type(&self) -> Option<&str> {
        match self {
            Self::MissingType => None,
            Self::UnknownCommandType { command_type } | Self::Malformed { command_type, .. } => {
                Some(command_type)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldNameError {
    #[error("field name `{name}` does not match `outer[key]...[key]`")]
    Malformed { name: String },
    #[error("field name is empty")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field `{name}` collides with an existing value of a different shape")]
pub struct ShapeConflict {
    pub name: String,
}
