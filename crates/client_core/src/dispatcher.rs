use std::{collections::HashMap, fmt};

use dom::{Document, DomError, InsertPosition};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{
    error::CommandError,
    protocol::{render_scalar, Command, CommandBatch, SetType},
};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Dom(#[from] DomError),
    #[error("call target `{name}` is not registered")]
    UnregisteredCall { name: String },
    #[error("script commands are disabled")]
    ScriptDisabled,
    #[error("call `{name}` failed: {source}")]
    CallFailed { name: String, source: anyhow::Error },
    #[error("script failed: {source}")]
    ScriptFailed { source: anyhow::Error },
}

/// What to do with the rest of a batch once one command fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log, record the failure in the report and keep going.
    #[default]
    Continue,
    /// Stop at the first failure and return it.
    Abort,
}

#[derive(Debug, Default)]
pub struct DispatchReport {
    pub executed: usize,
    pub failures: Vec<(usize, DispatchError)>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Folds a later batch's report into this one; indices keep counting
    /// from where this report's batch ended.
    pub fn merge(&mut self, offset: usize, other: DispatchReport) {
        self.executed += other.executed;
        self.failures.extend(
            other
                .failures
                .into_iter()
                .map(|(index, err)| (offset + index, err)),
        );
    }
}

/// Receives `alert` commands.
pub trait AlertSink: Send + Sync {
    fn alert(&self, message: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn alert(&self, message: &str) {
        info!("dispatch: alert message={message:?}");
    }
}

/// Runs `script` commands. Nothing runs them unless one is installed.
pub trait ScriptHost: Send + Sync {
    fn run(&self, script: &str) -> anyhow::Result<()>;
}

pub type CallTarget = Box<dyn Fn(&[Value]) -> anyhow::Result<()> + Send + Sync>;

/// Functions a `call` command may invoke, by the name the server uses.
#[derive(Default)]
pub struct CallRegistry {
    targets: HashMap<String, CallTarget>,
}

impl fmt::Debug for CallRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("CallRegistry").field("targets", &names).finish()
    }
}

impl CallRegistry {
    pub fn register<F>(&mut self, name: impl Into<String>, target: F) -> &mut Self
    where
        F: Fn(&[Value]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.targets.insert(name.into(), Box::new(target));
        self
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.targets.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.targets.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.targets.keys().map(String::as_str)
    }

    pub fn invoke(&self, name: &str, params: &[Value]) -> Result<(), DispatchError> {
        let target = self
            .targets
            .get(name)
            .ok_or_else(|| DispatchError::UnregisteredCall {
                name: name.to_owned(),
            })?;
        target(params).map_err(|source| DispatchError::CallFailed {
            name: name.to_owned(),
            source,
        })
    }
}

/// Applies command batches to a document, strictly in batch order.
pub struct CommandDispatcher {
    policy: FailurePolicy,
    calls: CallRegistry,
    alerts: Box<dyn AlertSink>,
    scripts: Option<Box<dyn ScriptHost>>,
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("policy", &self.policy)
            .field("calls", &self.calls)
            .field("scripts", &self.scripts.is_some())
            .finish()
    }
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self {
            policy: FailurePolicy::default(),
            calls: CallRegistry::default(),
            alerts: Box::new(LogAlertSink),
            scripts: None,
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_alert_sink(mut self, sink: impl AlertSink + 'static) -> Self {
        self.alerts = Box::new(sink);
        self
    }

    pub fn with_script_host(mut self, host: impl ScriptHost + 'static) -> Self {
        self.scripts = Some(Box::new(host));
        self
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: FailurePolicy) {
        self.policy = policy;
    }

    pub fn calls(&self) -> &CallRegistry {
        &self.calls
    }

    pub fn calls_mut(&mut self) -> &mut CallRegistry {
        &mut self.calls
    }

    pub fn dispatch<D: Document + ?Sized>(
        &self,
        document: &mut D,
        batch: &CommandBatch,
    ) -> Result<DispatchReport, DispatchError> {
        let mut report = DispatchReport::default();
        for (index, entry) in batch.iter().enumerate() {
            let outcome = entry
                .map_err(DispatchError::from)
                .and_then(|command| self.execute(document, &command));
            match outcome {
                Ok(()) => report.executed += 1,
                Err(err) if self.policy == FailurePolicy::Abort => {
                    warn!("dispatch: aborting batch at index={index}: {err}");
                    return Err(err);
                }
                Err(err) => {
                    warn!("dispatch: skipping command index={index}: {err}");
                    report.failures.push((index, err));
                }
            }
        }
        debug!(
            executed = report.executed,
            failed = report.failures.len(),
            "dispatch: batch finished"
        );
        Ok(report)
    }

    /// Runs several batches back to back, as a streamed frame body delivers them.
    pub fn dispatch_all<D: Document + ?Sized>(
        &self,
        document: &mut D,
        batches: &[CommandBatch],
    ) -> Result<DispatchReport, DispatchError> {
        let mut report = DispatchReport::default();
        let mut offset = 0;
        for batch in batches {
            report.merge(offset, self.dispatch(document, batch)?);
            offset += batch.len();
        }
        Ok(report)
    }

    pub fn execute<D: Document + ?Sized>(
        &self,
        document: &mut D,
        command: &Command,
    ) -> Result<(), DispatchError> {
        debug!(kind = command.kind().as_str(), "dispatch: executing command");
        match command {
            Command::Alert { alert } => {
                self.alerts.alert(alert);
                Ok(())
            }
            Command::Html {
                selector,
                set_type,
                html,
            } => process_html(document, selector, *set_type, html),
            Command::Attr {
                selector,
                key,
                value,
                set_type,
            } => process_attr(document, selector, key, value, *set_type),
            Command::Css {
                selector,
                key,
                value,
            } => process_css(document, selector, key, value),
            Command::Script { script } => {
                let host = self.scripts.as_ref().ok_or(DispatchError::ScriptDisabled)?;
                host.run(script)
                    .map_err(|source| DispatchError::ScriptFailed { source })
            }
            Command::Remove { remove } => process_remove(document, remove),
            Command::Call { call, params } => self.calls.invoke(call, params),
        }
    }
}

fn process_html<D: Document + ?Sized>(
    document: &mut D,
    selector: &str,
    set_type: SetType,
    html: &str,
) -> Result<(), DispatchError> {
    for node in document.select(selector)? {
        match set_type {
            SetType::Replace => document.set_inner_html(node, html)?,
            SetType::Append => document.insert_html(node, html, InsertPosition::Append)?,
            SetType::Prepend => document.insert_html(node, html, InsertPosition::Prepend)?,
        }
    }
    Ok(())
}

/// Reads from the first match and writes the combined value to every match.
fn process_attr<D: Document + ?Sized>(
    document: &mut D,
    selector: &str,
    key: &str,
    value: &Value,
    set_type: SetType,
) -> Result<(), DispatchError> {
    let nodes = document.select(selector)?;
    let Some(first) = nodes.first() else {
        return Ok(());
    };
    let value = render_scalar(value);
    let updated = match set_type {
        SetType::Replace => value,
        SetType::Append => {
            let current = document.property(*first, key)?.unwrap_or_default();
            current + &value
        }
        SetType::Prepend => {
            let current = document.property(*first, key)?.unwrap_or_default();
            value + &current
        }
    };
    for node in nodes {
        document.set_property(node, key, &updated)?;
    }
    Ok(())
}

fn process_css<D: Document + ?Sized>(
    document: &mut D,
    selector: &str,
    key: &str,
    value: &Value,
) -> Result<(), DispatchError> {
    let value = render_scalar(value);
    for node in document.select(selector)? {
        document.set_style(node, key, &value)?;
    }
    Ok(())
}

fn process_remove<D: Document + ?Sized>(
    document: &mut D,
    selector: &str,
) -> Result<(), DispatchError> {
    for node in document.select(selector)? {
        document.remove(node)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
