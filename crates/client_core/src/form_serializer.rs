use std::collections::HashSet;

use dom::{ControlValue, Document, DomError, NodeId};
use shared::form::{FieldName, FormValue};
use tracing::debug;

const CONTROL_SELECTOR: &str = "input, textarea, select";

/// Flattens form controls into the nested payload the server deserializes.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormSerializer;

impl FormSerializer {
    pub fn new() -> Self {
        Self
    }

    /// Serializes the controls under every element `container_selector` matches.
    ///
    /// Each control is taken once, in document order, even when matched
    /// containers nest. A selector that matches nothing yields an empty mapping.
    pub fn serialize<D: Document + ?Sized>(
        &self,
        document: &D,
        container_selector: &str,
    ) -> Result<FormValue, DomError> {
        // Containers come back in document order, so an outer match already
        // lists every control of the matches nested inside it.
        let mut seen = HashSet::new();
        let mut controls = Vec::new();
        for container in document.select(container_selector)? {
            for node in document.select_within(container, CONTROL_SELECTOR)? {
                if seen.insert(node) {
                    controls.push(node);
                }
            }
        }
        let mut values = FormValue::default();
        self.collect(document, &controls, &mut values)?;
        Ok(values)
    }

    pub fn serialize_node<D: Document + ?Sized>(
        &self,
        document: &D,
        container: NodeId,
    ) -> Result<FormValue, DomError> {
        let controls = document.select_within(container, CONTROL_SELECTOR)?;
        let mut values = FormValue::default();
        self.collect(document, &controls, &mut values)?;
        Ok(values)
    }

    fn collect<D: Document + ?Sized>(
        &self,
        document: &D,
        controls: &[NodeId],
        values: &mut FormValue,
    ) -> Result<(), DomError> {
        for &node in controls {
            let Some(control) = document.form_control(node)? else {
                continue;
            };
            let Some(name) = control.name.as_deref().filter(|name| !name.is_empty()) else {
                continue;
            };
            if control.disabled || (control.is_checkable() && !control.checked) {
                continue;
            }
            let field = match FieldName::parse(name) {
                Ok(field) => field,
                Err(err) => {
                    debug!("form: skipping control {node}: {err}");
                    continue;
                }
            };

            let inserted = match control.value {
                ControlValue::Single(text) => values.insert(&field, FormValue::Text(text)),
                ControlValue::Multiple(selected) if field.is_list_append() => selected
                    .into_iter()
                    .try_for_each(|text| values.insert(&field, FormValue::Text(text))),
                ControlValue::Multiple(selected) => values.insert(
                    &field,
                    FormValue::List(selected.into_iter().map(FormValue::Text).collect()),
                ),
            };
            if let Err(conflict) = inserted {
                debug!("form: skipping control {node}: {conflict}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/form_serializer_tests.rs"]
mod tests;
