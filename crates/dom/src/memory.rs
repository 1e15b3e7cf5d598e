use tracing::trace;

use crate::{
    html::{self, Fragment},
    selector::{self, Combinator, Complex, Compound, Pseudo},
    style, ControlKind, ControlValue, Document, DomError, FormControl, InsertPosition, NodeId,
};

const BOOLEAN_PROPERTIES: &[&str] = &[
    "checked", "disabled", "selected", "multiple", "readonly", "required", "hidden",
];

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    attrs: Vec<(String, String)>,
    dirty_value: Option<String>,
    dirty_checked: Option<bool>,
    dirty_selected: Option<bool>,
}

impl Element {
    fn new(tag: String, attrs: Vec<(String, String)>) -> Self {
        Self {
            tag,
            attrs,
            dirty_value: None,
            dirty_checked: None,
            dirty_selected: None,
        }
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    fn set_attr(&mut self, name: &str, value: &str) {
        match self.attrs.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value.to_owned(),
            None => self.attrs.push((name.to_owned(), value.to_owned())),
        }
    }

    fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(key, _)| key != name);
    }

    fn input_type(&self) -> String {
        self.attr("type")
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| "text".to_owned())
    }

    fn is_checkable_input(&self) -> bool {
        self.tag == "input" && matches!(self.input_type().as_str(), "checkbox" | "radio")
    }

    fn checked(&self) -> bool {
        self.dirty_checked.unwrap_or_else(|| self.has_attr("checked"))
    }

    fn selected(&self) -> bool {
        self.dirty_selected
            .unwrap_or_else(|| self.has_attr("selected"))
    }
}

#[derive(Debug, Clone)]
enum NodeData {
    Root,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

/// Arena-backed document used by tools and tests.
///
/// Removed nodes stay in the arena but are detached, so stale ids keep
/// resolving without being reachable from selectors.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                data: NodeData::Root,
            }],
            root: NodeId(0),
        }
    }

    pub fn parse(markup: &str) -> Self {
        let mut document = Self::new();
        let root = document.root;
        document.attach_fragments(root, None, html::parse_fragment(markup));
        document
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for child in &self.nodes[self.root.0].children {
            self.write_node(*child, &mut out);
        }
        out
    }

    pub fn inner_html(&self, node: NodeId) -> Result<String, DomError> {
        let mut out = String::new();
        for child in &self.node(node)?.children {
            self.write_node(*child, &mut out);
        }
        Ok(out)
    }

    pub fn outer_html(&self, node: NodeId) -> Result<String, DomError> {
        self.node(node)?;
        let mut out = String::new();
        self.write_node(node, &mut out);
        Ok(out)
    }

    pub fn text_content(&self, node: NodeId) -> Result<String, DomError> {
        let mut out = String::new();
        self.collect_text(self.node(node)?, &mut out);
        Ok(out)
    }

    pub fn first(&self, selector: &str) -> Result<Option<NodeId>, DomError> {
        Ok(self.select(selector)?.into_iter().next())
    }

    pub fn tag_name(&self, node: NodeId) -> Result<&str, DomError> {
        Ok(self.element(node)?.tag.as_str())
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Result<Option<&str>, DomError> {
        Ok(self.element(node)?.attr(&name.to_ascii_lowercase()))
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == self.root {
                return true;
            }
            current = self.nodes.get(id.0).and_then(|n| n.parent);
        }
        false
    }

    /// Simulates the user typing into a control.
    pub fn set_value(&mut self, node: NodeId, value: &str) -> Result<(), DomError> {
        self.set_property(node, "value", value)
    }

    /// Simulates the user ticking or clearing a checkbox or radio.
    pub fn set_checked(&mut self, node: NodeId, checked: bool) -> Result<(), DomError> {
        let is_radio = {
            let element = self.element_mut(node)?;
            element.dirty_checked = Some(checked);
            element.input_type() == "radio"
        };
        if checked && is_radio {
            self.uncheck_radio_group(node)?;
        }
        Ok(())
    }

    fn uncheck_radio_group(&mut self, node: NodeId) -> Result<(), DomError> {
        let Some(name) = self.element(node)?.attr("name").map(str::to_owned) else {
            return Ok(());
        };
        let scope = self
            .ancestor_with_tag(node, "form")
            .unwrap_or(self.root);
        for other in self.element_descendants(scope) {
            if other == node {
                continue;
            }
            let element = self.element_mut(other)?;
            if element.tag == "input"
                && element.input_type() == "radio"
                && element.attr("name") == Some(name.as_str())
            {
                element.dirty_checked = Some(false);
            }
        }
        Ok(())
    }

    fn node(&self, id: NodeId) -> Result<&Node, DomError> {
        self.nodes.get(id.0).ok_or(DomError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.nodes.get_mut(id.0).ok_or(DomError::UnknownNode(id))
    }

    fn element(&self, id: NodeId) -> Result<&Element, DomError> {
        match &self.node(id)?.data {
            NodeData::Element(element) => Ok(element),
            _ => Err(DomError::NotAnElement(id)),
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut Element, DomError> {
        match &mut self.node_mut(id)?.data {
            NodeData::Element(element) => Ok(element),
            _ => Err(DomError::NotAnElement(id)),
        }
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            data,
        });
        id
    }

    fn build(&mut self, fragment: Fragment) -> NodeId {
        match fragment {
            Fragment::Text(text) => self.alloc(NodeData::Text(text)),
            Fragment::Element {
                tag,
                attrs,
                children,
            } => {
                let id = self.alloc(NodeData::Element(Element::new(tag, attrs)));
                let child_ids: Vec<NodeId> = children
                    .into_iter()
                    .map(|child| self.build(child))
                    .collect();
                for child in &child_ids {
                    self.nodes[child.0].parent = Some(id);
                }
                self.nodes[id.0].children = child_ids;
                id
            }
        }
    }

    /// Builds `fragments` and splices them under `parent` at `index`
    /// (or at the end when `index` is `None`).
    fn attach_fragments(&mut self, parent: NodeId, index: Option<usize>, fragments: Vec<Fragment>) {
        let ids: Vec<NodeId> = fragments
            .into_iter()
            .map(|fragment| self.build(fragment))
            .collect();
        for id in &ids {
            self.nodes[id.0].parent = Some(parent);
        }
        let children = &mut self.nodes[parent.0].children;
        let at = index.unwrap_or(children.len()).min(children.len());
        children.splice(at..at, ids);
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|child| *child != node);
        }
    }

    fn element_descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[root.0].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if matches!(self.nodes[id.0].data, NodeData::Element(_)) {
                out.push(id);
            }
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        out
    }

    fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.nodes[node.0].parent?;
        matches!(self.nodes[parent.0].data, NodeData::Element(_)).then_some(parent)
    }

    fn ancestor_with_tag(&self, node: NodeId, tag: &str) -> Option<NodeId> {
        let mut current = self.parent_element(node);
        while let Some(id) = current {
            if self.element(id).is_ok_and(|element| element.tag == tag) {
                return Some(id);
            }
            current = self.parent_element(id);
        }
        None
    }

    /// Own `disabled` attribute, or a control inside a disabled fieldset
    /// outside that fieldset's first legend.
    fn is_disabled(&self, node: NodeId) -> bool {
        let Ok(element) = self.element(node) else {
            return false;
        };
        if element.has_attr("disabled") {
            return true;
        }
        if element.tag == "option" {
            return self
                .parent_element(node)
                .and_then(|parent| self.element(parent).ok())
                .is_some_and(|parent| parent.tag == "optgroup" && parent.has_attr("disabled"));
        }
        if !matches!(
            element.tag.as_str(),
            "input" | "select" | "textarea" | "button" | "fieldset"
        ) {
            return false;
        }
        let mut child = node;
        let mut current = self.parent_element(node);
        while let Some(id) = current {
            let disabled_fieldset = self
                .element(id)
                .is_ok_and(|element| element.tag == "fieldset" && element.has_attr("disabled"));
            if disabled_fieldset && self.first_legend(id) != Some(child) {
                return true;
            }
            child = id;
            current = self.parent_element(id);
        }
        false
    }

    fn first_legend(&self, fieldset: NodeId) -> Option<NodeId> {
        self.nodes[fieldset.0]
            .children
            .iter()
            .copied()
            .find(|id| self.element(*id).is_ok_and(|element| element.tag == "legend"))
    }

    fn sibling_elements(&self, node: NodeId) -> Vec<NodeId> {
        let Some(parent) = self.nodes[node.0].parent else {
            return vec![node];
        };
        self.nodes[parent.0]
            .children
            .iter()
            .copied()
            .filter(|id| matches!(self.nodes[id.0].data, NodeData::Element(_)))
            .collect()
    }

    fn collect_text(&self, node: &Node, out: &mut String) {
        match &node.data {
            NodeData::Text(text) => out.push_str(text),
            _ => {
                for child in &node.children {
                    self.collect_text(&self.nodes[child.0], out);
                }
            }
        }
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let node = &self.nodes[id.0];
        match &node.data {
            NodeData::Root => {
                for child in &node.children {
                    self.write_node(*child, out);
                }
            }
            NodeData::Text(text) => {
                let raw = self
                    .parent_element(id)
                    .and_then(|parent| self.element(parent).ok())
                    .is_some_and(|parent| matches!(parent.tag.as_str(), "script" | "style"));
                if raw {
                    out.push_str(text);
                } else {
                    out.push_str(&html::escape_text(text));
                }
            }
            NodeData::Element(element) => {
                out.push('<');
                out.push_str(&element.tag);
                for (name, value) in &element.attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&html::escape_attr(value));
                    out.push('"');
                }
                out.push('>');
                if html::is_void(&element.tag) {
                    return;
                }
                for child in &node.children {
                    self.write_node(*child, out);
                }
                out.push_str("</");
                out.push_str(&element.tag);
                out.push('>');
            }
        }
    }

    fn options(&self, select: NodeId) -> Vec<NodeId> {
        self.element_descendants(select)
            .into_iter()
            .filter(|id| self.element(*id).is_ok_and(|element| element.tag == "option"))
            .collect()
    }

    fn option_value(&self, option: NodeId) -> Result<String, DomError> {
        match self.element(option)?.attr("value") {
            Some(value) => Ok(value.to_owned()),
            None => Ok(self.text_content(option)?.trim().to_owned()),
        }
    }

    fn selected_options(&self, select: NodeId) -> Result<Vec<NodeId>, DomError> {
        let mut selected = Vec::new();
        for option in self.options(select) {
            if self.element(option)?.selected() {
                selected.push(option);
            }
        }
        Ok(selected)
    }

    fn current_value(&self, node: NodeId) -> Result<ControlValue, DomError> {
        let element = self.element(node)?;
        match element.tag.as_str() {
            "textarea" => match &element.dirty_value {
                Some(value) => Ok(ControlValue::Single(value.clone())),
                None => Ok(ControlValue::Single(self.text_content(node)?)),
            },
            "select" if element.has_attr("multiple") => {
                let mut values = Vec::new();
                for option in self.selected_options(node)? {
                    values.push(self.option_value(option)?);
                }
                Ok(ControlValue::Multiple(values))
            }
            "select" => {
                let chosen = match self.selected_options(node)?.last() {
                    Some(option) => Some(*option),
                    None => self
                        .options(node)
                        .into_iter()
                        .find(|option| !self.is_disabled(*option)),
                };
                match chosen {
                    Some(option) => Ok(ControlValue::Single(self.option_value(option)?)),
                    None => Ok(ControlValue::Single(String::new())),
                }
            }
            _ => {
                let value = match (&element.dirty_value, element.attr("value")) {
                    (Some(value), _) => value.clone(),
                    (None, Some(value)) => value.to_owned(),
                    (None, None) if element.is_checkable_input() => "on".to_owned(),
                    (None, None) => String::new(),
                };
                Ok(ControlValue::Single(value))
            }
        }
    }

    fn matches_compound(&self, node: NodeId, compound: &Compound) -> bool {
        let Ok(element) = self.element(node) else {
            return false;
        };
        if compound.tag.as_deref().is_some_and(|tag| tag != element.tag) {
            return false;
        }
        if let Some(id) = &compound.id {
            if element.attr("id") != Some(id.as_str()) {
                return false;
            }
        }
        if !compound.classes.is_empty() {
            let classes = element.attr("class").unwrap_or_default();
            let has = |class: &String| classes.split_ascii_whitespace().any(|c| c == class);
            if !compound.classes.iter().all(has) {
                return false;
            }
        }
        let attrs_match = compound.attrs.iter().all(|matcher| {
            element
                .attr(&matcher.name)
                .is_some_and(|actual| matcher.op.matches(actual))
        });
        if !attrs_match {
            return false;
        }
        compound.pseudos.iter().all(|pseudo| match pseudo {
            Pseudo::Checked => {
                (element.is_checkable_input() && element.checked())
                    || (element.tag == "option" && element.selected())
            }
            Pseudo::Disabled => self.is_disabled(node),
            Pseudo::Enabled => {
                matches!(
                    element.tag.as_str(),
                    "input" | "select" | "textarea" | "button" | "option"
                ) && !self.is_disabled(node)
            }
            Pseudo::FirstChild => self.sibling_elements(node).first() == Some(&node),
            Pseudo::LastChild => self.sibling_elements(node).last() == Some(&node),
        })
    }

    fn matches_from(&self, node: NodeId, complex: &Complex, idx: usize) -> bool {
        if !self.matches_compound(node, &complex.parts[idx]) {
            return false;
        }
        if idx == 0 {
            return true;
        }
        match complex.combinators[idx - 1] {
            Combinator::Child => self
                .parent_element(node)
                .is_some_and(|parent| self.matches_from(parent, complex, idx - 1)),
            Combinator::Descendant => {
                let mut current = self.parent_element(node);
                while let Some(ancestor) = current {
                    if self.matches_from(ancestor, complex, idx - 1) {
                        return true;
                    }
                    current = self.parent_element(ancestor);
                }
                false
            }
        }
    }

    fn query(&self, scope: NodeId, selector: &str) -> Result<Vec<NodeId>, DomError> {
        self.node(scope)?;
        let list = selector::parse(selector)?;
        let matched: Vec<NodeId> = self
            .element_descendants(scope)
            .into_iter()
            .filter(|node| {
                list.0
                    .iter()
                    .any(|complex| self.matches_from(*node, complex, complex.parts.len() - 1))
            })
            .collect();
        trace!(selector, matched = matched.len(), "dom: query");
        Ok(matched)
    }
}

fn truthy(value: &str) -> bool {
    !matches!(value.trim(), "" | "false" | "0")
}

impl Document for MemoryDocument {
    fn root(&self) -> NodeId {
        self.root
    }

    fn select(&self, selector: &str) -> Result<Vec<NodeId>, DomError> {
        self.query(self.root, selector)
    }

    fn select_within(&self, root: NodeId, selector: &str) -> Result<Vec<NodeId>, DomError> {
        self.query(root, selector)
    }

    fn property(&self, node: NodeId, key: &str) -> Result<Option<String>, DomError> {
        let element = self.element(node)?;
        let value = match key {
            "value" if matches!(element.tag.as_str(), "input" | "textarea" | "select") => {
                match self.current_value(node)? {
                    ControlValue::Single(value) => Some(value),
                    ControlValue::Multiple(values) => values.into_iter().next(),
                }
            }
            "checked" => Some(element.checked().to_string()),
            "selected" => Some(element.selected().to_string()),
            key if BOOLEAN_PROPERTIES.contains(&key) => Some(element.has_attr(key).to_string()),
            "className" => element.attr("class").map(str::to_owned),
            "htmlFor" => element.attr("for").map(str::to_owned),
            "tagName" => Some(element.tag.to_ascii_uppercase()),
            "innerHTML" => Some(self.inner_html(node)?),
            "textContent" => Some(self.text_content(node)?),
            other => element.attr(&other.to_ascii_lowercase()).map(str::to_owned),
        };
        Ok(value)
    }

    fn set_property(&mut self, node: NodeId, key: &str, value: &str) -> Result<(), DomError> {
        let tag = self.element(node)?.tag.clone();
        match key {
            "value" if tag == "select" => {
                let multiple = self.element(node)?.has_attr("multiple");
                let mut matched = false;
                for option in self.options(node) {
                    let is_match = (!matched || multiple) && self.option_value(option)? == value;
                    matched |= is_match;
                    self.element_mut(option)?.dirty_selected = Some(is_match);
                }
            }
            "value" if tag == "input" || tag == "textarea" => {
                self.element_mut(node)?.dirty_value = Some(value.to_owned());
            }
            "checked" => self.set_checked(node, truthy(value))?,
            "selected" => self.element_mut(node)?.dirty_selected = Some(truthy(value)),
            key if BOOLEAN_PROPERTIES.contains(&key) => {
                let element = self.element_mut(node)?;
                if truthy(value) {
                    element.set_attr(key, "");
                } else {
                    element.remove_attr(key);
                }
            }
            "className" => self.element_mut(node)?.set_attr("class", value),
            "htmlFor" => self.element_mut(node)?.set_attr("for", value),
            "innerHTML" => self.set_inner_html(node, value)?,
            "textContent" => {
                for child in std::mem::take(&mut self.node_mut(node)?.children) {
                    self.nodes[child.0].parent = None;
                }
                let text = self.alloc(NodeData::Text(value.to_owned()));
                self.nodes[text.0].parent = Some(node);
                self.nodes[node.0].children.push(text);
            }
            other => self
                .element_mut(node)?
                .set_attr(&other.to_ascii_lowercase(), value),
        }
        Ok(())
    }

    fn set_inner_html(&mut self, node: NodeId, markup: &str) -> Result<(), DomError> {
        self.element(node)?;
        for child in std::mem::take(&mut self.nodes[node.0].children) {
            self.nodes[child.0].parent = None;
        }
        self.attach_fragments(node, None, html::parse_fragment(markup));
        Ok(())
    }

    fn insert_html(
        &mut self,
        node: NodeId,
        markup: &str,
        position: InsertPosition,
    ) -> Result<(), DomError> {
        self.element(node)?;
        let index = match position {
            InsertPosition::Append => None,
            InsertPosition::Prepend => Some(0),
        };
        self.attach_fragments(node, index, html::parse_fragment(markup));
        Ok(())
    }

    fn set_style(&mut self, node: NodeId, key: &str, value: &str) -> Result<(), DomError> {
        let element = self.element_mut(node)?;
        match style::apply(element.attr("style"), key, value) {
            Some(updated) => element.set_attr("style", &updated),
            None => element.remove_attr("style"),
        }
        Ok(())
    }

    fn remove(&mut self, node: NodeId) -> Result<(), DomError> {
        self.element(node)?;
        self.detach(node);
        Ok(())
    }

    fn create_element(
        &mut self,
        parent: NodeId,
        tag: &str,
        attrs: &[(&str, &str)],
    ) -> Result<NodeId, DomError> {
        self.node(parent)?;
        let attrs = attrs
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), (*value).to_owned()))
            .collect();
        let id = self.alloc(NodeData::Element(Element::new(
            tag.to_ascii_lowercase(),
            attrs,
        )));
        self.nodes[id.0].parent = Some(parent);
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    fn form_control(&self, node: NodeId) -> Result<Option<FormControl>, DomError> {
        let element = self.element(node)?;
        let kind = match element.tag.as_str() {
            "input" => ControlKind::Input {
                input_type: element.input_type(),
            },
            "textarea" => ControlKind::Textarea,
            "select" => ControlKind::Select {
                multiple: element.has_attr("multiple"),
            },
            _ => return Ok(None),
        };
        Ok(Some(FormControl {
            name: element.attr("name").map(str::to_owned),
            kind,
            disabled: self.is_disabled(node),
            checked: element.checked(),
            value: self.current_value(node)?,
        }))
    }

    fn reset_controls(&mut self, root: NodeId) -> Result<(), DomError> {
        self.node(root)?;
        let mut targets = self.element_descendants(root);
        targets.push(root);
        for id in targets {
            if let NodeData::Element(element) = &mut self.nodes[id.0].data {
                element.dirty_value = None;
                element.dirty_checked = None;
                element.dirty_selected = None;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/memory_tests.rs"]
mod tests;
