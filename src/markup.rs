//! Markup tree and markup isolation.
//!
//! html5ever parses into an `RcDom`, which is converted once into an owned
//! [`MarkupNode`] tree. Isolation is then a pure function from subtree to
//! rewritten subtree, and [`serialize`] turns the tree back into HTML.

use html5ever::tendril::TendrilSink;
use html5ever::{local_name, namespace_url, ns, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use crate::error::{Result, ScopeError};
use crate::namespace::prefix;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "bgsound", "br", "col", "embed", "frame", "hr", "img", "input",
    "keygen", "link", "meta", "param", "source", "track", "wbr",
];

/// Elements whose text children are written without escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "style", "script", "xmp", "iframe", "noembed", "noframes", "plaintext", "noscript",
];

// ═══════════════════════════════════════════════════════════════════════════════
// TREE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupNode {
    Doctype {
        name: String,
        public_id: String,
        system_id: String,
    },
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lowercased by the parser.
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<MarkupNode>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: String) {
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    pub fn classes(&self) -> Vec<String> {
        self.attr("class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Append classes that are not already present.
    pub fn add_classes(&mut self, extra: &[String]) {
        let mut classes = self.classes();
        let before = classes.len();
        for class in extra {
            if !classes.contains(class) {
                classes.push(class.clone());
            }
        }
        if classes.len() != before {
            self.set_attr("class", classes.join(" "));
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSING
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse a whole document. The parser supplies `html`, `head` and `body` when absent.
pub fn parse_document(html: &str) -> Result<Vec<MarkupNode>> {
    let dom = html5ever::parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .map_err(|e| ScopeError::MarkupParse {
            message: format!("Failed to parse HTML: {}", e),
        })?;
    Ok(convert_children(&dom.document))
}

/// Parse a fragment in `<body>` context.
pub fn parse_fragment(html: &str) -> Result<Vec<MarkupNode>> {
    let context = QualName::new(None, ns!(html), local_name!("body"));
    let dom = html5ever::parse_fragment(RcDom::default(), Default::default(), context, Vec::new())
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .map_err(|e| ScopeError::MarkupParse {
            message: format!("Failed to parse HTML fragment: {}", e),
        })?;

    // Fragment content hangs off a synthetic <html> root.
    Ok(convert_children(&dom.document)
        .into_iter()
        .flat_map(|node| match node {
            MarkupNode::Element(el) if el.name == "html" => el.children,
            other => vec![other],
        })
        .collect())
}

fn convert_children(handle: &Handle) -> Vec<MarkupNode> {
    handle
        .children
        .borrow()
        .iter()
        .filter_map(convert_node)
        .collect()
}

fn convert_node(handle: &Handle) -> Option<MarkupNode> {
    match &handle.data {
        NodeData::Doctype {
            name,
            public_id,
            system_id,
        } => Some(MarkupNode::Doctype {
            name: name.to_string(),
            public_id: public_id.to_string(),
            system_id: system_id.to_string(),
        }),

        NodeData::Text { contents } => Some(MarkupNode::Text(contents.borrow().to_string())),

        NodeData::Comment { contents } => Some(MarkupNode::Comment(contents.to_string())),

        NodeData::Element {
            name,
            attrs,
            template_contents,
            ..
        } => {
            let attrs = attrs
                .borrow()
                .iter()
                .map(|attr| {
                    let name = match &attr.name.prefix {
                        Some(p) => format!("{}:{}", p, attr.name.local),
                        None => attr.name.local.to_string(),
                    };
                    (name, attr.value.to_string())
                })
                .collect();

            // <template> children live in a separate document fragment.
            let children = match template_contents.borrow().as_ref() {
                Some(contents) => convert_children(contents),
                None => convert_children(handle),
            };

            Some(MarkupNode::Element(Element {
                name: name.local.to_string(),
                attrs,
                children,
            }))
        }

        NodeData::Document | NodeData::ProcessingInstruction { .. } => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERIALIZATION
// ═══════════════════════════════════════════════════════════════════════════════

pub fn serialize(nodes: &[MarkupNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(node, &mut out, false);
    }
    out
}

fn write_node(node: &MarkupNode, out: &mut String, raw_text: bool) {
    match node {
        MarkupNode::Doctype {
            name,
            public_id,
            system_id,
        } => {
            out.push_str("<!DOCTYPE ");
            out.push_str(name);
            if !public_id.is_empty() {
                out.push_str(&format!(" PUBLIC \"{}\"", public_id));
            }
            if !system_id.is_empty() {
                out.push_str(&format!(" \"{}\"", system_id));
            }
            out.push('>');
        }
        MarkupNode::Text(text) if raw_text => out.push_str(text),
        MarkupNode::Text(text) => out.push_str(&escape_text(text)),
        MarkupNode::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        MarkupNode::Element(el) => {
            out.push('<');
            out.push_str(&el.name);
            for (name, value) in &el.attrs {
                out.push_str(&format!(" {}=\"{}\"", name, escape_attr(value)));
            }
            out.push('>');

            if VOID_ELEMENTS.contains(&el.name.as_str()) {
                return;
            }

            let raw = RAW_TEXT_ELEMENTS.contains(&el.name.as_str());
            for child in &el.children {
                write_node(child, out, raw);
            }
            out.push_str("</");
            out.push_str(&el.name);
            out.push('>');
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('\u{a0}', "&nbsp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('\u{a0}', "&nbsp;")
        .replace('"', "&quot;")
}

// ═══════════════════════════════════════════════════════════════════════════════
// ISOLATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Namespace every class token and id in the subtree rooted at `node`.
///
/// `caller_classes` are appended unchanged to the root element only.
/// Non-element nodes come back as they are.
pub fn isolate_markup(node: &MarkupNode, id: &str, caller_classes: Option<&[String]>) -> MarkupNode {
    match node {
        MarkupNode::Element(el) => MarkupNode::Element(isolate_element(el, id, caller_classes)),
        other => other.clone(),
    }
}

fn isolate_element(el: &Element, id: &str, caller_classes: Option<&[String]>) -> Element {
    let attrs = el
        .attrs
        .iter()
        .map(|(name, value)| {
            let value = match name.as_str() {
                "class" => value
                    .split_whitespace()
                    .map(|token| prefix(token, id))
                    .collect::<Vec<_>>()
                    .join(" "),
                "id" if !value.is_empty() => prefix(value, id),
                _ => value.clone(),
            };
            (name.clone(), value)
        })
        .collect();

    let mut element = Element {
        name: el.name.clone(),
        attrs,
        children: el
            .children
            .iter()
            .map(|child| isolate_markup(child, id, None))
            .collect(),
    };

    if let Some(extra) = caller_classes {
        element.add_classes(extra);
    }
    element
}

/// Parse a component's markup and isolate it.
///
/// Surrounding whitespace is dropped. Caller classes land on the first
/// top-level element.
pub fn isolate_fragment(
    markup: &str,
    id: &str,
    caller_classes: Option<&[String]>,
) -> Result<Vec<MarkupNode>> {
    let nodes = trim_whitespace(parse_fragment(markup)?);
    let root = nodes
        .iter()
        .position(|node| matches!(node, MarkupNode::Element(_)));

    Ok(nodes
        .iter()
        .enumerate()
        .map(|(i, node)| {
            let classes = if Some(i) == root { caller_classes } else { None };
            isolate_markup(node, id, classes)
        })
        .collect())
}

pub fn isolate_markup_text(
    markup: &str,
    id: &str,
    caller_classes: Option<&[String]>,
) -> Result<String> {
    Ok(serialize(&isolate_fragment(markup, id, caller_classes)?))
}

fn trim_whitespace(mut nodes: Vec<MarkupNode>) -> Vec<MarkupNode> {
    let blank = |node: &MarkupNode| matches!(node, MarkupNode::Text(t) if t.trim().is_empty());
    while nodes.last().map_or(false, blank) {
        nodes.pop();
    }
    let leading = nodes.iter().take_while(|n| blank(n)).count();
    nodes.drain(..leading);
    nodes
}
