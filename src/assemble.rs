//! Document assembly: splice isolated component fragments into host documents.
//!
//! Each entry point first passes the registry gate (building the registry if the
//! cache is empty), then merges against the frozen component set:
//!
//! - styles: isolated stylesheets joined by `" "`, then `" "`, then the host.
//! - scripts: isolated, wrapped scripts joined by `";"`, then `"; "`, then the host.
//! - markup: every custom tag is replaced in place by its component's isolated
//!   markup, in one pass over the host tree.

use regex::Regex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Result, ScopeError};
use crate::markup::{isolate_fragment, parse_document, serialize, Element, MarkupNode};
use crate::registry::{Component, ComponentMap, RegistryProvider};
use crate::script::isolate_script;
use crate::style::isolate_styles;

pub struct Assembler<P> {
    registry: P,
}

impl<P: RegistryProvider> Assembler<P> {
    pub fn new(registry: P) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &P {
        &self.registry
    }

    /// Registry gate shared by all entry points.
    pub fn prepare(&self) -> Result<Arc<ComponentMap>> {
        self.registry.components()
    }

    pub fn invalidate(&self) {
        self.registry.invalidate();
    }

    pub fn assemble_styles(&self, host: &str) -> Result<String> {
        let components = self.prepare()?;
        if host.is_empty() {
            return Ok(String::new());
        }
        merge_styles(&components, host)
    }

    pub fn assemble_scripts(&self, host: &str) -> Result<String> {
        let components = self.prepare()?;
        if host.is_empty() {
            return Ok(String::new());
        }
        Ok(merge_scripts(&components, host))
    }

    pub fn assemble_markup(&self, host: &str) -> Result<String> {
        let components = self.prepare()?;
        if host.is_empty() {
            return Ok(String::new());
        }
        merge_markup(&components, host)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MERGE
// ═══════════════════════════════════════════════════════════════════════════════

pub fn merge_styles(components: &ComponentMap, host: &str) -> Result<String> {
    let mut blocks = Vec::new();
    for component in components.values() {
        let Some(css) = &component.stylesheet else {
            continue;
        };
        let isolated =
            isolate_styles(css, &component.id).map_err(|e| ScopeError::StyleParse {
                component: component.name.clone(),
                message: e.message,
                line: e.line,
                column: e.column,
            })?;
        blocks.push(isolated);
    }

    if blocks.is_empty() {
        return Ok(host.to_string());
    }
    debug!(blocks = blocks.len(), "merged component styles");
    Ok(format!("{} {}", blocks.join(" "), host))
}

pub fn merge_scripts(components: &ComponentMap, host: &str) -> String {
    let blocks: Vec<String> = components
        .values()
        .filter_map(|c| c.script.as_ref().map(|js| isolate_script(js, &c.id)))
        .collect();

    if blocks.is_empty() {
        return host.to_string();
    }
    debug!(blocks = blocks.len(), "merged component scripts");
    format!("{}; {}", blocks.join(";"), host)
}

pub fn merge_markup(components: &ComponentMap, host: &str) -> Result<String> {
    if components.is_empty() {
        return Ok(host.to_string());
    }

    let by_tag = tag_index(components);
    let expanded = expand_self_closing(host, components.keys().map(String::as_str));
    let nodes = parse_document(&expanded)?;
    let substituted = substitute(nodes, &by_tag)?;
    Ok(serialize(&substituted))
}

/// Components keyed by lowercased name, since the parser lowercases tag names.
/// Names differing only by case collide; the first in name order wins.
fn tag_index(components: &ComponentMap) -> HashMap<String, &Component> {
    let mut by_tag: HashMap<String, &Component> = HashMap::with_capacity(components.len());
    for component in components.values() {
        match by_tag.entry(component.name.to_ascii_lowercase()) {
            Entry::Occupied(existing) => {
                warn!(
                    component = %component.name,
                    kept = %existing.get().name,
                    "component name differs from another only by case, ignoring it"
                );
            }
            Entry::Vacant(slot) => {
                slot.insert(component);
            }
        }
    }
    by_tag
}

/// Replace custom tags. Substituted fragments are not scanned again.
fn substitute(nodes: Vec<MarkupNode>, by_tag: &HashMap<String, &Component>) -> Result<Vec<MarkupNode>> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            MarkupNode::Element(el) => match by_tag.get(el.name.as_str()) {
                Some(component) => out.extend(render_component(component, &el)?),
                None => {
                    let children = substitute(el.children, by_tag)?;
                    out.push(MarkupNode::Element(Element { children, ..el }));
                }
            },
            other => out.push(other),
        }
    }
    Ok(out)
}

fn render_component(component: &Component, tag: &Element) -> Result<Vec<MarkupNode>> {
    let caller_classes = tag.classes();
    let caller_classes = (!caller_classes.is_empty()).then_some(caller_classes);

    match &component.markup {
        Some(markup) => isolate_fragment(markup, &component.id, caller_classes.as_deref()),
        None => {
            debug!(component = %component.name, "component has no markup, dropping tag");
            Ok(Vec::new())
        }
    }
}

/// `<widget ... />` becomes `<widget ...></widget>` for registered names.
/// HTML parsers treat the slash as noise and would nest following siblings.
fn expand_self_closing<'a>(html: &str, names: impl Iterator<Item = &'a str>) -> String {
    let alternation = names.map(regex::escape).collect::<Vec<_>>().join("|");
    if alternation.is_empty() {
        return html.to_string();
    }

    let pattern = format!(r"(?i)<({})((?:\s[^>]*?)?)\s*/>", alternation);
    match Regex::new(&pattern) {
        Ok(re) => re.replace_all(html, "<${1}${2}></${1}>").to_string(),
        Err(e) => {
            warn!(error = %e, "cannot build self-closing tag pattern");
            html.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn component(name: &str, id: &str, markup: &str, css: &str, js: &str) -> Component {
        Component {
            name: name.to_string(),
            id: id.to_string(),
            markup: Some(markup.to_string()),
            stylesheet: Some(css.to_string()),
            script: Some(js.to_string()),
            root_path: PathBuf::from(format!("/components/{}", name)),
        }
    }

    fn map(components: Vec<Component>) -> ComponentMap {
        components.into_iter().map(|c| (c.name.clone(), c)).collect()
    }

    #[test]
    fn test_merge_styles_prepends_blocks() {
        let components = map(vec![
            component("alpha", "aa", "", ".a{color:red}", ""),
            component("beta", "bb", "", "#b{margin:0}", ""),
        ]);
        let out = merge_styles(&components, "body{}").unwrap();
        assert_eq!(
            out,
            ".aa-a {\n  color: red;\n} #bb-b {\n  margin: 0;\n} body{}"
        );
    }

    #[test]
    fn test_merge_styles_skips_absent_stylesheet() {
        let mut c = component("alpha", "aa", "", "", "");
        c.stylesheet = None;
        let components = map(vec![c, component("beta", "bb", "", ".b{top:0}", "")]);
        let out = merge_styles(&components, "h1{}").unwrap();
        assert_eq!(out, ".bb-b {\n  top: 0;\n} h1{}");
    }

    #[test]
    fn test_merge_styles_parse_error_names_component() {
        let components = map(vec![component("broken", "aa", "", ".a{color:red", "")]);
        let err = merge_styles(&components, "").unwrap_err();
        match err {
            ScopeError::StyleParse { component, .. } => assert_eq!(component, "broken"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_merge_scripts_joins_and_prepends() {
        let components = map(vec![
            component("alpha", "aa", "", "", "let n = 1;"),
            component("beta", "bb", "", "", "let n = 2;"),
        ]);
        let out = merge_scripts(&components, "main();");
        assert_eq!(
            out,
            "(function() {\n    let n = 1;\n  })();(function() {\n    let n = 2;\n  })(); main();"
        );
    }

    #[test]
    fn test_empty_registry_leaves_documents_alone() {
        let components = ComponentMap::new();
        assert_eq!(merge_styles(&components, "a{}").unwrap(), "a{}");
        assert_eq!(merge_scripts(&components, "x()"), "x()");
        assert_eq!(merge_markup(&components, "<p>x</p>").unwrap(), "<p>x</p>");
    }

    #[test]
    fn test_merge_markup_replaces_custom_tag() {
        let components = map(vec![component(
            "card",
            "cc",
            r#"<div class="card"><h2 class="title">T</h2></div>"#,
            "",
            "",
        )]);
        let out = merge_markup(&components, r#"<main><card class="wide"></card></main>"#).unwrap();
        assert_eq!(
            out,
            r#"<html><head></head><body><main><div class="cc-card wide"><h2 class="cc-title">T</h2></div></main></body></html>"#
        );
    }

    #[test]
    fn test_merge_markup_every_occurrence() {
        let components = map(vec![component("pill", "pp", r#"<i class="p"></i>"#, "", "")]);
        let out = merge_markup(&components, "<pill></pill><p>x</p><pill></pill>").unwrap();
        assert_eq!(
            out,
            r#"<html><head></head><body><i class="pp-p"></i><p>x</p><i class="pp-p"></i></body></html>"#
        );
    }

    #[test]
    fn test_merge_markup_single_pass() {
        // outer's markup contains an <inner> tag; it must survive untouched.
        let components = map(vec![
            component("outer", "oo", "<section><inner></inner></section>", "", ""),
            component("inner", "ii", r#"<b class="x"></b>"#, "", ""),
        ]);
        let out = merge_markup(&components, "<outer></outer>").unwrap();
        assert!(out.contains("<section><inner></inner></section>"));
        assert!(!out.contains("ii-x"));
    }

    #[test]
    fn test_merge_markup_self_closing_tag() {
        let components = map(vec![component("icon", "ic", r#"<svg class="i"></svg>"#, "", "")]);
        let out = merge_markup(&components, r#"<p><icon class="big" /> after</p>"#).unwrap();
        assert!(out.contains(r#"<p><svg class="ic-i big"></svg> after</p>"#));
    }

    #[test]
    fn test_merge_markup_absent_markup_drops_tag() {
        let mut c = component("ghost", "gg", "", "", "");
        c.markup = None;
        let out = merge_markup(&map(vec![c]), "<p><ghost></ghost>x</p>").unwrap();
        assert!(out.contains("<p>x</p>"));
    }

    #[test]
    fn test_case_colliding_names_keep_first() {
        let components = map(vec![
            component("Card", "c1", r#"<b class="x"></b>"#, "", ""),
            component("card", "c2", r#"<i class="y"></i>"#, "", ""),
        ]);
        let index = tag_index(&components);
        assert_eq!(index.len(), 1);
        assert_eq!(index["card"].id, "c1");

        let out = merge_markup(&components, "<card></card>").unwrap();
        assert!(out.contains(r#"<b class="c1-x"></b>"#));
        assert!(!out.contains("c2-y"));
    }

    #[test]
    fn test_expand_self_closing() {
        let names = ["widget"];
        assert_eq!(
            expand_self_closing("<widget/>", names.iter().copied()),
            "<widget></widget>"
        );
        assert_eq!(
            expand_self_closing(r#"<Widget class="a" />"#, names.iter().copied()),
            r#"<Widget class="a"></Widget>"#
        );
        assert_eq!(
            expand_self_closing("<widgets/><br/>", names.iter().copied()),
            "<widgets/><br/>"
        );
    }
}
