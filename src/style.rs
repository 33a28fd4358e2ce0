//! Stylesheet rule list and selector isolation.
//!
//! Tokenizing and block structure come from `cssparser`. On top of that the
//! rule parser keeps what isolation needs: qualified rules with a selector list
//! and declarations, comments, grouping at-rules whose block holds more rules,
//! and other at-rules which are carried through verbatim. Stringify emits one
//! declaration per line with two-space indentation.

use cssparser::{
    AtRuleParser, BasicParseErrorKind, CowRcStr, Delimiter, ParseError, ParseErrorKind, Parser,
    ParserInput, ParserState, QualifiedRuleParser, StyleSheetParser, Token,
};
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::namespace::splice;

lazy_static! {
    static ref COMMENT_RE: Regex = Regex::new(r"(?s)/\*.*?\*/").unwrap();
}

/// At-rules whose block is a list of rules.
const GROUP_AT_RULES: &[&str] = &["media", "supports", "document", "container", "layer"];

const MISSING_CLOSE: &str = "missing '}'";
const UNCLOSED_COMMENT: &str = "end of comment missing";
const NESTED_RULE: &str = "nested rules are not supported";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stylesheet {
    pub rules: Vec<CssNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CssNode {
    Rule(CssRule),
    Comment(String),
    Group {
        name: String,
        prelude: String,
        rules: Vec<CssNode>,
    },
    /// `@font-face`, `@keyframes` and friends. Body is kept as written.
    Block {
        name: String,
        prelude: String,
        body: String,
    },
    /// `@import url(a.css);`
    Statement { name: String, prelude: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssRule {
    pub selectors: Vec<String>,
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Property { name: String, value: String },
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (line {line}, column {column})")]
pub struct CssParseError {
    pub message: String,
    /// 1-based.
    pub line: u32,
    /// 1-based.
    pub column: u32,
}

impl<'i> From<ParseError<'i, &'static str>> for CssParseError {
    fn from(err: ParseError<'i, &'static str>) -> Self {
        let message = match &err.kind {
            ParseErrorKind::Custom(message) => message.to_string(),
            ParseErrorKind::Basic(BasicParseErrorKind::EndOfInput) => {
                "unexpected end of stylesheet".to_string()
            }
            ParseErrorKind::Basic(BasicParseErrorKind::UnexpectedToken(token)) => {
                format!("unexpected token {:?}", token)
            }
            ParseErrorKind::Basic(BasicParseErrorKind::AtRuleInvalid(name)) => {
                format!("invalid at-rule @{}", &**name)
            }
            ParseErrorKind::Basic(_) => "invalid rule".to_string(),
        };
        CssParseError {
            message,
            line: err.location.line + 1,
            column: err.location.column,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ISOLATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Rewrite every selector of every rule with the positional splice.
pub fn isolate_styles(css: &str, id: &str) -> Result<String, CssParseError> {
    let mut sheet = parse_stylesheet(css)?;
    isolate_nodes(&mut sheet.rules, id);
    Ok(sheet.to_css())
}

fn isolate_nodes(nodes: &mut [CssNode], id: &str) {
    for node in nodes {
        match node {
            CssNode::Rule(rule) => {
                rule.selectors = rule.selectors.iter().map(|s| splice(s, id)).collect();
            }
            CssNode::Group { rules, .. } => isolate_nodes(rules, id),
            _ => {}
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSING
// ═══════════════════════════════════════════════════════════════════════════════

pub fn parse_stylesheet(css: &str) -> Result<Stylesheet, CssParseError> {
    let mut input = ParserInput::new(css);
    let mut input = Parser::new(&mut input);
    let mut parser = RuleParser { src: css, cursor: 0 };
    let rules = parse_rule_list(&mut parser, &mut input)?;
    Ok(Stylesheet { rules })
}

/// Rules of one list, top level or inside a grouping at-rule.
fn parse_rule_list<'i, 't>(
    parser: &mut RuleParser<'i>,
    input: &mut Parser<'i, 't>,
) -> Result<Vec<CssNode>, ParseError<'i, &'static str>> {
    let mut nodes = Vec::new();
    for result in StyleSheetParser::new(input, parser) {
        nodes.extend(result.map_err(|(err, _)| err)?);
    }
    // Comments after the last rule of the list.
    let end = input.position().byte_index();
    nodes.extend(parser.comments_until(end, input)?);
    Ok(nodes)
}

/// `cssparser` skips comments between rules. `cursor` marks how far the source
/// has been accounted for, so the gap before each rule can be searched for them.
struct RuleParser<'i> {
    src: &'i str,
    cursor: usize,
}

struct AtPrelude {
    name: String,
    text: String,
    end: usize,
}

impl<'i> RuleParser<'i> {
    fn scan_comments(&mut self, end: usize) -> Result<Vec<CssNode>, &'static str> {
        let mut rest = self.src.get(self.cursor..end).unwrap_or("");
        self.cursor = self.cursor.max(end);

        let mut comments = Vec::new();
        while let Some(open) = rest.find("/*") {
            let body = &rest[open + 2..];
            let close = body.find("*/").ok_or(UNCLOSED_COMMENT)?;
            comments.push(CssNode::Comment(body[..close].to_string()));
            rest = &body[close + 2..];
        }
        Ok(comments)
    }

    fn comments_until<'t>(
        &mut self,
        end: usize,
        input: &Parser<'i, 't>,
    ) -> Result<Vec<CssNode>, ParseError<'i, &'static str>> {
        self.scan_comments(end)
            .map_err(|message| input.new_custom_error(message))
    }

    /// `cssparser` closes blocks implicitly at end of input. Require the brace.
    fn close_block<'t>(&mut self, input: &Parser<'i, 't>) -> Result<(), ParseError<'i, &'static str>> {
        let end = input.position().byte_index();
        if !self.src[end..].starts_with('}') {
            return Err(input.new_custom_error(MISSING_CLOSE));
        }
        self.cursor = end + 1;
        Ok(())
    }
}

impl<'i> QualifiedRuleParser<'i> for RuleParser<'i> {
    type Prelude = Vec<String>;
    type QualifiedRule = Vec<CssNode>;
    type Error = &'static str;

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        let selectors = parse_selector_list(input);
        if selectors.is_empty() {
            return Err(input.new_custom_error("selector missing"));
        }
        Ok(selectors)
    }

    fn parse_block<'t>(
        &mut self,
        selectors: Self::Prelude,
        start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::QualifiedRule, ParseError<'i, Self::Error>> {
        let mut nodes = self.comments_until(start.position().byte_index(), input)?;
        let declarations = parse_declarations(input)?;
        self.close_block(input)?;
        nodes.push(CssNode::Rule(CssRule {
            selectors,
            declarations,
        }));
        Ok(nodes)
    }
}

impl<'i> AtRuleParser<'i> for RuleParser<'i> {
    type Prelude = AtPrelude;
    type AtRule = Vec<CssNode>;
    type Error = &'static str;

    fn parse_prelude<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        let start = input.position();
        while input.next_including_whitespace_and_comments().is_ok() {}
        Ok(AtPrelude {
            name: name.to_string(),
            text: input.slice_from(start).trim().to_string(),
            end: input.position().byte_index(),
        })
    }

    fn rule_without_block(
        &mut self,
        prelude: Self::Prelude,
        start: &ParserState,
    ) -> Result<Self::AtRule, ()> {
        let mut nodes = self
            .scan_comments(start.position().byte_index())
            .map_err(|_| ())?;
        self.cursor = prelude.end;
        nodes.push(CssNode::Statement {
            name: prelude.name,
            prelude: prelude.text,
        });
        Ok(nodes)
    }

    fn parse_block<'t>(
        &mut self,
        prelude: Self::Prelude,
        start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::AtRule, ParseError<'i, Self::Error>> {
        let mut nodes = self.comments_until(start.position().byte_index(), input)?;
        self.cursor = input.position().byte_index();

        let node = if GROUP_AT_RULES.contains(&prelude.name.to_ascii_lowercase().as_str()) {
            let rules = parse_rule_list(self, input)?;
            CssNode::Group {
                name: prelude.name,
                prelude: prelude.text,
                rules,
            }
        } else {
            let body_start = input.position();
            while input.next_including_whitespace_and_comments().is_ok() {}
            CssNode::Block {
                name: prelude.name,
                prelude: prelude.text,
                body: input.slice_from(body_start).to_string(),
            }
        };
        self.close_block(input)?;
        nodes.push(node);
        Ok(nodes)
    }
}

/// Split a selector list on top-level commas. Commas inside functions,
/// brackets and strings belong to nested tokens and never split.
fn parse_selector_list<'i, 't>(input: &mut Parser<'i, 't>) -> Vec<String> {
    let mut selectors = Vec::new();
    loop {
        let start = input.position();
        let _: Result<(), ParseError<'i, ()>> =
            input.parse_until_before(Delimiter::Comma, |input| {
                while input.next_including_whitespace_and_comments().is_ok() {}
                Ok(())
            });
        let selector = COMMENT_RE.replace_all(input.slice_from(start), "");
        let selector = selector.trim();
        if !selector.is_empty() {
            selectors.push(selector.to_string());
        }
        if input.next().is_err() {
            return selectors;
        }
    }
}

/// Declarations of a rule block, comments included.
fn parse_declarations<'i, 't>(
    input: &mut Parser<'i, 't>,
) -> Result<Vec<Declaration>, ParseError<'i, &'static str>> {
    let mut declarations = Vec::new();
    loop {
        let before = input.position();
        let token = match input.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => return Ok(declarations),
        };
        match token {
            Token::WhiteSpace(_) | Token::Semicolon => {}
            Token::Comment(text) => {
                if !is_closed_comment(input.slice_from(before)) {
                    return Err(input.new_custom_error(UNCLOSED_COMMENT));
                }
                declarations.push(Declaration::Comment(text.to_string()));
            }
            Token::Ident(name) => declarations.push(parse_property(name.to_string(), input)?),
            Token::CurlyBracketBlock | Token::Delim(_) | Token::Hash(_) | Token::IDHash(_) => {
                return Err(input.new_custom_error(NESTED_RULE));
            }
            _ => return Err(input.new_custom_error("property missing")),
        }
    }
}

fn parse_property<'i, 't>(
    name: String,
    input: &mut Parser<'i, 't>,
) -> Result<Declaration, ParseError<'i, &'static str>> {
    match input.next().cloned() {
        Ok(Token::Colon) => {}
        Ok(Token::CurlyBracketBlock) => return Err(input.new_custom_error(NESTED_RULE)),
        _ => return Err(input.new_custom_error("property missing ':'")),
    }

    let value_start = input.position();
    input.parse_until_before(Delimiter::Semicolon, |input| {
        while let Ok(token) = input.next_including_whitespace_and_comments() {
            if matches!(token, Token::CurlyBracketBlock) {
                return Err(input.new_custom_error(NESTED_RULE));
            }
        }
        Ok::<(), ParseError<'i, &'static str>>(())
    })?;
    Ok(Declaration::Property {
        name,
        value: input.slice_from(value_start).trim().to_string(),
    })
}

fn is_closed_comment(raw: &str) -> bool {
    raw.len() >= 4 && raw.ends_with("*/")
}

// ═══════════════════════════════════════════════════════════════════════════════
// STRINGIFY
// ═══════════════════════════════════════════════════════════════════════════════

impl Stylesheet {
    pub fn to_css(&self) -> String {
        write_nodes(&self.rules, 0)
    }
}

fn write_nodes(nodes: &[CssNode], level: usize) -> String {
    nodes
        .iter()
        .filter_map(|node| write_node(node, level))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn write_node(node: &CssNode, level: usize) -> Option<String> {
    let indent = "  ".repeat(level);
    match node {
        CssNode::Rule(rule) => {
            // Empty rules are dropped.
            if rule.declarations.is_empty() {
                return None;
            }
            let inner = "  ".repeat(level + 1);
            let selectors = rule
                .selectors
                .iter()
                .map(|s| format!("{}{}", indent, s))
                .collect::<Vec<_>>()
                .join(",\n");
            let declarations = rule
                .declarations
                .iter()
                .map(|d| match d {
                    Declaration::Property { name, value } => {
                        format!("{}{}: {};", inner, name, value)
                    }
                    Declaration::Comment(c) => format!("{}/*{}*/", inner, c),
                })
                .collect::<Vec<_>>()
                .join("\n");
            Some(format!("{} {{\n{}\n{}}}", selectors, declarations, indent))
        }
        CssNode::Comment(c) => Some(format!("{}/*{}*/", indent, c)),
        CssNode::Group {
            name,
            prelude,
            rules,
        } => Some(format!(
            "{}@{}{} {{\n{}\n{}}}",
            indent,
            name,
            with_space(prelude),
            write_nodes(rules, level + 1),
            indent
        )),
        CssNode::Block {
            name,
            prelude,
            body,
        } => Some(format!(
            "{}@{}{} {{{}}}",
            indent,
            name,
            with_space(prelude),
            body
        )),
        CssNode::Statement { name, prelude } => {
            Some(format!("{}@{}{};", indent, name, with_space(prelude)))
        }
    }
}

fn with_space(prelude: &str) -> String {
    if prelude.is_empty() {
        String::new()
    } else {
        format!(" {}", prelude)
    }
}
