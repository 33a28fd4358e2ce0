//! Script isolation: namespace DOM query strings and wrap the body in an IIFE.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::namespace::splice;

lazy_static! {
    /// `querySelector('...')` / `querySelectorAll("...")` on a single line.
    /// The argument is greedy up to the last closing quote-paren on the line.
    static ref QUERY_RE: Regex =
        Regex::new(r#"(querySelector(?:All)?\(['"])(.*)(['"]\))"#).unwrap();
}

pub fn isolate_script(script: &str, id: &str) -> String {
    let rewritten = QUERY_RE.replace_all(script, |caps: &Captures| {
        format!("{}{}{}", &caps[1], splice(&caps[2], id), &caps[3])
    });
    wrap_iife(&rewritten)
}

/// Keep top-level declarations out of the host script's scope.
pub fn wrap_iife(body: &str) -> String {
    format!("(function() {{\n    {}\n  }})()", body)
}
