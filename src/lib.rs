//! # Component Scope
//!
//! Build-time isolation for page components. A component is a directory holding
//! a markup file, a stylesheet and a script. Every component gets a short random
//! namespace id, its names are rewritten under that id, and the rewritten
//! fragments are spliced into the page's own markup, stylesheet and script.
//!
//! ## Invariants
//!
//! 1. **One registry build**: the first document of any kind builds the
//!    registry. Every later document reuses it until [`Pipeline::invalidate`].
//!
//! 2. **Selector splice**: stylesheet selectors and script query strings keep
//!    their first character, then `{id}-`, then the rest (`.box` -> `.ab-box`).
//!
//! 3. **Token prefix**: markup class tokens and ids become `{id}-{token}`.
//!
//! 4. **Caller classes**: classes on a custom tag are appended, unprefixed, to
//!    the root of the substituted fragment only.
//!
//! 5. **Single pass**: custom tags inside substituted markup are not expanded.
//!
//! 6. **Degrade, don't abort**: a bad component directory is skipped and an
//!    unreadable artifact leaves its field empty. Only an unreadable components
//!    root fails a build.

mod assemble;
mod config;
mod error;
mod markup;
mod namespace;
mod pipeline;
mod registry;
mod script;
mod source;
mod style;
mod uniqid;

#[cfg(feature = "napi")]
mod binding;


pub use assemble::{merge_markup, merge_scripts, merge_styles, Assembler};
pub use config::ScopeOptions;
pub use error::{Result, ScopeError};
pub use markup::{isolate_markup, isolate_markup_text, Element, MarkupNode};
pub use namespace::{prefix, splice};
pub use pipeline::{DocumentKind, Pipeline, PipelineFile};
pub use registry::{discover, Component, ComponentMap, ComponentRegistry, RegistryProvider};
pub use script::isolate_script;
pub use source::{ComponentSource, DiskSource};
pub use style::{isolate_styles, CssParseError};
pub use uniqid::uniqid;

#[cfg(feature = "napi")]
pub use binding::{
    clear_cache, list_components, prepare_html, prepare_scripts, prepare_scss, setup,
};
