//! Node binding for the build plugin surface.
//!
//! `setup` must run before any `prepare*` call. The engine is process-wide and
//! `clearCache` drops its registry so the next document rediscovers components.

use lazy_static::lazy_static;
use napi_derive::napi;
use parking_lot::RwLock;

use crate::config::ScopeOptions;
use crate::error::ScopeError;
use crate::pipeline::{DocumentKind, Pipeline};
use crate::registry::ComponentRegistry;

lazy_static! {
    static ref ENGINE: RwLock<Option<Pipeline<ComponentRegistry>>> = RwLock::new(None);
}

fn to_napi(err: ScopeError) -> napi::Error {
    napi::Error::from_reason(format!("[{}] {}", err.code(), err))
}

fn run(kind: DocumentKind, document: &str) -> napi::Result<String> {
    let guard = ENGINE.read();
    let engine = guard.as_ref().ok_or_else(|| {
        napi::Error::from_reason("setup() must be called before processing documents")
    })?;
    engine.process_text(kind, document).map_err(to_napi)
}

#[napi]
pub fn setup(options_json: String) -> napi::Result<()> {
    let options = ScopeOptions::from_json(&options_json).map_err(to_napi)?;
    *ENGINE.write() = Some(Pipeline::from_options(options));
    Ok(())
}

#[napi]
pub fn clear_cache() {
    if let Some(engine) = ENGINE.read().as_ref() {
        engine.invalidate();
    }
}

#[napi]
pub fn prepare_html(document: String) -> napi::Result<String> {
    run(DocumentKind::Markup, &document)
}

#[napi]
pub fn prepare_scss(document: String) -> napi::Result<String> {
    run(DocumentKind::Stylesheet, &document)
}

#[napi]
pub fn prepare_scripts(document: String) -> napi::Result<String> {
    run(DocumentKind::Script, &document)
}

/// Registered components as JSON, building the registry if needed.
#[napi]
pub fn list_components() -> napi::Result<serde_json::Value> {
    let guard = ENGINE.read();
    let engine = guard.as_ref().ok_or_else(|| {
        napi::Error::from_reason("setup() must be called before listing components")
    })?;
    let components = engine.assembler().prepare().map_err(to_napi)?;
    serde_json::to_value(&*components).map_err(|e| napi::Error::from_reason(e.to_string()))
}
