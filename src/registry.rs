//! Component discovery and the process-wide component cache.
//!
//! A component is an immediate subdirectory of the components root holding the
//! three artifact files named by [`ScopeOptions`]. Discovery validates and loads
//! every candidate in parallel and gives each survivor a fresh namespace id.
//!
//! ## Failure policy
//!
//! - Root unreadable: the build fails and nothing is cached, the next trigger retries.
//! - Candidate not a directory, or missing an artifact: skipped, logged.
//! - Artifact unreadable after validation: component kept, field left `None`.

use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::ScopeOptions;
use crate::error::{Result, ScopeError};
use crate::source::{ComponentSource, DiskSource};
use crate::uniqid::uniqid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    /// Directory name. Also the custom tag that triggers substitution.
    pub name: String,
    /// Namespace token injected into every selector, class, id and query string.
    pub id: String,
    pub markup: Option<String>,
    pub stylesheet: Option<String>,
    pub script: Option<String>,
    pub root_path: PathBuf,
}

/// Registered components keyed by name. Iteration is name order.
pub type ComponentMap = BTreeMap<String, Component>;

/// What the assembler needs from a registry.
pub trait RegistryProvider: Send + Sync {
    /// The built registry, building it first if the cache is empty.
    fn components(&self) -> Result<Arc<ComponentMap>>;

    /// Drop the cache so the next [`components`](Self::components) call rediscovers.
    fn invalidate(&self);
}

impl<P: RegistryProvider + ?Sized> RegistryProvider for Arc<P> {
    fn components(&self) -> Result<Arc<ComponentMap>> {
        (**self).components()
    }

    fn invalidate(&self) {
        (**self).invalidate()
    }
}

#[derive(Debug, Default)]
enum RegistryState {
    #[default]
    Unbuilt,
    Built(Arc<ComponentMap>),
}

pub struct ComponentRegistry {
    options: ScopeOptions,
    source: Arc<dyn ComponentSource>,
    // Held for the whole build so at most one build is in flight.
    state: Mutex<RegistryState>,
}

impl ComponentRegistry {
    pub fn new(options: ScopeOptions) -> Self {
        Self::with_source(options, Arc::new(DiskSource))
    }

    pub fn with_source(options: ScopeOptions, source: Arc<dyn ComponentSource>) -> Self {
        Self {
            options,
            source,
            state: Mutex::new(RegistryState::Unbuilt),
        }
    }

    pub fn options(&self) -> &ScopeOptions {
        &self.options
    }

    /// Build the registry unless it is already cached.
    pub fn build(&self) -> Result<Arc<ComponentMap>> {
        let mut state = self.state.lock();
        if let RegistryState::Built(components) = &*state {
            debug!(count = components.len(), "component registry cache hit");
            return Ok(Arc::clone(components));
        }

        let components = Arc::new(discover(self.source.as_ref(), &self.options)?);
        info!(count = components.len(), "component registry built");
        *state = RegistryState::Built(Arc::clone(&components));
        Ok(components)
    }

    /// The cached registry, without triggering a build.
    pub fn get(&self) -> Option<Arc<ComponentMap>> {
        match &*self.state.lock() {
            RegistryState::Built(components) => Some(Arc::clone(components)),
            RegistryState::Unbuilt => None,
        }
    }

    pub fn is_built(&self) -> bool {
        matches!(*self.state.lock(), RegistryState::Built(_))
    }

    pub fn invalidate(&self) {
        debug!("component registry invalidated");
        *self.state.lock() = RegistryState::Unbuilt;
    }
}

impl RegistryProvider for ComponentRegistry {
    fn components(&self) -> Result<Arc<ComponentMap>> {
        self.build()
    }

    fn invalidate(&self) {
        ComponentRegistry::invalidate(self)
    }
}

/// Discover and load every valid component under the configured root.
pub fn discover(source: &dyn ComponentSource, options: &ScopeOptions) -> Result<ComponentMap> {
    let root = options.resolve_components_dir()?;
    let names = source.list_dir(&root).map_err(|e| {
        error!(path = %root.display(), error = %e, "failed to read components directory");
        ScopeError::Discovery {
            path: root.clone(),
            source: e,
        }
    })?;

    let loaded: Vec<Component> = names
        .par_iter()
        .filter_map(|name| {
            let dir = root.join(name);
            if is_valid_component(source, &dir, options) {
                Some(load_component(source, name, dir, options))
            } else {
                None
            }
        })
        .collect();

    let mut assigned = HashSet::new();
    let mut components = ComponentMap::new();
    for mut component in loaded {
        let mut id = uniqid();
        while !assigned.insert(id.clone()) {
            id = uniqid();
        }
        component.id = id;
        components.insert(component.name.clone(), component);
    }

    Ok(components)
}

fn is_valid_component(source: &dyn ComponentSource, dir: &Path, options: &ScopeOptions) -> bool {
    match source.is_dir(dir) {
        Ok(true) => {}
        Ok(false) => {
            debug!(path = %dir.display(), "skipping non-directory entry");
            return false;
        }
        Err(e) => {
            debug!(path = %dir.display(), error = %e, "skipping entry that cannot be stat'ed");
            return false;
        }
    }

    let files = match source.list_dir(dir) {
        Ok(files) => files,
        Err(e) => {
            debug!(path = %dir.display(), error = %e, "skipping unreadable component directory");
            return false;
        }
    };

    let missing: Vec<&str> = options
        .required_files()
        .into_iter()
        .filter(|required| !files.iter().any(|f| f == required))
        .collect();
    if !missing.is_empty() {
        debug!(path = %dir.display(), ?missing, "not all component files are present");
        return false;
    }
    true
}

fn load_component(
    source: &dyn ComponentSource,
    name: &str,
    dir: PathBuf,
    options: &ScopeOptions,
) -> Component {
    let read = |file: &str| {
        let path = dir.join(file);
        match source.read_to_string(&path) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(component = name, path = %path.display(), error = %e, "failed to read component file");
                None
            }
        }
    };

    let (markup, (stylesheet, script)) = rayon::join(
        || read(&options.markup_file),
        || {
            rayon::join(
                || read(&options.stylesheet_file),
                || read(&options.script_file),
            )
        },
    );

    Component {
        name: name.to_string(),
        id: String::new(),
        markup,
        stylesheet,
        script,
        root_path: dir,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing::MemorySource;
    use std::fs;

    const ROOT: &str = "/site/components";

    fn widget_source() -> MemorySource {
        MemorySource::new()
            .with_file(
                "/site/components/widget/index.html",
                r#"<span class="label">Hi</span>"#,
            )
            .with_file("/site/components/widget/style.scss", ".label{color:red}")
            .with_file(
                "/site/components/widget/script.js",
                "document.querySelectorAll('.label')",
            )
    }

    fn registry(source: MemorySource) -> (ComponentRegistry, Arc<MemorySource>) {
        let source = Arc::new(source);
        let registry = ComponentRegistry::with_source(ScopeOptions::new(ROOT), source.clone());
        (registry, source)
    }

    #[test]
    fn test_discover_valid_component() {
        let source = widget_source();
        let components = discover(&source, &ScopeOptions::new(ROOT)).unwrap();

        let widget = components.get("widget").expect("widget discovered");
        assert!(!widget.id.is_empty());
        assert_eq!(widget.markup.as_deref(), Some(r#"<span class="label">Hi</span>"#));
        assert_eq!(widget.stylesheet.as_deref(), Some(".label{color:red}"));
        assert_eq!(
            widget.script.as_deref(),
            Some("document.querySelectorAll('.label')")
        );
        assert_eq!(widget.root_path, PathBuf::from("/site/components/widget"));
    }

    #[test]
    fn test_component_json_shape() {
        let source = widget_source();
        let components = discover(&source, &ScopeOptions::new(ROOT)).unwrap();
        let json = serde_json::to_value(&components).unwrap();
        assert_eq!(json["widget"]["name"], "widget");
        assert_eq!(json["widget"]["rootPath"], "/site/components/widget");
        assert_eq!(json["widget"]["stylesheet"], ".label{color:red}");
    }

    #[test]
    fn test_discover_skips_incomplete_and_plain_files() {
        let source = widget_source()
            .with_file("/site/components/broken/index.html", "<p></p>")
            .with_file("/site/components/broken/script.js", "")
            .with_dir("/site/components/empty")
            .with_file("/site/components/notes.txt", "not a component");
        let components = discover(&source, &ScopeOptions::new(ROOT)).unwrap();

        assert_eq!(components.keys().collect::<Vec<_>>(), vec!["widget"]);
    }

    #[test]
    fn test_discover_ignores_extra_files() {
        let source = widget_source().with_file("/site/components/widget/README.md", "docs");
        let components = discover(&source, &ScopeOptions::new(ROOT)).unwrap();
        assert!(components.contains_key("widget"));
    }

    #[test]
    fn test_discover_missing_root_is_fatal() {
        let source = MemorySource::new();
        let err = discover(&source, &ScopeOptions::new(ROOT)).unwrap_err();
        assert!(matches!(err, ScopeError::Discovery { .. }));
    }

    #[test]
    fn test_unreadable_artifact_degrades_field() {
        let source = MemorySource::new()
            .with_file("/site/components/card/index.html", "<div></div>")
            .with_unreadable("/site/components/card/style.scss")
            .with_file("/site/components/card/script.js", "");
        let components = discover(&source, &ScopeOptions::new(ROOT)).unwrap();

        let card = components.get("card").expect("card still registered");
        assert_eq!(card.stylesheet, None);
        assert_eq!(card.markup.as_deref(), Some("<div></div>"));
        assert_eq!(card.script.as_deref(), Some(""));
    }

    #[test]
    fn test_ids_are_distinct() {
        let mut source = MemorySource::new();
        for i in 0..20 {
            let dir = format!("/site/components/c{}", i);
            source = source
                .with_file(format!("{}/index.html", dir), "<i></i>")
                .with_file(format!("{}/style.scss", dir), "")
                .with_file(format!("{}/script.js", dir), "");
        }
        let components = discover(&source, &ScopeOptions::new(ROOT)).unwrap();
        assert_eq!(components.len(), 20);
        let ids: HashSet<_> = components.values().map(|c| c.id.clone()).collect();
        assert_eq!(ids.len(), 20);
    }

    #[test]
    fn test_build_is_cached() {
        let (registry, source) = registry(widget_source());
        assert!(!registry.is_built());
        assert!(registry.get().is_none());

        let first = registry.build().unwrap();
        let calls = source.total_calls();
        assert!(calls > 0);

        let second = registry.build().unwrap();
        assert_eq!(source.total_calls(), calls);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, *second);
    }

    #[test]
    fn test_invalidate_forces_rediscovery() {
        let (registry, source) = registry(widget_source());
        let first = registry.build().unwrap();
        let calls = source.total_calls();

        registry.invalidate();
        assert!(!registry.is_built());

        let second = registry.build().unwrap();
        assert!(source.total_calls() > calls);
        assert_eq!(first.keys().collect::<Vec<_>>(), second.keys().collect::<Vec<_>>());
    }

    #[test]
    fn test_failed_build_is_not_cached() {
        let (registry, source) = registry(MemorySource::new());
        assert!(registry.build().is_err());
        assert!(!registry.is_built());

        let calls = source.total_calls();
        assert!(registry.build().is_err());
        assert!(source.total_calls() > calls);
    }

    #[test]
    fn test_discover_from_disk() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let dir = tmp.path().join("widget");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("index.html"), "<b class=\"x\">x</b>").unwrap();
        fs::write(dir.join("style.scss"), ".x{margin:0}").unwrap();
        fs::write(dir.join("script.js"), "").unwrap();
        fs::create_dir(tmp.path().join("partial")).unwrap();
        fs::write(tmp.path().join("partial").join("index.html"), "").unwrap();

        let registry = ComponentRegistry::new(ScopeOptions::new(tmp.path()));
        let components = registry.build().unwrap();
        assert_eq!(components.keys().collect::<Vec<_>>(), vec!["widget"]);
        assert_eq!(components["widget"].stylesheet.as_deref(), Some(".x{margin:0}"));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_link_does_not_fail_build() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let dir = tmp.path().join("widget");
        fs::create_dir(&dir).unwrap();
        for file in ["index.html", "style.scss", "script.js"] {
            fs::write(dir.join(file), "").unwrap();
        }
        std::os::unix::fs::symlink(tmp.path().join("gone"), tmp.path().join("dangling")).unwrap();

        let registry = ComponentRegistry::new(ScopeOptions::new(tmp.path()));
        let components = registry.build().unwrap();
        assert_eq!(components.keys().collect::<Vec<_>>(), vec!["widget"]);
    }
}
