//! On-disk projects and compiled output directories
//!
//! A project keeps one template per component:
//!
//! ```text
//! <root>/src/ui/components/<Name>/template.hbs
//! ```
//!
//! A dist directory holds the compiled heap (`templates.gbx`) and the data
//! segment as JSON (`data.json`) or as an ES module (`data.js`).

use std::fs;
use std::path::{Path, PathBuf};

use stencil_bundle::{BundleCompiler, BundleResult, CompiledBundle, ModuleUnificationDelegate};
use stencil_core::{DataSegment, Heap, Locator};
use walkdir::WalkDir;

use crate::error::{Error, Result};

pub const COMPONENTS_DIR: &str = "src/ui/components";
pub const TEMPLATE_FILE: &str = "template.hbs";
pub const HEAP_FILE: &str = "templates.gbx";
pub const DATA_JSON_FILE: &str = "data.json";
pub const DATA_MODULE_FILE: &str = "data.js";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectTemplate {
    /// Component name, taken from the directory.
    pub name: String,
    pub locator: Locator,
    pub path: PathBuf,
    pub source: String,
}

#[derive(Clone, Debug)]
pub struct Project {
    root: PathBuf,
    delegate: ModuleUnificationDelegate,
    templates: Vec<ProjectTemplate>,
}

impl Project {
    /// Reads every component template under `root`, sorted by component name.
    pub fn load(root: impl AsRef<Path>, main: &str) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let components = root.join(COMPONENTS_DIR);
        let delegate = ModuleUnificationDelegate::new(main);

        let mut templates = Vec::new();
        let walker = WalkDir::new(&components)
            .min_depth(2)
            .max_depth(2)
            .sort_by_file_name();
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() || entry.file_name() != TEMPLATE_FILE {
                continue;
            }
            let Some(name) = entry
                .path()
                .parent()
                .and_then(Path::file_name)
                .and_then(|n| n.to_str())
            else {
                continue;
            };
            let source = fs::read_to_string(entry.path()).map_err(|e| Error::io(entry.path(), e))?;
            tracing::debug!(component = name, path = %entry.path().display(), "found template");
            templates.push(ProjectTemplate {
                name: name.to_owned(),
                locator: delegate.template_locator(name),
                path: entry.into_path(),
                source,
            });
        }

        if templates.is_empty() {
            return Err(Error::NoTemplates(components));
        }
        if !templates.iter().any(|t| t.name == main) {
            return Err(Error::MissingMain(main.to_owned()));
        }
        Ok(Project {
            root,
            delegate,
            templates,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn delegate(&self) -> &ModuleUnificationDelegate {
        &self.delegate
    }

    pub fn templates(&self) -> &[ProjectTemplate] {
        &self.templates
    }

    pub fn template(&self, locator: &Locator) -> Option<&ProjectTemplate> {
        self.templates.iter().find(|t| &t.locator == locator)
    }

    pub fn compile(&self) -> BundleResult<CompiledBundle> {
        let mut compiler = BundleCompiler::new(self.delegate.clone());
        for template in &self.templates {
            compiler.add(template.locator.clone(), template.source.clone());
        }
        compiler.compile()
    }
}

/// Writes the heap and data segment into `dir`, creating it if needed.
pub fn write_dist(dir: &Path, heap: &Heap, data: &DataSegment, module: bool) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    let heap_path = dir.join(HEAP_FILE);
    fs::write(&heap_path, heap.as_bytes()).map_err(|e| Error::io(&heap_path, e))?;

    let (file, contents) = if module {
        (DATA_MODULE_FILE, data.to_module_source()?)
    } else {
        (DATA_JSON_FILE, data.to_json()?)
    };
    let data_path = dir.join(file);
    fs::write(&data_path, contents).map_err(|e| Error::io(&data_path, e))?;
    tracing::info!(dir = %dir.display(), heap_bytes = heap.len(), "wrote dist");
    Ok(())
}

/// Reads a dist directory written by [`write_dist`]; `data.json` wins over
/// `data.js` when both exist.
pub fn read_dist(dir: &Path) -> Result<(Heap, DataSegment)> {
    let heap_path = dir.join(HEAP_FILE);
    let heap = Heap::new(fs::read(&heap_path).map_err(|e| Error::io(&heap_path, e))?);

    let json_path = dir.join(DATA_JSON_FILE);
    let data = if json_path.exists() {
        let json = fs::read_to_string(&json_path).map_err(|e| Error::io(&json_path, e))?;
        DataSegment::from_json(&json)?
    } else {
        let module_path = dir.join(DATA_MODULE_FILE);
        let module = fs::read_to_string(&module_path).map_err(|e| Error::io(&module_path, e))?;
        let json = module
            .trim()
            .strip_prefix("export default")
            .and_then(|rest| rest.strip_suffix(';'))
            .ok_or_else(|| Error::MalformedModule(module_path.clone()))?;
        DataSegment::from_json(json)?
    };
    Ok((heap, data))
}

/// Parses `module#name`, or treats a bare name as a component in the
/// module-unification layout.
pub fn parse_entry(entry: &str, delegate: &ModuleUnificationDelegate) -> Locator {
    match entry.rsplit_once('#') {
        Some((module, name)) => Locator::new(module, name),
        None => delegate.template_locator(entry),
    }
}
