//! Registry backed by a Python environment's site-packages directories.
//!
//! Installed distributions are discovered from their `*.dist-info` and
//! `*.egg-info` metadata entries. The Python interpreter is only consulted
//! to locate the site-packages directories; everything else is read
//! straight from disk.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

use super::types::{DistMetadata, InstalledPackage};
use super::{PackageRegistry, RegistryError, RegistryResult};

/// Script passed to the interpreter to print its library directories.
///
/// Order follows `sys.path`: the user site first, then the environment's
/// purelib/platlib and any further global site directories.
const SITE_QUERY: &str = "import site, sysconfig\n\
if site.ENABLE_USER_SITE:\n    print(site.getusersitepackages())\n\
paths = sysconfig.get_paths()\n\
for key in ('purelib', 'platlib'):\n    print(paths[key])\n\
for path in getattr(site, 'getsitepackages', list)():\n    print(path)\n";

/// Interpreter used when neither config nor CLI names one.
///
/// Prefers the interpreter of an activated virtualenv.
pub fn default_interpreter() -> String {
    if let Some(venv) = std::env::var_os("VIRTUAL_ENV") {
        let venv = PathBuf::from(venv);
        let candidate = if cfg!(windows) {
            venv.join("Scripts").join("python.exe")
        } else {
            venv.join("bin").join("python")
        };
        if candidate.exists() {
            return candidate.to_string_lossy().into_owned();
        }
    }
    if cfg!(windows) {
        "python".to_string()
    } else {
        "python3".to_string()
    }
}

/// Asks `python` for its site-packages directories.
///
/// Returns only directories that exist, in the order the interpreter
/// reported them, without duplicates.
pub fn discover_site_packages(python: &str) -> RegistryResult<Vec<PathBuf>> {
    query_site_dirs(Command::new(python), python)
}

/// Runs [`SITE_QUERY`] through `command`, an interpreter invocation.
fn query_site_dirs(mut command: Command, python: &str) -> RegistryResult<Vec<PathBuf>> {
    let output = command
        .arg("-c")
        .arg(SITE_QUERY)
        .output()
        .map_err(|e| {
            RegistryError::EnvironmentUnavailable(format!("failed to run '{}': {}", python, e))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RegistryError::EnvironmentUnavailable(format!(
            "'{}' exited with {}: {}",
            python,
            output.status,
            stderr.trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let dirs = existing_unique_dirs(stdout.lines().map(str::trim).filter(|l| !l.is_empty()));

    if dirs.is_empty() {
        return Err(RegistryError::EnvironmentUnavailable(format!(
            "'{}' reported no existing site-packages directory",
            python
        )));
    }

    debug!("Discovered site-packages via {}: {:?}", python, dirs);
    Ok(dirs)
}

fn existing_unique_dirs<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    lines
        .map(PathBuf::from)
        .filter(|p| p.is_dir())
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

/// Normalizes a project name the way PEP 503 compares them.
///
/// Lower-cases and collapses every run of `-`, `_` and `.` into one `-`,
/// so `typing_extensions` and `Typing.Extensions` are the same project.
pub fn normalize_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut in_separator = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            in_separator = true;
            continue;
        }
        if in_separator && !normalized.is_empty() {
            normalized.push('-');
        }
        in_separator = false;
        normalized.extend(c.to_lowercase());
    }
    normalized
}

/// Parses the RFC 822 style header block of a `METADATA`/`PKG-INFO` file.
///
/// Only the first `Name:` and `Version:` headers are taken; parsing stops
/// at the first blank line, where the long description begins.
pub fn parse_metadata(content: &str) -> DistMetadata {
    let mut meta = DistMetadata::default();

    for line in content.lines() {
        if line.trim().is_empty() {
            break;
        }
        // Continuation lines
        if line.starts_with(' ') || line.starts_with('\t') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.trim().to_ascii_lowercase().as_str() {
            "name" if meta.name.is_none() => meta.name = Some(value.to_string()),
            "version" if meta.version.is_none() => meta.version = Some(value.to_string()),
            _ => {}
        }
        if meta.is_complete() {
            break;
        }
    }

    meta
}

/// Kind of metadata entry found in a site-packages directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetadataKind {
    DistInfo,
    EggInfoDir,
    EggInfoFile,
}

impl MetadataKind {
    fn classify(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        if file_name.ends_with(".dist-info") && path.is_dir() {
            Some(MetadataKind::DistInfo)
        } else if file_name.ends_with(".egg-info") {
            if path.is_dir() {
                Some(MetadataKind::EggInfoDir)
            } else {
                Some(MetadataKind::EggInfoFile)
            }
        } else {
            None
        }
    }

    fn metadata_file(self, entry: &Path) -> PathBuf {
        match self {
            MetadataKind::DistInfo => entry.join("METADATA"),
            MetadataKind::EggInfoDir => entry.join("PKG-INFO"),
            MetadataKind::EggInfoFile => entry.to_path_buf(),
        }
    }

    fn top_level_file(self, entry: &Path) -> Option<PathBuf> {
        match self {
            MetadataKind::DistInfo | MetadataKind::EggInfoDir => Some(entry.join("top_level.txt")),
            MetadataKind::EggInfoFile => None,
        }
    }
}

/// Picks the install root for a distribution inside `site_dir`.
///
/// Candidates, first existing wins: the name with `-` replaced by `_`,
/// the lower-cased name, the lower-cased name with `_`, the first module
/// from `top_level.txt`, then single-file modules for the same names.
/// When none exist the first candidate is returned unchanged.
pub fn resolve_location(site_dir: &Path, name: &str, top_level: Option<&str>) -> PathBuf {
    let underscored = name.replace('-', "_");
    let lowered = name.to_lowercase();
    let lowered_underscored = lowered.replace('-', "_");

    let mut stems: Vec<&str> = vec![
        underscored.as_str(),
        lowered.as_str(),
        lowered_underscored.as_str(),
    ];
    if let Some(module) = top_level {
        stems.push(module);
    }

    let dirs = stems.iter().map(|stem| site_dir.join(stem));
    let modules = stems.iter().map(|stem| site_dir.join(format!("{}.py", stem)));

    dirs.chain(modules)
        .find(|candidate| candidate.exists())
        .unwrap_or_else(|| site_dir.join(&underscored))
}

fn read_top_level(path: &Path) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.replace('/', std::path::MAIN_SEPARATOR_STR))
}

/// Registry over one environment's site-packages directories.
#[derive(Debug, Clone)]
pub struct SitePackagesRegistry {
    site_dirs: Vec<PathBuf>,
}

impl SitePackagesRegistry {
    /// Creates a registry over explicit site-packages directories.
    pub fn new(site_dirs: Vec<PathBuf>) -> Self {
        Self { site_dirs }
    }

    /// Creates a registry by asking `python` where its packages live.
    pub fn from_interpreter(python: &str) -> RegistryResult<Self> {
        Ok(Self::new(discover_site_packages(python)?))
    }

    /// The directories this registry reads from.
    pub fn site_dirs(&self) -> &[PathBuf] {
        &self.site_dirs
    }

    fn scan_dir(
        &self,
        site_dir: &Path,
        seen: &mut HashSet<String>,
        claimed: &mut HashSet<PathBuf>,
        packages: &mut Vec<InstalledPackage>,
    ) -> RegistryResult<()> {
        let read_dir = fs::read_dir(site_dir).map_err(|e| {
            RegistryError::EnvironmentUnavailable(format!(
                "cannot read {}: {}",
                site_dir.display(),
                e
            ))
        })?;

        let mut entries: Vec<PathBuf> = read_dir
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        entries.sort();

        for entry in entries {
            let Some(kind) = MetadataKind::classify(&entry) else {
                continue;
            };

            let metadata_path = kind.metadata_file(&entry);
            let meta = match fs::read_to_string(&metadata_path) {
                Ok(content) => parse_metadata(&content),
                Err(e) => {
                    warn!("Skipping {}: {}", metadata_path.display(), e);
                    continue;
                }
            };

            let (Some(name), Some(version)) = (meta.name, meta.version) else {
                warn!("Skipping {}: missing Name or Version", metadata_path.display());
                continue;
            };

            if !seen.insert(normalize_name(&name)) {
                debug!("Ignoring shadowed distribution {} in {}", name, site_dir.display());
                continue;
            }

            let top_level = kind.top_level_file(&entry).and_then(|p| read_top_level(&p));
            let mut location = resolve_location(site_dir, &name, top_level.as_deref());

            // A shared namespace root (google/, zope/) belongs to whichever
            // distribution claimed it first; later ones size to nothing.
            if location.exists() && !claimed.insert(location.clone()) {
                debug!(
                    "{} shares {} with an earlier distribution",
                    name,
                    location.display()
                );
                location = site_dir.join(name.replace('-', "_"));
            }
            packages.push(InstalledPackage::new(name, version, location));
        }

        Ok(())
    }
}

impl PackageRegistry for SitePackagesRegistry {
    fn packages(&self) -> RegistryResult<Vec<InstalledPackage>> {
        if self.site_dirs.is_empty() {
            return Err(RegistryError::EnvironmentUnavailable(
                "no site-packages directory configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut claimed = HashSet::new();
        let mut packages = Vec::new();
        for dir in &self.site_dirs {
            self.scan_dir(dir, &mut seen, &mut claimed, &mut packages)?;
        }

        debug!(
            "Registry reported {} packages from {} directories",
            packages.len(),
            self.site_dirs.len()
        );
        Ok(packages)
    }
}

/// Registry that locates site-packages through an interpreter on every query.
///
/// Unlike [`SitePackagesRegistry::from_interpreter`], a missing or broken
/// interpreter surfaces from [`PackageRegistry::packages`] rather than at
/// construction.
#[derive(Debug, Clone)]
pub struct InterpreterRegistry {
    python: String,
}

impl InterpreterRegistry {
    /// Creates a registry that will query `python` on each pass.
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
        }
    }

    /// The interpreter queried for site-packages.
    pub fn python(&self) -> &str {
        &self.python
    }
}

impl PackageRegistry for InterpreterRegistry {
    fn packages(&self) -> RegistryResult<Vec<InstalledPackage>> {
        SitePackagesRegistry::from_interpreter(&self.python)?.packages()
    }
}
