use std::path::{Path, PathBuf};

use crate::error::Error;

/// Name of the optional project config file, looked up in the base path.
const CONFIG_FILE: &str = ".doclinks.toml";

/// Settings given on the command line. Each one, when present, wins over
/// the same setting in `.doclinks.toml`.
#[derive(Debug, Default)]
pub struct ConfigOverrides {
    /// Fallback base path for when no repository root is found.
    pub base_path: Option<PathBuf>,
    /// Extension that link targets leave off.
    pub dropped_extension: Option<String>,
    /// Allow link targets with path separators.
    pub relative_links: bool,
}

/// Raw TOML structure for `.doclinks.toml`.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct DoclinksTomlConfig {
    /// Extension that link targets leave off.
    #[serde(default)]
    dropped_extension: Option<String>,
    /// Path prefixes skipped when walking directory arguments.
    #[serde(default)]
    exclude: Vec<String>,
    /// Path prefixes scanned when walking directory arguments; empty means all.
    #[serde(default)]
    include: Vec<String>,
    /// Allow link targets with path separators.
    #[serde(default)]
    relative_links: bool,
}

/// Settings for one run, fixed before the first document is checked.
#[derive(Debug, Clone)]
pub struct RunConfiguration {
    /// Repository root, or the fallback given with `--base-path`.
    /// Only used to locate the config file; link resolution is relative
    /// to each source document's own directory.
    base_path: PathBuf,
    /// Extension appended to link targets before lookup.
    dropped_extension: Option<String>,
    /// Path prefixes excluded from directory walks.
    exclude: Vec<String>,
    /// Path prefixes included in directory walks.
    include: Vec<String>,
    /// Whether link targets may contain path separators.
    relative_links: bool,
}

impl RunConfiguration {
    /// Root the run was configured from.
    pub fn base_path(&self) -> &Path {
        return &self.base_path;
    }

    /// The dropped extension, if set and non-empty.
    pub fn dropped_extension(&self) -> Option<&str> {
        return self.dropped_extension.as_deref().filter(|ext| return !ext.is_empty());
    }

    /// Build the run configuration.
    ///
    /// The base path is the nearest ancestor of `working_dir` containing `.git`;
    /// `--base-path` is the fallback when there is none, and `working_dir` the
    /// last resort. `.doclinks.toml` in the base path is read if present.
    /// A missing config file yields defaults; a malformed one is an error,
    /// never a silent fallback.
    ///
    /// # Errors
    ///
    /// Returns `Error::BasePathInvalid` if `--base-path` is not a directory,
    /// `Error::Read` if the config file exists but cannot be read,
    /// or `Error::TomlDe` if it is malformed.
    pub fn load(working_dir: &Path, overrides: ConfigOverrides) -> Result<Self, Error> {
        let fallback = match overrides.base_path {
            Some(path) if !path.is_dir() => return Err(Error::BasePathInvalid { path }),
            other => other,
        };

        let base_path = discover_repository_root(working_dir)
            .or(fallback)
            .unwrap_or_else(|| return working_dir.to_path_buf());
        tracing::debug!("base path: {}", base_path.display());

        let raw = read_config_file(&base_path)?;
        let dropped_extension = overrides.dropped_extension.or(raw.dropped_extension);
        let relative_links = overrides.relative_links || raw.relative_links;
        return Ok(Self {
            exclude: raw.exclude,
            include: raw.include,
            ..Self::new(base_path, dropped_extension, relative_links)
        });
    }

    /// Configuration with no include/exclude filters.
    pub const fn new(base_path: PathBuf, dropped_extension: Option<String>, relative_links: bool) -> Self {
        return Self {
            base_path,
            dropped_extension,
            exclude: Vec::new(),
            include: Vec::new(),
            relative_links,
        };
    }

    /// Whether link targets may point outside the source document's directory.
    pub const fn relative_links(&self) -> bool {
        return self.relative_links;
    }

    /// Check whether a markdown file found in a directory walk should be checked.
    ///
    /// A path is included if no include patterns are set (check everything),
    /// or if the path starts with at least one include pattern.
    /// An included path is then excluded if it starts with any exclude pattern.
    pub fn should_scan(&self, relative_path: &str) -> bool {
        let included = self.include.is_empty()
            || self.include.iter().any(|p| return relative_path.starts_with(p.as_str()));

        if !included {
            return false;
        }

        return !self.exclude.iter().any(|p| return relative_path.starts_with(p.as_str()));
    }
}

/// Nearest ancestor of `start` (inclusive) that contains a `.git` entry.
fn discover_repository_root(start: &Path) -> Option<PathBuf> {
    return start
        .ancestors()
        .find(|dir| return dir.join(".git").exists())
        .map(Path::to_path_buf);
}

/// Read `.doclinks.toml` from the base path, or defaults if it does not exist.
///
/// # Errors
///
/// Returns `Error::Read` for I/O failures other than not-found,
/// or `Error::TomlDe` if the TOML is malformed.
fn read_config_file(base_path: &Path) -> Result<DoclinksTomlConfig, Error> {
    let path = base_path.join(CONFIG_FILE);
    let content = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(DoclinksTomlConfig::default()),
        Err(source) => return Err(Error::Read { path, source }),
    };
    tracing::debug!("loaded {}", path.display());
    return Ok(toml::from_str(&content)?);
}
