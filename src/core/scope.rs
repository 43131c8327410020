//! Scope resolution for sinks that write into tool directories
//!
//! A sink declares which scopes it understands through its
//! [`Capabilities`](crate::core::traits::Capabilities); a job selects one, and
//! the resolver turns that pair into a concrete root directory.

use crate::core::traits::Capabilities;
use crate::utils::error::{AppError, AppResult, SyncError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Breadth of a write target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Shared across all projects, rooted in the home directory.
    Global,
    /// Limited to the project directory the pass runs in.
    Project,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Global => f.write_str("global"),
            Scope::Project => f.write_str("project"),
        }
    }
}

/// Which scopes a sink accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeModel {
    /// The sink has its own explicit target (directory path, URL).
    None,
    Global,
    Project,
    GlobalOrProject,
}

impl ScopeModel {
    pub fn supports(self, scope: Scope) -> bool {
        match self {
            ScopeModel::None => false,
            ScopeModel::Global => scope == Scope::Global,
            ScopeModel::Project => scope == Scope::Project,
            ScopeModel::GlobalOrProject => true,
        }
    }

    /// Scope used when neither the sink nor the job selects one.
    pub fn default_scope(self) -> Option<Scope> {
        match self {
            ScopeModel::None => None,
            ScopeModel::Global => Some(Scope::Global),
            ScopeModel::Project | ScopeModel::GlobalOrProject => Some(Scope::Project),
        }
    }
}

/// Directories captured once at invocation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeContext {
    home: Option<PathBuf>,
    project: PathBuf,
}

impl ScopeContext {
    pub fn new(home: Option<PathBuf>, project: impl Into<PathBuf>) -> Self {
        Self {
            home,
            project: project.into(),
        }
    }

    /// Capture the home directory and the current working directory.
    pub fn from_environment() -> AppResult<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| AppError::System(format!("Cannot determine working directory: {}", e)))?;
        Ok(Self::new(dirs::home_dir(), cwd))
    }

    /// Same home, different project root. Relative paths are taken from the
    /// current project root.
    pub fn with_project_dir(&self, dir: &Path) -> Self {
        Self {
            home: self.home.clone(),
            project: self.project.join(dir),
        }
    }

    pub fn home(&self) -> Option<&Path> {
        self.home.as_deref()
    }

    pub fn project(&self) -> &Path {
        &self.project
    }
}

/// The concrete write root a job hands to its sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeRoot {
    /// The sink carries its own target.
    Unscoped,
    Directory { scope: Scope, path: PathBuf },
}

impl ScopeRoot {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ScopeRoot::Unscoped => None,
            ScopeRoot::Directory { path, .. } => Some(path),
        }
    }

    pub fn scope(&self) -> Option<Scope> {
        match self {
            ScopeRoot::Unscoped => None,
            ScopeRoot::Directory { scope, .. } => Some(*scope),
        }
    }
}

/// Resolve the write root for `sink` given the scope a job requested.
///
/// Requesting any scope from a sink with [`ScopeModel::None`], or a scope the
/// sink does not list, fails with [`SyncError::ScopeUnsupported`].
pub fn resolve_scope(
    sink: &str,
    capabilities: &Capabilities,
    requested: Option<Scope>,
    ctx: &ScopeContext,
) -> Result<ScopeRoot, SyncError> {
    let model = capabilities.scope_model;
    let scope = match requested.or_else(|| model.default_scope()) {
        None => return Ok(ScopeRoot::Unscoped),
        Some(scope) => scope,
    };

    if !model.supports(scope) {
        return Err(SyncError::ScopeUnsupported {
            sink: sink.to_string(),
            requested: scope,
        });
    }

    let base = match scope {
        Scope::Global => ctx.home().map(Path::to_path_buf).ok_or_else(|| {
            SyncError::validation(
                format!("sink '{}'", sink),
                "global scope requested but the home directory cannot be determined",
            )
        })?,
        Scope::Project => ctx.project().to_path_buf(),
    };

    let path = match capabilities.scope_dir {
        Some(dir) => base.join(dir),
        None => base,
    };

    Ok(ScopeRoot::Directory { scope, path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ctx() -> ScopeContext {
        ScopeContext::new(Some(PathBuf::from("/home/dev")), "/work/app")
    }

    fn caps(scope_model: ScopeModel, scope_dir: Option<&'static str>) -> Capabilities {
        Capabilities {
            supports_metadata: false,
            scope_model,
            scope_dir,
        }
    }

    #[test]
    fn test_global_scope_resolves_under_home() {
        let root = resolve_scope(
            "claude",
            &caps(ScopeModel::GlobalOrProject, Some(".claude")),
            Some(Scope::Global),
            &ctx(),
        )
        .unwrap();
        assert_eq!(
            root,
            ScopeRoot::Directory {
                scope: Scope::Global,
                path: PathBuf::from("/home/dev/.claude"),
            }
        );
    }

    #[test]
    fn test_project_scope_is_default_for_scoped_sinks() {
        let root = resolve_scope(
            "claude",
            &caps(ScopeModel::GlobalOrProject, Some(".claude")),
            None,
            &ctx(),
        )
        .unwrap();
        assert_eq!(root.path(), Some(Path::new("/work/app/.claude")));
        assert_eq!(root.scope(), Some(Scope::Project));
    }

    #[test]
    fn test_project_only_sink_rejects_global() {
        let err = resolve_scope(
            "cursor-rules",
            &caps(ScopeModel::Project, Some(".cursor")),
            Some(Scope::Global),
            &ctx(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            SyncError::ScopeUnsupported {
                sink: "cursor-rules".to_string(),
                requested: Scope::Global,
            }
        );
    }

    #[test]
    fn test_unscoped_sink() {
        let model = caps(ScopeModel::None, None);
        assert_eq!(resolve_scope("fs", &model, None, &ctx()).unwrap(), ScopeRoot::Unscoped);
        assert!(resolve_scope("fs", &model, Some(Scope::Project), &ctx()).is_err());
    }

    #[test]
    fn test_global_scope_without_home() {
        let ctx = ScopeContext::new(None, "/work/app");
        let err = resolve_scope(
            "claude",
            &caps(ScopeModel::GlobalOrProject, Some(".claude")),
            Some(Scope::Global),
            &ctx,
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::Validation { .. }));
    }

    #[test]
    fn test_project_dir_override() {
        let ctx = ctx().with_project_dir(Path::new("sub/project"));
        assert_eq!(ctx.project(), Path::new("/work/app/sub/project"));
        let ctx = ctx.with_project_dir(Path::new("/abs"));
        assert_eq!(ctx.project(), Path::new("/abs"));
    }
}
