//! Path resolution.
//!
//! Maps a request path onto a registered function and decides whether the
//! request is dispatched, redirected to its canonical form, or rejected.
//!
//! Canonical forms are `/<name>/` for a normal call and
//! `/<name>/[<mode>/]:bg` for a background call. Clients that send a
//! `User-Agent` header are redirected to the canonical form; clients that
//! don't are served directly.

use crate::error::GatewayError;
use crate::function::{FunctionDefinition, FunctionRegistry};
use crate::routing::mode::{BackgroundMode, BACKGROUND_MARKER};
use std::sync::Arc;

/// How a dispatched function runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// The response waits for the function's result.
    Foreground,
    /// The response is sent immediately and the function runs detached.
    Background(BackgroundMode),
}

/// Outcome of resolving a request path.
#[derive(Debug, Clone)]
pub enum PathResolution {
    /// Invoke `definition`.
    Dispatch {
        definition: Arc<FunctionDefinition>,
        execution: Execution,
    },
    /// Redirect to the canonical path (query preserved).
    Redirect { location: String },
}

/// Resolves request paths against a function registry.
pub struct PathResolver<'a> {
    registry: &'a FunctionRegistry,
}

impl<'a> PathResolver<'a> {
    pub fn new(registry: &'a FunctionRegistry) -> Self {
        Self { registry }
    }

    /// Resolve `url` (path plus optional query).
    ///
    /// Unknown functions fail with a not-found [`GatewayError`].
    pub fn resolve(&self, url: &str, has_user_agent: bool) -> Result<PathResolution, GatewayError> {
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (url, None),
        };
        let rest = path.strip_prefix('/').unwrap_or(path);

        match rest.find(BACKGROUND_MARKER) {
            Some(index) => self.resolve_background(
                path,
                &rest[..index],
                &rest[index + BACKGROUND_MARKER.len()..],
                query,
                has_user_agent,
            ),
            None => self.resolve_foreground(path, rest, query, has_user_agent),
        }
    }

    fn resolve_foreground(
        &self,
        path: &str,
        rest: &str,
        query: Option<&str>,
        has_user_agent: bool,
    ) -> Result<PathResolution, GatewayError> {
        let (name, canonical) = match rest.strip_suffix('/') {
            Some(name) => (name, true),
            None => (rest, false),
        };
        let definition = self.lookup(name).ok_or_else(|| not_found(path))?;

        if !canonical && has_user_agent {
            return Ok(PathResolution::Redirect {
                location: with_query(format!("/{}/", name), query),
            });
        }
        Ok(PathResolution::Dispatch {
            definition,
            execution: Execution::Foreground,
        })
    }

    fn resolve_background(
        &self,
        path: &str,
        before: &str,
        after: &str,
        query: Option<&str>,
        has_user_agent: bool,
    ) -> Result<PathResolution, GatewayError> {
        if !after.is_empty() && after != "/" {
            return Err(not_found(path));
        }
        let separated = before.is_empty() || before.ends_with('/');
        let base = before.trim_end_matches('/');
        let (definition, mode) = self.lookup_background(base).ok_or_else(|| not_found(path))?;

        if !separated && has_user_agent {
            return Ok(PathResolution::Redirect {
                location: with_query(format!("/{}/{}", base, BACKGROUND_MARKER), query),
            });
        }
        let mode = mode.unwrap_or(definition.signature().mode);
        Ok(PathResolution::Dispatch {
            definition,
            execution: Execution::Background(mode),
        })
    }

    /// Find the function a background path names.
    ///
    /// The whole base is tried as a function name first, so a registered
    /// `fn/info` always wins over `fn` in `info` mode.
    fn lookup_background(
        &self,
        base: &str,
    ) -> Option<(Arc<FunctionDefinition>, Option<BackgroundMode>)> {
        if let Some(definition) = self.lookup(base) {
            return Some((definition, None));
        }
        let (name, segment) = base.rsplit_once('/')?;
        let mode = segment.parse::<BackgroundMode>().ok()?;
        self.lookup(name).map(|definition| (definition, Some(mode)))
    }

    fn lookup(&self, name: &str) -> Option<Arc<FunctionDefinition>> {
        if name.is_empty() {
            return None;
        }
        self.registry.get(name).cloned()
    }
}

fn with_query(location: String, query: Option<&str>) -> String {
    match query {
        Some(query) => format!("{}?{}", location, query),
        None => location,
    }
}

fn not_found(path: &str) -> GatewayError {
    GatewayError::not_found(format!("No function matches \"{}\"", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{from_fn, FunctionContext, FunctionOutput, Params};

    fn registry() -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        for name in ["my_function", "bg", "runtime/array", "shadow", "shadow/info"] {
            let definition = FunctionDefinition::new(
                name,
                from_fn(|_params: Params, _ctx: FunctionContext| async {
                    Ok(FunctionOutput::default())
                }),
            )
            .background(BackgroundMode::Params);
            registry.register(definition).unwrap();
        }
        registry
    }

    fn dispatched(resolution: PathResolution) -> (String, Execution) {
        match resolution {
            PathResolution::Dispatch {
                definition,
                execution,
            } => (definition.name().to_string(), execution),
            other => panic!("expected dispatch, got {:?}", other),
        }
    }

    fn location(resolution: PathResolution) -> String {
        match resolution {
            PathResolution::Redirect { location } => location,
            other => panic!("expected redirect, got {:?}", other),
        }
    }

    #[test]
    fn test_canonical_path_dispatches() {
        let registry = registry();
        let resolver = PathResolver::new(&registry);
        let (name, execution) = dispatched(resolver.resolve("/my_function/?a=1", true).unwrap());
        assert_eq!(name, "my_function");
        assert_eq!(execution, Execution::Foreground);

        let (name, _) = dispatched(resolver.resolve("/runtime/array/", false).unwrap());
        assert_eq!(name, "runtime/array");
    }

    #[test]
    fn test_missing_slash_redirects_only_with_user_agent() {
        let registry = registry();
        let resolver = PathResolver::new(&registry);
        assert_eq!(
            location(resolver.resolve("/my_function", true).unwrap()),
            "/my_function/"
        );
        assert_eq!(
            location(resolver.resolve("/my_function?a=1&b=2", true).unwrap()),
            "/my_function/?a=1&b=2"
        );
        let (name, _) = dispatched(resolver.resolve("/my_function", false).unwrap());
        assert_eq!(name, "my_function");
    }

    #[test]
    fn test_unknown_function_is_not_found() {
        let registry = registry();
        let resolver = PathResolver::new(&registry);
        for url in ["/", "", "/nope/", "/nope", "/runtime/", "/nope/:bg"] {
            let err = resolver.resolve(url, true).unwrap_err();
            assert_eq!(err.status().0, 404, "{}", url);
        }
    }

    #[test]
    fn test_background_paths() {
        let registry = registry();
        let resolver = PathResolver::new(&registry);

        let (name, execution) = dispatched(resolver.resolve("/bg/:bg", true).unwrap());
        assert_eq!(name, "bg");
        assert_eq!(execution, Execution::Background(BackgroundMode::Params));

        let (_, execution) = dispatched(resolver.resolve("/bg/:bg/", true).unwrap());
        assert_eq!(execution, Execution::Background(BackgroundMode::Params));

        let (_, execution) = dispatched(resolver.resolve("/bg/empty/:bg", true).unwrap());
        assert_eq!(execution, Execution::Background(BackgroundMode::Empty));

        let (_, execution) =
            dispatched(resolver.resolve("/bg/paramsSpecific2/:bg?x=1", true).unwrap());
        assert_eq!(execution, Execution::Background(BackgroundMode::ParamsSpecific(2)));
    }

    #[test]
    fn test_background_marker_without_separator_redirects() {
        let registry = registry();
        let resolver = PathResolver::new(&registry);
        assert_eq!(location(resolver.resolve("/bg:bg", true).unwrap()), "/bg/:bg");
        assert_eq!(location(resolver.resolve("/bg:bg/", true).unwrap()), "/bg/:bg");
        assert_eq!(
            location(resolver.resolve("/bg:bg?test=param", true).unwrap()),
            "/bg/:bg?test=param"
        );
        assert_eq!(
            location(resolver.resolve("/bg:bg/?test=param", true).unwrap()),
            "/bg/:bg?test=param"
        );
        assert_eq!(
            location(resolver.resolve("/bg/info:bg", true).unwrap()),
            "/bg/info/:bg"
        );

        let (name, _) = dispatched(resolver.resolve("/bg:bg", false).unwrap());
        assert_eq!(name, "bg");
    }

    #[test]
    fn test_longest_function_name_wins() {
        let registry = registry();
        let resolver = PathResolver::new(&registry);
        let (name, execution) = dispatched(resolver.resolve("/shadow/info/:bg", false).unwrap());
        assert_eq!(name, "shadow/info");
        assert_eq!(execution, Execution::Background(BackgroundMode::Params));
    }

    #[test]
    fn test_text_after_marker_is_not_found() {
        let registry = registry();
        let resolver = PathResolver::new(&registry);
        assert!(resolver.resolve("/bg/:bg/extra", false).is_err());
        assert!(resolver.resolve("/bg/later/:bg", false).is_err());
    }
}
