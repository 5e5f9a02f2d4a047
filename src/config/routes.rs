//! Declarative route files.
//!
//! A route file is TOML. Top-level `[[routes]]` are registered first, in
//! file order, then each `[[groups]]` table, which may nest its own
//! `routes` and `groups`:
//!
//! ```toml
//! [[routes]]
//! name = "home"
//! methods = ["GET"]
//! path = "/"
//! controller = "status@show"
//!
//! [[groups]]
//! prefix = "/api"
//! middleware = [{ name = "throttle", params = { max_requests = 60 } }]
//!
//! [[groups.routes]]
//! methods = ["GET"]
//! path = "/users/{id:\\d+}"
//! controller = "users@show"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::loader::{read, ConfigError};
use crate::routing::{
    source_digest, ControllerRef, GroupOptions, MiddlewareRef, Route, RouteCollection, RouteCollectionBuilder, Scheme,
};

/// A middleware entry: a bare name or a name with parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MiddlewareEntry {
    Name(String),
    Configured {
        name: String,
        #[serde(default)]
        params: BTreeMap<String, toml::Value>,
    },
}

impl MiddlewareEntry {
    fn to_ref(&self) -> MiddlewareRef {
        match self {
            MiddlewareEntry::Name(name) => MiddlewareRef::new(name.as_str()),
            MiddlewareEntry::Configured { name, params } => {
                params
                    .iter()
                    .fold(MiddlewareRef::new(name.as_str()), |acc, (key, value)| match value {
                        toml::Value::String(s) => acc.with_param(key.as_str(), s),
                        other => acc.with_param(key.as_str(), other),
                    })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub name: Option<String>,
    /// Empty means any method.
    #[serde(default)]
    pub methods: Vec<String>,
    pub path: String,
    pub host: Option<String>,
    pub scheme: Option<Scheme>,
    /// `controller@action`.
    pub controller: String,
    #[serde(default)]
    pub middleware: Vec<MiddlewareEntry>,
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
    #[serde(default)]
    pub constraints: BTreeMap<String, String>,
}

impl RouteEntry {
    pub fn to_route(&self) -> Result<Route, ConfigError> {
        let target: ControllerRef = self.controller.parse().map_err(|reason| ConfigError::InvalidRoute {
            route: self.label(),
            reason,
        })?;

        let mut route = Route::new(&self.methods, self.path.clone(), target);
        route.name = self.name.clone();
        route.host = self.host.clone();
        route.scheme = self.scheme.unwrap_or_default();
        route.middleware = self.middleware.iter().map(MiddlewareEntry::to_ref).collect();
        route.defaults = self.defaults.clone();
        route.constraints = self.constraints.clone();
        Ok(route)
    }

    fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("`{}`", name),
            None => format!("`{}`", self.path),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupEntry {
    pub prefix: String,
    pub host: Option<String>,
    pub scheme: Option<Scheme>,
    pub middleware: Vec<MiddlewareEntry>,
    pub constraints: BTreeMap<String, String>,
    pub namespace: Option<String>,
    pub routes: Vec<RouteEntry>,
    pub groups: Vec<GroupEntry>,
}

impl GroupEntry {
    fn options(&self) -> GroupOptions {
        GroupOptions {
            prefix: self.prefix.clone(),
            host: self.host.clone(),
            scheme: self.scheme,
            middleware: self.middleware.iter().map(MiddlewareEntry::to_ref).collect(),
            constraints: self.constraints.clone(),
            namespace: self.namespace.clone(),
        }
    }
}

/// Parsed contents of a route file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteFile {
    pub routes: Vec<RouteEntry>,
    pub groups: Vec<GroupEntry>,
}

impl RouteFile {
    pub fn parse(source: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(source).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Register every route with `builder`, in file order.
    pub fn apply(&self, builder: &mut RouteCollectionBuilder) -> Result<(), ConfigError> {
        apply_level(&self.routes, &self.groups, builder)
    }

    /// Compile into a fresh collection.
    pub fn build(&self) -> Result<RouteCollection, ConfigError> {
        let mut builder = RouteCollectionBuilder::new();
        self.apply(&mut builder)?;
        Ok(builder.build()?)
    }
}

fn apply_level(
    routes: &[RouteEntry],
    groups: &[GroupEntry],
    builder: &mut RouteCollectionBuilder,
) -> Result<(), ConfigError> {
    for entry in routes {
        builder.add(entry.to_route()?);
    }
    for group in groups {
        let mut outcome = Ok(());
        builder.group(group.options(), |inner| {
            outcome = apply_level(&group.routes, &group.groups, inner);
        });
        outcome?;
    }
    Ok(())
}

/// A route file together with the digest of its raw bytes.
#[derive(Debug, Clone)]
pub struct LoadedRoutes {
    pub file: RouteFile,
    pub digest: String,
}

pub fn load_route_file(path: &Path) -> Result<LoadedRoutes, ConfigError> {
    let source = read(path)?;
    let file = RouteFile::parse(&source, path)?;
    tracing::info!(
        path = %path.display(),
        routes = file.routes.len(),
        groups = file.groups.len(),
        "Route file loaded"
    );
    Ok(LoadedRoutes {
        digest: source_digest(source.as_bytes()),
        file,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
[[routes]]
name = "home"
methods = ["GET"]
path = "/"
controller = "status@show"

[[groups]]
prefix = "/api"
namespace = "api"
middleware = ["auth", { name = "throttle", params = { max_requests = 60, per_seconds = 30 } }]

[[groups.routes]]
name = "users.show"
methods = ["GET", "HEAD"]
path = "/users/{id}"
controller = "users@show"
constraints = { id = "\\d+" }

[[groups.groups]]
prefix = "/admin"
host = "admin.example.com"

[[groups.groups.routes]]
path = "/stats"
controller = "stats@index"
scheme = "https"
"#;

    fn parse() -> RouteFile {
        RouteFile::parse(SOURCE, Path::new("routes.toml")).unwrap()
    }

    #[test]
    fn test_parse_nested_file() {
        let file = parse();
        assert_eq!(file.routes.len(), 1);
        assert_eq!(file.groups[0].routes.len(), 1);
        assert_eq!(file.groups[0].groups[0].routes[0].path, "/stats");
        assert!(matches!(
            &file.groups[0].middleware[1],
            MiddlewareEntry::Configured { name, .. } if name == "throttle"
        ));
    }

    #[test]
    fn test_build_applies_groups_in_order() {
        let collection = parse().build().unwrap();
        let routes: Vec<&Route> = collection.iter().map(|c| c.route()).collect();
        assert_eq!(routes.len(), 3);

        assert_eq!(routes[0].path, "/");
        assert_eq!(routes[1].path, "/api/users/{id}");
        assert_eq!(routes[1].controller, ControllerRef::new("api::users", "show"));
        assert_eq!(routes[1].middleware[1].params["max_requests"], "60");
        assert!(routes[1].methods.contains("HEAD"));

        assert_eq!(routes[2].path, "/api/admin/stats");
        assert_eq!(routes[2].host.as_deref(), Some("admin.example.com"));
        assert_eq!(routes[2].scheme, Scheme::Https);
        assert_eq!(routes[2].middleware.len(), 2);
    }

    #[test]
    fn test_bad_controller_reference() {
        let source = "[[routes]]\npath = \"/\"\ncontroller = \"nope\"\n";
        let file = RouteFile::parse(source, Path::new("routes.toml")).unwrap();
        assert!(matches!(file.build(), Err(ConfigError::InvalidRoute { .. })));
    }

    #[test]
    fn test_malformed_file() {
        let err = RouteFile::parse("[[routes]]\npath = 1\n", Path::new("bad.toml")).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }
}
