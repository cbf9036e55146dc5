//! Static route table
//! Maps exact method + path pairs to either the greeting or a backend forward

use hyper::Method;
use std::collections::HashMap;

/// Placeholder replaced by the deployment namespace in host templates
pub const NAMESPACE_PLACEHOLDER: &str = "{namespace}";

/// What to do with a matched request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAction {
    /// Answer locally with the fixed greeting
    Greeting,
    /// Forward to the backend named by the host template
    Forward { host_template: &'static str },
}

/// A single static route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub method: Method,
    pub path: &'static str,
    pub action: RouteAction,
}

impl Route {
    /// Route answered with the greeting
    pub fn greeting(method: Method, path: &'static str) -> Self {
        Self {
            method,
            path,
            action: RouteAction::Greeting,
        }
    }

    /// Route forwarded to `host_template` with the namespace filled in
    pub fn forward(method: Method, path: &'static str, host_template: &'static str) -> Self {
        Self {
            method,
            path,
            action: RouteAction::Forward { host_template },
        }
    }

    /// Backend host for this route, or `None` for local routes
    pub fn backend_host(&self, namespace: &str) -> Option<String> {
        match &self.action {
            RouteAction::Forward { host_template } => Some(expand_host(host_template, namespace)),
            RouteAction::Greeting => None,
        }
    }

    /// Backend base URL (`http://<host>/`, port 80 implied)
    pub fn backend_url(&self, namespace: &str) -> Option<String> {
        self.backend_host(namespace).map(|host| format!("http://{}/", host))
    }
}

/// Fill the namespace into a host template
pub fn expand_host(host_template: &str, namespace: &str) -> String {
    host_template.replace(NAMESPACE_PLACEHOLDER, namespace)
}

/// Base URL for a host template (`http://<host>/`)
pub fn target_url(host_template: &str, namespace: &str) -> String {
    format!("http://{}/", expand_host(host_template, namespace))
}

/// Immutable lookup table keyed by exact path, then method
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<&'static str, HashMap<Method, Route>>,
}

impl RouteTable {
    /// Build a table from a list of routes; later duplicates win
    pub fn new(routes: impl IntoIterator<Item = Route>) -> Self {
        let mut table: HashMap<&'static str, HashMap<Method, Route>> = HashMap::new();
        for route in routes {
            table
                .entry(route.path)
                .or_default()
                .insert(route.method.clone(), route);
        }
        Self { routes: table }
    }

    /// The front door's fixed routes
    pub fn standard() -> Self {
        Self::new([
            Route::greeting(Method::GET, "/"),
            Route::greeting(Method::HEAD, "/"),
            Route::forward(Method::POST, "/recommends", "recommendation.{namespace}"),
            Route::forward(Method::POST, "/prodcat", "productcatalog.{namespace}"),
            Route::forward(Method::POST, "/shipment", "shipping.{namespace}"),
        ])
    }

    /// Exact match on method and path
    pub fn lookup(&self, method: &Method, path: &str) -> Option<&Route> {
        self.routes.get(path).and_then(|by_method| by_method.get(method))
    }

    pub fn len(&self) -> usize {
        self.routes.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// All routes, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.values().flat_map(HashMap::values)
    }
}
