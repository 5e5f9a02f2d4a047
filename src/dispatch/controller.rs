//! Controller contract and action parameter binding.
//!
//! # Responsibilities
//! - Describe the parameters an action expects ([`ActionSignature`])
//! - Bind matched route variables to those parameters by name, coercing
//!   declared scalar kinds
//! - Provide [`Actions`], a table-backed controller built from closures
//!
//! # Design Decisions
//! - A value that does not coerce, or a required parameter with no value,
//!   is a client error (400), never a server error

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use futures_util::future::BoxFuture;

use crate::dispatch::error::DispatchError;
use crate::dispatch::middleware::HandlerResult;
use crate::routing::Variables;

/// Scalar type an action parameter is coerced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Str,
    Int,
    Float,
    Bool,
}

/// A bound, coerced action argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Str(v) => f.write_str(v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParamSpec {
    name: String,
    kind: ParamKind,
    required: bool,
}

/// Ordered parameter list of one action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSignature {
    params: Vec<ParamSpec>,
}

impl ActionSignature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: impl Into<String>, kind: ParamKind) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            kind,
            required: true,
        });
        self
    }

    pub fn optional(mut self, name: impl Into<String>, kind: ParamKind) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            kind,
            required: false,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Arguments handed to an action.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionArgs {
    values: BTreeMap<String, ParamValue>,
}

impl ActionArgs {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ParamValue::Str(v)) => Some(v),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ParamValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        match self.values.get(name) {
            Some(ParamValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ParamValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

fn coerce(name: &str, raw: &str, kind: ParamKind) -> Result<ParamValue, DispatchError> {
    let bad = |reason: String| DispatchError::BadParameter {
        name: name.to_string(),
        reason,
    };
    match kind {
        ParamKind::Str => Ok(ParamValue::Str(raw.to_string())),
        ParamKind::Int => raw
            .parse::<i64>()
            .map(ParamValue::Int)
            .map_err(|_| bad(format!("`{}` is not an integer", raw))),
        ParamKind::Float => match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(ParamValue::Float(v)),
            _ => Err(bad(format!("`{}` is not a number", raw))),
        },
        ParamKind::Bool => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(ParamValue::Bool(true)),
            "0" | "false" | "no" | "off" => Ok(ParamValue::Bool(false)),
            _ => Err(bad(format!("`{}` is not a boolean", raw))),
        },
    }
}

/// Bind `variables` to the parameters of `signature`.
pub fn bind(signature: &ActionSignature, variables: &Variables) -> Result<ActionArgs, DispatchError> {
    let mut values = BTreeMap::new();
    for spec in &signature.params {
        match variables.get(&spec.name) {
            Some(raw) => {
                values.insert(spec.name.clone(), coerce(&spec.name, raw, spec.kind)?);
            }
            None if spec.required => {
                return Err(DispatchError::BadParameter {
                    name: spec.name.clone(),
                    reason: "no value bound".to_string(),
                });
            }
            None => {}
        }
    }
    Ok(ActionArgs { values })
}

pub trait Controller: Send + Sync {
    /// Parameters of `action`, or `None` if the controller has no such action.
    fn signature(&self, action: &str) -> Option<ActionSignature>;

    fn call<'a>(&'a self, action: &'a str, request: Request<Body>, args: ActionArgs) -> BoxFuture<'a, HandlerResult>;
}

type ActionFn = Arc<dyn Fn(Request<Body>, ActionArgs) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// A controller assembled from named async closures.
#[derive(Clone, Default)]
pub struct Actions {
    table: HashMap<String, (ActionSignature, ActionFn)>,
}

impl Actions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action<F, Fut>(mut self, name: impl Into<String>, signature: ActionSignature, f: F) -> Self
    where
        F: Fn(Request<Body>, ActionArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let f: ActionFn = Arc::new(
            move |req: Request<Body>, args: ActionArgs| -> BoxFuture<'static, HandlerResult> {
                Box::pin(f(req, args))
            },
        );
        self.table.insert(name.into(), (signature, f));
        self
    }
}

impl fmt::Debug for Actions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.table.keys().collect();
        names.sort();
        f.debug_struct("Actions").field("actions", &names).finish()
    }
}

impl Controller for Actions {
    fn signature(&self, action: &str) -> Option<ActionSignature> {
        self.table.get(action).map(|(signature, _)| signature.clone())
    }

    fn call<'a>(&'a self, action: &'a str, request: Request<Body>, args: ActionArgs) -> BoxFuture<'a, HandlerResult> {
        match self.table.get(action) {
            Some((_, f)) => f(request, args),
            None => {
                let err = DispatchError::UnknownAction {
                    controller: "actions".to_string(),
                    action: action.to_string(),
                };
                Box::pin(async move { Err(err) })
            }
        }
    }
}
