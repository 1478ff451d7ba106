//! Target computations.
//!
//! A node wraps either a plain function or a stateful target class. Both are
//! reduced to the [`Invocable`] capability: take the positional and named
//! slot values of an [`Invocation`] and return a value or a failure.
//!
//! The number of positional (reactive) parameters and the named (passive)
//! parameters with their defaults are declared up front with a [`Signature`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Outcome of a single target invocation.
pub type InvokeResult = anyhow::Result<Value>;

/// Positional and named arguments for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub args: Vec<Value>,
    pub kwargs: BTreeMap<String, Value>,
}

impl Invocation {
    pub fn new(args: Vec<Value>) -> Self {
        Self {
            args,
            kwargs: BTreeMap::new(),
        }
    }

    pub fn with_kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.kwargs.insert(key.into(), value);
        self
    }

    /// Positional argument `index`, or `Null` when out of range.
    pub fn arg(&self, index: usize) -> &Value {
        self.args.get(index).unwrap_or(&Value::Null)
    }

    /// Named argument `key`, or `Null` when absent.
    pub fn kwarg(&self, key: &str) -> &Value {
        self.kwargs.get(key).unwrap_or(&Value::Null)
    }
}

/// Single-method capability implemented by every computation a node can run.
pub trait Invocable: Send {
    fn invoke(&mut self, call: &Invocation) -> InvokeResult;
}

impl<F> Invocable for F
where
    F: FnMut(&Invocation) -> InvokeResult + Send,
{
    fn invoke(&mut self, call: &Invocation) -> InvokeResult {
        self(call)
    }
}

type SharedFn = Arc<dyn Fn(&Invocation) -> InvokeResult + Send + Sync>;
type ClassFactory = Arc<dyn Fn() -> Box<dyn Invocable> + Send + Sync>;

/// How a node obtains its computation.
#[derive(Clone)]
pub enum Target {
    /// A stateless function shared by every executor, including process-like
    /// ones; anything it captures is shared too.
    Function(SharedFn),
    /// A stateful class: each executor gets its own instance from the factory.
    Class(ClassFactory),
}

impl Target {
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&Invocation) -> InvokeResult + Send + Sync + 'static,
    {
        Target::Function(Arc::new(f))
    }

    pub fn class<T, F>(factory: F) -> Self
    where
        T: Invocable + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Target::Class(Arc::new(move || Box::new(factory()) as Box<dyn Invocable>))
    }

    /// Produce a callable for one executor.
    pub fn instantiate(&self) -> Box<dyn Invocable> {
        match self {
            Target::Function(f) => {
                let f = f.clone();
                Box::new(move |call: &Invocation| f(call))
            }
            Target::Class(factory) => factory(),
        }
    }
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Function(_) => write!(f, "Target::Function"),
            Target::Class(_) => write!(f, "Target::Class"),
        }
    }
}

/// A named parameter with its default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub default: Value,
}

/// Declared shape of a target: required positional count plus optional named
/// parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub required: usize,
    pub optional: Vec<Parameter>,
}

impl Signature {
    pub fn new(required: usize) -> Self {
        Self {
            required,
            optional: Vec::new(),
        }
    }

    pub fn with_optional(mut self, name: impl Into<String>, default: Value) -> Self {
        self.optional.push(Parameter {
            name: name.into(),
            default,
        });
        self
    }

    pub fn num_kwargs(&self) -> usize {
        self.optional.len()
    }
}
