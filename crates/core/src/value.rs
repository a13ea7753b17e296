//! The tagged `Value` enum every stage of the pipeline trades in.
//!
//! Values are shared by reference count rather than cloned deeply: the
//! pipeline is single-threaded and synchronous end to end (there is never a
//! second thread that could race a clone or a drop), so plain `Rc` gives the
//! same aliasing semantics the source language expects without paying for
//! atomics.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A growable, JavaScript-array-shaped value: a dense element vector plus a
/// side map for non-integer keys (`a.foo`, `a["bar"]`).
#[derive(Debug, Default)]
pub struct ArrayData {
    pub elements: Vec<Value>,
    pub properties: HashMap<String, Value>,
}

impl ArrayData {
    pub fn from_elements(elements: Vec<Value>) -> Self {
        ArrayData { elements, properties: HashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Out-of-range integer reads yield `undefined`, never an error.
    pub fn get_index(&self, index: usize) -> Value {
        self.elements.get(index).cloned().unwrap_or(Value::Undefined)
    }

    /// Out-of-range integer writes auto-grow the array to `(index + 1) * 2`
    /// slots, matching the reference's `ArrayObject::operator[]` growth rule.
    pub fn set_index(&mut self, index: usize, value: Value) {
        if index >= self.elements.len() {
            self.elements.resize((index + 1) * 2, Value::Undefined);
        }
        self.elements[index] = value;
    }

    pub fn get_property(&self, key: &str) -> Value {
        self.properties.get(key).cloned().unwrap_or(Value::Undefined)
    }

    pub fn set_property(&mut self, key: String, value: Value) {
        self.properties.insert(key, value);
    }
}

/// The runtime value of every expression in the language.
#[derive(Debug, Clone)]
pub enum Value {
    Boolean(bool),
    Number(f64),
    String(Rc<str>),
    Array(Rc<RefCell<ArrayData>>),
    Null,
    Undefined,
}

impl Value {
    pub fn string(s: impl Into<Rc<str>>) -> Value {
        Value::String(s.into())
    }

    pub fn array(elements: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(ArrayData::from_elements(elements))))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Null => "null",
            Value::Undefined => "undefined",
        }
    }

    /// `false`, `0`, `""`, `null`, and `undefined` are falsy; everything else
    /// (including empty arrays) is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(_) => true,
            Value::Null | Value::Undefined => false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Cross-type equality never coerces: mismatched types are simply not
    /// equal. Arrays compare by reference identity, matching the source
    /// language's object-identity semantics for `==`.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Null, Value::Null) => true,
            (Value::Undefined, Value::Undefined) => true,
            _ => false,
        }
    }

    /// A one-element array index delegates to its sole element, so
    /// `a[[1]] === a[1]`.
    fn unwrap_singleton_index(&self) -> Value {
        if let Value::Array(arr) = self {
            let borrowed = arr.borrow();
            if borrowed.len() == 1 {
                return borrowed.get_index(0).unwrap_singleton_index();
            }
        }
        self.clone()
    }

    /// Indexed read used by `LDPROP`. Non-array receivers read as
    /// `undefined`; numeric-looking keys index the element vector, anything
    /// else looks up the property map.
    pub fn index_get(&self, key: &Value) -> Value {
        let Value::Array(arr) = self else {
            return Value::Undefined;
        };
        let key = key.unwrap_singleton_index();
        let arr = arr.borrow();
        match &key {
            Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => arr.get_index(*n as usize),
            Value::String(s) => match s.parse::<f64>() {
                Ok(n) if n >= 0.0 && n.fract() == 0.0 => arr.get_index(n as usize),
                _ => arr.get_property(s),
            },
            _ => arr.get_property(&key.display_string()),
        }
    }

    /// Indexed write used by `SETPROP`. Numeric keys (or numeric strings)
    /// auto-grow the backing vector; any other key lands in the property
    /// map.
    pub fn index_set(&self, key: &Value, value: Value) {
        let Value::Array(arr) = self else {
            return;
        };
        let key = key.unwrap_singleton_index();
        let mut arr = arr.borrow_mut();
        match &key {
            Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => {
                arr.set_index(*n as usize, value);
            }
            Value::String(s) => match s.parse::<f64>() {
                Ok(n) if n >= 0.0 && n.fract() == 0.0 => arr.set_index(n as usize, value),
                _ => arr.set_property(s.to_string(), value),
            },
            _ => arr.set_property(key.display_string(), value),
        }
    }

    /// The textual form used by `PRINT`, string concatenation, and
    /// non-numeric-string property keys. Integral numbers render with no
    /// decimal point; others strip trailing zeros.
    pub fn display_string(&self) -> String {
        match self {
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.to_string(),
            Value::Array(arr) => {
                let arr = arr.borrow();
                let mut parts: Vec<String> =
                    arr.elements.iter().map(Value::display_string).collect();
                for (k, v) in &arr.properties {
                    parts.push(format!("'{k}': {}", v.display_string()));
                }
                format!("[{}]", parts.join(", "))
            }
            Value::Null => "null".to_string(),
            Value::Undefined => "undefined".to_string(),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() {
        format!("{}", n as i64)
    } else {
        let mut s = format!("{n}");
        if s.contains('.') {
            while s.ends_with('0') {
                s.pop();
            }
            if s.ends_with('.') {
                s.pop();
            }
        }
        s
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_string())
    }
}
