use serde_json::{Map, Value};

use crate::error::{ValidationError, ValidationErrorKind};

/// A borrowed JSON value together with the field path that reached it.
#[derive(Debug, Clone)]
pub(crate) struct Node<'a> {
    value: &'a Value,
    path: String,
}

pub(crate) type Result<T> = std::result::Result<T, ValidationError>;

impl<'a> Node<'a> {
    pub fn root(value: &'a Value) -> Self {
        Self {
            value,
            path: String::new(),
        }
    }

    pub fn value(&self) -> &'a Value {
        self.value
    }

    pub fn path(&self) -> &str {
        if self.path.is_empty() {
            "$"
        } else {
            &self.path
        }
    }

    pub fn error(&self, kind: ValidationErrorKind) -> ValidationError {
        ValidationError::new(self.path(), kind)
    }

    fn wrong_type(&self, expected: &'static str) -> ValidationError {
        self.error(ValidationErrorKind::WrongType {
            expected,
            found: type_name(self.value).to_string(),
        })
    }

    fn child(&self, key: &str, value: &'a Value) -> Node<'a> {
        let path = if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        };
        Node { value, path }
    }

    pub fn index(&self, index: usize, value: &'a Value) -> Node<'a> {
        Node {
            value,
            path: format!("{}[{}]", self.path(), index),
        }
    }

    fn keyed(&self, key: &str, value: &'a Value) -> Node<'a> {
        Node {
            value,
            path: format!("{}[{:?}]", self.path(), key),
        }
    }

    /// First present, non-null field among `keys`. Later keys are aliases.
    pub fn get(&self, keys: &[&str]) -> Option<Node<'a>> {
        let object = self.value.as_object()?;
        keys.iter().find_map(|key| match object.get(*key) {
            Some(Value::Null) | None => None,
            Some(value) => Some(self.child(key, value)),
        })
    }

    pub fn require(&self, keys: &[&str]) -> Result<Node<'a>> {
        self.get(keys).ok_or_else(|| {
            let missing = self.child(keys.first().copied().unwrap_or("?"), self.value);
            missing.error(ValidationErrorKind::MissingField)
        })
    }

    pub fn object(&self) -> Result<&'a Map<String, Value>> {
        self.value.as_object().ok_or_else(|| self.wrong_type("object"))
    }

    /// Entries of an object in document order, each with its own path.
    pub fn entries(&self) -> Result<Vec<(&'a str, Node<'a>)>> {
        Ok(self
            .object()?
            .iter()
            .map(|(k, v)| (k.as_str(), self.keyed(k, v)))
            .collect())
    }

    pub fn array(&self) -> Result<Vec<Node<'a>>> {
        let items = self.value.as_array().ok_or_else(|| self.wrong_type("array"))?;
        Ok(items
            .iter()
            .enumerate()
            .map(|(i, v)| self.index(i, v))
            .collect())
    }

    pub fn is_array(&self) -> bool {
        self.value.is_array()
    }

    pub fn is_empty_object(&self) -> bool {
        self.value.as_object().is_some_and(Map::is_empty)
    }

    pub fn str(&self) -> Result<&'a str> {
        self.value.as_str().ok_or_else(|| self.wrong_type("string"))
    }

    /// Strings verbatim; numbers and booleans in their JSON spelling.
    pub fn text(&self) -> Result<String> {
        match self.value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            _ => Err(self.wrong_type("string")),
        }
    }

    /// A finite number, or a string holding one.
    pub fn number(&self) -> Result<f64> {
        let value = match self.value {
            Value::Number(n) => n.as_f64().ok_or_else(|| self.wrong_type("number"))?,
            Value::String(s) => s.trim().parse::<f64>().map_err(|_| {
                self.error(ValidationErrorKind::WrongType {
                    expected: "number",
                    found: format!("string {s:?}"),
                })
            })?,
            _ => return Err(self.wrong_type("number")),
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(self.error(ValidationErrorKind::NotFinite))
        }
    }

    /// A numeric array, or a whitespace-separated numeric string.
    pub fn numbers(&self) -> Result<Vec<f64>> {
        if let Value::String(text) = self.value {
            return text
                .split_whitespace()
                .enumerate()
                .map(|(i, token)| {
                    token.parse::<f64>().ok().filter(|v| v.is_finite()).ok_or_else(|| {
                        ValidationError::new(
                            format!("{}[{}]", self.path(), i),
                            ValidationErrorKind::WrongType {
                                expected: "number",
                                found: format!("{token:?}"),
                            },
                        )
                    })
                })
                .collect();
        }
        self.array()?.iter().map(Node::number).collect()
    }

    pub fn opt_text(&self, keys: &[&str]) -> Result<Option<String>> {
        self.get(keys).map(|n| n.text()).transpose()
    }

    pub fn opt_number(&self, keys: &[&str]) -> Result<Option<f64>> {
        self.get(keys).map(|n| n.number()).transpose()
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
