//! Path element and path types.

use crate::value::Value;
use std::fmt;

/// PathElement represents one level of path navigation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathElement {
    /// Field name for map fields.
    FieldName(String),
    /// Index for list elements.
    Index(usize),
}

impl PathElement {
    /// Creates a new field name path element.
    pub fn field_name(name: impl Into<String>) -> Self {
        PathElement::FieldName(name.into())
    }

    /// Creates a new index path element.
    pub fn index(i: usize) -> Self {
        PathElement::Index(i)
    }

    /// Returns the field name if this is a field name element.
    pub fn as_field_name(&self) -> Option<&str> {
        match self {
            PathElement::FieldName(name) => Some(name),
            _ => None,
        }
    }
}

/// Path represents a complete path to a nested field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    elements: Vec<PathElement>,
}

impl Path {
    /// Creates a new empty path.
    pub fn new() -> Self {
        Path {
            elements: Vec::new(),
        }
    }

    /// Creates a path of field names, e.g. `Path::fields(["index", "refresh_interval"])`.
    pub fn fields<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().map(|n| PathElement::field_name(n)).collect()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathElement> {
        self.elements.iter()
    }

    pub fn push(&mut self, element: PathElement) {
        self.elements.push(element);
    }

    pub fn pop(&mut self) -> Option<PathElement> {
        self.elements.pop()
    }

    pub fn last(&self) -> Option<&PathElement> {
        self.elements.last()
    }

    /// Creates a new path with the given element appended.
    pub fn with(&self, element: PathElement) -> Self {
        let mut new_path = self.clone();
        new_path.push(element);
        new_path
    }

    /// Resolves this path inside `root`.
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut current = root;
        for element in &self.elements {
            current = match (element, current) {
                (PathElement::FieldName(name), Value::Map(m)) => m.get(name)?,
                (PathElement::Index(i), Value::List(l)) => l.get(*i)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl FromIterator<PathElement> for Path {
    fn from_iter<T: IntoIterator<Item = PathElement>>(iter: T) -> Self {
        Path {
            elements: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a PathElement;
    type IntoIter = std::slice::Iter<'a, PathElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::FieldName(name) => write!(f, "{}", name),
            PathElement::Index(i) => write!(f, "[{}]", i),
        }
    }
}

impl fmt::Display for Path {
    /// Renders settings-style dotted keys: `index.routing.allocation[0]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 && element.as_field_name().is_some() {
                write!(f, ".")?;
            }
            write!(f, "{}", element)?;
        }
        Ok(())
    }
}
