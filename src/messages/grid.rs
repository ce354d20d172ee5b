use serde::de::{self, DeserializeOwned, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// Rows of cells, in on-screen order.
///
/// Config authors may write either a flat list (every item is its own row)
/// or a list of lists (explicit rows); both decode into the same shape:
/// ```yaml
/// answers:
///   - Yes
///   - No
/// buttons:
///   - [{ text: Prev, code: prev }, { text: Next, code: next }]
///   - { text: Docs, link: "https://example.com" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid<T>(Vec<Vec<T>>);

impl<T> Grid<T> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn rows(&self) -> &[Vec<T>] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Vec<T>> {
        self.0.iter()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T> Default for Grid<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<Vec<Vec<T>>> for Grid<T> {
    fn from(rows: Vec<Vec<T>>) -> Self {
        Self(rows)
    }
}

impl<'a, T> IntoIterator for &'a Grid<T> {
    type Item = &'a Vec<T>;
    type IntoIter = std::slice::Iter<'a, Vec<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Decode a raw YAML node into a grid.
///
/// Null or any non-sequence node yields an empty grid. A nested sequence
/// becomes one row; any other item becomes a row of its own. A cell that
/// does not decode as `T` fails the whole grid.
pub fn decode_grid<T: DeserializeOwned>(value: &Value) -> Result<Grid<T>, serde_yaml::Error> {
    let items = match value {
        Value::Sequence(items) => items,
        _ => return Ok(Grid::new()),
    };

    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        let row = match item {
            Value::Sequence(cells) => cells
                .iter()
                .map(|cell| serde_yaml::from_value(cell.clone()))
                .collect::<Result<Vec<T>, _>>()?,
            other => vec![serde_yaml::from_value(other.clone())?],
        };
        rows.push(row);
    }

    Ok(Grid(rows))
}

/// Encode a grid in its explicit list-of-rows form.
pub fn encode_grid<T, S>(grid: &Grid<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    grid.0.serialize(serializer)
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Grid<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        decode_grid(&value).map_err(de::Error::custom)
    }
}

impl<T: Serialize> Serialize for Grid<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        encode_grid(self, serializer)
    }
}
