use std::collections::HashMap;

/// Bulk strings shared by an event buffer, addressed by ordinal.
///
/// Serialized as the concatenation of every value followed by a `\0`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StringTable {
    values: Vec<String>,
    index: HashMap<String, u32>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a string, returning its ordinal. Strings already present are reused.
    pub fn add_string(&mut self, value: &str) -> u32 {
        if let Some(ordinal) = self.index.get(value) {
            return *ordinal;
        }
        let ordinal = self.values.len() as u32;
        self.values.push(value.to_owned());
        self.index.insert(value.to_owned(), ordinal);
        ordinal
    }

    pub fn get(&self, ordinal: u32) -> Option<&str> {
        self.values.get(ordinal as usize).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|s| s.as_str())
    }

    pub fn serialize(&self) -> String {
        let mut string = String::with_capacity(self.values.iter().map(|v| v.len() + 1).sum());
        for value in self.values.iter() {
            string.push_str(value);
            string.push('\0');
        }
        string
    }

    pub fn deserialize(data: &str) -> Self {
        let mut table = Self::new();
        let mut values: Vec<&str> = data.split('\0').collect();
        // the terminator of the last value leaves an empty tail
        if values.last() == Some(&"") {
            values.pop();
        }
        for value in values {
            let ordinal = table.values.len() as u32;
            table.values.push(value.to_owned());
            table.index.entry(value.to_owned()).or_insert(ordinal);
        }
        table
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_string_table() {
        let mut table = StringTable::new();
        assert_eq!(table.add_string("a"), 0);
        assert_eq!(table.add_string("bc"), 1);
        assert_eq!(table.add_string("a"), 0);
        assert_eq!(table.add_string(""), 2);
        assert_eq!(table.serialize(), "a\0bc\0\0");

        let copy = StringTable::deserialize(&table.serialize());
        assert_eq!(copy.len(), 3);
        assert_eq!(copy.get(1), Some("bc"));
        assert_eq!(copy.get(2), Some(""));
        assert_eq!(copy.get(3), None);

        assert!(StringTable::deserialize("").is_empty());
    }
}
