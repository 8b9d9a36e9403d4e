use crate::{EventClass, EventType, EventTypeDef};
use regex::Regex;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

/// Registry of event types, addressable by id and by name.
///
/// Ids are handed out sequentially from 1 in definition order.
#[derive(Debug, Default, Clone)]
pub struct EventTypeTable {
    types: Vec<Arc<EventType>>,
    by_name: HashMap<String, Arc<EventType>>,
}

impl EventTypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines a type, or returns the existing one of the same name.
    ///
    /// A differing descriptor for an existing name is ignored with a warning.
    pub fn define_type(&mut self, def: EventTypeDef) -> Arc<EventType> {
        if let Some(existing) = self.by_name.get(&def.name) {
            if !existing.matches(&def) {
                log::warn!(
                    "Ignoring redefinition of `{}`: keeping `{}`, got `{}`",
                    def.name,
                    existing.signature(),
                    def.signature()
                );
            }
            return existing.clone();
        }
        let id = self.types.len() as u32 + 1;
        let event_type = Arc::new(EventType::new(id, def));
        self.types.push(event_type.clone());
        self.by_name
            .insert(event_type.name().to_owned(), event_type.clone());
        event_type
    }

    pub fn get_by_id(&self, id: u32) -> Option<&Arc<EventType>> {
        if id == 0 {
            return None;
        }
        self.types.get(id as usize - 1)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Arc<EventType>> {
        self.by_name.get(name)
    }

    pub fn get_all(&self) -> &[Arc<EventType>] {
        &self.types
    }

    /// All types whose name matches `regex`, optionally restricted to one class.
    pub fn get_all_matching(
        &self,
        regex: &Regex,
        class: Option<EventClass>,
    ) -> Vec<Arc<EventType>> {
        self.types
            .iter()
            .filter(|t| class.map(|c| t.class() == c).unwrap_or(true))
            .filter(|t| regex.is_match(t.name()))
            .cloned()
            .collect()
    }

    /// Ids of all types whose name matches `regex`.
    pub fn get_set_matching(&self, regex: &Regex) -> HashSet<u32> {
        self.types
            .iter()
            .filter(|t| regex.is_match(t.name()))
            .map(|t| t.id())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::EventFlags;

    #[test]
    fn test_define_type() {
        let mut table = EventTypeTable::new();
        let foo = table.define_type(
            EventTypeDef::instance("foo(uint32 x)", EventFlags::empty()).unwrap(),
        );
        assert_eq!(foo.id(), 1);
        let bar = table.define_type(EventTypeDef::scope("bar()", EventFlags::empty()).unwrap());
        assert_eq!(bar.id(), 2);

        let again = table.define_type(
            EventTypeDef::instance("foo(ascii y, ascii z)", EventFlags::INTERNAL).unwrap(),
        );
        assert!(Arc::ptr_eq(&foo, &again));
        assert_eq!(again.args().len(), 1);
        assert_eq!(table.len(), 2);

        assert!(Arc::ptr_eq(table.get_by_id(1).unwrap(), &foo));
        assert!(Arc::ptr_eq(table.get_by_name("bar").unwrap(), &bar));
        assert!(table.get_by_id(0).is_none());
        assert!(table.get_by_id(3).is_none());
        assert!(table.get_by_name("baz").is_none());
    }

    #[test]
    fn test_matching() {
        let mut table = EventTypeTable::new();
        for sig in ["app#a", "app#b", "lib#c"] {
            table.define_type(EventTypeDef::instance(sig, EventFlags::empty()).unwrap());
        }
        table.define_type(EventTypeDef::scope("app#scope", EventFlags::empty()).unwrap());
        let regex = Regex::new("^app#").unwrap();
        assert_eq!(table.get_all_matching(&regex, None).len(), 3);
        assert_eq!(
            table
                .get_all_matching(&regex, Some(EventClass::Scope))
                .iter()
                .map(|t| t.name())
                .collect::<Vec<_>>(),
            vec!["app#scope"]
        );
        assert_eq!(table.get_set_matching(&regex), HashSet::from([1, 2, 4]));
    }
}
