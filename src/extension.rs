//! Optional tables that are not part of the base specification
use crate::ext::plus::Plus;
use crate::filters::Filter;
use gtfs_structures::{Entity, EntityKind, EntityStream, Reader};
use lazy_static::lazy_static;
use std::collections::HashMap;

/// A set of additional record kinds, with the filters validating them
pub trait Extension {
    fn name(&self) -> &str;

    /// Kinds contributed by the extension, copied in this order after the base kinds
    fn kinds(&self) -> Vec<EntityKind>;

    /// Filters installed in the copier when the extension is enabled
    fn filters(&self) -> Vec<Box<dyn Filter>> {
        vec![]
    }

    /// Reads the records of one of the contributed kinds
    fn entities(&self, reader: &dyn Reader, kind: EntityKind) -> EntityStream<Entity>;
}

type Constructor = fn() -> Box<dyn Extension>;

fn plus() -> Box<dyn Extension> {
    Box::new(Plus)
}

lazy_static! {
    static ref REGISTRY: HashMap<&'static str, Constructor> = {
        let mut registry = HashMap::new();
        registry.insert("plus", plus as Constructor);
        registry
    };
}

/// A fresh instance of a registered extension
pub fn get_extension(name: &str) -> Option<Box<dyn Extension>> {
    REGISTRY.get(name).map(|constructor| constructor())
}

pub fn extension_names() -> Vec<&'static str> {
    let mut names: Vec<_> = REGISTRY.keys().copied().collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry() {
        assert_eq!(vec!["plus"], extension_names());
        let plus = get_extension("plus").unwrap();
        assert_eq!("plus", plus.name());
        assert_eq!(
            vec![EntityKind::Extension("realtime_stops.txt")],
            plus.kinds()
        );
        assert!(get_extension("minus").is_none());
    }
}
