//! Dynamic node registry
//!
//! Hands out identifiers for nodes that only become known at runtime:
//! dynamic tests from a factory and parameterized invocations. Indices are
//! per parent, start at 1 and are never reused.

use std::collections::HashMap;
use tracing::debug;

use crate::error::{AggregateError, AggregateResult};
use crate::models::Identifier;

/// Allocation state of one dynamic producer
#[derive(Clone, Debug)]
struct Producer {
    next_index: u32,
    allocated: u32,
    /// Must be closed before its container may finish
    opened: bool,
    exhausted: bool,
}

impl Producer {
    fn new() -> Self {
        Self {
            next_index: 1,
            allocated: 0,
            opened: false,
            exhausted: false,
        }
    }
}

/// Tracks dynamic producers keyed by their parent identifier
#[derive(Clone, Debug, Default)]
pub struct DynamicRegistry {
    producers: HashMap<Identifier, Producer>,
}

impl DynamicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a producer for `parent`; it stays open until closed
    pub fn open(&mut self, parent: &Identifier) {
        self.producers
            .entry(parent.clone())
            .or_insert_with(Producer::new)
            .opened = true;
    }

    /// Allocate the next identifier under `parent`
    pub fn allocate(&mut self, parent: &Identifier) -> AggregateResult<Identifier> {
        self.allocate_at(parent, None)
    }

    /// Allocate under `parent`, honouring a producer-proposed index
    ///
    /// A proposal below the next free index would reuse an identifier and is
    /// rejected; a proposal above it skips the gap. Index 0 and `u32::MAX`
    /// are never handed out.
    pub fn allocate_at(
        &mut self,
        parent: &Identifier,
        proposed: Option<u32>,
    ) -> AggregateResult<Identifier> {
        let producer = self
            .producers
            .entry(parent.clone())
            .or_insert_with(Producer::new);

        if producer.exhausted {
            return Err(AggregateError::out_of_order(
                parent,
                "open dynamic producer",
                "exhausted producer",
            ));
        }

        let index = match proposed {
            Some(0) => {
                return Err(AggregateError::invalid_id(format!(
                    "dynamic index under '{parent}' must start at 1"
                )));
            }
            Some(index) if index < producer.next_index => {
                return Err(AggregateError::DuplicateNode {
                    id: parent.dynamic_child(index)?,
                });
            }
            Some(index) => index,
            None => producer.next_index,
        };

        let next_index = index.checked_add(1).ok_or_else(|| {
            AggregateError::invalid_id(format!(
                "dynamic index {index} under '{parent}' is too large"
            ))
        })?;
        let id = parent.dynamic_child(index)?;
        producer.next_index = next_index;
        producer.allocated += 1;

        debug!("Allocated dynamic node {}", id);
        Ok(id)
    }

    /// Signal that `parent` will produce no more dynamic children
    pub fn close(&mut self, parent: &Identifier) -> AggregateResult<()> {
        let producer = self
            .producers
            .entry(parent.clone())
            .or_insert_with(Producer::new);

        if producer.exhausted {
            return Err(AggregateError::out_of_order(
                parent,
                "open dynamic producer",
                "already exhausted",
            ));
        }
        producer.exhausted = true;
        Ok(())
    }

    /// Close the producer of `parent` if it has an open one
    pub fn close_if_open(&mut self, parent: &Identifier) {
        if let Some(producer) = self.producers.get_mut(parent) {
            producer.exhausted = true;
        }
    }

    /// Whether `parent` has an opened producer that may still emit children
    ///
    /// Allocation alone only advances the index counter; it does not open a
    /// producer.
    pub fn is_open(&self, parent: &Identifier) -> bool {
        self.producers
            .get(parent)
            .map(|p| p.opened && !p.exhausted)
            .unwrap_or(false)
    }

    pub fn is_exhausted(&self, parent: &Identifier) -> bool {
        self.producers
            .get(parent)
            .map(|p| p.exhausted)
            .unwrap_or(false)
    }

    /// Number of identifiers handed out under `parent`
    pub fn allocated(&self, parent: &Identifier) -> u32 {
        self.producers.get(parent).map(|p| p.allocated).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> Identifier {
        Identifier::parse("Container:NestedAndDynamicTest/Container:dynamic").unwrap()
    }

    #[test]
    fn test_indices_start_at_one() {
        let mut registry = DynamicRegistry::new();
        let parent = factory();

        let first = registry.allocate(&parent).unwrap();
        let second = registry.allocate(&parent).unwrap();
        assert_eq!(first, parent.dynamic_child(1).unwrap());
        assert_eq!(second, parent.dynamic_child(2).unwrap());
        assert_eq!(registry.allocated(&parent), 2);
        assert!(!registry.is_open(&parent));
    }

    #[test]
    fn test_indices_are_per_parent() {
        let mut registry = DynamicRegistry::new();
        let a = Identifier::parse("Container:a").unwrap();
        let b = Identifier::parse("Container:b").unwrap();

        registry.allocate(&a).unwrap();
        registry.allocate(&a).unwrap();
        assert_eq!(registry.allocate(&b).unwrap().dynamic_index(), Some(1));
    }

    #[test]
    fn test_proposed_index_is_never_reused() {
        let mut registry = DynamicRegistry::new();
        let parent = factory();

        registry.allocate_at(&parent, Some(1)).unwrap();
        let reuse = registry.allocate_at(&parent, Some(1));
        assert!(matches!(reuse, Err(AggregateError::DuplicateNode { .. })));

        let jumped = registry.allocate_at(&parent, Some(5)).unwrap();
        assert_eq!(jumped.dynamic_index(), Some(5));
        assert_eq!(registry.allocate(&parent).unwrap().dynamic_index(), Some(6));
    }

    #[test]
    fn test_index_zero_is_invalid() {
        let mut registry = DynamicRegistry::new();
        let parent = factory();

        let zero = registry.allocate_at(&parent, Some(0));
        assert!(matches!(zero, Err(AggregateError::InvalidIdentifier(_))));
        assert_eq!(registry.allocated(&parent), 0);
        assert_eq!(registry.allocate(&parent).unwrap().dynamic_index(), Some(1));
    }

    #[test]
    fn test_index_space_exhaustion_is_an_error() {
        let mut registry = DynamicRegistry::new();
        let parent = factory();

        let last = registry.allocate_at(&parent, Some(u32::MAX));
        assert!(matches!(last, Err(AggregateError::InvalidIdentifier(_))));

        let highest = registry.allocate_at(&parent, Some(u32::MAX - 1)).unwrap();
        assert_eq!(highest.dynamic_index(), Some(u32::MAX - 1));
        assert!(matches!(
            registry.allocate(&parent),
            Err(AggregateError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            registry.allocate_at(&parent, Some(1)),
            Err(AggregateError::DuplicateNode { .. })
        ));
    }

    #[test]
    fn test_close_stops_allocation() {
        let mut registry = DynamicRegistry::new();
        let parent = factory();

        registry.open(&parent);
        assert!(registry.is_open(&parent));

        registry.close(&parent).unwrap();
        assert!(!registry.is_open(&parent));
        assert!(registry.is_exhausted(&parent));
        assert!(registry.allocate(&parent).is_err());
        assert!(registry.close(&parent).is_err());
    }

    #[test]
    fn test_close_without_allocation_records_empty_producer() {
        let mut registry = DynamicRegistry::new();
        let parent = factory();

        registry.close(&parent).unwrap();
        assert!(registry.is_exhausted(&parent));
        assert_eq!(registry.allocated(&parent), 0);
    }
}
