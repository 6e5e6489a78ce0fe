//! Handler registry for dispatching requests by group id and index.
//!
//! Groups are registered during bootstrap through a [`RegistryBuilder`].
//! Ids are assigned sequentially starting from 1 (0 is never valid).
//! [`RegistryBuilder::build`] consumes the builder, so once executors hold
//! the resulting [`HandlerRegistry`] nothing can register anymore.

use std::fmt;

use super::Handler;
use crate::error::{Result, ThreadwireError};
use crate::protocol::HandlerAddress;

/// 1-based id of a registered handler group.
pub type GroupId = u32;

/// Maximum number of groups a registry accepts.
pub const MAX_HANDLER_GROUPS: usize = 256;

/// An ordered, immutable list of handlers.
#[derive(Default)]
pub struct HandlerGroup {
    handlers: Vec<Box<dyn Handler>>,
}

impl HandlerGroup {
    /// Create an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler; its index is the number of handlers before it.
    pub fn handler(mut self, handler: impl Handler) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Number of handlers in the group.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the group has no handlers.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Get the handler at `index`.
    pub fn get(&self, index: usize) -> Option<&dyn Handler> {
        self.handlers.get(index).map(|h| h.as_ref())
    }
}

impl From<Vec<Box<dyn Handler>>> for HandlerGroup {
    fn from(handlers: Vec<Box<dyn Handler>>) -> Self {
        Self { handlers }
    }
}

impl fmt::Debug for HandlerGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerGroup")
            .field("len", &self.handlers.len())
            .finish()
    }
}

/// Collects handler groups during bootstrap.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    groups: Vec<HandlerGroup>,
}

impl RegistryBuilder {
    /// Create a new empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a group and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`ThreadwireError::Registration`] for an empty group or when
    /// [`MAX_HANDLER_GROUPS`] groups are already registered.
    pub fn register_group(&mut self, group: HandlerGroup) -> Result<GroupId> {
        if group.is_empty() {
            return Err(ThreadwireError::Registration(
                "handler group must contain at least one handler".to_string(),
            ));
        }
        if self.groups.len() >= MAX_HANDLER_GROUPS {
            return Err(ThreadwireError::Registration(format!(
                "too many handler groups (max {})",
                MAX_HANDLER_GROUPS
            )));
        }
        self.groups.push(group);
        Ok(self.groups.len() as GroupId)
    }

    /// Number of groups registered so far.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Freeze the registry.
    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            groups: self.groups,
        }
    }
}

/// Immutable table of handler groups, shared by all executors.
#[derive(Debug)]
pub struct HandlerRegistry {
    groups: Vec<HandlerGroup>,
}

impl HandlerRegistry {
    /// Get the handler at `index` in group `group`.
    ///
    /// # Errors
    ///
    /// Protocol error if the group id is not in `[1, group_count]` or the
    /// index is not in `[0, group_len)`.
    pub fn lookup(&self, group: GroupId, index: u32) -> Result<&dyn Handler> {
        let entry = self.group(group).ok_or_else(|| {
            ThreadwireError::Protocol(format!(
                "handler group id {} out of range [1, {}]",
                group,
                self.groups.len()
            ))
        })?;
        entry.get(index as usize).ok_or_else(|| {
            ThreadwireError::Protocol(format!(
                "handler index {} out of range [0, {}) in group {}",
                index,
                entry.len(),
                group
            ))
        })
    }

    /// Resolve a decoded request address.
    #[inline]
    pub fn resolve(&self, address: HandlerAddress) -> Result<&dyn Handler> {
        self.lookup(address.group, address.handler)
    }

    /// Number of registered groups.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of handlers in `group`, if it exists.
    pub fn group_len(&self, group: GroupId) -> Option<usize> {
        self.group(group).map(HandlerGroup::len)
    }

    fn group(&self, group: GroupId) -> Option<&HandlerGroup> {
        let slot = (group as usize).checked_sub(1)?;
        self.groups.get(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;

    fn group_of(n: usize) -> HandlerGroup {
        (0..n).fold(HandlerGroup::new(), |group, i| {
            group.handler(handler_fn(move |_, reply, _| reply.write_uint(i as u64)))
        })
    }

    #[test]
    fn test_register_group() {
        let mut builder = RegistryBuilder::new();
        let id = builder.register_group(group_of(1)).unwrap();
        assert_eq!(id, 1);

        let registry = builder.build();
        assert_eq!(registry.group_count(), 1);
        assert_eq!(registry.group_len(1), Some(1));
        assert!(registry.lookup(1, 0).is_ok());
    }

    #[test]
    fn test_id_assignment_sequential() {
        let mut builder = RegistryBuilder::new();

        assert_eq!(builder.register_group(group_of(1)).unwrap(), 1);
        assert_eq!(builder.register_group(group_of(3)).unwrap(), 2);
        assert_eq!(builder.register_group(group_of(2)).unwrap(), 3);
        assert_eq!(builder.group_count(), 3);
    }

    #[test]
    fn test_lookup_in_range() {
        let mut builder = RegistryBuilder::new();
        let sizes = [1usize, 4, 2];
        for &n in &sizes {
            builder.register_group(group_of(n)).unwrap();
        }
        let registry = builder.build();

        for (slot, &k) in sizes.iter().enumerate() {
            let group = slot as GroupId + 1;
            for i in 0..k as u32 {
                assert!(registry.lookup(group, i).is_ok(), "({}, {})", group, i);
            }
            for i in [k as u32, k as u32 + 1, u32::MAX] {
                let err = registry.lookup(group, i).err().unwrap();
                assert!(err.is_protocol(), "({}, {})", group, i);
            }
        }
    }

    #[test]
    fn test_group_zero_and_unknown_rejected() {
        let mut builder = RegistryBuilder::new();
        builder.register_group(group_of(1)).unwrap();
        let registry = builder.build();

        for group in [0, 2, u32::MAX] {
            let err = registry.lookup(group, 0).err().unwrap();
            assert!(err.is_protocol());
            assert!(err.to_string().contains("out of range"));
        }
        assert_eq!(registry.group_len(0), None);
    }

    #[test]
    fn test_lookup_returns_ordered_handler() {
        use crate::buffer::ByteBuffer;
        use crate::codec::{BufferReader, BufferWriter};

        let mut builder = RegistryBuilder::new();
        builder.register_group(group_of(3)).unwrap();
        let registry = builder.build();

        let empty = ByteBuffer::new(0);
        let mut out = ByteBuffer::new(8);
        registry
            .resolve(HandlerAddress::new(1, 2))
            .unwrap()
            .invoke(
                &mut BufferReader::new(&empty),
                &mut BufferWriter::new(&mut out),
                0,
            )
            .unwrap();
        assert_eq!(out.as_slice(), &[0x02]);
    }

    #[test]
    fn test_empty_group_rejected() {
        let mut builder = RegistryBuilder::new();
        let err = builder.register_group(HandlerGroup::new()).unwrap_err();
        assert!(matches!(err, ThreadwireError::Registration(_)));
    }

    #[test]
    fn test_group_limit() {
        let mut builder = RegistryBuilder::new();
        for _ in 0..MAX_HANDLER_GROUPS {
            builder.register_group(group_of(1)).unwrap();
        }
        let err = builder.register_group(group_of(1)).unwrap_err();
        assert!(matches!(err, ThreadwireError::Registration(_)));
        assert_eq!(builder.build().group_count(), MAX_HANDLER_GROUPS);
    }
}
