use std::fmt::Debug;
use std::hash::Hash;

/// `HandleId` is the raw value of a handle. It's the byte offset of the addressed
/// object inside a `HandleArena`, right-shifted by `HANDLE_SHIFT`. Keeping it 32-bits
/// allows a handle to be stored in a single word next to native GL names.
pub type HandleId = u32;

/// The minimum alignment of arena objects is `1 << HANDLE_SHIFT` bytes.
pub const HANDLE_SHIFT: u32 = 4;

/// The raw value of a nil/uninitialized handle.
pub const NIL_HANDLE: HandleId = ::std::u32::MAX;

/// Converts a handle into the byte offset it encodes.
#[inline]
pub fn offset_of(id: HandleId) -> usize {
    (id as usize) << HANDLE_SHIFT
}

/// Converts a byte offset into a handle value.
#[inline]
pub fn from_offset(offset: usize) -> HandleId {
    debug_assert!(offset & ((1 << HANDLE_SHIFT) - 1) == 0);
    (offset >> HANDLE_SHIFT) as HandleId
}

pub trait HandleLike: Debug + Copy + Hash + PartialEq + Eq + Send + Sync {
    fn from_id(id: HandleId) -> Self;
    fn id(&self) -> HandleId;

    #[inline]
    fn is_valid(&self) -> bool {
        self.id() != NIL_HANDLE
    }
}

#[macro_export]
macro_rules! impl_handle {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name($crate::utils::handle::HandleId);

        impl $name {
            /// Constructs a nil/uninitialized handle.
            #[inline]
            pub fn nil() -> Self {
                $name($crate::utils::handle::NIL_HANDLE)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::nil()
            }
        }

        impl From<$name> for $crate::utils::handle::HandleId {
            fn from(handle: $name) -> Self {
                handle.0
            }
        }

        impl $crate::utils::handle::HandleLike for $name {
            #[inline]
            fn from_id(id: $crate::utils::handle::HandleId) -> Self {
                $name(id)
            }

            #[inline]
            fn id(&self) -> $crate::utils::handle::HandleId {
                self.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

#[cfg(test)]
mod test {
    use super::*;

    impl_handle!(TypeSafeHandle);

    #[test]
    fn basic() {
        let h = TypeSafeHandle::from_id(2);
        assert!(h.is_valid());
        assert_eq!(h.id(), 2);
        assert_eq!(offset_of(h.id()), 32);
        assert_eq!(from_offset(32), 2);

        let nil = TypeSafeHandle::default();
        assert!(!nil.is_valid());
        assert_eq!(nil, TypeSafeHandle::nil());
        assert_eq!(format!("{}", h), "TypeSafeHandle(2)");
    }

    #[test]
    fn container() {
        use crate::utils::hash::FastHashSet;

        let h1 = TypeSafeHandle::from_id(1);
        let h2 = TypeSafeHandle::from_id(2);
        let h3 = TypeSafeHandle::from_id(1);

        let mut set = FastHashSet::default();
        assert_eq!(set.insert(h1), true);
        assert_eq!(set.insert(h3), false);
        assert_eq!(set.insert(h2), true);
        assert_eq!(set.len(), 2);
    }
}
