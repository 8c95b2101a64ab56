//! Generation-checked handles and the slot arena behind every object table
//!
//! A handle is `(index, generation)`. Removing an object bumps the slot's
//! generation, so a stale handle resolves to [`OsError::NotFound`] instead
//! of aliasing whatever reuses the slot.

use core::fmt;

use crate::error::{OsError, OsResult};

/// Raw object handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Handle {
    index: u16,
    generation: u16,
}

impl Handle {
    pub const fn new(index: u16, generation: u16) -> Self {
        Handle { index, generation }
    }

    #[inline]
    pub const fn index(self) -> u16 {
        self.index
    }

    #[inline]
    pub const fn generation(self) -> u16 {
        self.generation
    }

    /// Pack into a single word, e.g. to pass as a task or timer argument
    #[inline]
    pub const fn into_raw(self) -> u32 {
        ((self.generation as u32) << 16) | self.index as u32
    }

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Handle {
            index: raw as u16,
            generation: (raw >> 16) as u16,
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.index, self.generation)
    }
}

/// Declare a typed handle wrapping [`Handle`]
macro_rules! os_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub struct $name(pub(crate) $crate::handle::Handle);

        impl $name {
            #[inline]
            pub const fn into_raw(self) -> u32 {
                self.0.into_raw()
            }

            #[inline]
            pub const fn from_raw(raw: u32) -> Self {
                $name($crate::handle::Handle::from_raw(raw))
            }

            #[inline]
            pub const fn handle(self) -> $crate::handle::Handle {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

pub(crate) use os_handle;

struct Slot<T> {
    generation: u16,
    value: Option<T>,
}

impl<T> Slot<T> {
    const VACANT: Self = Slot {
        generation: 0,
        value: None,
    };
}

/// Fixed-capacity object table
pub struct Arena<T, const N: usize> {
    slots: [Slot<T>; N],
    len: usize,
}

impl<T, const N: usize> Arena<T, N> {
    pub const fn new() -> Self {
        Arena {
            slots: [Slot::VACANT; N],
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Store a value in the first free slot
    pub fn insert(&mut self, value: T) -> OsResult<Handle> {
        let (index, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.value.is_none())
            .ok_or(OsError::ResourceExhausted)?;

        slot.value = Some(value);
        self.len += 1;
        Ok(Handle::new(index as u16, slot.generation))
    }

    pub fn get(&self, handle: Handle) -> OsResult<&T> {
        match self.slots.get(handle.index as usize) {
            Some(Slot { generation, value: Some(value) }) if *generation == handle.generation => {
                Ok(value)
            }
            _ => Err(OsError::NotFound),
        }
    }

    pub fn get_mut(&mut self, handle: Handle) -> OsResult<&mut T> {
        match self.slots.get_mut(handle.index as usize) {
            Some(Slot { generation, value: Some(value) }) if *generation == handle.generation => {
                Ok(value)
            }
            _ => Err(OsError::NotFound),
        }
    }

    /// Live object at `index`, regardless of generation
    pub fn get_index(&self, index: u16) -> Option<&T> {
        self.slots.get(index as usize)?.value.as_ref()
    }

    /// Live object at `index`, regardless of generation
    pub fn get_index_mut(&mut self, index: u16) -> Option<&mut T> {
        self.slots.get_mut(index as usize)?.value.as_mut()
    }

    /// Current handle of the object at `index`
    pub fn handle_at(&self, index: u16) -> Option<Handle> {
        let slot = self.slots.get(index as usize)?;
        slot.value.as_ref()?;
        Some(Handle::new(index, slot.generation))
    }

    /// Remove the object and invalidate every handle to it
    pub fn remove(&mut self, handle: Handle) -> OsResult<T> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.value.is_some() && slot.generation == handle.generation)
            .ok_or(OsError::NotFound)?;

        slot.generation = slot.generation.wrapping_add(1);
        self.len -= 1;
        slot.value.take().ok_or(OsError::NotFound)
    }

    /// Handle of the first object matching `pred`
    pub fn find<F>(&self, mut pred: F) -> Option<Handle>
    where
        F: FnMut(&T) -> bool,
    {
        self.iter().find(|(_, value)| pred(value)).map(|(handle, _)| handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (Handle::new(index as u16, slot.generation), value))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.value
                .as_mut()
                .map(|value| (Handle::new(index as u16, generation), value))
        })
    }
}

impl<T, const N: usize> Default for Arena<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
