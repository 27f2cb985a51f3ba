//! Fixed-length sliding windows backing the rolling threading, treadling and
//! drawdown histories.

use serde::Serialize;
use std::collections::VecDeque;
use std::collections::vec_deque;

use crate::WyrdError;

/// Double-ended window whose length never changes after construction.
///
/// Every insertion at one end evicts exactly one element from the other end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlidingWindow<T> {
    items: VecDeque<T>,
}

impl<T: Clone> SlidingWindow<T> {
    /// Create a window of `len` copies of `fill`.
    pub fn new(len: usize, fill: T) -> Result<Self, WyrdError> {
        if len == 0 {
            return Err(WyrdError::InvalidDimension {
                name: "window length",
                value: len,
            });
        }
        let mut items = VecDeque::with_capacity(len);
        items.resize(len, fill);
        Ok(Self { items })
    }
}

impl<T> SlidingWindow<T> {
    /// Build a window from existing values; the vector length becomes the window length.
    pub fn from_vec(values: Vec<T>) -> Result<Self, WyrdError> {
        if values.is_empty() {
            return Err(WyrdError::InvalidDimension {
                name: "window length",
                value: 0,
            });
        }
        Ok(Self {
            items: VecDeque::from(values),
        })
    }

    /// Fixed number of elements held by the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Windows are never empty; provided for API symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Newest element at the front.
    #[must_use]
    pub fn front(&self) -> &T {
        &self.items[0]
    }

    /// Element at the back.
    #[must_use]
    pub fn back(&self) -> &T {
        &self.items[self.items.len() - 1]
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn iter(&self) -> vec_deque::Iter<'_, T> {
        self.items.iter()
    }

    /// Insert at the front and return the element evicted from the back.
    pub fn push_front(&mut self, value: T) -> T {
        self.items.push_front(value);
        self.items
            .pop_back()
            .unwrap_or_else(|| unreachable!("window holds at least one element"))
    }

    /// Insert at the back and return the element evicted from the front.
    pub fn push_back(&mut self, value: T) -> T {
        self.items.push_back(value);
        self.items
            .pop_front()
            .unwrap_or_else(|| unreachable!("window holds at least one element"))
    }

    /// Overwrite the element at `index` in place.
    pub fn set(&mut self, index: usize, value: T) -> Result<(), WyrdError> {
        let len = self.items.len();
        match self.items.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(WyrdError::IndexOutOfRange {
                kind: "window index",
                index,
                len,
            }),
        }
    }

    /// Rewrite every slot from its position.
    pub fn fill_with(&mut self, mut f: impl FnMut(usize) -> T) {
        for (idx, slot) in self.items.iter_mut().enumerate() {
            *slot = f(idx);
        }
    }
}

impl<T: Clone> SlidingWindow<T> {
    /// Copy the contents front to back.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

impl<T> std::ops::Index<usize> for SlidingWindow<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        &self.items[index]
    }
}

impl<'a, T> IntoIterator for &'a SlidingWindow<T> {
    type Item = &'a T;
    type IntoIter = vec_deque::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
