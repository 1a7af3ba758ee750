use std::ops::Range;

use crate::error::BufferError;

/// An owned buffer with a fixed maximum length.
///
/// This mirrors a fixed-size GPU structured buffer on the CPU side. Appends
/// that would overflow the capacity fail as a whole and leave the buffer
/// untouched, so a caller can try again with less data.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundedBuffer<T> {
    /// The maximum number of elements the buffer accepts.
    capacity: usize,

    items: Vec<T>,
}

impl<T: Clone> BoundedBuffer<T> {
    /// Creates an empty buffer which can hold up to `capacity` elements.
    ///
    /// Storage grows on demand; `capacity` only bounds the length.
    pub fn new(capacity: usize) -> BoundedBuffer<T> {
        BoundedBuffer { capacity, items: Vec::new() }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// How many more elements fit.
    pub fn remaining(&self) -> usize {
        self.capacity() - self.items.len()
    }

    pub fn push(&mut self, item: T) -> Result<usize, BufferError> {
        self.check(1)?;
        self.items.push(item);

        Ok(self.items.len() - 1)
    }

    /// Appends all of `items`, or none of them.
    ///
    /// Returns the index range the items now occupy.
    pub fn extend_from_slice(&mut self, items: &[T])
        -> Result<Range<usize>, BufferError> {
        self.check(items.len())?;

        let lower = self.items.len();
        self.items.extend_from_slice(items);

        Ok(lower..self.items.len())
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Drops everything past the first `len` elements.
    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    fn check(&self, requested: usize) -> Result<(), BufferError> {
        if requested > self.remaining() {
            Err(BufferError { requested, available: self.remaining() })
        } else {
            Ok(())
        }
    }
}

#[test]
fn push_until_full() {
    let mut buffer = BoundedBuffer::new(2);
    assert_eq!(buffer.capacity(), 2);

    assert_eq!(buffer.push(1), Ok(0));
    assert_eq!(buffer.push(2), Ok(1));
    assert_eq!(buffer.push(3), Err(BufferError { requested: 1, available: 0 }));
    assert_eq!(buffer.as_slice(), &[1, 2]);
}

#[test]
fn extend_is_all_or_nothing() {
    let mut buffer = BoundedBuffer::new(4);
    buffer.push(0).unwrap();

    assert_eq!(buffer.extend_from_slice(&[1, 2]), Ok(1..3));
    assert_eq!(
        buffer.extend_from_slice(&[3, 4]),
        Err(BufferError { requested: 2, available: 1 })
    );
    assert_eq!(buffer.len(), 3);
    assert_eq!(buffer.remaining(), 1);
}

#[test]
fn clearing_restores_capacity() {
    let mut buffer = BoundedBuffer::new(1);
    buffer.push('a').unwrap();
    buffer.clear();

    assert!(buffer.is_empty());
    assert_eq!(buffer.remaining(), 1);
    assert_eq!(buffer.get(0), None);
}

#[test]
fn truncate_rolls_back_appends() {
    let mut buffer = BoundedBuffer::new(3);
    buffer.push(1).unwrap();
    buffer.extend_from_slice(&[2, 3]).unwrap();
    buffer.truncate(1);

    assert_eq!(buffer.as_slice(), &[1]);
    assert_eq!(buffer.remaining(), 2);
}
