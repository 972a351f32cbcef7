/// Round-robin cursor over a fixed slice.
///
/// Every lookup advances the index past each slot it inspects, so two
/// successive callers never start from the same slot.
#[derive(Debug)]
pub(crate) struct Rotation<T> {
    items: Vec<T>,
    next: usize,
}

impl<T> Rotation<T> {
    pub(crate) fn new(items: Vec<T>) -> Self {
        Self { items, next: 0 }
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn items(&self) -> &[T] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut [T] {
        &mut self.items
    }

    /// Index of the next slot accepted by `accept`.
    ///
    /// Inspects at most `len` slots; an empty rotation returns `None`
    /// without inspecting anything.
    pub(crate) fn next_where<F>(&mut self, mut accept: F) -> Option<usize>
    where
        F: FnMut(&T) -> bool,
    {
        let len = self.items.len();
        for _ in 0..len {
            let idx = self.next % len;
            self.next = (idx + 1) % len;
            if accept(&self.items[idx]) {
                return Some(idx);
            }
        }
        None
    }
}
