//! Forward-only cursor protocol shared by node, edge and retainer iterators

/// A reusable cursor over positions in the snapshot buffer.
///
/// The cursor owns a single flyweight view and repositions it in place;
/// [`Cursor::item`] always returns the view for the current position.
/// `index`/`set_index` expose the raw position so callers (the filtered
/// iterator in particular) can remember positions and jump back to them.
pub trait Cursor {
    type Item;

    /// Rewind to the first position.
    fn first(&mut self);

    /// Whether the current position is inside the sequence.
    fn has_next(&self) -> bool;

    /// Advance by one record.
    fn next(&mut self);

    /// Raw position of the current record.
    fn index(&self) -> u32;

    /// Jump to a raw position previously obtained from [`Cursor::index`].
    fn set_index(&mut self, index: u32);

    /// View over the current record.
    fn item(&self) -> &Self::Item;
}
