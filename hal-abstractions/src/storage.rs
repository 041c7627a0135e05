//! Retained storage that survives a low-power reset

/// Byte-addressed store backed by retained RAM or non-volatile memory
///
/// Accesses outside `0..capacity()` are errors, never partial transfers.
pub trait DurableStore {
    type Error: core::fmt::Debug;

    /// Size of the store in bytes
    fn capacity(&self) -> usize;

    /// Fill `buf` from `offset`
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Write `data` at `offset`
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), Self::Error>;
}

impl<T: DurableStore> DurableStore for &mut T {
    type Error = T::Error;

    fn capacity(&self) -> usize {
        (**self).capacity()
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), Self::Error> {
        (**self).read(offset, buf)
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), Self::Error> {
        (**self).write(offset, data)
    }
}
