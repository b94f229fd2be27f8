/// Turns raw pixel data inside a blob into something renderable.
///
/// `data` starts at the descriptor's payload offset and runs to the end of the blob; the binder
/// decides how much of it belongs to the bitmap. Handles are owned by the pack that bound them
/// and come back through [`BitmapBinder::release`] exactly once.
pub trait BitmapBinder {
    type Handle;

    /// Bind a bitmap, or return `None` if the data cannot be turned into one.
    fn bind(&mut self, data: &[u8], width: u16, height: u16) -> Option<Self::Handle>;

    fn release(&mut self, handle: Self::Handle);
}

impl<T: BitmapBinder + ?Sized> BitmapBinder for &mut T {
    type Handle = T::Handle;

    fn bind(&mut self, data: &[u8], width: u16, height: u16) -> Option<Self::Handle> {
        (**self).bind(data, width, height)
    }

    fn release(&mut self, handle: Self::Handle) {
        (**self).release(handle)
    }
}
