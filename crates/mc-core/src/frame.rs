/// Image décodée, RGB row-major, 3 bytes par pixel.
///
/// # Example
/// ```
/// use mc_core::frame::Frame;
/// let frame = Frame::new(10, 10);
/// assert_eq!(frame.data.len(), 300);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Pixels RGB, row-major, 3 bytes par pixel.
    pub data: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Frame {
    /// Crée une frame noire aux dimensions données.
    ///
    /// # Example
    /// ```
    /// use mc_core::frame::Frame;
    /// let frame = Frame::new(100, 50);
    /// assert_eq!(frame.width, 100);
    /// assert_eq!(frame.height, 50);
    /// assert_eq!(frame.data.len(), 100 * 50 * 3);
    /// ```
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0u8; (width * height * 3) as usize],
            width,
            height,
        }
    }

    /// Accès au pixel (x, y) → (r, g, b).
    ///
    /// # Example
    /// ```
    /// use mc_core::frame::Frame;
    /// let mut frame = Frame::new(2, 1);
    /// frame.data[3] = 255;
    /// assert_eq!(frame.pixel(1, 0), (255, 0, 0));
    /// ```
    #[inline]
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> (u8, u8, u8) {
        debug_assert!(x < self.width && y < self.height, "pixel out of bounds");
        let idx = ((y * self.width + x) * 3) as usize;
        if idx + 2 >= self.data.len() {
            return (0, 0, 0);
        }
        (self.data[idx], self.data[idx + 1], self.data[idx + 2])
    }
}
