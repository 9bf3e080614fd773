use std::ops::AddAssign;

/// A stereo audio sample.
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub(crate) struct Frame {
    /// The sample for the left channel.
    pub(crate) left: f32,
    /// The sample for the right channel.
    pub(crate) right: f32,
}

impl Frame {
    /// A [`Frame`] with both the left and right samples set to `0.0`.
    pub(crate) const ZERO: Frame = Frame { left: 0.0, right: 0.0 };

    /// Creates a frame with the given left and right values.
    #[must_use]
    pub(crate) fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Creates a frame with both the left and right channels set to the same
    /// value.
    #[must_use]
    pub(crate) fn from_mono(value: f32) -> Self {
        Self::new(value, value)
    }
}

impl AddAssign for Frame {
    fn add_assign(&mut self, rhs: Self) {
        self.left += rhs.left;
        self.right += rhs.right;
    }
}
