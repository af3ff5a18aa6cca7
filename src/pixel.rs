/// Named channel layout of a pixel.
///
/// Channel order within a pixel is fixed per variant, see [`TupleType::channel_order`].
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TupleType {
    /// `[Y]`
    Gray,
    /// `[Y, A]`
    GrayAlpha,
    /// `[R, G, B]`
    Rgb,
    /// `[R, G, B, A]`
    Rgba,
    /// `[C, M, Y, K]`
    Cmyk,
    /// `[C, M, Y, K, A]`
    Cmyka,
    /// `[I]`, an index into the frame's colormap.
    Indexed,
    /// `[I, A]`
    IndexedAlpha,
}

/// One channel of a pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    Gray,
    Red,
    Green,
    Blue,
    Cyan,
    Magenta,
    Yellow,
    Black,
    Index,
    Alpha,
}

/// How color channels relate to alpha in the stored samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AlphaMode {
    /// Straight alpha.
    #[default]
    Unassociated,
    /// Premultiplied alpha.
    Associated,
}

impl TupleType {
    /// Number of channels per pixel.
    pub const fn channels(self) -> usize {
        self.channel_order().len()
    }

    /// Channel order within a pixel.
    pub const fn channel_order(self) -> &'static [Channel] {
        use Channel::*;
        match self {
            Self::Gray => &[Gray],
            Self::GrayAlpha => &[Gray, Alpha],
            Self::Rgb => &[Red, Green, Blue],
            Self::Rgba => &[Red, Green, Blue, Alpha],
            Self::Cmyk => &[Cyan, Magenta, Yellow, Black],
            Self::Cmyka => &[Cyan, Magenta, Yellow, Black, Alpha],
            Self::Indexed => &[Index],
            Self::IndexedAlpha => &[Index, Alpha],
        }
    }

    /// Channels that carry color (everything but alpha).
    pub const fn color_channels(self) -> usize {
        if self.has_alpha() {
            self.channels() - 1
        } else {
            self.channels()
        }
    }

    pub const fn has_alpha(self) -> bool {
        matches!(
            self,
            Self::GrayAlpha | Self::Rgba | Self::Cmyka | Self::IndexedAlpha
        )
    }

    /// Index of the alpha channel within a pixel.
    pub const fn alpha_index(self) -> Option<usize> {
        if self.has_alpha() {
            Some(self.channels() - 1)
        } else {
            None
        }
    }

    pub const fn is_gray(self) -> bool {
        matches!(self, Self::Gray | Self::GrayAlpha)
    }

    pub const fn is_cmyk(self) -> bool {
        matches!(self, Self::Cmyk | Self::Cmyka)
    }

    pub const fn is_indexed(self) -> bool {
        matches!(self, Self::Indexed | Self::IndexedAlpha)
    }

    /// The same color model with or without an alpha channel.
    pub const fn with_alpha(self, alpha: bool) -> Self {
        match (self, alpha) {
            (Self::Gray | Self::GrayAlpha, true) => Self::GrayAlpha,
            (Self::Gray | Self::GrayAlpha, false) => Self::Gray,
            (Self::Rgb | Self::Rgba, true) => Self::Rgba,
            (Self::Rgb | Self::Rgba, false) => Self::Rgb,
            (Self::Cmyk | Self::Cmyka, true) => Self::Cmyka,
            (Self::Cmyk | Self::Cmyka, false) => Self::Cmyk,
            (Self::Indexed | Self::IndexedAlpha, true) => Self::IndexedAlpha,
            (Self::Indexed | Self::IndexedAlpha, false) => Self::Indexed,
        }
    }

    /// Default layout for a bare channel count (PAM without TUPLTYPE).
    pub const fn from_channel_count(channels: usize) -> Option<Self> {
        match channels {
            1 => Some(Self::Gray),
            2 => Some(Self::GrayAlpha),
            3 => Some(Self::Rgb),
            4 => Some(Self::Rgba),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_counts() {
        assert_eq!(TupleType::Gray.channels(), 1);
        assert_eq!(TupleType::Cmyka.channels(), 5);
        assert_eq!(TupleType::IndexedAlpha.channels(), 2);
        assert_eq!(TupleType::Rgba.color_channels(), 3);
        assert_eq!(TupleType::Cmyka.alpha_index(), Some(4));
        assert_eq!(TupleType::Rgb.alpha_index(), None);
    }

    #[test]
    fn alpha_toggling() {
        assert_eq!(TupleType::Rgb.with_alpha(true), TupleType::Rgba);
        assert_eq!(TupleType::Cmyka.with_alpha(false), TupleType::Cmyk);
        assert_eq!(TupleType::Indexed.with_alpha(true), TupleType::IndexedAlpha);
    }
}
