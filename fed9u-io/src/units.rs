#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bits<T>(pub T);

#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Words32<T>(pub T);

impl Bits<u32> {
    /// Number of 32-bit words needed to hold this many bits.
    pub const fn words(self) -> Words32<usize> {
        Words32(self.0.div_ceil(32) as usize)
    }

    /// Bits used in the final word, `0` when the final word is full.
    pub const fn tail(self) -> u32 {
        self.0 % 32
    }
}

impl Words32<usize> {
    pub const fn bits(self) -> Bits<u32> {
        Bits(self.0 as u32 * 32)
    }
}

impl std::ops::Add<u32> for Bits<u32> {
    type Output = Self;
    fn add(self, rhs: u32) -> Self {
        Self(self.0 + rhs)
    }
}

impl<T: std::fmt::Display> std::fmt::Display for Bits<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} bits", self.0)
    }
}
