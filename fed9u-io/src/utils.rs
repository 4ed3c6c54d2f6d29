use std::fmt::Display;

pub struct Hex<T>(pub T);
impl Display for Hex<u32> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

const MAX_DISPLAY: usize = 8;

/// Words printed back to back, truncated after a few words.
pub struct ShortHex<'a>(pub &'a [u32]);
impl Display for ShortHex<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for e in self.0.iter().take(MAX_DISPLAY) {
            write!(f, "{:08X}", e)?;
        }
        if self.0.len() > MAX_DISPLAY {
            write!(f, "...")?;
        }
        Ok(())
    }
}

pub struct SpaceHex<'a>(pub &'a [u32]);
impl Display for SpaceHex<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for (idx, e) in self.0.iter().take(MAX_DISPLAY).enumerate() {
            if idx != 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:08X}", e)?;
        }
        if self.0.len() > MAX_DISPLAY {
            write!(f, " ...")?;
        }
        Ok(())
    }
}
