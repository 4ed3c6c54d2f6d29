use fed9u_io::{ArgumentError, Backend, Controller, Result};

pub mod be;
pub mod delay;
pub mod fe;
pub mod i2c;
pub mod info;
pub mod opcodes;
pub mod vme;

pub trait Read: Sized {
    fn read(cont: &mut Controller<impl Backend>) -> Result<Self>;
}

pub fn read<R: Read>(cont: &mut Controller<impl Backend>) -> Result<R> {
    R::read(cont)
}

/// Check a packed field before it is merged into a larger value.
pub(crate) fn field(
    name: &'static str,
    value: impl Into<u32>,
    max: u32,
) -> Result<u32, ArgumentError> {
    let value = value.into();
    if value > max {
        return Err(ArgumentError::Field { name, value, max });
    }
    Ok(value)
}

/// The element count of every read is fixed by its opcode.
pub(crate) fn array<const N: usize>(values: Vec<u32>) -> [u32; N] {
    values
        .try_into()
        .expect("controller returns exactly the opcode's element count")
}
