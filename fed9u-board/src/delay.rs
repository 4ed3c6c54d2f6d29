//! Clock skew of the front-end fibres. Each front-end unit has three delay
//! chips, each driving four fibres.

use fed9u_io::{Backend, Controller, DelayChip, FeUnit, Result, Target};
use tracing::debug;

use crate::{array, fe::FIBRES, field, opcodes::delay};

pub const CHANNELS: usize = 4;

/// Delay of one fibre: `coarse` 25 ns clock cycles plus `fine` 1 ns steps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Skew {
    pub coarse: u8,
    pub fine: u8,
}

impl Skew {
    pub const CYCLE_NS: u32 = 25;

    pub fn nanoseconds(self) -> u32 {
        u32::from(self.coarse) * Self::CYCLE_NS + u32::from(self.fine)
    }
}

pub fn set_skews<B: Backend>(
    cont: &mut Controller<B>,
    unit: FeUnit,
    chip: DelayChip,
    skews: &[Skew; CHANNELS],
) -> Result<()> {
    let target = Target::Delay { unit, chip };
    cont.write(&delay::COARSE_SKEW, target, &skews.map(|s| u32::from(s.coarse)))?;
    cont.write(&delay::FINE_SKEW, target, &skews.map(|s| u32::from(s.fine)))
}

pub fn skews<B: Backend>(
    cont: &mut Controller<B>,
    unit: FeUnit,
    chip: DelayChip,
) -> Result<[Skew; CHANNELS]> {
    let target = Target::Delay { unit, chip };
    let coarse: [u32; CHANNELS] = array(cont.read(&delay::COARSE_SKEW, target)?);
    let fine: [u32; CHANNELS] = array(cont.read(&delay::FINE_SKEW, target)?);
    Ok(std::array::from_fn(|i| Skew {
        coarse: coarse[i] as u8,
        fine: fine[i] as u8,
    }))
}

/// Change the skew of a single fibre, keeping the other three fibres on
/// the same chip as they are.
pub fn set_fibre_skew<B: Backend>(
    cont: &mut Controller<B>,
    unit: FeUnit,
    fibre: u8,
    skew: Skew,
) -> Result<()> {
    let fibre = field("fibre", fibre, FIBRES as u32 - 1)? as usize;
    let chip = DelayChip::new((fibre / CHANNELS) as u8)?;
    let mut current = skews(cont, unit, chip)?;
    current[fibre % CHANNELS] = skew;
    debug!(unit = unit.index(), fibre, ns = skew.nanoseconds(), "fibre skew");
    set_skews(cont, unit, chip, &current)
}
