//! Serial command words for the FED9U FPGA command interface.
//!
//! Every command starts with a header in the top of the first word:
//!
//! ```text
//! [31:28] FPGA address   FE unit n -> n + 1, all FE -> 0xF, BE -> 0xA, VME -> 0xB
//! [27]    read flag
//! [26:22] designator
//! [21:20] delay chip     0 = none, chip c -> c + 1
//! [19: 0] payload
//! ```
//!
//! The payload follows the header and may run over any number of further
//! words. Right-aligned payloads end on the last bit of the last word, with
//! zeros between the header and the payload. Left-aligned payloads start
//! directly after the header, with zeros after the payload.

use crate::{
    ArgumentError, Result, TargetError,
    bits::{self, mask},
    units::{Bits, Words32},
};

pub const HEADER_BITS: u32 = 12;

const ADDRESS_SHIFT: u32 = 28;
const READ_SHIFT: u32 = 27;
const DESIGNATOR_SHIFT: u32 = 22;
const CHIP_SHIFT: u32 = 20;

const ADDRESS_ALL_FE: u32 = 0xf;
const ADDRESS_BE: u32 = 0xa;
const ADDRESS_VME: u32 = 0xb;

/// Longest payload the VME FPGA serial buffer accepts.
pub const MAX_PAYLOAD: Bits<u32> = Bits(4096);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FeUnit(u8);

impl FeUnit {
    pub const COUNT: u8 = 8;

    pub const fn new(unit: u8) -> Result<Self, TargetError> {
        if unit < Self::COUNT {
            Ok(Self(unit))
        } else {
            Err(TargetError::FeUnit(unit))
        }
    }

    pub const fn index(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (0..Self::COUNT).map(Self)
    }
}

/// One of the three delay chips on a front-end unit, each driving the
/// clock skew of four fibres.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DelayChip(u8);

impl DelayChip {
    pub const COUNT: u8 = 3;

    pub const fn new(chip: u8) -> Result<Self, TargetError> {
        if chip < Self::COUNT {
            Ok(Self(chip))
        } else {
            Err(TargetError::DelayChip(chip))
        }
    }

    pub const fn index(self) -> u8 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    Fe(FeUnit),
    /// Every front-end unit at once. Write only.
    AllFe,
    Delay {
        unit: FeUnit,
        chip: DelayChip,
    },
    Be,
    Vme,
}

/// The class of FPGA a command is addressed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Unit {
    Fe,
    Delay,
    Be,
    Vme,
}

impl Target {
    pub fn fe(unit: u8) -> Result<Self, TargetError> {
        FeUnit::new(unit).map(Self::Fe)
    }

    pub fn delay(unit: u8, chip: u8) -> Result<Self, TargetError> {
        Ok(Self::Delay {
            unit: FeUnit::new(unit)?,
            chip: DelayChip::new(chip)?,
        })
    }

    pub const fn unit(self) -> Unit {
        match self {
            Target::Fe(_) | Target::AllFe => Unit::Fe,
            Target::Delay { .. } => Unit::Delay,
            Target::Be => Unit::Be,
            Target::Vme => Unit::Vme,
        }
    }

    const fn address(self) -> u32 {
        match self {
            Target::Fe(unit) | Target::Delay { unit, .. } => unit.0 as u32 + 1,
            Target::AllFe => ADDRESS_ALL_FE,
            Target::Be => ADDRESS_BE,
            Target::Vme => ADDRESS_VME,
        }
    }

    const fn chip_field(self) -> u32 {
        match self {
            Target::Delay { chip, .. } => chip.0 as u32 + 1,
            _ => 0,
        }
    }

    fn from_fields(address: u32, chip: u32) -> Result<Self, TargetError> {
        let fe = |address: u32| FeUnit::new(address as u8 - 1);
        match (address, chip) {
            (1..=8, 0) => Ok(Target::Fe(fe(address)?)),
            (1..=8, c) => Ok(Target::Delay {
                unit: fe(address)?,
                chip: DelayChip::new(c as u8 - 1)?,
            }),
            (ADDRESS_ALL_FE, 0) => Ok(Target::AllFe),
            (ADDRESS_BE, 0) => Ok(Target::Be),
            (ADDRESS_VME, 0) => Ok(Target::Vme),
            (address, _) => Err(TargetError::Address(address)),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Fe(unit) => write!(f, "fe{}", unit.0),
            Target::AllFe => f.write_str("all-fe"),
            Target::Delay { unit, chip } => write!(f, "delay{}.{}", unit.0, chip.0),
            Target::Be => f.write_str("be"),
            Target::Vme => f.write_str("vme"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    ReadWrite,
    ReadOnly,
    WriteOnly,
}

/// Static description of one FPGA command.
///
/// The payload is `bits` long and made of `count` equally sized elements,
/// none of which may exceed `max`. Descriptors are checked when they are
/// built, so a malformed table fails to compile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Opcode {
    pub name: &'static str,
    pub unit: Unit,
    pub designator: u8,
    pub bits: Bits<u32>,
    pub count: u32,
    pub max: u32,
    pub access: Access,
}

impl Opcode {
    pub const fn new(
        name: &'static str,
        unit: Unit,
        designator: u8,
        bits: u32,
        count: u32,
        max: u32,
        access: Access,
    ) -> Self {
        assert!(designator < 32, "designator is a 5 bit field");
        assert!(count > 0 && bits % count == 0, "uneven element width");
        let element = bits / count;
        assert!(element >= 1 && element <= 32, "element wider than a word");
        assert!(max <= mask(element), "maximum does not fit the element");
        assert!(bits <= MAX_PAYLOAD.0, "payload too long");
        Self {
            name,
            unit,
            designator,
            bits: Bits(bits),
            count,
            max,
            access,
        }
    }

    pub const fn element(&self) -> Bits<u32> {
        Bits(self.bits.0 / self.count)
    }

    /// Single-element commands carry their value right-justified, wider
    /// payloads are packed straight after the header.
    pub const fn right_align(&self) -> bool {
        self.count == 1
    }

    fn check_target(&self, target: Target) -> Result<(), TargetError> {
        if target.unit() != self.unit {
            return Err(TargetError::WrongUnit {
                op: self.name,
                expected: self.unit,
                got: target.unit(),
            });
        }
        Ok(())
    }

    pub fn validate(&self, args: &[u32]) -> Result<(), ArgumentError> {
        if args.len() != self.count as usize {
            return Err(ArgumentError::Count {
                op: self.name,
                expected: self.count,
                got: args.len(),
            });
        }
        if let Some((index, &value)) = args.iter().enumerate().find(|(_, v)| **v > self.max) {
            return Err(ArgumentError::Range {
                op: self.name,
                index,
                value,
                max: self.max,
            });
        }
        Ok(())
    }

    pub fn write(&self, target: Target, args: &[u32]) -> Result<SerialCommand> {
        if self.access == Access::ReadOnly {
            return Err(ArgumentError::NotWritable(self.name).into());
        }
        self.check_target(target)?;
        self.validate(args)?;
        build(
            target,
            false,
            self.designator,
            self.bits,
            args,
            self.right_align(),
        )
    }

    pub fn read(&self, target: Target) -> Result<SerialCommand> {
        if self.access == Access::WriteOnly {
            return Err(ArgumentError::NotReadable(self.name).into());
        }
        self.check_target(target)?;
        build(
            target,
            true,
            self.designator,
            self.bits,
            &[],
            self.right_align(),
        )
    }
}

/// Words ready for the transport, plus how many bits of them to clock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerialCommand {
    pub words: Vec<u32>,
    pub len: Bits<u32>,
    pub right_align: bool,
}

impl SerialCommand {
    pub fn header(&self) -> u32 {
        self.words[0]
    }

    pub fn is_read(&self) -> bool {
        self.header() >> READ_SHIFT & 1 == 1
    }

    /// Payload length, without header or the extra clocked read bit.
    pub fn payload_len(&self) -> Bits<u32> {
        let extra = HEADER_BITS + u32::from(self.is_read());
        Bits(self.len.0.saturating_sub(extra))
    }
}

fn header(target: Target, read: bool, designator: u8) -> u32 {
    target.address() << ADDRESS_SHIFT
        | u32::from(read) << READ_SHIFT
        | u32::from(designator) << DESIGNATOR_SHIFT
        | target.chip_field() << CHIP_SHIFT
}

/// Build the words for one command.
///
/// Reads carry only the header; the transport clocks `len + 1` payload bits
/// back, the hardware needing one more clock than the data it returns.
/// Writes pack `args` edge to edge, each `len / args.len()` bits wide.
pub fn build(
    target: Target,
    read: bool,
    designator: u8,
    len: Bits<u32>,
    args: &[u32],
    right_align: bool,
) -> Result<SerialCommand> {
    if designator >= 32 {
        return Err(TargetError::Designator(designator).into());
    }
    if read && target == Target::AllFe {
        return Err(TargetError::BroadcastRead.into());
    }
    if len > MAX_PAYLOAD {
        return Err(ArgumentError::TooLong(len).into());
    }

    let head = header(target, read, designator);
    if read {
        return Ok(SerialCommand {
            words: vec![head],
            len: Bits(HEADER_BITS + len.0 + 1),
            right_align,
        });
    }

    let total = Bits(HEADER_BITS + len.0);
    let mut words = vec![0; total.words().0];
    words[0] = head;
    if len.0 > 0 {
        let payload = bits::merge(args, len)?;
        let start = if right_align {
            total.words().bits().0 - len.0
        } else {
            HEADER_BITS
        };
        bits::place(&mut words, start as usize, &payload, len);
    }
    Ok(SerialCommand {
        words,
        len: total,
        right_align,
    })
}

/// The fields of a command recovered from its words.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decoded {
    pub target: Target,
    pub read: bool,
    pub designator: u8,
    pub len: Bits<u32>,
    /// Left-aligned payload stream; empty for reads.
    pub payload: Vec<u32>,
}

/// Inverse of [`build`].
pub fn decode(words: &[u32], len: Bits<u32>, right_align: bool) -> Result<Decoded> {
    let Some(&head) = words.first() else {
        return Err(ArgumentError::ShortStream {
            have: Words32(0),
            need: Bits(HEADER_BITS),
        }
        .into());
    };
    let target = Target::from_fields(head >> ADDRESS_SHIFT, head >> CHIP_SHIFT & 0x3)?;
    let read = head >> READ_SHIFT & 1 == 1;
    let designator = (head >> DESIGNATOR_SHIFT & 0x1f) as u8;

    let Some(payload_len) = len.0.checked_sub(HEADER_BITS + u32::from(read)) else {
        return Err(ArgumentError::ShortStream {
            have: Words32(words.len()),
            need: Bits(HEADER_BITS),
        }
        .into());
    };
    if Bits(payload_len) > MAX_PAYLOAD {
        return Err(ArgumentError::TooLong(Bits(payload_len)).into());
    }
    if read {
        return Ok(Decoded {
            target,
            read,
            designator,
            len: Bits(payload_len),
            payload: Vec::new(),
        });
    }

    if words.len() < len.words().0 {
        return Err(ArgumentError::ShortStream {
            have: Words32(words.len()),
            need: len,
        }
        .into());
    }
    let start = if right_align {
        len.words().bits().0 - payload_len
    } else {
        HEADER_BITS
    };
    let payload = bits::extract(words, start as usize, Bits(payload_len));
    Ok(Decoded {
        target,
        read,
        designator,
        len: Bits(payload_len),
        payload,
    })
}
