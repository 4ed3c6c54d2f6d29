use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use color_eyre::eyre::{OptionExt, bail, ensure};
use fed9u_io::{Opcode, Target};

/// `fe0`..`fe7`, `all-fe`, `delay<unit>.<chip>`, `be` or `vme`.
#[derive(Debug, Clone, Copy)]
pub struct TargetArg(pub Target);

impl FromStr for TargetArg {
    type Err = color_eyre::eyre::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let target = match s {
            "all-fe" => Target::AllFe,
            "be" => Target::Be,
            "vme" => Target::Vme,
            _ => {
                if let Some(unit) = s.strip_prefix("fe") {
                    Target::fe(unit.parse()?)?
                } else if let Some(rest) = s.strip_prefix("delay") {
                    let (unit, chip) = rest.split_once('.').ok_or_eyre("no '.'")?;
                    Target::delay(unit.parse()?, chip.parse()?)?
                } else {
                    bail!("unknown target {s:?}");
                }
            }
        };
        Ok(Self(target))
    }
}

impl Display for TargetArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OpcodeArg(pub &'static Opcode);

impl FromStr for OpcodeArg {
    type Err = color_eyre::eyre::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        fed9u_board::opcodes::by_name(s)
            .map(Self)
            .ok_or_eyre("unknown opcode, see `list`")
    }
}

/// A 32-bit word in hex, with optional `0x` prefix and `_` separators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Word(pub u32);

impl FromStr for Word {
    type Err = color_eyre::eyre::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let digits: String = s.trim_start_matches("0x").replace('_', "");
        ensure!(digits.len() <= 8, "{s:?} is longer than 32 bits");
        let padded = format!("{digits:0>8}");
        let bytes: [u8; 4] = hex::decode(padded)?
            .try_into()
            .map_err(|_| color_eyre::eyre::eyre!("{s:?} is not a word"))?;
        Ok(Self(u32::from_be_bytes(bytes)))
    }
}

/// Decimal, or hex with a `0x` prefix.
pub fn parse_value(s: &str) -> color_eyre::Result<u32> {
    Ok(match s.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16)?,
        None => s.parse()?,
    })
}
