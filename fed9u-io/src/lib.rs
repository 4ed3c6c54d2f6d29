mod backend;
pub mod bits;
pub mod codec;
mod controller;
mod error;
pub mod fake_backend;
pub mod units;
mod utils;

pub use crate::{
    backend::{Backend, Register},
    codec::{Access, DelayChip, FeUnit, Opcode, SerialCommand, Target, Unit},
    controller::Controller,
    error::{ArgumentError, Error, Result, TargetError},
    utils::{Hex, ShortHex, SpaceHex},
};
