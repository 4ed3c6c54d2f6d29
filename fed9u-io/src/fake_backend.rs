//! An in-memory FED, standing in for the VME bus in tests and in the CLI.

use std::{collections::HashMap, fmt::Write as _, time::Duration};

use eyre::{Result, bail};

use crate::{
    Backend, FeUnit, Hex, Register, SerialCommand, ShortHex, Target,
    bits::{self, put_bits},
    codec::{self, HEADER_BITS},
    units::Bits,
};

type Key = (Target, u8);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transaction {
    Write {
        target: Target,
        designator: u8,
        len: Bits<u32>,
        words: Vec<u32>,
    },
    Read {
        target: Target,
        designator: u8,
        len: Bits<u32>,
        right_align: bool,
        words: Vec<u32>,
    },
    RegisterWrite {
        reg: Register,
        value: u32,
        offset: u32,
    },
    RegisterRead {
        reg: Register,
        value: u32,
    },
    Wait(Duration),
}

/// Simulated board. Serial writes are stored per target and designator and
/// read back in either alignment. Raw captures carry a set extra bit, so a
/// reader that forgets to discard it sees garbage.
#[derive(Default)]
pub struct FakeFed {
    written: HashMap<Key, Vec<u32>>,
    responses: HashMap<Key, Vec<u32>>,
    /// Remaining reads that report the given status bits.
    status: HashMap<Key, (usize, u32)>,
    registers: HashMap<(Register, u32), u32>,
    log: Vec<Transaction>,
    fail: bool,
}

impl FakeFed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value returned by reads of `designator` at `target`, in place of
    /// whatever was last written. `value` is a left-aligned stream.
    pub fn respond(&mut self, target: Target, designator: u8, value: Vec<u32>) {
        self.responses.insert((target, designator), value);
    }

    /// Shorthand for [`FakeFed::respond`] with a single value of at most 32
    /// bits.
    pub fn respond_value(&mut self, target: Target, designator: u8, len: Bits<u32>, value: u32) {
        assert!(len.0 <= 32, "{len} does not fit a single value");
        let mut stream = vec![0; len.words().0];
        put_bits(&mut stream, 0, value, len.0);
        self.respond(target, designator, stream);
    }

    /// The next `reads` reads of `designator` report `status` in their first
    /// two payload bits.
    pub fn set_status(&mut self, target: Target, designator: u8, reads: usize, status: u32) {
        self.status.insert((target, designator), (reads, status));
    }

    pub fn set_register(&mut self, reg: Register, value: u32) {
        self.registers.insert((reg, 0), value);
    }

    pub fn register(&self, reg: Register, offset: u32) -> Option<u32> {
        self.registers.get(&(reg, offset)).copied()
    }

    /// Last payload written to `designator` at `target`, left-aligned.
    pub fn written(&self, target: Target, designator: u8) -> Option<&[u32]> {
        self.written.get(&(target, designator)).map(Vec::as_slice)
    }

    /// Make every following bus operation fail.
    pub fn fail_transport(&mut self, fail: bool) {
        self.fail = fail;
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.log
    }

    pub fn waited(&self) -> Duration {
        self.log
            .iter()
            .filter_map(|t| match t {
                Transaction::Wait(d) => Some(*d),
                _ => None,
            })
            .sum()
    }

    /// Render the transaction log as a table, then clear it.
    pub fn consume_log(&mut self) -> String {
        let mut ret = String::from("┌op─────────┬target────┬des┬len──┬words\n");
        for t in self.log.drain(..) {
            let _ = match t {
                Transaction::Write {
                    target,
                    designator,
                    len,
                    words,
                } => writeln!(
                    ret,
                    "│write      │{:<10}│{designator:>3}│{:>5}│{}",
                    target.to_string(),
                    len.0,
                    ShortHex(&words)
                ),
                Transaction::Read {
                    target,
                    designator,
                    len,
                    right_align,
                    words,
                } => writeln!(
                    ret,
                    "│{:<11}│{:<10}│{designator:>3}│{:>5}│{}",
                    if right_align { "read" } else { "read raw" },
                    target.to_string(),
                    len.0,
                    ShortHex(&words)
                ),
                Transaction::RegisterWrite { reg, value, offset } => writeln!(
                    ret,
                    "│reg write  │{:<10}│   │{offset:>5}│{}",
                    reg.to_string(),
                    Hex(value)
                ),
                Transaction::RegisterRead { reg, value } => writeln!(
                    ret,
                    "│reg read   │{:<10}│   │     │{}",
                    reg.to_string(),
                    Hex(value)
                ),
                Transaction::Wait(d) => writeln!(ret, "│wait       │{d:?}"),
            };
        }
        ret.push_str("└───────────┴──────────┴───┴─────┴─────\n");
        ret
    }

    fn check(&self) -> Result<()> {
        if self.fail {
            bail!("simulated bus error");
        }
        Ok(())
    }
}

impl Backend for FakeFed {
    fn write_serial(&mut self, command: &SerialCommand) -> Result<()> {
        self.check()?;
        let decoded = codec::decode(&command.words, command.len, command.right_align)?;
        if decoded.read {
            bail!("read header sent as a write: {}", Hex(command.header()));
        }
        match decoded.target {
            Target::AllFe => {
                for unit in FeUnit::all() {
                    let key = (Target::Fe(unit), decoded.designator);
                    self.written.insert(key, decoded.payload.clone());
                }
            }
            target => {
                let key = (target, decoded.designator);
                self.written.insert(key, decoded.payload.clone());
            }
        }
        self.log.push(Transaction::Write {
            target: decoded.target,
            designator: decoded.designator,
            len: decoded.len,
            words: command.words.clone(),
        });
        Ok(())
    }

    fn read_serial(
        &mut self,
        buf: &mut Vec<u32>,
        first_word: u32,
        len: Bits<u32>,
        right_align: bool,
    ) -> Result<()> {
        self.check()?;
        let clocked = Bits(HEADER_BITS) + len.0 + 1;
        let decoded = codec::decode(&[first_word], clocked, right_align)?;
        if !decoded.read {
            bail!("write header sent as a read: {}", Hex(first_word));
        }
        let key = (decoded.target, decoded.designator);

        let mut stream = self
            .responses
            .get(&key)
            .or_else(|| self.written.get(&key))
            .cloned()
            .unwrap_or_default();
        stream.resize(len.words().0, 0);
        if let Some((reads @ 1.., status)) = self.status.get_mut(&key) {
            *reads -= 1;
            stream[0] &= !(0b11 << 30);
            put_bits(&mut stream, 0, *status, 2);
        }

        let words = if right_align {
            let mut out = vec![0; len.words().0];
            let pad = len.words().bits().0 - len.0;
            bits::place(&mut out, pad as usize, &stream, len);
            out
        } else {
            let mut out = vec![0; (len + 1).words().0];
            put_bits(&mut out, 0, 1, 1);
            bits::place(&mut out, 1, &stream, len);
            out
        };
        buf.extend_from_slice(&words);

        self.log.push(Transaction::Read {
            target: decoded.target,
            designator: decoded.designator,
            len,
            right_align,
            words,
        });
        Ok(())
    }

    fn write_register(&mut self, reg: Register, value: u32, offset: u32) -> Result<()> {
        self.check()?;
        self.registers.insert((reg, offset), value);
        self.log
            .push(Transaction::RegisterWrite { reg, value, offset });
        Ok(())
    }

    fn read_register(&mut self, reg: Register) -> Result<u32> {
        self.check()?;
        let value = self.register(reg, 0).unwrap_or_default();
        self.log.push(Transaction::RegisterRead { reg, value });
        Ok(value)
    }

    fn wait(&mut self, duration: Duration) {
        self.log.push(Transaction::Wait(duration));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Access, ArgumentError, Controller, Error, Opcode, Unit};

    const OPTO_RX: Opcode = Opcode::new("opto-rx", Unit::Fe, 22, 8, 1, 0xff, Access::ReadWrite);
    const THRESHOLDS: Opcode =
        Opcode::new("thresholds", Unit::Fe, 4, 60, 12, 0x1f, Access::ReadWrite);
    const WIDE: Opcode = Opcode::new("wide", Unit::Be, 9, 64, 2, u32::MAX, Access::ReadWrite);
    const ID: Opcode = Opcode::new("id", Unit::Vme, 2, 32, 1, u32::MAX, Access::ReadOnly);

    fn fe(unit: u8) -> Target {
        Target::fe(unit).unwrap()
    }

    #[test]
    fn test_right_aligned_round_trip() {
        let mut cont = Controller::new(FakeFed::new());
        cont.write(&OPTO_RX, fe(3), &[0xab]).unwrap();
        assert_eq!(cont.read(&OPTO_RX, fe(3)).unwrap(), [0xab]);
        assert_eq!(cont.read(&OPTO_RX, fe(4)).unwrap(), [0]);
    }

    #[test]
    fn test_raw_round_trip() {
        let mut cont = Controller::new(FakeFed::new());
        let args: Vec<u32> = (0..12).map(|i| 31 - i).collect();
        cont.write(&THRESHOLDS, fe(0), &args).unwrap();
        assert_eq!(cont.read(&THRESHOLDS, fe(0)).unwrap(), args);

        // the raw capture leads with the extra bit
        let Some(Transaction::Read { words, .. }) = cont.backend().transactions().last() else {
            panic!("expected a read");
        };
        assert_eq!(words.len(), 2);
        assert_eq!(words[0] >> 31, 1);
    }

    #[test]
    fn test_word_multiple_round_trip() {
        let mut cont = Controller::new(FakeFed::new());
        cont.write(&WIDE, Target::Be, &[0xdead_beef, 0x0123_4567])
            .unwrap();
        assert_eq!(
            cont.read(&WIDE, Target::Be).unwrap(),
            [0xdead_beef, 0x0123_4567]
        );
    }

    #[test]
    fn test_broadcast_reaches_every_unit() {
        let mut cont = Controller::new(FakeFed::new());
        cont.write(&OPTO_RX, Target::AllFe, &[0x42]).unwrap();
        for unit in 0..8 {
            assert_eq!(cont.read(&OPTO_RX, fe(unit)).unwrap(), [0x42]);
        }
    }

    #[test]
    fn test_preloaded_response() {
        let mut fed = FakeFed::new();
        fed.respond_value(Target::Vme, 2, Bits(32), 0x2100_0a01);
        let mut cont = Controller::new(fed);
        assert_eq!(cont.read(&ID, Target::Vme).unwrap(), [0x2100_0a01]);
    }

    #[test]
    fn test_rejected_write_skips_transport() {
        let mut cont = Controller::new(FakeFed::new());
        let err = cont.write(&THRESHOLDS, fe(1), &[1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidArgument(ArgumentError::Count { .. })
        ));
        let err = cont.write(&OPTO_RX, Target::Be, &[1]).unwrap_err();
        assert!(matches!(err, Error::InvalidTarget(_)));
        assert!(cont.backend().transactions().is_empty());
    }

    #[test]
    fn test_transport_failure() {
        let mut fed = FakeFed::new();
        fed.fail_transport(true);
        let mut cont = Controller::new(fed);
        let err = cont.write(&OPTO_RX, fe(0), &[1]).unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[test]
    fn test_status_bits() {
        const I2C: Opcode = Opcode::new("i2c", Unit::Fe, 11, 18, 1, 0xffff, Access::ReadWrite);
        let mut fed = FakeFed::new();
        fed.respond_value(fe(2), 11, Bits(18), 0x1234);
        fed.set_status(fe(2), 11, 1, 0b10);
        let mut cont = Controller::new(fed);
        assert_eq!(cont.read(&I2C, fe(2)).unwrap(), [0b10 << 16 | 0x1234]);
        assert_eq!(cont.read(&I2C, fe(2)).unwrap(), [0x1234]);
    }

    #[test]
    fn test_registers_and_log() {
        let mut fed = FakeFed::new();
        fed.set_register(Register::BeStatus, 0x5);
        let mut cont = Controller::new(fed);
        cont.write_register(Register::BoardReset, 1, 0).unwrap();
        assert_eq!(cont.read_register(Register::BeStatus).unwrap(), 0x5);
        cont.wait(Duration::from_millis(3));

        let fed = cont.backend_mut();
        assert_eq!(fed.register(Register::BoardReset, 0), Some(1));
        assert_eq!(fed.waited(), Duration::from_millis(3));
        let log = fed.consume_log();
        assert!(log.contains("board-reset"));
        assert!(log.contains("be-status"));
        assert!(fed.transactions().is_empty());
    }
}
