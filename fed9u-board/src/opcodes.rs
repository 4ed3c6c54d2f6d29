//! Serial commands understood by the FED9U FPGAs.
//!
//! Designators are per FPGA class: designator 1 on a front-end FPGA and
//! designator 1 on the back-end FPGA are unrelated commands.

use fed9u_io::{Access, Opcode, Unit};

/// Payload width of the I2C-mediated commands: two status bits above a
/// 16-bit request or result.
pub const I2C_BITS: u32 = 18;

#[rustfmt::skip]
pub mod fe {
    use super::*;
    use Access::*;
    const fn op(name: &'static str, d: u8, bits: u32, count: u32, max: u32, access: Access) -> Opcode {
        Opcode::new(name, Unit::Fe, d, bits, count, max, access)
    }

    /// One bit per APV, set to drop that APV from the readout.
    pub const APV_DISABLE:        Opcode = op("fe.apv-disable",         1,   24,  24,      1, ReadWrite);
    /// One bit per fibre, set to invert the data of that fibre.
    pub const COMPLEMENT:         Opcode = op("fe.complement",          2,   12,  12,      1, ReadWrite);
    /// Tick-mark threshold per fibre, in units of 32 ADC counts.
    pub const FRAME_THRESHOLDS:   Opcode = op("fe.frame-thresholds",    4,   60,  12,   0x1f, ReadWrite);
    pub const MEDIAN_OVERRIDE:    Opcode = op("fe.median-override",     5,  240,  24,  0x3ff, ReadWrite);
    /// Set to ignore [`MEDIAN_OVERRIDE`] and compute common mode on the fly.
    pub const MEDIAN_DISABLE:     Opcode = op("fe.median-disable",      6,    1,   1,      1, ReadWrite);
    pub const TRIM_DAC_OFFSET:    Opcode = op("fe.trim-dac-offset",     9,   96,  12,   0xff, ReadWrite);
    /// Four control bits for each of the six dual-channel ADCs.
    pub const ADC_CONTROL:        Opcode = op("fe.adc-control",        10,   24,   6,    0xf, ReadWrite);
    pub const TEMP_MONITOR:       Opcode = op("fe.temp-monitor",       11, I2C_BITS, 1, 0xffff, ReadWrite);
    pub const FIRMWARE_ID:        Opcode = op("fe.firmware-id",        12,   32,   1, u32::MAX, ReadOnly);
    /// Selects the APV whose pedestal and threshold RAM the next two
    /// commands reach.
    pub const RAM_ADDRESS:        Opcode = op("fe.ram-address",        13,    5,   1,     23, WriteOnly);
    pub const PEDESTALS:          Opcode = op("fe.pedestals",          14, 1280, 128,  0x3ff, ReadWrite);
    /// High threshold in the top byte, low threshold in the bottom byte.
    pub const STRIP_THRESHOLDS:   Opcode = op("fe.strip-thresholds",   15, 2048, 128, 0xffff, ReadWrite);
    pub const SPY_ARM:            Opcode = op("fe.spy-arm",            16,    1,   1,      1, WriteOnly);
    /// OptoRx offset, capacitor and input select.
    pub const OPTO_RX:            Opcode = op("fe.opto-rx",            22,    8,   1,   0xff, ReadWrite);
}

#[rustfmt::skip]
pub mod delay {
    use super::*;
    use Access::*;
    const fn op(name: &'static str, d: u8, bits: u32, count: u32, max: u32, access: Access) -> Opcode {
        Opcode::new(name, Unit::Delay, d, bits, count, max, access)
    }

    /// Whole 25 ns clock cycles, per channel.
    pub const COARSE_SKEW:        Opcode = op("delay.coarse-skew",      1,   16,   4,    0xf, ReadWrite);
    /// 1 ns steps, per channel.
    pub const FINE_SKEW:          Opcode = op("delay.fine-skew",        2,   20,   4,     24, ReadWrite);
}

#[rustfmt::skip]
pub mod be {
    use super::*;
    use Access::*;
    const fn op(name: &'static str, d: u8, bits: u32, count: u32, max: u32, access: Access) -> Opcode {
        Opcode::new(name, Unit::Be, d, bits, count, max, access)
    }

    pub const TRIGGER_SOURCE:     Opcode = op("be.trigger-source",      1,    3,   1,      4, ReadWrite);
    /// One bit per front-end unit.
    pub const FE_ENABLE:          Opcode = op("be.fe-enable",           2,    8,   8,      1, ReadWrite);
    pub const READOUT_MODE:       Opcode = op("be.readout-mode",        3,    4,   1,    0xf, ReadWrite);
    pub const SCOPE_LENGTH:       Opcode = op("be.scope-length",        4,   10,   1,   1020, ReadWrite);
    pub const FED_ID:             Opcode = op("be.fed-id",              5,   12,   1,  0xfff, ReadWrite);
    pub const FIRMWARE_ID:        Opcode = op("be.firmware-id",         6,   32,   1, u32::MAX, ReadOnly);
    pub const TTCRX:              Opcode = op("be.ttcrx",               7, I2C_BITS, 1, 0xffff, ReadWrite);
    pub const EVENT_COUNT:        Opcode = op("be.event-count",         9,   24,   1, 0xff_ffff, ReadOnly);
}

#[rustfmt::skip]
pub mod vme {
    use super::*;
    use Access::*;
    const fn op(name: &'static str, d: u8, bits: u32, count: u32, max: u32, access: Access) -> Opcode {
        Opcode::new(name, Unit::Vme, d, bits, count, max, access)
    }

    pub const CLOCK_SOURCE:       Opcode = op("vme.clock-source",       1,    3,   1,      4, ReadWrite);
    pub const FIRMWARE_ID:        Opcode = op("vme.firmware-id",        2,   32,   1, u32::MAX, ReadOnly);
    pub const VOLTAGE_MONITOR:    Opcode = op("vme.voltage-monitor",    3, I2C_BITS, 1, 0xffff, ReadWrite);
}

pub static ALL: &[Opcode] = &[
    fe::APV_DISABLE,
    fe::COMPLEMENT,
    fe::FRAME_THRESHOLDS,
    fe::MEDIAN_OVERRIDE,
    fe::MEDIAN_DISABLE,
    fe::TRIM_DAC_OFFSET,
    fe::ADC_CONTROL,
    fe::TEMP_MONITOR,
    fe::FIRMWARE_ID,
    fe::RAM_ADDRESS,
    fe::PEDESTALS,
    fe::STRIP_THRESHOLDS,
    fe::SPY_ARM,
    fe::OPTO_RX,
    delay::COARSE_SKEW,
    delay::FINE_SKEW,
    be::TRIGGER_SOURCE,
    be::FE_ENABLE,
    be::READOUT_MODE,
    be::SCOPE_LENGTH,
    be::FED_ID,
    be::FIRMWARE_ID,
    be::TTCRX,
    be::EVENT_COUNT,
    vme::CLOCK_SOURCE,
    vme::FIRMWARE_ID,
    vme::VOLTAGE_MONITOR,
];

pub fn by_name(name: &str) -> Option<&'static Opcode> {
    ALL.iter().find(|op| op.name == name)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_designators_unique_per_unit() {
        let mut seen = HashSet::new();
        for op in ALL {
            assert!(
                seen.insert((op.unit, op.designator)),
                "{} reuses designator {} on {}",
                op.name,
                op.designator,
                op.unit
            );
        }
    }

    #[test]
    fn test_names_match_unit() {
        for op in ALL {
            let (prefix, _) = op.name.split_once('.').unwrap();
            assert_eq!(prefix, op.unit.to_string(), "{}", op.name);
            assert_eq!(by_name(op.name), Some(op));
        }
        assert_eq!(by_name("fe.nonexistent"), None);
    }

    #[test]
    fn test_opto_rx_layout() {
        let fe0 = fed9u_io::Target::fe(0).unwrap();
        let cmd = fe::OPTO_RX.write(fe0, &[0xab]).unwrap();
        assert_eq!(cmd.words.len(), 1);
        assert_eq!(cmd.header() & 0xff, 0xab);
        assert_eq!(cmd.header() >> 22 & 0x1f, 22);
    }
}
