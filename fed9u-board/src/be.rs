//! Back-end FPGA: trigger and readout configuration, event building, and
//! the TTCrx clock and trigger receiver behind it.

use fed9u_io::{Backend, Controller, Error, FeUnit, Register, Result, Target};

use crate::{
    array, field,
    i2c::{self, RetryPolicy},
    opcodes::be,
};

#[repr(u32)]
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::EnumString, strum::FromRepr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum TriggerSource {
    Ttc = 1,
    Backplane = 2,
    Software = 4,
}

#[repr(u32)]
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::EnumString, strum::FromRepr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum ReadoutMode {
    Scope = 1,
    VirginRaw = 2,
    ProcessedRaw = 6,
    ZeroSuppressed = 10,
    ZeroSuppressedLite = 12,
}

bitflags::bitflags! {
    /// Contents of [`Register::BeStatus`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct BeStatus: u32 {
        const TTC_READY = 1 << 0;
        const QDR_EMPTY = 1 << 1;
        const QDR_PARTIAL_FULL = 1 << 2;
        const QDR_FULL = 1 << 3;
        const FRAME_SYNC_OUT = 1 << 4;
        const SLINK_DOWN = 1 << 5;
        const SLINK_FULL = 1 << 6;
        const INTERNAL_FREEZE = 1 << 7;
    }
}

/// TTCrx requests: bit 15 selects a read, bits 14..8 the register, bits 7..0
/// the data to write.
const TTCRX_READ: u16 = 1 << 15;

pub fn set_trigger_source<B: Backend>(cont: &mut Controller<B>, source: TriggerSource) -> Result<()> {
    cont.write(&be::TRIGGER_SOURCE, Target::Be, &[source as u32])
}

pub fn trigger_source<B: Backend>(cont: &mut Controller<B>) -> Result<TriggerSource> {
    let [value] = array(cont.read(&be::TRIGGER_SOURCE, Target::Be)?);
    TriggerSource::from_repr(value).ok_or(Error::Unrecognized {
        name: be::TRIGGER_SOURCE.name,
        value,
    })
}

pub fn set_readout_mode<B: Backend>(cont: &mut Controller<B>, mode: ReadoutMode) -> Result<()> {
    cont.write(&be::READOUT_MODE, Target::Be, &[mode as u32])
}

pub fn readout_mode<B: Backend>(cont: &mut Controller<B>) -> Result<ReadoutMode> {
    let [value] = array(cont.read(&be::READOUT_MODE, Target::Be)?);
    ReadoutMode::from_repr(value).ok_or(Error::Unrecognized {
        name: be::READOUT_MODE.name,
        value,
    })
}

/// Enable exactly the listed front-end units in the event builder.
pub fn set_enabled_units<B: Backend>(cont: &mut Controller<B>, units: &[FeUnit]) -> Result<()> {
    let mut args = [0; FeUnit::COUNT as usize];
    for unit in units {
        args[usize::from(unit.index())] = 1;
    }
    cont.write(&be::FE_ENABLE, Target::Be, &args)
}

pub fn enabled_units<B: Backend>(cont: &mut Controller<B>) -> Result<Vec<FeUnit>> {
    let enabled = cont.read(&be::FE_ENABLE, Target::Be)?;
    Ok(FeUnit::all()
        .zip(enabled)
        .filter_map(|(unit, on)| (on == 1).then_some(unit))
        .collect())
}

/// Number of samples recorded per event in scope mode.
pub fn set_scope_length<B: Backend>(cont: &mut Controller<B>, length: u16) -> Result<()> {
    cont.write(&be::SCOPE_LENGTH, Target::Be, &[u32::from(length)])
}

pub fn scope_length<B: Backend>(cont: &mut Controller<B>) -> Result<u16> {
    let [length] = array(cont.read(&be::SCOPE_LENGTH, Target::Be)?);
    Ok(length as u16)
}

pub fn set_fed_id<B: Backend>(cont: &mut Controller<B>, id: u16) -> Result<()> {
    cont.write(&be::FED_ID, Target::Be, &[u32::from(id)])
}

pub fn fed_id<B: Backend>(cont: &mut Controller<B>) -> Result<u16> {
    let [id] = array(cont.read(&be::FED_ID, Target::Be)?);
    Ok(id as u16)
}

pub fn firmware_id<B: Backend>(cont: &mut Controller<B>) -> Result<u32> {
    let [id] = array(cont.read(&be::FIRMWARE_ID, Target::Be)?);
    Ok(id)
}

pub fn event_count<B: Backend>(cont: &mut Controller<B>) -> Result<u32> {
    let [count] = array(cont.read(&be::EVENT_COUNT, Target::Be)?);
    Ok(count)
}

fn ttcrx_request(register: u8, data: u8) -> Result<u16> {
    let register = field("ttcrx register", register, 0x7f)? as u16;
    Ok(register << 8 | u16::from(data))
}

pub fn ttcrx_write<B: Backend>(cont: &mut Controller<B>, register: u8, data: u8) -> Result<()> {
    let request = ttcrx_request(register, data)?;
    i2c::transaction(cont, &be::TTCRX, Target::Be, request, RetryPolicy::TTCRX)?;
    Ok(())
}

pub fn ttcrx_read<B: Backend>(cont: &mut Controller<B>, register: u8) -> Result<u8> {
    let request = TTCRX_READ | ttcrx_request(register, 0)?;
    let data = i2c::transaction(cont, &be::TTCRX, Target::Be, request, RetryPolicy::TTCRX)?;
    Ok(data as u8)
}

pub fn status<B: Backend>(cont: &mut Controller<B>) -> Result<BeStatus> {
    let raw = cont.read_register(Register::BeStatus)?;
    Ok(BeStatus::from_bits_truncate(raw))
}

#[cfg(test)]
mod tests {
    use fed9u_io::{ArgumentError, fake_backend::FakeFed, units::Bits};

    use super::*;
    use crate::opcodes::I2C_BITS;

    fn controller() -> Controller<FakeFed> {
        Controller::new(FakeFed::new())
    }

    #[test]
    fn test_trigger_and_readout() {
        let mut cont = controller();
        set_trigger_source(&mut cont, TriggerSource::Backplane).unwrap();
        set_readout_mode(&mut cont, ReadoutMode::ZeroSuppressedLite).unwrap();
        assert_eq!(trigger_source(&mut cont).unwrap(), TriggerSource::Backplane);
        assert_eq!(readout_mode(&mut cont).unwrap(), ReadoutMode::ZeroSuppressedLite);
        assert_eq!(ReadoutMode::VirginRaw.to_string(), "virgin-raw");
        assert_eq!("software".parse::<TriggerSource>().unwrap(), TriggerSource::Software);
    }

    #[test]
    fn test_unrecognized_setting() {
        let mut fed = FakeFed::new();
        fed.respond_value(Target::Be, be::TRIGGER_SOURCE.designator, Bits(3), 3);
        let mut cont = Controller::new(fed);
        assert!(matches!(
            trigger_source(&mut cont),
            Err(Error::Unrecognized { value: 3, .. })
        ));
    }

    #[test]
    fn test_enabled_units() {
        let mut cont = controller();
        let units: Vec<FeUnit> = [0, 3, 7].map(|n| FeUnit::new(n).unwrap()).to_vec();
        set_enabled_units(&mut cont, &units).unwrap();
        assert_eq!(enabled_units(&mut cont).unwrap(), units);

        let words = cont.backend().written(Target::Be, be::FE_ENABLE.designator).unwrap();
        assert_eq!(words, [0b1001_0001 << 24]);
    }

    #[test]
    fn test_scope_length_and_fed_id() {
        let mut cont = controller();
        set_scope_length(&mut cont, 1020).unwrap();
        set_fed_id(&mut cont, 0x1a2).unwrap();
        assert_eq!(scope_length(&mut cont).unwrap(), 1020);
        assert_eq!(fed_id(&mut cont).unwrap(), 0x1a2);
        assert!(matches!(
            set_scope_length(&mut cont, 1021),
            Err(Error::InvalidArgument(ArgumentError::Range { .. }))
        ));
        assert!(set_fed_id(&mut cont, 0x1000).is_err());
    }

    #[test]
    fn test_read_only_counters() {
        let mut fed = FakeFed::new();
        fed.respond_value(Target::Be, be::EVENT_COUNT.designator, Bits(24), 123_456);
        let mut cont = Controller::new(fed);
        assert_eq!(event_count(&mut cont).unwrap(), 123_456);
        assert!(matches!(
            cont.write(&be::EVENT_COUNT, Target::Be, &[0]),
            Err(Error::InvalidArgument(ArgumentError::NotWritable(_)))
        ));
    }

    #[test]
    fn test_ttcrx() {
        let mut cont = controller();
        ttcrx_write(&mut cont, 0x03, 0xb3).unwrap();
        let written = cont.backend().written(Target::Be, be::TTCRX.designator).unwrap();
        assert_eq!(written[0] >> (32 - I2C_BITS), 0x03b3);

        cont.backend_mut()
            .respond_value(Target::Be, be::TTCRX.designator, Bits(I2C_BITS), 0x00b3);
        assert_eq!(ttcrx_read(&mut cont, 0x03).unwrap(), 0xb3);
        let written = cont.backend().written(Target::Be, be::TTCRX.designator).unwrap();
        assert_eq!(written[0] >> (32 - I2C_BITS), 0x8300);

        assert!(ttcrx_write(&mut cont, 0x80, 0).is_err());
    }

    #[test]
    fn test_status_register() {
        let mut fed = FakeFed::new();
        fed.set_register(Register::BeStatus, 0x1_0021);
        let mut cont = Controller::new(fed);
        assert_eq!(
            status(&mut cont).unwrap(),
            BeStatus::TTC_READY | BeStatus::SLINK_DOWN
        );
    }
}
