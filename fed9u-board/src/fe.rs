//! Front-end FPGA settings. Each of the eight front-end units digitises
//! twelve fibres, two APVs per fibre.
//!
//! Setters take a [`Target`] so the same settings can be broadcast to
//! [`Target::AllFe`]; getters take a single [`FeUnit`].

use fed9u_io::{Backend, Controller, FeUnit, Result, Target};

use crate::{
    array, field,
    i2c::{self, RetryPolicy},
    opcodes::fe,
};

pub const FIBRES: usize = 12;
pub const APVS: usize = 24;
pub const STRIPS: usize = 128;
pub const ADCS: usize = 6;

/// Frame thresholds are stored in units of this many ADC counts.
const FRAME_THRESHOLD_STEP: u16 = 32;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OptoRx {
    pub offset: u8,
    pub capacitor: u8,
    pub input: u8,
}

impl OptoRx {
    pub fn to_raw(self) -> Result<u32> {
        let offset = field("opto-rx offset", self.offset, 0xf)?;
        let capacitor = field("opto-rx capacitor", self.capacitor, 0x3)?;
        let input = field("opto-rx input", self.input, 0x3)?;
        Ok(offset << 4 | capacitor << 2 | input)
    }

    pub fn from_raw(raw: u32) -> Self {
        Self {
            offset: (raw >> 4 & 0xf) as u8,
            capacitor: (raw >> 2 & 0x3) as u8,
            input: (raw & 0x3) as u8,
        }
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct AdcControl: u32 {
        const DFS = 0b1000;
        const S1 = 0b0100;
        const S2 = 0b0010;
        const DISABLE = 0b0001;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StripThreshold {
    pub high: u8,
    pub low: u8,
}

pub fn set_opto_rx<B: Backend>(cont: &mut Controller<B>, target: Target, opto: OptoRx) -> Result<()> {
    cont.write(&fe::OPTO_RX, target, &[opto.to_raw()?])
}

pub fn opto_rx<B: Backend>(cont: &mut Controller<B>, unit: FeUnit) -> Result<OptoRx> {
    let [raw] = array(cont.read(&fe::OPTO_RX, Target::Fe(unit))?);
    Ok(OptoRx::from_raw(raw))
}

/// Bit `n` of `mask` disables APV `n`.
pub fn set_apv_disable<B: Backend>(cont: &mut Controller<B>, target: Target, mask: u32) -> Result<()> {
    field("apv disable mask", mask, 0xff_ffff)?;
    let args: Vec<u32> = (0..APVS).map(|apv| mask >> apv & 1).collect();
    cont.write(&fe::APV_DISABLE, target, &args)
}

pub fn apv_disable<B: Backend>(cont: &mut Controller<B>, unit: FeUnit) -> Result<u32> {
    let bits = cont.read(&fe::APV_DISABLE, Target::Fe(unit))?;
    Ok(bits
        .iter()
        .enumerate()
        .fold(0, |mask, (apv, bit)| mask | bit << apv))
}

pub fn set_complement<B: Backend>(
    cont: &mut Controller<B>,
    target: Target,
    complement: [bool; FIBRES],
) -> Result<()> {
    cont.write(&fe::COMPLEMENT, target, &complement.map(u32::from))
}

pub fn complement<B: Backend>(cont: &mut Controller<B>, unit: FeUnit) -> Result<[bool; FIBRES]> {
    let bits: [u32; FIBRES] = array(cont.read(&fe::COMPLEMENT, Target::Fe(unit))?);
    Ok(bits.map(|b| b == 1))
}

/// Thresholds in ADC counts. The hardware keeps them in steps of 32 counts,
/// rounding down.
pub fn set_frame_thresholds<B: Backend>(
    cont: &mut Controller<B>,
    target: Target,
    thresholds: &[u16; FIBRES],
) -> Result<()> {
    let args = thresholds.map(|t| u32::from(t / FRAME_THRESHOLD_STEP));
    cont.write(&fe::FRAME_THRESHOLDS, target, &args)
}

pub fn frame_thresholds<B: Backend>(cont: &mut Controller<B>, unit: FeUnit) -> Result<[u16; FIBRES]> {
    let steps: [u32; FIBRES] = array(cont.read(&fe::FRAME_THRESHOLDS, Target::Fe(unit))?);
    Ok(steps.map(|s| s as u16 * FRAME_THRESHOLD_STEP))
}

/// Fixed common-mode medians, one per APV. `None` lets the FPGA compute the
/// medians itself.
pub fn set_median_override<B: Backend>(
    cont: &mut Controller<B>,
    target: Target,
    medians: Option<&[u16; APVS]>,
) -> Result<()> {
    match medians {
        Some(medians) => {
            cont.write(&fe::MEDIAN_OVERRIDE, target, &medians.map(u32::from))?;
            cont.write(&fe::MEDIAN_DISABLE, target, &[0])
        }
        None => cont.write(&fe::MEDIAN_DISABLE, target, &[1]),
    }
}

pub fn median_override<B: Backend>(
    cont: &mut Controller<B>,
    unit: FeUnit,
) -> Result<Option<[u16; APVS]>> {
    let [disabled] = array(cont.read(&fe::MEDIAN_DISABLE, Target::Fe(unit))?);
    if disabled == 1 {
        return Ok(None);
    }
    let medians: [u32; APVS] = array(cont.read(&fe::MEDIAN_OVERRIDE, Target::Fe(unit))?);
    Ok(Some(medians.map(|m| m as u16)))
}

pub fn set_trim_dac_offsets<B: Backend>(
    cont: &mut Controller<B>,
    target: Target,
    offsets: &[u8; FIBRES],
) -> Result<()> {
    cont.write(&fe::TRIM_DAC_OFFSET, target, &offsets.map(u32::from))
}

pub fn trim_dac_offsets<B: Backend>(cont: &mut Controller<B>, unit: FeUnit) -> Result<[u8; FIBRES]> {
    let offsets: [u32; FIBRES] = array(cont.read(&fe::TRIM_DAC_OFFSET, Target::Fe(unit))?);
    Ok(offsets.map(|o| o as u8))
}

pub fn set_adc_control<B: Backend>(
    cont: &mut Controller<B>,
    target: Target,
    control: &[AdcControl; ADCS],
) -> Result<()> {
    cont.write(&fe::ADC_CONTROL, target, &control.map(|c| c.bits()))
}

pub fn adc_control<B: Backend>(cont: &mut Controller<B>, unit: FeUnit) -> Result<[AdcControl; ADCS]> {
    let raw: [u32; ADCS] = array(cont.read(&fe::ADC_CONTROL, Target::Fe(unit))?);
    Ok(raw.map(AdcControl::from_bits_truncate))
}

fn select_apv<B: Backend>(cont: &mut Controller<B>, target: Target, apv: u8) -> Result<()> {
    cont.write(&fe::RAM_ADDRESS, target, &[u32::from(apv)])
}

/// Load the 10-bit pedestal of every strip of one APV.
pub fn load_pedestals<B: Backend>(
    cont: &mut Controller<B>,
    target: Target,
    apv: u8,
    pedestals: &[u16; STRIPS],
) -> Result<()> {
    select_apv(cont, target, apv)?;
    cont.write(&fe::PEDESTALS, target, &pedestals.map(u32::from))
}

pub fn pedestals<B: Backend>(cont: &mut Controller<B>, unit: FeUnit, apv: u8) -> Result<[u16; STRIPS]> {
    select_apv(cont, Target::Fe(unit), apv)?;
    let raw: [u32; STRIPS] = array(cont.read(&fe::PEDESTALS, Target::Fe(unit))?);
    Ok(raw.map(|p| p as u16))
}

pub fn load_strip_thresholds<B: Backend>(
    cont: &mut Controller<B>,
    target: Target,
    apv: u8,
    thresholds: &[StripThreshold; STRIPS],
) -> Result<()> {
    select_apv(cont, target, apv)?;
    let args = thresholds.map(|t| u32::from(t.high) << 8 | u32::from(t.low));
    cont.write(&fe::STRIP_THRESHOLDS, target, &args)
}

pub fn strip_thresholds<B: Backend>(
    cont: &mut Controller<B>,
    unit: FeUnit,
    apv: u8,
) -> Result<[StripThreshold; STRIPS]> {
    select_apv(cont, Target::Fe(unit), apv)?;
    let raw: [u32; STRIPS] = array(cont.read(&fe::STRIP_THRESHOLDS, Target::Fe(unit))?);
    Ok(raw.map(|t| StripThreshold {
        high: (t >> 8) as u8,
        low: t as u8,
    }))
}

pub fn arm_spy<B: Backend>(cont: &mut Controller<B>, target: Target) -> Result<()> {
    cont.write(&fe::SPY_ARM, target, &[1])
}

pub fn firmware_id<B: Backend>(cont: &mut Controller<B>, unit: FeUnit) -> Result<u32> {
    let [id] = array(cont.read(&fe::FIRMWARE_ID, Target::Fe(unit))?);
    Ok(id)
}

/// Pass a raw request to the temperature monitor chip and return its reply.
pub fn temp_monitor<B: Backend>(cont: &mut Controller<B>, unit: FeUnit, request: u16) -> Result<u16> {
    let target = Target::Fe(unit);
    i2c::transaction(cont, &fe::TEMP_MONITOR, target, request, RetryPolicy::TEMP_MONITOR)
}
