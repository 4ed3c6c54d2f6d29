use std::fmt::Display;

use facet::Facet;
use fed9u_io::{Backend, Controller, Error, FeUnit, Result};

use crate::{
    Read, be,
    fe::{self, FIBRES},
    vme,
};

nestify::nest! {
#[derive(Facet)]
pub struct FedInfo {
    pub vme: #[derive(Facet)] pub struct VmeInfo {
        pub firmware_id: u32,
        pub clock_source: String,
        pub system_ace_status: u32,
    },
    pub be: #[derive(Facet)] pub struct BeInfo {
        pub firmware_id: u32,
        pub fed_id: u16,
        pub trigger_source: String,
        pub readout_mode: String,
        pub enabled_units: Vec<u8>,
        pub event_count: u32,
        pub status: u32,
    },
    pub fe: Vec<#[derive(Facet)] pub struct FeInfo {
        pub unit: u8,
        pub firmware_id: u32,
        pub opto_rx: [u8; 3],
        pub apv_disable: u32,
        pub frame_thresholds: [u16; FIBRES],
    }>,
}
}

/// Settings the firmware does not know come back as `unknown (0x..)` rather
/// than failing the whole snapshot.
fn setting<T: Display>(value: Result<T>) -> Result<String> {
    match value {
        Ok(value) => Ok(value.to_string()),
        Err(Error::Unrecognized { value, .. }) => Ok(format!("unknown ({value:#x})")),
        Err(e) => Err(e),
    }
}

impl Read for VmeInfo {
    fn read(cont: &mut Controller<impl Backend>) -> Result<Self> {
        Ok(Self {
            firmware_id: vme::firmware_id(cont)?,
            clock_source: setting(vme::clock_source(cont))?,
            system_ace_status: vme::system_ace_status(cont)?.bits(),
        })
    }
}

impl Read for BeInfo {
    fn read(cont: &mut Controller<impl Backend>) -> Result<Self> {
        Ok(Self {
            firmware_id: be::firmware_id(cont)?,
            fed_id: be::fed_id(cont)?,
            trigger_source: setting(be::trigger_source(cont))?,
            readout_mode: setting(be::readout_mode(cont))?,
            enabled_units: be::enabled_units(cont)?
                .into_iter()
                .map(FeUnit::index)
                .collect(),
            event_count: be::event_count(cont)?,
            status: be::status(cont)?.bits(),
        })
    }
}

impl FeInfo {
    pub fn read(cont: &mut Controller<impl Backend>, unit: FeUnit) -> Result<Self> {
        let opto = fe::opto_rx(cont, unit)?;
        Ok(Self {
            unit: unit.index(),
            firmware_id: fe::firmware_id(cont, unit)?,
            opto_rx: [opto.offset, opto.capacitor, opto.input],
            apv_disable: fe::apv_disable(cont, unit)?,
            frame_thresholds: fe::frame_thresholds(cont, unit)?,
        })
    }
}

impl Read for FedInfo {
    fn read(cont: &mut Controller<impl Backend>) -> Result<Self> {
        Ok(Self {
            vme: VmeInfo::read(cont)?,
            be: BeInfo::read(cont)?,
            fe: FeUnit::all()
                .map(|unit| FeInfo::read(cont, unit))
                .collect::<Result<_>>()?,
        })
    }
}
