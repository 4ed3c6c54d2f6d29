//! Commands that reach an I2C chip behind one of the FPGAs.
//!
//! The FPGA forwards a 16-bit request and reports the chip's reply with two
//! status bits on top. A chip still working on the request reports busy; a
//! chip that did not acknowledge reports an error and the request has to be
//! sent again.

use std::time::Duration;

use fed9u_io::{Backend, Controller, Error, Opcode, Result, Target};
use tracing::{instrument, warn};

use crate::opcodes::I2C_BITS;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct I2cStatus: u32 {
        const ERROR = 0b01;
        const BUSY = 0b10;
    }
}

/// How long to keep polling an I2C chip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub const TEMP_MONITOR: Self = Self {
        attempts: 100,
        backoff: Duration::from_millis(1),
    };
    pub const TTCRX: Self = Self {
        attempts: 20,
        backoff: Duration::from_millis(10),
    };
    pub const VOLTAGE_MONITOR: Self = Self {
        attempts: 50,
        backoff: Duration::from_millis(5),
    };
}

/// Split a reply into status and data.
pub fn split_reply(reply: u32) -> (I2cStatus, u16) {
    (I2cStatus::from_bits_truncate(reply >> 16), reply as u16)
}

/// Send `request` and wait for the chip's reply.
///
/// Busy replies are polled again after `policy.backoff`; error replies
/// resend the request first. Both count against `policy.attempts`.
#[instrument(skip(cont, op), fields(op = op.name))]
pub fn transaction<B: Backend>(
    cont: &mut Controller<B>,
    op: &Opcode,
    target: Target,
    request: u16,
    policy: RetryPolicy,
) -> Result<u16> {
    debug_assert_eq!(op.bits.0, I2C_BITS, "{} is not an I2C command", op.name);

    cont.write(op, target, &[u32::from(request)])?;
    let mut status = I2cStatus::empty();
    for attempt in 1..=policy.attempts {
        let reply = cont.read(op, target)?;
        let (reply_status, data) = split_reply(reply[0]);
        status = reply_status;
        if status.is_empty() {
            return Ok(data);
        }

        warn!(attempt, ?status, "i2c chip not ready");
        cont.wait(policy.backoff);
        if status.contains(I2cStatus::ERROR) && attempt < policy.attempts {
            cont.write(op, target, &[u32::from(request)])?;
        }
    }

    Err(Error::DeviceBusyOrError {
        status: status.bits(),
        attempts: policy.attempts,
    })
}

#[cfg(test)]
mod tests {
    use fed9u_io::{
        fake_backend::{FakeFed, Transaction},
        units::Bits,
    };

    use super::*;
    use crate::opcodes::fe;

    fn fe2() -> Target {
        Target::fe(2).unwrap()
    }

    fn setup(busy_reads: usize, status: I2cStatus) -> Controller<FakeFed> {
        let mut fed = FakeFed::new();
        fed.respond_value(fe2(), fe::TEMP_MONITOR.designator, Bits(I2C_BITS), 0x0031);
        fed.set_status(fe2(), fe::TEMP_MONITOR.designator, busy_reads, status.bits());
        Controller::new(fed)
    }

    fn writes(fed: &FakeFed) -> usize {
        fed.transactions()
            .iter()
            .filter(|t| matches!(t, Transaction::Write { .. }))
            .count()
    }

    #[test]
    fn test_succeeds_after_busy() {
        let mut cont = setup(3, I2cStatus::BUSY);
        let policy = RetryPolicy::TEMP_MONITOR;
        let data = transaction(&mut cont, &fe::TEMP_MONITOR, fe2(), 0x8000, policy).unwrap();
        assert_eq!(data, 0x0031);
        assert_eq!(cont.backend().waited(), policy.backoff * 3);
        assert_eq!(writes(cont.backend()), 1);
    }

    #[test]
    fn test_error_resends_request() {
        let mut cont = setup(2, I2cStatus::ERROR);
        let data =
            transaction(&mut cont, &fe::TEMP_MONITOR, fe2(), 0x8000, RetryPolicy::TEMP_MONITOR)
                .unwrap();
        assert_eq!(data, 0x0031);
        assert_eq!(writes(cont.backend()), 3);
    }

    #[test]
    fn test_gives_up() {
        let mut cont = setup(usize::MAX, I2cStatus::BUSY);
        let policy = RetryPolicy {
            attempts: 5,
            backoff: Duration::from_millis(2),
        };
        let err = transaction(&mut cont, &fe::TEMP_MONITOR, fe2(), 0x8000, policy).unwrap_err();
        assert!(matches!(
            err,
            Error::DeviceBusyOrError {
                status: 0b10,
                attempts: 5
            }
        ));
        assert_eq!(cont.backend().waited(), Duration::from_millis(10));
    }

    #[test]
    fn test_transport_errors_are_not_retried() {
        let mut cont = setup(0, I2cStatus::empty());
        cont.backend_mut().fail_transport(true);
        let err = transaction(&mut cont, &fe::TEMP_MONITOR, fe2(), 0x8000, RetryPolicy::TTCRX)
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(cont.backend().waited(), Duration::ZERO);
    }
}
