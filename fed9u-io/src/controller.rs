use std::time::Duration;

use eyre::eyre;
use tracing::{debug, trace};

use crate::{
    Backend, Error, Opcode, Register, Result, SerialCommand, SpaceHex, Target,
    bits::{self, mask},
};

pub struct Controller<B> {
    backend: B,
    buf: Vec<u32>,
}

impl<B: Backend> Controller<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            buf: Vec::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Build and send a write. Nothing reaches the transport if the
    /// arguments or target are rejected.
    pub fn write(&mut self, op: &Opcode, target: Target, args: &[u32]) -> Result<()> {
        let command = op.write(target, args)?;
        debug!(op = op.name, %target, ?args, "write");
        self.send(&command)
    }

    /// Read every element of `op` back from `target`.
    ///
    /// Right-aligned commands hold a single element and are returned as the
    /// transport delivers them. Everything else is read raw, reassembled and
    /// split into elements.
    pub fn read(&mut self, op: &Opcode, target: Target) -> Result<Vec<u32>> {
        let command = op.read(target)?;
        let len = op.bits;
        let words = self.receive(&command)?;

        let values = if command.right_align {
            let value = words.last().copied().unwrap_or_default();
            vec![value & mask(len.0)]
        } else {
            let words = bits::reassemble(words, len)?;
            let stream = bits::left_align_tail(words, len);
            let element = op.element();
            bits::unpack(&stream, element, mask(element.0), len)?
        };
        debug!(op = op.name, %target, ?values, "read");
        Ok(values)
    }

    pub fn send(&mut self, command: &SerialCommand) -> Result<()> {
        trace!(words = %SpaceHex(&command.words), len = command.len.0, "serial write");
        self.backend
            .write_serial(command)
            .map_err(Error::transport)
    }

    /// Send a read header and return the words the transport captured.
    pub fn receive(&mut self, command: &SerialCommand) -> Result<&[u32]> {
        let Self { backend, buf } = self;
        buf.clear();

        let len = command.payload_len();
        let expected = if command.right_align {
            len.words()
        } else {
            (len + 1).words()
        };
        backend
            .read_serial(buf, command.header(), len, command.right_align)
            .map_err(Error::transport)?;
        if buf.len() < expected.0 {
            return Err(Error::transport(eyre!(
                "serial read returned {} words, expected {}",
                buf.len(),
                expected.0
            )));
        }
        trace!(words = %SpaceHex(buf), right_align = command.right_align, "serial read");
        Ok(&self.buf[..expected.0])
    }

    pub fn write_register(&mut self, reg: Register, value: u32, offset: u32) -> Result<()> {
        debug!(%reg, value, offset, "register write");
        self.backend
            .write_register(reg, value, offset)
            .map_err(Error::transport)
    }

    pub fn read_register(&mut self, reg: Register) -> Result<u32> {
        let value = self
            .backend
            .read_register(reg)
            .map_err(Error::transport)?;
        debug!(%reg, value, "register read");
        Ok(value)
    }

    pub fn wait(&mut self, duration: Duration) {
        self.backend.wait(duration)
    }
}
