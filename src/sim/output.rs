//! Output devices, which receive every value emitted by an `OUT` instruction.
//!
//! An output device is set on the simulator with [`Simulator::set_output`].
//! Three implementations are provided:
//! - [`EmptyOutput`]: discards everything (the default)
//! - [`BufferedOutput`]: collects values in a shared buffer
//! - [`ChannelOutput`]: forwards values through a channel to another thread
//!
//! ```
//! use tho::asm::assemble_src;
//! use tho::sim::Simulator;
//! use tho::sim::output::BufferedOutput;
//!
//! let obj = assemble_src("STO 0 7 LDA 0 OUT OUT HLT").unwrap();
//! let mut sim = Simulator::default();
//! sim.load_obj_file(&obj);
//!
//! let output = BufferedOutput::default();
//! sim.set_output(output.clone());
//! sim.run().unwrap();
//!
//! assert_eq!(&*output.get_buffer().read().unwrap(), &[7, 7]);
//! ```
//!
//! [`Simulator::set_output`]: super::Simulator::set_output

use std::sync::{Arc, RwLock, RwLockWriteGuard};

use crossbeam_channel as cbc;

/// A device which accepts values from the accumulator.
pub trait OutputDevice: Send + Sync + 'static {
    /// Sends output, returns whether the output was successfully accepted.
    ///
    /// A rejected value stops the simulator with [`SimErr::OutputRejected`].
    ///
    /// [`SimErr::OutputRejected`]: super::SimErr::OutputRejected
    fn send_output(&mut self, value: u8) -> bool;

    /// Clears all of the current output.
    fn clear_output(&mut self) {}
}

/// An output device which accepts and discards every value.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyOutput;
impl OutputDevice for EmptyOutput {
    fn send_output(&mut self, _value: u8) -> bool {
        true
    }
}

/// An output device that delegates its output to a buffer.
///
/// Writes wait for any readers of the buffer to release it.
#[derive(Debug, Default, Clone)]
pub struct BufferedOutput {
    buffer: Arc<RwLock<Vec<u8>>>
}
impl BufferedOutput {
    /// Creates a new output device, wrapping it around a given buffer.
    pub fn new(buffer: Arc<RwLock<Vec<u8>>>) -> Self {
        Self { buffer }
    }

    /// Gets a reference to the internal buffer of this device.
    pub fn get_buffer(&self) -> &Arc<RwLock<Vec<u8>>> {
        &self.buffer
    }

    fn output(&self) -> RwLockWriteGuard<'_, Vec<u8>> {
        self.buffer.write()
            .unwrap_or_else(|e| e.into_inner())
    }
}
impl OutputDevice for BufferedOutput {
    fn send_output(&mut self, value: u8) -> bool {
        self.output().push(value);
        true
    }

    fn clear_output(&mut self) {
        self.output().clear();
    }
}

/// An output device that sends each value through a channel.
///
/// Sends never block. If the channel is bounded and full,
/// or if the receiver has been dropped, the value is rejected
/// and the simulator stops with a fault.
#[derive(Debug, Clone)]
pub struct ChannelOutput {
    sender: cbc::Sender<u8>
}
impl ChannelOutput {
    /// Creates a new output device, writing into the given sender.
    pub fn new(sender: cbc::Sender<u8>) -> Self {
        Self { sender }
    }

    /// Creates an output device over a new unbounded channel,
    /// returning the device and the receiving end of the channel.
    pub fn unbounded() -> (Self, cbc::Receiver<u8>) {
        let (tx, rx) = cbc::unbounded();
        (Self::new(tx), rx)
    }

    /// Creates an output device over a new channel holding at most `cap` pending values,
    /// returning the device and the receiving end of the channel.
    pub fn bounded(cap: usize) -> (Self, cbc::Receiver<u8>) {
        let (tx, rx) = cbc::bounded(cap);
        (Self::new(tx), rx)
    }
}
impl OutputDevice for ChannelOutput {
    fn send_output(&mut self, value: u8) -> bool {
        self.sender.try_send(value).is_ok()
    }
}
