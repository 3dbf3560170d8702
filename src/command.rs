use ledscape_shared::{
	COMMAND_ABORT,
	COMMAND_BLOCK_SIZE,
	COMMAND_COMMAND_OFFSET,
	COMMAND_FRAME_ADDRESS_OFFSET,
	COMMAND_IDLE,
	COMMAND_NUM_PIXELS_OFFSET,
	COMMAND_RESPONSE_OFFSET,
	COMMAND_START,
};

use crate::memory::MemoryRegion;

/// Where a unit is in the transfer handshake, as observed from its command block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
	/// No transfer has been started since the device was opened.
	Idle,
	/// Start requested, the PRU has not picked it up yet.
	Starting,
	/// Accepted and still clocking out.
	InFlight,
	Done,
	Aborting,
}

/// The command block at the start of a PRU's data RAM.
///
/// The host is the only writer of `frame_address` and `command`, the PRU clears `command`
/// when it accepts a frame and writes `response` when it is done. Setters take `&mut self`
/// so only the owner of the block can drive it.
#[derive(Debug)]
pub struct CommandBlock {
	unit: usize,
	mem:  MemoryRegion,
}

impl CommandBlock {
	/// Returns `None` if the data memory is too small for a command block.
	pub fn new(unit: usize, data_memory: &MemoryRegion) -> Option<Self> {
		Some(Self {
			unit,
			mem: data_memory.subregion(0, COMMAND_BLOCK_SIZE)?,
		})
	}

	pub fn unit(&self) -> usize {
		self.unit
	}

	pub(crate) fn reset(&mut self, num_pixels: u32) {
		self.mem.store_u32(COMMAND_FRAME_ADDRESS_OFFSET, 0);
		self.mem.store_u32(COMMAND_NUM_PIXELS_OFFSET, num_pixels);
		self.mem.store_u32(COMMAND_RESPONSE_OFFSET, 0);
		self.mem.store_u32(COMMAND_COMMAND_OFFSET, COMMAND_IDLE);
	}

	pub(crate) fn set_frame_address(&mut self, address: u32) {
		self.mem.store_u32(COMMAND_FRAME_ADDRESS_OFFSET, address);
	}

	pub(crate) fn clear_response(&mut self) {
		self.mem.store_u32(COMMAND_RESPONSE_OFFSET, 0);
	}

	pub(crate) fn send(&mut self, command: u32) {
		self.mem.store_u32(COMMAND_COMMAND_OFFSET, command);
	}

	pub fn frame_address(&self) -> u32 {
		self.mem.load_u32(COMMAND_FRAME_ADDRESS_OFFSET)
	}

	pub fn num_pixels(&self) -> u32 {
		self.mem.load_u32(COMMAND_NUM_PIXELS_OFFSET)
	}

	pub fn command(&self) -> u32 {
		self.mem.load_u32(COMMAND_COMMAND_OFFSET)
	}

	pub fn response(&self) -> u32 {
		self.mem.load_u32(COMMAND_RESPONSE_OFFSET)
	}

	pub fn is_accepted(&self) -> bool {
		self.command() == COMMAND_IDLE
	}

	pub fn is_done(&self) -> bool {
		self.response() != 0
	}

	pub fn state(&self) -> TransferState {
		match self.command() {
			COMMAND_START => TransferState::Starting,
			COMMAND_ABORT => TransferState::Aborting,
			_ if self.is_done() => TransferState::Done,
			_ => TransferState::InFlight,
		}
	}
}
