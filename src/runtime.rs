//! Interface to whatever loads and runs the PRU programs.
//!
//! On a BeagleBone this is the uio_pruss driver: it maps each PRU's data RAM and the DDR
//! segment shared with the PRUs, loads program images and signals completion through a
//! host interrupt. [`crate::sim::SimRuntime`] implements it in-process.

use std::{path::Path, time::Duration};

use crate::{error::RuntimeError, memory::MemoryRegion};

/// The memory a runtime mapped for one PRU.
#[derive(Debug, Clone, Copy)]
pub struct CoprocessorContext {
	pub unit:           usize,
	/// The PRU's own data RAM, holding its command block.
	pub data_memory:    MemoryRegion,
	/// Process mapping of the DDR segment shared with the PRUs.
	pub shared_memory:  MemoryRegion,
	/// Address of `shared_memory` as the PRUs see it.
	pub shared_address: u32,
}

impl CoprocessorContext {
	pub fn shared_size(&self) -> usize {
		self.shared_memory.len()
	}
}

pub trait CoprocessorRuntime {
	/// Maps the memory of PRU `unit`. The program isn't running yet.
	fn init(&mut self, unit: usize) -> Result<CoprocessorContext, RuntimeError>;

	fn configure_gpio(
		&mut self,
		bank: usize,
		pin: u8,
		output: bool,
		initial: bool,
	) -> Result<(), RuntimeError>;

	fn start_program(&mut self, context: &CoprocessorContext, program: &Path) -> Result<(), RuntimeError>;

	/// Blocks until any PRU raises the host interrupt, at most `timeout` if given.
	///
	/// Returns `false` if the timeout expired first.
	fn wait_for_interrupt(&self, timeout: Option<Duration>) -> Result<bool, RuntimeError>;

	/// Halts the PRU and releases its mappings. `context` must not be used afterwards.
	fn teardown(&mut self, context: CoprocessorContext);
}
