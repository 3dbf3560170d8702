use ledscape_shared::{COMMAND_ABORT, COMMAND_START};
use tracing::{debug, trace};

use crate::{
	command::{CommandBlock, TransferState},
	error::RuntimeError,
	runtime::CoprocessorRuntime,
	wait::WaitPolicy,
	Result,
};

/// Drives the command blocks of all PRUs in lockstep.
///
/// Each PRU serves its own strips from the same frame, a transfer is only complete once
/// every one of them reported back.
#[derive(Debug)]
pub struct Handshake {
	blocks:  Vec<CommandBlock>,
	started: bool,
}

impl Handshake {
	pub fn new(blocks: Vec<CommandBlock>) -> Self {
		Self { blocks, started: false }
	}

	pub fn blocks(&self) -> &[CommandBlock] {
		&self.blocks
	}

	pub(crate) fn reset(&mut self, num_pixels: u32) {
		for block in &mut self.blocks {
			block.reset(num_pixels);
		}
		self.started = false;
	}

	/// Waits for PRU `unit` to write its first response, which the programs do once running.
	pub(crate) fn wait_alive(&self, unit: usize, policy: &WaitPolicy) -> Result<()> {
		let block = self
			.blocks
			.iter()
			.find(|block| block.unit() == unit)
			.ok_or_else(|| RuntimeError::Unit {
				unit,
				message: format!("no command block, have {}", self.blocks.len()),
			})?;
		policy.spin_until(|| block.is_done())
	}

	/// Points every PRU at `frame_address` and tells them to start clocking it out.
	///
	/// Spins until the previous start command was accepted by all PRUs first, so there is
	/// never more than one transfer queued per PRU. The address is only written after that,
	/// a start that is still pending keeps the frame it was issued for. Not reentrant.
	pub fn start_transfer(&mut self, frame_address: u32, accept: &WaitPolicy) -> Result<()> {
		let blocks = &self.blocks;
		accept.spin_until(|| blocks.iter().all(CommandBlock::is_accepted))?;

		for block in &mut self.blocks {
			block.set_frame_address(frame_address);
			block.clear_response();
		}
		for block in &mut self.blocks {
			block.send(COMMAND_START);
		}
		self.started = true;

		debug!("started transfer of frame at {frame_address:#010x}");
		Ok(())
	}

	/// Blocks on the host interrupt until every PRU reported the transfer as done.
	///
	/// On timeout or cancellation the transfer is left running, aborting is up to the caller.
	pub fn wait_for_completion<R>(&self, runtime: &R, policy: &WaitPolicy) -> Result<()>
	where
		R: CoprocessorRuntime + ?Sized,
	{
		policy.wait_until(
			|| self.blocks.iter().all(CommandBlock::is_done),
			|slice| {
				let fired = runtime.wait_for_interrupt(slice)?;
				trace!(fired, "host interrupt");
				Ok(())
			},
		)?;

		debug!("transfer complete");
		Ok(())
	}

	/// Asks every PRU program to halt. Doesn't wait for them to do so.
	pub fn abort(&mut self) {
		for block in &mut self.blocks {
			block.send(COMMAND_ABORT);
		}
	}

	pub fn states(&self) -> Vec<TransferState> {
		self.blocks
			.iter()
			.map(|block| match block.state() {
				TransferState::Aborting => TransferState::Aborting,
				_ if !self.started => TransferState::Idle,
				state => state,
			})
			.collect()
	}
}
