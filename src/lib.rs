//! Drives up to 48 ws281x LED strips from the two BeagleBone PRUs.
//!
//! The host renders into one of two frames in memory shared with the PRUs, then hands it
//! over with [`Ledscape::draw`]. While the PRUs clock that frame out, the other one can be
//! rendered. [`Ledscape::wait`] blocks until the transfer finished.

use std::path::PathBuf;

use ledscape_shared::{COMMAND_ABORT, GPIO_BANKS, MAX_STRIPS};
use tracing::{debug, info, trace, warn};

mod color;
mod command;
mod error;
mod frame;
mod handshake;
pub mod memory;
pub mod runtime;
pub mod sim;
#[cfg(feature = "tokio")]
pub mod tokio;
mod wait;

pub use crate::{
	color::{ChannelOrder, Pixel},
	command::{CommandBlock, TransferState},
	error::{Error, Result, RuntimeError},
	frame::{Frame, FrameBuffer, FrameLayout},
	handshake::Handshake,
	runtime::{CoprocessorContext, CoprocessorRuntime},
	wait::{CancelHandle, WaitPolicy},
};

/// The ws281x PRU programs as built by LEDscape, relative to the working directory.
pub const DEFAULT_PROGRAMS: [&str; 2] = [
	"pru/bin/ws281x-original-ledscape-pru0.bin",
	"pru/bin/ws281x-original-ledscape-pru1.bin",
];

pub struct Config {
	/// Strips that can be addressed, at most [`MAX_STRIPS`]. Rows stay [`MAX_STRIPS`] wide.
	pub strips:     usize,
	/// Length in pixels of the longest strip.
	pub num_pixels: usize,
	/// One program per PRU. PRU `n` runs `programs[n]`.
	pub programs:   Vec<PathBuf>,
	/// Waiting for each PRU program to report in after it was started.
	pub startup:    WaitPolicy,
	/// Waiting for the PRUs to accept a frame in [`Ledscape::draw`].
	pub accept:     WaitPolicy,
}

impl Config {
	pub fn new(num_pixels: usize) -> Self {
		Self {
			strips: MAX_STRIPS,
			num_pixels,
			programs: DEFAULT_PROGRAMS.iter().map(PathBuf::from).collect(),
			startup: WaitPolicy::default(),
			accept: WaitPolicy::default(),
		}
	}

	pub fn with_programs(mut self, programs: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
		self.programs = programs.into_iter().map(Into::into).collect();
		self
	}
}

pub struct Ledscape<R: CoprocessorRuntime> {
	runtime:   R,
	contexts:  Vec<CoprocessorContext>,
	handshake: Handshake,
	frames:    FrameBuffer,
	accept:    WaitPolicy,
}

impl<R: CoprocessorRuntime> Ledscape<R> {
	/// Maps the PRUs, configures the output pins and starts the PRU programs.
	///
	/// Nothing is left running or mapped if this fails.
	pub fn open(mut runtime: R, config: Config) -> Result<Self> {
		if config.programs.is_empty() {
			return Err(Error::InvalidConfig("at least one PRU program is needed".into()));
		}
		let layout = FrameLayout::new(config.num_pixels, config.strips)?;
		let num_pixels = u32::try_from(config.num_pixels)
			.map_err(|_| Error::InvalidConfig(format!("{} pixels per strip is too many", config.num_pixels)))?;

		let mut contexts = Vec::with_capacity(config.programs.len());
		for unit in 0..config.programs.len() {
			match runtime.init(unit) {
				Ok(context) => contexts.push(context),
				Err(err) => {
					warn!(unit, %err, "failed to map PRU, rolling back");
					release(&mut runtime, contexts);
					return Err(err.into());
				}
			}
		}

		match bring_up(&mut runtime, &contexts, layout, num_pixels, &config) {
			Ok((handshake, frames)) => Ok(Self {
				runtime,
				contexts,
				handshake,
				frames,
				accept: config.accept,
			}),
			Err(err) => {
				warn!(%err, "PRU bring-up failed, rolling back");
				release(&mut runtime, contexts);
				Err(err)
			}
		}
	}

	/// Opens a full 48 strip display with the default PRU programs.
	pub fn open_default(runtime: R, num_pixels: usize) -> Result<Self> {
		Self::open(runtime, Config::new(num_pixels))
	}

	pub fn open_with_programs(
		runtime: R,
		num_pixels: usize,
		program_0: impl Into<PathBuf>,
		program_1: impl Into<PathBuf>,
	) -> Result<Self> {
		Self::open(
			runtime,
			Config::new(num_pixels).with_programs([program_0.into(), program_1.into()]),
		)
	}

	pub fn num_pixels(&self) -> usize {
		self.frames.layout().num_pixels()
	}

	pub fn strips(&self) -> usize {
		self.frames.layout().strips()
	}

	pub fn frame_size(&self) -> usize {
		self.frames.layout().frame_size()
	}

	/// Number of PRUs driving the strips.
	pub fn units(&self) -> usize {
		self.contexts.len()
	}

	pub fn runtime(&self) -> &R {
		&self.runtime
	}

	pub fn transfer_state(&self) -> Vec<TransferState> {
		self.handshake.states()
	}

	/// One of the two frame buffers, `slot` is 0 or 1.
	pub fn frame(&mut self, slot: usize) -> Result<Frame<'_>> {
		self.frames.frame(slot)
	}

	/// Starts clocking out frame `slot`.
	///
	/// Blocks until the previous frame was picked up by the PRUs, but not until it was sent.
	/// The new frame address is only written after that, so a start still pending from the
	/// last call keeps pointing at its own frame.
	pub fn draw(&mut self, slot: usize) -> Result<()> {
		let address = self.frames.frame_address(slot)?;
		debug!(slot, "drawing frame");
		self.handshake.start_transfer(address, &self.accept)
	}

	/// Waits for the frame passed to the last [`Ledscape::draw`] to be sent to every strip.
	pub fn wait(&self) -> Result<()> {
		self.wait_with(&WaitPolicy::unbounded())
	}

	/// [`Ledscape::wait`] with a timeout or cancellation. Giving up does not abort the transfer.
	pub fn wait_with(&self, policy: &WaitPolicy) -> Result<()> {
		self.handshake
			.wait_for_completion(&self.runtime, policy)
			.inspect_err(|err| warn!(%err, "waiting for the PRUs failed"))
	}

	/// Tells the PRU programs to halt, without waiting for them.
	pub fn abort(&mut self) {
		info!("aborting PRU programs");
		self.handshake.abort();
	}

	/// Halts the PRU programs and releases them.
	pub fn close(mut self) {
		self.shutdown();
	}

	fn shutdown(&mut self) {
		if self.contexts.is_empty() {
			return;
		}

		self.abort();
		for context in self.contexts.drain(..) {
			self.runtime.teardown(context);
		}
		info!("closed");
	}
}

impl<R: CoprocessorRuntime> Drop for Ledscape<R> {
	fn drop(&mut self) {
		self.shutdown();
	}
}

fn bring_up<R: CoprocessorRuntime>(
	runtime: &mut R,
	contexts: &[CoprocessorContext],
	layout: FrameLayout,
	num_pixels: u32,
	config: &Config,
) -> Result<(Handshake, FrameBuffer)> {
	// every PRU reads the frames from the DDR segment mapped for PRU 0
	let shared = &contexts[0];
	let frames = FrameBuffer::new(&shared.shared_memory, shared.shared_address, layout)?;

	let blocks = contexts
		.iter()
		.map(|context| {
			CommandBlock::new(context.unit, &context.data_memory).ok_or_else(|| RuntimeError::Unit {
				unit:    context.unit,
				message: format!("data memory of {} bytes can't hold a command block", context.data_memory.len()),
			})
		})
		.collect::<Result<Vec<_>, _>>()?;
	let mut handshake = Handshake::new(blocks);
	handshake.reset(num_pixels);

	for (bank, pins) in GPIO_BANKS.iter().enumerate() {
		for &pin in pins.iter() {
			trace!(bank, pin, "configuring output");
			runtime.configure_gpio(bank, pin, true, false)?;
		}
	}

	for (context, program) in contexts.iter().zip(&config.programs) {
		info!(unit = context.unit, "starting PRU with {}", program.display());
		runtime.start_program(context, program)?;
		handshake.wait_alive(context.unit, &config.startup)?;
		info!(unit = context.unit, "PRU ok");
	}

	Ok((handshake, frames))
}

/// Undoes a partial bring-up. Anything already started is told to halt first.
fn release<R: CoprocessorRuntime>(runtime: &mut R, contexts: Vec<CoprocessorContext>) {
	for context in contexts.into_iter().rev() {
		if let Some(mut block) = CommandBlock::new(context.unit, &context.data_memory) {
			block.send(COMMAND_ABORT);
		}
		runtime.teardown(context);
	}
}
