use std::marker::PhantomData;

use bytemuck::cast;
use ledscape_shared::{BYTES_PER_PIXEL, FRAME_SLOTS, MAX_STRIPS};

use crate::{
	color::{ChannelOrder, Pixel},
	error::check_index,
	memory::MemoryRegion,
	Error,
	Result,
};

/// Geometry of one frame.
///
/// Frames are "strip-major": the pixels of all strips at the same position are adjacent,
/// which lets the PRUs read a whole row from DDR in one burst. The PRU programs always
/// stride rows by [`MAX_STRIPS`], `strips` only limits which of them can be addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
	num_pixels: usize,
	strips:     usize,
}

impl FrameLayout {
	pub fn new(num_pixels: usize, strips: usize) -> Result<Self> {
		if num_pixels == 0 {
			return Err(Error::InvalidConfig("num_pixels must be at least 1".into()));
		}
		if strips == 0 || strips > MAX_STRIPS {
			return Err(Error::InvalidConfig(format!("strips must be in 1..={MAX_STRIPS}, got {strips}")));
		}
		num_pixels
			.checked_mul(MAX_STRIPS * BYTES_PER_PIXEL * FRAME_SLOTS)
			.ok_or_else(|| Error::InvalidConfig(format!("{num_pixels} pixels per strip overflow the frame size")))?;

		Ok(Self { num_pixels, strips })
	}

	pub fn num_pixels(&self) -> usize {
		self.num_pixels
	}

	pub fn strips(&self) -> usize {
		self.strips
	}

	pub fn row_size(&self) -> usize {
		MAX_STRIPS * BYTES_PER_PIXEL
	}

	pub fn frame_size(&self) -> usize {
		self.num_pixels * self.row_size()
	}

	/// Bytes needed for both frame slots.
	pub fn buffer_size(&self) -> usize {
		self.frame_size() * FRAME_SLOTS
	}

	pub fn frame_offset(&self, slot: usize) -> Result<usize> {
		check_index("frame slot", slot, FRAME_SLOTS)?;
		Ok(slot * self.frame_size())
	}

	/// Byte offset of a pixel within its frame.
	pub fn pixel_offset(&self, row: usize, strip: usize) -> Result<usize> {
		check_index("pixel", row, self.num_pixels)?;
		check_index("strip", strip, self.strips)?;
		Ok(row * self.row_size() + strip * BYTES_PER_PIXEL)
	}
}

/// The two frame slots in the DDR segment shared with the PRUs, slot 1 right after slot 0.
#[derive(Debug)]
pub struct FrameBuffer {
	mem:     MemoryRegion,
	address: u32,
	layout:  FrameLayout,
}

impl FrameBuffer {
	/// `address` is where `shared` starts as seen by the PRUs.
	pub fn new(shared: &MemoryRegion, address: u32, layout: FrameLayout) -> Result<Self> {
		let mem = shared.subregion(0, layout.buffer_size()).ok_or(Error::InsufficientMemory {
			frame_size: layout.frame_size(),
			available:  shared.len(),
		})?;

		let end = u32::try_from(layout.buffer_size())
			.ok()
			.and_then(|size| address.checked_add(size));
		if end.is_none() {
			return Err(Error::InvalidConfig(format!(
				"frame buffer of {} bytes at {address:#010x} exceeds the PRU address space",
				layout.buffer_size()
			)));
		}

		Ok(Self { mem, address, layout })
	}

	pub fn layout(&self) -> FrameLayout {
		self.layout
	}

	/// Address of a frame slot as the PRUs see it.
	pub fn frame_address(&self, slot: usize) -> Result<u32> {
		let offset = self.layout.frame_offset(slot)?;
		// fits, checked in new
		Ok(self.address + offset as u32)
	}

	pub fn frame(&mut self, slot: usize) -> Result<Frame<'_>> {
		let offset = self.layout.frame_offset(slot)?;
		let mem = self
			.mem
			.subregion(offset, self.layout.frame_size())
			.ok_or(Error::OutOfRange {
				what:  "frame slot",
				index: slot,
				limit: FRAME_SLOTS,
			})?;

		Ok(Frame {
			mem,
			slot,
			offset,
			address: self.frame_address(slot)?,
			layout: self.layout,
			_buffer: PhantomData,
		})
	}
}

/// Mutable view of one frame slot.
///
/// Don't write a slot between [`Ledscape::draw`](crate::Ledscape::draw) and the matching
/// [`Ledscape::wait`](crate::Ledscape::wait), the PRUs are reading it.
#[derive(Debug)]
pub struct Frame<'a> {
	mem:     MemoryRegion,
	slot:    usize,
	offset:  usize,
	address: u32,
	layout:  FrameLayout,
	_buffer: PhantomData<&'a mut FrameBuffer>,
}

impl Frame<'_> {
	pub fn slot(&self) -> usize {
		self.slot
	}

	/// Offset of this frame from the start of the shared memory.
	pub fn offset(&self) -> usize {
		self.offset
	}

	pub fn device_address(&self) -> u32 {
		self.address
	}

	pub fn layout(&self) -> FrameLayout {
		self.layout
	}

	pub fn pixel(&self, row: usize, strip: usize) -> Result<Pixel> {
		let offset = self.layout.pixel_offset(row, strip)?;
		Ok(cast(self.mem.load_u32(offset)))
	}

	/// Stores all four slots with a single word write.
	pub fn put_pixel(&mut self, row: usize, strip: usize, pixel: Pixel) -> Result<()> {
		let offset = self.layout.pixel_offset(row, strip)?;
		self.mem.store_u32(offset, cast(pixel));
		Ok(())
	}

	#[allow(clippy::too_many_arguments)]
	pub fn set_pixel(
		&mut self,
		row: usize,
		strip: usize,
		order: ChannelOrder,
		r: u8,
		g: u8,
		b: u8,
		w: u8,
	) -> Result<()> {
		let prior = self.pixel(row, strip)?;
		self.put_pixel(row, strip, order.encode(prior, r, g, b, w))
	}

	pub fn fill(&mut self, order: ChannelOrder, r: u8, g: u8, b: u8, w: u8) {
		for row in 0..self.layout.num_pixels {
			for strip in 0..self.layout.strips {
				let offset = row * self.layout.row_size() + strip * BYTES_PER_PIXEL;
				let pixel = order.encode(cast(self.mem.load_u32(offset)), r, g, b, w);
				self.mem.store_u32(offset, cast(pixel));
			}
		}
	}

	pub fn clear(&mut self) {
		self.mem.fill(0, self.mem.len(), 0);
	}

	pub fn to_vec(&self) -> Vec<u8> {
		let mut bytes = vec![0; self.mem.len()];
		self.mem.read_bytes(0, &mut bytes);
		bytes
	}
}
