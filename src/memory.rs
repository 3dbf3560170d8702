use std::{
	ptr::NonNull,
	sync::atomic::{AtomicU32, Ordering},
};

/// A mapped window of memory that a PRU reads and writes concurrently with the host.
///
/// The memory itself belongs to the [`CoprocessorRuntime`](crate::runtime::CoprocessorRuntime),
/// this is only a view. Every access is bounds checked. Words are accessed as atomics so
/// that stores are never torn and the command handshake gets acquire/release ordering.
#[derive(Debug, Clone, Copy)]
pub struct MemoryRegion {
	ptr: NonNull<u8>,
	len: usize,
}

// The region only hands out volatile and atomic accesses, never references.
unsafe impl Send for MemoryRegion {}
unsafe impl Sync for MemoryRegion {}

impl MemoryRegion {
	/// # Safety
	///
	/// `ptr` must be valid for reads and writes of `len` bytes, aligned to 4 bytes, for as
	/// long as any copy of the returned view is used. Nothing else in the process may hold a
	/// Rust reference into that memory.
	pub unsafe fn from_raw_parts(ptr: *mut u8, len: usize) -> Option<Self> {
		let ptr = NonNull::new(ptr)?;
		if ptr.as_ptr() as usize % 4 != 0 {
			return None;
		}

		Some(Self { ptr, len })
	}

	pub fn len(&self) -> usize {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	pub fn subregion(&self, offset: usize, len: usize) -> Option<Self> {
		let end = offset.checked_add(len)?;
		if end > self.len {
			return None;
		}

		// SAFETY: in bounds of self, so the non-null pointer stays inside the mapping
		let ptr = unsafe { NonNull::new_unchecked(self.ptr.as_ptr().add(offset)) };
		Some(Self { ptr, len })
	}

	fn check(&self, offset: usize, len: usize) {
		assert!(
			offset.checked_add(len).is_some_and(|end| end <= self.len),
			"access of {len} bytes at {offset} outside region of {} bytes",
			self.len
		);
	}

	fn word(&self, offset: usize) -> &AtomicU32 {
		self.check(offset, 4);
		let ptr = unsafe { self.ptr.as_ptr().add(offset) };
		assert!(ptr as usize % 4 == 0, "unaligned word access at {offset}");
		// SAFETY: in bounds, aligned, and AtomicU32 has the layout of u32
		unsafe { &*(ptr as *const AtomicU32) }
	}

	pub fn load_u32(&self, offset: usize) -> u32 {
		self.word(offset).load(Ordering::Acquire)
	}

	pub fn store_u32(&self, offset: usize, value: u32) {
		self.word(offset).store(value, Ordering::Release)
	}

	pub fn read_u8(&self, offset: usize) -> u8 {
		self.check(offset, 1);
		unsafe { self.ptr.as_ptr().add(offset).read_volatile() }
	}

	pub fn write_u8(&self, offset: usize, value: u8) {
		self.check(offset, 1);
		unsafe { self.ptr.as_ptr().add(offset).write_volatile(value) }
	}

	pub fn read_bytes(&self, offset: usize, out: &mut [u8]) {
		self.check(offset, out.len());
		for (i, byte) in out.iter_mut().enumerate() {
			*byte = unsafe { self.ptr.as_ptr().add(offset + i).read_volatile() };
		}
	}

	pub fn write_bytes(&self, offset: usize, data: &[u8]) {
		self.check(offset, data.len());
		for (i, byte) in data.iter().enumerate() {
			unsafe { self.ptr.as_ptr().add(offset + i).write_volatile(*byte) };
		}
	}

	pub fn fill(&self, offset: usize, len: usize, value: u8) {
		self.check(offset, len);
		for i in 0..len {
			unsafe { self.ptr.as_ptr().add(offset + i).write_volatile(value) };
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn region(words: &mut [u32]) -> MemoryRegion {
		unsafe { MemoryRegion::from_raw_parts(words.as_mut_ptr().cast(), words.len() * 4).unwrap() }
	}

	#[test]
	fn words_and_bytes_share_memory() {
		let mut backing = [0u32; 4];
		let mem = region(&mut backing);

		mem.store_u32(4, 0x0403_0201);
		let mut bytes = [0u8; 4];
		mem.read_bytes(4, &mut bytes);
		assert_eq!(bytes, 0x0403_0201u32.to_ne_bytes());

		mem.write_u8(0, 0xff);
		assert_eq!(mem.read_u8(0), 0xff);
	}

	#[test]
	fn subregion_bounds() {
		let mut backing = [0u32; 4];
		let mem = region(&mut backing);

		let sub = mem.subregion(8, 8).unwrap();
		sub.store_u32(0, 7);
		assert_eq!(mem.load_u32(8), 7);
		assert!(mem.subregion(12, 8).is_none());
		assert!(mem.subregion(usize::MAX, 2).is_none());
	}

	#[test]
	#[should_panic]
	fn out_of_bounds_access_panics() {
		let mut backing = [0u32; 2];
		let mem = region(&mut backing);
		mem.load_u32(8);
	}

	#[test]
	fn rejects_null_and_unaligned() {
		let mut backing = [0u32; 2];
		let ptr: *mut u8 = backing.as_mut_ptr().cast();
		unsafe {
			assert!(MemoryRegion::from_raw_parts(std::ptr::null_mut(), 8).is_none());
			assert!(MemoryRegion::from_raw_parts(ptr.add(1), 4).is_none());
		}
	}
}
