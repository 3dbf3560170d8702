#![no_std]

/// Strips clocked out per row. The PRU programs stride rows by this many pixels.
pub const MAX_STRIPS: usize = 48;
pub const BYTES_PER_PIXEL: usize = 4;

/// Frames kept in the shared DDR segment.
pub const FRAME_SLOTS: usize = 2;

pub const COMMAND_IDLE: u32 = 0;
pub const COMMAND_START: u32 = 1;
pub const COMMAND_ABORT: u32 = 0xFF;

// Command block as laid out at the start of each PRU's data RAM. Packed, no padding.
// `frame_address` is a PRU (32 bit) pointer into the shared DDR segment.
pub const COMMAND_FRAME_ADDRESS_OFFSET: usize = 0;
pub const COMMAND_NUM_PIXELS_OFFSET: usize = 4;
pub const COMMAND_COMMAND_OFFSET: usize = 8;
pub const COMMAND_RESPONSE_OFFSET: usize = 12;
pub const COMMAND_BLOCK_SIZE: usize = 16;

/// Data RAM of a single PRU.
pub const PRU_DATA_RAM_SIZE: usize = 8 * 1024;
/// Size of the DDR segment uio_pruss hands out by default.
pub const DEFAULT_SHARED_MEMORY_SIZE: usize = 0x40000;

// GPIO pins driven by the PRU programs, per GPIO bank. The device tree does not
// reliably configure these as outputs, so the host does it before starting the PRUs.
// Must match the pin mapping in ws281x.p.
pub const GPIO_BANK_0: &[u8] = &[2, 3, 7, 8, 9, 10, 11, 14, 20, 22, 23, 26, 27, 30, 31];
pub const GPIO_BANK_1: &[u8] = &[12, 13, 14, 15, 16, 17, 18, 19, 28, 29];
pub const GPIO_BANK_2: &[u8] = &[
	1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 22, 23, 24, 25,
];
pub const GPIO_BANK_3: &[u8] = &[14, 15, 16, 17, 19, 21];

pub const GPIO_BANKS: [&[u8]; 4] = [GPIO_BANK_0, GPIO_BANK_1, GPIO_BANK_2, GPIO_BANK_3];
