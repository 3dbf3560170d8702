use std::{fmt, str::FromStr};

use bytemuck::{Pod, Zeroable};

use crate::{Error, Result};

/// One pixel as the PRU clocks it out: four byte slots, no padding.
///
/// Which color ends up in which slot is decided by the [`ChannelOrder`] used to write it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct Pixel {
	pub a: u8,
	pub b: u8,
	pub c: u8,
	pub d: u8,
}

impl Pixel {
	pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
		Self { a, b, c, d }
	}

	pub const fn to_bytes(self) -> [u8; 4] {
		[self.a, self.b, self.c, self.d]
	}

	pub const fn from_bytes(bytes: [u8; 4]) -> Self {
		Self::new(bytes[0], bytes[1], bytes[2], bytes[3])
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
	R,
	G,
	B,
	W,
}

use Channel::{B, G, R, W};

/// Assignment of the logical red, green, blue and white values to a pixel's slots.
///
/// The first six orders drive 3 channel strips and never touch slot `d`. The `*W`
/// orders are the old way of asking for a 4 channel strip: white goes into slot `c`
/// and the last named color into slot `d`. Their name is the 3 letter one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelOrder {
	Rgb,
	Rbg,
	Grb,
	Gbr,
	Bgr,
	Brg,

	Rgbw,
	Rbgw,
	Grbw,
	Gbrw,
	Bgrw,
	Brgw,

	Rgwb,
	Rbwg,
	Grwb,
	Gbwr,
	Bgwr,
	Brwg,

	Rwgb,
	Rwbg,
	Gwrb,
	Gwbr,
	Bwgr,
	Bwrg,

	Wrgb,
	Wrbg,
	Wgrb,
	Wgbr,
	Wbgr,
	Wbrg,
}

impl ChannelOrder {
	pub const ALL: [ChannelOrder; 30] = [
		Self::Rgb,
		Self::Rbg,
		Self::Grb,
		Self::Gbr,
		Self::Bgr,
		Self::Brg,
		Self::Rgbw,
		Self::Rbgw,
		Self::Grbw,
		Self::Gbrw,
		Self::Bgrw,
		Self::Brgw,
		Self::Rgwb,
		Self::Rbwg,
		Self::Grwb,
		Self::Gbwr,
		Self::Bgwr,
		Self::Brwg,
		Self::Rwgb,
		Self::Rwbg,
		Self::Gwrb,
		Self::Gwbr,
		Self::Bwgr,
		Self::Bwrg,
		Self::Wrgb,
		Self::Wrbg,
		Self::Wgrb,
		Self::Wgbr,
		Self::Wbgr,
		Self::Wbrg,
	];

	/// Case insensitive lookup, e.g. `"grbw"` or `"WBRG"`.
	pub fn parse(name: &str) -> Result<Self> {
		Self::ALL
			.into_iter()
			.find(|order| order.accepted_name().eq_ignore_ascii_case(name))
			.ok_or_else(|| Error::UnknownChannelOrder(name.to_string()))
	}

	/// Canonical name, always accepted by [`ChannelOrder::parse`].
	pub const fn name(self) -> &'static str {
		match self {
			Self::Rgb | Self::Rgbw => "RGB",
			Self::Rbg | Self::Rbgw => "RBG",
			Self::Grb | Self::Grbw => "GRB",
			Self::Gbr | Self::Gbrw => "GBR",
			Self::Bgr | Self::Bgrw => "BGR",
			Self::Brg | Self::Brgw => "BRG",
			_ => self.accepted_name(),
		}
	}

	const fn accepted_name(self) -> &'static str {
		match self {
			Self::Rgb => "RGB",
			Self::Rbg => "RBG",
			Self::Grb => "GRB",
			Self::Gbr => "GBR",
			Self::Bgr => "BGR",
			Self::Brg => "BRG",
			Self::Rgbw => "RGBW",
			Self::Rbgw => "RBGW",
			Self::Grbw => "GRBW",
			Self::Gbrw => "GBRW",
			Self::Bgrw => "BGRW",
			Self::Brgw => "BRGW",
			Self::Rgwb => "RGWB",
			Self::Rbwg => "RBWG",
			Self::Grwb => "GRWB",
			Self::Gbwr => "GBWR",
			Self::Bgwr => "BGWR",
			Self::Brwg => "BRWG",
			Self::Rwgb => "RWGB",
			Self::Rwbg => "RWBG",
			Self::Gwrb => "GWRB",
			Self::Gwbr => "GWBR",
			Self::Bwgr => "BWGR",
			Self::Bwrg => "BWRG",
			Self::Wrgb => "WRGB",
			Self::Wrbg => "WRBG",
			Self::Wgrb => "WGRB",
			Self::Wgbr => "WGBR",
			Self::Wbgr => "WBGR",
			Self::Wbrg => "WBRG",
		}
	}

	/// Source channel of each slot. `None` leaves the slot alone.
	const fn slots(self) -> [Option<Channel>; 4] {
		match self {
			Self::Rgb => [Some(R), Some(G), Some(B), None],
			Self::Rbg => [Some(R), Some(B), Some(G), None],
			Self::Grb => [Some(G), Some(R), Some(B), None],
			Self::Gbr => [Some(G), Some(B), Some(R), None],
			Self::Bgr => [Some(B), Some(G), Some(R), None],
			Self::Brg => [Some(B), Some(R), Some(G), None],

			Self::Rgbw | Self::Rgwb => [Some(R), Some(G), Some(W), Some(B)],
			Self::Rbgw | Self::Rbwg => [Some(R), Some(B), Some(W), Some(G)],
			Self::Grbw | Self::Grwb => [Some(G), Some(R), Some(W), Some(B)],
			Self::Gbrw | Self::Gbwr => [Some(G), Some(B), Some(W), Some(R)],
			Self::Bgrw | Self::Bgwr => [Some(B), Some(G), Some(W), Some(R)],
			Self::Brgw | Self::Brwg => [Some(B), Some(R), Some(W), Some(G)],

			Self::Rwgb => [Some(R), Some(W), Some(G), Some(B)],
			Self::Rwbg => [Some(R), Some(W), Some(B), Some(G)],
			Self::Gwrb => [Some(G), Some(W), Some(R), Some(B)],
			Self::Gwbr => [Some(G), Some(W), Some(B), Some(R)],
			Self::Bwgr => [Some(B), Some(W), Some(G), Some(R)],
			Self::Bwrg => [Some(B), Some(W), Some(R), Some(G)],

			Self::Wrgb => [Some(W), Some(R), Some(G), Some(B)],
			Self::Wrbg => [Some(W), Some(R), Some(B), Some(G)],
			Self::Wgrb => [Some(W), Some(G), Some(R), Some(B)],
			Self::Wgbr => [Some(W), Some(G), Some(B), Some(R)],
			Self::Wbgr => [Some(W), Some(B), Some(G), Some(R)],
			Self::Wbrg => [Some(W), Some(B), Some(R), Some(G)],
		}
	}

	/// Whether the white value is emitted at all.
	pub const fn has_white(self) -> bool {
		self.slots()[3].is_some()
	}

	/// Encodes a color into a pixel. Slots unused by this order keep their value from `prior`.
	pub fn encode(self, prior: Pixel, r: u8, g: u8, b: u8, w: u8) -> Pixel {
		let value = |slot: Option<Channel>, old: u8| match slot {
			Some(R) => r,
			Some(G) => g,
			Some(B) => b,
			Some(W) => w,
			None => old,
		};

		let [sa, sb, sc, sd] = self.slots();
		Pixel {
			a: value(sa, prior.a),
			b: value(sb, prior.b),
			c: value(sc, prior.c),
			d: value(sd, prior.d),
		}
	}

	pub fn write(self, pixel: &mut Pixel, r: u8, g: u8, b: u8, w: u8) {
		*pixel = self.encode(*pixel, r, g, b, w);
	}
}

impl FromStr for ChannelOrder {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		Self::parse(s)
	}
}

impl fmt::Display for ChannelOrder {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}
