/// A spectral value packed into the high 16 bits of its IEEE-754
/// single-precision representation.
///
/// Sign and exponent survive exactly; the mantissa keeps its 7 high bits.
/// Decoding zero-fills the discarded bits, so the round-trip is lossy
/// (magnitude never grows) with a relative error below 2^-7 of the value.
/// Not to be used where a bit-exact round-trip is required.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Tf16(u16);

impl Tf16 {
    pub fn from_f32(v: f32) -> Self {
        Tf16(truncate_f32_to_u16(v))
    }

    pub fn to_f32(&self) -> f32 {
        expand_u16_to_f32(self.0)
    }

    pub fn from_u16(u: u16) -> Self {
        Tf16(u)
    }

    pub fn to_u16(&self) -> u16 {
        self.0
    }
}

/// Keep sign, exponent and the 7 high mantissa bits of `v`.
pub fn truncate_f32_to_u16(v: f32) -> u16 {
    ((v.to_bits() & 0xffff_0000) >> 16) as u16
}

/// Zero-fill the 16 discarded mantissa bits.
pub fn expand_u16_to_f32(u: u16) -> f32 {
    f32::from_bits((u as u32) << 16)
}
