//! G.711 mu-law companding.
//!
//! Encoding follows the classic 16-bit formulation (bias 0x84, clip 32635), so
//! any standard mu-law decoder on the listener side reproduces our samples.

const BIAS: i32 = 0x84;
const CLIP: i32 = 32_635;

/// Quantize a float sample to signed 16-bit PCM.
///
/// Input is clamped to [-1, 1] first. Negative values scale by 32768 and
/// non-negative values by 32767 so both ends of the i16 range are reachable.
pub fn quantize_i16(sample: f32) -> i16 {
    // NaN clamps to NaN; treat it as silence.
    let x = if sample.is_nan() {
        0.0
    } else {
        sample.clamp(-1.0, 1.0)
    };
    let scaled = if x < 0.0 { x * 32_768.0 } else { x * 32_767.0 };
    scaled.round() as i16
}

/// Encode one 16-bit PCM sample to a mu-law byte.
pub fn linear_to_mulaw(sample: i16) -> u8 {
    let mut linear = i32::from(sample);
    let sign = (linear >> 8) & 0x80;
    if sign != 0 {
        linear = -linear;
    }
    linear = linear.min(CLIP) + BIAS;

    let mut exponent = 7;
    let mut mask = 0x4000;
    while exponent > 0 && linear & mask == 0 {
        exponent -= 1;
        mask >>= 1;
    }
    let mantissa = (linear >> (exponent + 3)) & 0x0F;
    !((sign | (exponent << 4) | mantissa) as u8)
}

/// Expand one mu-law byte back to 16-bit PCM.
pub fn mulaw_to_linear(byte: u8) -> i16 {
    let byte = !byte;
    let sign = byte & 0x80;
    let exponent = i32::from((byte >> 4) & 0x07);
    let mantissa = i32::from(byte & 0x0F);
    let magnitude = (((mantissa << 3) + BIAS) << exponent) - BIAS;
    if sign != 0 {
        -magnitude as i16
    } else {
        magnitude as i16
    }
}

/// Quantize and encode a block of float samples.
pub fn encode(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len());
    encode_into(samples, &mut out);
    out
}

/// Append the encoding of `samples` to `out`.
pub fn encode_into(samples: &[f32], out: &mut Vec<u8>) {
    out.extend(
        samples
            .iter()
            .map(|&sample| linear_to_mulaw(quantize_i16(sample))),
    );
}

pub fn decode(bytes: &[u8]) -> Vec<i16> {
    bytes.iter().map(|&byte| mulaw_to_linear(byte)).collect()
}
