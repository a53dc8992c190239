//! Virtual instrument simulator
//!
//! Generates the spectrometer's console output without hardware: seeded
//! Gaussian-peak spectra rendered as the full measurement cycle text
//! (markers, 16-byte-wide hex dump, CSV block). Tests and the bench feed
//! this through the capture engine; chunk boundaries are then chosen by the
//! caller, not the generator.

use crate::core::codec;
use crate::core::protocol::{
    CSV_END, CSV_HEADER, CSV_START, HEX_END, HEX_START, MEASUREMENT_END, MEASUREMENT_START,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Header bytes preceding pixel data in the raw measurement buffer.
const MEASUREMENT_HEADER: [u8; 10] = [0x20, 0x00, 0x0A, 0x10, 0x00, 0x00, 0x00, 0x00, 0xFF, 0x00];

/// Deterministic spectrometer output generator.
pub struct InstrumentSimulator {
    num_pixels: usize,
    rng: StdRng,
    measurement_count: u32,
}

impl InstrumentSimulator {
    /// Create a simulator with the standard 2048-pixel detector.
    pub fn new(seed: u64) -> Self {
        Self {
            num_pixels: 2048,
            rng: StdRng::seed_from_u64(seed),
            measurement_count: 0,
        }
    }

    /// Override the detector width.
    #[must_use]
    pub fn num_pixels(mut self, n: usize) -> Self {
        self.num_pixels = n;
        self
    }

    /// Generate a spectrum with a Gaussian peak over a noisy baseline.
    pub fn gaussian_peak(&mut self, center: usize, width: f64, amplitude: f64) -> Vec<u16> {
        let baseline = 1000.0;
        (0..self.num_pixels)
            .map(|pixel| {
                let d = pixel as f64 - center as f64;
                let gaussian = amplitude * (-(d * d) / (2.0 * width * width)).exp();
                let noise = self.rng.gen_range(-50.0..50.0);
                (baseline + gaussian + noise).clamp(0.0, 65535.0) as u16
            })
            .collect()
    }

    /// Serialize a spectrum into the raw measurement buffer: header bytes
    /// followed by little-endian 16-bit intensities.
    pub fn raw_buffer(intensities: &[u16]) -> Vec<u8> {
        let mut bytes = MEASUREMENT_HEADER.to_vec();
        for &v in intensities {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes
    }

    /// Render one complete measurement cycle as console text.
    pub fn measurement_cycle(&mut self) -> String {
        self.measurement_count += 1;
        let center = 1024 + (self.measurement_count as usize * 50) % 500;
        let intensities = self.gaussian_peak(center, 100.0, 45000.0);

        let mut out = String::new();
        out.push_str(&format!(
            "{MEASUREMENT_START} #{}\n",
            self.measurement_count
        ));
        out.push_str(&format!("{HEX_START}...\n"));
        for line in codec::hex_dump(&Self::raw_buffer(&intensities)) {
            out.push_str(&line);
            out.push('\n');
        }
        out.push_str(&format!("{HEX_END}.\n"));
        out.push_str(&format!("{CSV_START}\n"));
        out.push_str(&format!("{CSV_HEADER}\n"));
        for (pixel, intensity) in intensities.iter().enumerate() {
            out.push_str(&format!("{pixel},{intensity}\n"));
        }
        out.push_str(&format!("{CSV_END}\n"));
        out.push_str(&format!("{MEASUREMENT_END}!\n"));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::{HEX_LINES_PER_MEASUREMENT, MEASUREMENT_BYTES};

    #[test]
    fn test_seeded_output_is_deterministic() {
        let mut a = InstrumentSimulator::new(42);
        let mut b = InstrumentSimulator::new(42);
        assert_eq!(a.measurement_cycle(), b.measurement_cycle());
    }

    #[test]
    fn test_raw_buffer_size() {
        let mut sim = InstrumentSimulator::new(1);
        let spectrum = sim.gaussian_peak(1024, 100.0, 45000.0);
        let buffer = InstrumentSimulator::raw_buffer(&spectrum);
        assert_eq!(buffer.len(), MEASUREMENT_BYTES);
        assert_eq!(codec::hex_dump(&buffer).len(), HEX_LINES_PER_MEASUREMENT);
    }

    #[test]
    fn test_cycle_contains_all_markers() {
        let cycle = InstrumentSimulator::new(7).measurement_cycle();
        for marker in [
            "Starting Measurement",
            "Reading full 4106-byte measurement",
            "Full 4106 bytes received",
            "CSV DATA OUTPUT:",
            "Pixel,Intensity",
            "END CSV DATA",
            "Measurement Complete",
        ] {
            assert!(cycle.contains(marker), "missing marker: {marker}");
        }
    }
}
