//! Sensor response model for the simulated camera.
//!
//! Each pixel integrates photo-electrons and dark current over the exposure,
//! gets Gaussian shot noise (variance equal to the signal) and Gaussian read
//! noise, is converted to ADU through the conversion gain and sits on a fixed
//! bias offset. Values clip at the ADC range. This gives the linear
//! variance-vs-mean relationship that a photon transfer curve measures.

use serde::{Deserialize, Serialize};

use super::rng::MockRng;

/// Electrical characteristics of the simulated sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorModel {
    /// Offset added to every pixel, in ADU
    pub bias_adu: f64,
    /// Conversion gain, electrons per ADU
    pub gain_e_per_adu: f64,
    /// Read noise RMS, electrons
    pub read_noise_e: f64,
    /// Dark current, electrons per pixel per second
    pub dark_current_e_per_s: f64,
    /// Photon flux reaching each pixel when the light path is open, electrons per second
    pub photon_flux_e_per_s: f64,
    /// ADC resolution
    pub bit_depth: u32,
}

impl Default for SensorModel {
    fn default() -> Self {
        Self {
            bias_adu: 100.0,
            gain_e_per_adu: 2.0,
            read_noise_e: 3.0,
            dark_current_e_per_s: 0.5,
            photon_flux_e_per_s: 200.0,
            bit_depth: 16,
        }
    }
}

impl SensorModel {
    /// Largest value the ADC can report.
    pub fn adc_max(&self) -> f64 {
        ((1u64 << self.bit_depth.clamp(1, 16)) - 1) as f64
    }

    /// Expected electrons collected per pixel during `exposure_s`.
    pub fn expected_electrons(&self, exposure_s: f64, illuminated: bool) -> f64 {
        let photons = if illuminated {
            self.photon_flux_e_per_s * exposure_s
        } else {
            0.0
        };
        photons + self.dark_current_e_per_s * exposure_s
    }

    /// Expected pixel value in ADU (before clipping).
    pub fn expected_adu(&self, exposure_s: f64, illuminated: bool) -> f64 {
        self.bias_adu + self.expected_electrons(exposure_s, illuminated) / self.gain_e_per_adu
    }

    /// Synthesize one frame worth of pixels.
    pub fn expose(
        &self,
        rng: &mut MockRng,
        pixel_count: usize,
        exposure_s: f64,
        illuminated: bool,
    ) -> Vec<u16> {
        let electrons = self.expected_electrons(exposure_s, illuminated);
        let sigma_e = (electrons + self.read_noise_e * self.read_noise_e).sqrt();
        let adc_max = self.adc_max();

        (0..pixel_count)
            .map(|_| {
                let collected = rng.normal(electrons, sigma_e);
                let adu = self.bias_adu + collected / self.gain_e_per_adu;
                adu.round().clamp(0.0, adc_max) as u16
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dark_frames_sit_on_bias() {
        let model = SensorModel {
            dark_current_e_per_s: 0.0,
            ..Default::default()
        };
        let mut rng = MockRng::new(Some(3));
        let pixels = model.expose(&mut rng, 10_000, 1.0, false);
        let mean = pixels.iter().map(|&p| p as f64).sum::<f64>() / pixels.len() as f64;
        assert!((mean - model.bias_adu).abs() < 0.5, "mean {mean}");
    }

    #[test]
    fn signal_scales_with_exposure() {
        let model = SensorModel::default();
        let short = model.expected_adu(1.0, true);
        let long = model.expected_adu(4.0, true);
        let signal_short = short - model.bias_adu;
        let signal_long = long - model.bias_adu;
        assert!((signal_long / signal_short - 4.0).abs() < 1e-12);
    }

    #[test]
    fn saturates_at_adc_max() {
        let model = SensorModel {
            photon_flux_e_per_s: 1.0e9,
            ..Default::default()
        };
        let mut rng = MockRng::new(Some(9));
        let pixels = model.expose(&mut rng, 16, 1.0, true);
        assert!(pixels.iter().all(|&p| p == u16::MAX));
    }
}
