//! Battery voltage monitoring.

use crate::config::BatteryCalibration;

/// A raw ADC channel wired to the battery divider.
pub trait BatterySensor: Send {
    /// One raw conversion, `0..=adc_full_scale`. `None` when the read failed.
    fn read_raw(&mut self) -> Option<u16>;
}

impl<B: BatterySensor + ?Sized> BatterySensor for Box<B> {
    fn read_raw(&mut self) -> Option<u16> {
        (**self).read_raw()
    }
}

/// A calibrated battery measurement.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BatteryReading {
    pub voltage: f32,
    /// `0.0..=100.0`.
    pub percent: f32,
}

impl BatteryCalibration {
    /// Convert an averaged raw reading to pack voltage.
    pub fn voltage(&self, raw: f32) -> f32 {
        let at_pin = raw / f32::from(self.adc_full_scale.max(1)) * self.reference_voltage;
        at_pin * self.divider_ratio * self.calibration_factor
    }

    /// Linear state of charge between the empty and full voltages.
    pub fn percent(&self, voltage: f32) -> f32 {
        let span = self.full_voltage - self.empty_voltage;
        if span <= 0.0 {
            return 0.0;
        }
        ((voltage - self.empty_voltage) / span * 100.0).clamp(0.0, 100.0)
    }

    pub fn reading(&self, raw: f32) -> BatteryReading {
        let voltage = self.voltage(raw);
        BatteryReading {
            voltage,
            percent: self.percent(voltage),
        }
    }
}

/// Averages several conversions per measurement.
#[derive(Debug)]
pub struct BatteryMonitor<B> {
    sensor: B,
    calibration: BatteryCalibration,
}

impl<B: BatterySensor> BatteryMonitor<B> {
    pub fn new(sensor: B, calibration: BatteryCalibration) -> Self {
        Self {
            sensor,
            calibration,
        }
    }

    /// Take a measurement. Failed conversions are skipped; returns `None`
    /// when every conversion failed.
    pub fn measure(&mut self) -> Option<BatteryReading> {
        let samples = self.calibration.samples.max(1);
        let (sum, count) = (0..samples)
            .filter_map(|_| self.sensor.read_raw())
            .fold((0u32, 0u32), |(sum, count), raw| (sum + u32::from(raw), count + 1));
        if count == 0 {
            tracing::warn!("Battery ADC returned no samples");
            return None;
        }
        Some(self.calibration.reading(sum as f32 / count as f32))
    }
}

/// A sensor that always reads the same value.
#[derive(Debug, Clone, Copy)]
pub struct FixedBattery(pub u16);

impl BatterySensor for FixedBattery {
    fn read_raw(&mut self) -> Option<u16> {
        Some(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn test_voltage_conversion() {
        let cal = BatteryCalibration::default();
        // Full scale at the pin: 3.3 V * 5.08 * 0.58
        assert!(close(cal.voltage(4095.0), 9.723));
        assert_eq!(cal.voltage(0.0), 0.0);
    }

    #[test]
    fn test_percent_is_clamped() {
        let cal = BatteryCalibration::default();
        assert_eq!(cal.percent(5.0), 0.0);
        assert_eq!(cal.percent(9.0), 100.0);
        assert!(close(cal.percent(7.5), 50.0));
    }

    #[test]
    fn test_measure_averages_and_skips_failures() {
        struct Flaky(u32);
        impl BatterySensor for Flaky {
            fn read_raw(&mut self) -> Option<u16> {
                self.0 += 1;
                if self.0 % 2 == 0 {
                    None
                } else {
                    Some(2000)
                }
            }
        }

        let cal = BatteryCalibration::default();
        let mut monitor = BatteryMonitor::new(Flaky(0), cal);
        let reading = monitor.measure().unwrap();
        assert!(close(reading.voltage, cal.voltage(2000.0)));
    }

    #[test]
    fn test_measure_with_dead_sensor() {
        struct Dead;
        impl BatterySensor for Dead {
            fn read_raw(&mut self) -> Option<u16> {
                None
            }
        }
        let mut monitor = BatteryMonitor::new(Dead, BatteryCalibration::default());
        assert_eq!(monitor.measure(), None);
    }
}
