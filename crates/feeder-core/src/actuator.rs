//! Servo actuation and the dispense cycle.
//!
//! The [`Actuator`] trait is the only thing a platform has to provide to move
//! the feeder's servo. [`Dispenser`] adds everything else: the current
//! angle, smooth sweeps paced by the speed setting, immediate jumps, and the
//! busy flag that keeps manual jumps from interrupting a dispense cycle.

use embedded_hal::delay::DelayNs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Lowest servo angle.
pub const MIN_ANGLE: u8 = 0;

/// Highest servo angle.
pub const MAX_ANGLE: u8 = 180;

/// Lowest speed setting.
pub const MIN_SPEED: f32 = 1.0;

/// Highest speed setting.
pub const MAX_SPEED: f32 = 20.0;

/// Errors reported by a servo driver.
#[derive(Debug, Error)]
pub enum ActuatorError {
    /// The driver rejected or failed to apply a position.
    #[error("Failed to drive servo to {angle} degrees: {message}")]
    Drive { angle: u8, message: String },
}

/// A servo that can be commanded to an absolute angle.
///
/// `set_angle` is a blocking device-driver call.
pub trait Actuator: Send {
    fn set_angle(&mut self, angle: u8) -> Result<(), ActuatorError>;
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn set_angle(&mut self, angle: u8) -> Result<(), ActuatorError> {
        (**self).set_angle(angle)
    }
}

/// Map a speed setting in `1..=20` to a per-degree step delay.
///
/// The slider range is interpolated onto a real speed between 19.5 and 20.0,
/// inverted, scaled by ten and truncated. Speed 1 gives 5 ms per degree and
/// speed 20 gives 0 ms. The result never goes below zero.
pub fn speed_to_step_delay_ms(speed: f32) -> u32 {
    const REAL_MIN: f32 = 19.5;
    const REAL_MAX: f32 = 20.0;

    let normalized = (speed - MIN_SPEED) / (MAX_SPEED - MIN_SPEED);
    let real = REAL_MIN + normalized * (REAL_MAX - REAL_MIN);
    let delay = ((MAX_SPEED - real) * 10.0) as i32;
    delay.max(0) as u32
}

/// Shared "a dispense cycle is running" flag.
///
/// Cloning shares the same flag, so request handlers can check it without
/// access to the dispenser itself.
#[derive(Debug, Clone, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Mark busy until the returned guard is dropped.
    fn hold(&self) -> BusyGuard {
        self.0.store(true, Ordering::Release);
        BusyGuard(self.clone())
    }
}

struct BusyGuard(BusyFlag);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0 .0.store(false, Ordering::Release);
    }
}

/// Geometry and pacing of a dispense cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispenseProfile {
    /// Rest position ("empty" extreme).
    pub empty_angle: u8,
    /// Dispense position.
    pub dispense_angle: u8,
    /// Pause after each leg of the cycle.
    pub pause_ms: u32,
}

impl Default for DispenseProfile {
    fn default() -> Self {
        Self {
            empty_angle: MIN_ANGLE,
            dispense_angle: MAX_ANGLE,
            pause_ms: 50,
        }
    }
}

/// Drives the servo through sweeps, jumps, and dispense cycles.
pub struct Dispenser<A, D> {
    actuator: A,
    delay: D,
    profile: DispenseProfile,
    speed: f32,
    current_angle: u8,
    busy: BusyFlag,
}

impl<A: Actuator, D: DelayNs> Dispenser<A, D> {
    /// Create a dispenser and command the servo to the rest position.
    pub fn new(mut actuator: A, delay: D, profile: DispenseProfile) -> Result<Self, ActuatorError> {
        let start = profile.empty_angle.min(MAX_ANGLE);
        actuator.set_angle(start)?;
        Ok(Self {
            actuator,
            delay,
            profile,
            speed: MAX_SPEED,
            current_angle: start,
            busy: BusyFlag::new(),
        })
    }

    pub fn current_angle(&self) -> u8 {
        self.current_angle
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Set the sweep speed, clamped to `1..=20`.
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = crate::settings::clamp_speed(speed);
    }

    pub fn busy_flag(&self) -> BusyFlag {
        self.busy.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    /// Sweep one degree at a time, pausing per degree according to speed.
    pub fn move_smooth(&mut self, target: u8) -> Result<(), ActuatorError> {
        let target = target.min(MAX_ANGLE);
        if target == self.current_angle {
            return Ok(());
        }
        let step_delay = speed_to_step_delay_ms(self.speed);
        let path: Box<dyn Iterator<Item = u8>> = if target > self.current_angle {
            Box::new(self.current_angle + 1..=target)
        } else {
            Box::new((target..self.current_angle).rev())
        };
        for angle in path {
            self.actuator.set_angle(angle)?;
            self.current_angle = angle;
            self.delay.delay_ms(step_delay);
        }
        Ok(())
    }

    /// Move straight to the target angle.
    pub fn move_fast(&mut self, target: u8) -> Result<(), ActuatorError> {
        let target = target.min(MAX_ANGLE);
        self.actuator.set_angle(target)?;
        self.current_angle = target;
        Ok(())
    }

    /// Manual angle request. Ignored while a dispense cycle is running.
    ///
    /// Returns `Ok(false)` when the request was ignored.
    pub fn jump(&mut self, angle: i64) -> Result<bool, ActuatorError> {
        if self.is_busy() {
            warn!(angle, "Ignoring angle request while dispensing");
            return Ok(false);
        }
        let target = angle.clamp(i64::from(MIN_ANGLE), i64::from(MAX_ANGLE)) as u8;
        debug!(target, "Manual angle jump");
        self.move_fast(target)?;
        Ok(true)
    }

    /// Run `repeats` dispense cycles: empty, dispense, empty, each leg a
    /// smooth sweep followed by a short pause.
    ///
    /// Blocks until every cycle has finished.
    pub fn dispense(&mut self, repeats: u32) -> Result<(), ActuatorError> {
        let _busy = self.busy.hold();
        let DispenseProfile {
            empty_angle,
            dispense_angle,
            pause_ms,
        } = self.profile;

        info!(repeats, "Dispensing");
        for _ in 0..repeats {
            self.move_smooth(empty_angle)?;
            self.delay.delay_ms(pause_ms);
            self.move_smooth(dispense_angle)?;
            self.delay.delay_ms(pause_ms);
            self.move_smooth(empty_angle)?;
            self.delay.delay_ms(pause_ms);
        }
        Ok(())
    }
}

impl<A, D> std::fmt::Debug for Dispenser<A, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispenser")
            .field("profile", &self.profile)
            .field("speed", &self.speed)
            .field("current_angle", &self.current_angle)
            .field("busy", &self.busy.is_busy())
            .finish()
    }
}

/// Blocking delay backed by `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }
}

/// Actuator that records every commanded angle.
#[derive(Debug, Clone, Default)]
pub struct RecordingActuator {
    pub angles: Arc<std::sync::Mutex<Vec<u8>>>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every angle commanded so far.
    pub fn history(&self) -> Vec<u8> {
        self.angles.lock().map(|a| a.clone()).unwrap_or_default()
    }

    /// Number of times the servo reached `angle`.
    pub fn visits(&self, angle: u8) -> usize {
        self.history().iter().filter(|a| **a == angle).count()
    }
}

impl Actuator for RecordingActuator {
    fn set_angle(&mut self, angle: u8) -> Result<(), ActuatorError> {
        if let Ok(mut angles) = self.angles.lock() {
            angles.push(angle);
        }
        Ok(())
    }
}

/// Delay that returns immediately and adds up the requested time.
#[derive(Debug, Clone, Default)]
pub struct NoopDelay {
    pub total_ns: Arc<std::sync::atomic::AtomicU64>,
}

impl NoopDelay {
    pub fn total_ms(&self) -> u64 {
        self.total_ns.load(Ordering::Relaxed) / 1_000_000
    }
}

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns.fetch_add(u64::from(ns), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispenser() -> (Dispenser<RecordingActuator, NoopDelay>, RecordingActuator, NoopDelay) {
        let actuator = RecordingActuator::new();
        let delay = NoopDelay::default();
        let dispenser =
            Dispenser::new(actuator.clone(), delay.clone(), DispenseProfile::default()).unwrap();
        (dispenser, actuator, delay)
    }

    #[test]
    fn test_speed_mapping() {
        assert_eq!(speed_to_step_delay_ms(1.0), 5);
        assert_eq!(speed_to_step_delay_ms(10.0), 2);
        assert_eq!(speed_to_step_delay_ms(20.0), 0);
        assert_eq!(speed_to_step_delay_ms(40.0), 0);
        for speed in 1..=20 {
            assert!(speed_to_step_delay_ms(speed as f32) <= 5);
        }
    }

    #[test]
    fn test_smooth_sweep_visits_every_degree() {
        let (mut dispenser, actuator, _) = dispenser();
        dispenser.move_smooth(5).unwrap();
        dispenser.move_smooth(2).unwrap();

        assert_eq!(actuator.history(), vec![0, 1, 2, 3, 4, 5, 4, 3, 2]);
        assert_eq!(dispenser.current_angle(), 2);
    }

    #[test]
    fn test_sweep_paced_by_speed() {
        let (mut dispenser, _, delay) = dispenser();
        dispenser.set_speed(1.0);
        dispenser.move_smooth(100).unwrap();
        assert_eq!(delay.total_ms(), 500);
    }

    #[test]
    fn test_speed_is_clamped() {
        let (mut dispenser, _, _) = dispenser();
        dispenser.set_speed(0.0);
        assert_eq!(dispenser.speed(), 1.0);
        dispenser.set_speed(99.0);
        assert_eq!(dispenser.speed(), 20.0);
        dispenser.set_speed(f32::NAN);
        assert_eq!(dispenser.speed(), 20.0);
    }

    #[test]
    fn test_dispense_cycle_shape() {
        let (mut dispenser, actuator, delay) = dispenser();
        dispenser.dispense(2).unwrap();

        assert_eq!(actuator.visits(180), 2);
        assert_eq!(dispenser.current_angle(), 0);
        assert_eq!(delay.total_ms(), 6 * 50);
        assert!(!dispenser.is_busy());
    }

    /// Records whether the busy flag was set at every commanded angle.
    #[derive(Default)]
    struct FlagWatcher {
        flag: Arc<std::sync::Mutex<Option<BusyFlag>>>,
        seen: Arc<std::sync::Mutex<Vec<bool>>>,
    }

    impl Actuator for FlagWatcher {
        fn set_angle(&mut self, _angle: u8) -> Result<(), ActuatorError> {
            let busy = self.flag.lock().unwrap().as_ref().map(BusyFlag::is_busy);
            if let Some(busy) = busy {
                self.seen.lock().unwrap().push(busy);
            }
            Ok(())
        }
    }

    #[test]
    fn test_busy_while_dispensing() {
        let watcher = FlagWatcher::default();
        let (flag, seen) = (watcher.flag.clone(), watcher.seen.clone());
        let mut dispenser =
            Dispenser::new(watcher, NoopDelay::default(), DispenseProfile::default()).unwrap();
        *flag.lock().unwrap() = Some(dispenser.busy_flag());

        dispenser.dispense(1).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 360);
        assert!(seen.iter().all(|busy| *busy));
        assert!(!dispenser.is_busy());
    }

    #[test]
    fn test_jump_clamps_and_moves_immediately() {
        let (mut dispenser, actuator, _) = dispenser();
        assert!(dispenser.jump(400).unwrap());
        assert_eq!(actuator.history(), vec![0, 180]);

        assert!(dispenser.jump(-20).unwrap());
        assert_eq!(dispenser.current_angle(), 0);
    }

    #[test]
    fn test_jump_rejected_while_busy() {
        let (mut dispenser, actuator, _) = dispenser();
        let flag = dispenser.busy_flag();
        let _held = flag.hold();

        assert!(!dispenser.jump(90).unwrap());
        assert_eq!(actuator.history(), vec![0]);
    }
}
