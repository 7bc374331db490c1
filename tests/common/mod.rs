//! Simulated pointing rig shared by the integration tests.
//!
//! The camera renders the axis marker at the frame centre and the tip marker
//! on a circle around it. The tip bearing follows the last `SERVO_ANGLE_n`
//! written to the mock transport: bearing = angle - 90, so 90° points along
//! +x and larger angles rotate towards +y.

#![allow(dead_code)]

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use visual_servo::actuator::protocol::{servo_angle_digits, CENTER_ANGLE};
use visual_servo::actuator::ActuatorChannel;
use visual_servo::adapters::MockTransport;
use visual_servo::camera::FrameSource;
use visual_servo::clock::RecordingClock;
use visual_servo::config::MarkerSettings;
use visual_servo::dispatch::Dispatcher;
use visual_servo::error::AppResult;
use visual_servo::geometry::Point2D;
use visual_servo::servo::{AlignmentParams, ServoController};
use visual_servo::vision::MarkerDetector;

pub const WIDTH: u32 = 320;
pub const HEIGHT: u32 = 240;
pub const AXIS: Point2D = Point2D::new(160, 120);
pub const POINTER_LENGTH: f64 = 60.0;

/// Inside the default tip range (HSV ~[2, 135, 255]).
pub const TIP_COLOR: Rgb<u8> = Rgb([255, 130, 120]);
/// Inside the default axis range (HSV ~[41, 162, 220]).
pub const AXIS_COLOR: Rgb<u8> = Rgb([170, 220, 80]);

/// Frames showing the pointer at whatever angle was last commanded.
#[derive(Clone)]
pub struct SimulatedCamera {
    transport: MockTransport,
    blackout: Arc<AtomicUsize>,
    acquired: Arc<AtomicUsize>,
}

impl SimulatedCamera {
    pub fn new(transport: MockTransport) -> Self {
        Self {
            transport,
            blackout: Arc::new(AtomicUsize::new(0)),
            acquired: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The next `frames` acquisitions show no markers.
    pub fn black_out(&self, frames: usize) {
        self.blackout.store(frames, Ordering::SeqCst);
    }

    /// Frames handed out so far.
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Angle the simulated servo is sitting at.
    pub fn physical_angle(&self) -> u8 {
        self.transport
            .lines()
            .iter()
            .rev()
            .find_map(|line| servo_angle_digits(line).and_then(|d| d.parse().ok()))
            .unwrap_or(CENTER_ANGLE)
    }
}

#[async_trait]
impl FrameSource for SimulatedCamera {
    async fn acquire(&mut self) -> AppResult<RgbImage> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        let mut frame = RgbImage::new(WIDTH, HEIGHT);

        let dark = self
            .blackout
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !dark {
            paint_square(&mut frame, AXIS, AXIS_COLOR);
            paint_square(&mut frame, tip_position(self.physical_angle()), TIP_COLOR);
        }
        Ok(frame)
    }
}

/// Where the tip marker appears for a servo angle.
pub fn tip_position(angle: u8) -> Point2D {
    point_at_bearing(f64::from(angle) - 90.0, POINTER_LENGTH)
}

/// A pixel at `bearing_deg` from the axis, `radius` pixels away.
pub fn point_at_bearing(bearing_deg: f64, radius: f64) -> Point2D {
    let theta = bearing_deg.to_radians();
    Point2D::new(
        AXIS.x + (radius * theta.cos()).round() as i32,
        AXIS.y + (radius * theta.sin()).round() as i32,
    )
}

/// 9x9 square (81 px) centred on `center`.
pub fn paint_square(frame: &mut RgbImage, center: Point2D, color: Rgb<u8>) {
    for dy in -4..=4 {
        for dx in -4..=4 {
            let x = center.x + dx;
            let y = center.y + dy;
            if (0..WIDTH as i32).contains(&x) && (0..HEIGHT as i32).contains(&y) {
                frame.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

/// Everything a test needs to drive and inspect the rig.
pub struct Rig {
    pub dispatcher: Dispatcher,
    pub transport: MockTransport,
    pub camera: SimulatedCamera,
    pub clock: RecordingClock,
}

pub fn rig(params: AlignmentParams) -> Rig {
    rig_with(params, |servo| servo)
}

/// Rig with a hook to customise the servo controller.
pub fn rig_with(
    params: AlignmentParams,
    customize: impl FnOnce(ServoController) -> ServoController,
) -> Rig {
    let transport = MockTransport::new();
    let camera = SimulatedCamera::new(transport.clone());
    let clock = RecordingClock::new();
    let servo = customize(ServoController::new(
        Box::new(camera.clone()),
        MarkerDetector::from_settings(&MarkerSettings::default()),
        Arc::new(clock.clone()),
        params,
    ));
    let dispatcher = Dispatcher::new(
        ActuatorChannel::new(Box::new(transport.clone())),
        servo,
        Arc::new(clock.clone()),
    );
    Rig {
        dispatcher,
        transport,
        camera,
        clock,
    }
}

/// Lines starting with `SERVO_ANGLE_`.
pub fn angle_commands(transport: &MockTransport) -> Vec<u8> {
    transport
        .lines()
        .iter()
        .filter_map(|line| servo_angle_digits(line).and_then(|d| d.parse().ok()))
        .collect()
}
