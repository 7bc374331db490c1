//! Closed-loop visual servoing of a single-axis pointer.
//!
//! Two colored markers sit on the pointer: one on the pivot (`axis`) and one
//! at the end (`tip`). The servo loop watches both through a camera and turns
//! the bearing error between "where the pointer points" and "where the target
//! is" into proportional angle commands for a serial servo board.
//!
//! Around that loop sits a small command interpreter: a JSON batch of discrete
//! board commands, open-loop angles and visual-point requests is decoded and
//! executed in order with per-record delays.
//!
//! Layout, leaves first:
//! - [`vision`]: HSV conversion and marker detection
//! - [`geometry`]: pixel points and bearings
//! - [`adapters`]: line transports (serial, mock)
//! - [`actuator`]: the command channel and authoritative servo state
//! - [`servo`]: the feedback loop
//! - [`command`], [`dispatch`], [`session`]: batch decoding and execution

pub mod actuator;
pub mod adapters;
pub mod calibration;
pub mod camera;
pub mod clock;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod geometry;
pub mod servo;
pub mod session;
pub mod vision;
