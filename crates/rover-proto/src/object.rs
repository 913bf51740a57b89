use serde::{Deserialize, Serialize};

use crate::error::{CapacityExceeded, ProtoError};

/// Most objects a single sweep may report.
pub const SCAN_CAPACITY: usize = 15;

/// Angles are servo degrees, 0..180.
pub const SWEEP_DEGREES: u16 = 180;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub id: u8,
    pub start_angle: u8,
    pub end_angle: u8,
    pub distance_cm: u16,
}

impl DetectedObject {
    pub fn new(id: u8, start_angle: u8, end_angle: u8, distance_cm: u16) -> Result<Self, ProtoError> {
        if u16::from(end_angle) >= SWEEP_DEGREES {
            return Err(ProtoError::AngleOutOfRange(end_angle.into()));
        }
        if start_angle > end_angle {
            return Err(ProtoError::InvertedSpan { start: start_angle, end: end_angle });
        }
        Ok(Self { id, start_angle, end_angle, distance_cm })
    }

    /// Angular width in degrees.
    pub fn size_deg(&self) -> u8 {
        self.end_angle - self.start_angle
    }

    pub fn center_angle(&self) -> u8 {
        ((u16::from(self.start_angle) + u16::from(self.end_angle)) / 2) as u8
    }

    /// Chord width at the measured distance.
    pub fn size_cm(&self) -> f32 {
        let half = (self.size_deg() as f32).to_radians() / 2.0;
        2.0 * self.distance_cm as f32 * half.tan()
    }
}

/// Objects of one sweep, in the order they were closed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    objects: Vec<DetectedObject>,
}

impl ScanResult {
    pub fn new() -> Self {
        Self { objects: Vec::with_capacity(SCAN_CAPACITY) }
    }

    pub fn try_push(&mut self, obj: DetectedObject) -> Result<(), CapacityExceeded> {
        if self.objects.len() >= SCAN_CAPACITY {
            return Err(CapacityExceeded { what: "scan result", capacity: SCAN_CAPACITY });
        }
        self.objects.push(obj);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DetectedObject> {
        self.objects.iter()
    }

    pub fn as_slice(&self) -> &[DetectedObject] {
        &self.objects
    }
}

impl<'a> IntoIterator for &'a ScanResult {
    type Item = &'a DetectedObject;
    type IntoIter = std::slice::Iter<'a, DetectedObject>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.iter()
    }
}
