//! Turns one sweep into a list of objects.
//!
//! A run of consecutive qualifying samples is an object. Runs are numbered as
//! they open, whether or not they are later wide enough to report, so ids in a
//! scan result can skip values.
//!
//! A run still open when the sweep ends is closed on the last sample, except
//! one opened on the last sample itself: that one has no extent and is dropped.
//! This deliberately keeps runs touching the far edge of the sweep instead of
//! discarding every run still open at 179 degrees, so an obstacle filling the
//! whole view is reported as one object spanning 1..179.

use rover_proto::{CapacityExceeded, DetectedObject, ScanMode, ScanResult, SCAN_CAPACITY};
use tracing::{debug, warn};

use crate::scanner::SensorSample;

/// Both rangers must read below this in a full sweep.
pub const FULL_THRESHOLD_CM: u16 = 90;
/// The IR-only sweep is calibrated further out.
pub const FAST_THRESHOLD_CM: u16 = 150;
/// Runs must be strictly wider than this, in degrees.
pub const MIN_WIDTH_DEG: u8 = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segmentation {
    pub objects: ScanResult,
    /// Angle of a run opened on the final sample. It is never reported.
    pub dangling_start: Option<u8>,
    /// Runs that closed too narrow to report.
    pub discarded: usize,
    pub overflow: Option<CapacityExceeded>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectSegmenter {
    pub threshold_cm: u16,
    pub min_width_deg: u8,
}

impl ObjectSegmenter {
    pub fn for_mode(mode: ScanMode) -> Self {
        let threshold_cm = match mode {
            ScanMode::Full => FULL_THRESHOLD_CM,
            ScanMode::Fast => FAST_THRESHOLD_CM,
        };
        Self { threshold_cm, min_width_deg: MIN_WIDTH_DEG }
    }

    pub fn segment(&self, samples: &[SensorSample]) -> Segmentation {
        let mut out = Segmentation::default();
        let mut next_id: u8 = 0;
        // (id, start index) of the run the previous sample belongs to
        let mut open: Option<(u8, usize)> = None;

        // index 0 only ever serves as the "previous" sample
        for j in 1..samples.len() {
            let sample = &samples[j];
            if sample.reading.below(self.threshold_cm) {
                if open.is_none() {
                    if usize::from(next_id) >= SCAN_CAPACITY {
                        let err = CapacityExceeded { what: "scan result", capacity: SCAN_CAPACITY };
                        warn!(angle = sample.angle, "segmentation stopped: {}", err);
                        out.overflow = Some(err);
                        return out;
                    }
                    next_id += 1;
                    open = Some((next_id, j));
                }
            } else if let Some((id, start)) = open.take() {
                self.close(samples, id, start, j - 1, &mut out);
            }
        }

        if let Some((id, start)) = open {
            let last = samples.len() - 1;
            if start == last {
                debug!(id, angle = samples[start].angle, "run opened on the last sample, dropped");
                out.dangling_start = Some(samples[start].angle);
            } else {
                self.close(samples, id, start, last, &mut out);
            }
        }
        out
    }

    fn close(&self, samples: &[SensorSample], id: u8, start: usize, end: usize, out: &mut Segmentation) {
        let (start_angle, end_angle) = (samples[start].angle, samples[end].angle);
        let width = end_angle.saturating_sub(start_angle);
        if width <= self.min_width_deg {
            out.discarded += 1;
            return;
        }
        let center = (start + end) / 2;
        let distance_cm = samples[center].distance_cm();
        match DetectedObject::new(id, start_angle, end_angle, distance_cm) {
            Ok(obj) => {
                debug!(id, start_angle, end_angle, distance_cm, "object");
                if let Err(e) = out.objects.try_push(obj) {
                    warn!("{}", e);
                    out.overflow = Some(e);
                }
            }
            Err(e) => warn!(id, "skipping run: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{Reading, SWEEP_LEN};

    fn fast_sweep(f: impl Fn(u8) -> u16) -> Vec<SensorSample> {
        (0..SWEEP_LEN as u8).map(|a| SensorSample { angle: a, reading: Reading::Ir(f(a)) }).collect()
    }

    fn full_sweep(f: impl Fn(u8) -> (u16, u16)) -> Vec<SensorSample> {
        (0..SWEEP_LEN as u8)
            .map(|a| {
                let (sonar, ir) = f(a);
                SensorSample { angle: a, reading: Reading::Averaged { sonar, ir } }
            })
            .collect()
    }

    fn full() -> ObjectSegmenter {
        ObjectSegmenter::for_mode(ScanMode::Full)
    }

    #[test]
    fn everything_close_is_one_object_1_to_179() {
        let seg = full().segment(&full_sweep(|_| (30, 30)));
        assert_eq!(seg.objects.len(), 1);
        let obj = seg.objects.as_slice()[0];
        assert_eq!((obj.id, obj.start_angle, obj.end_angle, obj.distance_cm), (1, 1, 179, 30));
        assert_eq!(seg.dangling_start, None);
    }

    #[test]
    fn run_closed_by_last_sample_spans_1_to_178() {
        let seg = full().segment(&full_sweep(|a| if a == 179 { (200, 200) } else { (30, 30) }));
        assert_eq!(seg.objects.len(), 1);
        let obj = seg.objects.as_slice()[0];
        assert_eq!((obj.id, obj.start_angle, obj.end_angle), (1, 1, 178));
        assert_eq!(seg.dangling_start, None);
    }

    #[test]
    fn width_two_is_discarded() {
        // 10, 11, 12 qualify: end - start == 2
        let seg = full().segment(&full_sweep(|a| if (10..=12).contains(&a) { (40, 40) } else { (200, 200) }));
        assert!(seg.objects.is_empty());
        assert_eq!(seg.discarded, 1);
    }

    #[test]
    fn width_three_reports_midpoint_distance() {
        let seg = full().segment(&full_sweep(|a| match a {
            20 => (40, 50),
            21 => (60, 62),
            22 => (10, 20),
            23 => (80, 80),
            _ => (200, 200),
        }));
        assert_eq!(seg.objects.len(), 1);
        let obj = seg.objects.as_slice()[0];
        assert_eq!((obj.start_angle, obj.end_angle), (20, 23));
        // center (20 + 23) / 2 = 21, (60 + 62) / 2
        assert_eq!(obj.distance_cm, 61);
    }

    #[test]
    fn full_mode_needs_both_rangers_close() {
        let seg = full().segment(&full_sweep(|a| if (50..60).contains(&a) { (40, 120) } else { (200, 200) }));
        assert!(seg.objects.is_empty());
        assert_eq!(seg.discarded, 0);
    }

    #[test]
    fn fast_mode_uses_wider_threshold() {
        let samples = fast_sweep(|a| if (30..40).contains(&a) { 120 } else { 400 });
        let seg = ObjectSegmenter::for_mode(ScanMode::Fast).segment(&samples);
        assert_eq!(seg.objects.len(), 1);
        assert_eq!(seg.objects.as_slice()[0].distance_cm, 120);
        assert!(full().segment(&full_sweep(|a| if (30..40).contains(&a) { (120, 120) } else { (400, 400) })).objects.is_empty());
    }

    #[test]
    fn angle_zero_never_opens_a_run() {
        let seg = full().segment(&full_sweep(|a| if a < 6 { (30, 30) } else { (200, 200) }));
        let obj = seg.objects.as_slice()[0];
        assert_eq!((obj.start_angle, obj.end_angle), (1, 5));
    }

    #[test]
    fn run_reaching_the_far_edge_is_kept() {
        let seg = full().segment(&full_sweep(|a| if a >= 170 { (45, 45) } else { (200, 200) }));
        assert_eq!(seg.objects.len(), 1);
        let obj = seg.objects.as_slice()[0];
        assert_eq!((obj.start_angle, obj.end_angle, obj.distance_cm), (170, 179, 45));
        assert_eq!(seg.dangling_start, None);
    }

    #[test]
    fn object_open_at_179_is_dropped() {
        let seg = full().segment(&full_sweep(|a| if a == 179 || (100..110).contains(&a) { (30, 30) } else { (200, 200) }));
        assert_eq!(seg.objects.len(), 1);
        assert_eq!(seg.dangling_start, Some(179));
    }

    #[test]
    fn ids_count_discarded_runs() {
        // narrow run at 10..=11, wide run at 50..=60
        let seg = full().segment(&full_sweep(|a| {
            if (10..=11).contains(&a) || (50..=60).contains(&a) { (30, 30) } else { (200, 200) }
        }));
        assert_eq!(seg.objects.len(), 1);
        assert_eq!(seg.objects.as_slice()[0].id, 2);
    }

    #[test]
    fn sixteenth_run_stops_segmentation() {
        // a 4-degree run every 6 degrees: far more than fits
        let seg = full().segment(&full_sweep(|a| if a % 6 >= 1 && a % 6 <= 4 { (30, 30) } else { (200, 200) }));
        assert_eq!(seg.objects.len(), SCAN_CAPACITY);
        assert_eq!(seg.objects.as_slice().last().unwrap().id, 15);
        assert!(seg.overflow.is_some());
    }
}
