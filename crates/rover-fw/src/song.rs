/// A tune for the base's speaker: MIDI note numbers with durations in 1/64 s.
/// Note 0 is a rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Song {
    pub name: &'static str,
    pub notes: &'static [(u8, u8)],
}

pub const BEEP: Song = Song { name: "beep", notes: &[(70, 5)] };

pub const ERROR: Song = Song { name: "error", notes: &[(63, 5), (72, 5), (81, 5)] };

/// Played on the landing pad.
pub const COMPLETION: Song = Song {
    name: "completion",
    notes: &[
        (72, 64), (67, 16), (69, 16), (67, 16), (0, 40),
        (72, 64), (67, 16), (69, 16), (67, 16), (0, 40),
        (72, 8), (72, 8), (72, 16), (72, 16), (0, 16),
        (72, 8), (72, 8), (72, 16), (72, 16), (0, 16),
        (72, 20), (71, 20), (72, 32), (71, 20), (72, 96),
    ],
};

impl Song {
    /// Total playing time in milliseconds.
    pub fn duration_ms(&self) -> u32 {
        self.notes.iter().map(|&(_, d)| u32::from(d) * 1000 / 64).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_counts() {
        assert_eq!(BEEP.notes.len(), 1);
        assert_eq!(ERROR.notes.len(), 3);
        assert_eq!(COMPLETION.notes.len(), 25);
        // rests count towards playing time
        assert_eq!(COMPLETION.duration_ms(), COMPLETION.notes.iter().map(|&(_, d)| u32::from(d) * 1000 / 64).sum());
        assert_eq!(BEEP.duration_ms(), 78);
    }
}
