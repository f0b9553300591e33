use std::fmt;

/// Eye state for one frame, or the debounced state over recent frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EyeStatus {
    BothOpen,
    WinkLeft,
    WinkRight,
    Blink,
    /// No usable face in the frame.
    Error,
}

impl EyeStatus {
    pub const ALL: [EyeStatus; 5] = [
        EyeStatus::BothOpen,
        EyeStatus::WinkLeft,
        EyeStatus::WinkRight,
        EyeStatus::Blink,
        EyeStatus::Error,
    ];

    /// Raw per-frame classification from what the detectors found.
    ///
    /// A missing eye is a closed eye, named by the empty side. When a face is
    /// found but neither eye is, the frame counts as a blink unless
    /// `missing_eyes_as_error` asks for it to be treated like a lost face.
    pub fn classify(
        face_found: bool,
        left_found: bool,
        right_found: bool,
        missing_eyes_as_error: bool,
    ) -> EyeStatus {
        if !face_found {
            return EyeStatus::Error;
        }
        match (left_found, right_found) {
            (true, true) => EyeStatus::BothOpen,
            (false, true) => EyeStatus::WinkLeft,
            (true, false) => EyeStatus::WinkRight,
            (false, false) if missing_eyes_as_error => EyeStatus::Error,
            (false, false) => EyeStatus::Blink,
        }
    }

    /// Combines per-eye closed decisions into a status.
    pub fn from_closed(left_closed: bool, right_closed: bool) -> EyeStatus {
        match (left_closed, right_closed) {
            (true, true) => EyeStatus::Blink,
            (false, false) => EyeStatus::BothOpen,
            (true, false) => EyeStatus::WinkLeft,
            (false, true) => EyeStatus::WinkRight,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            EyeStatus::BothOpen => 0,
            EyeStatus::WinkLeft => 1,
            EyeStatus::WinkRight => 2,
            EyeStatus::Blink => 3,
            EyeStatus::Error => 4,
        }
    }

    pub fn from_u8(value: u8) -> Option<EyeStatus> {
        EyeStatus::ALL.get(value as usize).copied()
    }
}

impl fmt::Display for EyeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EyeStatus::BothOpen => "both open",
            EyeStatus::WinkLeft => "left wink",
            EyeStatus::WinkRight => "right wink",
            EyeStatus::Blink => "blink",
            EyeStatus::Error => "error",
        };
        f.write_str(label)
    }
}
