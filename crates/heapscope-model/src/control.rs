//! Per-tile control flags.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// A tile's control byte: a bitmask of five independent flags.
///
/// A freshly constructed space marks every tile [`USED`](Self::USED).
/// Marking a tile [`BACKGROUND`](Self::BACKGROUND) or
/// [`UNUSED`](Self::UNUSED) through
/// [`Space::set_control`](crate::Space::set_control) clears the used bit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Control(u8);

impl Control {
    /// The tile holds live data.
    pub const USED: Control = Control(1);
    /// The tile is drawn as background.
    pub const BACKGROUND: Control = Control(2);
    /// The tile is not in use.
    pub const UNUSED: Control = Control(4);
    /// A separator is drawn before the tile.
    pub const SEPARATOR: Control = Control(8);
    /// A link is drawn after the tile.
    pub const LINK: Control = Control(16);

    /// No flags set.
    pub const NONE: Control = Control(0);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Control) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub const fn is_used(self) -> bool {
        self.0 & Self::USED.0 != 0
    }

    pub const fn is_background(self) -> bool {
        self.0 & Self::BACKGROUND.0 != 0
    }

    pub const fn is_unused(self) -> bool {
        self.0 & Self::UNUSED.0 != 0
    }

    pub const fn is_separator(self) -> bool {
        self.0 & Self::SEPARATOR.0 != 0
    }

    pub const fn is_link(self) -> bool {
        self.0 & Self::LINK.0 != 0
    }

    /// Returns a copy with the given flags cleared.
    pub const fn without(self, other: Control) -> Self {
        Self(self.0 & !other.0)
    }

    /// Reinterprets a control array received from the wire.
    pub fn from_wire(bytes: &[i8]) -> Vec<Control> {
        bytes.iter().map(|&b| Control(b as u8)).collect()
    }

    /// Converts a control array for the wire.
    pub fn to_wire(controls: &[Control]) -> Vec<i8> {
        controls.iter().map(|c| c.0 as i8).collect()
    }
}

impl Default for Control {
    fn default() -> Self {
        Self::USED
    }
}

impl BitOr for Control {
    type Output = Control;

    fn bitor(self, rhs: Control) -> Control {
        Control(self.0 | rhs.0)
    }
}

impl BitOrAssign for Control {
    fn bitor_assign(&mut self, rhs: Control) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Control, &str); 5] = [
            (Control::USED, "USED"),
            (Control::BACKGROUND, "BACKGROUND"),
            (Control::UNUSED, "UNUSED"),
            (Control::SEPARATOR, "SEPARATOR"),
            (Control::LINK, "LINK"),
        ];
        let mut first = true;
        write!(f, "Control(")?;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    write!(f, " | ")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        if first {
            write!(f, "NONE")?;
        }
        write!(f, ")")
    }
}
