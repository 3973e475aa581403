// MIT License - Copyright (c) 2026 SafeHome Project

//! Panel state enumeration and indicator LEDs.

use bitflags::bitflags;

/// The panel's finite states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelState {
    /// Powered off; only the power-on button works.
    Offline,
    /// Idle screen, system live.
    Initialized,
    /// Waiting for a login role selection.
    PanelIdInput,
    /// Collecting password digits.
    DigitInput,
    /// Command menu for the numbered buttons.
    FunctionMode,
    /// Operator-triggered emergency.
    PanicMode,
    /// Collecting the new master password.
    MasterPasswordChangeInput1,
    /// Collecting the confirmation entry.
    MasterPasswordChangeInput2,
    /// Too many failed logins; input ignored until the countdown ends.
    Locked,
    /// Intrusion active, alarm sounding, escalation countdown running.
    RingingAlarm,
}

impl PanelState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Offline => "Offline",
            Self::Initialized => "Initialized",
            Self::PanelIdInput => "Panel ID Input",
            Self::DigitInput => "Digit Input",
            Self::FunctionMode => "Function Mode",
            Self::PanicMode => "Panic",
            Self::MasterPasswordChangeInput1 => "New Password",
            Self::MasterPasswordChangeInput2 => "Confirm Password",
            Self::Locked => "Locked",
            Self::RingingAlarm => "Ringing Alarm",
        }
    }

}

impl std::fmt::Display for PanelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

bitflags! {
    /// Panel indicator LEDs.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PanelIndicators: u8 {
        const POWERED   = 0b0000_0001;
        const ARMED     = 0b0000_0010;
        const AWAY      = 0b0000_0100;
        const HOME      = 0b0000_1000;
        /// An intrusion latch is set somewhere.
        const NOT_READY = 0b0001_0000;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_away_and_home_flags_are_distinct() {
        let mut leds = PanelIndicators::POWERED | PanelIndicators::AWAY;
        leds.remove(PanelIndicators::AWAY);
        leds.insert(PanelIndicators::HOME);
        assert!(leds.contains(PanelIndicators::HOME));
        assert!(!leds.contains(PanelIndicators::AWAY));
        assert!(leds.contains(PanelIndicators::POWERED));
    }
}
