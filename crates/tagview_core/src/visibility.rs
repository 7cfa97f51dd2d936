use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether signature artifacts are currently rendered in a tag view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureVisibility {
    #[default]
    Hidden,
    Shown,
}

impl SignatureVisibility {
    #[inline]
    pub fn show_signatures(&self) -> bool {
        matches!(self, SignatureVisibility::Shown)
    }

    /// Label of the control that leads out of this state.
    pub fn label(&self) -> &'static str {
        match self {
            SignatureVisibility::Hidden => "Show Signatures",
            SignatureVisibility::Shown => "Hide Signatures",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            SignatureVisibility::Hidden => SignatureVisibility::Shown,
            SignatureVisibility::Shown => SignatureVisibility::Hidden,
        }
    }
}

impl From<bool> for SignatureVisibility {
    fn from(show_signatures: bool) -> Self {
        if show_signatures {
            SignatureVisibility::Shown
        } else {
            SignatureVisibility::Hidden
        }
    }
}

impl fmt::Display for SignatureVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureVisibility::Hidden => f.write_str("hidden"),
            SignatureVisibility::Shown => f.write_str("shown"),
        }
    }
}

/// Two-state show/hide control. Starts [`SignatureVisibility::Hidden`] and flips on every
/// activation; there is no terminal state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SignatureToggle {
    state: SignatureVisibility,
}

impl SignatureToggle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SignatureVisibility {
        self.state
    }

    pub fn label(&self) -> &'static str {
        self.state.label()
    }

    #[inline]
    pub fn show_signatures(&self) -> bool {
        self.state.show_signatures()
    }

    /// Flip the toggle and return the new state.
    pub fn activate(&mut self) -> SignatureVisibility {
        self.state = self.state.toggled();
        tracing::trace!(state = %self.state, "signature toggle activated");
        self.state
    }
}
