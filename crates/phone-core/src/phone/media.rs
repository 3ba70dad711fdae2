//! Media control: microphone mute and DTMF
//!
//! Media operations are bound to whichever call is currently Established.
//! The binding is made when a call reaches Established and dropped when it
//! terminates; without a binding both operations are silent no-ops.
//!
//! Neither operation ever fails towards the caller. The logical mute flag
//! follows the user's intent even when the transport cannot apply the
//! directive (no controllable audio path, request error); those cases are
//! logged. DTMF symbols outside `0-9 * #` and transport failures while
//! sending a tone are logged and dropped. A sequence stops at the first tone
//! that finds its call gone.

use std::fmt;

use tracing::{debug, info, warn};

use super::recovery::best_effort;
use super::Phone;
use crate::call::{CallSession, SessionId};
use crate::error::{PhoneError, PhoneResult};
use crate::transport::CallHandle;

/// The established call media operations apply to
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MediaBinding {
    pub(crate) session_id: SessionId,
    pub(crate) handle: CallHandle,
}

#[derive(Debug, Default)]
pub(crate) struct MediaControl {
    bound: Option<MediaBinding>,
}

impl MediaControl {
    pub(crate) fn bind(&mut self, session: &CallSession) {
        debug!(session_id = %session.id(), "Media bound to call");
        self.bound = Some(MediaBinding {
            session_id: session.id(),
            handle: session.handle().clone(),
        });
    }

    /// Drop the binding if it belongs to `session_id`
    pub(crate) fn detach(&mut self, session_id: SessionId) {
        if self.bound.as_ref().map(|b| b.session_id) == Some(session_id) {
            debug!(session_id = %session_id, "Media detached from call");
            self.bound = None;
        }
    }

    pub(crate) fn bound(&self) -> Option<&MediaBinding> {
        self.bound.as_ref()
    }
}

/// One DTMF symbol: `0`-`9`, `*` or `#`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DtmfTone(char);

impl DtmfTone {
    pub fn symbol(&self) -> char {
        self.0
    }

    /// Parse a whole dial sequence, failing on the first invalid symbol
    pub fn parse_sequence(digits: &str) -> PhoneResult<Vec<DtmfTone>> {
        digits.chars().map(DtmfTone::try_from).collect()
    }
}

impl TryFrom<char> for DtmfTone {
    type Error = PhoneError;

    fn try_from(symbol: char) -> Result<Self, Self::Error> {
        match symbol {
            '0'..='9' | '*' | '#' => Ok(DtmfTone(symbol)),
            other => Err(PhoneError::invalid_input(
                "dtmf",
                format!("{:?} is not one of 0-9, * or #", other),
            )),
        }
    }
}

impl fmt::Display for DtmfTone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Phone {
    /// Flip the microphone mute of the established call
    ///
    /// Returns the new muted value, or `false` when no call is Established.
    /// Two calls in a row restore both the flag and the audio directive.
    pub async fn toggle_mute(&self) -> bool {
        let mut guard = self.core.lock().await;
        let core = &mut *guard;

        let Some(binding) = core.media.bound().cloned() else {
            debug!("Mute toggle ignored, no established call");
            return false;
        };
        let Some(session) = core.sessions.active_mut().filter(|s| s.id() == binding.session_id) else {
            debug!("Mute toggle ignored, bound call is gone");
            return false;
        };
        let muted = match session.toggle_muted() {
            Ok(muted) => muted,
            Err(e) => {
                debug!(error = %e, "Mute toggle ignored");
                return false;
            }
        };

        // Sent with the lock held so consecutive toggles reach the transport in order
        if let Some(error) = best_effort(
            "set_outbound_audio_enabled",
            self.config.teardown_timeout(),
            self.transport.set_outbound_audio_enabled(&binding.handle, !muted),
        )
        .await
        {
            debug!(error = %error, muted, "Mute directive not applied, keeping logical state");
        }

        info!(session_id = %binding.session_id, muted, "Microphone mute toggled");
        muted
    }

    /// Send one DTMF tone on the established call
    ///
    /// Does nothing when no call is Established. Invalid symbols and
    /// transport failures are logged, never returned.
    pub async fn send_digit(&self, symbol: char) {
        let tone = match DtmfTone::try_from(symbol) {
            Ok(tone) => tone,
            Err(e) => {
                warn!(error = %e, "Ignoring invalid DTMF symbol");
                return;
            }
        };
        self.send_tones(&[tone]).await;
    }

    /// Send a sequence of DTMF tones, e.g. `"1234#"`
    ///
    /// The whole sequence is dropped if any symbol is invalid.
    pub async fn send_digits(&self, digits: &str) {
        match DtmfTone::parse_sequence(digits) {
            Ok(tones) => self.send_tones(&tones).await,
            Err(e) => warn!(error = %e, digits, "Ignoring invalid DTMF sequence"),
        }
    }

    async fn send_tones(&self, tones: &[DtmfTone]) {
        let duration_ms = self.config.dtmf_duration_ms;
        let mut session_id = None;

        for tone in tones {
            // The lock is not held across the request; a hangup between tones ends the sequence
            let Some(binding) = self.established_binding().await else {
                debug!(remaining = tones.len(), "DTMF ignored, no established call");
                return;
            };
            if *session_id.get_or_insert(binding.session_id) != binding.session_id {
                debug!("DTMF sequence dropped, the call changed");
                return;
            }

            best_effort(
                "send_out_of_band_signal",
                self.config.teardown_timeout(),
                self.transport.send_out_of_band_signal(&binding.handle, tone.symbol(), duration_ms),
            )
            .await;
            debug!(session_id = %binding.session_id, tone = %tone, duration_ms, "DTMF sent");
        }
    }

    /// Copy of the media binding, if it belongs to the active Established call
    async fn established_binding(&self) -> Option<MediaBinding> {
        let guard = self.core.lock().await;
        let binding = guard.media.bound()?;
        guard
            .sessions
            .active()
            .filter(|s| s.id() == binding.session_id && s.is_established())
            .map(|_| binding.clone())
    }
}
