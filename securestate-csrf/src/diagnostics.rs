//! Debug-mode reporting for the CSRF layer.
//!
//! Everything here is gated on `CsrfConfig::debug` alone: the global log
//! level does not apply, but `securestate-log` still drops every line in
//! test contexts.

use crate::config::CsrfConfig;
use crate::validator::Verdict;
use securestate_log::Level;

pub(crate) fn report(
    config: &CsrfConfig,
    level: Level,
    target: &str,
    message: &str,
    fields: &[(&str, &str)],
) {
    if config.debug {
        securestate_log::event_forced(level, target, message, fields);
    }
}

/// One line per validation: the reason and both token values on rejection.
pub(crate) fn verdict(
    config: &CsrfConfig,
    target: &str,
    verdict: Verdict,
    presented: &str,
    stored: &str,
    extra: &[(&str, &str)],
) {
    if !config.debug {
        return;
    }

    match verdict {
        Verdict::Accept => {
            let mut fields: Vec<(&str, &str)> = vec![("token", presented)];
            fields.extend_from_slice(extra);
            report(config, Level::Debug, target, "CSRF token accepted", &fields);
        }
        Verdict::Reject(reason) => {
            let mut fields: Vec<(&str, &str)> = vec![
                ("reason", reason.code()),
                ("presented", presented),
                ("stored", stored),
            ];
            fields.extend_from_slice(extra);
            report(config, Level::Warn, target, "CSRF token rejected", &fields);
        }
    }
}

/// Held by tests that toggle the global suppression flag.
#[cfg(test)]
pub(crate) static SUPPRESSION_GUARD: parking_lot::Mutex<()> = parking_lot::Mutex::new(());
