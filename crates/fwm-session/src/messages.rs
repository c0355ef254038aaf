//! ---
//! fwm_section: "06-security-access-control"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Session state, role hierarchy and permission predicates."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
//! Localized user-facing messages for auth and session failures.
//!
//! Raw backend messages are never shown as-is, except as the fallback for an
//! auth cause that has no mapping.

use std::str::FromStr;

use fwm_remote::{AuthFailureKind, RemoteError};
use strum::{AsRefStr, Display, EnumString};

/// Supported interface languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Locale {
    #[default]
    En,
    Fr,
    Es,
}

impl Locale {
    /// Parse a tag such as `fr` or `es-MX`; unknown tags fall back to English.
    pub fn from_tag(tag: &str) -> Self {
        let primary = tag.split(['-', '_']).next().unwrap_or_default();
        Locale::from_str(primary).unwrap_or_default()
    }
}

/// Message for a known auth cause. `Other` yields the raw text, or the
/// generic message when the raw text is empty.
pub fn auth_message(kind: &AuthFailureKind, locale: Locale) -> String {
    let text = match (kind, locale) {
        (AuthFailureKind::InvalidCredentials, Locale::En) => "Invalid email or password.",
        (AuthFailureKind::InvalidCredentials, Locale::Fr) => "Email ou mot de passe incorrect.",
        (AuthFailureKind::InvalidCredentials, Locale::Es) => "Correo o contraseña incorrectos.",
        (AuthFailureKind::EmailNotConfirmed, Locale::En) => {
            "Please confirm your email address before signing in."
        }
        (AuthFailureKind::EmailNotConfirmed, Locale::Fr) => {
            "Veuillez confirmer votre adresse email avant de vous connecter."
        }
        (AuthFailureKind::EmailNotConfirmed, Locale::Es) => {
            "Confirme su correo electrónico antes de iniciar sesión."
        }
        (AuthFailureKind::AlreadyRegistered, Locale::En) => {
            "An account already exists for this email."
        }
        (AuthFailureKind::AlreadyRegistered, Locale::Fr) => {
            "Un compte existe déjà pour cet email."
        }
        (AuthFailureKind::AlreadyRegistered, Locale::Es) => {
            "Ya existe una cuenta con este correo."
        }
        (AuthFailureKind::WeakPassword, Locale::En) => {
            "Password must be at least 6 characters long."
        }
        (AuthFailureKind::WeakPassword, Locale::Fr) => {
            "Le mot de passe doit contenir au moins 6 caractères."
        }
        (AuthFailureKind::WeakPassword, Locale::Es) => {
            "La contraseña debe tener al menos 6 caracteres."
        }
        (AuthFailureKind::RateLimited, Locale::En) => {
            "Too many attempts. Please wait a moment and try again."
        }
        (AuthFailureKind::RateLimited, Locale::Fr) => {
            "Trop de tentatives. Veuillez patienter avant de réessayer."
        }
        (AuthFailureKind::RateLimited, Locale::Es) => {
            "Demasiados intentos. Espere un momento e inténtelo de nuevo."
        }
        (AuthFailureKind::MissingSession, Locale::En) => {
            "Your session has expired. Please sign in again."
        }
        (AuthFailureKind::MissingSession, Locale::Fr) => {
            "Votre session a expiré. Veuillez vous reconnecter."
        }
        (AuthFailureKind::MissingSession, Locale::Es) => {
            "Su sesión ha expirado. Inicie sesión de nuevo."
        }
        (AuthFailureKind::Other(raw), _) if !raw.trim().is_empty() => return raw.clone(),
        (AuthFailureKind::Other(_), locale) => return generic_message(locale).to_owned(),
    };
    text.to_owned()
}

pub fn network_message(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "Unable to reach the server. Check your connection and try again.",
        Locale::Fr => "Impossible de joindre le serveur. Vérifiez votre connexion.",
        Locale::Es => "No se puede contactar con el servidor. Compruebe su conexión.",
    }
}

pub fn generic_message(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "Something went wrong. Please try again.",
        Locale::Fr => "Une erreur est survenue. Veuillez réessayer.",
        Locale::Es => "Algo salió mal. Inténtelo de nuevo.",
    }
}

/// User-facing text for any facade failure.
pub fn remote_message(err: &RemoteError, locale: Locale) -> String {
    match err {
        RemoteError::Auth { kind, .. } => auth_message(kind, locale),
        RemoteError::Transport(_) => network_message(locale).to_owned(),
        _ => generic_message(locale).to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_tags_fall_back_to_english() {
        assert_eq!(Locale::from_tag("fr"), Locale::Fr);
        assert_eq!(Locale::from_tag("es-MX"), Locale::Es);
        assert_eq!(Locale::from_tag("FR_ca"), Locale::Fr);
        assert_eq!(Locale::from_tag("de"), Locale::En);
        assert_eq!(Locale::from_tag(""), Locale::En);
    }

    #[test]
    fn every_known_cause_is_localized() {
        let kinds = [
            AuthFailureKind::InvalidCredentials,
            AuthFailureKind::EmailNotConfirmed,
            AuthFailureKind::AlreadyRegistered,
            AuthFailureKind::WeakPassword,
            AuthFailureKind::RateLimited,
            AuthFailureKind::MissingSession,
        ];
        for kind in &kinds {
            let en = auth_message(kind, Locale::En);
            assert_ne!(en, auth_message(kind, Locale::Fr));
            assert_ne!(en, auth_message(kind, Locale::Es));
        }
    }

    #[test]
    fn unmapped_cause_uses_raw_then_generic() {
        assert_eq!(
            auth_message(&AuthFailureKind::Other("Signups disabled".into()), Locale::Fr),
            "Signups disabled"
        );
        assert_eq!(
            auth_message(&AuthFailureKind::Other(" ".into()), Locale::Es),
            generic_message(Locale::Es)
        );
        assert_eq!(
            remote_message(&RemoteError::Transport("refused".into()), Locale::En),
            network_message(Locale::En)
        );
        assert_eq!(
            remote_message(&RemoteError::rejected(500, None), Locale::En),
            generic_message(Locale::En)
        );
    }
}
