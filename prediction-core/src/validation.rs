use prediction_types::{GameRules, ValidationError};

pub const MAX_NAME_LENGTH: usize = 50;
pub const MAX_EMAIL_LENGTH: usize = 100;

/// Canonical leaderboard identity: trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// True when the email is already in canonical form.
pub fn is_normalized_email(email: &str) -> bool {
    normalize_email(email) == email
}

/// Normalize and check an email supplied by a player.
pub fn validate_email(email: &str) -> Result<String, ValidationError> {
    let normalized = normalize_email(email);
    if normalized.is_empty() {
        return Err(ValidationError::EmptyEmail);
    }
    if normalized.chars().count() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::EmailTooLong {
            max: MAX_EMAIL_LENGTH,
        });
    }
    Ok(normalized)
}

/// Trim a display name and check its length.
pub fn validate_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::NameTooLong {
            max: MAX_NAME_LENGTH,
        });
    }
    Ok(name.to_string())
}

pub fn validate_score(score: u32, rules: &GameRules) -> Result<u32, ValidationError> {
    if score > rules.max_score() {
        return Err(ValidationError::ScoreOutOfRange {
            score,
            max: rules.max_score(),
        });
    }
    Ok(score)
}
