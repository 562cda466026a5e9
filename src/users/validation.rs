use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use time::{
    format_description::well_known::{Iso8601, Rfc3339},
    Date, OffsetDateTime, PrimitiveDateTime,
};

use crate::users::dto::{NewUser, UserChanges, UserPayload};

/// A single broken rule. The display text is returned verbatim to clients,
/// which match on it, so several causes share one message on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Username must be a string")]
    UsernameNotString,
    #[error("Username must be at least 8 characters long")]
    UsernameTooShort,
    #[error("Username must be no longer than 20 characters")]
    UsernameTooLong,
    #[error("Username must contain letters, numbers, or underscores")]
    UsernameCharacters,
    #[error("Hashed password must be a string")]
    PasswordNotString,
    #[error("Hashed password must be at least 12 characters long")]
    PasswordTooShort,
    #[error("Invalid email address")]
    Email,
    #[error("Invalid phone number. Must contain only digits and be between 10-15 characters long.")]
    PhoneNumber,
    #[error("First name must be between 3 and 25 characters.")]
    FirstName,
    #[error("Last name must be between 2 and 25 characters.")]
    LastName,
    // Also fires for spaces, hyphens and accented letters.
    #[error("Your name must not include numbers")]
    NameCharacters,
    #[error("The joinDate must be a string in ISO format")]
    JoinDateNotString,
    #[error("The joinDate must be a valid date and not be in the future")]
    JoinDate,
    #[error("isSupplier field must be a boolean value")]
    IsSupplier,
    #[error("No fields provided to update")]
    NothingToUpdate,
}

lazy_static! {
    static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_]+$").unwrap();
    // `\s` here lacks U+FEFF, so the byte-order mark is listed explicitly.
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[^\s\x{FEFF}@]+@[^\s\x{FEFF}@]+\.[^\s\x{FEFF}@]+$").unwrap();
    static ref PHONE_RE: Regex = Regex::new(r"^[0-9]{10,15}$").unwrap();
    static ref NAME_RE: Regex = Regex::new(r"^[A-Za-z]+$").unwrap();
}

static MISSING: Value = Value::Null;

/// Runs every rule in order and stops at the first one that fails.
pub fn validate_user(payload: &UserPayload, now: OffsetDateTime) -> Result<NewUser, ValidationError> {
    let username = check_username(field(&payload.username))?;
    let hashed_password = check_hashed_password(field(&payload.hashed_password))?;
    let email = check_email(field(&payload.email))?;
    let phone_number = check_phone_number(field(&payload.phone_number))?;
    let first_name = check_first_name(field(&payload.first_name))?;
    let last_name = check_last_name(field(&payload.last_name))?;
    check_name_letters([first_name, last_name])?;
    let join_date = check_join_date(field(&payload.join_date), now)?;
    let is_supplier = check_is_supplier(field(&payload.is_supplier))?;

    Ok(NewUser {
        username: username.to_owned(),
        hashed_password: hashed_password.to_owned(),
        email: email.to_owned(),
        phone_number: phone_number.to_owned(),
        first_name: first_name.to_owned(),
        last_name: last_name.to_owned(),
        join_date,
        is_supplier,
    })
}

/// Same rules and order as [`validate_user`], applied only to the fields
/// the client sent. An explicit `null` counts as sent.
pub fn validate_user_changes(
    payload: &UserPayload,
    now: OffsetDateTime,
) -> Result<UserChanges, ValidationError> {
    if payload.is_empty() {
        return Err(ValidationError::NothingToUpdate);
    }

    let username = payload.username.as_ref().map(check_username).transpose()?;
    let hashed_password = payload
        .hashed_password
        .as_ref()
        .map(check_hashed_password)
        .transpose()?;
    let email = payload.email.as_ref().map(check_email).transpose()?;
    let phone_number = payload
        .phone_number
        .as_ref()
        .map(check_phone_number)
        .transpose()?;
    let first_name = payload.first_name.as_ref().map(check_first_name).transpose()?;
    let last_name = payload.last_name.as_ref().map(check_last_name).transpose()?;
    check_name_letters(first_name.into_iter().chain(last_name))?;
    let join_date = payload
        .join_date
        .as_ref()
        .map(|v| check_join_date(v, now))
        .transpose()?;
    let is_supplier = payload
        .is_supplier
        .as_ref()
        .map(check_is_supplier)
        .transpose()?;

    Ok(UserChanges {
        username: username.map(str::to_owned),
        hashed_password: hashed_password.map(str::to_owned),
        email: email.map(str::to_owned),
        phone_number: phone_number.map(str::to_owned),
        first_name: first_name.map(str::to_owned),
        last_name: last_name.map(str::to_owned),
        join_date,
        is_supplier,
    })
}

fn field(slot: &Option<Value>) -> &Value {
    slot.as_ref().unwrap_or(&MISSING)
}

/// Length in UTF-16 code units, so an emoji counts as two.
fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

fn check_username(value: &Value) -> Result<&str, ValidationError> {
    let username = value.as_str().ok_or(ValidationError::UsernameNotString)?;
    let len = utf16_len(username);
    if len < 8 {
        return Err(ValidationError::UsernameTooShort);
    }
    if len > 20 {
        return Err(ValidationError::UsernameTooLong);
    }
    if !USERNAME_RE.is_match(username) {
        return Err(ValidationError::UsernameCharacters);
    }
    Ok(username)
}

fn check_hashed_password(value: &Value) -> Result<&str, ValidationError> {
    let hashed = value.as_str().ok_or(ValidationError::PasswordNotString)?;
    if utf16_len(hashed) < 12 {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(hashed)
}

fn check_email(value: &Value) -> Result<&str, ValidationError> {
    value
        .as_str()
        .filter(|email| EMAIL_RE.is_match(email))
        .ok_or(ValidationError::Email)
}

fn check_phone_number(value: &Value) -> Result<&str, ValidationError> {
    value
        .as_str()
        .filter(|phone| PHONE_RE.is_match(phone))
        .ok_or(ValidationError::PhoneNumber)
}

fn check_first_name(value: &Value) -> Result<&str, ValidationError> {
    value
        .as_str()
        .filter(|name| (3..=25).contains(&utf16_len(name)))
        .ok_or(ValidationError::FirstName)
}

fn check_last_name(value: &Value) -> Result<&str, ValidationError> {
    value
        .as_str()
        .filter(|name| (2..=25).contains(&utf16_len(name)))
        .ok_or(ValidationError::LastName)
}

fn check_name_letters<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<(), ValidationError> {
    if names.into_iter().all(|name| NAME_RE.is_match(name)) {
        Ok(())
    } else {
        Err(ValidationError::NameCharacters)
    }
}

fn check_join_date(value: &Value, now: OffsetDateTime) -> Result<OffsetDateTime, ValidationError> {
    let raw = value.as_str().ok_or(ValidationError::JoinDateNotString)?;
    match parse_timestamp(raw) {
        Some(joined) if joined <= now => Ok(joined),
        _ => Err(ValidationError::JoinDate),
    }
}

fn check_is_supplier(value: &Value) -> Result<bool, ValidationError> {
    value.as_bool().ok_or(ValidationError::IsSupplier)
}

/// ISO-8601 timestamp. A date-time without an offset is read as UTC, not
/// as server-local time; a bare date is midnight UTC.
fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(raw, &Rfc3339)
        .or_else(|_| OffsetDateTime::parse(raw, &Iso8601::DEFAULT))
        .ok()
        .or_else(|| {
            PrimitiveDateTime::parse(raw, &Iso8601::DEFAULT)
                .ok()
                .map(PrimitiveDateTime::assume_utc)
        })
        .or_else(|| {
            Date::parse(raw, &Iso8601::DEFAULT)
                .ok()
                .map(|date| date.midnight().assume_utc())
        })
}
