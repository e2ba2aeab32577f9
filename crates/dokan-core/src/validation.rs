//! # Validation Module
//!
//! Synchronous input checks. A failure here means nothing is sent to the
//! backend and nothing in the cart changes.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Front end                                                    │
//! │  └── Immediate feedback (required markers, input masks)                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── size chosen for sized products                                    │
//! │  ├── address fields present, first offending field reported           │
//! │  └── Bangladesh mobile number pattern                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Backend                                                      │
//! │  └── Authoritative checks (stock, account, duplicate orders)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use regex::Regex;
use std::sync::LazyLock;

use crate::error::ValidationError;
use crate::types::{Address, Product, SizeKey};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Minimum account password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Bangladesh mobile numbers: optional `+88`/`88` then `01[3-9]` and 8 digits.
pub static BD_PHONE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\+?88)?01[3-9]\d{8}$").expect("static regex"));

// =============================================================================
// Phone
// =============================================================================

/// Checks a phone number against [`BD_PHONE_REGEX`].
///
/// ```rust
/// use dokan_core::validation::validate_phone;
///
/// assert!(validate_phone("01712345678").is_ok());
/// assert!(validate_phone("+8801712345678").is_ok());
/// assert!(validate_phone("01212345678").is_err());
/// ```
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let phone = phone.trim();
    if phone.is_empty() {
        return Err(ValidationError::Required {
            field: "phone".to_string(),
        });
    }
    if !BD_PHONE_REGEX.is_match(phone) {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must be a Bangladesh mobile number".to_string(),
        });
    }
    Ok(())
}

/// Normalizes a typed phone number to `+8801XXXXXXXXX` when it is
/// recognisably a Bangladesh mobile number; otherwise returns the input with
/// separators stripped.
///
/// ```rust
/// use dokan_core::validation::normalize_phone;
///
/// assert_eq!(normalize_phone("017-1234 5678"), "+8801712345678");
/// assert_eq!(normalize_phone("8801712345678"), "+8801712345678");
/// ```
pub fn normalize_phone(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    let digits = cleaned.trim_start_matches('+');

    let local = LOCAL_MOBILE.is_match(digits);
    let with_country = digits.starts_with("88") && LOCAL_MOBILE.is_match(&digits[2..]);
    if with_country {
        format!("+{digits}")
    } else if local {
        format!("+88{digits}")
    } else {
        cleaned
    }
}

static LOCAL_MOBILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^01[3-9]\d{8}$").expect("static regex"));

/// Checks an account password.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

// =============================================================================
// Cart
// =============================================================================

/// Resolves the size key a product may be added under.
///
/// ## Rules
/// - sized product, no size given → `Required { field: "size" }`
/// - sized product, unknown label → `NotAllowed`
/// - one-size product → always the none key, whatever was passed
pub fn validate_size_selection(product: &Product, size: &SizeKey) -> ValidationResult<SizeKey> {
    if !product.requires_size() {
        return Ok(SizeKey::none());
    }
    if size.is_none() {
        return Err(ValidationError::Required {
            field: "size".to_string(),
        });
    }
    if !product.offers_size(size) {
        return Err(ValidationError::NotAllowed {
            field: "size".to_string(),
            allowed: product.sizes.clone(),
        });
    }
    Ok(size.clone())
}

/// Checks a line that is already stored or assembled: its size must be the
/// one [`validate_size_selection`] would resolve, so a one-size product
/// carrying a label is rejected as well.
pub fn validate_line_size(product: &Product, size: &SizeKey) -> ValidationResult<()> {
    let resolved = validate_size_selection(product, size)?;
    if resolved != *size {
        return Err(ValidationError::NotAllowed {
            field: "size".to_string(),
            allowed: Vec::new(),
        });
    }
    Ok(())
}

// =============================================================================
// Address
// =============================================================================

fn required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        Err(ValidationError::Required {
            field: field.to_string(),
        })
    } else {
        Ok(())
    }
}

/// Checks a checkout shipping address, reporting the first offending field.
///
/// Field order is the order of the checkout form: recipient name, phone,
/// address line, district. Postal code is optional at checkout.
pub fn validate_shipping_address(address: &Address) -> ValidationResult<()> {
    required("recipientName", &address.recipient_name)?;
    required("phone", &address.phone)?;
    required("addressLine1", &address.address_line1)?;
    required("district", &address.district)?;
    validate_phone(&address.phone)
}

/// Checks an address before it is saved to the profile. Same as checkout,
/// plus a postal code.
pub fn validate_profile_address(address: &Address) -> ValidationResult<()> {
    required("recipientName", &address.recipient_name)?;
    required("phone", &address.phone)?;
    required("addressLine1", &address.address_line1)?;
    required("district", &address.district)?;
    required("postalCode", &address.postal_code)?;
    validate_phone(&address.phone)
}

// =============================================================================
// Unit Tests
// =============================================================================
