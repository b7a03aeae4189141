// ==============================
// tests/unit/password_tests.rs
// ==============================
use backend_lib::auth::{
    password::{hash_params, hash_password_with},
    validate_password_strength, verify_password, PasswordRequirements,
};

#[test]
fn test_password_hashing_and_verification() {
    let params = hash_params(4).unwrap();
    let hash = hash_password_with("SecureP@ssw0rd", params).unwrap();

    assert_ne!(hash, "SecureP@ssw0rd");
    assert!(hash.starts_with("$scrypt$"));
    assert!(verify_password(&hash, "SecureP@ssw0rd"));
    assert!(!verify_password(&hash, "SecureP@ssw0rD"));
    assert!(!verify_password("not a hash", "SecureP@ssw0rd"));
}

#[test]
fn test_password_strength_validation() {
    let requirements = PasswordRequirements::default();

    assert!(validate_password_strength("SecureP@ssw0rd", &requirements));
    // Too short
    assert!(!validate_password_strength("Sh0rt!", &requirements));
    // Three classes are enough
    assert!(validate_password_strength("securep@ssw0rd", &requirements));
    assert!(validate_password_strength("SecurePassw0rd", &requirements));
    // Only two classes
    assert!(!validate_password_strength("securepassw0rd", &requirements));
    assert!(!validate_password_strength("SECUREPASSWORD!", &requirements));

    let relaxed = PasswordRequirements {
        min_length: 8,
        min_character_classes: 2,
    };
    assert!(validate_password_strength("securepassw0rd", &relaxed));
}
