use rand::Rng;

/// Length of a generated `client_id`.
pub const CLIENT_ID_LENGTH: usize = 24;

/// Length of a generated `client_secret`.
///
/// This value is never hashed before storage: it doubles as the HS256
/// signing key for the client's own access/refresh/ID tokens, so the server
/// must be able to read it back verbatim.
pub const CLIENT_SECRET_LENGTH: usize = 48;

const SALT_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a random alphanumeric salt of the given length.
pub fn generate_salt(length: usize) -> String {
    let mut rng = rand::thread_rng();

    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..SALT_CHARSET.len());
            SALT_CHARSET[idx] as char
        })
        .collect()
}

pub fn generate_client_id() -> String {
    generate_salt(CLIENT_ID_LENGTH)
}

pub fn generate_client_secret() -> String {
    generate_salt(CLIENT_SECRET_LENGTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_client_id_has_expected_length() {
        let id = generate_client_id();
        assert_eq!(id.len(), CLIENT_ID_LENGTH);
    }

    #[test]
    fn generate_client_secret_has_expected_length() {
        let secret = generate_client_secret();
        assert_eq!(secret.len(), CLIENT_SECRET_LENGTH);
    }

    #[test]
    fn generated_values_are_alphanumeric() {
        let secret = generate_client_secret();
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn successive_calls_differ() {
        let a = generate_client_secret();
        let b = generate_client_secret();
        assert_ne!(a, b);
    }
}
