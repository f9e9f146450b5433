use rand::Rng;

/// URL-safe alphabet used for public score links.
const TOKEN_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

pub const SCORE_TOKEN_LEN: usize = 32;

pub fn generate_score_token() -> String {
    generate_token_with(&mut rand::thread_rng(), SCORE_TOKEN_LEN)
}

pub fn generate_token_with<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}
