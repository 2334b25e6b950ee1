//! ID grammars for sessions, locks, and events (§6).

use rand::Rng;

fn base36(mut n: u128) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ASCII")
}

fn random_base36(len: usize) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::rng();
    (0..len)
        .map(|_| DIGITS[rng.random_range(0..36)] as char)
        .collect()
}

fn random_hex(len: usize) -> String {
    const DIGITS: &[u8] = b"0123456789abcdef";
    let mut rng = rand::rng();
    (0..len)
        .map(|_| DIGITS[rng.random_range(0..16)] as char)
        .collect()
}

/// `reasoning-<base36(epochMs)>-<8 random hex chars>`
pub fn session_id(now_ms: i64) -> String {
    format!("reasoning-{}-{}", base36(now_ms as u128), random_hex(8))
}

/// `lock_<epochMs>_<9 random base36 chars>`
pub fn lock_id(now_ms: i64) -> String {
    format!("lock_{}_{}", now_ms, random_base36(9))
}

/// `event_<epochMs>_<9 random base36 chars>`
pub fn event_id(now_ms: i64) -> String {
    format!("event_{}_{}", now_ms, random_base36(9))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_grammar() {
        let id = session_id(1_700_000_000_000);
        assert!(id.starts_with("reasoning-"));
        let parts: Vec<&str> = id.splitn(3, '-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn lock_and_event_id_grammar() {
        let l = lock_id(42);
        assert!(l.starts_with("lock_42_"));
        assert_eq!(l.rsplit('_').next().unwrap().len(), 9);

        let e = event_id(42);
        assert!(e.starts_with("event_42_"));
        assert_eq!(e.rsplit('_').next().unwrap().len(), 9);
    }
}
