//! Pin topology rules for the expansion chip.
//!
//! The chip exposes five ports (`A`..`E`) of up to eight pins each, but the
//! package does not bond out every combination, and the board header breaks
//! out even fewer. An allowed-but-unwired pin still answers register reads;
//! the signal just floats, so callers treat that case as a warning rather
//! than an error.

/// Port that carries the weak pull-up bank.
pub const PULL_UP_PORT: u8 = 1;

/// Map a port letter (`A`..`E`, case-insensitive) to its register offset.
///
/// Anything other than exactly one letter in range is `None`, and callers
/// must abort configuration on it.
pub fn port_index(port: &str) -> Option<u8> {
    match port.as_bytes() {
        [c @ b'a'..=b'e'] => Some(c - b'a'),
        [c @ b'A'..=b'E'] => Some(c - b'A'),
        _ => None,
    }
}

/// Whether the package bonds out this (port, pin) combination.
pub fn pin_allowed(port: u8, pin: u8) -> bool {
    if pin > 7 {
        return false;
    }
    if port == 2 && (3..=5).contains(&pin) {
        return false;
    }
    if port == 4 && pin > 3 {
        return false;
    }
    true
}

/// Whether the combination is actually routed to the board header.
///
/// A strict refinement of [`pin_allowed`].
pub fn pin_wired(port: u8, pin: u8) -> bool {
    if !pin_allowed(port, pin) {
        return false;
    }
    if port == 2 && pin == 2 {
        return false;
    }
    if port == 3 && (1..=3).contains(&pin) {
        return false;
    }
    if port == 4 && pin == 3 {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_letters_resolve_case_insensitively() {
        for (index, (upper, lower)) in [('A', 'a'), ('B', 'b'), ('C', 'c'), ('D', 'd'), ('E', 'e')]
            .iter()
            .enumerate()
        {
            assert_eq!(port_index(&upper.to_string()), Some(index as u8));
            assert_eq!(port_index(&lower.to_string()), Some(index as u8));
        }
    }

    #[test]
    fn bad_port_names_are_invalid() {
        for port in ["", "F", "f", "AB", "aa", "1", " a", "é"] {
            assert_eq!(port_index(port), None, "port {port:?}");
        }
    }

    #[test]
    fn out_of_range_pins_never_allowed() {
        for port in 0..=5 {
            for pin in 8..=255u8 {
                assert!(!pin_allowed(port, pin), "port {port} pin {pin}");
            }
        }
    }

    #[test]
    fn port_c_gap() {
        assert!(pin_allowed(2, 2));
        assert!(!pin_allowed(2, 3));
        assert!(!pin_allowed(2, 4));
        assert!(!pin_allowed(2, 5));
        assert!(pin_allowed(2, 6));
    }

    #[test]
    fn port_e_is_half_width() {
        assert!(pin_allowed(4, 3));
        for pin in 4..=7 {
            assert!(!pin_allowed(4, pin), "pin {pin}");
        }
    }

    #[test]
    fn wired_refines_allowed() {
        // Allowed by the silicon but not broken out on the header.
        assert!(pin_allowed(2, 2));
        assert!(!pin_wired(2, 2));

        assert!(pin_wired(3, 0));
        assert!(!pin_wired(3, 1));
        assert!(!pin_wired(3, 2));
        assert!(!pin_wired(3, 3));
        assert!(pin_wired(3, 4));

        assert!(!pin_wired(4, 3));
    }

    #[test]
    fn predicates_total_over_sentinel_ports() {
        // Out-of-range port indices are unreachable after port_index
        // validation, but the predicates still answer for them.
        for pin in 0..=7 {
            assert!(pin_allowed(255, pin));
            assert!(pin_wired(255, pin));
        }
        assert!(!pin_allowed(255, 8));
        assert!(!pin_wired(255, 8));
    }
}
