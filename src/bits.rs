//! Single-bit helpers for the flag words of the OpenFlow and IPv4 codecs.

/// Return `x` with bit `bit` set when `toggle` is true, cleared otherwise.
pub fn bit(bit: u64, x: u64, toggle: bool) -> u64 {
    let mask = 1u64 << bit;
    if toggle {
        x | mask
    } else {
        x & !mask
    }
}

pub fn test_bit(bit: u64, x: u64) -> bool {
    x & (1u64 << bit) != 0
}

/// Pack `flags` into a word, `flags[i]` becoming bit `i`.
pub fn pack_bits(flags: &[bool]) -> u64 {
    flags
        .iter()
        .enumerate()
        .fold(0, |acc, (i, set)| bit(i as u64, acc, *set))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_clear_and_test() {
        let x = bit(3, 0, true);
        assert_eq!(x, 0b1000);
        assert!(test_bit(3, x));
        assert!(!test_bit(2, x));
        assert_eq!(bit(3, x, false), 0);
    }

    #[test]
    fn pack_bits_is_lsb_first() {
        assert_eq!(pack_bits(&[true, false, true]), 0b101);
        assert_eq!(pack_bits(&[]), 0);
    }
}
