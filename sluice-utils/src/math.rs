/// Number of bits needed to represent a number.
pub fn bits_needed_for(n: u64) -> u64 {
    if n <= 1 {
        return 1;
    }
    let mut rem = n - 1;
    let mut bits = 0;
    while rem != 0 {
        rem /= 2;
        bits += 1;
    }
    bits
}

#[cfg(test)]
mod tests {
    use super::bits_needed_for;

    #[test]
    fn small_values() {
        assert_eq!(bits_needed_for(0), 1);
        assert_eq!(bits_needed_for(1), 1);
        assert_eq!(bits_needed_for(2), 1);
        assert_eq!(bits_needed_for(3), 2);
        assert_eq!(bits_needed_for(16), 4);
        assert_eq!(bits_needed_for(17), 5);
    }
}
