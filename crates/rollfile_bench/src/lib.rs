//! Benchmark utilities.

use rand::Rng;

/// Generate a log-like record of `size` bytes ending in a newline.
pub fn random_line(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    let mut line: Vec<u8> = (0..size.saturating_sub(1))
        .map(|_| rng.gen_range(b' '..=b'~'))
        .collect();
    line.push(b'\n');
    line
}

/// Generate `count` records with sizes drawn from `min..=max`.
pub fn random_lines(count: usize, min: usize, max: usize) -> Vec<Vec<u8>> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| random_line(rng.gen_range(min..=max)))
        .collect()
}
