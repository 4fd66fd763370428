//! Reed-Solomon coding over GF(256) with primitive polynomial
//! x^8 + x^4 + x^3 + x^2 + 1 (0x11D), generator roots alpha^0..alpha^(n-1).
//!
//! Codewords are stored in descending order: `c[0]` is the coefficient of
//! x^(n-1).

use thiserror::Error;

const PRIMITIVE: u16 = 0x11D;

const fn build_tables() -> ([u8; 512], [u8; 256]) {
    let mut exp = [0u8; 512];
    let mut log = [0u8; 256];
    let mut x: u16 = 1;
    let mut i = 0;
    while i < 255 {
        exp[i] = x as u8;
        log[x as usize] = i as u8;
        x <<= 1;
        if x & 0x100 != 0 {
            x ^= PRIMITIVE;
        }
        i += 1;
    }
    while i < 512 {
        exp[i] = exp[i - 255];
        i += 1;
    }
    (exp, log)
}

const TABLES: ([u8; 512], [u8; 256]) = build_tables();
static EXP_TABLE: [u8; 512] = TABLES.0;
static LOG_TABLE: [u8; 256] = TABLES.1;

/// GF(256) arithmetic
pub struct Gf256;

impl Gf256 {
    pub fn mul(a: u8, b: u8) -> u8 {
        if a == 0 || b == 0 {
            return 0;
        }
        EXP_TABLE[LOG_TABLE[a as usize] as usize + LOG_TABLE[b as usize] as usize]
    }

    /// `a / b`, `None` when `b == 0`
    pub fn div(a: u8, b: u8) -> Option<u8> {
        if b == 0 {
            return None;
        }
        if a == 0 {
            return Some(0);
        }
        let diff = LOG_TABLE[a as usize] as usize + 255 - LOG_TABLE[b as usize] as usize;
        Some(EXP_TABLE[diff % 255])
    }

    /// alpha^n
    pub fn exp(n: usize) -> u8 {
        EXP_TABLE[n % 255]
    }

    /// a^n
    pub fn pow(a: u8, n: usize) -> u8 {
        if n == 0 {
            return 1;
        }
        if a == 0 {
            return 0;
        }
        EXP_TABLE[(LOG_TABLE[a as usize] as usize * (n % 255)) % 255]
    }

    /// Evaluate an ascending-order polynomial at `x`
    fn eval_ascending(poly: &[u8], x: u8) -> u8 {
        poly.iter().rev().fold(0u8, |acc, &c| Self::mul(acc, x) ^ c)
    }
}

/// Why a block could not be corrected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RsError {
    #[error("block has more errors than the ECC can locate")]
    TooManyErrors,
    #[error("error locator roots do not match its degree")]
    LocatorMismatch,
    #[error("error evaluator is singular")]
    Singular,
    #[error("syndromes remain non-zero after correction")]
    Residual,
}

/// Reed-Solomon decoder for one block
pub struct ReedSolomonDecoder {
    num_ecc_codewords: usize,
}

impl ReedSolomonDecoder {
    pub fn new(num_ecc_codewords: usize) -> Self {
        Self { num_ecc_codewords }
    }

    /// Correct `received` in place; returns the number of corrected codewords
    pub fn decode(&self, received: &mut [u8]) -> Result<usize, RsError> {
        let syndromes = self.syndromes(received);
        if syndromes.iter().all(|&s| s == 0) {
            return Ok(0);
        }

        let sigma = berlekamp_massey(&syndromes)?;
        let degree = sigma.len() - 1;
        if degree == 0 || degree * 2 > self.num_ecc_codewords {
            return Err(RsError::TooManyErrors);
        }

        let n = received.len();
        let positions = chien_search(&sigma, n);
        if positions.len() != degree {
            return Err(RsError::LocatorMismatch);
        }

        let omega = error_evaluator(&syndromes, &sigma);
        for &pos in &positions {
            let power = n - 1 - pos;
            let x_k = Gf256::exp(power);
            let x_inv = Gf256::exp(255 - power % 255);
            let omega_val = Gf256::eval_ascending(&omega, x_inv);
            let sigma_prime_val = formal_derivative_at(&sigma, x_inv);
            let quotient = Gf256::div(omega_val, sigma_prime_val).ok_or(RsError::Singular)?;
            received[pos] ^= Gf256::mul(x_k, quotient);
        }

        if self.syndromes(received).iter().any(|&s| s != 0) {
            return Err(RsError::Residual);
        }
        Ok(degree)
    }

    /// S_i = r(alpha^i) for i in 0..ecc
    fn syndromes(&self, received: &[u8]) -> Vec<u8> {
        (0..self.num_ecc_codewords)
            .map(|i| {
                let x = Gf256::exp(i);
                received.iter().fold(0u8, |acc, &c| Gf256::mul(acc, x) ^ c)
            })
            .collect()
    }
}

/// Error locator polynomial (ascending, `sigma[0] == 1`, trailing zeros trimmed)
fn berlekamp_massey(syndromes: &[u8]) -> Result<Vec<u8>, RsError> {
    let mut sigma = vec![1u8];
    let mut prev = vec![1u8];
    let mut prev_delta = 1u8;
    let mut len = 0usize;
    let mut shift = 1usize;

    for n in 0..syndromes.len() {
        let mut delta = syndromes[n];
        for i in 1..=len.min(sigma.len() - 1) {
            delta ^= Gf256::mul(sigma[i], syndromes[n - i]);
        }

        if delta == 0 {
            shift += 1;
            continue;
        }

        let coef = Gf256::div(delta, prev_delta).ok_or(RsError::Singular)?;
        let snapshot = sigma.clone();
        if sigma.len() < prev.len() + shift {
            sigma.resize(prev.len() + shift, 0);
        }
        for (j, &b) in prev.iter().enumerate() {
            sigma[j + shift] ^= Gf256::mul(coef, b);
        }

        if 2 * len <= n {
            len = n + 1 - len;
            prev = snapshot;
            prev_delta = delta;
            shift = 1;
        } else {
            shift += 1;
        }
    }

    while sigma.len() > 1 && sigma.last() == Some(&0) {
        sigma.pop();
    }
    if sigma.len() - 1 != len {
        return Err(RsError::TooManyErrors);
    }
    Ok(sigma)
}

/// Indices (descending layout) whose inverse locator is a root of `sigma`
fn chien_search(sigma: &[u8], n: usize) -> Vec<usize> {
    (0..n)
        .filter(|&pos| {
            let power = (n - 1 - pos) % 255;
            let x_inv = Gf256::exp(255 - power);
            Gf256::eval_ascending(sigma, x_inv) == 0
        })
        .collect()
}

/// Omega(x) = S(x) * sigma(x) mod x^(2t)
fn error_evaluator(syndromes: &[u8], sigma: &[u8]) -> Vec<u8> {
    let mut omega = vec![0u8; syndromes.len()];
    for (i, slot) in omega.iter_mut().enumerate() {
        for (j, &s) in sigma.iter().enumerate().take(i + 1) {
            *slot ^= Gf256::mul(s, syndromes[i - j]);
        }
    }
    omega
}

/// sigma'(x) in characteristic 2 keeps only odd-degree terms
fn formal_derivative_at(sigma: &[u8], x: u8) -> u8 {
    sigma
        .iter()
        .enumerate()
        .skip(1)
        .step_by(2)
        .fold(0u8, |acc, (i, &c)| acc ^ Gf256::mul(c, Gf256::pow(x, i - 1)))
}

/// Reed-Solomon ECC generator for one block length
pub struct ReedSolomonEncoder {
    /// Generator coefficients without the leading 1, descending
    generator: Vec<u8>,
}

impl ReedSolomonEncoder {
    pub fn new(num_ecc_codewords: usize) -> Self {
        // Product of (x - alpha^i), kept in descending order without the monic term
        let mut generator = vec![0u8; num_ecc_codewords];
        if let Some(last) = generator.last_mut() {
            *last = 1;
        }
        let mut root = 1u8;
        for _ in 0..num_ecc_codewords {
            for j in 0..generator.len() {
                generator[j] = Gf256::mul(generator[j], root);
                if j + 1 < generator.len() {
                    generator[j] ^= generator[j + 1];
                }
            }
            root = Gf256::mul(root, 2);
        }
        Self { generator }
    }

    /// ECC codewords for `data`
    pub fn ecc(&self, data: &[u8]) -> Vec<u8> {
        let mut remainder = vec![0u8; self.generator.len()];
        for &byte in data {
            let factor = byte ^ remainder.first().copied().unwrap_or(0);
            remainder.rotate_left(1);
            if let Some(last) = remainder.last_mut() {
                *last = 0;
            }
            for (r, &g) in remainder.iter_mut().zip(self.generator.iter()) {
                *r ^= Gf256::mul(g, factor);
            }
        }
        remainder
    }
}
