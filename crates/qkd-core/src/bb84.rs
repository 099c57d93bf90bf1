//! BB84 key exchange between Alice and Bob, with an optional eavesdropper.
//!
//! Each qubit is simulated on its own, reduced to the classical probability
//! rules of a single-qubit exchange: measuring in the basis a qubit was
//! prepared in reads its value, measuring in the conjugate basis yields a
//! uniformly random bit and collapses the qubit into that result.
//!
//! # Eavesdropping
//!
//! Eve intercepts every qubit, measures it in a random basis and forwards her
//! result re-prepared in her own basis. Bob is therefore compared against
//! Eve's basis, not Alice's. On positions where Alice and Bob agree on the
//! basis, Eve chose the other basis half of the time, and each of those
//! yields a wrong bit for Bob half of the time: the QBER converges to 25%.
//!
//! # Reproducibility
//!
//! [`simulate`] draws from the caller's [`RngCore`] in a fixed order per
//! qubit:
//!
//! 1. Alice's bit, Alice's basis
//! 2. Eve's basis, then Eve's result if her basis differs from Alice's
//! 3. Bob's basis, then Bob's result if his basis differs from the basis the
//!    qubit arrives in
//!
//! One draw is the most significant bit of `next_u32()`. A seeded source
//! therefore reproduces every sequence of a run exactly.

use rand::RngCore;

/// Number of qubits exchanged when the caller does not say otherwise.
pub const DEFAULT_BIT_COUNT: usize = 100;

/// Measurement basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Basis {
    /// Horizontal/vertical polarization (bit 0).
    Rectilinear,
    /// ±45° polarization (bit 1).
    Diagonal,
}

impl Basis {
    fn from_bit(bit: bool) -> Self {
        if bit { Self::Diagonal } else { Self::Rectilinear }
    }

    /// Wire representation: 0 for rectilinear, 1 for diagonal.
    pub fn as_bit(self) -> u8 {
        match self {
            Self::Rectilinear => 0,
            Self::Diagonal => 1,
        }
    }
}

/// Parameters for one protocol run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bb84Config {
    /// Number of qubits Alice sends.
    pub bit_count: usize,
    /// Whether Eve intercepts the channel.
    pub eavesdropper: bool,
}

impl Default for Bb84Config {
    fn default() -> Self {
        Self { bit_count: DEFAULT_BIT_COUNT, eavesdropper: false }
    }
}

impl Bb84Config {
    /// Run of `bit_count` qubits without an eavesdropper.
    pub fn new(bit_count: usize) -> Self {
        Self { bit_count, eavesdropper: false }
    }

    /// Enable or disable interception.
    #[must_use]
    pub fn with_eavesdropper(mut self, eavesdropper: bool) -> Self {
        self.eavesdropper = eavesdropper;
        self
    }
}

/// Outcome of one protocol run.
///
/// Every per-qubit sequence has length `bit_count`. `eve_bases` is present
/// iff the run was intercepted.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolRun {
    /// Number of qubits exchanged.
    pub bit_count: usize,
    /// Whether Eve intercepted the channel.
    pub eavesdropper_active: bool,
    /// Bits Alice encoded.
    pub alice_bits: Vec<bool>,
    /// Bases Alice encoded in.
    pub alice_bases: Vec<Basis>,
    /// Bases Bob measured in.
    pub bob_bases: Vec<Basis>,
    /// Bases Eve measured in, if she was present.
    pub eve_bases: Option<Vec<Basis>>,
    /// Bits Bob measured.
    pub bob_results: Vec<bool>,
    /// Bob's results at the positions where Alice's and Bob's bases match.
    pub sifted_key: Vec<bool>,
    /// Sifted positions where Bob's result differs from Alice's bit.
    pub error_count: usize,
    /// Quantum bit error rate in percent, rounded to two decimals.
    pub error_rate: f64,
}

impl ProtocolRun {
    /// Number of positions where Alice and Bob chose the same basis.
    pub fn matching_basis_count(&self) -> usize {
        self.sifted_key.len()
    }

    /// Sifted key as a string of `0` and `1`.
    pub fn key_string(&self) -> String {
        self.sifted_key.iter().map(|&bit| if bit { '1' } else { '0' }).collect()
    }
}

/// A qubit in flight: a value prepared in a basis.
#[derive(Debug, Clone, Copy)]
struct Qubit {
    value: bool,
    basis: Basis,
}

impl Qubit {
    /// Measure in `basis`.
    ///
    /// A conjugate-basis measurement yields a fresh random bit and leaves the
    /// qubit prepared in the measured state.
    fn measure<R: RngCore + ?Sized>(&mut self, basis: Basis, rng: &mut R) -> bool {
        if basis != self.basis {
            *self = Self { value: draw_bit(rng), basis };
        }
        self.value
    }
}

fn draw_bit<R: RngCore + ?Sized>(rng: &mut R) -> bool {
    rng.next_u32() >> 31 == 1
}

/// Run BB84 for `config.bit_count` qubits.
///
/// Never fails: a `bit_count` of zero yields empty sequences and an error
/// rate of zero.
pub fn simulate<R: RngCore + ?Sized>(config: Bb84Config, rng: &mut R) -> ProtocolRun {
    let n = config.bit_count;

    let mut alice_bits = Vec::with_capacity(n);
    let mut alice_bases = Vec::with_capacity(n);
    let mut bob_bases = Vec::with_capacity(n);
    let mut bob_results = Vec::with_capacity(n);
    let mut eve_bases = config.eavesdropper.then(|| Vec::with_capacity(n));

    for _ in 0..n {
        let alice_bit = draw_bit(rng);
        let alice_basis = Basis::from_bit(draw_bit(rng));
        let mut qubit = Qubit { value: alice_bit, basis: alice_basis };

        if let Some(eve_bases) = eve_bases.as_mut() {
            let eve_basis = Basis::from_bit(draw_bit(rng));
            // Eve forwards exactly what she measured
            qubit.measure(eve_basis, rng);
            eve_bases.push(eve_basis);
        }

        let bob_basis = Basis::from_bit(draw_bit(rng));
        let bob_result = qubit.measure(bob_basis, rng);

        alice_bits.push(alice_bit);
        alice_bases.push(alice_basis);
        bob_bases.push(bob_basis);
        bob_results.push(bob_result);
    }

    // Sifting: only Alice's and Bob's public bases are compared
    let mut sifted_key = Vec::new();
    let mut error_count = 0;

    for i in 0..n {
        if alice_bases[i] == bob_bases[i] {
            sifted_key.push(bob_results[i]);

            if alice_bits[i] != bob_results[i] {
                error_count += 1;
            }
        }
    }

    let error_rate = qber(error_count, sifted_key.len());

    ProtocolRun {
        bit_count: n,
        eavesdropper_active: config.eavesdropper,
        alice_bits,
        alice_bases,
        bob_bases,
        eve_bases,
        bob_results,
        sifted_key,
        error_count,
        error_rate,
    }
}

/// Error percentage rounded to two decimals; zero when nothing was sifted.
fn qber(errors: usize, matching: usize) -> f64 {
    if matching == 0 {
        return 0.0;
    }

    let rate = errors as f64 * 100.0 / matching as f64;
    (rate * 100.0).round() / 100.0
}
