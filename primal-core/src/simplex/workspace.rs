/// Pre-sized scratch buffers reused by every iteration.
#[derive(Debug, Clone)]
pub struct SimplexWorkspace {
    pub n: usize,
    pub m: usize,

    // Row-sized (factorization solves)
    pub rhs: Vec<f64>,
    pub column: Vec<f64>,
    pub row: Vec<f64>,
    pub duals: Vec<f64>,
    pub phase_one_duals: Vec<f64>,

    // Variable-sized
    pub cost: Vec<f64>,
    pub direction: Vec<f64>,

    // Column-sized
    pub gradient: Vec<f64>,
}

impl SimplexWorkspace {
    pub fn new(n: usize, m: usize) -> Self {
        Self {
            n,
            m,
            rhs: vec![0.0; m],
            column: vec![0.0; m],
            row: vec![0.0; m],
            duals: vec![0.0; m],
            phase_one_duals: vec![0.0; m],
            cost: vec![0.0; n + m],
            direction: vec![0.0; n + m],
            gradient: vec![0.0; n],
        }
    }
}
