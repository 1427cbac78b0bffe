//! # Quantum-Chain Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Criterion benchmarks for slot and schedule math
//! └── src/integration/  # Multi-node and production loop scenarios
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p qc-tests
//! cargo test -p qc-tests integration::multi_node
//! cargo bench -p qc-tests
//! ```

#![allow(dead_code)]
