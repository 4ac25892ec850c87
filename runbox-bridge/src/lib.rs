//! Front end for the runbox session: a raw-mode terminal, key decoding and
//! the bits of `main` worth testing on their own.

pub mod cli;
pub mod export;
pub mod keyboard;
pub mod surface;
pub mod util;
