pub mod check;
pub mod pats;
